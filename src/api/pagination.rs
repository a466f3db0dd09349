use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use url::Url;

use super::pipeline::RequestPipeline;
use super::types::RequestOptions;
use crate::error::{GatewayError, Result};
use crate::model::{Marshaller, Model, ModelSchema};

pub const DEFAULT_PAGE_PARAM: &str = "page";

/// Shape of a paged list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// Responses are never treated as pages.
    #[default]
    None,
    /// `{count, next, previous, results}` with absolute next/previous links.
    Results,
    /// `{content, number, size, totalElements, totalPages, first, last}`;
    /// adjacent pages are addressed through a page query parameter.
    Content,
}

impl PaginationStyle {
    /// Whether `body` is a page envelope of this style.
    pub fn matches(&self, body: &Value) -> bool {
        let Some(map) = body.as_object() else {
            return false;
        };
        match self {
            Self::None => false,
            Self::Results => map.contains_key("next"),
            Self::Content => map.contains_key("content"),
        }
    }
}

/// Everything needed to fetch and decode further pages.
#[derive(Clone)]
pub struct PageSource {
    pub pipeline: RequestPipeline,
    pub marshaller: Marshaller,
    pub schema: Arc<ModelSchema>,
    pub style: PaginationStyle,
    pub page_param: String,
    pub options: RequestOptions,
}

#[derive(Debug, Clone, Default)]
struct Page {
    results: Vec<Model>,
    next: Option<String>,
    previous: Option<String>,
    count: Option<u64>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// One page of decoded results plus lazy access to its neighbours.
///
/// Adjacent pages are only requested when [`next`](Self::next) or
/// [`previous`](Self::previous) is called.
pub struct PaginationIterator {
    source: PageSource,
    url: Url,
    page: Page,
}

impl PaginationIterator {
    /// Build from the envelope fetched from `url`.
    pub fn from_envelope(source: PageSource, url: Url, body: &Value) -> Result<Self> {
        let page = parse_page(&source, &url, body)?;
        Ok(Self { source, url, page })
    }

    /// Fetch the first page from `url`.
    pub async fn fetch(source: PageSource, url: &str) -> Result<Self> {
        let url = source.pipeline.resolve_url(url, None)?;
        let body = fetch_envelope(&source, &url).await?;
        Self::from_envelope(source, url, &body)
    }

    pub fn results(&self) -> &[Model] {
        &self.page.results
    }

    pub fn into_results(self) -> Vec<Model> {
        self.page.results
    }

    /// Total number of items across all pages, when the server reports it.
    pub fn count(&self) -> Option<u64> {
        self.page.count
    }

    pub fn limit(&self) -> Option<u64> {
        self.page.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.page.offset
    }

    pub fn has_next(&self) -> bool {
        self.page.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.page.previous.is_some()
    }

    /// URL the current page was fetched from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn next_url(&self) -> Option<&str> {
        self.page.next.as_deref()
    }

    pub fn previous_url(&self) -> Option<&str> {
        self.page.previous.as_deref()
    }

    /// Replace the current page with the next one. Returns `false` without
    /// a request when there is no next page.
    pub async fn next(&mut self) -> Result<bool> {
        match self.page.next.clone() {
            Some(link) => self.load(&link).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn previous(&mut self) -> Result<bool> {
        match self.page.previous.clone() {
            Some(link) => self.load(&link).await.map(|_| true),
            None => Ok(false),
        }
    }

    async fn load(&mut self, link: &str) -> Result<()> {
        let url = self.source.pipeline.resolve_url(link, None)?;
        debug!("Fetching page {}", url);
        let body = fetch_envelope(&self.source, &url).await?;
        self.page = parse_page(&self.source, &url, &body)?;
        self.url = url;
        Ok(())
    }

    /// Items of the current page followed by those of every later page,
    /// each page requested only once the previous one is consumed. The
    /// stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Model>> {
        stream::unfold((self, true), |(mut state, first)| async move {
            if !first {
                if !state.has_next() {
                    return None;
                }
                if let Err(e) = state.next().await {
                    state.page.next = None;
                    return Some((stream::iter(vec![Err(e)]), (state, false)));
                }
            }
            let items: Vec<Result<Model>> = std::mem::take(&mut state.page.results).into_iter().map(Ok).collect();
            Some((stream::iter(items), (state, false)))
        })
        .flatten()
    }

    /// Walk every remaining page and return all items.
    pub async fn collect_all(self) -> Result<Vec<Model>> {
        self.into_stream().try_collect().await
    }
}

impl fmt::Debug for PaginationIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationIterator")
            .field("url", &self.url.as_str())
            .field("style", &self.source.style)
            .field("model", &self.source.schema.name())
            .field("results", &self.page.results.len())
            .field("next", &self.page.next)
            .field("previous", &self.page.previous)
            .field("count", &self.page.count)
            .finish()
    }
}

async fn fetch_envelope(source: &PageSource, url: &Url) -> Result<Value> {
    source
        .pipeline
        .get(url.as_str(), None, &source.options)
        .await?
        .into_json()
        .ok_or_else(|| GatewayError::decode(source.schema.name(), "expected a page envelope, got an empty or non-JSON body"))
}

fn parse_page(source: &PageSource, url: &Url, body: &Value) -> Result<Page> {
    let path = format!("{} page", source.schema.name());
    let map = body
        .as_object()
        .ok_or_else(|| GatewayError::decode(&path, "expected a page envelope object"))?;

    match source.style {
        PaginationStyle::Results => Ok(Page {
            results: decode_items(source, map.get("results"))?,
            next: link(map, "next"),
            previous: link(map, "previous"),
            count: map.get("count").and_then(Value::as_u64),
            limit: map.get("limit").and_then(Value::as_u64),
            offset: map.get("offset").and_then(Value::as_u64),
        }),
        PaginationStyle::Content => {
            let number = map.get("number").and_then(Value::as_u64).unwrap_or(0);
            let size = map.get("size").and_then(Value::as_u64);
            let total_pages = map.get("totalPages").and_then(Value::as_u64);
            let has_next = match map.get("last").and_then(Value::as_bool) {
                Some(last) => !last,
                None => total_pages.is_some_and(|total| number.saturating_add(1) < total),
            };
            let has_previous = match map.get("first").and_then(Value::as_bool) {
                Some(first) => !first,
                None => number > 0,
            };
            Ok(Page {
                results: decode_items(source, map.get("content"))?,
                next: has_next.then(|| page_url(url, &source.page_param, number.saturating_add(1))),
                previous: (has_previous && number > 0).then(|| page_url(url, &source.page_param, number - 1)),
                count: map.get("totalElements").and_then(Value::as_u64),
                limit: size,
                offset: size.and_then(|size| size.checked_mul(number)),
            })
        }
        PaginationStyle::None => Err(GatewayError::Config(format!(
            "{} is not configured for pagination",
            source.schema.name()
        ))),
    }
}

fn decode_items(source: &PageSource, items: Option<&Value>) -> Result<Vec<Model>> {
    match items {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => source.marshaller.decode_list_schema(&source.schema, items),
    }
}

fn link(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `url` with its page parameter replaced by `number`.
fn page_url(url: &Url, page_param: &str, number: u64) -> String {
    let mut next = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != page_param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(page_param, &number.to_string());
    next.to_string()
}
