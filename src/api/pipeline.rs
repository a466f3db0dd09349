use futures::FutureExt;
use log::{debug, warn};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use url::Url;

use super::context::{global_context, PipelineContext};
use super::http_client::{create_client, HttpSettings};
use super::types::{Method, QueryParams, RequestBody, RequestOptions, ResponseBody, ResponseType};
use crate::error::{GatewayError, RequestError, Result};

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Names of the cookie the CSRF token is read from and the header it is
/// echoed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfSettings {
    pub cookie_name: String,
    pub header_name: String,
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            cookie_name: CSRF_COOKIE.to_string(),
            header_name: CSRF_HEADER.to_string(),
        }
    }
}

/// Low-level HTTP operations against one portal.
///
/// Cloning is cheap; clones share the client, cookie store and context.
#[derive(Clone)]
pub struct RequestPipeline {
    client: Client,
    base_url: Url,
    cookies: Arc<Jar>,
    csrf: CsrfSettings,
    context: Arc<PipelineContext>,
}

pub struct PipelineBuilder {
    base_url: String,
    settings: HttpSettings,
    csrf: CsrfSettings,
    context: Option<Arc<PipelineContext>>,
    cookies: Vec<String>,
}

impl PipelineBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = user_agent.into();
        self
    }

    pub fn settings(mut self, settings: HttpSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn csrf(mut self, cookie_name: impl Into<String>, header_name: impl Into<String>) -> Self {
        self.csrf = CsrfSettings {
            cookie_name: cookie_name.into(),
            header_name: header_name.into(),
        };
        self
    }

    /// Use a dedicated context instead of the process-wide one.
    pub fn context(mut self, context: Arc<PipelineContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Seed the cookie store, e.g. `sessionid=...`.
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookies.push(cookie.into());
        self
    }

    pub fn build(self) -> Result<RequestPipeline> {
        let base_url = Url::parse(&self.base_url)?;
        let cookies = Arc::new(Jar::default());
        for cookie in &self.cookies {
            cookies.add_cookie_str(cookie, &base_url);
        }
        let client = create_client(&self.settings, cookies.clone())?;
        Ok(RequestPipeline {
            client,
            base_url,
            cookies,
            csrf: self.csrf,
            context: self.context.unwrap_or_else(global_context),
        })
    }
}

impl RequestPipeline {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            base_url: base_url.into(),
            settings: HttpSettings::default(),
            csrf: CsrfSettings::default(),
            context: None,
            cookies: Vec::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    pub fn cookies(&self) -> &Arc<Jar> {
        &self.cookies
    }

    /// Resolve `url` against the base URL (absolute URLs are kept) and
    /// append `query`.
    pub fn resolve_url(&self, url: &str, query: Option<&QueryParams>) -> Result<Url> {
        let mut resolved = self.base_url.join(url)?;
        match query {
            Some(QueryParams::Raw(raw)) if !raw.is_empty() => {
                let combined = match resolved.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{raw}"),
                    _ => raw.clone(),
                };
                resolved.set_query(Some(&combined));
            }
            Some(QueryParams::Pairs(pairs)) if !pairs.is_empty() => {
                let mut serializer = resolved.query_pairs_mut();
                for (key, value) in pairs {
                    serializer.append_pair(key, value);
                }
            }
            _ => {}
        }
        Ok(resolved)
    }

    /// The CSRF token the cookie store holds for `url`, if any.
    pub fn csrf_token(&self, url: &Url) -> Option<String> {
        let header = self.cookies.cookies(url)?;
        let cookies = header.to_str().ok()?;
        cookies
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.csrf.cookie_name)
            .map(|(_, value)| value.to_string())
    }

    pub async fn get(&self, url: &str, query: Option<QueryParams>, options: &RequestOptions) -> Result<ResponseBody> {
        self.send(Method::Get, url, query, None, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: Option<RequestBody>,
        query: Option<QueryParams>,
        options: &RequestOptions,
    ) -> Result<ResponseBody> {
        self.send(Method::Post, url, query, body, options).await
    }

    pub async fn put(
        &self,
        url: &str,
        body: Option<RequestBody>,
        query: Option<QueryParams>,
        options: &RequestOptions,
    ) -> Result<ResponseBody> {
        self.send(Method::Put, url, query, body, options).await
    }

    pub async fn delete(&self, url: &str, query: Option<QueryParams>, options: &RequestOptions) -> Result<ResponseBody> {
        self.send(Method::Delete, url, query, None, options).await
    }

    pub async fn send(
        &self,
        method: Method,
        url: &str,
        query: Option<QueryParams>,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> Result<ResponseBody> {
        let url = self.resolve_url(url, query.as_ref())?;

        if method == Method::Get && options.cache {
            let key = url.to_string();
            let pipeline = self.clone();
            let options = options.clone();
            let shared = self.context.cache().get_or_insert_with(&key, || {
                let task_url = key.clone();
                // Spawned so the request settles even if every awaiter goes away.
                let handle = tokio::spawn(async move { pipeline.execute(Method::Get, url, None, &options).await });
                async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(RequestError::network(task_url, None, format!("request task failed: {e}")))
                    })
                }
                .boxed()
            });
            return shared.await.map_err(GatewayError::from);
        }

        self.execute(method, url, body, options).await.map_err(GatewayError::from)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> std::result::Result<ResponseBody, RequestError> {
        let url_text = url.to_string();
        let body_text = body.as_ref().map(RequestBody::describe);
        let headers = self.headers(&url, options, body.as_ref());

        let mut request = self.client.request(method.into(), url).headers(headers);
        request = match body {
            Some(RequestBody::Json(value)) => request.body(value.to_string()),
            Some(RequestBody::Text(text)) => request.body(text),
            Some(RequestBody::Multipart(form)) => request.multipart(form),
            None => request,
        };

        let _guard = options.show_spinner.then(|| self.context.begin());
        debug!("{} {}", method, url_text);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = RequestError::network(&url_text, body_text, e.to_string());
                self.context.dispatch(&err, options.ignore_errors);
                return Err(err);
            }
        };

        let status = response.status();
        debug!("{} {} -> {}", method, url_text, status);

        if status.is_success() {
            let result = read_body(response, status, options.response_type)
                .await
                .map_err(|message| RequestError::invalid_response(&url_text, body_text, status.as_u16(), message));
            if let Err(err) = &result {
                self.context.dispatch(err, options.ignore_errors);
            }
            return result;
        }

        let text = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<Value>(&text).ok();
        let err = RequestError::from_response(url_text, body_text, status.as_u16(), parsed, &text);
        self.context.dispatch(&err, options.ignore_errors);
        Err(err)
    }

    fn headers(&self, url: &Url, options: &RequestOptions, body: Option<&RequestBody>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&options.media_type) {
            Ok(media_type) => {
                headers.insert(ACCEPT, media_type.clone());
                if !body.is_some_and(RequestBody::is_multipart) {
                    headers.insert(CONTENT_TYPE, media_type);
                }
            }
            Err(_) => warn!("Ignoring invalid media type '{}'", options.media_type),
        }
        if let Some(token) = self.csrf_token(url) {
            let name = HeaderName::from_bytes(self.csrf.header_name.as_bytes());
            let value = HeaderValue::from_str(&token);
            if let (Ok(name), Ok(value)) = (name, value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base_url", &self.base_url.as_str())
            .field("csrf", &self.csrf)
            .finish_non_exhaustive()
    }
}

async fn read_body(
    response: Response,
    status: StatusCode,
    response_type: ResponseType,
) -> std::result::Result<ResponseBody, String> {
    if status == StatusCode::NO_CONTENT {
        return Ok(ResponseBody::Empty);
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("failed to read response body: {e}"))?;
    if bytes.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    match response_type {
        ResponseType::Json => serde_json::from_slice(&bytes)
            .map(ResponseBody::Json)
            .map_err(|e| format!("invalid JSON in response: {e}")),
        ResponseType::Text => String::from_utf8(bytes.to_vec())
            .map(ResponseBody::Text)
            .map_err(|e| format!("response is not UTF-8: {e}")),
        ResponseType::Bytes => Ok(ResponseBody::Bytes(bytes.to_vec())),
    }
}
