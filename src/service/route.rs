use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::api::types::{query_value, QueryParams};
use crate::error::{GatewayError, Result};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)(?::([A-Za-z_]+))?>").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, kind: Option<String> },
}

/// URL with `<name>` or `<name:kind>` placeholders, parsed once.
///
/// Kind `int` requires an integer value; kind `path` keeps `/` unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                segments.push(Segment::Literal(template[last..whole.start()].to_string()));
            }
            segments.push(Segment::Param {
                name: caps[1].to_string(),
                kind: caps.get(2).map(|m| m.as_str().to_string()),
            });
            last = whole.end();
        }
        if last < template.len() {
            segments.push(Segment::Literal(template[last..].to_string()));
        }
        Self {
            template: template.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill every placeholder from `params`.
    pub fn render(&self, params: &Map<String, Value>, encode: bool) -> Result<String> {
        let mut url = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Param { name, kind } => {
                    let value = params
                        .get(name)
                        .filter(|v| !v.is_null())
                        .ok_or_else(|| GatewayError::MissingPathParam {
                            param: name.clone(),
                            template: self.template.clone(),
                        })?;
                    let text = query_value(value);
                    if kind.as_deref() == Some("int") && text.parse::<i64>().is_err() {
                        return Err(GatewayError::InvalidInput(format!(
                            "path parameter '{name}' of {} must be an integer, got {text}",
                            self.template
                        )));
                    }
                    url.push_str(&encode_segment(&text, kind.as_deref(), encode));
                }
            }
        }
        Ok(url)
    }
}

fn encode_segment(text: &str, kind: Option<&str>, encode: bool) -> String {
    if !encode {
        return text.to_string();
    }
    if kind == Some("path") {
        return text
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");
    }
    urlencoding::encode(text).into_owned()
}

/// Where the unconsumed parameters of a call go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRoute {
    /// No body (GET/DELETE).
    None,
    /// The body is the value of this parameter.
    Named(String),
    /// The body is an object of every parameter not used by path or query.
    Remaining,
}

/// Parameter routing of one method, derived once at build time.
#[derive(Debug, Clone)]
pub struct RouteTable {
    template: UrlTemplate,
    query: Vec<(String, String)>,
    body: BodyRoute,
    encode: bool,
}

/// A call's parameters split into URL, query and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub url: String,
    pub query: Option<QueryParams>,
    pub body: Option<Value>,
}

impl RouteTable {
    pub fn new(template: UrlTemplate, query: Vec<(String, String)>, body: BodyRoute, encode: bool) -> Self {
        Self {
            template,
            query,
            body,
            encode,
        }
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn body(&self) -> &BodyRoute {
        &self.body
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn resolve(&self, mut params: Map<String, Value>) -> Result<ResolvedRequest> {
        let url = self.template.render(&params, self.encode)?;

        let mut query = Map::new();
        for (param, query_name) in &self.query {
            if let Some(value) = params.get(param).filter(|v| !v.is_null()) {
                query.insert(query_name.clone(), value.clone());
            }
        }

        let consumed: HashSet<String> = self
            .template
            .params()
            .map(str::to_string)
            .chain(self.query.iter().map(|(param, _)| param.clone()))
            .collect();
        params.retain(|key, _| !consumed.contains(key));

        let body = match &self.body {
            BodyRoute::None => None,
            BodyRoute::Named(name) => params.remove(name),
            BodyRoute::Remaining => Some(Value::Object(std::mem::take(&mut params))),
        };
        if !params.is_empty() {
            let dropped: Vec<&str> = params.keys().map(String::as_str).collect();
            debug!("Dropping unrouted parameters for {}: {:?}", self.template.as_str(), dropped);
        }

        Ok(ResolvedRequest {
            url,
            query: (!query.is_empty()).then(|| QueryParams::from_map(&query)),
            body,
        })
    }
}
