//! Callable services compiled from declarative configuration.

pub mod catalog;
pub mod config;
pub mod route;

pub use catalog::Catalog;
pub use config::{BodyParams, MethodConfig, QueryParamMap, ServiceConfig, ViewSet, ViewSetMethod};
pub use route::{BodyRoute, ResolvedRequest, RouteTable, UrlTemplate};

use log::debug;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::pagination::DEFAULT_PAGE_PARAM;
use crate::api::{
    Method, PageSource, PaginationIterator, PaginationStyle, RequestBody, RequestOptions, RequestPipeline,
    ResponseBody,
};
use crate::error::{GatewayError, Result};
use crate::model::{Marshaller, Model, ModelSchema};

/// Named call parameters.
pub type Params = Map<String, Value>;

/// Turn a JSON object (or `null`) into call parameters.
pub fn params(value: Value) -> Result<Params> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(GatewayError::InvalidInput(format!(
            "call parameters must be an object, got {other}"
        ))),
    }
}

/// One compiled method of a service.
#[derive(Debug, Clone)]
pub struct ServiceMethod {
    name: String,
    method: Method,
    route: RouteTable,
    model: Option<Arc<ModelSchema>>,
    pagination: PaginationStyle,
    page_param: String,
    cache: bool,
}

impl ServiceMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn route(&self) -> &RouteTable {
        &self.route
    }

    pub fn url_template(&self) -> &str {
        self.route.template().as_str()
    }

    pub fn model(&self) -> Option<&Arc<ModelSchema>> {
        self.model.as_ref()
    }

    pub fn pagination(&self) -> PaginationStyle {
        self.pagination
    }

    pub fn is_cached(&self) -> bool {
        self.cache
    }
}

/// What a service method produced.
#[derive(Debug)]
pub enum ServiceResult {
    Empty,
    Model(Model),
    Models(Vec<Model>),
    Paginated(PaginationIterator),
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ServiceResult {
    pub fn into_model(self) -> Result<Model> {
        match self {
            Self::Model(model) => Ok(model),
            other => Err(GatewayError::InvalidInput(format!(
                "expected a single model, got {}",
                other.kind()
            ))),
        }
    }

    /// Models of a list or of the current page.
    pub fn into_models(self) -> Result<Vec<Model>> {
        match self {
            Self::Models(models) => Ok(models),
            Self::Paginated(pages) => Ok(pages.into_results()),
            Self::Model(model) => Ok(vec![model]),
            other => Err(GatewayError::InvalidInput(format!(
                "expected a list of models, got {}",
                other.kind()
            ))),
        }
    }

    pub fn into_paginated(self) -> Result<PaginationIterator> {
        match self {
            Self::Paginated(pages) => Ok(pages),
            other => Err(GatewayError::InvalidInput(format!(
                "expected a paginated result, got {}",
                other.kind()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Model(_) => "model",
            Self::Models(_) => "models",
            Self::Paginated(_) => "paginated",
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// JSON rendering for output. A paginated result shows its current page.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Model(model) => model.to_json(),
            Self::Models(models) => Value::Array(models.iter().map(Model::to_json).collect()),
            Self::Paginated(pages) => json!({
                "count": pages.count(),
                "next": pages.next_url(),
                "previous": pages.previous_url(),
                "results": pages.results().iter().map(Model::to_json).collect::<Vec<_>>(),
            }),
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// A REST resource with its compiled methods.
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    methods: BTreeMap<String, ServiceMethod>,
    pipeline: RequestPipeline,
    marshaller: Marshaller,
}

impl Service {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> impl Iterator<Item = &ServiceMethod> {
        self.methods.values()
    }

    pub fn method(&self, name: &str) -> Result<&ServiceMethod> {
        self.methods.get(name).ok_or_else(|| GatewayError::UnknownMethod {
            service: self.name.clone(),
            method: name.to_string(),
        })
    }

    pub async fn call(&self, method: &str, params: Params, options: RequestOptions) -> Result<ServiceResult> {
        let method = self.method(method)?;
        let mut options = options;
        if method.cache && method.method == Method::Get {
            options.cache = true;
        }

        let resolved = method.route.resolve(params)?;
        debug!("{}.{} -> {} {}", self.name, method.name, method.method, resolved.url);

        let response = self
            .pipeline
            .send(
                method.method,
                &resolved.url,
                resolved.query.clone(),
                resolved.body.clone().map(RequestBody::Json),
                &options,
            )
            .await?;
        self.wrap(method, &resolved, response, options)
    }

    fn wrap(
        &self,
        method: &ServiceMethod,
        resolved: &ResolvedRequest,
        response: ResponseBody,
        options: RequestOptions,
    ) -> Result<ServiceResult> {
        let body = match response {
            ResponseBody::Empty => return Ok(ServiceResult::Empty),
            ResponseBody::Text(text) => return Ok(ServiceResult::Text(text)),
            ResponseBody::Bytes(bytes) => return Ok(ServiceResult::Bytes(bytes)),
            ResponseBody::Json(body) => body,
        };
        let Some(schema) = &method.model else {
            return Ok(ServiceResult::Json(body));
        };

        if method.pagination.matches(&body) {
            let url = self.pipeline.resolve_url(&resolved.url, resolved.query.as_ref())?;
            let source = PageSource {
                pipeline: self.pipeline.clone(),
                marshaller: self.marshaller.clone(),
                schema: schema.clone(),
                style: method.pagination,
                page_param: method.page_param.clone(),
                options,
            };
            return PaginationIterator::from_envelope(source, url, &body).map(ServiceResult::Paginated);
        }

        match &body {
            Value::Array(_) => self.marshaller.decode_list_schema(schema, &body).map(ServiceResult::Models),
            Value::Object(_) => self.marshaller.decode_schema(schema, &body).map(ServiceResult::Model),
            _ => Ok(ServiceResult::Json(body)),
        }
    }

    pub async fn list(&self, params: Params, options: RequestOptions) -> Result<ServiceResult> {
        self.call("list", params, options).await
    }

    pub async fn create(&self, data: Value, options: RequestOptions) -> Result<ServiceResult> {
        let mut params = Params::new();
        params.insert("data".to_string(), data);
        self.call("create", params, options).await
    }

    pub async fn retrieve(&self, lookup: impl Into<Value>, options: RequestOptions) -> Result<ServiceResult> {
        self.call("retrieve", lookup_params(lookup), options).await
    }

    pub async fn update(&self, lookup: impl Into<Value>, data: Value, options: RequestOptions) -> Result<ServiceResult> {
        let mut params = lookup_params(lookup);
        params.insert("data".to_string(), data);
        self.call("update", params, options).await
    }

    pub async fn delete(&self, lookup: impl Into<Value>, options: RequestOptions) -> Result<ServiceResult> {
        self.call("delete", lookup_params(lookup), options).await
    }
}

fn lookup_params(lookup: impl Into<Value>) -> Params {
    let mut params = Params::new();
    params.insert("lookup".to_string(), lookup.into());
    params
}

/// Compiles service configuration into [`Service`]s.
#[derive(Debug, Clone)]
pub struct ServiceFactory {
    pipeline: RequestPipeline,
    marshaller: Marshaller,
}

impl ServiceFactory {
    pub fn new(pipeline: RequestPipeline, marshaller: Marshaller) -> Self {
        Self { pipeline, marshaller }
    }

    pub fn build_service(&self, name: &str, config: &ServiceConfig) -> Result<Service> {
        let mut declared = BTreeMap::new();

        let view_set = config.view_set.methods();
        if !view_set.is_empty() {
            let base = config
                .url
                .as_deref()
                .ok_or_else(|| GatewayError::Config(format!("service '{name}' enables view_set without a url")))?;
            for convention in view_set {
                declared.insert(convention.name().to_string(), convention.expand(base, config));
            }
        }
        for (method_name, method) in &config.methods {
            declared.insert(method_name.clone(), method.clone());
        }

        let methods = declared
            .iter()
            .map(|(method_name, method)| {
                self.compile_method(name, method_name, method, config)
                    .map(|compiled| (method_name.clone(), compiled))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Service {
            name: name.to_string(),
            methods,
            pipeline: self.pipeline.clone(),
            marshaller: self.marshaller.clone(),
        })
    }

    fn compile_method(
        &self,
        service: &str,
        name: &str,
        config: &MethodConfig,
        service_config: &ServiceConfig,
    ) -> Result<ServiceMethod> {
        if config.url.is_empty() {
            return Err(GatewayError::Config(format!("{service}.{name} has no url")));
        }
        let model = match &config.model {
            Some(model) => Some(
                self.marshaller
                    .schema(model)
                    .map_err(|_| GatewayError::Config(format!("{service}.{name} references unknown model '{model}'")))?,
            ),
            None => None,
        };
        if model.is_none() && config.pagination != PaginationStyle::None {
            return Err(GatewayError::Config(format!(
                "{service}.{name} is paginated but declares no model"
            )));
        }

        let body = if config.request_type.has_body() {
            match config.body_params.as_ref().and_then(|b| b.name.clone()) {
                Some(param) => BodyRoute::Named(param),
                None => BodyRoute::Remaining,
            }
        } else {
            BodyRoute::None
        };
        let encode = config
            .encode_path_params
            .or(service_config.encode_path_params)
            .unwrap_or(true);

        Ok(ServiceMethod {
            name: name.to_string(),
            method: config.request_type,
            route: RouteTable::new(UrlTemplate::parse(&config.url), config.query_params.pairs(), body, encode),
            model,
            pagination: config.pagination,
            page_param: config
                .page_param
                .clone()
                .or_else(|| service_config.page_param.clone())
                .unwrap_or_else(|| DEFAULT_PAGE_PARAM.to_string()),
            cache: config.cache,
        })
    }

    pub fn build_all(&self, services: &BTreeMap<String, ServiceConfig>) -> Result<ServiceDirectory> {
        let services = services
            .iter()
            .map(|(name, config)| self.build_service(name, config).map(|s| (name.clone(), s)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(ServiceDirectory { services })
    }
}

/// Every service of a catalog, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    services: BTreeMap<String, Service>,
}

impl ServiceDirectory {
    /// Compile the catalog's models and services against `pipeline`.
    pub fn from_catalog(catalog: &Catalog, pipeline: RequestPipeline) -> Result<Self> {
        let marshaller = Marshaller::new(Arc::new(catalog.registry()?));
        ServiceFactory::new(pipeline, marshaller).build_all(&catalog.services)
    }

    pub fn get(&self, name: &str) -> Result<&Service> {
        self.services
            .get(name)
            .ok_or_else(|| GatewayError::UnknownService(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Resolve `service.method` and call it.
    pub async fn call(&self, service: &str, method: &str, params: Params, options: RequestOptions) -> Result<ServiceResult> {
        self.get(service)?.call(method, params, options).await
    }
}
