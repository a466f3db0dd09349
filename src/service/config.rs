use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{Method, PaginationStyle};

/// Declarative description of one REST resource.
///
/// ```yaml
/// Projects:
///   url: /api/projects
///   view_set: true
///   model: Project
///   pagination: results
///   methods:
///     listAll:
///       url: /api/projects/list_all/
///       model: Project
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Base URL of the resource; required when `view_set` is enabled.
    pub url: Option<String>,
    pub view_set: ViewSet,
    pub model: Option<String>,
    /// Applies to the generated `list` method.
    pub pagination: PaginationStyle,
    pub page_param: Option<String>,
    /// Applies to the generated `list` method.
    pub query_params: QueryParamMap,
    pub encode_path_params: Option<bool>,
    /// Share in-flight responses of the generated GET methods.
    pub cache: bool,
    /// Explicit methods; these replace generated ones of the same name.
    pub methods: BTreeMap<String, MethodConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MethodConfig {
    pub url: String,
    pub request_type: Method,
    pub model: Option<String>,
    pub query_params: QueryParamMap,
    pub body_params: Option<BodyParams>,
    pub pagination: PaginationStyle,
    pub page_param: Option<String>,
    pub encode_path_params: Option<bool>,
    pub cache: bool,
}

/// Body routing of a POST/PUT method. Without a name the body is every
/// parameter the path and query did not consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BodyParams {
    pub name: Option<String>,
}

impl BodyParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }
}

/// `true`/`false`, or the subset of conventional methods to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewSet {
    Enabled(bool),
    Only(Vec<ViewSetMethod>),
}

impl Default for ViewSet {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl ViewSet {
    pub fn methods(&self) -> Vec<ViewSetMethod> {
        match self {
            Self::Enabled(true) => ViewSetMethod::ALL.to_vec(),
            Self::Enabled(false) => Vec::new(),
            Self::Only(methods) => methods.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSetMethod {
    List,
    Create,
    Retrieve,
    Update,
    Delete,
}

impl ViewSetMethod {
    pub const ALL: [ViewSetMethod; 5] = [Self::List, Self::Create, Self::Retrieve, Self::Update, Self::Delete];

    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Retrieve => "retrieve",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn request_type(&self) -> Method {
        match self {
            Self::List | Self::Retrieve => Method::Get,
            Self::Create => Method::Post,
            Self::Update => Method::Put,
            Self::Delete => Method::Delete,
        }
    }

    /// The method this convention generates for a resource at `base_url`.
    pub fn expand(&self, base_url: &str, service: &ServiceConfig) -> MethodConfig {
        let base = base_url.trim_end_matches('/');
        let url = match self {
            Self::List | Self::Create => format!("{base}/"),
            Self::Retrieve | Self::Update | Self::Delete => format!("{base}/<lookup>/"),
        };
        let body_params = match self {
            Self::Create | Self::Update => Some(BodyParams::named("data")),
            _ => None,
        };
        let is_list = *self == Self::List;
        MethodConfig {
            url,
            request_type: self.request_type(),
            model: match self {
                Self::Delete => None,
                _ => service.model.clone(),
            },
            query_params: if is_list { service.query_params.clone() } else { QueryParamMap::default() },
            body_params,
            pagination: if is_list { service.pagination } else { PaginationStyle::None },
            page_param: service.page_param.clone(),
            encode_path_params: service.encode_path_params,
            cache: service.cache && self.request_type() == Method::Get,
        }
    }
}

/// Declared query parameters: a list of names sent as-is, or a map from
/// parameter name to query-string name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParamMap {
    Names(Vec<String>),
    Renamed(BTreeMap<String, String>),
}

impl Default for QueryParamMap {
    fn default() -> Self {
        Self::Names(Vec::new())
    }
}

impl QueryParamMap {
    /// `(parameter, query name)` pairs.
    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Names(names) => names.iter().map(|n| (n.clone(), n.clone())).collect(),
            Self::Renamed(map) => map.iter().map(|(p, q)| (p.clone(), q.clone())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Names(names) => names.is_empty(),
            Self::Renamed(map) => map.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_view_set_forms() {
        let all: ServiceConfig = serde_yaml::from_str("url: /api/things\nview_set: true").unwrap();
        assert_eq!(all.view_set.methods().len(), 5);

        let some: ServiceConfig = serde_yaml::from_str("url: /api/things\nview_set: [list, retrieve]").unwrap();
        assert_eq!(some.view_set.methods(), vec![ViewSetMethod::List, ViewSetMethod::Retrieve]);

        let none: ServiceConfig = serde_yaml::from_str("url: /api/things").unwrap();
        assert!(none.view_set.methods().is_empty());
    }

    #[test]
    fn test_view_set_expansion() {
        let service: ServiceConfig = serde_yaml::from_str(
            "url: /api/things/\nmodel: Thing\npagination: results\nquery_params: [owner]\ncache: true",
        )
        .unwrap();

        let list = ViewSetMethod::List.expand("/api/things/", &service);
        assert_eq!(list.url, "/api/things/");
        assert_eq!(list.pagination, PaginationStyle::Results);
        assert_eq!(list.query_params, QueryParamMap::Names(vec!["owner".into()]));
        assert!(list.cache);

        let update = ViewSetMethod::Update.expand("/api/things/", &service);
        assert_eq!(update.url, "/api/things/<lookup>/");
        assert_eq!(update.request_type, Method::Put);
        assert_eq!(update.body_params, Some(BodyParams::named("data")));
        assert!(!update.cache);

        let delete = ViewSetMethod::Delete.expand("/api/things", &service);
        assert_eq!(delete.model, None);
        assert_eq!(delete.request_type, Method::Delete);
    }

    #[test]
    fn test_query_param_forms() {
        let names: QueryParamMap = serde_yaml::from_str("[limit, offset]").unwrap();
        assert_eq!(names.pairs()[0], ("limit".to_string(), "limit".to_string()));

        let renamed: QueryParamMap = serde_yaml::from_str("searchText: q").unwrap();
        assert_eq!(renamed.pairs(), vec![("searchText".to_string(), "q".to_string())]);
    }

    #[test]
    fn test_unknown_method_keys_are_rejected() {
        let result: Result<MethodConfig, _> = serde_yaml::from_str("url: /x\nverb: get");
        assert!(result.is_err());
    }
}
