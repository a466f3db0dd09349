//! Declarative REST client and model marshalling for science gateway
//! portals.
//!
//! A [`service::Catalog`] declares enums, models and services. Models are
//! decoded by a [`model::Marshaller`]; services are compiled by a
//! [`service::ServiceFactory`] into methods that go through the
//! [`api::RequestPipeline`].

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod progress;
pub mod service;

pub use api::{RequestOptions, RequestPipeline};
pub use error::{GatewayError, RequestError, Result};
pub use model::{Marshaller, Model, SchemaRegistry};
pub use service::{Catalog, ServiceDirectory, ServiceResult};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

#[cfg(test)]
mod error_test;
