pub mod context;
pub mod http_client;
pub mod pagination;
pub mod pipeline;
pub mod types;

pub use context::{global_context, BusyIndicator, ErrorSink, InFlightGuard, LogErrorSink, NoopIndicator, PipelineContext};
pub use http_client::HttpSettings;
pub use pagination::{PageSource, PaginationIterator, PaginationStyle};
pub use pipeline::{CsrfSettings, PipelineBuilder, RequestPipeline};
pub use types::{Method, QueryParams, RequestBody, RequestOptions, ResponseBody, ResponseType};
