pub mod formatter;

pub use formatter::{Formatter, PageSummary};

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::model::Model;
use crate::service::ServiceResult;

/// Format a service result based on the specified format
pub fn format_result(result: &ServiceResult, format: OutputFormat) -> Result<String> {
    Formatter::new(format).format_result(result)
}

/// Format every model collected across pages
pub fn format_models(models: &[Model], format: OutputFormat) -> Result<String> {
    let summary = PageSummary {
        count: Some(models.len() as u64),
        shown: models.len(),
        has_next: false,
    };
    Formatter::new(format).format_models(models, Some(summary))
}
