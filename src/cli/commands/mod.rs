pub mod call;
pub mod config;
pub mod models;
pub mod services;
pub mod version;

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::Result;
use crate::service::{Catalog, ServiceDirectory};

/// Portal URL used when services are only listed, never called.
const OFFLINE_BASE_URL: &str = "http://localhost/";

/// The catalog named on the command line, or the configured one.
pub(crate) fn load_catalog(options: &GlobalOptions, config: &Config) -> Result<Catalog> {
    let source = options.catalog.as_deref().unwrap_or(&config.server.catalog);
    log::debug!("Loading catalog {}", source);
    Catalog::load(source)
}

/// Compile the catalog's services. With `online == false` a missing portal
/// URL is tolerated, since nothing will be requested.
pub(crate) fn load_directory(options: &GlobalOptions, config: &Config, online: bool) -> Result<ServiceDirectory> {
    let catalog = load_catalog(options, config)?;
    let base_url = match options.base_url.as_deref() {
        Some(url) => Some(url),
        None if online || config.server.base_url.is_some() => None,
        None => Some(OFFLINE_BASE_URL),
    };
    let pipeline = config.pipeline(base_url)?;
    ServiceDirectory::from_catalog(&catalog, pipeline)
}
