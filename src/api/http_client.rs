use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Transport settings for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("gateway-client/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Build an HTTP client backed by `jar` for session and CSRF cookies.
///
/// No request timeout is configured: a hung request keeps the busy
/// indicator up until it settles.
pub fn create_client(settings: &HttpSettings, jar: Arc<Jar>) -> Result<Client> {
    ClientBuilder::new()
        .cookie_provider(jar)
        .user_agent(settings.user_agent.clone())
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .pool_idle_timeout(settings.pool_idle_timeout)
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .build()
        .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let jar = Arc::new(Jar::default());
        assert!(create_client(&HttpSettings::default(), jar).is_ok());
    }

    #[test]
    fn test_default_user_agent() {
        let settings = HttpSettings::default();
        assert!(settings.user_agent.starts_with("gateway-client/"));
    }
}
