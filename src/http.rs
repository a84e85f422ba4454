// src/http.rs
//
// HTTP client construction shared by both providers. One client per
// endpoint; reqwest pools connections underneath.

use anyhow::{Context, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    /// Whole-request timeout; bounds each chunk upload, not the whole object.
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
    pub pool_idle_timeout: Option<Duration>,
    /// Accept self-signed certificates. For lab endpoints only.
    pub allow_insecure_tls: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            tcp_keepalive: Some(Duration::from_secs(60)),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            allow_insecure_tls: false,
        }
    }
}

impl HttpClientConfig {
    pub fn with_insecure_tls(mut self, allow: bool) -> Self {
        self.allow_insecure_tls = allow;
        self
    }
}

/// Build a reqwest client from the config.
pub fn build_client(config: &HttpClientConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .tcp_nodelay(true)
        .use_rustls_tls();

    if let Some(keepalive) = config.tcp_keepalive {
        builder = builder.tcp_keepalive(keepalive);
    }
    if let Some(idle) = config.pool_idle_timeout {
        builder = builder.pool_idle_timeout(idle);
    }
    if config.allow_insecure_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build().context("Failed to build HTTP client")
}
