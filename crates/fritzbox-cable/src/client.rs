use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::trace;
use url::Url;

use crate::config::RouterConfig;
use crate::error::{Error, Result};

/// Receives one call per router request that produced an HTTP response.
///
/// Requests failing below HTTP (connect errors, timeouts) are not observed.
pub trait RequestObserver: Send + Sync {
    fn observe(&self, method: &Method, status: StatusCode, elapsed: Duration);
}

/// HTTP access to the router's web interface.
///
/// Resource names such as `login_sid.lua` are resolved relative to the
/// configured base URL.
#[derive(Clone)]
pub struct RouterClient {
    client: Client,
    base_url: Url,
    observer: Option<Arc<dyn RequestObserver>>,
}

impl std::fmt::Debug for RouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterClient")
            .field("base_url", &self.base_url.as_str())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl RouterClient {
    /// Create a client from `config`.
    pub fn new(config: &RouterConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            base_url: config.parsed_base_url()?,
            observer: None,
        })
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            observer: None,
        }
    }

    /// Report every response to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `resource` against the base URL.
    pub fn endpoint(&self, resource: &str) -> Result<Url> {
        self.base_url
            .join(resource.trim_start_matches('/'))
            .map_err(|e| Error::invalid_url(resource, e.to_string()))
    }

    /// Send a `GET` for `resource`.
    pub async fn get(&self, resource: &str) -> Result<(Url, Response)> {
        let url = self.endpoint(resource)?;
        let response = self
            .send(Method::GET, self.client.get(url.clone()))
            .await?;
        Ok((url, response))
    }

    /// Send `form` url-encoded as a `POST` to `resource`.
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        resource: &str,
        form: &T,
    ) -> Result<(Url, Response)> {
        let url = self.endpoint(resource)?;
        let response = self
            .send(Method::POST, self.client.post(url.clone()).form(form))
            .await?;
        Ok((url, response))
    }

    async fn send(&self, method: Method, request: RequestBuilder) -> Result<Response> {
        let started = Instant::now();
        let response = request.send().await?;
        let elapsed = started.elapsed();

        trace!(
            method = %method,
            url = %response.url(),
            status = response.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "router request finished"
        );

        if let Some(observer) = &self.observer {
            observer.observe(&method, response.status(), elapsed);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        let client = RouterClient::new(&RouterConfig::new("http://192.168.178.1")).unwrap();
        assert_eq!(
            client.endpoint("login_sid.lua").unwrap().as_str(),
            "http://192.168.178.1/login_sid.lua"
        );
        assert_eq!(
            client.endpoint("/data.lua").unwrap().as_str(),
            "http://192.168.178.1/data.lua"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = RouterClient::new(&RouterConfig::new("http://router.local/fritz")).unwrap();
        assert_eq!(
            client.endpoint("data.lua").unwrap().as_str(),
            "http://router.local/fritz/data.lua"
        );
    }
}
