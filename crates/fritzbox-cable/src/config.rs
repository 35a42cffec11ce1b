use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://192.168.178.1/";

pub const DEFAULT_USERNAME: &str = "admin";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(50);

pub const DEFAULT_USER_AGENT: &str = concat!("fritzcable-exporter/", env!("CARGO_PKG_VERSION"));

/// Connection settings for the router's web interface.
#[derive(Clone)]
pub struct RouterConfig {
    /// Base URI of the web interface, e.g. `http://192.168.178.1/`
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Timeout applied to every single request (login GET, login POST, data POST)
    pub timeout: Duration,

    /// Skip TLS certificate validation (self-signed router certificates)
    pub danger_accept_invalid_certs: bool,

    pub user_agent: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            username: DEFAULT_USERNAME.to_owned(),
            password: String::new(),
            timeout: DEFAULT_TIMEOUT,
            danger_accept_invalid_certs: false,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

// The password stays out of debug output.
impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl RouterConfig {
    /// Default settings pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Parse the base URL, making sure its path ends with `/` so resource
    /// names are joined below it instead of replacing the last segment.
    pub fn parsed_base_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.base_url.trim())
            .map_err(|e| Error::invalid_url(&self.base_url, e.to_string()))?;

        if url.cannot_be_a_base() {
            return Err(Error::invalid_url(&self.base_url, "URL cannot be a base"));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json,application/xml;q=0.9,*/*;q=0.8"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-DE,de;q=0.9,en;q=0.5"),
        );
        default_headers
    }

    /// Build the HTTP client used for every request to the router.
    pub fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .default_headers(Self::get_default_headers())
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .build()?;
        Ok(client)
    }
}
