use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a scrape cycle.
///
/// Per-channel field problems are reported separately through
/// [`FieldParseError`](crate::channel::FieldParseError) and never end up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("login request failed with HTTP {status} for {url}")]
    AuthTransport { status: StatusCode, url: String },

    #[error("login rejected by router (block time {block_time}s)")]
    AuthFailed { block_time: u64 },

    #[error("unsupported authentication scheme in challenge `{challenge}`")]
    UnsupportedAuthScheme { challenge: String },

    #[error("fetching statistics failed with HTTP {status} for {url}")]
    Fetch { status: StatusCode, url: String },

    #[error("failed to decode {document}: {reason}")]
    Decode {
        document: &'static str,
        reason: String,
    },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("invalid router URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("metrics registry error: {source}")]
    Registry {
        #[from]
        source: prometheus::Error,
    },

    #[error("failed to encode metrics: {reason}")]
    Encode { reason: String },
}

impl Error {
    pub fn auth_transport(status: StatusCode, url: impl Into<String>) -> Self {
        Self::AuthTransport {
            status,
            url: url.into(),
        }
    }

    pub fn fetch(status: StatusCode, url: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            url: url.into(),
        }
    }

    pub fn decode(document: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            document,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure happened during the login handshake.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::AuthTransport { .. } | Self::AuthFailed { .. } | Self::UnsupportedAuthScheme { .. }
        )
    }

    /// Short, stable name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthTransport { .. } => "auth_transport",
            Self::AuthFailed { .. } => "auth_failed",
            Self::UnsupportedAuthScheme { .. } => "unsupported_auth_scheme",
            Self::Fetch { .. } => "fetch",
            Self::Decode { .. } => "decode",
            Self::Network { .. } => "network",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Registry { .. } => "registry",
            Self::Encode { .. } => "encode",
        }
    }
}
