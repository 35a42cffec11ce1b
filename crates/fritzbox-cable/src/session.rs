//! Challenge-response login against `login_sid.lua`.
//!
//! The router hands out a challenge with every `GET`. The client answers with
//! `<challenge>-<md5>` where the digest covers `<challenge>-<password>` encoded
//! as UTF-16LE. A successful answer yields a session id (`SID`) that
//! authenticates the following data requests.

use md5::{Digest, Md5};
use reqwest::Response;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::RouterClient;
use crate::error::{Error, Result};

pub const LOGIN_RESOURCE: &str = "login_sid.lua";

/// Challenge prefix of the PBKDF2 based login scheme.
const PBKDF2_PREFIX: &str = "2$";

/// Session id the router reports when no session is active.
const INVALID_SID: &str = "0000000000000000";

/// Wire shape of the `SessionInfo` document.
#[derive(Debug, Default, Deserialize)]
struct SessionInfo {
    #[serde(rename = "SID", default)]
    sid: String,
    #[serde(rename = "Challenge", default)]
    challenge: String,
    #[serde(rename = "BlockTime", default)]
    block_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub challenge: String,
    pub session_id: String,
    pub block_time_secs: u64,
}

impl Session {
    /// Decode a `SessionInfo` XML document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let info: SessionInfo =
            quick_xml::de::from_str(xml).map_err(|e| Error::decode(LOGIN_RESOURCE, e))?;

        Ok(Self {
            challenge: info.challenge.trim().to_owned(),
            session_id: info.sid.trim().to_owned(),
            block_time_secs: info.block_time.trim().parse().unwrap_or(0),
        })
    }

    /// Whether the router granted a session.
    pub fn is_valid(&self) -> bool {
        !self.session_id.is_empty() && self.session_id != INVALID_SID
    }

    /// Whether the challenge belongs to the PBKDF2 login scheme.
    pub fn uses_pbkdf2(&self) -> bool {
        self.challenge.starts_with(PBKDF2_PREFIX)
    }
}

/// Compute the legacy MD5 login response for `challenge` and `password`.
pub fn challenge_response(challenge: &str, password: &str) -> String {
    let plain = format!("{challenge}-{password}");
    let utf16le: Vec<u8> = plain
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();

    let mut hasher = Md5::new();
    hasher.update(&utf16le);
    let digest = hasher.finalize();

    format!("{challenge}-{}", hex::encode(digest))
}

/// Performs the login handshake. Holds no session state itself; every call
/// starts a new handshake.
#[derive(Clone)]
pub struct SessionClient {
    client: RouterClient,
    username: String,
    password: String,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("client", &self.client)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SessionClient {
    pub fn new(
        client: RouterClient,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn router(&self) -> &RouterClient {
        &self.client
    }

    /// Run the full handshake and return the granted session.
    pub async fn login(&self) -> Result<Session> {
        let (url, response) = self.client.get(LOGIN_RESOURCE).await?;
        let challenge = read_session(url.as_str(), response).await?;

        if challenge.challenge.is_empty() {
            return Err(Error::decode(LOGIN_RESOURCE, "missing challenge"));
        }

        if challenge.uses_pbkdf2() {
            warn!(
                challenge = %challenge.challenge,
                "router requested PBKDF2 login, which is not supported"
            );
            return Err(Error::UnsupportedAuthScheme {
                challenge: challenge.challenge,
            });
        }

        let response = challenge_response(&challenge.challenge, &self.password);
        debug!(username = %self.username, "answering login challenge");

        let form = [
            ("username", self.username.as_str()),
            ("response", response.as_str()),
        ];
        let (url, confirm) = self.client.post_form(LOGIN_RESOURCE, &form).await?;
        let mut session = read_session(url.as_str(), confirm).await?;

        if !session.is_valid() {
            return Err(Error::AuthFailed {
                block_time: session.block_time_secs,
            });
        }

        // Keep the challenge that was answered, not whatever the confirm page reports.
        session.challenge = challenge.challenge;
        debug!("login succeeded");
        Ok(session)
    }
}

async fn read_session(url: &str, response: Response) -> Result<Session> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::auth_transport(status, url));
    }
    let body = response.text().await?;
    Session::from_xml(&body)
}
