use bytes::Bytes;
use tracing::debug;

use crate::client::RouterClient;
use crate::error::{Error, Result};
use crate::session::Session;

pub const DATA_RESOURCE: &str = "data.lua";

/// Page id of the DOCSIS information view.
pub const DOC_INFO_PAGE: &str = "docInfo";

/// Retrieve the raw statistics payload behind `resource`.
///
/// The body is returned untouched; decoding is left to the caller.
pub async fn fetch(client: &RouterClient, resource: &str, session: &Session) -> Result<Bytes> {
    let form = [
        ("xhr", "1"),
        ("sid", session.session_id.as_str()),
        ("lang", "de"),
        ("page", DOC_INFO_PAGE),
        ("xhrId", "all"),
    ];

    let (url, response) = client.post_form(resource, &form).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::fetch(status, url.as_str()));
    }

    let body = response.bytes().await?;
    debug!(url = %url, bytes = body.len(), "fetched statistics");
    Ok(body)
}
