use axum::http::HeaderMap;

use pourline_core::ConnectionId;

/// Header carrying the submitter's realtime connection id.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// The realtime connection a request came from, if the client said so.
///
/// A missing or malformed header means "unknown originator".
pub fn origin(headers: &HeaderMap) -> Option<ConnectionId> {
    let raw = headers.get(CONNECTION_ID_HEADER)?.to_str().ok()?;
    match raw.trim().parse() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::debug!(header = raw, "ignoring malformed connection id");
            None
        }
    }
}
