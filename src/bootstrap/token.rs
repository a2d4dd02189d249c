//! Token extraction from helper output

use crate::Error;

/// Line the token script prints right before the token
pub const TOKEN_MARKER: &str = "CUT HERE";

/// Everything after the first [`TOKEN_MARKER`], trimmed.
///
/// Output printed before the marker (daemon chatter, shell tracing) is
/// discarded. A helper that has not reached the marker yet is reported as
/// [`Error::TokenMarkerNotFound`] rather than an empty token.
pub fn extract_token(output: &str) -> Result<String, Error> {
    output
        .split_once(TOKEN_MARKER)
        .map(|(_, token)| token.trim().to_string())
        .ok_or(Error::TokenMarkerNotFound {
            marker: TOKEN_MARKER,
        })
}
