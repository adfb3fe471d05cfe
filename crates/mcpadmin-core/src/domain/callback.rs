//! OAuth return-URL parsing
//!
//! The provider sends the user agent back to the `return_path` handed to
//! `/oauth/connect`, with the server id and outcome in the query string.
//! Older return URLs carry a `trigger_fetch` flag, newer ones only the
//! `server_id`; both are accepted.

use url::Url;

use super::ServerId;
use crate::error::AuthError;

/// Outcome of an OAuth round-trip, as carried by the return URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCallback {
    pub server_id: ServerId,
    pub trigger_fetch: bool,
    /// Provider-reported failure (`error` / `error_description`)
    pub error: Option<String>,
}

impl OAuthCallback {
    /// Parse an absolute URL or a site-relative path with query string
    pub fn from_return_url(raw: &str) -> Result<Self, AuthError> {
        let url = parse_lenient(raw)?;

        let mut server_id = None;
        let mut trigger_fetch = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "server_id" => {
                    let id = value.trim().parse::<i64>().map_err(|_| {
                        AuthError::InvalidCallback(format!("server_id '{}' is not a number", value))
                    })?;
                    server_id = Some(ServerId::new(id));
                }
                "trigger_fetch" => {
                    trigger_fetch = Some(matches!(value.as_ref(), "true" | "1"));
                }
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        let server_id = server_id
            .ok_or_else(|| AuthError::InvalidCallback("missing server_id".to_string()))?;

        let error = match (error, error_description) {
            (Some(code), Some(description)) => Some(format!("{}: {}", code, description)),
            (Some(code), None) => Some(code),
            (None, description) => description,
        };

        Ok(Self {
            server_id,
            // A bare server_id without an error is a completed round-trip
            trigger_fetch: trigger_fetch.unwrap_or(error.is_none()),
            error,
        })
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

fn parse_lenient(raw: &str) -> Result<Url, AuthError> {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("http://localhost/")
                .map_err(|e| AuthError::InvalidCallback(e.to_string()))?;
            base.join(raw)
                .map_err(|e| AuthError::InvalidCallback(format!("'{}': {}", raw, e)))
        }
        Err(e) => Err(AuthError::InvalidCallback(format!("'{}': {}", raw, e))),
    }
}
