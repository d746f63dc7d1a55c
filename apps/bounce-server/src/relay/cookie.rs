//! `clientID` cookie plumbing on the upgrade boundary.

use axum::http::header::{HeaderMap, HeaderValue, COOKIE};

pub const COOKIE_NAME: &str = "clientID";

/// 100 years.
pub const COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365 * 100;

/// Reads the `clientID` cookie from the request headers.
pub fn client_id(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == COOKIE_NAME {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// The request's `clientID`, or a freshly minted one if the cookie is
/// missing, empty, or not a plain printable token.
pub fn client_id_or_new(headers: &HeaderMap) -> String {
    client_id(headers)
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_graphic() && c != ';'))
        .unwrap_or_else(bounce_common::id::mint_client_id)
}

/// Builds the `Set-Cookie` value for the upgrade response. An empty id annuls
/// the cookie with a negative max-age.
pub fn set_cookie(client_id: &str) -> HeaderValue {
    let max_age = if client_id.is_empty() {
        -1
    } else {
        COOKIE_MAX_AGE_SECS
    };
    let cookie = format!("{COOKIE_NAME}={client_id}; Path=/; Max-Age={max_age}");
    HeaderValue::from_str(&cookie).expect("cookie value is printable ASCII")
}
