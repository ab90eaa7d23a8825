//! Bearer credential admission for the WebSocket upgrade.
//!
//! Only the structure and the `exp` claim are checked; the signature is not
//! verified. This server is a development collaborator, not an identity
//! provider.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BearerError {
    #[error("no bearer credential presented")]
    Missing,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential expired")]
    Expired,
}

/// User admitted by a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Admit the value of an `Authorization` header.
///
/// # Errors
///
/// - `Missing` if there is no `Bearer` value
/// - `Malformed` if the credential is not three segments with a decodable
///   claims record carrying a `sub`
/// - `Expired` if `exp` (seconds) is earlier than `now_millis`
pub fn authenticate(header: Option<&str>, now_millis: i64) -> Result<AuthenticatedUser, BearerError> {
    let token = header
        .and_then(|h| {
            let (scheme, token) = h.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|t| !t.is_empty())
        .ok_or(BearerError::Missing)?;

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(BearerError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let normalized = segments[1]
        .replace('+', "-")
        .replace('/', "_")
        .trim_end_matches('=')
        .to_string();
    let bytes = URL_SAFE_NO_PAD
        .decode(normalized)
        .map_err(|e| BearerError::Malformed(e.to_string()))?;
    let claims: Value =
        serde_json::from_slice(&bytes).map_err(|e| BearerError::Malformed(e.to_string()))?;

    let user_id = match claims.get("sub") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(BearerError::Malformed("no subject claim".to_string())),
    };

    match claims.get("exp") {
        None | Some(Value::Null) => {}
        Some(exp) => {
            let exp = exp
                .as_f64()
                .ok_or_else(|| BearerError::Malformed("exp is not numeric".to_string()))?;
            if (exp * 1000.0) < now_millis as f64 {
                return Err(BearerError::Expired);
            }
        }
    }

    Ok(AuthenticatedUser { user_id })
}
