//! Authority response normalization
//!
//! The authority is not consistent about field names: the access token may
//! arrive as `token`, `accessToken` or `access_token`. Everything past this
//! module only sees the canonical [`Session`] fields.

use coinledger_store::{Role, Session};
use serde_json::Value;

use crate::error::AuthError;

/// Accepted access token field names, in lookup order
pub const ACCESS_TOKEN_FIELDS: [&str; 3] = ["token", "accessToken", "access_token"];

/// Accepted refresh token field names, in lookup order
pub const REFRESH_TOKEN_FIELDS: [&str; 2] = ["refreshToken", "refresh_token"];

const PERMISSION_FIELDS: [&str; 2] = ["permissions", "userPermissions"];
const USER_ID_FIELDS: [&str; 3] = ["id", "userId", "ownerId"];

/// Tokens returned by a login or refresh exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// First non-empty string among `fields`
fn first_string(body: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| body.get(*f))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extract the token pair from a response body
pub fn token_grant(body: &Value) -> Option<TokenGrant> {
    let access_token = first_string(body, &ACCESS_TOKEN_FIELDS)?;
    Some(TokenGrant {
        access_token,
        refresh_token: first_string(body, &REFRESH_TOKEN_FIELDS),
    })
}

fn permissions(body: &Value) -> Vec<String> {
    PERMISSION_FIELDS
        .iter()
        .filter_map(|f| body.get(*f))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn user_id(body: &Value) -> Option<String> {
    USER_ID_FIELDS
        .iter()
        .filter_map(|f| body.get(*f))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Build a session from a login response body
pub fn session_from_login(body: &Value) -> Result<Session, AuthError> {
    if !body.is_object() {
        return Err(AuthError::MalformedResponse(
            "login response is not a JSON object".to_string(),
        ));
    }

    let grant = token_grant(body).ok_or_else(|| {
        AuthError::MalformedResponse("no access token found in login response".to_string())
    })?;

    let mut session = Session::new(grant.access_token).with_permissions(permissions(body));
    session.refresh_token = grant.refresh_token;
    session.role = body
        .get("role")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .map(Role::parse);
    session.user_id = user_id(body);
    session.email = body.get("email").and_then(Value::as_str).map(str::to_string);

    Ok(session)
}
