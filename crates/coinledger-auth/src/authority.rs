//! Remote authentication authority

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::AuthError;

/// Default login endpoint path
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";
/// Default refresh endpoint path
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh";
/// Default logout endpoint path
pub const DEFAULT_LOGOUT_PATH: &str = "/api/auth/logout";

/// Resolve `path` against `base`. Absolute URLs are returned unchanged.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Url::parse(path);
    }

    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        Url::parse(&format!("{}{}", base, path))
    } else {
        Url::parse(&format!("{}/{}", base, path))
    }
}

/// Remote authority that issues and renews sessions
///
/// Implementations return raw response bodies; field normalization happens
/// in the session manager.
#[async_trait]
pub trait AuthAuthority: Send + Sync {
    /// Exchange credentials for a login response body.
    /// Rejected credentials yield [`AuthError::InvalidCredentials`].
    async fn login(&self, identifier: &str, secret: &str) -> Result<Value, AuthError>;

    /// Exchange a refresh token for a refresh response body.
    /// Every failure is a refresh error.
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<Value, AuthError>;

    /// Tell the authority the session is over
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;
}

/// HTTP authority configuration
#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    /// Base URL of the ledger API
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl AuthorityConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            timeout: Duration::from_secs(30),
            skip_tls_verify: false,
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// Authority reached over HTTP
pub struct HttpAuthority {
    config: AuthorityConfig,
    client: Client,
}

impl HttpAuthority {
    pub fn new(config: AuthorityConfig) -> Result<Self, AuthError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created authority client for {}", config.base_url);

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        Ok(endpoint_url(&self.config.base_url, path)?)
    }
}

#[async_trait]
impl AuthAuthority for HttpAuthority {
    async fn login(&self, identifier: &str, secret: &str) -> Result<Value, AuthError> {
        let url = self.url(&self.config.login_path)?;
        debug!("Attempting login at {}", url);

        let response = self
            .client
            .post(url)
            .json(&LoginRequest {
                email: identifier,
                password: secret,
            })
            .send()
            .await?;
        let status = response.status();

        if matches!(
            status,
            StatusCode::BAD_REQUEST
                | StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::NOT_FOUND
                | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            debug!("Login rejected with status {}", status);
            return Err(AuthError::InvalidCredentials);
        }

        if !status.is_success() {
            return Err(AuthError::UpstreamError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> Result<Value, AuthError> {
        let url = self
            .url(&self.config.refresh_path)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        debug!("Refreshing access token at {}", url);

        let response = self
            .client
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        let status = response.status();

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "authority returned {}",
                status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.url(&self.config.logout_path)?;
        debug!("Notifying logout at {}", url);

        let response = self.client.post(url).bearer_auth(access_token).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AuthError::UpstreamError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}
