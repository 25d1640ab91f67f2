//! Authenticated transport
//!
//! Every call to the ledger API goes through [`AuthTransport`]. It attaches
//! the bearer token of the current session and, when a request is rejected
//! with 401, refreshes the session once and re-issues the request once. A
//! second rejection, a failed refresh, or a rejection with no session ends
//! the session and sends the user back to login.

use bytes::Bytes;
use coinledger_auth::{AuthError, Destination, Navigator, SessionManager, endpoint_url};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;

/// Transport configuration
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Base URL of the ledger API
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            skip_tls_verify: false,
        }
    }
}

/// Outbound request descriptor
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A request in flight, with its single-use retry flag
#[derive(Debug)]
struct PendingRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    retried: bool,
}

impl PendingRequest {
    fn new(request: ApiRequest, url: Url) -> Self {
        let mut headers = request.headers;
        // The transport owns the credential
        headers.remove(AUTHORIZATION);

        Self {
            method: request.method,
            url,
            headers,
            body: request.body,
            retried: false,
        }
    }
}

/// Authenticated HTTP transport
pub struct AuthTransport {
    config: TransportConfig,
    client: Client,
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
}

impl AuthTransport {
    pub fn new(
        config: TransportConfig,
        session: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created API transport for {}", config.base_url);

        Ok(Self {
            config,
            client,
            session,
            navigator,
        })
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self
            .client
            .request(pending.method.clone(), pending.url.clone())
            .headers(pending.headers.clone());

        if let Some(body) = &pending.body {
            request = request.body(body.clone());
        }

        if let Some(token) = token {
            request = request.bearer_auth(token);
        } else {
            debug!("No session, sending {} {} without a token", pending.method, pending.url);
        }

        Ok(request.send().await?)
    }

    /// End the session and send the user to login
    async fn force_logout(&self) {
        if let Err(e) = self.session.logout().await {
            warn!("Failed to clear session: {}", e);
        }
        self.navigator.navigate(Destination::Login { return_to: None });
    }

    /// Send a request, refreshing and retrying once on 401
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let url = endpoint_url(&self.config.base_url, &request.path)?;
        let mut pending = PendingRequest::new(request, url);

        loop {
            let token = self.session.access_token();
            debug!("{} {}", pending.method, pending.url);
            let response = self.dispatch(&pending, token.as_deref()).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if pending.retried {
                warn!("{} still unauthorized after token refresh", pending.url);
                self.force_logout().await;
                return Err(AuthError::Unauthorized.into());
            }
            pending.retried = true;

            let Some(rejected) = token else {
                debug!("{} requires a session", pending.url);
                self.force_logout().await;
                return Err(AuthError::Unauthorized.into());
            };

            if let Err(e) = self.session.refresh_if_stale(&rejected).await {
                warn!("Session refresh failed: {}", e);
                self.force_logout().await;
                return Err(e.into());
            }

            debug!("Retrying {} with refreshed token", pending.url);
        }
    }

    /// Send and require a success status
    pub async fn send_checked(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path));
        }

        if !status.is_success() {
            return Err(ClientError::UpstreamError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send_checked(ApiRequest::get(path)).await?;
        decode(response).await
    }

    /// POST a JSON body and decode the JSON reply
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send_checked(ApiRequest::post(path).json(body)?).await?;
        decode(response).await
    }

    /// DELETE a resource, ignoring any reply body
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send_checked(ApiRequest::delete(path)).await?;
        Ok(())
    }
}

/// Decode a JSON body. An empty body decodes as `null`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await?;
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &body
    };

    serde_json::from_slice(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
