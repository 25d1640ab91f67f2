//! Authentication error types

use coinledger_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Malformed authentication response: {0}")]
    MalformedResponse(String),

    #[error("Session expired: refresh token rejected ({status})")]
    RefreshRejected { status: u16 },

    #[error("Session expired: {0}")]
    RefreshFailed(String),

    #[error("No active session")]
    NoSession,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Authority returned error: {status} - {message}")]
    UpstreamError { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Broad classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials rejected or login response unusable; shown on the form
    Authentication,
    /// Session could not be renewed; forces logout
    Refresh,
    /// Request still rejected after the one retry
    Authorization,
    /// Network or protocol failure outside the auth flow
    Transport,
    /// Local credential storage failure
    Storage,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials | AuthError::MalformedResponse(_) => {
                ErrorKind::Authentication
            }
            AuthError::RefreshRejected { .. }
            | AuthError::RefreshFailed(_)
            | AuthError::NoSession => ErrorKind::Refresh,
            AuthError::Unauthorized => ErrorKind::Authorization,
            AuthError::UpstreamError { .. } | AuthError::Http(_) | AuthError::InvalidUrl(_) => {
                ErrorKind::Transport
            }
            AuthError::Store(_) => ErrorKind::Storage,
        }
    }

    /// Whether the session is gone and the user must log in again
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Refresh | ErrorKind::Authorization)
    }
}
