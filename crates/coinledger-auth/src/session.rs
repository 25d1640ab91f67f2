//! Session manager
//!
//! The single source of truth for who is logged in. Composes the credential
//! store with the remote authority and owns the refresh gate that coalesces
//! concurrent refreshes.

use coinledger_store::{CredentialStore, Session};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::authority::AuthAuthority;
use crate::error::AuthError;
use crate::normalize::{self, TokenGrant};

/// Session lifecycle manager
pub struct SessionManager {
    store: CredentialStore,
    authority: Arc<dyn AuthAuthority>,
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: CredentialStore, authority: Arc<dyn AuthAuthority>) -> Self {
        Self {
            store,
            authority,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Log in and store the resulting session
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        let body = self.authority.login(identifier, secret).await?;
        let mut session = normalize::session_from_login(&body)?;
        if session.email.is_none() {
            session.email = Some(identifier.to_string());
        }

        self.store.save(&session)?;

        info!(
            "Logged in as {} (role: {})",
            identifier,
            session.role.as_ref().map(|r| r.as_str()).unwrap_or("none")
        );
        Ok(session)
    }

    /// End the session
    ///
    /// The authority is notified on a best-effort basis; the local session
    /// is cleared whatever happens remotely.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Some(session) = self.store.load()
            && let Err(e) = self.authority.logout(&session.access_token).await
        {
            warn!("Logout notification failed: {}", e);
        }

        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        let current = self.store.load().ok_or(AuthError::NoSession)?;
        self.exchange(current).await
    }

    /// Refresh on behalf of a request rejected with `rejected_token`
    ///
    /// If another caller already replaced that token while we waited for the
    /// gate, the stored session is returned without a second refresh.
    pub async fn refresh_if_stale(&self, rejected_token: &str) -> Result<Session, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        let current = self.store.load().ok_or(AuthError::NoSession)?;

        if current.access_token != rejected_token {
            debug!("Access token already refreshed by a concurrent request");
            return Ok(current);
        }

        self.exchange(current).await
    }

    /// Must be called with the refresh gate held
    async fn exchange(&self, current: Session) -> Result<Session, AuthError> {
        let grant = match self.request_grant(&current).await {
            Ok(grant) => grant,
            Err(e) => {
                // Cleared before the gate is released so waiters find no
                // session and never reuse the rejected refresh token
                self.discard(&current);
                return Err(e);
            }
        };

        // A logout while the exchange was in flight wins
        match self.store.load() {
            Some(stored) if stored.access_token == current.access_token => {}
            _ => {
                debug!("Session changed during refresh, discarding new token");
                return Err(AuthError::NoSession);
            }
        }

        let session = current.refreshed(grant.access_token, grant.refresh_token);
        self.store.save(&session)?;

        info!("Access token refreshed");
        Ok(session)
    }

    async fn request_grant(&self, current: &Session) -> Result<TokenGrant, AuthError> {
        let body = self
            .authority
            .refresh(current.refresh_token.as_deref())
            .await?;

        normalize::token_grant(&body).ok_or_else(|| {
            AuthError::RefreshFailed("refresh response carried no access token".to_string())
        })
    }

    /// Clear the store if it still holds `failed`
    fn discard(&self, failed: &Session) {
        let still_current = self
            .store
            .load()
            .is_some_and(|stored| stored.access_token == failed.access_token);
        if !still_current {
            return;
        }

        match self.store.clear() {
            Ok(()) => info!("Session ended after failed refresh"),
            Err(e) => warn!("Failed to clear session after failed refresh: {}", e),
        }
    }

    pub fn current_user(&self) -> Option<Session> {
        self.store.load()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.load().is_some()
    }

    /// Case-insensitive role check; false without a session
    pub fn has_role(&self, candidate: &str) -> bool {
        self.store
            .load()
            .is_some_and(|session| session.has_role(candidate))
    }

    /// Current bearer credential, if logged in
    pub fn access_token(&self) -> Option<String> {
        self.store.load().map(|session| session.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{
        AuthorityConfig, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH,
        HttpAuthority,
    };
    use async_trait::async_trait;
    use serde_json::{Value, json};

    fn session_manager(server: &mockito::Server) -> (SessionManager, CredentialStore) {
        let store = CredentialStore::in_memory();
        let authority = HttpAuthority::new(AuthorityConfig::new(server.url())).unwrap();
        (SessionManager::new(store.clone(), Arc::new(authority)), store)
    }

    #[tokio::test]
    async fn test_login_stores_normalized_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DEFAULT_LOGIN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"a1","refresh_token":"r1","role":"Core","permissions":["transfer"]}"#,
            )
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        assert!(!manager.is_authenticated());

        let session = manager.login("core@example.com", "pw").await.unwrap();
        assert_eq!(session.access_token, "a1");
        assert_eq!(session.email.as_deref(), Some("core@example.com"));
        assert_eq!(store.load(), Some(session));
        assert!(manager.is_authenticated());
        assert!(manager.has_role("core"));
        assert!(manager.has_role("CORE"));
        assert!(!manager.has_role("admin"));
    }

    #[tokio::test]
    async fn test_login_without_token_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DEFAULT_LOGIN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"role":"admin"}"#)
            .create_async()
            .await;

        let (manager, _) = session_manager(&server);
        let err = manager.login("a@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_anonymous() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DEFAULT_LOGIN_PATH)
            .with_status(401)
            .create_async()
            .await;

        let (manager, _) = session_manager(&server);
        let err = manager.login("a@example.com", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_remote_fails() {
        let mut server = mockito::Server::new_async().await;
        let logout = server
            .mock("POST", DEFAULT_LOGOUT_PATH)
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        store.save(&Session::new("a1").with_role("user")).unwrap();

        manager.logout().await.unwrap();
        assert!(manager.current_user().is_none());
        logout.assert_async().await;

        // Idempotent, and no remote call without a session
        manager.logout().await.unwrap();
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_when_authority_unreachable() {
        let store = CredentialStore::in_memory();
        let authority =
            HttpAuthority::new(AuthorityConfig::new("http://127.0.0.1:1")).unwrap();
        let manager = SessionManager::new(store.clone(), Arc::new(authority));
        store.save(&Session::new("a1")).unwrap();

        manager.logout().await.unwrap();
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_refresh_replaces_access_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DEFAULT_REFRESH_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"a2","refreshToken":"r2"}"#)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        store
            .save(&Session::new("a1").with_refresh_token("r1").with_role("admin"))
            .unwrap();

        let session = manager.refresh().await.unwrap();
        assert_eq!(session.access_token, "a2");
        assert_eq!(session.refresh_token.as_deref(), Some("r2"));
        assert!(session.has_role("admin"));
        assert_eq!(manager.access_token().as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn test_refresh_rejected_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DEFAULT_REFRESH_PATH)
            .with_status(401)
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        store.save(&Session::new("a1").with_refresh_token("r1")).unwrap();

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshRejected { status: 401 }));
        assert!(err.is_terminal());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_is_not_repeated_by_waiters() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", DEFAULT_REFRESH_PATH)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        store.save(&Session::new("a1").with_refresh_token("r1")).unwrap();

        let (first, second) =
            tokio::join!(manager.refresh_if_stale("a1"), manager.refresh_if_stale("a1"));
        let errors = [first.unwrap_err(), second.unwrap_err()];
        assert!(errors.iter().all(AuthError::is_terminal));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, AuthError::RefreshRejected { status: 401 }))
        );
        assert!(errors.iter().any(|e| matches!(e, AuthError::NoSession)));
        assert!(store.load().is_none());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_without_token_in_reply_ends_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DEFAULT_REFRESH_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        store.save(&Session::new("a1").with_refresh_token("r1")).unwrap();

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let server = mockito::Server::new_async().await;
        let (manager, _) = session_manager(&server);

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::NoSession));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_coalesced() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", DEFAULT_REFRESH_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"accessToken":"a2"}"#)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = session_manager(&server);
        store.save(&Session::new("a1").with_refresh_token("r1")).unwrap();

        let (first, second) =
            tokio::join!(manager.refresh_if_stale("a1"), manager.refresh_if_stale("a1"));
        assert_eq!(first.unwrap().access_token, "a2");
        assert_eq!(second.unwrap().access_token, "a2");
        refresh.assert_async().await;
    }

    /// Authority whose refresh logs the user out while the exchange is in flight
    struct LogoutDuringRefresh {
        store: CredentialStore,
    }

    #[async_trait]
    impl AuthAuthority for LogoutDuringRefresh {
        async fn login(&self, _: &str, _: &str) -> Result<Value, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn refresh(&self, _: Option<&str>) -> Result<Value, AuthError> {
            self.store.clear()?;
            Ok(json!({"token": "resurrected"}))
        }

        async fn logout(&self, _: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logout_during_refresh_wins() {
        let store = CredentialStore::in_memory();
        let manager = SessionManager::new(
            store.clone(),
            Arc::new(LogoutDuringRefresh {
                store: store.clone(),
            }),
        );
        store.save(&Session::new("a1")).unwrap();

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::NoSession));
        assert!(manager.current_user().is_none());
    }
}
