//! Role-based route guard

use coinledger_store::RequiredRole;
use std::sync::Arc;
use tracing::debug;

use crate::navigation::{Destination, Navigator};
use crate::session::SessionManager;

/// Outcome of guarding a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The protected view may render
    Render,
    /// No session: go to login, then come back to `return_to`
    RedirectToLogin { return_to: String },
    /// Session lacks every acceptable role
    RedirectToUnauthorized,
}

impl GuardDecision {
    pub fn destination(&self, location: &str) -> Destination {
        match self {
            GuardDecision::Render => Destination::View(location.to_string()),
            GuardDecision::RedirectToLogin { return_to } => Destination::Login {
                return_to: Some(return_to.clone()),
            },
            GuardDecision::RedirectToUnauthorized => Destination::Unauthorized,
        }
    }
}

/// A protected path and the roles that may reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoute {
    pub path: String,
    pub required: Option<RequiredRole>,
}

/// Table of protected paths
///
/// Paths not listed are public.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<ProtectedRoute>,
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

impl RouteTable {
    pub fn new(routes: Vec<ProtectedRoute>) -> Self {
        Self { routes }
    }

    /// Find the route entry for `location`
    pub fn find(&self, location: &str) -> Option<&ProtectedRoute> {
        let path = normalize_path(location);
        self.routes
            .iter()
            .find(|r| normalize_path(&r.path) == path)
    }

    pub fn routes(&self) -> &[ProtectedRoute] {
        &self.routes
    }
}

/// Gate access to protected views
#[derive(Clone)]
pub struct RouteGuard {
    session: Arc<SessionManager>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Decide whether `location` may render given its role requirement
    pub fn check(&self, location: &str, required: Option<&RequiredRole>) -> GuardDecision {
        let Some(session) = self.session.current_user() else {
            debug!("No session, redirecting {} to login", location);
            return GuardDecision::RedirectToLogin {
                return_to: location.to_string(),
            };
        };

        if let Some(required) = required
            && !required.is_satisfied_by(&session)
        {
            debug!("Session lacks a role required by {}", location);
            return GuardDecision::RedirectToUnauthorized;
        }

        GuardDecision::Render
    }

    /// Check `location` against a route table. Unlisted paths are public.
    pub fn check_route(&self, table: &RouteTable, location: &str) -> GuardDecision {
        match table.find(location) {
            Some(route) => self.check(location, route.required.as_ref()),
            None => GuardDecision::Render,
        }
    }

    /// Apply a decision through the navigator. Returns whether the view renders.
    pub fn enforce(
        &self,
        location: &str,
        required: Option<&RequiredRole>,
        navigator: &dyn Navigator,
    ) -> bool {
        let decision = self.check(location, required);
        let renders = decision == GuardDecision::Render;
        navigator.navigate(decision.destination(location));
        renders
    }

    /// [`RouteGuard::enforce`] with the requirement looked up in a route table
    pub fn enforce_route(
        &self,
        table: &RouteTable,
        location: &str,
        navigator: &dyn Navigator,
    ) -> bool {
        match table.find(location) {
            Some(route) => self.enforce(location, route.required.as_ref(), navigator),
            None => {
                navigator.navigate(Destination::View(location.to_string()));
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{AuthorityConfig, HttpAuthority};
    use crate::navigation::HistoryNavigator;
    use coinledger_store::{
        CredentialStore, KeyValueStore, MemoryKeyValueStore, Role, Session, StoreError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guard_with(session: Option<Session>) -> RouteGuard {
        let store = CredentialStore::in_memory();
        if let Some(session) = session {
            store.save(&session).unwrap();
        }
        let authority =
            HttpAuthority::new(AuthorityConfig::new("http://127.0.0.1:1")).unwrap();
        RouteGuard::new(Arc::new(SessionManager::new(store, Arc::new(authority))))
    }

    #[test]
    fn test_no_session_redirects_to_login() {
        let guard = guard_with(None);
        let required = RequiredRole::Single(Role::Admin);

        assert_eq!(
            guard.check("/admin", Some(&required)),
            GuardDecision::RedirectToLogin {
                return_to: "/admin".to_string()
            }
        );
        // Even without a role requirement
        assert!(matches!(
            guard.check("/dashboard", None),
            GuardDecision::RedirectToLogin { .. }
        ));
    }

    #[test]
    fn test_wrong_role_redirects_to_unauthorized() {
        let guard = guard_with(Some(Session::new("t").with_role("user")));
        let required = RequiredRole::Single(Role::Admin);

        assert_eq!(
            guard.check("/admin", Some(&required)),
            GuardDecision::RedirectToUnauthorized
        );
    }

    #[test]
    fn test_matching_role_renders() {
        let guard = guard_with(Some(Session::new("t").with_role("Admin")));
        let required = RequiredRole::Single(Role::Admin);

        assert_eq!(guard.check("/admin", Some(&required)), GuardDecision::Render);
        assert_eq!(guard.check("/dashboard", None), GuardDecision::Render);
    }

    #[test]
    fn test_any_of_roles_renders() {
        let guard = guard_with(Some(Session::new("t").with_role("core")));
        let required = RequiredRole::from_roles(["user", "core"]).unwrap();

        assert_eq!(
            guard.check("/transactions", Some(&required)),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_session_without_role_is_unauthorized() {
        let guard = guard_with(Some(Session::new("t")));
        let required = RequiredRole::from_roles(["user", "core"]).unwrap();

        assert_eq!(
            guard.check("/transactions", Some(&required)),
            GuardDecision::RedirectToUnauthorized
        );
    }

    /// Medium that counts reads
    #[derive(Default)]
    struct CountingMedium {
        inner: MemoryKeyValueStore,
        reads: AtomicUsize,
    }

    impl KeyValueStore for CountingMedium {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_check_reads_session_once() {
        let medium = Arc::new(CountingMedium::default());
        let store = CredentialStore::new(medium.clone());
        store.save(&Session::new("t").with_role("ADMIN")).unwrap();

        let authority =
            HttpAuthority::new(AuthorityConfig::new("http://127.0.0.1:1")).unwrap();
        let guard = RouteGuard::new(Arc::new(SessionManager::new(store, Arc::new(authority))));
        let required = RequiredRole::from_roles(["user", "core", "auditor", "admin"]).unwrap();

        assert_eq!(
            guard.check("/admin/stats", Some(&required)),
            GuardDecision::Render
        );
        assert_eq!(medium.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_route_table() {
        let table = RouteTable::new(vec![
            ProtectedRoute {
                path: "/admin".to_string(),
                required: RequiredRole::from_roles(["admin"]),
            },
            ProtectedRoute {
                path: "/transactions/".to_string(),
                required: RequiredRole::from_roles(["user", "core"]),
            },
        ]);

        assert!(table.find("/admin/").is_some());
        assert!(table.find("/transactions?page=2").is_some());
        assert!(table.find("/about").is_none());

        let guard = guard_with(Some(Session::new("t").with_role("user")));
        assert_eq!(
            guard.check_route(&table, "/admin"),
            GuardDecision::RedirectToUnauthorized
        );
        assert_eq!(guard.check_route(&table, "/transactions"), GuardDecision::Render);
        assert_eq!(guard.check_route(&table, "/about"), GuardDecision::Render);
    }

    #[test]
    fn test_enforce_navigates() {
        let navigator = HistoryNavigator::new();
        let required = RequiredRole::Single(Role::Admin);

        let anonymous = guard_with(None);
        assert!(!anonymous.enforce("/admin", Some(&required), &navigator));
        assert_eq!(
            navigator.last(),
            Some(Destination::Login {
                return_to: Some("/admin".to_string())
            })
        );

        let user = guard_with(Some(Session::new("t").with_role("user")));
        assert!(!user.enforce("/admin", Some(&required), &navigator));
        assert_eq!(navigator.last(), Some(Destination::Unauthorized));

        let admin = guard_with(Some(Session::new("t").with_role("admin")));
        assert!(admin.enforce("/admin", Some(&required), &navigator));
        assert_eq!(navigator.last(), Some(Destination::View("/admin".to_string())));
        assert_eq!(navigator.history().len(), 3);
    }

    #[test]
    fn test_enforce_route_public_path() {
        let navigator = HistoryNavigator::new();
        let table = RouteTable::new(vec![ProtectedRoute {
            path: "/admin".to_string(),
            required: RequiredRole::from_roles(["admin"]),
        }]);

        let anonymous = guard_with(None);
        assert!(anonymous.enforce_route(&table, "/about", &navigator));
        assert_eq!(navigator.last(), Some(Destination::View("/about".to_string())));

        assert!(!anonymous.enforce_route(&table, "/admin", &navigator));
        assert_eq!(
            navigator.last(),
            Some(Destination::Login {
                return_to: Some("/admin".to_string())
            })
        );
    }
}
