//! Coinledger Session and Authorization
//!
//! This crate provides the session lifecycle (login, refresh, logout),
//! the remote authority client and role-based route guarding.

pub mod authority;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod normalize;
pub mod session;

pub use authority::{AuthAuthority, AuthorityConfig, HttpAuthority, endpoint_url};
pub use error::{AuthError, ErrorKind};
pub use guard::{GuardDecision, ProtectedRoute, RouteGuard, RouteTable};
pub use navigation::{Destination, HistoryNavigator, Navigator};
pub use session::SessionManager;
