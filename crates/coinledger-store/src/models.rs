//! Session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Session role
///
/// The dashboard knows a closed set of roles. Anything else the server sends
/// is kept verbatim in `Other` so it can still be compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Auditor,
    User,
    Core,
    Other(String),
}

impl Role {
    /// Parse a role name, ignoring case
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "auditor" => Role::Auditor,
            "user" => Role::User,
            "core" => Role::Core,
            _ => Role::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Auditor => "auditor",
            Role::User => "user",
            Role::Core => "core",
            Role::Other(s) => s,
        }
    }

    /// Case-insensitive comparison against a role name
    pub fn matches(&self, candidate: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(candidate.trim())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::parse(s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Role requirement for a protected view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredRole {
    /// Exactly this role
    Single(Role),
    /// Any one of these roles, in declaration order
    AnyOf(Vec<Role>),
}

impl RequiredRole {
    /// Build a requirement from a list of role names.
    /// Returns `None` for an empty list (no requirement).
    pub fn from_roles<I, R>(roles: I) -> Option<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        let mut unique: Vec<Role> = Vec::new();
        for role in roles.into_iter().map(Into::into) {
            if !unique.iter().any(|r| r.matches(role.as_str())) {
                unique.push(role);
            }
        }

        match unique.len() {
            0 => None,
            1 => unique.pop().map(RequiredRole::Single),
            _ => Some(RequiredRole::AnyOf(unique)),
        }
    }

    /// Acceptable roles
    pub fn roles(&self) -> &[Role] {
        match self {
            RequiredRole::Single(role) => std::slice::from_ref(role),
            RequiredRole::AnyOf(roles) => roles,
        }
    }

    /// Whether the session holds any acceptable role
    pub fn is_satisfied_by(&self, session: &Session) -> bool {
        self.roles().iter().any(|r| session.has_role(r.as_str()))
    }
}

impl From<Role> for RequiredRole {
    fn from(role: Role) -> Self {
        RequiredRole::Single(role)
    }
}

/// Authenticated session held by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session with just an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            role: None,
            permissions: BTreeSet::new(),
            user_id: None,
            email: None,
            issued_at: Utc::now(),
            refreshed_at: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive role check. False when the session carries no role.
    pub fn has_role(&self, candidate: &str) -> bool {
        self.role.as_ref().is_some_and(|r| r.matches(candidate))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Replace the access token after a refresh, rotating the refresh token
    /// if the authority issued a new one
    pub fn refreshed(mut self, access_token: String, refresh_token: Option<String>) -> Self {
        self.access_token = access_token;
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.refreshed_at = Some(Utc::now());
        self
    }
}
