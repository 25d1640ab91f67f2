//! Navigation collaborator

use parking_lot::Mutex;

/// Path of the login entry point
pub const LOGIN_PATH: &str = "/login";
/// Path of the unauthorized page
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Where the user is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Login entry point, remembering the location to return to afterwards
    Login { return_to: Option<String> },
    /// Page shown when the session lacks the required role
    Unauthorized,
    /// A protected view
    View(String),
}

impl Destination {
    pub fn path(&self) -> &str {
        match self {
            Destination::Login { .. } => LOGIN_PATH,
            Destination::Unauthorized => UNAUTHORIZED_PATH,
            Destination::View(path) => path,
        }
    }
}

/// Redirects the user to a destination
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

/// Navigator that only records where it was sent
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<Destination>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Destination> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<Destination> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, destination: Destination) {
        self.history.lock().push(destination);
    }
}
