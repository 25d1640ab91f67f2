//! Terminal navigation

use coinledger_auth::{Destination, Navigator};
use tracing::debug;

/// Reports redirects to the user on stderr
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, destination: Destination) {
        match destination {
            Destination::Login { return_to: Some(path) } => {
                eprintln!(
                    "{} requires a session. Run `coinledger login`, then visit {} again.",
                    path, path
                );
            }
            Destination::Login { return_to: None } => {
                eprintln!("Session ended. Run `coinledger login` to continue.");
            }
            Destination::Unauthorized => {
                eprintln!("Access denied: your role cannot open this view.");
            }
            Destination::View(path) => {
                debug!("Opening {}", path);
                println!("{}", path);
            }
        }
    }
}
