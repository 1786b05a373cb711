//! The closed set of control actions.
//!
//! Every action a running instance understands is listed here, so the CLI can
//! validate its `call` argument against the same set the server dispatches on.

use clap::ValueEnum;
use std::fmt;

/// A named, zero-argument operation on the running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Translate the current primary selection and show the result.
    Fetch,
    /// Hide the popup if one is shown.
    Hide,
    /// Stop the running instance.
    Quit,
    /// Stop with the reload exit code so a supervisor restarts the daemon.
    Reload,
    /// Liveness probe, answered without any frontend side effect.
    Ping,
}

impl Action {
    /// All registered actions, in a stable order.
    pub const ALL: [Action; 5] = [
        Action::Fetch,
        Action::Hide,
        Action::Quit,
        Action::Reload,
        Action::Ping,
    ];

    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Fetch => "fetch",
            Action::Hide => "hide",
            Action::Quit => "quit",
            Action::Reload => "reload",
            Action::Ping => "ping",
        }
    }

    /// Look up an action by its exact wire name.
    pub fn parse(token: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == token)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
