//! The frontend seam.
//!
//! Everything the core needs from the desktop: read the primary selection,
//! show a result, hide it again, warn the user. [`CommandFrontend`] fulfils
//! the contract by spawning configured external commands, which keeps the
//! daemon free of any toolkit dependency; tests substitute their own impls.

use crate::config::{Config, Placement};
use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from frontend commands.
#[derive(Error, Debug)]
pub enum FrontendError {
    #[error("no command configured")]
    EmptyCommand,

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Desktop-facing operations the application dispatches to.
#[async_trait]
pub trait Frontend: Send + Sync {
    /// Read the current primary selection.
    async fn selection(&self) -> Result<String, FrontendError>;

    /// Display a translation result.
    async fn show(&self, text: &str) -> Result<(), FrontendError>;

    /// Hide the popup. Idempotent; a no-op when nothing is shown.
    async fn hide(&self) -> Result<(), FrontendError>;

    /// Show a short warning to the user.
    async fn warn(&self, message: &str) -> Result<(), FrontendError>;
}

/// Frontend backed by configured external commands.
#[derive(Debug)]
pub struct CommandFrontend {
    selection_cmd: Vec<String>,
    notify_cmd: Vec<String>,
    popup_cmd: Option<Vec<String>>,
    hide_cmd: Option<Vec<String>>,
    placement: Placement,
}

impl CommandFrontend {
    /// Build from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            selection_cmd: config.selection_cmd.clone(),
            notify_cmd: config.notify_cmd.clone(),
            popup_cmd: config.popup_cmd.clone(),
            hide_cmd: config.hide_cmd.clone(),
            placement: config.placement,
        }
    }
}

#[async_trait]
impl Frontend for CommandFrontend {
    async fn selection(&self) -> Result<String, FrontendError> {
        run_capture(&self.selection_cmd).await
    }

    async fn show(&self, text: &str) -> Result<(), FrontendError> {
        let argv = match self.popup_cmd {
            Some(ref popup) => expand(popup, text, self.placement),
            None => expand(&self.notify_cmd, text, self.placement),
        };
        run_silent(&argv).await
    }

    async fn hide(&self) -> Result<(), FrontendError> {
        match self.hide_cmd {
            Some(ref argv) if !argv.is_empty() => run_silent(argv).await,
            _ => {
                debug!("No hide command configured, nothing to hide");
                Ok(())
            }
        }
    }

    async fn warn(&self, message: &str) -> Result<(), FrontendError> {
        run_silent(&expand(&self.notify_cmd, message, self.placement)).await
    }
}

/// Substitute `{text}` and `{placement}` in the argument list.
///
/// When no argument mentions `{text}`, the text is appended as the final
/// argument instead.
fn expand(argv: &[String], text: &str, placement: Placement) -> Vec<String> {
    let mut expanded: Vec<String> = argv
        .iter()
        .map(|arg| {
            arg.replace("{text}", text)
                .replace("{placement}", placement.as_str())
        })
        .collect();

    if !argv.iter().any(|arg| arg.contains("{text}")) {
        expanded.push(text.to_string());
    }

    expanded
}

/// Run a command and capture its stdout.
async fn run_capture(argv: &[String]) -> Result<String, FrontendError> {
    let output = spawn(argv)?.wait_with_output().await.map_err(|source| {
        FrontendError::Spawn {
            command: argv.join(" "),
            source,
        }
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(FrontendError::CommandFailed {
            command: argv.join(" "),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command, discarding its output.
async fn run_silent(argv: &[String]) -> Result<(), FrontendError> {
    run_capture(argv).await.map(|_| ())
}

fn spawn(argv: &[String]) -> Result<tokio::process::Child, FrontendError> {
    let (program, args) = argv.split_first().ok_or(FrontendError::EmptyCommand)?;

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| FrontendError::Spawn {
            command: argv.join(" "),
            source,
        })
}
