//! Application state and the action drain loop.
//!
//! The [`App`] owns the frontend and the translation backend and is the only
//! place actions take effect. The control channel merely enqueues; this loop
//! drains the queue in submission order, so every side effect stays confined
//! to one task, mirroring a single-threaded GUI loop.

use crate::action::Action;
use crate::frontend::Frontend;
use crate::translate::{TranslateBackend, TranslateError, Translation};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Exit code asking the supervisor to restart the daemon.
pub const EXIT_RELOAD: i32 = 100;

/// How the drain loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Plain `quit`.
    Normal,
    /// `reload` was requested before quitting.
    Reload,
}

impl ExitKind {
    /// Process exit code for this outcome.
    pub fn code(self) -> i32 {
        match self {
            ExitKind::Normal => 0,
            ExitKind::Reload => EXIT_RELOAD,
        }
    }
}

/// The running application.
pub struct App<F, B> {
    frontend: F,
    backend: B,
    languages: Vec<String>,
    reload: bool,
}

impl<F: Frontend, B: TranslateBackend> App<F, B> {
    /// Create the application with its collaborators and target languages.
    pub fn new(frontend: F, backend: B, languages: Vec<String>) -> Self {
        Self {
            frontend,
            backend,
            languages,
            reload: false,
        }
    }

    /// Drain actions until `quit`/`reload` arrives or all senders are gone.
    pub async fn run(mut self, mut queue: mpsc::Receiver<Action>) -> ExitKind {
        while let Some(action) = queue.recv().await {
            debug!("Dispatching action: {action}");
            match action {
                Action::Fetch => self.fetch().await,
                Action::Hide => {
                    if let Err(e) = self.frontend.hide().await {
                        warn!("Failed to hide popup: {e}");
                    }
                }
                Action::Quit => break,
                Action::Reload => {
                    self.reload = true;
                    break;
                }
                // Answered by the control channel, nothing to do here.
                Action::Ping => {}
            }
        }

        if self.reload {
            info!("Reload requested");
            ExitKind::Reload
        } else {
            ExitKind::Normal
        }
    }

    /// Translate the current selection and display the result.
    ///
    /// Target languages are tried in configured order; the first reply whose
    /// detected source language differs from the requested target wins (equal
    /// languages mean the translation was a no-op). When every language is
    /// exhausted the last result or error observed is surfaced.
    async fn fetch(&mut self) {
        let selection = match self.frontend.selection().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read selection: {e}");
                self.warn_user(&format!("Cannot read selection: {e}")).await;
                return;
            }
        };

        let text = selection.trim();
        if text.is_empty() {
            self.warn_user("Please select the text first").await;
            return;
        }

        let mut last: Option<Result<Translation, TranslateError>> = None;
        for target in &self.languages {
            match self.backend.translate(text, target).await {
                Ok(translation) if translation.detected != *target => {
                    self.show_user(&translation.text).await;
                    return;
                }
                Ok(translation) => {
                    debug!(
                        "Detected language equals target {target}, trying next"
                    );
                    last = Some(Ok(translation));
                }
                Err(e) => {
                    warn!("Translation to {target} failed: {e}");
                    last = Some(Err(e));
                }
            }
        }

        match last {
            Some(Ok(translation)) => self.show_user(&translation.text).await,
            Some(Err(e)) => self.show_user(&format!("Translation failed: {e}")).await,
            None => self.warn_user("No target languages configured").await,
        }
    }

    async fn show_user(&self, text: &str) {
        if let Err(e) = self.frontend.show(text).await {
            warn!("Failed to show result: {e}");
        }
    }

    async fn warn_user(&self, message: &str) {
        if let Err(e) = self.frontend.warn(message).await {
            warn!("Failed to show warning: {e}");
        }
    }
}
