//! Configuration loading and defaults for perevod.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Default configuration template printed by the `config` subcommand.
pub const DEFAULT_TEMPLATE: &str = r#"# Target languages tried in order. The first reply whose detected source
# language differs from the target is displayed.
languages = ["ru", "en"]

# Control socket path. Defaults to $XDG_RUNTIME_DIR/perevod.sock.
# socket = "/tmp/perevod.sock"

# Popup placement: "center", "top-right", "bottom-right" or "mouse".
placement = "center"

# Command that prints the current primary selection on stdout.
selection_cmd = ["xclip", "-o", "-selection", "primary"]

# Command used for warnings and, when popup_cmd is unset, for results.
# The message is appended as the last argument.
notify_cmd = ["notify-send", "Perevod"]

# Optional command that displays a translation result. "{text}" and
# "{placement}" are substituted in the arguments before spawning.
# popup_cmd = ["zenity", "--info", "--title", "Translate selection", "--text", "{text}"]

# Optional command that hides the popup again.
# hide_cmd = []

# Translation endpoint.
endpoint = "https://translate.googleapis.com/translate_a/single"
"#;

/// Where the result popup is placed on screen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    /// Center of the screen (default).
    #[default]
    Center,
    /// Top-right corner.
    TopRight,
    /// Bottom-right corner.
    BottomRight,
    /// At the mouse pointer.
    Mouse,
}

impl Placement {
    /// Policy name as passed to the popup command.
    pub fn as_str(self) -> &'static str {
        match self {
            Placement::Center => "center",
            Placement::TopRight => "top-right",
            Placement::BottomRight => "bottom-right",
            Placement::Mouse => "mouse",
        }
    }
}

/// Main configuration for perevod.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control socket path override.
    /// If unset, a session-scoped default under the runtime dir is used.
    pub socket: Option<PathBuf>,

    /// Ordered target languages for the translation fallback loop.
    pub languages: Vec<String>,

    /// Popup placement policy.
    pub placement: Placement,

    /// Command that prints the primary selection on stdout.
    pub selection_cmd: Vec<String>,

    /// Command used for warnings and plain-notification results.
    pub notify_cmd: Vec<String>,

    /// Optional command that displays a translation result.
    pub popup_cmd: Option<Vec<String>>,

    /// Optional command that hides the popup.
    pub hide_cmd: Option<Vec<String>>,

    /// Translation endpoint URL.
    pub endpoint: String,

    /// Timeout in seconds for the startup liveness probe (default: 2).
    pub probe_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: None,
            languages: vec!["ru".to_string()],
            placement: Placement::default(),
            selection_cmd: vec![
                "xclip".to_string(),
                "-o".to_string(),
                "-selection".to_string(),
                "primary".to_string(),
            ],
            notify_cmd: vec!["notify-send".to_string(), "Perevod".to_string()],
            popup_cmd: None,
            hide_cmd: None,
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            probe_timeout_seconds: 2,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("perevod").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Resolve the control socket path, applying the configured override.
    pub fn socket_path(&self) -> PathBuf {
        if let Some(ref path) = self.socket {
            return path.clone();
        }
        default_socket_path()
    }
}

/// Session-scoped default socket path.
///
/// Prefers the user runtime dir; falls back to a session-tagged /tmp name so
/// two desktop sessions of the same user do not fight over one socket.
fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("perevod.sock");
    }

    let session = env::var("XDG_SESSION_ID").unwrap_or_else(|_| "default".to_string());
    PathBuf::from(format!("/tmp/perevod-{session}.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.languages, vec!["ru".to_string()]);
        assert_eq!(config.placement, Placement::Center);
        assert!(config.socket.is_none());
        assert!(config.popup_cmd.is_none());
        assert_eq!(config.probe_timeout_seconds, 2);
        assert_eq!(config.selection_cmd[0], "xclip");
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            languages = ["de", "en"]
            placement = "top-right"
            socket = "/tmp/perevod-test.sock"
            popup_cmd = ["zenity", "--info", "--text", "{text}"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.languages, vec!["de".to_string(), "en".to_string()]);
        assert_eq!(config.placement, Placement::TopRight);
        assert_eq!(config.socket, Some(PathBuf::from("/tmp/perevod-test.sock")));
        assert_eq!(config.popup_cmd.as_ref().unwrap()[0], "zenity");
        // Unset keys keep their defaults
        assert_eq!(config.notify_cmd[0], "notify-send");
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(DEFAULT_TEMPLATE).unwrap();
        assert_eq!(config.languages, vec!["ru".to_string(), "en".to_string()]);
        assert_eq!(config.placement, Placement::Center);
        // Commented-out keys stay at their defaults
        assert!(config.socket.is_none());
        assert!(config.popup_cmd.is_none());
    }

    #[test]
    fn test_socket_override() {
        let config = Config {
            socket: Some(PathBuf::from("/run/user/1000/custom.sock")),
            ..Default::default()
        };
        assert_eq!(
            config.socket_path(),
            PathBuf::from("/run/user/1000/custom.sock")
        );
    }

    #[test]
    fn test_placement_names() {
        assert_eq!(Placement::Center.as_str(), "center");
        assert_eq!(Placement::TopRight.as_str(), "top-right");
        assert_eq!(Placement::BottomRight.as_str(), "bottom-right");
        assert_eq!(Placement::Mouse.as_str(), "mouse");

        let config: Config = toml::from_str("placement = \"mouse\"").unwrap();
        assert_eq!(config.placement, Placement::Mouse);
    }
}
