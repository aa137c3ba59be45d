use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::EditorAction;
use crate::mode::Mode;

/// Environment variable naming the options file when no path is given.
pub const CONFIG_ENV: &str = "DARKMAN_BRIDGE_CONFIG";

/// What the editor should do whenever the mode changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    pub change_background: bool,
    pub send_user_event: bool,
    pub colorscheme: Option<Colorschemes>,
}

/// Colorscheme names to load for each mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Colorschemes {
    pub dark: String,
    pub light: String,
}

impl Colorschemes {
    pub fn for_mode(&self, mode: Mode) -> &str {
        match mode {
            Mode::Dark => &self.dark,
            Mode::Light => &self.light,
        }
    }
}

impl SetupOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid darkman-bridge options")
    }

    /// Loads options from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No options file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// Editor commands for `mode`: colorscheme, then background, then user event.
    pub fn actions_for(&self, mode: Mode) -> Vec<EditorAction> {
        let mut actions = Vec::new();
        if let Some(colorscheme) = &self.colorscheme {
            actions.push(EditorAction::Colorscheme(colorscheme.for_mode(mode).to_string()));
        }
        if self.change_background {
            actions.push(EditorAction::Background(mode));
        }
        if self.send_user_event {
            actions.push(EditorAction::UserEvent(mode));
        }
        actions
    }
}
