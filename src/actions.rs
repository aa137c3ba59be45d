use std::fmt;

use crate::mode::Mode;

/// A single editor command issued in response to a mode change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    Colorscheme(String),
    Background(Mode),
    UserEvent(Mode),
}

impl EditorAction {
    /// Ex command line for this action.
    pub fn command(&self) -> String {
        match self {
            EditorAction::Colorscheme(name) => format!("colorscheme {name}"),
            EditorAction::Background(mode) => format!("set background={mode}"),
            EditorAction::UserEvent(mode) => format!("doautocmd User {}", mode.event_name()),
        }
    }
}

impl fmt::Display for EditorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command())
    }
}
