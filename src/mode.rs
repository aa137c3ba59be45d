use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Light/dark appearance reported by darkman.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Dark,
    Light,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Dark => "dark",
            Mode::Light => "light",
        }
    }

    /// Name of the `User` autocommand fired for this mode.
    pub fn event_name(self) -> &'static str {
        match self {
            Mode::Dark => "DarkMode",
            Mode::Light => "LightMode",
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "dark" => Ok(Mode::Dark),
            "light" => Ok(Mode::Light),
            other => Err(Error::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
