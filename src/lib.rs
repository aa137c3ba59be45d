//! Bridge between darkman's light/dark mode service and an editor.
//!
//! The crate queries `nl.whynothugo.darkman` over the session bus for the
//! current mode, subscribes to its `PropertiesChanged` signal and relays
//! each new mode to the caller. What the editor does with a mode is
//! described by [`config::SetupOptions`] and carried out by a
//! [`watcher::ModeHook`].

pub mod actions;
pub mod config;
pub mod darkman_client;
pub mod error;
pub mod mode;
pub mod watcher;

pub use error::{Error, Result};
pub use mode::Mode;
pub use watcher::{ModeHook, ModeSource, Watcher};
