use thiserror::Error;

/// Errors surfaced by the darkman client and the mode watcher.
///
/// Setup-time failures (`Connection`, `Query`, `Subscription`) are terminal:
/// nothing here retries or reconnects.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to the session bus: {0}")]
    Connection(#[source] zbus::Error),

    #[error("failed to query the current mode: {0}")]
    Query(#[source] zbus::Error),

    #[error("failed to subscribe to mode changes: {0}")]
    Subscription(#[source] zbus::Error),

    #[error("mode not yet initialized, call setup first")]
    Uninitialized,

    #[error("setup already called")]
    AlreadyInitialized,

    #[error("unexpected mode: {0}")]
    UnknownMode(String),

    #[error("mode hook failed: {0:#}")]
    Hook(anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
