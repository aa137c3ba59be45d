//! Caller-facing mode watcher.
//!
//! [`Watcher`] owns the "current mode" cell. It is filled once by
//! [`Watcher::setup`] and then kept in sync with the relay's stream by
//! [`Watcher::follow`].

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::darkman_client::{DarkmanClient, ModeStream};
use crate::error::{Error, Result};
use crate::mode::Mode;

/// Something that can report the current mode and stream later changes.
#[allow(async_fn_in_trait)]
pub trait ModeSource {
    /// Raw mode string as reported by the service.
    async fn current_mode(&self) -> Result<String>;

    /// Starts relaying changes until `cancel` fires.
    async fn subscribe(&self, cancel: CancellationToken) -> Result<ModeStream>;
}

impl ModeSource for DarkmanClient {
    async fn current_mode(&self) -> Result<String> {
        DarkmanClient::current_mode(self).await
    }

    async fn subscribe(&self, cancel: CancellationToken) -> Result<ModeStream> {
        DarkmanClient::subscribe(self, cancel).await
    }
}

/// Invoked once per accepted mode change.
pub trait ModeHook {
    fn on_mode(&mut self, mode: Mode) -> anyhow::Result<()>;
}

impl<F> ModeHook for F
where
    F: FnMut(Mode) -> anyhow::Result<()>,
{
    fn on_mode(&mut self, mode: Mode) -> anyhow::Result<()> {
        self(mode)
    }
}

pub struct Watcher {
    current: watch::Sender<Option<Mode>>,
    /// Relay token of the active setup. Held across setup so concurrent
    /// calls are serialized.
    session: Mutex<Option<CancellationToken>>,
    cancel: CancellationToken,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            session: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the last known mode.
    pub fn current_mode(&self) -> Result<Mode> {
        (*self.current.borrow()).ok_or(Error::Uninitialized)
    }

    /// Receiver observing every change of the current mode.
    pub fn subscribe_changes(&self) -> watch::Receiver<Option<Mode>> {
        self.current.subscribe()
    }

    /// Fetches the initial mode and starts the relay.
    ///
    /// Fails with [`Error::AlreadyInitialized`] when called again after a
    /// successful setup. A failed setup leaves the watcher uninitialized and
    /// can be retried.
    pub async fn setup<S: ModeSource>(&self, source: &S) -> Result<(Mode, ModeStream)> {
        self.initialize(source, |_| Ok(())).await
    }

    /// Like [`Watcher::setup`], but runs `hook` for the initial mode first.
    ///
    /// If the hook fails the relay is cancelled and the watcher stays
    /// uninitialized.
    pub async fn setup_with_hook<S, H>(&self, source: &S, hook: &mut H) -> Result<ModeStream>
    where
        S: ModeSource,
        H: ModeHook,
    {
        let (_, stream) = self
            .initialize(source, |mode| hook.on_mode(mode).map_err(Error::Hook))
            .await?;
        Ok(stream)
    }

    async fn initialize<S, F>(&self, source: &S, on_initial: F) -> Result<(Mode, ModeStream)>
    where
        S: ModeSource,
        F: FnOnce(Mode) -> Result<()>,
    {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let mode: Mode = source.current_mode().await?.parse()?;
        let token = self.cancel.child_token();
        let stream = source.subscribe(token.clone()).await?;

        if let Err(err) = on_initial(mode) {
            token.cancel();
            return Err(err);
        }

        self.current.send_replace(Some(mode));
        *session = Some(token);
        info!(%mode, "Mode watcher initialized");
        Ok((mode, stream))
    }

    /// Records a raw mode value from the stream.
    ///
    /// Returns whether the current mode changed. The hook only runs on a change.
    pub fn apply<H: ModeHook>(&self, raw: &str, hook: &mut H) -> Result<bool> {
        let mode: Mode = raw.parse()?;

        let changed = self.current.send_if_modified(|current| {
            if *current == Some(mode) {
                false
            } else {
                *current = Some(mode);
                true
            }
        });

        if changed {
            info!(%mode, "Mode changed");
            if let Err(err) = hook.on_mode(mode) {
                warn!(%mode, "Mode hook failed: {err:#}");
            }
        } else {
            debug!(%mode, "Mode unchanged");
        }
        Ok(changed)
    }

    /// Applies every value from `stream` until the relay stops.
    pub async fn follow<H: ModeHook>(&self, mut stream: ModeStream, hook: &mut H) {
        while let Some(raw) = stream.recv().await {
            if let Err(err) = self.apply(&raw, hook) {
                error!("{err}");
            }
        }
        debug!("Mode stream ended");
    }

    /// Stops the relay started by [`Watcher::setup`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
