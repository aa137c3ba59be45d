//! Client for darkman's `org.freedesktop.DBus.Properties` surface.
//!
//! darkman exposes a single `Mode` property under the `nl.whynothugo.darkman`
//! namespace and emits `PropertiesChanged` whenever it flips.

use futures::future;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zbus::zvariant::{OwnedValue, Value};
use zbus::{proxy, Connection, MatchRule, MessageStream};

use crate::error::{Error, Result};

mod relay;

pub use relay::{spawn_relay, ChangeNotification, ModeStream};

/// Well-known bus name darkman owns on the session bus.
pub const BUS_NAME: &str = "nl.whynothugo.darkman";
/// Object path carrying the `Mode` property.
pub const OBJECT_PATH: &str = "/nl/whynothugo/darkman";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
/// Interface name passed to `Get` and matched against arg0 of `PropertiesChanged`.
pub const NAMESPACE: &str = "nl.whynothugo.darkman";
pub const MODE_KEY: &str = "Mode";
pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";

/// D-Bus proxy for the properties interface on darkman's object.
#[proxy(
    interface = "org.freedesktop.DBus.Properties",
    default_service = "nl.whynothugo.darkman",
    default_path = "/nl/whynothugo/darkman",
    gen_blocking = false
)]
trait DarkmanProperties {
    /// Reads a single property of `interface_name`.
    async fn get(&self, interface_name: &str, property_name: &str) -> zbus::Result<OwnedValue>;
}

/// Owns the session bus connection used to talk to darkman.
#[derive(Clone)]
pub struct DarkmanClient {
    connection: Connection,
}

impl DarkmanClient {
    /// Opens a new session bus connection.
    pub async fn connect() -> Result<Self> {
        let connection = Connection::session().await.map_err(Error::Connection)?;
        info!(unique_name = ?connection.unique_name(), "Connected to D-Bus session bus");
        Ok(Self { connection })
    }

    /// Fetches the raw `Mode` string with a `Get` round-trip.
    pub async fn current_mode(&self) -> Result<String> {
        let proxy = DarkmanPropertiesProxy::builder(&self.connection)
            .build()
            .await
            .map_err(Error::Query)?;

        let value = proxy.get(NAMESPACE, MODE_KEY).await.map_err(Error::Query)?;
        let mode = value_as_string(&value).ok_or_else(|| {
            Error::Query(zbus::Error::Failure(format!(
                "{MODE_KEY} is not a string: {:?}",
                value.value_signature()
            )))
        })?;

        debug!(mode, "Fetched current mode");
        Ok(mode)
    }

    /// Registers the `PropertiesChanged` match rule and starts the relay.
    ///
    /// The subscription lives until `cancel` fires or the connection goes away.
    pub async fn subscribe(&self, cancel: CancellationToken) -> Result<ModeStream> {
        let rule = mode_changed_rule().map_err(Error::Subscription)?;
        debug!(%rule, "Registering match rule");

        let messages = MessageStream::for_match_rule(rule, &self.connection, None)
            .await
            .map_err(Error::Subscription)?;

        let notifications = messages.filter_map(|message| {
            future::ready(
                message
                    .ok()
                    .and_then(|message| ChangeNotification::from_message(&message)),
            )
        });

        info!(service = BUS_NAME, "Subscribed to mode changes");
        Ok(spawn_relay(notifications, cancel))
    }
}

/// Match rule for darkman's `PropertiesChanged` signal.
pub fn mode_changed_rule() -> zbus::Result<MatchRule<'static>> {
    let rule = MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .sender(BUS_NAME)?
        .path(OBJECT_PATH)?
        .interface(PROPERTIES_INTERFACE)?
        .member(PROPERTIES_CHANGED)?
        .arg0ns(NAMESPACE)?
        .build();
    Ok(rule)
}

/// Returns the string held by `value`, looking through variant wrappers.
pub(crate) fn value_as_string(value: &Value<'_>) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.to_string()),
        Value::Value(inner) => value_as_string(inner),
        _ => None,
    }
}
