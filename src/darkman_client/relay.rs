//! Background relay turning raw `PropertiesChanged` signals into mode strings.

use std::collections::HashMap;
use std::pin::{pin, Pin};
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use zbus::zvariant::{OwnedValue, Structure, Value};
use zbus::Message;

use super::{value_as_string, MODE_KEY};

/// Arguments of one `PropertiesChanged` signal:
/// `[interface_name, changed_properties, invalidated_properties]`.
#[derive(Debug)]
pub struct ChangeNotification {
    args: Vec<OwnedValue>,
}

impl ChangeNotification {
    pub fn new(args: Vec<OwnedValue>) -> Self {
        Self { args }
    }

    /// Decodes the body of a signal message, or `None` if it can't be read.
    pub fn from_message(message: &Message) -> Option<Self> {
        let body = message.body();
        let structure: Structure<'_> = body.deserialize().ok()?;
        let args = structure
            .into_fields()
            .into_iter()
            .map(OwnedValue::try_from)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        Some(Self { args })
    }

    pub fn args(&self) -> &[OwnedValue] {
        &self.args
    }

    /// Extracts the `Mode` entry of the changed-properties map.
    ///
    /// Anything that is not a well formed three argument signal carrying a
    /// string `Mode` yields `None`.
    pub fn mode(&self) -> Option<String> {
        if self.args.len() != 3 {
            return None;
        }

        let changed: Value<'static> = self.args[1].try_clone().ok()?.into();
        let Value::Dict(changed) = changed else {
            return None;
        };
        let changed = HashMap::<String, OwnedValue>::try_from(changed).ok()?;

        value_as_string(changed.get(MODE_KEY)?)
    }
}

/// Receiving end of the relay: every extracted mode string, in arrival order.
#[derive(Debug)]
pub struct ModeStream {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ModeStream {
    /// Waits for the next mode string. `None` once the relay has stopped.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Stream for ModeStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Spawns the relay task on the current tokio runtime.
///
/// The task stops when `notifications` ends, when `cancel` fires, or when
/// the returned [`ModeStream`] is dropped.
pub fn spawn_relay<S>(notifications: S, cancel: CancellationToken) -> ModeStream
where
    S: Stream<Item = ChangeNotification> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut notifications = pin!(notifications);

        loop {
            let notification = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Mode relay cancelled");
                    break;
                }
                next = notifications.next() => match next {
                    Some(notification) => notification,
                    None => {
                        debug!("Notification source closed, mode relay stopping");
                        break;
                    }
                },
            };

            let Some(mode) = notification.mode() else {
                trace!(args = notification.args().len(), "Ignoring notification without a mode");
                continue;
            };

            trace!(mode, "Relaying mode");
            if tx.send(mode).is_err() {
                debug!("Mode stream dropped, mode relay stopping");
                break;
            }
        }
    });

    ModeStream { rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::darkman_client::{
        mode_changed_rule, NAMESPACE, OBJECT_PATH, PROPERTIES_CHANGED, PROPERTIES_INTERFACE,
    };
    use zbus::zvariant::Str;

    fn owned(value: Value<'_>) -> OwnedValue {
        OwnedValue::try_from(value).unwrap()
    }

    fn notification(changed: HashMap<&str, Value<'_>>) -> ChangeNotification {
        ChangeNotification::new(vec![
            owned(Value::from(Str::from("nl.whynothugo.darkman"))),
            owned(Value::from(changed)),
            owned(Value::from(Vec::<String>::new())),
        ])
    }

    #[test]
    fn extracts_mode_entry() {
        let changed = HashMap::from([("Mode", Value::from(Str::from("light")))]);
        assert_eq!(notification(changed).mode().as_deref(), Some("light"));
    }

    #[test]
    fn passes_unknown_strings_through() {
        let changed = HashMap::from([("Mode", Value::from(Str::from("sepia")))]);
        assert_eq!(notification(changed).mode().as_deref(), Some("sepia"));
    }

    #[test]
    fn ignores_wrong_arity() {
        let changed = HashMap::from([("Mode", Value::from(Str::from("dark")))]);
        let two = ChangeNotification::new(vec![
            owned(Value::from(Str::from("nl.whynothugo.darkman"))),
            owned(Value::from(changed)),
        ]);
        assert_eq!(two.mode(), None);
        assert_eq!(ChangeNotification::new(Vec::new()).mode(), None);
    }

    #[test]
    fn ignores_non_map_properties() {
        let args = ChangeNotification::new(vec![
            owned(Value::from(Str::from("nl.whynothugo.darkman"))),
            owned(Value::from(Str::from("dark"))),
            owned(Value::from(Vec::<String>::new())),
        ]);
        assert_eq!(args.mode(), None);
    }

    #[test]
    fn ignores_non_string_keys() {
        let changed: HashMap<i32, Value<'_>> = HashMap::from([(1, Value::from(Str::from("dark")))]);
        let args = ChangeNotification::new(vec![
            owned(Value::from(Str::from("nl.whynothugo.darkman"))),
            owned(Value::from(changed)),
            owned(Value::from(Vec::<String>::new())),
        ]);
        assert_eq!(args.mode(), None);
    }

    #[test]
    fn ignores_missing_or_non_string_mode() {
        let unrelated = HashMap::from([("Brightness", Value::from(5i32))]);
        assert_eq!(notification(unrelated).mode(), None);

        let numeric = HashMap::from([("Mode", Value::from(42i32))]);
        assert_eq!(notification(numeric).mode(), None);
    }

    fn signal<B>(body: &B) -> Message
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        Message::signal(OBJECT_PATH, PROPERTIES_INTERFACE, PROPERTIES_CHANGED)
            .unwrap()
            .build(body)
            .unwrap()
    }

    #[test]
    fn decodes_properties_changed_message() {
        let changed = HashMap::from([("Mode", Value::from(Str::from("light")))]);
        let message = signal(&(NAMESPACE, changed, Vec::<String>::new()));

        assert!(mode_changed_rule().unwrap().matches(&message).unwrap());

        let notification = ChangeNotification::from_message(&message).expect("body should decode");
        assert_eq!(notification.args().len(), 3);
        assert_eq!(notification.mode().as_deref(), Some("light"));
    }

    #[test]
    fn decoded_message_with_numeric_mode_has_no_mode() {
        let changed = HashMap::from([("Mode", Value::from(42i32))]);
        let message = signal(&(NAMESPACE, changed, Vec::<String>::new()));

        let notification = ChangeNotification::from_message(&message).expect("body should decode");
        assert_eq!(notification.args().len(), 3);
        assert_eq!(notification.mode(), None);
    }

    #[test]
    fn decoded_two_argument_message_has_no_mode() {
        let changed = HashMap::from([("Mode", Value::from(Str::from("dark")))]);
        let message = signal(&(NAMESPACE, changed));

        let notification = ChangeNotification::from_message(&message).expect("body should decode");
        assert_eq!(notification.args().len(), 2);
        assert_eq!(notification.mode(), None);
    }

    #[tokio::test]
    async fn cancellation_stops_relay() {
        let cancel = CancellationToken::new();
        let mut modes = spawn_relay(futures::stream::pending::<ChangeNotification>(), cancel.clone());

        cancel.cancel();
        assert_eq!(modes.recv().await, None);
    }
}
