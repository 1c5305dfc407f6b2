use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use matcha_types::UserId;
use matcha_types::events::{
    self, ChatMessagePayload, Envelope, LikePayload, MatchPayload, NotificationPayload,
};
use matcha_types::models::NotificationKind;

use crate::toast::{Toast, ToastKind};

/// What a realtime event asks the client to do besides refreshing counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effects {
    /// The frame's `type`.
    pub kind: &'static str,
    pub toast: Option<Toast>,
    /// Users whose conversation with us may have changed.
    pub touches: Vec<UserId>,
}

impl Effects {
    fn new(kind: &'static str) -> Self {
        Self { kind, toast: None, touches: Vec::new() }
    }

    fn with_toast(mut self, kind: ToastKind, text: String) -> Self {
        self.toast = Some(Toast::new(kind, text));
        self
    }

    fn touching(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.touches.extend(users);
        self
    }
}

type Handler = fn(Value) -> Effects;

/// Routes realtime frames to a handler by their `type`.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Handler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert(events::NOTIFICATION, on_notification);
        handlers.insert(events::CHAT_MESSAGE, on_chat_message);
        handlers.insert(events::LIKE, on_like);
        handlers.insert(events::UNLIKE, on_unlike);
        handlers.insert(events::MATCH, on_match);
        Self { handlers }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one text frame. `None` for invalid JSON or an unknown `type`.
    /// A known `type` always yields [`Effects`], even when its payload is
    /// malformed.
    pub fn dispatch(&self, text: &str) -> Option<Effects> {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Ignoring unparseable realtime frame: {}", e);
                return None;
            }
        };

        let Some(handler) = self.handlers.get(envelope.kind.as_str()) else {
            debug!("Ignoring realtime frame of unknown type '{}'", envelope.kind);
            return None;
        };

        Some(handler(envelope.data))
    }
}

/// Decode `data`, treating a missing, null or malformed payload as empty.
fn payload<T: DeserializeOwned + Default>(kind: &str, data: Value) -> T {
    if data.is_null() {
        return T::default();
    }
    serde_json::from_value(data).unwrap_or_else(|e| {
        debug!("Malformed '{}' payload, using defaults: {}", kind, e);
        T::default()
    })
}

fn who(username: Option<&str>) -> &str {
    username.filter(|name| !name.is_empty()).unwrap_or("Someone")
}

fn on_notification(data: Value) -> Effects {
    let data: NotificationPayload = payload(events::NOTIFICATION, data);
    let effects = Effects::new(events::NOTIFICATION);
    let name = who(data.from_username.as_deref());
    let text = |fallback: String| data.message.clone().filter(|m| !m.is_empty()).unwrap_or(fallback);

    match data.kind {
        Some(NotificationKind::Message) => effects.touching(data.from_user_id),
        Some(NotificationKind::ProfileView) => {
            effects.with_toast(ToastKind::ProfileView, text(format!("{} viewed your profile", name)))
        }
        Some(NotificationKind::Like) => effects.with_toast(ToastKind::Like, text(format!("{} liked your profile!", name))),
        Some(NotificationKind::Unlike) => {
            effects.with_toast(ToastKind::Unlike, text(format!("{} no longer likes you", name)))
        }
        Some(NotificationKind::Match) => {
            effects.with_toast(ToastKind::Match, text(format!("New match with {}!", name)))
        }
        Some(NotificationKind::Other) | None => {
            effects.with_toast(ToastKind::Info, text("New notification".to_string()))
        }
    }
}

fn on_chat_message(data: Value) -> Effects {
    let effects = Effects::new(events::CHAT_MESSAGE);
    match serde_json::from_value::<ChatMessagePayload>(data) {
        Ok(data) => effects.touching([data.message.sender_id, data.message.recipient_id]),
        Err(e) => {
            debug!("Malformed '{}' payload, nothing to reconcile: {}", events::CHAT_MESSAGE, e);
            effects
        }
    }
}

fn on_like(data: Value) -> Effects {
    let data: LikePayload = payload(events::LIKE, data);
    let text = format!("{} liked your profile!", who(data.from_username.as_deref()));
    Effects::new(events::LIKE).with_toast(ToastKind::Like, text)
}

fn on_unlike(_data: Value) -> Effects {
    Effects::new(events::UNLIKE)
}

fn on_match(data: Value) -> Effects {
    let data: MatchPayload = payload(events::MATCH, data);
    let text = format!("You have a new match with {}!", who(data.matched_username.as_deref()));
    Effects::new(events::MATCH).with_toast(ToastKind::Match, text)
}
