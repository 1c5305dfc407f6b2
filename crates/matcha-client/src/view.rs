//! Presentation seam.
//!
//! The realtime core never draws anything itself; it reports state changes to
//! a [`View`]. Calls arrive from background tasks, so implementations must be
//! cheap and must not call back into the client.

use matcha_types::{Message, UserId};
use tracing::{debug, info};

use crate::toast::{Toast, ToastId};

pub trait View: Send + Sync + 'static {
    /// The open conversation changed. `messages` is the full display-ordered
    /// set, oldest first.
    fn render_conversation(&self, peer: UserId, messages: &[Message]);

    /// The open conversation is a match nobody has written to yet.
    fn show_new_match(&self, _peer: UserId) {}

    fn conversation_closed(&self, _peer: UserId) {}

    fn set_unread_messages(&self, count: u32);

    fn set_unread_notifications(&self, count: u32);

    fn show_toast(&self, _id: ToastId, _toast: &Toast) {}

    fn dismiss_toast(&self, _id: ToastId) {}
}

/// View that turns every state change into a `tracing` event.
pub struct TracingView;

impl View for TracingView {
    fn render_conversation(&self, peer: UserId, messages: &[Message]) {
        info!(peer, count = messages.len(), "conversation updated");
        for message in messages {
            debug!(
                peer,
                id = message.id,
                from = message.sender_id,
                at = %message.created_at,
                "{}",
                message.content,
            );
        }
    }

    fn show_new_match(&self, peer: UserId) {
        info!(peer, "new match, no messages yet");
    }

    fn conversation_closed(&self, peer: UserId) {
        debug!(peer, "conversation closed");
    }

    fn set_unread_messages(&self, count: u32) {
        info!(unread_messages = count, "unread messages");
    }

    fn set_unread_notifications(&self, count: u32) {
        info!(unread_notifications = count, "unread notifications");
    }

    fn show_toast(&self, id: ToastId, toast: &Toast) {
        info!(toast = id, kind = %toast.kind, "{}", toast.text);
    }

    fn dismiss_toast(&self, id: ToastId) {
        debug!(toast = id, "toast dismissed");
    }
}
