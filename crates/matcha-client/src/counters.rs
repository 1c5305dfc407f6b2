use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::api::ChatApi;
use crate::view::View;

/// Last known unread counts. `None` until the first successful fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub unread_messages: Option<u32>,
    pub unread_notifications: Option<u32>,
}

#[derive(Debug, Default)]
struct Applied {
    snapshot: CounterSnapshot,
    messages_seq: u64,
    notifications_seq: u64,
}

/// Keeps the two unread counters current.
///
/// Refreshes may overlap. Each one takes a sequence number when it starts and
/// a result is applied only if no later refresh has already applied one for
/// the same counter.
#[derive(Debug, Default)]
pub struct CounterReconciler {
    next_seq: AtomicU64,
    applied: Mutex<Applied>,
}

impl CounterReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.applied.lock().unwrap_or_else(PoisonError::into_inner).snapshot
    }

    /// Fetch both counts concurrently and publish whichever succeed. A failed
    /// fetch leaves its counter at the previous value. Never fails as a whole.
    pub async fn refresh<A, V>(&self, api: &A, view: &V) -> CounterSnapshot
    where
        A: ChatApi,
        V: View + ?Sized,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let (messages, notifications) =
            tokio::join!(api.unread_message_count(), api.unread_notification_count());

        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        match messages {
            Ok(count) if seq > applied.messages_seq => {
                applied.messages_seq = seq;
                applied.snapshot.unread_messages = Some(count);
                view.set_unread_messages(count);
            }
            Ok(_) => debug!("Discarding superseded unread message count"),
            Err(e) => debug!("Unread message count unavailable: {}", e),
        }
        match notifications {
            Ok(count) if seq > applied.notifications_seq => {
                applied.notifications_seq = seq;
                applied.snapshot.unread_notifications = Some(count);
                view.set_unread_notifications(count);
            }
            Ok(_) => debug!("Discarding superseded unread notification count"),
            Err(e) => debug!("Unread notification count unavailable: {}", e),
        }
        applied.snapshot
    }
}
