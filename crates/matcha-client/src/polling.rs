use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ChatApi;
use crate::config::PAGE_SIZE;
use crate::error::{ClientError, Result};
use crate::session::{SessionSlot, SessionTicket};
use crate::view::View;

/// Result of reconciling the open conversation against its newest page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// New messages were merged and the conversation re-rendered.
    Updated(usize),
    Unchanged,
    /// A page load was in flight; nothing was fetched.
    Busy,
    /// Still a match without messages.
    NoConversation,
    /// The session closed or changed while the fetch was out.
    Stale,
}

/// Fetch the newest page for `ticket`'s peer and merge it if it brings
/// anything new.
pub async fn reconcile<A, V>(api: &A, view: &V, sessions: &SessionSlot, ticket: SessionTicket) -> Result<PollOutcome>
where
    A: ChatApi,
    V: View + ?Sized,
{
    match sessions.with_current(ticket, |s| s.is_loading()) {
        None => return Ok(PollOutcome::Stale),
        Some(true) => return Ok(PollOutcome::Busy),
        Some(false) => {}
    }

    let peer = ticket.peer_id();
    let newest = match api.conversation_page(peer, PAGE_SIZE, 0).await {
        Ok(page) => page,
        Err(ClientError::NoConversation(_)) => {
            return Ok(if sessions.is_current(ticket) { PollOutcome::NoConversation } else { PollOutcome::Stale });
        }
        Err(e) => return Err(e),
    };

    let outcome = sessions.with_current(ticket, |session| {
        if session.is_loading() || !session.needs_reconcile(&newest) {
            return PollOutcome::Unchanged;
        }
        let added = session.reconcile(&newest);
        view.render_conversation(peer, session.messages());
        PollOutcome::Updated(added)
    });
    Ok(outcome.unwrap_or(PollOutcome::Stale))
}

/// The conversation polling timer.
///
/// Ticks every `period`, first tick one period after start. The tick closure
/// returns `false` to stop the timer for good.
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn start<F, Fut>(period: Duration, parent: &CancellationToken, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let keep_going = tokio::select! {
                    _ = token.cancelled() => break,
                    keep_going = tick() => keep_going,
                };
                if !keep_going {
                    break;
                }
            }
            debug!("Poller stopped");
        });
        Self { cancel, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop ticking. A tick already in flight is abandoned at its next await.
    pub fn stop(self) {
        self.cancel.cancel();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
