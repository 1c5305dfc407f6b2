use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use matcha_types::models::{Conversation, Notification};
use matcha_types::{Message, NotificationId, UserId};

use crate::api::ChatApi;
use crate::channel::{ChannelHandle, ChannelStatus, Connector, FrameSink};
use crate::config::{ClientConfig, PAGE_SIZE};
use crate::counters::{CounterReconciler, CounterSnapshot};
use crate::dispatch::Dispatcher;
use crate::error::{ClientError, Result};
use crate::polling::{self, PollHandle, PollOutcome};
use crate::presence::{self, Presence};
use crate::session::{SessionSlot, SessionTicket};
use crate::toast::{Toast, ToastSlot};
use crate::view::View;

/// What happened to a conversation page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page arrived and added this many messages.
    Loaded(usize),
    /// The peer is a match with no messages yet.
    NoConversation,
    /// Another conversation was opened (or this one closed) before the page
    /// arrived; it was discarded.
    Stale,
    /// A load was already in flight, or there are no older pages.
    Skipped,
}

/// The realtime reconciliation core: one open conversation with its poller,
/// the realtime channel, unread counters and toasts.
///
/// Dropping the client cancels every background task it started.
pub struct Client<A: ChatApi, V: View> {
    shared: Arc<Shared<A, V>>,
}

struct Shared<A, V> {
    api: A,
    view: V,
    config: ClientConfig,
    sessions: SessionSlot,
    poller: Mutex<Option<PollHandle>>,
    counters: CounterReconciler,
    counter_loop: Mutex<Option<JoinHandle<()>>>,
    toasts: ToastSlot,
    dispatcher: Dispatcher,
    channel: Mutex<Option<ChannelHandle>>,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: ChatApi, V: View> Client<A, V> {
    pub fn new(api: A, view: V, config: ClientConfig) -> Self {
        let shared = Arc::new(Shared {
            api,
            view,
            config,
            sessions: SessionSlot::new(),
            poller: Mutex::new(None),
            counters: CounterReconciler::new(),
            counter_loop: Mutex::new(None),
            toasts: ToastSlot::new(),
            dispatcher: Dispatcher::new(),
            channel: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        Self { shared }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn view(&self) -> &V {
        &self.shared.view
    }

    /// Start the periodic counter refresh and the realtime channel. Calling it
    /// again while they run does nothing.
    pub fn start<C: Connector>(&self, connector: C) -> Result<()> {
        let url = self.shared.config.ws_url()?;

        {
            let mut counter_loop = lock(&self.shared.counter_loop);
            if counter_loop.is_none() {
                *counter_loop = Some(self.shared.spawn_counter_loop());
            }
        }

        let mut channel = lock(&self.shared.channel);
        if channel.is_none() {
            info!("Starting realtime channel at {}", url);
            *channel = Some(ChannelHandle::spawn(
                connector,
                url,
                self.shared.config.reconnect,
                self.shared.clone(),
                &self.shared.cancel,
            ));
        }
        Ok(())
    }

    /// Make `peer` the open conversation and load its newest page.
    ///
    /// Whatever was open before is discarded and its poller stopped; a load
    /// still in flight for it will be ignored when it completes.
    pub async fn open_conversation(&self, peer: UserId) -> Result<LoadOutcome> {
        let ticket = self.shared.open_session(peer);
        debug!(peer, "Opening conversation");

        let outcome = self.shared.load_page(ticket, 0).await?;
        if matches!(outcome, LoadOutcome::Loaded(_)) {
            self.shared.mark_read_and_refresh(peer).await;
        }
        Ok(outcome)
    }

    /// Fetch the next older page of the open conversation.
    pub async fn load_next_page(&self) -> Result<LoadOutcome> {
        let claimed = self
            .shared
            .sessions
            .with_active(|ticket, session| session.begin_page_load().map(|offset| (ticket, offset)))
            .ok_or(ClientError::NoActiveConversation)?;
        match claimed {
            Some((ticket, offset)) => self.shared.load_page(ticket, offset).await,
            None => Ok(LoadOutcome::Skipped),
        }
    }

    /// Close the open conversation and stop its poller.
    pub fn close_conversation(&self) {
        let mut poller = lock(&self.shared.poller);
        if let Some(handle) = poller.take() {
            handle.stop();
        }
        if let Some(peer) = self.shared.sessions.close() {
            debug!(peer, "Closed conversation");
            self.shared.view.conversation_closed(peer);
        }
    }

    /// Send `content` to the peer of the open conversation.
    pub async fn send_message(&self, content: &str) -> Result<Message> {
        let peer = self.shared.sessions.active_peer().ok_or(ClientError::NoActiveConversation)?;
        self.send_message_to(peer, content).await
    }

    /// Send `content` to `peer`. If that conversation is open the message is
    /// merged in and the newest page reconciled.
    pub async fn send_message_to(&self, peer: UserId, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::InvalidInput("message content is empty".to_string()));
        }

        let sent = self.shared.api.send_message(peer, content).await?;
        debug!(peer, id = sent.id, "Message sent");

        let ticket = self.shared.sessions.current().filter(|t| t.peer_id() == peer);
        if let Some(ticket) = ticket {
            let view = &self.shared.view;
            self.shared.sessions.with_current(ticket, |session| {
                session.insert(std::slice::from_ref(&sent));
                view.render_conversation(peer, session.messages());
            });
            self.shared.clone().poll_tick(ticket).await;
        }
        Ok(sent)
    }

    pub async fn refresh_counters(&self) -> CounterSnapshot {
        self.shared.counters.refresh(&self.shared.api, &self.shared.view).await
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        self.shared.api.mark_notification_read(id).await?;
        self.refresh_counters().await;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        self.shared.api.mark_all_notifications_read().await?;
        self.refresh_counters().await;
        Ok(())
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.shared.api.conversations().await
    }

    pub async fn notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        self.shared.api.notifications(limit).await
    }

    pub async fn peer_presence(&self, user: UserId) -> Result<Presence> {
        let status = self.shared.api.user_status(user).await?;
        Ok(presence::classify(&status, Utc::now(), self.shared.config.presence_threshold))
    }

    /// Bring an exhausted realtime channel back. `false` if the channel is not
    /// running or has not given up.
    pub fn reconnect_realtime(&self) -> bool {
        lock(&self.shared.channel).as_ref().is_some_and(|channel| channel.reconnect())
    }

    pub fn channel_status(&self) -> Option<ChannelStatus> {
        lock(&self.shared.channel).as_ref().map(|channel| channel.status())
    }

    pub fn subscribe_channel(&self) -> Option<tokio::sync::watch::Receiver<ChannelStatus>> {
        lock(&self.shared.channel).as_ref().map(|channel| channel.subscribe())
    }

    pub fn active_peer(&self) -> Option<UserId> {
        self.shared.sessions.active_peer()
    }

    /// Display-ordered messages of the open conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.shared
            .sessions
            .with_active(|_, session| session.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn is_new_match(&self) -> bool {
        self.shared.sessions.with_active(|_, session| session.is_new_match()).unwrap_or(false)
    }

    pub fn has_more_pages(&self) -> bool {
        self.shared.sessions.with_active(|_, session| session.has_more()).unwrap_or(false)
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.shared.poller).as_ref().is_some_and(|poller| !poller.is_finished())
    }

    /// Stop every background task and wait for the long-running ones.
    pub async fn shutdown(self) {
        self.shared.cancel.cancel();
        self.close_conversation();

        let channel = lock(&self.shared.channel).take();
        if let Some(channel) = channel {
            channel.shutdown().await;
        }
        let counter_loop = lock(&self.shared.counter_loop).take();
        if let Some(task) = counter_loop {
            let _ = task.await;
        }
        info!("Client shut down");
    }
}

impl<A: ChatApi, V: View> Drop for Client<A, V> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl<A: ChatApi, V: View> Shared<A, V> {
    /// Swap in a fresh session and its poller as one step, so concurrent opens
    /// cannot leave the poller attached to the wrong session.
    fn open_session(self: &Arc<Self>, peer: UserId) -> SessionTicket {
        let mut poller = lock(&self.poller);
        if let Some(previous) = poller.take() {
            previous.stop();
        }
        let ticket = self.sessions.open(peer);
        let shared = self.clone();
        *poller = Some(PollHandle::start(self.config.poll_interval, &self.cancel, move || {
            shared.clone().poll_tick(ticket)
        }));
        ticket
    }

    async fn load_page(&self, ticket: SessionTicket, offset: usize) -> Result<LoadOutcome> {
        let peer = ticket.peer_id();
        let result = self.api.conversation_page(peer, PAGE_SIZE, offset).await;
        let view = &self.view;

        let applied = match result {
            Ok(page) => self.sessions.with_current(ticket, |session| {
                let added = session.finish_page_load(offset, &page);
                view.render_conversation(peer, session.messages());
                LoadOutcome::Loaded(added)
            }),
            Err(ClientError::NoConversation(_)) => self.sessions.with_current(ticket, |session| {
                session.finish_without_conversation(offset);
                if session.is_new_match() {
                    view.show_new_match(peer);
                }
                LoadOutcome::NoConversation
            }),
            Err(e) => {
                // Release the loading flag, unless the session is gone anyway.
                return match self.sessions.with_current(ticket, |session| session.abort_page_load()) {
                    Some(()) => Err(e),
                    None => Ok(LoadOutcome::Stale),
                };
            }
        };

        Ok(applied.unwrap_or_else(|| {
            debug!(peer, offset, "Discarding page for a conversation that is no longer open");
            LoadOutcome::Stale
        }))
    }

    /// One poller tick for `ticket`. Returns `false` once the ticket is stale.
    async fn poll_tick(self: Arc<Self>, ticket: SessionTicket) -> bool {
        let peer = ticket.peer_id();
        match polling::reconcile(&self.api, &self.view, &self.sessions, ticket).await {
            Ok(PollOutcome::Stale) => false,
            Ok(PollOutcome::Updated(added)) => {
                debug!(peer, added, "Poll brought new messages");
                self.mark_read_and_refresh(peer).await;
                true
            }
            Ok(_) => true,
            Err(e) if e.is_transient() => {
                debug!(peer, "Poll failed, retrying next tick: {}", e);
                true
            }
            Err(e) => {
                warn!(peer, "Poll failed: {}", e);
                true
            }
        }
    }

    async fn mark_read_and_refresh(&self, peer: UserId) {
        if let Err(e) = self.api.mark_conversation_read(peer).await {
            debug!(peer, "Marking conversation read failed: {}", e);
        }
        self.counters.refresh(&self.api, &self.view).await;
    }

    fn spawn_counter_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let shared = self.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(shared.config.counter_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = shared.counters.refresh(&shared.api, &shared.view) => {}
                }
            }
            debug!("Counter refresh loop stopped");
        })
    }

    /// Run `task` in the background until it finishes or the client shuts down.
    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = task => {}
            }
        });
    }

    fn show_toast(self: &Arc<Self>, toast: &Toast) {
        let id = self.toasts.show(&self.view, toast);
        let shared = self.clone();
        let lifetime = self.config.toast_lifetime;
        self.spawn_background(async move {
            tokio::time::sleep(lifetime).await;
            shared.toasts.expire(&shared.view, id);
        });
    }
}

impl<A: ChatApi, V: View> FrameSink for Shared<A, V> {
    fn deliver(self: &Arc<Self>, text: &str) {
        let Some(effects) = self.dispatcher.dispatch(text) else {
            return;
        };
        debug!(kind = effects.kind, "Realtime event");

        let shared = self.clone();
        self.spawn_background(async move {
            shared.counters.refresh(&shared.api, &shared.view).await;
        });

        if let Some(toast) = &effects.toast {
            self.show_toast(toast);
        }

        if let Some(ticket) = self.sessions.current() {
            if effects.touches.contains(&ticket.peer_id()) {
                let shared = self.clone();
                self.spawn_background(async move {
                    shared.poll_tick(ticket).await;
                });
            }
        }
    }
}
