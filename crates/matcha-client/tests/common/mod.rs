//! Fakes shared by the integration tests: an in-memory `ChatApi`, a `View`
//! that records every call, and a connector driven by a script.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use url::Url;

use matcha_client::channel::{Connector, Frame, FrameStream};
use matcha_client::{ChatApi, ClientConfig, ClientError, Result, Toast, ToastId, View};
use matcha_types::models::{Conversation, Notification, UserStatus};
use matcha_types::{Message, MessageId, NotificationId, UserId};

pub const ME: UserId = 1;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
}

pub fn message(id: MessageId, from: UserId, to: UserId, secs: i64) -> Message {
    Message {
        id,
        sender_id: from,
        recipient_id: to,
        content: format!("message {}", id),
        is_read: false,
        created_at: at(secs),
        sender_username: None,
        sender_name: None,
    }
}

/// `count` messages alternating between `ME` and `peer`, ids starting at
/// `first_id`, one second apart.
pub fn history(peer: UserId, first_id: MessageId, count: usize) -> Vec<Message> {
    (0..count as i64)
        .map(|i| {
            let id = first_id + i;
            if i % 2 == 0 { message(id, peer, ME, id) } else { message(id, ME, peer, id) }
        })
        .collect()
}

pub fn ids(messages: &[Message]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}

/// Config for timer tests: default timings, realtime on a dummy host.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        base_url: Url::parse("http://matcha.test").unwrap(),
        ..ClientConfig::default()
    }
}

fn server_error() -> ClientError {
    ClientError::Status { status: 500, body: "boom".to_string() }
}

// -- ChatApi --

#[derive(Default)]
struct ApiState {
    conversations: HashMap<UserId, Vec<Message>>,
    gates: HashMap<UserId, VecDeque<oneshot::Receiver<()>>>,
    fail_pages: bool,
    unread_messages: Option<u32>,
    unread_notifications: Option<u32>,
    calls: Vec<String>,
    next_id: MessageId,
}

/// In-memory server. Conversation pages are cut newest-first by offset and
/// returned oldest-first, like the real endpoint. Peers without a stored
/// conversation answer with `NoConversation`.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<ApiState>>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut state = api.state.lock().unwrap();
            state.next_id = 10_000;
            state.unread_messages = Some(0);
            state.unread_notifications = Some(0);
        }
        api
    }

    pub fn with_conversation(self, peer: UserId, messages: Vec<Message>) -> Self {
        self.state.lock().unwrap().conversations.insert(peer, messages);
        self
    }

    /// A message from `peer` lands on the server.
    pub fn receive(&self, peer: UserId, id: MessageId, secs: i64) {
        let mut state = self.state.lock().unwrap();
        state.conversations.entry(peer).or_default().push(message(id, peer, ME, secs));
    }

    /// Hold the next page request for `peer` until the returned sender fires.
    pub fn gate(&self, peer: UserId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().gates.entry(peer).or_default().push_back(rx);
        tx
    }

    pub fn fail_pages(&self, fail: bool) {
        self.state.lock().unwrap().fail_pages = fail;
    }

    /// `None` makes the count request fail.
    pub fn set_unread_messages(&self, count: Option<u32>) {
        self.state.lock().unwrap().unread_messages = count;
    }

    pub fn set_unread_notifications(&self, count: Option<u32>) {
        self.state.lock().unwrap().unread_notifications = count;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl ChatApi for FakeApi {
    async fn conversation_page(&self, peer: UserId, limit: usize, offset: usize) -> Result<Vec<Message>> {
        self.record(format!("page {} {}", peer, offset));
        let gate = self.state.lock().unwrap().gates.get_mut(&peer).and_then(|q| q.pop_front());
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_pages {
            return Err(server_error());
        }
        let Some(all) = state.conversations.get(&peer).filter(|m| !m.is_empty()) else {
            return Err(ClientError::NoConversation(peer));
        };
        let mut all = all.clone();
        all.sort_by_key(|m| m.created_at);
        let end = all.len().saturating_sub(offset);
        let start = end.saturating_sub(limit);
        Ok(all[start..end].to_vec())
    }

    async fn send_message(&self, recipient: UserId, content: &str) -> Result<Message> {
        self.record(format!("send {}", recipient));
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let mut sent = message(state.next_id, ME, recipient, state.next_id);
        sent.content = content.to_string();
        state.conversations.entry(recipient).or_default().push(sent.clone());
        Ok(sent)
    }

    async fn mark_conversation_read(&self, peer: UserId) -> Result<()> {
        self.record(format!("read {}", peer));
        Ok(())
    }

    async fn unread_message_count(&self) -> Result<u32> {
        self.record("count messages".to_string());
        self.state.lock().unwrap().unread_messages.ok_or_else(server_error)
    }

    async fn unread_notification_count(&self) -> Result<u32> {
        self.record("count notifications".to_string());
        self.state.lock().unwrap().unread_notifications.ok_or_else(server_error)
    }

    async fn mark_all_notifications_read(&self) -> Result<()> {
        self.record("notifications read all".to_string());
        self.state.lock().unwrap().unread_notifications = Some(0);
        Ok(())
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        self.record(format!("notification read {}", id));
        Ok(())
    }

    async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.record("conversations".to_string());
        Ok(Vec::new())
    }

    async fn notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        self.record(format!("notifications {}", limit));
        Ok(Vec::new())
    }

    async fn user_status(&self, user: UserId) -> Result<UserStatus> {
        self.record(format!("status {}", user));
        Ok(UserStatus { is_online: true, last_connection: None, last_connection_formatted: None })
    }
}

// -- View --

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Render { peer: UserId, ids: Vec<MessageId> },
    NewMatch(UserId),
    Closed(UserId),
    UnreadMessages(u32),
    UnreadNotifications(u32),
    ShowToast(ToastId, Toast),
    DismissToast(ToastId),
}

#[derive(Clone, Default)]
pub struct RecordingView {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn renders(&self) -> Vec<(UserId, Vec<MessageId>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Render { peer, ids } => Some((peer, ids)),
                _ => None,
            })
            .collect()
    }

    pub fn toasts_shown(&self) -> Vec<(ToastId, Toast)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::ShowToast(id, toast) => Some((id, toast)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl View for RecordingView {
    fn render_conversation(&self, peer: UserId, messages: &[Message]) {
        self.push(ViewEvent::Render { peer, ids: ids(messages) });
    }

    fn show_new_match(&self, peer: UserId) {
        self.push(ViewEvent::NewMatch(peer));
    }

    fn conversation_closed(&self, peer: UserId) {
        self.push(ViewEvent::Closed(peer));
    }

    fn set_unread_messages(&self, count: u32) {
        self.push(ViewEvent::UnreadMessages(count));
    }

    fn set_unread_notifications(&self, count: u32) {
        self.push(ViewEvent::UnreadNotifications(count));
    }

    fn show_toast(&self, id: ToastId, toast: &Toast) {
        self.push(ViewEvent::ShowToast(id, toast.clone()));
    }

    fn dismiss_toast(&self, id: ToastId) {
        self.push(ViewEvent::DismissToast(id));
    }
}

// -- Connector --

enum Step {
    Fail,
    Open(mpsc::UnboundedReceiver<Result<Frame>>),
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    attempts: Vec<Instant>,
}

/// Plays back a queue of connection outcomes. Once the queue is empty every
/// connect fails.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.state.lock().unwrap().steps.push_back(Step::Fail);
    }

    /// The next connect succeeds. Frames pushed into the returned sender are
    /// delivered; dropping it closes the connection.
    pub fn open_next(&self) -> mpsc::UnboundedSender<Result<Frame>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().steps.push_back(Step::Open(rx));
        tx
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn gaps(&self) -> Vec<Duration> {
        self.attempts().windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> Result<FrameStream> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.attempts.push(Instant::now());
            state.steps.pop_front()
        };
        match step {
            Some(Step::Open(rx)) => Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            })
            .boxed()),
            Some(Step::Fail) | None => Err(ClientError::Status { status: 503, body: "unavailable".to_string() }),
        }
    }
}

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
