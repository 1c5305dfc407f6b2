use std::sync::{Mutex, MutexGuard, PoisonError};

use matcha_types::{Message, UserId};

use crate::config::PAGE_SIZE;
use crate::store::MessageStore;

/// State of the one conversation the user has open.
#[derive(Debug)]
pub struct ConversationSession {
    peer_id: UserId,
    store: MessageStore,
    next_offset: usize,
    loading: bool,
    has_more: bool,
    new_match: bool,
    /// Size of the newest page at the last reconcile, the poller's cheap
    /// "anything new?" pre-check.
    last_polled_count: usize,
}

impl ConversationSession {
    fn new(peer_id: UserId) -> Self {
        Self {
            peer_id,
            store: MessageStore::new(),
            next_offset: 0,
            loading: false,
            has_more: true,
            new_match: false,
            last_polled_count: 0,
        }
    }

    pub fn peer_id(&self) -> UserId {
        self.peer_id
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// The peer is a match with no messages exchanged yet.
    pub fn is_new_match(&self) -> bool {
        self.new_match
    }

    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    /// Claim the loading flag for the next page. `None` while a load is in
    /// flight or once the server has run out of pages.
    pub fn begin_page_load(&mut self) -> Option<usize> {
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        Some(self.next_offset)
    }

    /// Apply a fetched page that started at `offset`. Returns the number of
    /// messages that were new to the store.
    pub fn finish_page_load(&mut self, offset: usize, page: &[Message]) -> usize {
        self.loading = false;
        self.next_offset = offset + page.len();
        self.has_more = page.len() >= PAGE_SIZE;
        if offset == 0 {
            self.last_polled_count = page.len();
        }
        if !page.is_empty() {
            self.new_match = false;
        }
        self.store.merge(page)
    }

    /// The server reported no conversation for this peer.
    pub fn finish_without_conversation(&mut self, offset: usize) {
        self.loading = false;
        self.has_more = false;
        if offset == 0 && self.store.is_empty() {
            self.new_match = true;
        }
    }

    /// A page load failed; leave everything as it was so it can be retried.
    pub fn abort_page_load(&mut self) {
        self.loading = false;
    }

    /// True if the newest page has grown or carries an id the store lacks.
    pub fn needs_reconcile(&self, newest: &[Message]) -> bool {
        newest.len() > self.last_polled_count || self.store.has_unseen(newest)
    }

    /// Merge a freshly polled newest page. Returns how many messages were new.
    pub fn reconcile(&mut self, newest: &[Message]) -> usize {
        self.last_polled_count = newest.len();
        if !newest.is_empty() {
            self.new_match = false;
        }
        self.store.merge(newest)
    }

    /// Merge messages obtained outside of paging, such as one just sent.
    pub fn insert(&mut self, messages: &[Message]) -> usize {
        if !messages.is_empty() {
            self.new_match = false;
        }
        self.store.merge(messages)
    }
}

/// Identifies one opening of a conversation. Work started under a ticket is
/// applied only while that ticket is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    generation: u64,
    peer_id: UserId,
}

impl SessionTicket {
    pub fn peer_id(&self) -> UserId {
        self.peer_id
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    session: Option<ConversationSession>,
}

/// Holder of the single active [`ConversationSession`].
#[derive(Debug, Default)]
pub struct SessionSlot {
    state: Mutex<SlotState>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace whatever was open with a fresh session for `peer`, with the
    /// first page load already claimed.
    pub fn open(&self, peer: UserId) -> SessionTicket {
        let mut state = self.lock();
        state.generation += 1;
        let mut session = ConversationSession::new(peer);
        session.loading = true;
        state.session = Some(session);
        SessionTicket { generation: state.generation, peer_id: peer }
    }

    /// Discard the open session. Returns the peer that was open, if any.
    pub fn close(&self) -> Option<UserId> {
        let mut state = self.lock();
        state.generation += 1;
        state.session.take().map(|s| s.peer_id)
    }

    /// Ticket of the session currently open.
    pub fn current(&self) -> Option<SessionTicket> {
        let state = self.lock();
        state
            .session
            .as_ref()
            .map(|s| SessionTicket { generation: state.generation, peer_id: s.peer_id })
    }

    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        self.current() == Some(ticket)
    }

    pub fn active_peer(&self) -> Option<UserId> {
        self.lock().session.as_ref().map(|s| s.peer_id)
    }

    /// Run `f` against the session, but only if `ticket` is still current.
    pub fn with_current<R>(&self, ticket: SessionTicket, f: impl FnOnce(&mut ConversationSession) -> R) -> Option<R> {
        let mut state = self.lock();
        if state.generation != ticket.generation {
            return None;
        }
        state.session.as_mut().filter(|s| s.peer_id == ticket.peer_id).map(f)
    }

    /// Run `f` against whatever session is open.
    pub fn with_active<R>(&self, f: impl FnOnce(SessionTicket, &mut ConversationSession) -> R) -> Option<R> {
        let mut state = self.lock();
        let generation = state.generation;
        state
            .session
            .as_mut()
            .map(|s| f(SessionTicket { generation, peer_id: s.peer_id }, s))
    }
}
