use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::view::View;

pub type ToastId = u64;

/// What a toast announces. Drives its presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    ProfileView,
    Like,
    Unlike,
    Match,
    Info,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProfileView => "profile_view",
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Match => "match",
            Self::Info => "info",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub text: String,
}

impl Toast {
    pub fn new(kind: ToastKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

/// Keeps at most one toast on screen.
#[derive(Debug, Default)]
pub struct ToastSlot {
    next_id: AtomicU64,
    visible: Mutex<Option<ToastId>>,
}

impl ToastSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dismiss the visible toast, if any, then show `toast`.
    pub fn show<V: View + ?Sized>(&self, view: &V, toast: &Toast) -> ToastId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut visible = self.visible.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = visible.take() {
            view.dismiss_toast(previous);
        }
        view.show_toast(id, toast);
        *visible = Some(id);
        id
    }

    /// Lifetime of `id` ran out. No-op if it was already replaced.
    pub fn expire<V: View + ?Sized>(&self, view: &V, id: ToastId) -> bool {
        let mut visible = self.visible.lock().unwrap_or_else(PoisonError::into_inner);
        if *visible != Some(id) {
            return false;
        }
        *visible = None;
        view.dismiss_toast(id);
        true
    }

    pub fn visible(&self) -> Option<ToastId> {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
