//! Realtime reconciliation core of the Matcha client.
//!
//! Keeps the open conversation, the unread counters and the toast area in
//! step with the server through two paths: a fixed-interval poller and a push
//! channel over WebSocket that reconnects with exponential backoff.

pub mod api;
pub mod backoff;
pub mod channel;
pub mod client;
pub mod config;
pub mod counters;
pub mod dispatch;
pub mod error;
pub mod polling;
pub mod presence;
pub mod session;
pub mod store;
pub mod toast;
pub mod view;

pub use api::{ChatApi, HttpApi};
pub use backoff::ReconnectPolicy;
pub use channel::{ChannelStatus, ConnectionState, Connector, Frame, FrameStream, TungsteniteConnector};
pub use client::{Client, LoadOutcome};
pub use config::{ClientConfig, PAGE_SIZE};
pub use counters::CounterSnapshot;
pub use error::{ClientError, Result};
pub use presence::Presence;
pub use toast::{Toast, ToastId, ToastKind};
pub use view::{TracingView, View};
