//! Wire types shared by the Matcha client crates: the REST models, the request
//! and response bodies, and the realtime frame envelope with its payloads.

pub mod api;
pub mod events;
pub mod models;

pub use models::{Message, MessageId, NotificationId, UserId};
