use std::future::Future;

use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use matcha_types::api::{NotificationQuery, PageQuery, SendMessageRequest, UnreadCountResponse};
use matcha_types::models::{Conversation, Notification, UserStatus, decode_messages};
use matcha_types::{Message, NotificationId, UserId};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// The REST endpoints the realtime core consumes.
///
/// Implemented over HTTP by [`HttpApi`]; tests swap in an in-memory fake.
pub trait ChatApi: Send + Sync + 'static {
    /// One page of the conversation with `peer`, oldest first. A peer with no
    /// messages yet yields [`ClientError::NoConversation`].
    fn conversation_page(
        &self,
        peer: UserId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    fn send_message(&self, recipient: UserId, content: &str) -> impl Future<Output = Result<Message>> + Send;

    fn mark_conversation_read(&self, peer: UserId) -> impl Future<Output = Result<()>> + Send;

    fn unread_message_count(&self) -> impl Future<Output = Result<u32>> + Send;

    fn unread_notification_count(&self) -> impl Future<Output = Result<u32>> + Send;

    fn mark_all_notifications_read(&self) -> impl Future<Output = Result<()>> + Send;

    fn mark_notification_read(&self, id: NotificationId) -> impl Future<Output = Result<()>> + Send;

    fn conversations(&self) -> impl Future<Output = Result<Vec<Conversation>>> + Send;

    fn notifications(&self, limit: usize) -> impl Future<Output = Result<Vec<Notification>>> + Send;

    fn user_status(&self, user: UserId) -> impl Future<Output = Result<UserStatus>> + Send;
}

/// [`ChatApi`] over `reqwest`, authenticated by a session cookie.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| ClientError::Config("session cookie is not a valid header value".to_string()))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base_url: config.base_url.clone() })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)?).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    async fn unread_count(&self, path: &str) -> Result<u32> {
        let body: UnreadCountResponse = self.get_json(path).await?;
        Ok(body.unread_count)
    }
}

impl ChatApi for HttpApi {
    async fn conversation_page(&self, peer: UserId, limit: usize, offset: usize) -> Result<Vec<Message>> {
        let resp = self
            .http
            .get(self.url(&format!("/api/chat/conversation/{}", peer))?)
            .query(&PageQuery { limit, offset })
            .send()
            .await?;

        // A match nobody has written to yet comes back as a 400, or as a body
        // that is not a JSON array.
        if resp.status() == StatusCode::BAD_REQUEST {
            return Err(ClientError::NoConversation(peer));
        }
        let resp = ensure_success(resp).await?;

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        if !is_json {
            return Err(ClientError::NoConversation(peer));
        }

        let body: serde_json::Value = match resp.json().await {
            Ok(body) => body,
            Err(e) if e.is_decode() => return Err(ClientError::NoConversation(peer)),
            Err(e) => return Err(e.into()),
        };
        match body {
            serde_json::Value::Array(entries) => {
                let total = entries.len();
                let messages = decode_messages(entries);
                if messages.len() < total {
                    debug!("Conversation {} page at {} dropped {} entries", peer, offset, total - messages.len());
                }
                Ok(messages)
            }
            _ => Err(ClientError::NoConversation(peer)),
        }
    }

    async fn send_message(&self, recipient: UserId, content: &str) -> Result<Message> {
        let resp = self
            .http
            .post(self.url("/api/chat/send")?)
            .json(&SendMessageRequest { recipient_id: recipient, content: content.to_string() })
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    async fn mark_conversation_read(&self, peer: UserId) -> Result<()> {
        let resp = self
            .http
            .put(self.url(&format!("/api/chat/conversation/{}/read", peer))?)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn unread_message_count(&self) -> Result<u32> {
        self.unread_count("/api/chat/unread-count").await
    }

    async fn unread_notification_count(&self) -> Result<u32> {
        self.unread_count("/api/notifications/unread-count").await
    }

    async fn mark_all_notifications_read(&self) -> Result<()> {
        let resp = self.http.post(self.url("/api/notifications/mark-all-read")?).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        let resp = self
            .http
            .put(self.url(&format!("/api/notifications/{}/read", id))?)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.get_json("/api/chat/conversations").await
    }

    async fn notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        let resp = self
            .http
            .get(self.url("/api/notifications")?)
            .query(&NotificationQuery { limit })
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    async fn user_status(&self, user: UserId) -> Result<UserStatus> {
        self.get_json(&format!("/api/profile/{}/status", user)).await
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status { status: status.as_u16(), body })
}
