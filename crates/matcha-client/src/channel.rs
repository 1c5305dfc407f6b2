use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::{ClientError, Result};

/// A frame read off the realtime socket, reduced to what the client cares
/// about. The client never writes to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
    /// Binary, ping and pong frames.
    Other,
}

pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// Opens the realtime socket.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> impl Future<Output = Result<FrameStream>> + Send;
}

/// Receives every text frame while the channel is open.
pub trait FrameSink: Send + Sync + 'static {
    fn deliver(self: &Arc<Self>, text: &str);
}

/// [`Connector`] over `tokio-tungstenite`, carrying the session cookie in the
/// handshake.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector {
    cookie: Option<String>,
}

impl TungsteniteConnector {
    pub fn new(cookie: Option<String>) -> Self {
        Self { cookie }
    }
}

impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<FrameStream> {
        let mut request = url.as_str().into_client_request()?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| ClientError::Config("session cookie is not a valid header value".to_string()))?;
            request.headers_mut().insert(COOKIE, value);
        }

        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        let frames = ws.map(|msg| match msg {
            Ok(WsMessage::Text(text)) => Ok(Frame::Text(text.to_string())),
            Ok(WsMessage::Close(_)) => Ok(Frame::Close),
            Ok(_) => Ok(Frame::Other),
            Err(e) => Err(ClientError::from(e)),
        });
        Ok(frames.boxed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Observable state of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ConnectionState,
    /// Reconnects scheduled since the last successful open.
    pub reconnect_attempts: u32,
    /// Automatic reconnection gave up; only [`ChannelHandle::reconnect`]
    /// brings the channel back.
    pub exhausted: bool,
}

impl ChannelStatus {
    fn new(state: ConnectionState, reconnect_attempts: u32) -> Self {
        Self { state, reconnect_attempts, exhausted: false }
    }

    /// Not open, so only the polling paths are keeping the client current.
    pub fn is_degraded(&self) -> bool {
        self.state != ConnectionState::Open
    }
}

/// The running realtime channel task.
pub struct ChannelHandle {
    status: watch::Receiver<ChannelStatus>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub fn spawn<C, S>(
        connector: C,
        url: Url,
        policy: ReconnectPolicy,
        sink: Arc<S>,
        parent: &CancellationToken,
    ) -> Self
    where
        C: Connector,
        S: FrameSink,
    {
        let (tx, status) = watch::channel(ChannelStatus::new(ConnectionState::Connecting, 0));
        let wake = Arc::new(Notify::new());
        let cancel = parent.child_token();
        let task = tokio::spawn(run(connector, url, policy, sink, tx, wake.clone(), cancel.clone()));
        Self { status, wake, cancel, task }
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Resume an exhausted channel with a fresh attempt budget. Returns false
    /// (and does nothing) while automatic reconnection is still in charge.
    pub fn reconnect(&self) -> bool {
        if !self.status().exhausted {
            return false;
        }
        self.wake.notify_one();
        true
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run<C, S>(
    connector: C,
    url: Url,
    policy: ReconnectPolicy,
    sink: Arc<S>,
    status: watch::Sender<ChannelStatus>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) where
    C: Connector,
    S: FrameSink,
{
    let mut attempts: u32 = 0;

    'connect: loop {
        status.send_replace(ChannelStatus::new(ConnectionState::Connecting, attempts));

        let connected = tokio::select! {
            _ = cancel.cancelled() => break 'connect,
            result = connector.connect(&url) => result,
        };

        match connected {
            Ok(mut frames) => {
                attempts = 0;
                status.send_replace(ChannelStatus::new(ConnectionState::Open, 0));
                info!("Realtime channel open at {}", url);

                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => break 'connect,
                        next = frames.next() => next,
                    };
                    match next {
                        Some(Ok(Frame::Text(text))) => sink.deliver(&text),
                        Some(Ok(Frame::Other)) => {}
                        Some(Ok(Frame::Close)) | None => {
                            info!("Realtime channel closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("Realtime channel error: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!("Realtime connect to {} failed: {}", url, e),
        }

        match policy.next_delay(attempts) {
            Some(delay) => {
                attempts += 1;
                status.send_replace(ChannelStatus::new(ConnectionState::Closed, attempts));
                debug!("Reconnecting in {:?} (attempt {}/{})", delay, attempts, policy.max_attempts);
                tokio::select! {
                    _ = cancel.cancelled() => break 'connect,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                status.send_replace(ChannelStatus {
                    state: ConnectionState::Closed,
                    reconnect_attempts: attempts,
                    exhausted: true,
                });
                info!("Realtime channel gave up after {} reconnect attempts", attempts);
                tokio::select! {
                    _ = cancel.cancelled() => break 'connect,
                    _ = wake.notified() => {}
                }
                info!("Realtime channel reconnect requested");
                attempts = 0;
            }
        }
    }

    status.send_replace(ChannelStatus::new(ConnectionState::Closed, attempts));
    debug!("Realtime channel stopped");
}
