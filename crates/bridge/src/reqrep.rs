//! Request/reply over ZeroMQ DEALER/ROUTER sockets.
//!
//! - [`BridgeClient`] wraps a DEALER socket; used by the settings client
//! - [`BridgeServer`] wraps a ROUTER socket; owned by the background process
//! - [`ReplyToken`] carries the ROUTER identity frame back to `send_reply`
//!
//! ## Framing (zeromq-rs 0.4)
//!
//! ROUTER prepends the peer identity on recv and pops it on send. So:
//! - DEALER sends `[topic, envelope]`
//! - ROUTER receives `[identity, topic, envelope]`
//! - ROUTER sends `[identity, topic, envelope]`
//! - DEALER receives `[topic, envelope]`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use zeromq::prelude::*;
use zeromq::{DealerSocket, RouterSocket, ZmqMessage};

use crate::error::BridgeError;
use crate::message::Message;
use crate::protocol::{Request, Response};
use crate::traits::{RequestReceiver, RequestSender};
use crate::transport::Transport;

/// Topic used on every reply envelope.
pub const REPLY_TOPIC: &str = "reply";

/// Opaque handle holding the ZMQ routing identity of the requesting peer.
#[derive(Debug, Clone)]
pub struct ReplyToken {
    identity: Vec<u8>,
}

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Message>>>>;

/// DEALER-socket client.
///
/// A spawned task owns the socket and alternates between flushing queued
/// requests and dispatching replies by `correlation_id`.
pub struct BridgeClient {
    send_tx: mpsc::Sender<ZmqMessage>,
    pending: Pending,
    _loop_handle: tokio::task::JoinHandle<()>,
}

impl BridgeClient {
    /// Connect a DEALER socket to the background's ROUTER endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BridgeError> {
        let mut socket = DealerSocket::new();
        let endpoint = transport.endpoint();
        debug!(endpoint = %endpoint, "connecting DEALER socket");
        socket.connect(&endpoint).await?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (send_tx, send_rx) = mpsc::channel::<ZmqMessage>(64);

        let loop_pending = Arc::clone(&pending);
        let loop_handle = tokio::spawn(async move {
            Self::event_loop(socket, send_rx, loop_pending).await;
        });

        Ok(Self {
            send_tx,
            pending,
            _loop_handle: loop_handle,
        })
    }

    async fn event_loop(
        mut socket: DealerSocket,
        mut send_rx: mpsc::Receiver<ZmqMessage>,
        pending: Pending,
    ) {
        loop {
            tokio::select! {
                Some(zmq_msg) = send_rx.recv() => {
                    if let Err(e) = socket.send(zmq_msg).await {
                        warn!(error = %e, "DEALER send failed");
                    }
                }
                result = socket.recv() => {
                    match result {
                        Ok(zmq_msg) => Self::dispatch_reply(&pending, zmq_msg).await,
                        Err(e) => {
                            debug!(error = %e, "DEALER recv loop ending");
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    }

    async fn dispatch_reply(pending: &Mutex<HashMap<Uuid, oneshot::Sender<Message>>>, zmq_msg: ZmqMessage) {
        let data_frames: Vec<_> = zmq_msg
            .iter()
            .skip_while(|f| f.as_ref().is_empty())
            .collect();

        if data_frames.len() < 2 {
            warn!(frame_count = data_frames.len(), "unexpected frame count on DEALER recv");
            return;
        }

        let message = match Message::from_bytes(data_frames[1].as_ref()) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to decode reply envelope");
                return;
            }
        };

        let cid = message.correlation_id;
        match pending.lock().await.remove(&cid) {
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => debug!(correlation_id = %cid, "reply for unknown correlation_id"),
        }
    }

    /// Send a typed request and decode the typed response.
    ///
    /// A reply that arrives as `{ok: false}` is still `Ok` here; callers
    /// inspect [`Response::into_result`].
    pub async fn call(&self, request: &Request, timeout: Duration) -> Result<Response, BridgeError> {
        let msg = Message::new(request.kind(), request)?;
        let reply = self.request(msg, timeout).await?;
        reply.decode()
    }
}

#[async_trait]
impl RequestSender for BridgeClient {
    /// Returns [`BridgeError::Timeout`] if no reply arrives within `timeout`.
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, BridgeError> {
        let cid = msg.correlation_id;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(cid, tx);

        let mut zmq_msg = ZmqMessage::from(msg.topic.as_str());
        zmq_msg.push_back(msg.to_bytes()?.into());
        if self.send_tx.send(zmq_msg).await.is_err() {
            self.pending.lock().await.remove(&cid);
            return Err(BridgeError::Transport("client event loop closed".into()));
        }
        debug!(correlation_id = %cid, topic = %msg.topic, "sent request");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&cid);
                Err(BridgeError::Transport("reply channel closed unexpectedly".into()))
            }
            Err(_) => {
                self.pending.lock().await.remove(&cid);
                Err(BridgeError::Timeout(timeout))
            }
        }
    }
}

/// ROUTER-socket server owned by the background process.
pub struct BridgeServer {
    socket: Mutex<RouterSocket>,
}

impl BridgeServer {
    /// Bind a ROUTER socket, clearing any stale IPC socket file first.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BridgeError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        let mut socket = RouterSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding ROUTER socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Reply to `token` with a typed response under the request's correlation id.
    pub async fn respond(
        &self,
        token: ReplyToken,
        correlation_id: Uuid,
        response: &Response,
    ) -> Result<(), BridgeError> {
        let reply = Message::with_correlation(REPLY_TOPIC, response, correlation_id)?;
        self.send_reply(token, reply).await
    }
}

#[async_trait]
impl RequestReceiver for BridgeServer {
    async fn recv_request(&self) -> Result<(ReplyToken, Message), BridgeError> {
        let mut socket = self.socket.lock().await;
        let zmq_msg = socket.recv().await?;

        let frames: Vec<_> = zmq_msg.iter().collect();
        if frames.len() < 2 {
            return Err(BridgeError::Transport(format!(
                "expected at least 2 frames from ROUTER, got {}",
                frames.len()
            )));
        }

        let identity = frames[0].as_ref().to_vec();
        let data_frames: Vec<_> = frames[1..]
            .iter()
            .skip_while(|f| f.as_ref().is_empty())
            .collect();

        if data_frames.len() < 2 {
            return Err(BridgeError::Transport(format!(
                "expected [topic, envelope] after identity, got {} data frames",
                data_frames.len()
            )));
        }

        let message = Message::from_bytes(data_frames[1].as_ref())?;
        debug!(
            correlation_id = %message.correlation_id,
            topic = %message.topic,
            "received request"
        );
        Ok((ReplyToken { identity }, message))
    }

    async fn send_reply(&self, token: ReplyToken, reply: Message) -> Result<(), BridgeError> {
        let envelope_bytes = reply.to_bytes()?;

        let mut zmq_msg = ZmqMessage::from(token.identity);
        zmq_msg.push_back(reply.topic.as_bytes().to_vec().into());
        zmq_msg.push_back(envelope_bytes.into());

        self.socket.lock().await.send(zmq_msg).await?;
        debug!(correlation_id = %reply.correlation_id, "sent reply");
        Ok(())
    }
}
