use std::time::Duration;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::message::Message;
use crate::reqrep::ReplyToken;

/// Sends a request envelope and waits for the reply with the same correlation id.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, BridgeError>;
}

/// Receives request envelopes and routes replies back to their sender.
#[async_trait]
pub trait RequestReceiver: Send + Sync {
    async fn recv_request(&self) -> Result<(ReplyToken, Message), BridgeError>;
    async fn send_reply(&self, token: ReplyToken, reply: Message) -> Result<(), BridgeError>;
}
