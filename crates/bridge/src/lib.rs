//! Request/response bridge between the settings client and the background
//! process that owns the rule store.
//!
//! - [`protocol`]: the closed set of requests and the `{ok, ...}` responses
//! - [`Message`]: the envelope that carries a JSON body and a correlation id
//! - [`reqrep`]: ZeroMQ DEALER (client) / ROUTER (background) transport

pub mod error;
pub mod message;
pub mod protocol;
pub mod reqrep;
pub mod traits;
pub mod transport;

pub use error::BridgeError;
pub use message::Message;
pub use protocol::{Request, Resolution, Response, ResponseBody};
pub use reqrep::{BridgeClient, BridgeServer, ReplyToken};
pub use traits::{RequestReceiver, RequestSender};
pub use transport::Transport;
