use thiserror::Error;

/// Errors that can occur on the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("envelope encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("envelope decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("body is not valid JSON: {0}")]
    Body(#[from] serde_json::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no reply after {0:?}")]
    Timeout(std::time::Duration),
}
