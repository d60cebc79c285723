use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite;

/// A GraphQL payload that could not be turned into usable data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("GraphQL error: {0}")]
    Graphql(String),
    #[error("Response carried no data")]
    MissingData,
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure of one subscription session on the transport link.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("Server rejected connection: {0}")]
    Rejected(String),
    #[error("Timed out waiting for connection_ack")]
    AckTimeout,
    #[error("Unexpected frame before connection_ack: {0}")]
    UnexpectedFrame(String),
    #[error("Connection closed")]
    Closed,
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a data client operation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Transport link is not running")]
    LinkClosed,
    #[error("Connection lost before the server answered")]
    ConnectionLost,
    #[error("Timed out waiting for the server")]
    Timeout,
    #[error("Network worker is not running")]
    WorkerGone,
    #[error("Outgoing queue is full")]
    QueueFull,
}

impl<T> From<TrySendError<T>> for ClientError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => Self::QueueFull,
            TrySendError::Closed(_) => Self::WorkerGone,
        }
    }
}
