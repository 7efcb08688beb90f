use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused to {addr}")]
    ConnectionRefused { addr: String },

    #[error("connection timeout after {timeout_ms}ms to {addr}")]
    ConnectionTimeout { addr: String, timeout_ms: u64 },

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("{op} timed out after {timeout_ms}ms")]
    RequestTimeout { op: &'static str, timeout_ms: u64 },

    #[error("not connected")]
    NotConnected,

    #[error("remote error: {reason}")]
    Remote { reason: String },

    #[error("giving up on {addr} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        addr: String,
        attempts: u32,
        #[source]
        last_error: Box<TransportError>,
    },

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
