use rangecache_spi::CacheError;
use rangecache_transport::TransportError;
use thiserror::Error;

use crate::role::NodeRole;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{op} is not supported on a {role} node")]
    RoleViolation { op: &'static str, role: NodeRole },

    #[error("heartbeat loop gave up after {attempts} attempts: {last_error}")]
    HeartbeatExhausted {
        attempts: u32,
        #[source]
        last_error: TransportError,
    },

    #[error("coordination service is not running")]
    NotRunning,

    #[error("heartbeat task failed: {reason}")]
    TaskFailed { reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
