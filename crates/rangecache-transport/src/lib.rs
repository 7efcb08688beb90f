#![warn(missing_docs)]

//! rangecache transport subsystem: coordinator client capability, connection factory, bounded retry
//!
//! The wire transport itself is pluggable: anything that can hand out a
//! [`CoordinatorClient`] through a [`ConnectionFactory`] can carry the
//! coordinator protocol. [`RetryingCoordinatorClient`] layers the retry
//! budget on top.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{ClientConfig, ConnectionFactory, CoordinatorClient};
pub use error::{Result, TransportError};
pub use retry::{is_retryable, RetryingCoordinatorClient};
