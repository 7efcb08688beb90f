//! Bounded retry for coordinator calls.
//!
//! [`RetryingCoordinatorClient`] owns at most one connection obtained from a
//! [`ConnectionFactory`]. Every call runs against that connection; a transient
//! failure drops the connection and the call is retried on a fresh one, up to
//! `max_retries` attempts in total. When the budget is spent the call fails
//! with [`TransportError::RetriesExhausted`] carrying the last error.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rangecache_spi::BlockRange;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{ClientConfig, ConnectionFactory, CoordinatorClient};
use crate::error::{Result, TransportError};

/// A coordinator client that reconnects and retries transient failures.
pub struct RetryingCoordinatorClient {
    factory: Arc<dyn ConnectionFactory>,
    addr: String,
    config: ClientConfig,
    connection: Mutex<Option<Arc<dyn CoordinatorClient>>>,
    connected: AtomicBool,
}

impl RetryingCoordinatorClient {
    /// Creates a client that connects lazily on its first call.
    pub fn new(factory: Arc<dyn ConnectionFactory>, addr: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            factory,
            addr: addr.into(),
            config,
            connection: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Creates a client and establishes its connection, retrying per `config`.
    pub async fn connect(
        factory: Arc<dyn ConnectionFactory>,
        addr: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let client = Self::new(factory, addr, config);
        client.execute("connect", |_| async { Ok(()) }).await?;
        Ok(client)
    }

    /// Address this client talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Returns true if a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Drops the held connection, if any.
    pub async fn close(&self) {
        let mut conn = self.connection.lock().await;
        conn.take();
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn current(&self) -> Result<Arc<dyn CoordinatorClient>> {
        let mut conn = self.connection.lock().await;
        if let Some(existing) = conn.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let established = tokio::time::timeout(
            self.config.timeout,
            self.factory.create_client(&self.addr, &self.config),
        )
        .await
        .map_err(|_| TransportError::ConnectionTimeout {
            addr: self.addr.clone(),
            timeout_ms: self.config.timeout_ms(),
        })??;

        debug!(addr = %self.addr, "coordinator connection established");
        *conn = Some(Arc::clone(&established));
        self.connected.store(true, Ordering::SeqCst);
        Ok(established)
    }

    /// Runs `operation` on the connection, retrying transient failures.
    ///
    /// Permanent errors are returned immediately. Each attempt, including
    /// establishing the connection, is bounded by the configured timeout.
    pub async fn execute<F, Fut, T>(&self, op: &'static str, operation: F) -> Result<T>
    where
        F: Fn(Arc<dyn CoordinatorClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = match self.current().await {
                Ok(conn) => tokio::time::timeout(self.config.timeout, operation(conn))
                    .await
                    .unwrap_or_else(|_| {
                        Err(TransportError::RequestTimeout {
                            op,
                            timeout_ms: self.config.timeout_ms(),
                        })
                    }),
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => e,
            };

            self.close().await;
            warn!(
                addr = %self.addr,
                op,
                attempt,
                max_attempts,
                error = %error,
                "coordinator call failed"
            );

            if attempt >= max_attempts {
                return Err(TransportError::RetriesExhausted {
                    addr: self.addr.clone(),
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }
            if !self.config.backoff.is_zero() {
                tokio::time::sleep(self.config.backoff).await;
            }
        }
    }
}

#[async_trait]
impl CoordinatorClient for RetryingCoordinatorClient {
    async fn ping(&self) -> Result<bool> {
        self.execute("ping", |c| async move { c.ping().await }).await
    }

    async fn heartbeat(&self, worker: &str) -> Result<()> {
        self.execute("heartbeat", move |c| async move { c.heartbeat(worker).await })
            .await
    }

    async fn is_cached(&self, file: &str, range: BlockRange) -> Result<bool> {
        self.execute("is_cached", move |c| async move { c.is_cached(file, range).await })
            .await
    }

    async fn mark_cached(&self, file: &str, range: BlockRange) -> Result<()> {
        self.execute("mark_cached", move |c| async move {
            c.mark_cached(file, range).await
        })
        .await
    }
}

/// Check if an error is retryable.
///
/// Connection-level failures are transient. Errors reported by the remote
/// service and an already exhausted retry budget are permanent.
pub fn is_retryable(error: &TransportError) -> bool {
    match error {
        TransportError::ConnectionRefused { .. } => true,
        TransportError::ConnectionTimeout { .. } => true,
        TransportError::ConnectionReset => true,
        TransportError::RequestTimeout { .. } => true,
        TransportError::NotConnected => true,
        TransportError::IoError(_) => true,
        TransportError::Remote { .. } => false,
        TransportError::RetriesExhausted { .. } => false,
    }
}
