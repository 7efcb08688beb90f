//! Worker heartbeat loop.
//!
//! The loop first connects to the master, retrying every `retry_interval`
//! for at most `max_retries` attempts, then sends a heartbeat every
//! `retry_interval` until it is cancelled.
//!
//! State machine: `Starting -> Heartbeating -> Terminated`, with `Failed`
//! reachable from both running states. Running out of connection attempts
//! fails the loop, and so does the master rejecting a heartbeat. A heartbeat
//! that fails at the transport level only costs that cycle.
//!
//! Attempts are strictly sequential. Cancellation is observed before every
//! connection attempt, during an attempt and during every sleep; a cancelled
//! loop drops its connection and ends in `Terminated`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rangecache_spi::CacheConfig;
use rangecache_transport::{
    is_retryable, ClientConfig, ConnectionFactory, CoordinatorClient, RetryingCoordinatorClient,
    TransportError,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CoordinatorError, Result};

/// Retry budget of one heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSession {
    retry_interval: Duration,
    max_retries: u32,
    current_attempt: u32,
}

impl HeartbeatSession {
    pub fn new(retry_interval: Duration, max_retries: u32) -> Self {
        Self {
            retry_interval,
            max_retries,
            current_attempt: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.service_retry_interval(), config.service_max_retries)
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Failed connection attempts so far.
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    fn record_failure(&mut self) -> u32 {
        self.current_attempt += 1;
        self.current_attempt
    }

    fn is_exhausted(&self) -> bool {
        self.current_attempt >= self.max_retries
    }
}

/// Lifecycle of a heartbeat loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeartbeatState {
    /// Connecting to the master.
    Starting,
    /// Connected, sending periodic heartbeats.
    Heartbeating,
    /// Stopped by cancellation.
    Terminated,
    /// Gave up; the worker cannot reach or is refused by its master.
    Failed,
}

impl HeartbeatState {
    pub fn is_finished(&self) -> bool {
        matches!(self, HeartbeatState::Terminated | HeartbeatState::Failed)
    }
}

/// Snapshot of a heartbeat loop published to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeartbeatStatus {
    pub state: HeartbeatState,
    /// Failed connection attempts.
    pub attempts: u32,
    /// Heartbeats the master acknowledged.
    pub heartbeats_sent: u64,
    /// Heartbeat cycles lost to transport failures.
    pub heartbeats_failed: u64,
}

impl HeartbeatStatus {
    fn starting() -> Self {
        Self {
            state: HeartbeatState::Starting,
            attempts: 0,
            heartbeats_sent: 0,
            heartbeats_failed: 0,
        }
    }
}

/// Background loop keeping a worker registered with its master.
pub struct HeartbeatService {
    factory: Arc<dyn ConnectionFactory>,
    master_addr: String,
    worker_host: String,
    client_config: ClientConfig,
    session: HeartbeatSession,
    status: watch::Sender<HeartbeatStatus>,
    cancel: CancellationToken,
    liveness: Option<Arc<AtomicBool>>,
}

impl HeartbeatService {
    /// Creates a loop for `worker_host` reporting to the master of `config`.
    ///
    /// The returned receiver observes the loop's status.
    pub fn new(
        config: &CacheConfig,
        factory: Arc<dyn ConnectionFactory>,
        worker_host: impl Into<String>,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<HeartbeatStatus>) {
        let (status, status_rx) = watch::channel(HeartbeatStatus::starting());
        let service = Self {
            factory,
            master_addr: config.master_addr(),
            worker_host: worker_host.into(),
            client_config: ClientConfig::from_cache_config(config),
            session: HeartbeatSession::from_config(config),
            status,
            cancel,
            liveness: None,
        };
        (service, status_rx)
    }

    /// Clears `flag` when the loop fails, before `Failed` is published.
    pub fn with_liveness(mut self, flag: Arc<AtomicBool>) -> Self {
        self.liveness = Some(flag);
        self
    }

    /// Runs the loop on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Runs the loop to completion.
    ///
    /// Returns `Ok` when cancelled and an error when the loop fails.
    pub async fn run(mut self) -> Result<()> {
        info!(
            master = %self.master_addr,
            worker = %self.worker_host,
            interval_ms = self.session.retry_interval().as_millis() as u64,
            max_retries = self.session.max_retries(),
            "heartbeat service starting"
        );

        let client = match self.connect().await {
            Ok(Some(client)) => client,
            Ok(None) => {
                self.finish(HeartbeatState::Terminated);
                return Ok(());
            }
            Err(e) => {
                self.finish(HeartbeatState::Failed);
                return Err(e);
            }
        };

        self.publish(|s| s.state = HeartbeatState::Heartbeating);
        info!(master = %self.master_addr, attempts = self.session.current_attempt(), "connected to master");

        let outcome = self.heartbeat_until_cancelled(&client).await;
        client.close().await;

        match outcome {
            Ok(()) => {
                self.finish(HeartbeatState::Terminated);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "master rejected heartbeat, stopping heartbeat service");
                self.finish(HeartbeatState::Failed);
                Err(e)
            }
        }
    }

    async fn connect(&mut self) -> Result<Option<RetryingCoordinatorClient>> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }

            let attempt = RetryingCoordinatorClient::connect(
                Arc::clone(&self.factory),
                self.master_addr.clone(),
                self.client_config.clone(),
            );
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                result = attempt => result,
            };

            let last_error = match result {
                Ok(client) => return Ok(Some(client)),
                Err(e) => e,
            };

            let attempts = self.session.record_failure();
            self.publish(|s| s.attempts = attempts);
            warn!(
                master = %self.master_addr,
                attempt = attempts,
                max_retries = self.session.max_retries(),
                error = %last_error,
                "could not connect to master"
            );

            if !self.pause().await {
                return Ok(None);
            }
            if self.session.is_exhausted() {
                error!(
                    master = %self.master_addr,
                    attempts,
                    "heartbeat service ran out of connection attempts"
                );
                return Err(CoordinatorError::HeartbeatExhausted {
                    attempts,
                    last_error,
                });
            }
        }
    }

    async fn heartbeat_until_cancelled(&self, client: &RetryingCoordinatorClient) -> Result<()> {
        loop {
            let sent = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                sent = client.heartbeat(&self.worker_host) => sent,
            };

            match sent {
                Ok(()) => {
                    self.publish(|s| s.heartbeats_sent += 1);
                    debug!(master = %self.master_addr, "heartbeat acknowledged");
                }
                Err(e) if is_cycle_failure(&e) => {
                    self.publish(|s| s.heartbeats_failed += 1);
                    warn!(master = %self.master_addr, error = %e, "heartbeat cycle failed");
                }
                Err(e) => return Err(e.into()),
            }

            if !self.pause().await {
                return Ok(());
            }
        }
    }

    /// Sleeps one retry interval. Returns false if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.session.retry_interval()) => true,
        }
    }

    fn publish(&self, update: impl FnOnce(&mut HeartbeatStatus)) {
        self.status.send_modify(update);
    }

    fn finish(&self, state: HeartbeatState) {
        if state == HeartbeatState::Failed {
            if let Some(flag) = &self.liveness {
                flag.store(false, Ordering::SeqCst);
            }
        }
        info!(worker = %self.worker_host, ?state, "heartbeat service stopped");
        self.publish(|s| s.state = state);
    }
}

/// Transport failures cost one cycle; anything the master answered with does not.
fn is_cycle_failure(error: &TransportError) -> bool {
    match error {
        TransportError::RetriesExhausted { last_error, .. } => is_retryable(last_error),
        other => is_retryable(other),
    }
}
