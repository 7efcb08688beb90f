#![warn(missing_docs)]

//! rangecache coordination subsystem: master/worker roles, heartbeat liveness, in-process transport
//!
//! A node runs as master or worker depending on its configuration. Workers
//! keep themselves registered with the master through a bounded heartbeat
//! loop; the master derives cluster membership from the heartbeats it sees.

pub mod error;
pub mod heartbeat;
pub mod local;
pub mod master;
pub mod node;
pub mod registry;
pub mod role;
pub mod service;
pub mod worker;

pub use error::{CoordinatorError, Result};
pub use heartbeat::{HeartbeatService, HeartbeatSession, HeartbeatState, HeartbeatStatus};
pub use local::{LocalConnectionFactory, LocalNetwork};
pub use master::MasterService;
pub use node::NodeCore;
pub use registry::{HeartbeatClusterManager, WorkerRegistry};
pub use role::NodeRole;
pub use service::CoordinationService;
pub use worker::WorkerService;
