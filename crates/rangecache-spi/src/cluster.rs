//! Cluster membership capability.
//!
//! Membership is queried fresh for every decision; nodes carry no identity
//! beyond their host name and callers must not hold on to a result past the
//! decision it was fetched for.

use std::io;
use std::net::ToSocketAddrs;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Host name used when the local address cannot be resolved.
pub const FALLBACK_HOST: &str = "localhost";

/// Liveness of a compute node as seen by the membership provider.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Node is reachable and taking work.
    Active,
    /// Node has gone quiet.
    Inactive,
}

/// A compute node reported by a membership query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub host: String,
    pub state: NodeState,
}

impl ClusterNode {
    pub fn new(host: impl Into<String>, state: NodeState) -> Self {
        Self {
            host: host.into(),
            state,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == NodeState::Active
    }
}

/// Deployment flavour behind a membership provider.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterType {
    /// Membership derived from worker heartbeats seen by the master.
    Heartbeat,
    /// A single local node, for tests and standalone deployments.
    SingleNode,
}

/// Source of the current set of compute nodes.
///
/// No ordering of the returned nodes is guaranteed.
pub trait ClusterManager: Send + Sync {
    /// Current compute nodes and their states. Never fails.
    fn nodes(&self) -> Vec<ClusterNode>;

    /// Deployment flavour of this provider.
    fn cluster_type(&self) -> ClusterType;
}

type AddressResolver = Box<dyn Fn() -> io::Result<String> + Send + Sync>;

/// Membership of a one-node cluster: the local host, always active.
pub struct SingleNodeClusterManager {
    resolver: AddressResolver,
}

impl SingleNodeClusterManager {
    pub fn new() -> Self {
        Self::with_resolver(resolve_local_address)
    }

    /// Uses `resolver` instead of the system resolver to name the local node.
    pub fn with_resolver<F>(resolver: F) -> Self
    where
        F: Fn() -> io::Result<String> + Send + Sync + 'static,
    {
        Self {
            resolver: Box::new(resolver),
        }
    }
}

impl Default for SingleNodeClusterManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterManager for SingleNodeClusterManager {
    fn nodes(&self) -> Vec<ClusterNode> {
        let host = (self.resolver)().unwrap_or_else(|e| {
            warn!(error = %e, "could not resolve local address, using {}", FALLBACK_HOST);
            FALLBACK_HOST.to_string()
        });
        vec![ClusterNode::new(host, NodeState::Active)]
    }

    fn cluster_type(&self) -> ClusterType {
        ClusterType::SingleNode
    }
}

/// Resolves the local host name to its first IP address.
pub fn resolve_local_address() -> io::Result<String> {
    let hostname = gethostname::gethostname();
    let hostname = hostname.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "host name is not valid UTF-8")
    })?;
    (hostname, 0)
        .to_socket_addrs()?
        .next()
        .map(|addr| addr.ip().to_string())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address for host {}", hostname),
            )
        })
}

/// Local address, or [`FALLBACK_HOST`] if it cannot be resolved.
pub fn local_host() -> String {
    resolve_local_address().unwrap_or_else(|_| FALLBACK_HOST.to_string())
}
