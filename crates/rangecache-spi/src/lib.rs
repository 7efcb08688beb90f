#![warn(missing_docs)]

//! rangecache shared layer: cache placement, eligibility policy, disk layout, cluster membership
//!
//! Everything here is either a pure function of the configuration or a
//! capability trait implemented by the coordinator and the cache store.

pub mod cluster;
pub mod config;
pub mod disk;
pub mod error;
pub mod metadata;
pub mod path;
pub mod policy;

pub use cluster::{ClusterManager, ClusterNode, ClusterType, NodeState, SingleNodeClusterManager};
pub use config::{CacheConfig, CacheDirectoryConfig};
pub use disk::{DiskDirectoryManager, DiskSlot};
pub use error::{CacheError, Result};
pub use metadata::{BlockRange, InMemoryMetadataStore, MetadataStore};
pub use path::{PathShardResolver, RemotePathRef, METADATA_FILE_SUFFIX};
pub use policy::{should_skip_cache, EligibilityRule, SkipReason};
