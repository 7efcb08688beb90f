//! Cache configuration surface shared by every rangecache role.
//!
//! A single [`CacheConfig`] is loaded at startup (from TOML or JSON) and
//! narrowed into the views each component needs: [`CacheDirectoryConfig`]
//! for placement, [`crate::policy::EligibilityRule`] for the cache policy, and
//! the client/heartbeat settings consumed by the coordinator crates.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Full configuration for a rangecache node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix shared by every disk mount; disk `i` lives at `prefix + i`.
    pub data_dir_prefix: String,
    /// Cache directory created under each disk mount.
    pub data_dir_suffix: String,
    /// Number of disks cache files are spread over.
    pub max_disks: usize,
    /// Global cache switch.
    pub cache_enabled: bool,
    /// Remote paths must match this regex to be cached.
    pub location_whitelist: Option<String>,
    /// Remote paths matching this regex are never cached.
    pub location_blacklist: Option<String>,
    /// Table the current scan belongs to.
    pub table_name: Option<String>,
    /// Table names must match this regex to be cached.
    pub table_whitelist: Option<String>,
    /// Minimum projected column count for a scan to be cached.
    pub min_columns: Option<u32>,
    /// Columns projected by the current scan.
    pub chosen_columns: Option<u32>,
    /// Block granularity of the metadata store in bytes.
    pub block_size: u64,
    /// Run this node as the master coordinator.
    pub on_master: bool,
    /// Host the master coordinator is reachable at.
    pub master_host: String,
    /// Name this worker advertises in heartbeats. Resolved when unset.
    pub worker_host: Option<String>,
    /// Coordinator service port.
    pub server_port: u16,
    /// Per-attempt timeout for coordinator connections and calls.
    pub client_timeout_ms: u64,
    /// Attempts a retrying coordinator client makes before giving up.
    pub client_max_retries: u32,
    /// Pause between two client attempts.
    pub client_retry_backoff_ms: u64,
    /// Heartbeat loop retry interval, also the heartbeat cadence.
    pub service_retry_interval_ms: u64,
    /// Connection attempts the heartbeat loop makes before failing.
    pub service_max_retries: u32,
    /// Silence after which the master reports a worker as inactive.
    pub worker_liveness_expiry_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir_prefix: String::from("/media/ephemeral"),
            data_dir_suffix: String::from("/fcache/"),
            max_disks: 5,
            cache_enabled: true,
            location_whitelist: None,
            location_blacklist: None,
            table_name: None,
            table_whitelist: None,
            min_columns: None,
            chosen_columns: None,
            block_size: 1024 * 1024,
            on_master: false,
            master_host: String::from("localhost"),
            worker_host: None,
            server_port: 8899,
            client_timeout_ms: 10_000,
            client_max_retries: 3,
            client_retry_backoff_ms: 100,
            service_retry_interval_ms: 30_000,
            service_max_retries: 100,
            worker_liveness_expiry_ms: 60_000,
        }
    }
}

impl CacheConfig {
    /// Loads a configuration file, picking the format from its extension.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: CacheConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: CacheConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Placement view of this configuration.
    ///
    /// Fails with [`CacheError::Configuration`] when no disks are configured.
    pub fn directory_config(&self) -> Result<CacheDirectoryConfig> {
        CacheDirectoryConfig::new(
            self.data_dir_prefix.clone(),
            self.data_dir_suffix.clone(),
            self.max_disks,
        )
    }

    /// Address key of the master coordinator.
    pub fn master_addr(&self) -> String {
        format!("{}:{}", self.master_host, self.server_port)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    pub fn client_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.client_retry_backoff_ms)
    }

    pub fn service_retry_interval(&self) -> Duration {
        Duration::from_millis(self.service_retry_interval_ms)
    }

    pub fn worker_liveness_expiry(&self) -> Duration {
        Duration::from_millis(self.worker_liveness_expiry_ms)
    }
}

/// Where cache files live on local disk.
///
/// `disk_count` must stay fixed for the lifetime of a cache: changing it
/// moves every remote path to a different disk and orphans existing entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirectoryConfig {
    dir_prefix: String,
    dir_suffix: String,
    disk_count: usize,
}

impl CacheDirectoryConfig {
    pub fn new(dir_prefix: String, dir_suffix: String, disk_count: usize) -> Result<Self> {
        if disk_count == 0 {
            return Err(CacheError::Configuration {
                reason: "disk count must be at least 1".to_string(),
            });
        }
        Ok(Self {
            dir_prefix,
            dir_suffix,
            disk_count,
        })
    }

    pub fn dir_prefix(&self) -> &str {
        &self.dir_prefix
    }

    pub fn dir_suffix(&self) -> &str {
        &self.dir_suffix
    }

    pub fn disk_count(&self) -> usize {
        self.disk_count
    }

    /// Mount directory of disk `index`: the prefix with the index appended.
    pub fn disk_path(&self, index: usize) -> String {
        format!("{}{}", self.dir_prefix, index)
    }

    /// Cache directory on disk `index`, i.e. the mount plus the suffix.
    pub fn cache_dir(&self, index: usize) -> String {
        format!("{}{}", self.disk_path(index), self.dir_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.data_dir_prefix, "/media/ephemeral");
        assert_eq!(config.data_dir_suffix, "/fcache/");
        assert_eq!(config.max_disks, 5);
        assert!(config.cache_enabled);
        assert!(!config.on_master);
        assert_eq!(config.server_port, 8899);
        assert_eq!(config.client_max_retries, 3);
        assert_eq!(config.service_retry_interval(), Duration::from_secs(30));
        assert_eq!(config.service_max_retries, 100);
        assert!(config.location_whitelist.is_none());
    }

    #[test]
    fn test_master_addr() {
        let config = CacheConfig {
            master_host: String::from("10.0.0.7"),
            server_port: 9000,
            ..CacheConfig::default()
        };
        assert_eq!(config.master_addr(), "10.0.0.7:9000");
    }

    #[test]
    fn test_directory_config_rejects_zero_disks() {
        let config = CacheConfig {
            max_disks: 0,
            ..CacheConfig::default()
        };
        let err = config.directory_config().unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_directory_config_view() {
        let config = CacheConfig {
            data_dir_prefix: String::from("/tmp/x/"),
            max_disks: 2,
            ..CacheConfig::default()
        };
        let dirs = config.directory_config().unwrap();
        assert_eq!(dirs.dir_prefix(), "/tmp/x/");
        assert_eq!(dirs.dir_suffix(), "/fcache/");
        assert_eq!(dirs.disk_count(), 2);
        assert_eq!(dirs.disk_path(1), "/tmp/x/1");
        assert_eq!(dirs.cache_dir(1), "/tmp/x/1/fcache/");
    }

    #[test]
    fn test_from_file_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
data_dir_prefix = "/mnt/disk"
max_disks = 2
on_master = true
location_blacklist = ".*tmp.*"
service_retry_interval_ms = 500
            "#
        )
        .unwrap();

        let config = CacheConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data_dir_prefix, "/mnt/disk");
        assert_eq!(config.max_disks, 2);
        assert!(config.on_master);
        assert_eq!(config.location_blacklist.as_deref(), Some(".*tmp.*"));
        assert_eq!(config.service_retry_interval(), Duration::from_millis(500));
        // untouched fields keep their defaults
        assert_eq!(config.data_dir_suffix, "/fcache/");
    }

    #[test]
    fn test_from_file_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(
            file,
            r#"{{"master_host": "master.internal", "client_max_retries": 7, "min_columns": 4}}"#
        )
        .unwrap();

        let config = CacheConfig::from_file(file.path()).unwrap();
        assert_eq!(config.master_host, "master.internal");
        assert_eq!(config.client_max_retries, 7);
        assert_eq!(config.min_columns, Some(4));
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let file = NamedTempFile::with_suffix(".ini").unwrap();
        assert!(CacheConfig::from_file(file.path()).is_err());
    }
}
