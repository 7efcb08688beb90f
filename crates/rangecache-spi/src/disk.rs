//! Local disk layout of the cache.
//!
//! Disk `i` is mounted at `prefix + i` and holds its cache files under
//! `prefix + i + suffix`. The manager creates the numbered disk and cache
//! directories, but never the directory the mounts are expected to live in:
//! if that is missing the volume is not mounted where the configuration says,
//! and creating it would put cache data on the wrong filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::CacheDirectoryConfig;
use crate::error::{CacheError, Result};

/// One configured cache disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSlot {
    /// Disk index in `[0, disk_count)`.
    pub index: usize,
    /// Cache directory on this disk.
    pub path: String,
}

/// Creates and inspects the per-disk cache directories.
#[derive(Debug, Clone)]
pub struct DiskDirectoryManager {
    dirs: CacheDirectoryConfig,
}

impl DiskDirectoryManager {
    pub fn new(dirs: CacheDirectoryConfig) -> Self {
        Self { dirs }
    }

    /// Ensures every configured disk has its cache directory.
    ///
    /// Fails with [`CacheError::MissingCacheMount`] without touching the
    /// filesystem if the directory holding the disk mounts does not exist.
    pub fn ensure_directories(&self) -> Result<Vec<DiskSlot>> {
        for index in 0..self.dirs.disk_count() {
            let disk_path = self.dirs.disk_path(index);
            if let Some(parent) = mount_parent(&disk_path) {
                if !parent.is_dir() {
                    warn!(
                        disk = index,
                        parent = %parent.display(),
                        "cache mount parent missing, not creating cache directories"
                    );
                    return Err(CacheError::MissingCacheMount {
                        path: parent.display().to_string(),
                    });
                }
            }
        }

        let mut slots = Vec::with_capacity(self.dirs.disk_count());
        for index in 0..self.dirs.disk_count() {
            let path = self.dirs.cache_dir(index);
            fs::create_dir_all(&path)?;
            debug!(disk = index, path = %path, "cache directory ready");
            slots.push(DiskSlot { index, path });
        }
        info!(
            disks = slots.len(),
            prefix = self.dirs.dir_prefix(),
            "cache directories initialized"
        );
        Ok(slots)
    }

    /// Mount directory of every configured disk, keyed by index.
    pub fn disk_paths(&self) -> BTreeMap<usize, String> {
        (0..self.dirs.disk_count())
            .map(|index| (index, self.dirs.disk_path(index)))
            .collect()
    }

    /// Number of configured disks whose mount directory exists.
    pub fn disk_count(&self) -> usize {
        (0..self.dirs.disk_count())
            .filter(|&index| Path::new(&self.dirs.disk_path(index)).is_dir())
            .count()
    }
}

fn mount_parent(disk_path: &str) -> Option<&Path> {
    Path::new(disk_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}
