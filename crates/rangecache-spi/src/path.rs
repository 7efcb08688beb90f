//! Deterministic placement of remote files on local cache disks.
//!
//! The disk index is a pure function of the scheme-less remote path and the
//! configured disk count, so every node (and every restart of a node) agrees
//! on where a remote file's cache entry lives. The hash is XXH3 with a fixed
//! seed, which is stable across platforms and releases.

use xxhash_rust::xxh3::xxh3_64;

use crate::config::CacheDirectoryConfig;

/// Suffix naming the sidecar metadata file of a cache entry.
pub const METADATA_FILE_SUFFIX: &str = "_mdfile";

/// A remote URI split into its scheme and the path below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePathRef {
    /// Scheme such as `s3` or `hdfs`, if the path carried one.
    pub scheme: Option<String>,
    /// Path below the scheme, without leading separators.
    pub relative_path: String,
}

impl RemotePathRef {
    /// Splits `remote` into scheme and relative path.
    ///
    /// `s3://bucket/key` and `bucket/key` yield the same relative path.
    pub fn parse(remote: &str) -> Self {
        let (scheme, rest) = match remote.split_once("://") {
            Some((scheme, rest)) if is_scheme(scheme) => (Some(scheme.to_string()), rest),
            _ => (None, remote),
        };
        Self {
            scheme,
            relative_path: rest.trim_start_matches('/').to_string(),
        }
    }

    /// Directory part and final segment of the relative path.
    ///
    /// A single-segment path has an empty directory part.
    fn split_parent(&self) -> (&str, &str) {
        match self.relative_path.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", self.relative_path.as_str()),
        }
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Maps remote paths to disks and local cache paths.
#[derive(Debug, Clone)]
pub struct PathShardResolver {
    dirs: CacheDirectoryConfig,
}

impl PathShardResolver {
    pub fn new(dirs: CacheDirectoryConfig) -> Self {
        Self { dirs }
    }

    pub fn directory_config(&self) -> &CacheDirectoryConfig {
        &self.dirs
    }

    /// Disk holding the cache entry of `remote`, in `[0, disk_count)`.
    pub fn disk_index(&self, remote: &str) -> usize {
        let path = RemotePathRef::parse(remote);
        shard_of(&path.relative_path, self.dirs.disk_count())
    }

    /// Local cache file for `remote`.
    ///
    /// The result is `prefix + disk + suffix + parent + "/" + name`. For a
    /// single-segment path the parent is empty, which leaves a doubled
    /// separator after the suffix (`.../fcache//bucket`). Callers compare
    /// these paths as strings, so the separator is kept as is.
    pub fn local_path(&self, remote: &str) -> String {
        let path = RemotePathRef::parse(remote);
        let disk = shard_of(&path.relative_path, self.dirs.disk_count());
        let (parent, name) = path.split_parent();
        format!("{}{}/{}", self.dirs.cache_dir(disk), parent, name)
    }

    /// Sidecar metadata file for the cache entry of `remote`.
    pub fn metadata_path(&self, remote: &str) -> String {
        let mut path = self.local_path(remote);
        path.push_str(METADATA_FILE_SUFFIX);
        path
    }
}

fn shard_of(relative_path: &str, disk_count: usize) -> usize {
    (xxh3_64(relative_path.as_bytes()) % disk_count as u64) as usize
}
