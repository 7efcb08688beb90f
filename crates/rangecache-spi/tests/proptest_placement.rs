//! Property-based tests for cache placement and eligibility.

use rangecache_spi::{
    CacheConfig, CacheDirectoryConfig, EligibilityRule, PathShardResolver, METADATA_FILE_SUFFIX,
};
use proptest::prelude::*;

/// Generator for remote object keys with one to six segments.
fn any_key() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z0-9_.=-]{1,12}", 1..6).prop_map(|segs| segs.join("/"))
}

fn any_scheme() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![Just(None), Just(Some("s3")), Just(Some("hdfs")), Just(Some("gs"))]
}

fn resolver(disks: usize) -> PathShardResolver {
    PathShardResolver::new(
        CacheDirectoryConfig::new("/cache/".to_string(), "/fcache/".to_string(), disks).unwrap(),
    )
}

proptest! {
    /// Resolving the same path twice, even through separate resolvers, gives the same answer.
    #[test]
    fn test_resolution_is_deterministic(key in any_key(), disks in 1usize..32) {
        let first = resolver(disks);
        let second = resolver(disks);
        prop_assert_eq!(first.local_path(&key), second.local_path(&key));
        prop_assert_eq!(first.disk_index(&key), second.disk_index(&key));
    }

    /// The disk index is always a configured disk, and the path lives on it.
    #[test]
    fn test_disk_index_in_range(key in any_key(), disks in 1usize..32) {
        let r = resolver(disks);
        let idx = r.disk_index(&key);
        prop_assert!(idx < disks);
        let expected_prefix = format!("/cache/{}/fcache/", idx);
        prop_assert!(r.local_path(&key).starts_with(&expected_prefix));
    }

    /// A scheme prefix never changes placement.
    #[test]
    fn test_scheme_is_ignored(key in any_key(), scheme in any_scheme(), disks in 1usize..16) {
        let r = resolver(disks);
        let remote = match scheme {
            Some(s) => format!("{}://{}", s, key),
            None => key.clone(),
        };
        prop_assert_eq!(r.local_path(&remote), r.local_path(&key));
    }

    /// The metadata path is the cache path plus the sidecar suffix.
    #[test]
    fn test_metadata_path_suffix(key in any_key()) {
        let r = resolver(3);
        prop_assert_eq!(
            r.metadata_path(&key),
            format!("{}{}", r.local_path(&key), METADATA_FILE_SUFFIX)
        );
    }

    /// With every other rule passing, only the column threshold decides.
    #[test]
    fn test_column_threshold(min in 0u32..64, chosen in 0u32..64) {
        let rule = EligibilityRule::from_config(&CacheConfig {
            min_columns: Some(min),
            chosen_columns: Some(chosen),
            ..CacheConfig::default()
        })
        .unwrap();
        prop_assert_eq!(rule.should_skip_cache("s3://bucket/t/part-0"), chosen < min);
    }
}
