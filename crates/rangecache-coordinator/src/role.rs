//! Process role selection.

use std::fmt;

use rangecache_spi::CacheConfig;

/// Role of a coordination process, fixed at startup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Tracks worker liveness and answers heartbeats.
    Master,
    /// Caches data locally and heartbeats to the master.
    Worker,
}

impl NodeRole {
    /// Role selected by the `on_master` flag.
    pub fn from_config(config: &CacheConfig) -> Self {
        if config.on_master {
            NodeRole::Master
        } else {
            NodeRole::Worker
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Master => write!(f, "master"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_config() {
        let master = CacheConfig {
            on_master: true,
            ..CacheConfig::default()
        };
        assert_eq!(NodeRole::from_config(&master), NodeRole::Master);
        assert_eq!(NodeRole::from_config(&CacheConfig::default()), NodeRole::Worker);
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeRole::Master.to_string(), "master");
        assert_eq!(NodeRole::Worker.to_string(), "worker");
    }
}
