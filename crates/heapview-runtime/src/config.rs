use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use heapview_types::MapTypePolicy;
use tracing::warn;

pub const DEFAULT_MAX_DEPTH: u32 = 3;

pub const DEPTH_VAR: &str = "HEAPVIEW_DEPTH";
pub const COLLECTOR_VAR: &str = "HEAPVIEW_COLLECTOR";
pub const MAP_TYPES_VAR: &str = "HEAPVIEW_MAP_TYPES";
pub const WAIT_TIMEOUT_VAR: &str = "HEAPVIEW_WAIT_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorKind {
    /// Hand the finished diagram to a local sink.
    #[default]
    Batch,
    /// Publish to remote viewers and serve expansions afterwards.
    Streaming,
}

impl FromStr for CollectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "streaming" | "stream" => Ok(Self::Streaming),
            other => Err(format!("unknown collector {other:?} (expected batch or streaming)")),
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => f.write_str("batch"),
            Self::Streaming => f.write_str("streaming"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub max_depth: u32,
    pub collector: CollectorKind,
    pub map_types: MapTypePolicy,
    /// Give up waiting for the host after this long. `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            collector: CollectorKind::default(),
            map_types: MapTypePolicy::default(),
            wait_timeout: None,
        }
    }
}

impl SnapshotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, keeping the default for anything
    /// missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(DEPTH_VAR) {
            match raw.trim().parse::<u32>() {
                Ok(depth) => config.max_depth = depth,
                Err(e) => warn!(var = DEPTH_VAR, value = %raw, error = %e, "invalid depth, keeping default"),
            }
        }

        if let Some(raw) = lookup(COLLECTOR_VAR) {
            match raw.parse::<CollectorKind>() {
                Ok(kind) => config.collector = kind,
                Err(e) => warn!(var = COLLECTOR_VAR, error = %e, "keeping default collector"),
            }
        }

        if let Some(raw) = lookup(MAP_TYPES_VAR) {
            if raw.trim().is_empty() {
                warn!(var = MAP_TYPES_VAR, "empty map type list, keeping default");
            } else {
                config.map_types = MapTypePolicy::from_list(&raw);
            }
        }

        if let Some(raw) = lookup(WAIT_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.wait_timeout = None,
                Ok(ms) => config.wait_timeout = Some(Duration::from_millis(ms)),
                Err(e) => warn!(var = WAIT_TIMEOUT_VAR, value = %raw, error = %e, "invalid timeout, keeping default"),
            }
        }

        config
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_collector(mut self, collector: CollectorKind) -> Self {
        self.collector = collector;
        self
    }

    pub fn with_map_types(mut self, map_types: MapTypePolicy) -> Self {
        self.map_types = map_types;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}
