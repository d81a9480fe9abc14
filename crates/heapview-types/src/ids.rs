use facet::Facet;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a heap object, as assigned by the value-inspection host.
///
/// Only stable for the lifetime of one paused program. Treated as an opaque
/// key: no contiguity or reuse-freedom is assumed across runs.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Allocates an identity for a node the host never named, such as a
    /// synthesized map entry.
    ///
    /// Synthetic ids count down from `u64::MAX` so they stay clear of the
    /// small ids hosts hand out.
    pub fn next_synthetic() -> Self {
        static NEXT_SYNTHETIC: AtomicU64 = AtomicU64::new(u64::MAX);
        Self(NEXT_SYNTHETIC.fetch_sub(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseObjectIdError {
    pub input: String,
}

impl fmt::Display for ParseObjectIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not an object id: {:?}", self.input)
    }
}

impl Error for ParseObjectIdError {}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ParseObjectIdError {
                input: s.to_string(),
            })
    }
}
