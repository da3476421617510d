use serde_derive::{Deserialize, Serialize};

/// What a prewritten-but-not-yet-committed key is going to become once its
/// transaction commits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LockKind {
    Put(Vec<u8>),
    Delete,
    /// A lock-only mutation: guards the key without changing its value.
    Lock,
}

/// A Percolator-style lock. At most one of these may exist per key at a time;
/// its presence blocks reads with `read_ts >= start_ts`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub primary: Vec<u8>,
    pub start_ts: u64,
    pub ttl: u64,
    pub kind: LockKind,
}

impl Lock {
    pub fn new(primary: Vec<u8>, start_ts: u64, ttl: u64, kind: LockKind) -> Self {
        Lock { primary, start_ts, ttl, kind }
    }

    pub fn is_primary(&self, key: &[u8]) -> bool {
        self.primary == key
    }
}
