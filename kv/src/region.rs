use std::sync::atomic::{AtomicI64, Ordering};

/// `(version, conf_version)` identifying a region's key-range/membership
/// generation. A request's epoch must match the serving region's epoch
/// exactly; any mismatch is reported as stale-epoch rather than silently
/// served against the wrong range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Epoch {
    pub version: u64,
    pub conf_version: u64,
}

/// A key-range shard. Regions never overlap and together cover the whole
/// keyspace; `end_key` empty means "no upper bound".
pub struct Region {
    pub id: u64,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub epoch: Epoch,
    pub leader_store_id: u64,
    /// Set at construction rather than derived from `start_key`'s first
    /// byte (see SPEC_FULL.md open question): whether this region's data is
    /// read through MVCC semantics or is a plain unversioned key space.
    pub is_mvcc: bool,
    refcount: AtomicI64,
}

impl Region {
    pub fn new(
        id: u64,
        start_key: Vec<u8>,
        end_key: Vec<u8>,
        epoch: Epoch,
        leader_store_id: u64,
        is_mvcc: bool,
    ) -> Self {
        Region { id, start_key, end_key, epoch, leader_store_id, is_mvcc, refcount: AtomicI64::new(0) }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice() && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    /// Clips `[start, end)` to this region's boundary. `end` empty means
    /// "clip to the region's end key".
    pub fn clip_range<'a>(&'a self, start: &'a [u8], end: &'a [u8]) -> (&'a [u8], &'a [u8]) {
        let clipped_end: &[u8] = if end.is_empty() {
            &self.end_key
        } else if self.end_key.is_empty() || end < self.end_key.as_slice() {
            end
        } else {
            &self.end_key
        };
        (start, clipped_end)
    }

    pub fn acquire(&self) -> i64 {
        self.refcount.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn release(&self) -> i64 {
        self.refcount.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn ref_count(&self) -> i64 {
        self.refcount.load(Ordering::SeqCst)
    }
}
