use serde_derive::{Deserialize, Serialize};

/// The durable outcome of a transaction at a given key, once it has either
/// committed or been rolled back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WriteKind {
    Put(Vec<u8>),
    Delete,
    /// Tombstone left by Cleanup/BatchRollback: this `start_ts` was rolled
    /// back and must never be re-prewritten or mistaken for a committed txn.
    Rollback,
    /// Written by a lock-only mutation once its transaction commits.
    Lock,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteRecord {
    pub start_ts: u64,
    pub commit_ts: u64,
    pub kind: WriteKind,
}

impl WriteRecord {
    pub fn is_rollback_of(&self, start_ts: u64) -> bool {
        self.start_ts == start_ts && matches!(self.kind, WriteKind::Rollback)
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self.kind, WriteKind::Rollback | WriteKind::Lock)
    }

    pub fn value(&self) -> Option<&[u8]> {
        match &self.kind {
            WriteKind::Put(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// All write records for a single user key, newest `commit_ts` first.
///
/// Grouping the whole per-key history behind one engine entry (rather than
/// one engine entry per version) sidesteps having to invent an
/// order-preserving key encoding on top of the byte-keyed `Engine` -- the
/// region-range Scan only ever needs to walk distinct user keys in
/// lexicographic order, which a single prefixed entry per key already gives
/// for free.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WriteHistory(pub Vec<WriteRecord>);

impl WriteHistory {
    pub fn push(&mut self, record: WriteRecord) {
        let pos = self.0.partition_point(|r| r.commit_ts > record.commit_ts);
        self.0.insert(pos, record);
    }

    /// Largest `commit_ts <= ts`, skipping rollback/lock markers.
    pub fn visible_at(&self, ts: u64) -> Option<&WriteRecord> {
        self.0.iter().find(|r| r.commit_ts <= ts && r.is_visible())
    }

    pub fn find_by_start_ts(&self, start_ts: u64) -> Option<&WriteRecord> {
        self.0.iter().find(|r| r.start_ts == start_ts && !matches!(r.kind, WriteKind::Rollback))
    }

    pub fn has_rollback(&self, start_ts: u64) -> bool {
        self.0.iter().any(|r| r.is_rollback_of(start_ts))
    }

    pub fn retain_from(&mut self, safe_point: u64) {
        // Keep every record newer than the safe point, plus the single
        // newest visible record at or below it (GC must never remove the
        // version a read at exactly `safe_point` would observe).
        let mut kept_old_visible = false;
        self.0.retain(|r| {
            if r.commit_ts > safe_point {
                return true;
            }
            if r.is_visible() && !kept_old_visible {
                kept_old_visible = true;
                return true;
            }
            false
        });
    }
}
