use thiserror::Error;

/// Errors raised by the storage engine, the MVCC store, and the region layer.
///
/// This is the *internal* error type. The dispatch layer (in `server`) never
/// hands this type to a caller directly -- it is matched on and converted into
/// the wire-level `RegionError`/`KeyError` taxonomy exactly once, at the
/// boundary (see `server::extract_region_error` / `server::extract_key_error`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode/decode error: {0}")]
    Codec(String),

    #[error("value error: {0}")]
    Value(String),

    #[error("key is locked: {0:?}")]
    KeyIsLocked(Box<crate::mvcc::lock::Lock>),

    #[error("write conflict: start_ts={start_ts} conflict_ts={conflict_ts} key={key:?}")]
    WriteConflict { start_ts: u64, conflict_ts: u64, key: Vec<u8> },

    #[error("txn not found: start_ts={start_ts} key={key:?}")]
    TxnLockNotFound { start_ts: u64, commit_ts: u64, key: Vec<u8> },

    #[error("txn already rolled back: start_ts={0}")]
    AlreadyRolledBack(u64),

    #[error("region {0} not found")]
    RegionNotFound(u64),

    #[error("region {region_id} is not leader, leader hint: {leader_hint:?}")]
    NotLeader { region_id: u64, leader_hint: Option<u64> },

    #[error("key {0:?} not in region range")]
    KeyNotInRegion(Vec<u8>),

    #[error("epoch of region {region_id} is stale (have {have:?}, want {want:?})")]
    StaleEpoch { region_id: u64, have: (u64, u64), want: (u64, u64) },

    #[error("raft entry too large: {size} bytes (limit {limit})")]
    RaftEntryTooLarge { size: usize, limit: usize },

    #[error("server is busy: {0}")]
    ServerIsBusy(String),

    #[error("server is stopped")]
    ServerStopped,

    #[error("other: {0}")]
    Other(String),
}

pub type CResult<T> = std::result::Result<T, Error>;

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

/// Wire-level region error: reported in a response's `region_error` slot.
/// A region error means the store was never consulted.
#[derive(Clone, Debug, PartialEq)]
pub enum RegionError {
    NotLeader { region_id: u64, leader_store_id: Option<u64> },
    RegionNotFound { region_id: u64 },
    KeyNotInRegion { key: Vec<u8>, region_id: u64 },
    StaleEpoch { region_id: u64, have: (u64, u64), want: (u64, u64) },
    ServerIsBusy { reason: String },
    RaftEntryTooLarge { size: usize, limit: usize },
}

/// Wire-level key error: reported per-key (or per-batch) alongside a value
/// response.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyError {
    Locked { key: Vec<u8>, primary: Vec<u8>, start_ts: u64, ttl: u64 },
    Retryable(String),
    Abort(String),
}

/// Matches the subset of `Error` that represents a region-level failure.
/// Total and tagged-variant based -- never string matching.
pub fn extract_region_error(err: &Error) -> Option<RegionError> {
    match err {
        Error::NotLeader { region_id, leader_hint } => {
            Some(RegionError::NotLeader { region_id: *region_id, leader_store_id: *leader_hint })
        }
        Error::RegionNotFound(region_id) => Some(RegionError::RegionNotFound { region_id: *region_id }),
        Error::KeyNotInRegion(key) => {
            Some(RegionError::KeyNotInRegion { key: key.clone(), region_id: 0 })
        }
        Error::StaleEpoch { region_id, have, want } => {
            Some(RegionError::StaleEpoch { region_id: *region_id, have: *have, want: *want })
        }
        Error::ServerIsBusy(reason) => Some(RegionError::ServerIsBusy { reason: reason.clone() }),
        Error::RaftEntryTooLarge { size, limit } => {
            Some(RegionError::RaftEntryTooLarge { size: *size, limit: *limit })
        }
        _ => None,
    }
}

/// Total conversion from an internal error into the key-error taxonomy.
/// Anything not explicitly recognized as locked/retryable falls through to
/// `Abort` and is logged at error level, mirroring the donor corpus's
/// `extract_key_error` default arm.
pub fn extract_key_error(err: &Error) -> KeyError {
    match err {
        Error::KeyIsLocked(lock) => KeyError::Locked {
            key: lock.primary.clone(),
            primary: lock.primary.clone(),
            start_ts: lock.start_ts,
            ttl: lock.ttl,
        },
        Error::WriteConflict { start_ts, conflict_ts, key } => {
            log::warn!("write conflict on retry: start_ts={start_ts} conflict_ts={conflict_ts} key={key:?}");
            KeyError::Retryable(err.to_string())
        }
        Error::TxnLockNotFound { start_ts, key, .. } => {
            log::warn!("txn lock not found on retry: start_ts={start_ts} key={key:?}");
            KeyError::Retryable(err.to_string())
        }
        Error::ServerStopped => KeyError::Retryable(err.to_string()),
        other => {
            log::error!("aborting transaction on unrecoverable error: {other}");
            KeyError::Abort(other.to_string())
        }
    }
}
