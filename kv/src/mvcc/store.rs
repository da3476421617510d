use std::ops::Bound;
use std::sync::{Arc, Mutex};

use crate::error::{CResult, Error};
use crate::mvcc::latches::Latches;
use crate::mvcc::lock::{Lock, LockKind};
use crate::mvcc::write::{WriteHistory, WriteKind, WriteRecord};
use crate::storage::engine::Engine;

const WRITE_PREFIX: u8 = b'w';
const LOCK_PREFIX: u8 = b'l';

fn prefixed(prefix: u8, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(prefix);
    out.extend_from_slice(key);
    out
}

fn write_key(key: &[u8]) -> Vec<u8> {
    prefixed(WRITE_PREFIX, key)
}

fn lock_key(key: &[u8]) -> Vec<u8> {
    prefixed(LOCK_PREFIX, key)
}

fn strip_prefix(encoded: &[u8]) -> Vec<u8> {
    encoded[1..].to_vec()
}

/// A mutation as staged by Prewrite.
#[derive(Clone, Debug)]
pub struct Mutation {
    pub key: Vec<u8>,
    pub kind: MutationKind,
}

#[derive(Clone, Debug)]
pub enum MutationKind {
    Put(Vec<u8>),
    Delete,
    Lock,
}

impl Mutation {
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Mutation { key, kind: MutationKind::Put(value) }
    }

    pub fn delete(key: Vec<u8>) -> Self {
        Mutation { key, kind: MutationKind::Delete }
    }

    fn lock_kind(&self) -> LockKind {
        match &self.kind {
            MutationKind::Put(v) => LockKind::Put(v.clone()),
            MutationKind::Delete => LockKind::Delete,
            MutationKind::Lock => LockKind::Lock,
        }
    }
}

/// Outcome of resolving every lock belonging to one `start_ts` within a
/// region, used by `resolve_lock_batch` to report how far it got before an
/// error (see SPEC_FULL.md open question on ResolveLock progress reporting).
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub resolved: Vec<u64>,
}

/// The Percolator-style MVCC store.
///
/// Wraps a single `Engine` behind a mutex, mirroring the donor's
/// `MVCC<E>(Arc<Mutex<E>>)` wrapper, but replaces its snapshot-isolation
/// active-transaction-set semantics with lock/write records keyed by
/// `(user_key, commit_ts)`.
pub struct MVCCStore<E: Engine> {
    engine: Arc<Mutex<E>>,
    latches: Latches,
}

impl<E: Engine> Clone for MVCCStore<E> {
    fn clone(&self) -> Self {
        MVCCStore { engine: Arc::clone(&self.engine), latches: Latches::default() }
    }
}

impl<E: Engine> MVCCStore<E> {
    pub fn new(engine: E) -> Self {
        MVCCStore { engine: Arc::new(Mutex::new(engine)), latches: Latches::default() }
    }

    fn history(&self, key: &[u8]) -> CResult<WriteHistory> {
        let mut engine = self.engine.lock().unwrap();
        match engine.get(&write_key(key))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(WriteHistory::default()),
        }
    }

    fn put_history(&self, key: &[u8], history: &WriteHistory) -> CResult<()> {
        let mut engine = self.engine.lock().unwrap();
        engine.set(&write_key(key), bincode::serialize(history)?)
    }

    fn lock_of(&self, key: &[u8]) -> CResult<Option<Lock>> {
        let mut engine = self.engine.lock().unwrap();
        match engine.get(&lock_key(key))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_lock(&self, key: &[u8], lock: &Lock) -> CResult<()> {
        let mut engine = self.engine.lock().unwrap();
        engine.set(&lock_key(key), bincode::serialize(lock)?)
    }

    fn remove_lock(&self, key: &[u8]) -> CResult<()> {
        let mut engine = self.engine.lock().unwrap();
        engine.delete(&lock_key(key))?;
        Ok(())
    }

    /// Returns the first lock blocking a read at `ts`, if any.
    pub fn check_keys_lock(&self, ts: u64, keys: &[Vec<u8>]) -> CResult<Option<(Vec<u8>, Lock)>> {
        for key in keys {
            if let Some(lock) = self.lock_of(key)? {
                if lock.start_ts <= ts {
                    return Ok(Some((key.clone(), lock)));
                }
            }
        }
        Ok(None)
    }

    /// Returns the first lock blocking a read at `ts` anywhere in `[start, end)`.
    pub fn check_range_lock(
        &self,
        ts: u64,
        start: &[u8],
        end: &[u8],
    ) -> CResult<Option<(Vec<u8>, Lock)>> {
        let lower = Bound::Included(lock_key(start));
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(lock_key(end))
        };
        let mut engine = self.engine.lock().unwrap();
        for item in engine.scan((lower, upper)) {
            let (k, v) = item?;
            let lock: Lock = bincode::deserialize(&v)?;
            if lock.start_ts <= ts {
                return Ok(Some((strip_prefix(&k), lock)));
            }
        }
        Ok(None)
    }

    /// Point read at `read_ts`. Caller is expected to have already called
    /// `check_keys_lock`; this only consults the write history.
    pub fn get(&self, key: &[u8], read_ts: u64) -> CResult<Option<Vec<u8>>> {
        let history = self.history(key)?;
        Ok(history.visible_at(read_ts).and_then(|r| r.value().map(|v| v.to_vec())))
    }

    /// Range scan over `[start, end)` at `read_ts`, up to `limit` pairs.
    /// Returns the pairs plus the key to resume from, if the scan was
    /// truncated by `limit` before reaching `end`.
    pub fn scan(
        &self,
        start: &[u8],
        end: &[u8],
        read_ts: u64,
        limit: usize,
    ) -> CResult<(Vec<(Vec<u8>, Vec<u8>)>, Option<Vec<u8>>)> {
        let lower = Bound::Included(write_key(start));
        let upper = if end.is_empty() { Bound::Unbounded } else { Bound::Excluded(write_key(end)) };

        let mut engine = self.engine.lock().unwrap();
        let mut pairs = Vec::new();
        let mut next_key = None;
        let mut iter = engine.scan((lower, upper));
        while let Some(item) = iter.next() {
            let (k, v) = item?;
            let user_key = strip_prefix(&k);
            let history: WriteHistory = bincode::deserialize(&v)?;
            if let Some(record) = history.visible_at(read_ts) {
                if pairs.len() == limit {
                    next_key = Some(user_key);
                    break;
                }
                if let Some(value) = record.value() {
                    pairs.push((user_key, value.to_vec()));
                }
            }
        }
        Ok((pairs, next_key))
    }

    /// Attempts to install a lock for each mutation. Returns one error slot
    /// per mutation (`None` means that mutation succeeded); the vector has
    /// the same length and order as `mutations`.
    pub fn prewrite(
        &self,
        mutations: &[Mutation],
        primary: &[u8],
        start_ts: u64,
        lock_ttl: u64,
    ) -> CResult<Vec<Option<Error>>> {
        let keys: Vec<Vec<u8>> = mutations.iter().map(|m| m.key.clone()).collect();
        let _guard = self.latches.acquire(&keys);

        let mut results = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            results.push(self.prewrite_one(mutation, primary, start_ts, lock_ttl));
        }
        Ok(results)
    }

    fn prewrite_one(
        &self,
        mutation: &Mutation,
        primary: &[u8],
        start_ts: u64,
        lock_ttl: u64,
    ) -> Option<Error> {
        let key = &mutation.key;

        match self.lock_of(key) {
            Ok(Some(existing)) if existing.start_ts != start_ts => {
                return Some(Error::KeyIsLocked(Box::new(existing)));
            }
            Ok(Some(_)) => return None, // already prewritten by this txn; idempotent retry.
            Ok(None) => {}
            Err(e) => return Some(e),
        }

        let history = match self.history(key) {
            Ok(h) => h,
            Err(e) => return Some(e),
        };
        if let Some(newest) = history.0.first() {
            if newest.is_visible() && newest.commit_ts >= start_ts {
                return Some(Error::WriteConflict {
                    start_ts,
                    conflict_ts: newest.commit_ts,
                    key: key.clone(),
                });
            }
        }
        if history.has_rollback(start_ts) {
            return Some(Error::AlreadyRolledBack(start_ts));
        }

        let lock = Lock::new(primary.to_vec(), start_ts, lock_ttl, mutation.lock_kind());
        if let Err(e) = self.put_lock(key, &lock) {
            return Some(e);
        }
        None
    }

    /// Replaces each key's lock (matching `start_ts`) with a write record at
    /// `commit_ts`. Returns the first failure, if any; earlier keys in the
    /// batch may already have been committed (see SPEC_FULL.md: Commit is
    /// idempotent and partial progress is allowed on retry).
    pub fn commit(&self, keys: &[Vec<u8>], start_ts: u64, commit_ts: u64) -> CResult<()> {
        let _guard = self.latches.acquire(keys);
        for key in keys {
            self.commit_one(key, start_ts, commit_ts)?;
        }
        Ok(())
    }

    fn commit_one(&self, key: &[u8], start_ts: u64, commit_ts: u64) -> CResult<()> {
        let mut history = self.history(key)?;

        match self.lock_of(key)? {
            Some(lock) if lock.start_ts == start_ts => {
                let kind = match lock.kind {
                    LockKind::Put(v) => WriteKind::Put(v),
                    LockKind::Delete => WriteKind::Delete,
                    LockKind::Lock => WriteKind::Lock,
                };
                history.push(WriteRecord { start_ts, commit_ts, kind });
                self.put_history(key, &history)?;
                self.remove_lock(key)?;
                Ok(())
            }
            _ => {
                if history.find_by_start_ts(start_ts).map(|r| r.commit_ts) == Some(commit_ts) {
                    return Ok(()); // already committed at this commit_ts: idempotent.
                }
                if history.has_rollback(start_ts) {
                    return Err(Error::TxnLockNotFound { start_ts, commit_ts, key: key.to_vec() });
                }
                Err(Error::TxnLockNotFound { start_ts, commit_ts, key: key.to_vec() })
            }
        }
    }

    /// Rolls back (or reports already-committed for) a single key.
    /// Returns `Some(commit_ts)` if the transaction had already committed.
    pub fn cleanup(&self, key: &[u8], start_ts: u64) -> CResult<Option<u64>> {
        let _guard = self.latches.acquire(std::slice::from_ref(&key.to_vec()));
        self.rollback_one(key, start_ts)
    }

    pub fn batch_rollback(&self, keys: &[Vec<u8>], start_ts: u64) -> CResult<()> {
        let _guard = self.latches.acquire(keys);
        for key in keys {
            self.rollback_one(key, start_ts)?;
        }
        Ok(())
    }

    fn rollback_one(&self, key: &[u8], start_ts: u64) -> CResult<Option<u64>> {
        let mut history = self.history(key)?;

        if let Some(committed) = history.find_by_start_ts(start_ts) {
            return Ok(Some(committed.commit_ts));
        }
        if history.has_rollback(start_ts) {
            return Ok(None); // already rolled back: idempotent no-op.
        }

        match self.lock_of(key)? {
            Some(lock) if lock.start_ts == start_ts => {
                self.remove_lock(key)?;
            }
            _ => {}
        }
        history.push(WriteRecord { start_ts, commit_ts: start_ts, kind: WriteKind::Rollback });
        self.put_history(key, &history)?;
        Ok(None)
    }

    /// All locks in `[start, end)` with `start_ts <= max_ts`, in key order.
    pub fn scan_lock(&self, start: &[u8], end: &[u8], max_ts: u64) -> CResult<Vec<(Vec<u8>, Lock)>> {
        let lower = Bound::Included(lock_key(start));
        let upper = if end.is_empty() { Bound::Unbounded } else { Bound::Excluded(lock_key(end)) };

        let mut engine = self.engine.lock().unwrap();
        let mut locks = Vec::new();
        for item in engine.scan((lower, upper)) {
            let (k, v) = item?;
            let lock: Lock = bincode::deserialize(&v)?;
            if lock.start_ts <= max_ts {
                locks.push((strip_prefix(&k), lock));
            }
        }
        Ok(locks)
    }

    /// Resolves every lock in `[start, end)` belonging to `txn_start_ts`:
    /// commits at `commit_ts` if `commit_ts > 0`, otherwise rolls back.
    pub fn resolve_lock_range(
        &self,
        start: &[u8],
        end: &[u8],
        txn_start_ts: u64,
        commit_ts: u64,
    ) -> CResult<()> {
        let locks = self.scan_lock(start, end, txn_start_ts)?;
        let keys: Vec<Vec<u8>> =
            locks.into_iter().filter(|(_, l)| l.start_ts == txn_start_ts).map(|(k, _)| k).collect();
        if keys.is_empty() {
            return Ok(());
        }
        if commit_ts > 0 {
            self.commit(&keys, txn_start_ts, commit_ts)
        } else {
            self.batch_rollback(&keys, txn_start_ts)
        }
    }

    /// Resolves a batch of `(start_ts, commit_ts)` pairs across `[start,
    /// end)`, stopping at the first failure. `commit_ts == 0` means rollback.
    pub fn resolve_lock_batch(
        &self,
        start: &[u8],
        end: &[u8],
        txn_infos: &[(u64, u64)],
    ) -> CResult<ResolveOutcome> {
        let mut outcome = ResolveOutcome::default();
        for (txn_start_ts, commit_ts) in txn_infos {
            self.resolve_lock_range(start, end, *txn_start_ts, *commit_ts)?;
            outcome.resolved.push(*txn_start_ts);
        }
        Ok(outcome)
    }

    /// Collapses write history older than `safe_point` in `[start, end)`.
    /// Locks are untouched.
    pub fn gc(&self, start: &[u8], end: &[u8], safe_point: u64) -> CResult<()> {
        let lower = Bound::Included(write_key(start));
        let upper = if end.is_empty() { Bound::Unbounded } else { Bound::Excluded(write_key(end)) };

        let keys: Vec<Vec<u8>> = {
            let mut engine = self.engine.lock().unwrap();
            engine.scan((lower, upper)).map(|item| item.map(|(k, _)| strip_prefix(&k))).collect::<CResult<_>>()?
        };

        for key in keys {
            let mut history = self.history(&key)?;
            history.retain_from(safe_point);
            if history.0.is_empty() {
                let mut engine = self.engine.lock().unwrap();
                engine.delete(&write_key(&key))?;
            } else {
                self.put_history(&key, &history)?;
            }
        }
        Ok(())
    }

    /// Unconditionally deletes everything (locks and write history) in
    /// `[start, end)`. Not MVCC-versioned.
    pub fn delete_range(&self, start: &[u8], end: &[u8]) -> CResult<()> {
        for prefix in [WRITE_PREFIX, LOCK_PREFIX] {
            let lower = Bound::Included(prefixed(prefix, start));
            let upper = if end.is_empty() { Bound::Unbounded } else { Bound::Excluded(prefixed(prefix, end)) };
            let keys: Vec<Vec<u8>> = {
                let mut engine = self.engine.lock().unwrap();
                engine.scan((lower, upper)).map(|item| item.map(|(k, _)| k)).collect::<CResult<_>>()?
            };
            let mut engine = self.engine.lock().unwrap();
            for key in keys {
                engine.delete(&key)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;
    use pretty_assertions::assert_eq;

    fn store() -> MVCCStore<Memory> {
        MVCCStore::new(Memory::new())
    }

    #[test]
    fn prewrite_commit_get_round_trip() {
        let s = store();
        let muts = vec![Mutation::put(b"k1".to_vec(), b"v1".to_vec())];
        let errs = s.prewrite(&muts, b"k1", 10, 3000).unwrap();
        assert!(errs.iter().all(|e| e.is_none()));

        assert!(s.check_keys_lock(15, &[b"k1".to_vec()]).unwrap().is_some());

        s.commit(&[b"k1".to_vec()], 10, 20).unwrap();
        assert!(s.check_keys_lock(25, &[b"k1".to_vec()]).unwrap().is_none());

        let v = s.get(b"k1", 25).unwrap();
        assert_eq!(v, Some(b"v1".to_vec()));
    }

    #[test]
    fn second_prewrite_is_locked() {
        let s = store();
        let m1 = vec![Mutation::put(b"a".to_vec(), b"1".to_vec())];
        s.prewrite(&m1, b"a", 10, 3000).unwrap();

        let m2 = vec![Mutation::put(b"a".to_vec(), b"2".to_vec())];
        let errs = s.prewrite(&m2, b"a", 11, 3000).unwrap();
        assert!(matches!(errs[0], Some(Error::KeyIsLocked(_))));
    }

    #[test]
    fn cleanup_before_commit_then_commit_fails() {
        let s = store();
        let m = vec![Mutation::put(b"k".to_vec(), b"v".to_vec())];
        s.prewrite(&m, b"k", 5, 3000).unwrap();

        let committed = s.cleanup(b"k", 5).unwrap();
        assert_eq!(committed, None);

        let err = s.commit(&[b"k".to_vec()], 5, 7);
        assert!(err.is_err());

        assert_eq!(s.get(b"k", 9).unwrap(), None);
    }

    #[test]
    fn cleanup_after_commit_reports_commit_ts() {
        let s = store();
        let m = vec![Mutation::put(b"k".to_vec(), b"v".to_vec())];
        s.prewrite(&m, b"k", 5, 3000).unwrap();
        s.commit(&[b"k".to_vec()], 5, 7).unwrap();

        let committed = s.cleanup(b"k", 5).unwrap();
        assert_eq!(committed, Some(7));
    }

    #[test]
    fn gc_keeps_newest_visible_at_or_below_safe_point() {
        let s = store();
        for (start, commit, val) in [(1u64, 2u64, b"a"), (3, 4, b"b"), (5, 6, b"c")] {
            let m = vec![Mutation::put(b"k".to_vec(), val.to_vec())];
            s.prewrite(&m, b"k", start, 1000).unwrap();
            s.commit(&[b"k".to_vec()], start, commit).unwrap();
        }
        s.gc(b"", b"", 5).unwrap();
        assert_eq!(s.get(b"k", 5).unwrap(), Some(b"b".to_vec()));
        assert_eq!(s.get(b"k", 100).unwrap(), Some(b"c".to_vec()));
    }

    #[test]
    fn scan_respects_limit_and_reports_next_key() {
        let s = store();
        for k in [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()] {
            let m = vec![Mutation::put(k.clone(), b"v".to_vec())];
            s.prewrite(&m, &k, 1, 1000).unwrap();
            s.commit(&[k], 1, 2).unwrap();
        }
        let (pairs, next) = s.scan(b"", b"", 10, 2).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(next, Some(b"c".to_vec()));
    }
}
