use std::sync::Arc;

use crate::config::{Config, MAX_REQUEST_SIZE};
use crate::context::{RequestContext, ServerState, TraceTag};
use crate::error::{extract_key_error, extract_region_error, CResult, Error, KeyError, RegionError};
use crate::mvcc::store::{Mutation, MutationKind, MVCCStore};
use crate::region::Epoch;
use crate::registry::RegionRegistry;
use crate::storage::engine::Engine;

/// Identifies the target region and the epoch the caller believes it to be
/// at, carried on every transactional RPC.
#[derive(Clone, Debug)]
pub struct Context {
    pub region_id: u64,
    pub region_epoch: Epoch,
}

#[derive(Clone, Debug)]
pub struct KvPairResult {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub error: Option<KeyError>,
}

// ---- Get ----

pub struct GetRequest {
    pub ctx: Context,
    pub key: Vec<u8>,
    pub version: u64,
}

#[derive(Default, Debug)]
pub struct GetResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
    pub value: Option<Vec<u8>>,
}

// ---- Scan ----

pub struct ScanRequest {
    pub ctx: Context,
    pub start_key: Vec<u8>,
    pub limit: u32,
    pub version: u64,
}

#[derive(Default, Debug)]
pub struct ScanResponse {
    pub region_error: Option<RegionError>,
    pub pairs: Vec<KvPairResult>,
    pub next_key: Option<Vec<u8>>,
}

// ---- BatchGet ----

pub struct BatchGetRequest {
    pub ctx: Context,
    pub keys: Vec<Vec<u8>>,
    pub version: u64,
}

#[derive(Default, Debug)]
pub struct BatchGetResponse {
    pub region_error: Option<RegionError>,
    pub pairs: Vec<KvPairResult>,
}

// ---- Prewrite ----

#[derive(Clone, Debug)]
pub struct WireMutation {
    pub key: Vec<u8>,
    pub kind: WireMutationKind,
}

#[derive(Clone, Debug)]
pub enum WireMutationKind {
    Put(Vec<u8>),
    Delete,
    Lock,
}

pub struct PrewriteRequest {
    pub ctx: Context,
    pub mutations: Vec<WireMutation>,
    pub primary_lock: Vec<u8>,
    pub start_version: u64,
    pub lock_ttl: u64,
}

#[derive(Default, Debug)]
pub struct PrewriteResponse {
    pub region_error: Option<RegionError>,
    pub errors: Vec<KeyError>,
}

// ---- Commit ----

pub struct CommitRequest {
    pub ctx: Context,
    pub keys: Vec<Vec<u8>>,
    pub start_version: u64,
    pub commit_version: u64,
}

#[derive(Default, Debug)]
pub struct CommitResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
}

// ---- Cleanup ----

pub struct CleanupRequest {
    pub ctx: Context,
    pub key: Vec<u8>,
    pub start_version: u64,
}

#[derive(Default, Debug)]
pub struct CleanupResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
    pub commit_version: Option<u64>,
}

// ---- BatchRollback ----

pub struct BatchRollbackRequest {
    pub ctx: Context,
    pub keys: Vec<Vec<u8>>,
    pub start_version: u64,
}

#[derive(Default, Debug)]
pub struct BatchRollbackResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
}

// ---- ScanLock ----

pub struct ScanLockRequest {
    pub ctx: Context,
    pub max_version: u64,
}

#[derive(Clone, Debug)]
pub struct LockInfo {
    pub key: Vec<u8>,
    pub primary: Vec<u8>,
    pub start_version: u64,
    pub ttl: u64,
}

#[derive(Default, Debug)]
pub struct ScanLockResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
    pub locks: Vec<LockInfo>,
}

// ---- ResolveLock ----

pub struct ResolveLockRequest {
    pub ctx: Context,
    pub start_version: u64,
    pub commit_version: u64,
    pub txn_infos: Vec<(u64, u64)>,
}

#[derive(Default, Debug)]
pub struct ResolveLockResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
}

// ---- GC ----

pub struct GcRequest {
    pub ctx: Context,
    pub safe_point: u64,
}

#[derive(Default, Debug)]
pub struct GcResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<KeyError>,
}

// ---- DeleteRange ----

pub struct DeleteRangeRequest {
    pub ctx: Context,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct DeleteRangeResponse {
    pub region_error: Option<RegionError>,
    pub error: Option<String>,
}

// ---- Coprocessor ----

pub struct CoprocessorRequest {
    pub ctx: Context,
    pub tp: u32,
    pub data: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct CoprocessorResponse {
    pub region_error: Option<RegionError>,
    pub data: Vec<u8>,
    pub other_error: Option<String>,
}

// ---- Raw* / Raft / Snapshot / Split / MvccDebug ----
//
// These methods scope out real raw-mode KV, replication, and region-split
// mechanics (see SPEC_FULL.md Non-goals); they exist only as trivial,
// always-succeeding no-ops so the RPC surface SPEC_FULL.md §6 promises is
// complete and load-bearing for the integration suite.

pub struct RawGetRequest {
    pub ctx: Context,
    pub key: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct RawGetResponse {
    pub region_error: Option<RegionError>,
    pub value: Option<Vec<u8>>,
}

pub struct RawPutRequest {
    pub ctx: Context,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct RawPutResponse {
    pub region_error: Option<RegionError>,
}

pub struct RawDeleteRequest {
    pub ctx: Context,
    pub key: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct RawDeleteResponse {
    pub region_error: Option<RegionError>,
}

pub struct RawScanRequest {
    pub ctx: Context,
    pub start_key: Vec<u8>,
    pub limit: u32,
}

#[derive(Default, Debug)]
pub struct RawScanResponse {
    pub region_error: Option<RegionError>,
    pub pairs: Vec<KvPairResult>,
}

pub struct RaftMessageRequest {
    pub ctx: Context,
    pub data: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct RaftMessageResponse {
    pub region_error: Option<RegionError>,
}

pub struct SnapshotRequest {
    pub ctx: Context,
}

#[derive(Default, Debug)]
pub struct SnapshotResponse {
    pub region_error: Option<RegionError>,
}

pub struct SplitRequest {
    pub ctx: Context,
    pub split_key: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct SplitResponse {
    pub region_error: Option<RegionError>,
    pub new_region_id: Option<u64>,
}

pub struct MvccDebugRequest {
    pub ctx: Context,
    pub key: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct MvccDebugResponse {
    pub region_error: Option<RegionError>,
    pub info: Option<String>,
}

/// Rejects any request whose caller-supplied size already exceeds the raft
/// entry cap, without touching the region registry or the store. Since this
/// layer has no wire codec of its own, `estimated_size` stands in for "true
/// serialized size" (see SPEC_FULL.md §4.1).
fn size_gate(estimated_size: usize) -> Option<RegionError> {
    if estimated_size >= MAX_REQUEST_SIZE {
        Some(RegionError::RaftEntryTooLarge { size: estimated_size, limit: MAX_REQUEST_SIZE })
    } else {
        None
    }
}

/// The transactional request dispatch and MVCC coordination core.
pub struct Server<E: Engine> {
    state: Arc<ServerState>,
    store: MVCCStore<E>,
    registry: Arc<RegionRegistry>,
    config: Config,
}

impl<E: Engine> Server<E> {
    pub fn new(store: MVCCStore<E>, registry: Arc<RegionRegistry>, config: Config) -> Self {
        Server { state: Arc::new(ServerState::new()), store, registry, config }
    }

    pub fn registry(&self) -> &Arc<RegionRegistry> {
        &self.registry
    }

    /// Drains in-flight requests and stops accepting new ones. Blocks until
    /// the in-flight counter reaches zero.
    pub fn stop(&self) {
        self.state.stop();
    }

    pub fn in_flight(&self) -> i64 {
        self.state.in_flight()
    }

    fn new_context(&self, method: &'static str, ctx: &Context) -> CResult<RequestContext> {
        let registry = self.registry.clone();
        let region_id = ctx.region_id;
        let epoch = ctx.region_epoch;
        RequestContext::new(self.state.clone(), method, move || registry.resolve(region_id, epoch))
    }

    fn new_context_for_key(&self, method: &'static str, ctx: &Context, key: &[u8]) -> CResult<RequestContext> {
        let registry = self.registry.clone();
        let region_id = ctx.region_id;
        let epoch = ctx.region_epoch;
        let key = key.to_vec();
        RequestContext::new(self.state.clone(), method, move || registry.resolve_for_key(region_id, epoch, &key))
    }

    pub fn get(&self, req: GetRequest) -> GetResponse {
        if let Some(re) = size_gate(req.key.len()) {
            return GetResponse { region_error: Some(re), ..Default::default() };
        }

        let mut rctx = match self.new_context_for_key("Get", &req.ctx, &req.key) {
            Ok(c) => c,
            Err(e) => return GetResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return GetResponse { region_error: extract_region_error(&e), ..Default::default() };
        }

        rctx.record(TraceTag::ReadLockCheckStart);
        if let Ok(Some((key, lock))) = self.store.check_keys_lock(req.version, &[req.key.clone()]) {
            let err = Error::KeyIsLocked(Box::new(lock));
            rctx.finish(self.config.slow_request_threshold());
            let mut key_error = extract_key_error(&err);
            if let KeyError::Locked { key: locked_key, .. } = &mut key_error {
                *locked_key = key;
            }
            return GetResponse { error: Some(key_error), ..Default::default() };
        }

        rctx.record(TraceTag::ReadDbStart);
        let result = self.store.get(&req.key, req.version);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(value) => GetResponse { value, ..Default::default() },
            Err(e) => GetResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        }
    }

    pub fn scan(&self, req: ScanRequest) -> ScanResponse {
        if let Some(re) = size_gate(req.start_key.len()) {
            return ScanResponse { region_error: Some(re), ..Default::default() };
        }

        let mut rctx = match self.new_context("Scan", &req.ctx) {
            Ok(c) => c,
            Err(e) => {
                return ScanResponse {
                    pairs: vec![locked_pair_error(&e)],
                    ..Default::default()
                }
            }
        };
        if let Some(e) = rctx.region_err.take() {
            return ScanResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        let region = rctx.region.clone().expect("region present when region_err is None");
        if !region.is_mvcc {
            rctx.finish(self.config.slow_request_threshold());
            return ScanResponse::default();
        }

        let (_, region_end) = region.clip_range(&req.start_key, &[]);
        let region_end = region_end.to_vec();

        rctx.record(TraceTag::ReadLockCheckStart);
        if let Ok(Some((key, lock))) = self.store.check_range_lock(req.version, &req.start_key, &region_end) {
            let err = Error::KeyIsLocked(Box::new(lock));
            rctx.finish(self.config.slow_request_threshold());
            let mut pair = locked_pair_error(&err);
            pair.key = key;
            return ScanResponse { pairs: vec![pair], ..Default::default() };
        }

        rctx.record(TraceTag::ReadDbStart);
        let result = self.store.scan(&req.start_key, &region_end, req.version, req.limit as usize);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok((pairs, next_key)) => ScanResponse {
                pairs: pairs
                    .into_iter()
                    .map(|(key, value)| KvPairResult { key, value, error: None })
                    .collect(),
                next_key,
                ..Default::default()
            },
            Err(e) => ScanResponse { pairs: vec![locked_pair_error(&e)], ..Default::default() },
        }
    }

    pub fn batch_get(&self, req: BatchGetRequest) -> BatchGetResponse {
        let mut rctx = match self.new_context("BatchGet", &req.ctx) {
            Ok(c) => c,
            Err(e) => return BatchGetResponse { pairs: vec![locked_pair_error(&e)], ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return BatchGetResponse { region_error: extract_region_error(&e), ..Default::default() };
        }

        rctx.record(TraceTag::ReadLockCheckStart);
        if let Ok(Some((key, lock))) = self.store.check_keys_lock(req.version, &req.keys) {
            let err = Error::KeyIsLocked(Box::new(lock));
            rctx.finish(self.config.slow_request_threshold());
            let mut pair = locked_pair_error(&err);
            pair.key = key;
            return BatchGetResponse { pairs: vec![pair], ..Default::default() };
        }

        rctx.record(TraceTag::ReadDbStart);
        let mut pairs = Vec::with_capacity(req.keys.len());
        for key in &req.keys {
            match self.store.get(key, req.version) {
                Ok(Some(value)) => pairs.push(KvPairResult { key: key.clone(), value, error: None }),
                Ok(None) => {}
                Err(e) => pairs.push(KvPairResult {
                    key: key.clone(),
                    value: vec![],
                    error: Some(extract_key_error(&e)),
                }),
            }
        }
        rctx.finish(self.config.slow_request_threshold());
        BatchGetResponse { pairs, ..Default::default() }
    }

    pub fn prewrite(&self, req: PrewriteRequest) -> PrewriteResponse {
        let estimated_size: usize =
            req.mutations.iter().map(|m| m.key.len() + mutation_value_len(&m.kind)).sum();
        if let Some(re) = size_gate(estimated_size) {
            return PrewriteResponse { region_error: Some(re), ..Default::default() };
        }

        let mut rctx = match self.new_context("Prewrite", &req.ctx) {
            Ok(c) => c,
            Err(e) => return PrewriteResponse { errors: vec![extract_key_error(&e)], ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return PrewriteResponse { region_error: extract_region_error(&e), ..Default::default() };
        }

        let mutations: Vec<Mutation> = req
            .mutations
            .iter()
            .map(|m| Mutation {
                key: m.key.clone(),
                kind: match &m.kind {
                    WireMutationKind::Put(v) => MutationKind::Put(v.clone()),
                    WireMutationKind::Delete => MutationKind::Delete,
                    WireMutationKind::Lock => MutationKind::Lock,
                },
            })
            .collect();

        rctx.record(TraceTag::WriteLockCheckBegin);
        rctx.record(TraceTag::AcquireLatches);
        rctx.record(TraceTag::WriteDbBegin);
        let result = self.store.prewrite(&mutations, &req.primary_lock, req.start_version, req.lock_ttl);
        rctx.record(TraceTag::WriteDbEnd);
        rctx.record(TraceTag::WriteLockCheckEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(results) => {
                let errors = results.into_iter().flatten().map(|e| extract_key_error(&e)).collect();
                PrewriteResponse { errors, ..Default::default() }
            }
            Err(e) => PrewriteResponse { errors: vec![extract_key_error(&e)], ..Default::default() },
        }
    }

    pub fn commit(&self, req: CommitRequest) -> CommitResponse {
        let mut rctx = match self.new_context("Commit", &req.ctx) {
            Ok(c) => c,
            Err(e) => return CommitResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return CommitResponse { region_error: extract_region_error(&e), ..Default::default() };
        }

        rctx.record(TraceTag::AcquireLatches);
        rctx.record(TraceTag::WriteDbBegin);
        let result = self.store.commit(&req.keys, req.start_version, req.commit_version);
        rctx.record(TraceTag::WriteDbEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(()) => CommitResponse::default(),
            Err(e) => CommitResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        }
    }

    pub fn cleanup(&self, req: CleanupRequest) -> CleanupResponse {
        let mut rctx = match self.new_context("Cleanup", &req.ctx) {
            Ok(c) => c,
            Err(e) => return CleanupResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return CleanupResponse { region_error: extract_region_error(&e), ..Default::default() };
        }

        rctx.record(TraceTag::AcquireLatches);
        rctx.record(TraceTag::WriteDbBegin);
        let result = self.store.cleanup(&req.key, req.start_version);
        rctx.record(TraceTag::WriteDbEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(commit_version) => {
                if commit_version.is_some() {
                    log::error!("cleanup observed already-committed txn start_ts={}", req.start_version);
                }
                CleanupResponse { commit_version, ..Default::default() }
            }
            Err(e) => {
                log::error!("cleanup failed: {e}");
                CleanupResponse { error: Some(extract_key_error(&e)), ..Default::default() }
            }
        }
    }

    pub fn batch_rollback(&self, req: BatchRollbackRequest) -> BatchRollbackResponse {
        let mut rctx = match self.new_context("BatchRollback", &req.ctx) {
            Ok(c) => c,
            Err(e) => return BatchRollbackResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return BatchRollbackResponse { region_error: extract_region_error(&e), ..Default::default() };
        }

        rctx.record(TraceTag::AcquireLatches);
        rctx.record(TraceTag::WriteDbBegin);
        let result = self.store.batch_rollback(&req.keys, req.start_version);
        rctx.record(TraceTag::WriteDbEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(()) => BatchRollbackResponse::default(),
            Err(e) => BatchRollbackResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        }
    }

    pub fn scan_lock(&self, req: ScanLockRequest) -> ScanLockResponse {
        let mut rctx = match self.new_context("ScanLock", &req.ctx) {
            Ok(c) => c,
            Err(e) => return ScanLockResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return ScanLockResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        let region = rctx.region.clone().expect("region present when region_err is None");
        if !region.is_mvcc {
            rctx.finish(self.config.slow_request_threshold());
            return ScanLockResponse::default();
        }

        rctx.record(TraceTag::ReadDbStart);
        let result = self.store.scan_lock(&region.start_key, &region.end_key, req.max_version);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(locks) => ScanLockResponse {
                locks: locks
                    .into_iter()
                    .map(|(key, lock)| LockInfo {
                        key,
                        primary: lock.primary,
                        start_version: lock.start_ts,
                        ttl: lock.ttl,
                    })
                    .collect(),
                ..Default::default()
            },
            Err(e) => ScanLockResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        }
    }

    pub fn resolve_lock(&self, req: ResolveLockRequest) -> ResolveLockResponse {
        let mut rctx = match self.new_context("ResolveLock", &req.ctx) {
            Ok(c) => c,
            Err(e) => return ResolveLockResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return ResolveLockResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        let region = rctx.region.clone().expect("region present when region_err is None");
        if !region.is_mvcc {
            rctx.finish(self.config.slow_request_threshold());
            return ResolveLockResponse::default();
        }

        rctx.record(TraceTag::AcquireLatches);
        rctx.record(TraceTag::WriteDbBegin);
        let result = if req.txn_infos.is_empty() {
            self.store.resolve_lock_range(
                &region.start_key,
                &region.end_key,
                req.start_version,
                req.commit_version,
            )
        } else {
            self.store
                .resolve_lock_batch(&region.start_key, &region.end_key, &req.txn_infos)
                .map(|_| ())
        };
        rctx.record(TraceTag::WriteDbEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(()) => ResolveLockResponse::default(),
            Err(e) => {
                log::error!("resolve_lock failed: {e}");
                ResolveLockResponse { error: Some(extract_key_error(&e)), ..Default::default() }
            }
        }
    }

    pub fn gc(&self, req: GcRequest) -> GcResponse {
        let mut rctx = match self.new_context("GC", &req.ctx) {
            Ok(c) => c,
            Err(e) => return GcResponse { error: Some(extract_key_error(&e)), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return GcResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        let region = rctx.region.clone().expect("region present when region_err is None");
        if !region.is_mvcc {
            rctx.finish(self.config.slow_request_threshold());
            return GcResponse::default();
        }

        rctx.record(TraceTag::WriteDbBegin);
        let result = self.store.gc(&region.start_key, &region.end_key, req.safe_point);
        rctx.record(TraceTag::WriteDbEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(()) => GcResponse::default(),
            Err(e) => {
                log::error!("gc failed: {e}");
                GcResponse { error: Some(extract_key_error(&e)), ..Default::default() }
            }
        }
    }

    pub fn delete_range(&self, req: DeleteRangeRequest) -> DeleteRangeResponse {
        let mut rctx = match self.new_context("DeleteRange", &req.ctx) {
            Ok(c) => c,
            Err(e) => return DeleteRangeResponse { error: Some(e.to_string()), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            return DeleteRangeResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        let region = rctx.region.clone().expect("region present when region_err is None");
        if !region.is_mvcc {
            rctx.finish(self.config.slow_request_threshold());
            return DeleteRangeResponse::default();
        }

        rctx.record(TraceTag::WriteDbBegin);
        let result = self.store.delete_range(&req.start_key, &req.end_key);
        rctx.record(TraceTag::WriteDbEnd);
        rctx.finish(self.config.slow_request_threshold());

        match result {
            Ok(()) => DeleteRangeResponse::default(),
            Err(e) => {
                log::error!("delete_range failed: {e}");
                DeleteRangeResponse { error: Some(e.to_string()), ..Default::default() }
            }
        }
    }

    /// Coprocessor requests are dispatched by `tp`; the DAG/analyze
    /// executors themselves are external collaborators out of scope here,
    /// so every `tp` is reported as unimplemented rather than panicking.
    pub fn coprocessor(&self, req: CoprocessorRequest) -> CoprocessorResponse {
        let mut rctx = match self.new_context("Coprocessor", &req.ctx) {
            Ok(c) => c,
            Err(e) => return CoprocessorResponse { other_error: Some(e.to_string()), ..Default::default() },
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return CoprocessorResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        rctx.finish(self.config.slow_request_threshold());
        CoprocessorResponse {
            other_error: Some(format!("unimplemented coprocessor request type: {}", req.tp)),
            ..Default::default()
        }
    }

    /// No-op: raw-mode KV is out of scope (see SPEC_FULL.md Non-goals).
    pub fn raw_get(&self, req: RawGetRequest) -> RawGetResponse {
        let mut rctx = match self.new_context("RawGet", &req.ctx) {
            Ok(c) => c,
            Err(_) => return RawGetResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return RawGetResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        rctx.finish(self.config.slow_request_threshold());
        RawGetResponse::default()
    }

    /// No-op: raw-mode KV is out of scope (see SPEC_FULL.md Non-goals).
    pub fn raw_put(&self, req: RawPutRequest) -> RawPutResponse {
        let mut rctx = match self.new_context("RawPut", &req.ctx) {
            Ok(c) => c,
            Err(_) => return RawPutResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return RawPutResponse { region_error: extract_region_error(&e) };
        }
        rctx.finish(self.config.slow_request_threshold());
        RawPutResponse::default()
    }

    /// No-op: raw-mode KV is out of scope (see SPEC_FULL.md Non-goals).
    pub fn raw_delete(&self, req: RawDeleteRequest) -> RawDeleteResponse {
        let mut rctx = match self.new_context("RawDelete", &req.ctx) {
            Ok(c) => c,
            Err(_) => return RawDeleteResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return RawDeleteResponse { region_error: extract_region_error(&e) };
        }
        rctx.finish(self.config.slow_request_threshold());
        RawDeleteResponse::default()
    }

    /// No-op: raw-mode KV is out of scope (see SPEC_FULL.md Non-goals).
    pub fn raw_scan(&self, req: RawScanRequest) -> RawScanResponse {
        let mut rctx = match self.new_context("RawScan", &req.ctx) {
            Ok(c) => c,
            Err(_) => return RawScanResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return RawScanResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        rctx.finish(self.config.slow_request_threshold());
        RawScanResponse::default()
    }

    /// No-op: raft message exchange is out of scope (see SPEC_FULL.md Non-goals).
    pub fn raft_message(&self, req: RaftMessageRequest) -> RaftMessageResponse {
        let mut rctx = match self.new_context("Raft", &req.ctx) {
            Ok(c) => c,
            Err(_) => return RaftMessageResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return RaftMessageResponse { region_error: extract_region_error(&e) };
        }
        rctx.finish(self.config.slow_request_threshold());
        RaftMessageResponse::default()
    }

    /// No-op: snapshot streaming is out of scope (see SPEC_FULL.md Non-goals).
    pub fn snapshot(&self, req: SnapshotRequest) -> SnapshotResponse {
        let mut rctx = match self.new_context("Snapshot", &req.ctx) {
            Ok(c) => c,
            Err(_) => return SnapshotResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return SnapshotResponse { region_error: extract_region_error(&e) };
        }
        rctx.finish(self.config.slow_request_threshold());
        SnapshotResponse::default()
    }

    /// No-op: region split mechanics are out of scope (see SPEC_FULL.md Non-goals).
    pub fn split(&self, req: SplitRequest) -> SplitResponse {
        let mut rctx = match self.new_context("Split", &req.ctx) {
            Ok(c) => c,
            Err(_) => return SplitResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return SplitResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        rctx.finish(self.config.slow_request_threshold());
        SplitResponse::default()
    }

    /// No-op: real MVCC-by-key debug introspection is out of scope (see
    /// SPEC_FULL.md §9B); this stub always succeeds without walking the store.
    pub fn mvcc_debug(&self, req: MvccDebugRequest) -> MvccDebugResponse {
        let mut rctx = match self.new_context("MvccDebug", &req.ctx) {
            Ok(c) => c,
            Err(_) => return MvccDebugResponse::default(),
        };
        if let Some(e) = rctx.region_err.take() {
            rctx.finish(self.config.slow_request_threshold());
            return MvccDebugResponse { region_error: extract_region_error(&e), ..Default::default() };
        }
        rctx.finish(self.config.slow_request_threshold());
        MvccDebugResponse::default()
    }
}

fn mutation_value_len(kind: &WireMutationKind) -> usize {
    match kind {
        WireMutationKind::Put(v) => v.len(),
        WireMutationKind::Delete | WireMutationKind::Lock => 0,
    }
}

fn locked_pair_error(err: &Error) -> KvPairResult {
    KvPairResult { key: vec![], value: vec![], error: Some(extract_key_error(err)) }
}
