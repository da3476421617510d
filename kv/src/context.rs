use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{CResult, Error};
use crate::region::Region;

/// The pre-registered trace events a `RequestContext` can record. Kept as an
/// enum (never free-form strings) so rendering a trace is just a `Display`
/// match, not string plumbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceTag {
    ReadLockCheckStart,
    ReadDbStart,
    WriteLockCheckBegin,
    WriteLockCheckEnd,
    WriteDbBegin,
    WriteDbIn,
    WriteDbEnd,
    AcquireLatches,
    Finish,
}

impl std::fmt::Display for TraceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TraceTag::ReadLockCheckStart => "start-of-read-lock-check",
            TraceTag::ReadDbStart => "start-of-read-db",
            TraceTag::WriteLockCheckBegin => "begin-write-lock-check",
            TraceTag::WriteLockCheckEnd => "end-write-lock-check",
            TraceTag::WriteDbBegin => "begin-write-db",
            TraceTag::WriteDbIn => "in-write-db",
            TraceTag::WriteDbEnd => "end-write-db",
            TraceTag::AcquireLatches => "acquire-latches",
            TraceTag::Finish => "finish",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TraceItem {
    pub tag: TraceTag,
    pub elapsed: std::time::Duration,
}

/// Process-wide accounting shared by every `RequestContext`: whether the
/// server is draining, and how many handlers are currently in flight.
pub struct ServerState {
    stopped: AtomicBool,
    in_flight: AtomicI64,
}

impl ServerState {
    pub fn new() -> Self {
        ServerState { stopped: AtomicBool::new(false), in_flight: AtomicI64::new(0) }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Marks the server as stopping and blocks until every in-flight
    /// handler has finalized. New requests created after this call observe
    /// `is_stopped() == true` and are rejected.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        while self.in_flight() > 0 {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    fn enter(&self) -> i64 {
        self.in_flight.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn exit(&self) -> i64 {
        self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request scratch state: region pin, trace log, and a lazily built
/// reader handle. Every RPC handler must create exactly one of these and
/// guarantee `finish` runs on every exit path.
pub struct RequestContext {
    server: Arc<ServerState>,
    pub method: &'static str,
    pub region: Option<Arc<Region>>,
    pub region_err: Option<Error>,
    start: Instant,
    trace: Vec<TraceItem>,
    finished: bool,
}

impl RequestContext {
    /// Creates a context for `method`, resolving `region` (or the lookup
    /// error) up front. Returns `Err` only when the server itself has
    /// stopped accepting work -- a region error is carried *inside* the
    /// returned context, not raised here, so callers still get one to
    /// finalize.
    pub fn new(
        server: Arc<ServerState>,
        method: &'static str,
        region_lookup: impl FnOnce() -> CResult<Arc<Region>>,
    ) -> CResult<Self> {
        server.enter();
        if server.is_stopped() {
            server.exit();
            return Err(Error::ServerStopped);
        }

        let (region, region_err) = match region_lookup() {
            Ok(r) => (Some(r), None),
            Err(e) => (None, Some(e)),
        };

        Ok(RequestContext {
            server,
            method,
            region,
            region_err,
            start: Instant::now(),
            trace: Vec::with_capacity(9),
            finished: false,
        })
    }

    pub fn record(&mut self, tag: TraceTag) {
        self.trace.push(TraceItem { tag, elapsed: self.start.elapsed() });
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Releases server/region refcounts, closes out the trace, and logs a
    /// slow-request warning if `slow_threshold` was exceeded. Idempotent:
    /// calling this more than once is a no-op after the first call.
    pub fn finish(&mut self, slow_threshold: std::time::Duration) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.record(TraceTag::Finish);

        if let Some(region) = &self.region {
            region.release();
        }
        self.server.exit();

        let elapsed = self.start.elapsed();
        if elapsed >= slow_threshold {
            let rendered: Vec<String> =
                self.trace.iter().map(|t| format!("{}@{:?}", t.tag, t.elapsed)).collect();
            log::warn!(
                target: "server_warnings",
                "slow request: method={} elapsed={:?} trace=[{}]",
                self.method,
                elapsed,
                rendered.join(", ")
            );
        }
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        // Guarantees finalize-on-every-exit-path even if a handler returns
        // early via `?` without calling `finish` explicitly.
        self.finish(std::time::Duration::from_secs(u64::MAX));
    }
}
