#![allow(non_camel_case_types)]

//! `kv` is the transactional request dispatch and MVCC coordination core of
//! a single-node, Percolator-style key-value store: region-sharded request
//! routing, two-phase-commit (Prewrite/Commit) transactions, and snapshot
//! reads over an in-memory engine.
//!
//! ## Getting started
//!
//! ```rust
//! use kv::config::Config;
//! use kv::mvcc::store::MVCCStore;
//! use kv::region::{Epoch, Region};
//! use kv::registry::RegionRegistry;
//! use kv::server::{Context, GetRequest, PrewriteRequest, Server, WireMutation, WireMutationKind, CommitRequest};
//! use kv::storage::memory::Memory;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(RegionRegistry::new(1));
//! let epoch = Epoch { version: 1, conf_version: 1 };
//! registry.insert(Region::new(1, vec![], vec![], epoch, 1, true));
//!
//! let store = MVCCStore::new(Memory::new());
//! let server = Server::new(store, registry, Config::default());
//!
//! let ctx = Context { region_id: 1, region_epoch: epoch };
//! server.prewrite(PrewriteRequest {
//!     ctx: ctx.clone(),
//!     mutations: vec![WireMutation { key: b"a".to_vec(), kind: WireMutationKind::Put(b"1".to_vec()) }],
//!     primary_lock: b"a".to_vec(),
//!     start_version: 1,
//!     lock_ttl: 3000,
//! });
//! server.commit(CommitRequest { ctx: ctx.clone(), keys: vec![b"a".to_vec()], start_version: 1, commit_version: 2 });
//!
//! let resp = server.get(GetRequest { ctx, key: b"a".to_vec(), version: 5 });
//! assert_eq!(resp.value, Some(b"1".to_vec()));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod mvcc;
pub mod region;
pub mod registry;
pub mod server;
pub mod storage;

