use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kv::mvcc::store::{Mutation, MVCCStore};
use kv::storage::memory::Memory;

fn prewrite_commit_one(store: &MVCCStore<Memory>, ts: u64, key: &[u8]) {
    let muts = vec![Mutation::put(key.to_vec(), b"v".to_vec())];
    store.prewrite(&muts, key, ts, 3000).unwrap();
    store.commit(&[key.to_vec()], ts, ts + 1).unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("prewrite+commit single key", |b| {
        let store = MVCCStore::new(Memory::new());
        let mut ts = 1u64;
        b.iter(|| {
            prewrite_commit_one(black_box(&store), ts, b"bench-key");
            ts += 2;
        })
    });

    c.bench_function("point get after commit", |b| {
        let store = MVCCStore::new(Memory::new());
        prewrite_commit_one(&store, 1, b"bench-get-key");
        b.iter(|| black_box(store.get(b"bench-get-key", 1_000_000).unwrap()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
