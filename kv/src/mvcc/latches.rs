use std::sync::{Mutex, MutexGuard};

/// Per-key write latches.
///
/// Unlike a `Lock`, a latch guards nothing durable -- it is held only for the
/// duration of one store operation, purely to serialize concurrent writers
/// touching the same key. Keys are hashed onto a fixed number of shards;
/// a caller wanting more than one key sorts and dedups the shard indices
/// first and acquires them in ascending order, so two writers racing on
/// overlapping key sets can never deadlock against each other.
pub struct Latches {
    shards: Vec<Mutex<()>>,
}

pub struct LatchGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl Latches {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        shards.resize_with(shard_count, || Mutex::new(()));
        Latches { shards }
    }

    fn shard_of(&self, key: &[u8]) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in key {
            hash ^= *b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash as usize) % self.shards.len()
    }

    /// Acquire latches for every key in `keys`, in a canonical order so that
    /// independent callers locking overlapping key sets always converge on
    /// the same acquisition order.
    pub fn acquire<'a>(&'a self, keys: &[Vec<u8>]) -> LatchGuard<'a> {
        let mut sorted: Vec<Vec<u8>> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut shard_indices: Vec<usize> = sorted.iter().map(|k| self.shard_of(k)).collect();
        shard_indices.sort_unstable();
        shard_indices.dedup();

        let guards = shard_indices.into_iter().map(|i| self.shards[i].lock().unwrap()).collect();
        LatchGuard { _guards: guards }
    }
}

impl Default for Latches {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_same_key_twice_without_deadlock() {
        let latches = Latches::new(16);
        let keys = vec![b"a".to_vec(), b"a".to_vec(), b"b".to_vec()];
        let _guard = latches.acquire(&keys);
    }

    #[test]
    fn canonical_order_is_stable_regardless_of_input_order() {
        let latches = Latches::new(16);
        let forward = vec![b"a".to_vec(), b"m".to_vec(), b"z".to_vec()];
        let backward = vec![b"z".to_vec(), b"m".to_vec(), b"a".to_vec()];

        let g1 = latches.acquire(&forward);
        drop(g1);
        let g2 = latches.acquire(&backward);
        drop(g2);
    }
}
