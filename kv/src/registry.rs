use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{CResult, Error};
use crate::region::{Epoch, Region};

/// Resolves an RPC's `(region_id, epoch)` to a pinned region handle, the way
/// a real node's region router does -- except routing decisions here are
/// local-only (no raft group membership, no split/merge).
pub struct RegionRegistry {
    local_store_id: u64,
    regions: RwLock<HashMap<u64, Arc<Region>>>,
}

impl RegionRegistry {
    pub fn new(local_store_id: u64) -> Self {
        RegionRegistry { local_store_id, regions: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, region: Region) {
        let mut regions = self.regions.write().unwrap();
        regions.insert(region.id, Arc::new(region));
    }

    pub fn remove(&self, region_id: u64) -> Option<Arc<Region>> {
        self.regions.write().unwrap().remove(&region_id)
    }

    /// Resolves `region_id` against the caller's `epoch`, returning a pinned
    /// (refcount-incremented) region on success.
    pub fn resolve(&self, region_id: u64, epoch: Epoch) -> CResult<Arc<Region>> {
        let region = {
            let regions = self.regions.read().unwrap();
            regions.get(&region_id).cloned()
        };
        let region = match region {
            Some(r) => r,
            None => return Err(Error::RegionNotFound(region_id)),
        };

        if region.leader_store_id != self.local_store_id {
            return Err(Error::NotLeader {
                region_id,
                leader_hint: Some(region.leader_store_id),
            });
        }
        if region.epoch != epoch {
            return Err(Error::StaleEpoch {
                region_id,
                have: (region.epoch.version, region.epoch.conf_version),
                want: (epoch.version, epoch.conf_version),
            });
        }

        region.acquire();
        Ok(region)
    }

    /// As `resolve`, but also verifies `key` falls within the region's range.
    pub fn resolve_for_key(&self, region_id: u64, epoch: Epoch, key: &[u8]) -> CResult<Arc<Region>> {
        let region = self.resolve(region_id, epoch)?;
        if !region.contains(key) {
            region.release();
            return Err(Error::KeyNotInRegion(key.to_vec()));
        }
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: u64, start: &[u8], end: &[u8], leader: u64) -> Region {
        Region::new(id, start.to_vec(), end.to_vec(), Epoch { version: 1, conf_version: 1 }, leader, true)
    }

    #[test]
    fn resolve_unknown_region_is_region_not_found() {
        let registry = RegionRegistry::new(1);
        let err = registry.resolve(99, Epoch::default()).unwrap_err();
        assert!(matches!(err, Error::RegionNotFound(99)));
    }

    #[test]
    fn resolve_wrong_epoch_is_stale() {
        let registry = RegionRegistry::new(1);
        registry.insert(region(1, b"a", b"z", 1));
        let err = registry.resolve(1, Epoch::default()).unwrap_err();
        assert!(matches!(err, Error::StaleEpoch { .. }));
    }

    #[test]
    fn resolve_not_local_leader() {
        let registry = RegionRegistry::new(1);
        registry.insert(region(1, b"a", b"z", 2));
        let err = registry.resolve(1, Epoch { version: 1, conf_version: 1 }).unwrap_err();
        assert!(matches!(err, Error::NotLeader { .. }));
    }

    #[test]
    fn resolve_pins_region_refcount() {
        let registry = RegionRegistry::new(1);
        registry.insert(region(1, b"a", b"z", 1));
        let r = registry.resolve(1, Epoch { version: 1, conf_version: 1 }).unwrap();
        assert_eq!(r.ref_count(), 1);
        r.release();
        assert_eq!(r.ref_count(), 0);
    }

    #[test]
    fn resolve_for_key_rejects_out_of_range() {
        let registry = RegionRegistry::new(1);
        registry.insert(region(1, b"a", b"m", 1));
        let err = registry.resolve_for_key(1, Epoch { version: 1, conf_version: 1 }, b"z").unwrap_err();
        assert!(matches!(err, Error::KeyNotInRegion(_)));
    }
}
