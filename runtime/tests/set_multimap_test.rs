// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::test_blockstores::MemoryBlockstore;
use fc_actors_runtime::{SetMultimap, SetMultimapConfig, DEFAULT_HAMT_CONFIG};
use fvm_shared::clock::ChainEpoch;

fn config() -> SetMultimapConfig {
    SetMultimapConfig { outer: DEFAULT_HAMT_CONFIG, inner: DEFAULT_HAMT_CONFIG }
}

fn values(mm: &SetMultimap<&MemoryBlockstore, ChainEpoch, u64>, epoch: ChainEpoch) -> Vec<u64> {
    let mut out = Vec::new();
    mm.for_each_in(&epoch, |id| {
        out.push(id);
        Ok(())
    })
    .unwrap();
    out.sort();
    out
}

#[test]
fn values_are_deduplicated_per_key() {
    let store = MemoryBlockstore::new();
    let mut ops = SetMultimap::empty(&store, config(), "ops");
    for (epoch, id) in [(10, 1), (10, 2), (10, 1), (20, 3)] {
        ops.put(&epoch, id).unwrap();
    }
    assert_eq!(vec![1, 2], values(&ops, 10));
    assert_eq!(vec![3], values(&ops, 20));
    assert!(values(&ops, 30).is_empty());
}

#[test]
fn emptied_keys_disappear() {
    let store = MemoryBlockstore::new();
    let mut ops = SetMultimap::<_, ChainEpoch, u64>::empty(&store, config(), "ops");
    ops.put(&10, 1).unwrap();
    ops.put(&20, 2).unwrap();
    ops.put(&20, 3).unwrap();

    ops.remove(&10, 1).unwrap();
    assert!(ops.get(&10).unwrap().is_none());
    // Removing from a missing key is a no-op.
    ops.remove(&10, 1).unwrap();

    let root = ops.flush().unwrap();
    let mut ops: SetMultimap<_, ChainEpoch, u64> =
        SetMultimap::load(&store, &root, config(), "ops").unwrap();
    let mut keys = Vec::new();
    ops.for_each_key(|k| {
        keys.push(k);
        Ok(())
    })
    .unwrap();
    assert_eq!(vec![20], keys);

    ops.remove_all(&20).unwrap();
    assert!(ops.get(&20).unwrap().is_none());
}
