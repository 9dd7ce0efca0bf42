// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashMap;

use anyhow::Result;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use parking_lot::RwLock;

/// A thread-safe in-memory blockstore.
/// Readers proceed in parallel; writers of distinct blocks only contend on the lock.
#[derive(Debug, Default)]
pub struct SyncBlockstore {
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl SyncBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl Clone for SyncBlockstore {
    fn clone(&self) -> Self {
        Self { blocks: RwLock::new(self.blocks.read().clone()) }
    }
}

impl Blockstore for SyncBlockstore {
    fn get(&self, k: &Cid) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.read().get(k).cloned())
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> Result<()> {
        self.blocks.write().insert(*k, block.to_vec());
        Ok(())
    }

    fn has(&self, k: &Cid) -> Result<bool> {
        Ok(self.blocks.read().contains_key(k))
    }
}
