// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::RefCell;
use std::collections::HashMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

/// Single-threaded in-memory store backing the mock runtime and container
/// tests. The VM uses its own thread-safe store.
#[derive(Debug, Default)]
pub struct MemoryBlockstore {
    blocks: RefCell<HashMap<Cid, Vec<u8>>>,
    writes: RefCell<usize>,
}

impl MemoryBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct blocks held.
    pub fn len(&self) -> usize {
        self.blocks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Puts seen so far, duplicates included.
    pub fn writes(&self) -> usize {
        *self.writes.borrow()
    }
}

impl Blockstore for MemoryBlockstore {
    fn get(&self, cid: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blocks.borrow().get(cid).cloned())
    }

    fn has(&self, cid: &Cid) -> anyhow::Result<bool> {
        Ok(self.blocks.borrow().contains_key(cid))
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> anyhow::Result<()> {
        *self.writes.borrow_mut() += 1;
        self.blocks.borrow_mut().insert(*k, block.to_vec());
        Ok(())
    }
}
