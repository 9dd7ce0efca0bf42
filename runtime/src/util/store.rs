// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::{Block, Blockstore};
use fvm_ipld_encoding::IPLD_RAW;
use multihash::Code;
use thiserror::Error;

/// Failure to read or write raw content.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("block {0} not found")]
    NotFound(Cid),
    #[error("blockstore: {0}")]
    Io(#[from] anyhow::Error),
}

/// Content-addressed access to raw blocks, available on every [`Blockstore`].
pub trait ContentStore {
    /// Returns the bytes stored under `cid`.
    fn get_raw(&self, cid: &Cid) -> Result<Vec<u8>, StoreError>;
    /// Stores `bytes` as a raw block keyed by its blake2b-256 digest.
    fn put_raw(&self, bytes: &[u8]) -> Result<Cid, StoreError>;
    fn contains(&self, cid: &Cid) -> Result<bool, StoreError>;
}

impl<BS: Blockstore> ContentStore for BS {
    fn get_raw(&self, cid: &Cid) -> Result<Vec<u8>, StoreError> {
        self.get(cid)?.ok_or(StoreError::NotFound(*cid))
    }

    fn put_raw(&self, bytes: &[u8]) -> Result<Cid, StoreError> {
        Ok(self.put(Code::Blake2b256, &Block::new(IPLD_RAW, bytes))?)
    }

    fn contains(&self, cid: &Cid) -> Result<bool, StoreError> {
        Ok(self.has(cid)?)
    }
}
