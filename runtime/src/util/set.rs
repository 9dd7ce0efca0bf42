// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use crate::{ActorError, Config, Map, MapKey};

/// A HAMT keyed set. Members map to the unit value.
pub struct Set<BS: Blockstore, K: MapKey> {
    members: Map<BS, K, ()>,
}

impl<BS: Blockstore, K: MapKey> Set<BS, K> {
    pub fn empty(store: BS, config: Config, name: &'static str) -> Self {
        Self { members: Map::empty(store, config, name) }
    }

    pub fn load(
        store: BS,
        root: &Cid,
        config: Config,
        name: &'static str,
    ) -> Result<Self, ActorError> {
        Map::load(store, root, config, name).map(|members| Self { members })
    }

    pub fn flush(&mut self) -> Result<Cid, ActorError> {
        self.members.flush()
    }

    /// Inserts `key`, returning false if it was already a member.
    pub fn put(&mut self, key: &K) -> Result<bool, ActorError> {
        self.members.set_if_absent(key, ())
    }

    pub fn has(&self, key: &K) -> Result<bool, ActorError> {
        self.members.contains_key(key)
    }

    /// Removes `key`, returning false if it was not a member.
    pub fn delete(&mut self, key: &K) -> Result<bool, ActorError> {
        self.members.try_remove(key).map(|old| old.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn for_each(
        &self,
        mut f: impl FnMut(K) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        self.members.for_each(|k, _| f(k))
    }
}
