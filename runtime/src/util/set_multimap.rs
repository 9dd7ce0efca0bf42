// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::marker::PhantomData;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use crate::{ActorError, Config, Map, MapKey};

use super::Set;

const INNER_NAME: &str = "multimap set";

/// HAMT parameters for the outer map and for each inner set.
pub struct SetMultimapConfig {
    pub outer: Config,
    pub inner: Config,
}

/// Map from `K` to a set of `V`, stored as a HAMT of set roots. Keys whose
/// set becomes empty are removed.
pub struct SetMultimap<BS: Blockstore, K: MapKey, V: MapKey> {
    roots: Map<BS, K, Cid>,
    inner: Config,
    _values: PhantomData<V>,
}

impl<BS, K, V> SetMultimap<BS, K, V>
where
    BS: Blockstore + Clone,
    K: MapKey,
    V: MapKey,
{
    pub fn empty(store: BS, config: SetMultimapConfig, name: &'static str) -> Self {
        let roots = Map::empty(store, config.outer, name);
        Self { roots, inner: config.inner, _values: PhantomData }
    }

    pub fn load(
        store: BS,
        root: &Cid,
        config: SetMultimapConfig,
        name: &'static str,
    ) -> Result<Self, ActorError> {
        let roots = Map::load(store, root, config.outer, name)?;
        Ok(Self { roots, inner: config.inner, _values: PhantomData })
    }

    pub fn flush(&mut self) -> Result<Cid, ActorError> {
        self.roots.flush()
    }

    /// The set stored under `key`, if any.
    pub fn get(&self, key: &K) -> Result<Option<Set<BS, V>>, ActorError> {
        self.roots
            .try_get(key)?
            .map(|root| Set::load(self.roots.store().clone(), root, self.inner.clone(), INNER_NAME))
            .transpose()
    }

    pub fn put(&mut self, key: &K, value: V) -> Result<(), ActorError> {
        let mut set = match self.get(key)? {
            Some(set) => set,
            None => Set::empty(self.roots.store().clone(), self.inner.clone(), INNER_NAME),
        };
        set.put(&value)?;
        self.roots.set(key, set.flush()?)?;
        Ok(())
    }

    pub fn remove(&mut self, key: &K, value: V) -> Result<(), ActorError> {
        let Some(mut set) = self.get(key)? else {
            return Ok(());
        };
        set.delete(&value)?;
        if set.is_empty() {
            self.roots.try_remove(key)?;
        } else {
            self.roots.set(key, set.flush()?)?;
        }
        Ok(())
    }

    /// Drops every value stored under `key`.
    pub fn remove_all(&mut self, key: &K) -> Result<(), ActorError> {
        self.roots.try_remove(key).map(|_| ())
    }

    /// Visits each key that currently holds a non-empty set.
    pub fn for_each_key(
        &self,
        mut f: impl FnMut(K) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        self.roots.for_each(|k, _| f(k))
    }

    pub fn for_each_in(
        &self,
        key: &K,
        f: impl FnMut(V) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        match self.get(key)? {
            Some(set) => set.for_each(f),
            None => Ok(()),
        }
    }
}
