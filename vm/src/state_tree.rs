// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::{ActorError, Map, DEFAULT_HAMT_CONFIG};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::econ::TokenAmount;
use fvm_shared::ActorID;

/// An actor's entry in the state tree.
#[derive(Serialize_tuple, Deserialize_tuple, Clone, PartialEq, Eq, Debug)]
pub struct Actor {
    /// Code ID, fixed for the actor's lifetime.
    pub code: Cid,
    /// Root of the actor's own state.
    pub head: Cid,
    /// Number of messages sent by this actor as a top-level sender.
    pub nonce: u64,
    pub balance: TokenAmount,
}

impl Actor {
    pub fn new(code: Cid, head: Cid, nonce: u64, balance: TokenAmount) -> Self {
        Self { code, head, nonce, balance }
    }
}

/// Maps actor IDs to actors. Changes are buffered in memory until flushed.
pub struct StateTree<'bs, BS: Blockstore> {
    actors: Map<&'bs BS, ActorID, Actor>,
}

impl<'bs, BS: Blockstore> StateTree<'bs, BS> {
    pub fn new(store: &'bs BS) -> Self {
        Self { actors: Map::empty(store, DEFAULT_HAMT_CONFIG, "actors") }
    }

    pub fn load(store: &'bs BS, root: &Cid) -> Result<Self, ActorError> {
        Ok(Self { actors: Map::load(store, root, DEFAULT_HAMT_CONFIG, "actors")? })
    }

    pub fn get_actor(&self, id: ActorID) -> Result<Option<Actor>, ActorError> {
        Ok(self.actors.try_get(&id)?.cloned())
    }

    /// Inserts or overwrites the actor at `id`.
    pub fn set_actor(&mut self, id: ActorID, actor: Actor) -> Result<(), ActorError> {
        self.actors.set(&id, actor)?;
        Ok(())
    }

    /// Writes pending changes and returns the root, which serves as a snapshot.
    pub fn flush(&mut self) -> Result<Cid, ActorError> {
        self.actors.flush()
    }

    /// Discards all changes since the snapshot at `root` was taken.
    pub fn revert(&mut self, root: &Cid) -> Result<(), ActorError> {
        let store = *self.actors.store();
        *self = Self::load(store, root)?;
        Ok(())
    }

    pub fn for_each<F>(&self, mut f: F) -> Result<(), ActorError>
    where
        F: FnMut(ActorID, &Actor) -> Result<(), ActorError>,
    {
        self.actors.for_each(|id, actor| f(id, actor))
    }
}
