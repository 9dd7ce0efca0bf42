// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::{
    actor_error, ActorError, Config, Map, DEFAULT_HAMT_CONFIG, FIRST_NON_SINGLETON_ADDR,
};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::{Address, Protocol};
use fvm_shared::ActorID;

pub type AddressMap<BS> = Map<BS, Address, ActorID>;
pub const ADDRESS_MAP_CONFIG: Config = DEFAULT_HAMT_CONFIG;

/// State of the init actor: the robust address registry and the ID allocator.
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct State {
    pub address_map: Cid,
    pub next_id: ActorID,
    pub network_name: String,
}

impl State {
    pub fn new<BS: Blockstore>(store: &BS, network_name: String) -> Result<Self, ActorError> {
        let empty = AddressMap::flush_empty(store, ADDRESS_MAP_CONFIG)?;
        Ok(Self { address_map: empty, next_id: FIRST_NON_SINGLETON_ADDR, network_name })
    }

    pub fn load_address_map<'bs, BS: Blockstore>(
        &self,
        store: &'bs BS,
    ) -> Result<AddressMap<&'bs BS>, ActorError> {
        AddressMap::load(store, &self.address_map, ADDRESS_MAP_CONFIG, "addresses")
    }

    /// Allocates a new ID address and stores a mapping of the argument address to it.
    /// Fails if the argument address is already present in the map.
    ///
    /// Returns the newly-allocated actor ID.
    pub fn map_address_to_new_id<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
    ) -> Result<ActorID, ActorError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut map = self.load_address_map(store)?;
        if !map.set_if_absent(addr, id)? {
            return Err(actor_error!(
                forbidden,
                "robust address {} is already allocated in the address map",
                addr
            ));
        }
        self.address_map = map.flush()?;

        Ok(id)
    }

    /// Resolves an address to an ID-address, if possible.
    /// ID addresses pass through unchanged, including singletons which are never in the map.
    ///
    /// Returns `None` if the address is not an ID-address and is not mapped.
    pub fn resolve_address<BS: Blockstore>(
        &self,
        store: &BS,
        addr: &Address,
    ) -> Result<Option<Address>, ActorError> {
        if addr.protocol() == Protocol::ID {
            return Ok(Some(*addr));
        }
        let map = self.load_address_map(store)?;
        Ok(map.try_get(addr)?.copied().map(Address::new_id))
    }
}
