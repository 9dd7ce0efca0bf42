// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashMap;

use fc_actors_runtime::{MessageAccumulator, FIRST_NON_SINGLETON_ADDR};
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::{Address, Protocol};
use fvm_shared::ActorID;

use crate::State;

pub struct StateSummary {
    pub ids_by_address: HashMap<Address, ActorID>,
    pub next_id: ActorID,
}

/// Checks internal invariants of init state.
pub fn check_state_invariants<BS: Blockstore>(
    state: &State,
    store: &BS,
) -> (StateSummary, MessageAccumulator) {
    let acc = MessageAccumulator::default();

    acc.require(!state.network_name.is_empty(), "network name is empty");
    acc.require(
        state.next_id >= FIRST_NON_SINGLETON_ADDR,
        &format!("next id {} is too low", state.next_id),
    );

    let mut ids_by_address = HashMap::new();
    let mut addresses_by_id: HashMap<ActorID, Address> = HashMap::new();
    match state.load_address_map(store) {
        Ok(map) => {
            let ret = map.for_each(|key, &id| {
                acc.require(
                    key.protocol() != Protocol::ID,
                    &format!("key {} is an ID address", key),
                );
                acc.require(
                    id >= FIRST_NON_SINGLETON_ADDR,
                    &format!("unexpected singleton ID value {}", id),
                );
                acc.require(id < state.next_id, &format!("id {} not below next id", id));
                if let Some(duplicate) = addresses_by_id.insert(id, key) {
                    acc.add(&format!(
                        "duplicate mapping to ID {}: {} {}",
                        id, key, duplicate
                    ));
                }
                ids_by_address.insert(key, id);
                Ok(())
            });
            acc.require_no_error(ret, "error iterating address map");
        }
        Err(e) => acc.add(&format!("error loading address map: {}", e)),
    }

    (StateSummary { ids_by_address, next_id: state.next_id }, acc)
}
