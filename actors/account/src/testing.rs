// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::{MessageAccumulator, FIRST_NON_SINGLETON_ADDR};
use fvm_shared::address::Address;

use crate::State;

/// Account state must hold a key address and live at a non-singleton ID.
pub fn check_state_invariants(state: &State, id_address: &Address) -> MessageAccumulator {
    let acc = MessageAccumulator::default();
    let non_singleton = id_address.id().map(|id| id >= FIRST_NON_SINGLETON_ADDR).unwrap_or(false);
    acc.require(non_singleton, &format!("account at unexpected address {}", id_address));
    acc.require(
        state.signature_type().is_some(),
        &format!("account key {} is not a key address", state.address),
    );
    acc
}
