// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Fixed IDs of the actors created at genesis.

use fvm_shared::address::Address;
use fvm_shared::ActorID;

macro_rules! singleton {
    ($id_name:ident, $addr_name:ident, $id:expr) => {
        pub const $id_name: ActorID = $id;
        pub const $addr_name: Address = Address::new_id($id_name);
    };
}

singleton!(SYSTEM_ACTOR_ID, SYSTEM_ACTOR_ADDR, 0);
singleton!(INIT_ACTOR_ID, INIT_ACTOR_ADDR, 1);
singleton!(REWARD_ACTOR_ID, REWARD_ACTOR_ADDR, 2);
singleton!(CRON_ACTOR_ID, CRON_ACTOR_ADDR, 3);
singleton!(STORAGE_POWER_ACTOR_ID, STORAGE_POWER_ACTOR_ADDR, 4);
singleton!(STORAGE_MARKET_ACTOR_ID, STORAGE_MARKET_ACTOR_ADDR, 5);
// Reserved; the registry itself is not deployed.
singleton!(VERIFIED_REGISTRY_ACTOR_ID, VERIFIED_REGISTRY_ACTOR_ADDR, 6);
singleton!(BURNT_FUNDS_ACTOR_ID, BURNT_FUNDS_ACTOR_ADDR, 99);

/// The init actor hands out IDs starting here.
pub const FIRST_NON_SINGLETON_ADDR: ActorID = 100;
