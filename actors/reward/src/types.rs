// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::bigint::bigint_ser;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::StoragePower;
use serde::{Deserialize, Serialize};

pub use fc_actors_runtime::reward::ThisEpochRewardReturn;

/// Network raw power at genesis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructorParams {
    #[serde(with = "bigint_ser")]
    pub curr_realized_power: StoragePower,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct AwardBlockRewardParams {
    pub miner: Address,
    pub penalty: TokenAmount,
    pub gas_reward: TokenAmount,
    pub win_count: i64,
}

/// Network raw power at the end of the epoch, reported by the power actor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateNetworkKPIParams {
    #[serde(with = "bigint_ser")]
    pub curr_realized_power: StoragePower,
}
