// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Replies the market reads from the miner, reward and power actors.

use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;

pub mod miner {
    use super::*;

    pub const CONTROL_ADDRESSES_METHOD: u64 = 2;

    /// Only `owner` and `worker` matter to the market.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
    pub struct ControlAddressesReturn {
        pub owner: Address,
        pub worker: Address,
        pub control_addresses: Vec<Address>,
    }
}

pub mod reward {
    pub const THIS_EPOCH_REWARD_METHOD: u64 = 3;

    pub use fc_actors_runtime::reward::ThisEpochRewardReturn;
}

pub mod power {
    use fc_actors_runtime::reward::FilterEstimate;
    use fvm_ipld_encoding::tuple::*;
    use fvm_shared::bigint::bigint_ser;
    use fvm_shared::econ::TokenAmount;
    use fvm_shared::sector::StoragePower;

    pub const CURRENT_TOTAL_POWER_METHOD: u64 = 9;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
    pub struct CurrentTotalPowerReturn {
        #[serde(with = "bigint_ser")]
        pub raw_byte_power: StoragePower,
        #[serde(with = "bigint_ser")]
        pub quality_adj_power: StoragePower,
        pub pledge_collateral: TokenAmount,
        pub quality_adj_power_smoothed: FilterEstimate,
    }
}
