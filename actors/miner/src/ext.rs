// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::bigint::bigint_ser;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::{RegisteredSealProof, StoragePower};
use serde::{Deserialize, Serialize};

pub mod market {
    use super::*;
    use fc_actors_runtime::DealWeight;

    pub const VERIFY_DEALS_FOR_ACTIVATION_METHOD: u64 = 5;
    pub const ON_MINER_SECTORS_TERMINATE_METHOD: u64 = 6;
    pub const COMPUTE_DATA_COMMITMENT_METHOD: u64 = 7;

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
    pub struct VerifyDealsOnSectorProveCommitParams {
        pub deal_ids: Vec<DealID>,
        pub sector_expiry: ChainEpoch,
    }

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, Default, PartialEq, Eq)]
    pub struct VerifyDealsOnSectorProveCommitReturn {
        #[serde(with = "bigint_ser")]
        pub deal_weight: DealWeight,
        #[serde(with = "bigint_ser")]
        pub verified_deal_weight: DealWeight,
    }

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
    pub struct OnMinerSectorsTerminateParams {
        pub epoch: ChainEpoch,
        pub deal_ids: Vec<DealID>,
    }

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
    pub struct ComputeDataCommitmentParams {
        pub deal_ids: Vec<DealID>,
        pub sector_type: RegisteredSealProof,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
    #[serde(transparent)]
    pub struct ComputeDataCommitmentReturn {
        pub commd: Cid,
    }
}

pub mod power {
    use super::*;
    use fc_actors_runtime::reward::FilterEstimate;

    pub const UPDATE_CLAIMED_POWER_METHOD: u64 = 3;
    pub const UPDATE_PLEDGE_TOTAL_METHOD: u64 = 6;
    pub const CURRENT_TOTAL_POWER_METHOD: u64 = 9;

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
    pub struct UpdateClaimedPowerParams {
        #[serde(with = "bigint_ser")]
        pub raw_byte_delta: StoragePower,
        #[serde(with = "bigint_ser")]
        pub quality_adjusted_delta: StoragePower,
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    #[serde(transparent)]
    pub struct UpdatePledgeTotalParams {
        pub pledge_delta: TokenAmount,
    }

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
    pub struct CurrentTotalPowerReturn {
        #[serde(with = "bigint_ser")]
        pub raw_byte_power: StoragePower,
        #[serde(with = "bigint_ser")]
        pub quality_adj_power: StoragePower,
        pub pledge_collateral: TokenAmount,
        pub quality_adj_power_smoothed: FilterEstimate,
    }
}

pub mod reward {
    pub use fc_actors_runtime::reward::ThisEpochRewardReturn;

    pub const THIS_EPOCH_REWARD_METHOD: u64 = 3;
}
