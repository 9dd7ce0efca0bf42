// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::reward::{smooth_power, FilterEstimate};
use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::{actor_error, ActorError, Config, Map, DEFAULT_HAMT_CONFIG};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::bigint::bigint_ser;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::{RegisteredSealProof, StoragePower};
use num_traits::Signed;

use super::{INITIAL_QA_POWER_ESTIMATE_POSITION, INITIAL_QA_POWER_ESTIMATE_VELOCITY};

pub type ClaimsMap<BS> = Map<BS, Address, Claim>;
pub const CLAIMS_CONFIG: Config = DEFAULT_HAMT_CONFIG;

/// Storage power actor state
#[derive(Debug, Serialize_tuple, Deserialize_tuple, Clone)]
pub struct State {
    #[serde(with = "bigint_ser")]
    pub total_raw_byte_power: StoragePower,
    #[serde(with = "bigint_ser")]
    pub total_bytes_committed: StoragePower,
    #[serde(with = "bigint_ser")]
    pub total_quality_adj_power: StoragePower,
    #[serde(with = "bigint_ser")]
    pub total_qa_bytes_committed: StoragePower,
    pub total_pledge_collateral: TokenAmount,

    #[serde(with = "bigint_ser")]
    pub this_epoch_raw_byte_power: StoragePower,
    #[serde(with = "bigint_ser")]
    pub this_epoch_quality_adj_power: StoragePower,
    pub this_epoch_pledge_collateral: TokenAmount,
    pub this_epoch_qa_power_smoothed: FilterEstimate,

    pub miner_count: i64,
    /// Number of miners having proven the minimum consensus power.
    pub miner_above_min_power_count: i64,

    /// The first epoch at which the next tick has not yet been processed.
    pub first_cron_epoch: ChainEpoch,

    /// Claimed power for each miner.
    pub claims: Cid, // Map, HAMT[address]Claim
}

impl State {
    pub fn new<BS: Blockstore>(store: &BS) -> Result<State, ActorError> {
        let empty_claims = ClaimsMap::flush_empty(store, CLAIMS_CONFIG)?;
        Ok(State {
            total_raw_byte_power: Default::default(),
            total_bytes_committed: Default::default(),
            total_quality_adj_power: Default::default(),
            total_qa_bytes_committed: Default::default(),
            total_pledge_collateral: Default::default(),
            this_epoch_raw_byte_power: Default::default(),
            this_epoch_quality_adj_power: Default::default(),
            this_epoch_pledge_collateral: Default::default(),
            this_epoch_qa_power_smoothed: FilterEstimate::new(
                INITIAL_QA_POWER_ESTIMATE_POSITION.clone(),
                INITIAL_QA_POWER_ESTIMATE_VELOCITY.clone(),
            ),
            miner_count: 0,
            miner_above_min_power_count: 0,
            first_cron_epoch: 0,
            claims: empty_claims,
        })
    }

    pub fn load_claims<BS: Blockstore>(&self, store: BS) -> Result<ClaimsMap<BS>, ActorError> {
        ClaimsMap::load(store, &self.claims, CLAIMS_CONFIG, "claims")
    }

    /// Totals used for consensus. Below the minimum miner count, every committed byte counts.
    pub fn current_total_power(&self, policy: &Policy) -> (StoragePower, StoragePower) {
        if self.miner_above_min_power_count < policy.consensus_miner_min_miners {
            (self.total_bytes_committed.clone(), self.total_qa_bytes_committed.clone())
        } else {
            (self.total_raw_byte_power.clone(), self.total_quality_adj_power.clone())
        }
    }

    pub fn add_to_claim<BS: Blockstore>(
        &mut self,
        policy: &Policy,
        claims: &mut ClaimsMap<BS>,
        miner: &Address,
        power: &StoragePower,
        qa_power: &StoragePower,
    ) -> Result<(), ActorError> {
        let old_claim = claims.get(miner)?.clone();

        self.total_bytes_committed += power;
        self.total_qa_bytes_committed += qa_power;

        let new_claim = Claim {
            raw_byte_power: &old_claim.raw_byte_power + power,
            quality_adj_power: &old_claim.quality_adj_power + qa_power,
            seal_proof_type: old_claim.seal_proof_type,
        };

        let min_power = &policy.minimum_consensus_power;
        let prev_below = old_claim.raw_byte_power < *min_power;
        let still_below = new_claim.raw_byte_power < *min_power;

        if prev_below && !still_below {
            // Just passed min miner size
            self.miner_above_min_power_count += 1;
            self.total_quality_adj_power += &new_claim.quality_adj_power;
            self.total_raw_byte_power += &new_claim.raw_byte_power;
        } else if !prev_below && still_below {
            // just went below min miner size
            self.miner_above_min_power_count -= 1;
            self.total_quality_adj_power -= &old_claim.quality_adj_power;
            self.total_raw_byte_power -= &old_claim.raw_byte_power;
        } else if !prev_below && !still_below {
            // Was above the threshold, still above
            self.total_quality_adj_power += qa_power;
            self.total_raw_byte_power += power;
        }

        if new_claim.raw_byte_power.is_negative() {
            return Err(actor_error!(illegal_state;
                "negative claimed raw byte power: {}", new_claim.raw_byte_power));
        }
        if new_claim.quality_adj_power.is_negative() {
            return Err(actor_error!(illegal_state;
                "negative claimed quality adjusted power: {}", new_claim.quality_adj_power));
        }
        if self.miner_above_min_power_count < 0 {
            return Err(actor_error!(illegal_state;
                "negative number of miners larger than min: {}", self.miner_above_min_power_count));
        }

        claims.set(miner, new_claim)?;
        Ok(())
    }

    pub fn add_pledge_total(&mut self, amount: TokenAmount) {
        self.total_pledge_collateral += amount;
    }

    pub fn update_smoothed_estimate(&mut self, delta: ChainEpoch) {
        self.this_epoch_qa_power_smoothed = smooth_power(
            &self.this_epoch_qa_power_smoothed,
            &self.this_epoch_quality_adj_power,
            delta,
        );
    }

    pub fn validate_miner_has_claim<BS: Blockstore>(
        &self,
        store: &BS,
        miner_addr: &Address,
    ) -> Result<(), ActorError> {
        let claims = self.load_claims(store)?;
        if !claims.contains_key(miner_addr)? {
            return Err(actor_error!(forbidden;
                "unknown miner {} forbidden to interact with power actor", miner_addr));
        }
        Ok(())
    }

    pub fn get_claim<BS: Blockstore>(
        &self,
        store: &BS,
        miner: &Address,
    ) -> Result<Option<Claim>, ActorError> {
        let claims = self.load_claims(store)?;
        Ok(claims.try_get(miner)?.cloned())
    }
}

#[derive(Debug, Serialize_tuple, Deserialize_tuple, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Seal proof type of the miner's sectors.
    pub seal_proof_type: RegisteredSealProof,
    /// Sum of raw byte power for a miner's sectors.
    #[serde(with = "bigint_ser")]
    pub raw_byte_power: StoragePower,
    /// Sum of quality adjusted power for a miner's sectors.
    #[serde(with = "bigint_ser")]
    pub quality_adj_power: StoragePower,
}
