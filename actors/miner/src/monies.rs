// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Pledge, deposit and penalty formulas. Each actor generation fixes its own constants and
//! combination rules; callers select the generation with [`monies_for`].

use std::cmp;

use fc_actors_runtime::network::EPOCHS_IN_DAY;
use fc_actors_runtime::reward::smooth::expected_reward_for_power;
use fc_actors_runtime::reward::FilterEstimate;
use fc_actors_runtime::runtime::ActorVersion;
use fc_actors_runtime::EXPECTED_LEADERS_PER_EPOCH;
use fvm_shared::bigint::{BigInt, Integer};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::StoragePower;
use fvm_shared::version::NetworkVersion;
use lazy_static::lazy_static;

use super::{VestSpec, REWARD_VESTING_SPEC, REWARD_VESTING_SPEC_V0};

/// Projection period of expected sector block reward for deposit required to pre-commit a sector.
/// This deposit is lost if the pre-commitment is not timely followed up by a commitment proof.
const PRE_COMMIT_DEPOSIT_FACTOR: u64 = 20;

/// Projection period of expected sector block rewards for storage pledge required to commit a sector.
/// This pledge is lost if a sector is terminated before its full committed lifetime.
pub const INITIAL_PLEDGE_FACTOR: u64 = 20;

pub const PRE_COMMIT_DEPOSIT_PROJECTION_PERIOD: ChainEpoch =
    (PRE_COMMIT_DEPOSIT_FACTOR as ChainEpoch) * EPOCHS_IN_DAY;
pub const INITIAL_PLEDGE_PROJECTION_PERIOD: ChainEpoch =
    (INITIAL_PLEDGE_FACTOR as ChainEpoch) * EPOCHS_IN_DAY;

const LOCK_TARGET_FACTOR_NUM: u32 = 3;
const LOCK_TARGET_FACTOR_DENOM: u32 = 10;

/// Projection of expected daily block reward charged when a fault persists.
pub const CONTINUED_FAULT_PROJECTION_PERIOD: ChainEpoch = (EPOCHS_IN_DAY * 351) / 100;

// The first generation charged 2.14 days for a declared fault until network version 3.
const DECLARED_FAULT_PROJECTION_PERIOD_V0: ChainEpoch = (EPOCHS_IN_DAY * 214) / 100;
const DECLARED_FAULT_PROJECTION_PERIOD_V3: ChainEpoch = (EPOCHS_IN_DAY * 351) / 100;

const UNDECLARED_FAULT_PROJECTION_PERIOD_V0: ChainEpoch = (EPOCHS_IN_DAY * 50) / 10;
const UNDECLARED_FAULT_PROJECTION_PERIOD_V1: ChainEpoch = (EPOCHS_IN_DAY * 35) / 10;

/// Lower bound of a termination fee, in days of expected reward.
pub const TERMINATION_PENALTY_LOWER_BOUND_PROJECTION_PERIOD: ChainEpoch = (EPOCHS_IN_DAY * 35) / 10;

/// Maximum sector age, in days, that accrues termination fees.
pub const TERMINATION_LIFETIME_CAP_V0: ChainEpoch = 70;
pub const TERMINATION_LIFETIME_CAP: ChainEpoch = 140;

pub const TERMINATION_REWARD_FACTOR_NUM: u32 = 1;
pub const TERMINATION_REWARD_FACTOR_DENOM: u32 = 2;

const CONSENSUS_FAULT_FACTOR: u64 = 5;

const LOCKED_REWARD_FACTOR_NUM: u32 = 75;
const LOCKED_REWARD_FACTOR_DENOM: u32 = 100;

lazy_static! {
    /// Cap on initial pledge requirement for sectors during the Space Race network.
    /// The target is 1 FIL (10**18 attoFIL) per 32GiB.
    /// This does not divide evenly, so the result is fractionally smaller.
    static ref INITIAL_PLEDGE_MAX_PER_BYTE: TokenAmount =
        TokenAmount::from_whole(1).div_floor(32i64 << 30);
}

/// Economic formulas of one actor generation.
pub trait Monies: Sync {
    fn version(&self) -> ActorVersion;

    /// Penalty charged when the miner declares a sector faulty ahead of its deadline.
    fn pledge_penalty_for_declared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        nv: NetworkVersion,
    ) -> TokenAmount;

    /// Penalty charged when a sector is found faulty at its deadline without a declaration.
    fn pledge_penalty_for_undeclared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        nv: NetworkVersion,
    ) -> TokenAmount;

    /// Penalty charged at each deadline a sector remains faulty.
    fn pledge_penalty_for_continued_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
    ) -> TokenAmount {
        expected_reward_for_power(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            CONTINUED_FAULT_PROJECTION_PERIOD,
        )
    }

    /// Penalty charged when a sector is terminated before its expiration.
    #[allow(clippy::too_many_arguments)]
    fn pledge_penalty_for_termination(
        &self,
        day_reward: &TokenAmount,
        sector_age: ChainEpoch,
        twenty_day_reward_at_activation: &TokenAmount,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        reward_estimate: &FilterEstimate,
        replaced_day_reward: &TokenAmount,
        replaced_sector_age: ChainEpoch,
        nv: NetworkVersion,
    ) -> TokenAmount;

    /// Deposit locked while a sector is pre-committed.
    fn pre_commit_deposit_for_power(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
    ) -> TokenAmount {
        expected_reward_for_power(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            PRE_COMMIT_DEPOSIT_PROJECTION_PERIOD,
        )
    }

    /// Pledge locked for the lifetime of a committed sector.
    fn initial_pledge_for_power(
        &self,
        qa_power: &StoragePower,
        baseline_power: &StoragePower,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        circulating_supply: &TokenAmount,
    ) -> TokenAmount {
        nominal_initial_pledge(
            qa_power,
            baseline_power,
            reward_estimate,
            network_qa_power_estimate,
            circulating_supply,
        )
    }

    /// Penalty for a consensus fault, relative to the reward of the epoch it was reported in.
    fn consensus_fault_penalty(&self, this_epoch_reward: &TokenAmount) -> TokenAmount {
        (this_epoch_reward * CONSENSUS_FAULT_FACTOR).div_floor(EXPECTED_LEADERS_PER_EPOCH)
    }

    /// Share of a block reward that vests rather than becoming available immediately.
    fn locked_reward_from_reward(&self, reward: &TokenAmount, nv: NetworkVersion) -> TokenAmount;

    /// Schedule on which locked block rewards vest.
    fn reward_vesting_spec(&self) -> &'static VestSpec {
        &REWARD_VESTING_SPEC
    }
}

/// Capped pledge shared by all generations.
fn nominal_initial_pledge(
    qa_power: &StoragePower,
    baseline_power: &StoragePower,
    reward_estimate: &FilterEstimate,
    network_qa_power_estimate: &FilterEstimate,
    circulating_supply: &TokenAmount,
) -> TokenAmount {
    let ip_base = expected_reward_for_power(
        reward_estimate,
        network_qa_power_estimate,
        qa_power,
        INITIAL_PLEDGE_PROJECTION_PERIOD,
    );

    let lock_target_num = circulating_supply.atto() * LOCK_TARGET_FACTOR_NUM;
    let lock_target_denom = LOCK_TARGET_FACTOR_DENOM;
    let pledge_share_num = qa_power;
    let network_qa_power = network_qa_power_estimate.estimate();
    let pledge_share_denom = cmp::max(cmp::max(&network_qa_power, baseline_power), qa_power);
    let additional_ip_num: BigInt = lock_target_num * pledge_share_num;
    let additional_ip_denom = pledge_share_denom * lock_target_denom;
    let additional_ip = additional_ip_num.div_floor(&additional_ip_denom);

    let nominal_pledge = ip_base + TokenAmount::from_atto(additional_ip);
    let space_race_pledge_cap = INITIAL_PLEDGE_MAX_PER_BYTE.atto() * qa_power;
    cmp::min(nominal_pledge, TokenAmount::from_atto(space_race_pledge_cap))
}

/// Formulas of the first actor generation (network versions 0 to 3).
pub struct MoniesV0;

impl Monies for MoniesV0 {
    fn version(&self) -> ActorVersion {
        ActorVersion::V0
    }

    fn reward_vesting_spec(&self) -> &'static VestSpec {
        &REWARD_VESTING_SPEC_V0
    }

    fn pledge_penalty_for_declared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        nv: NetworkVersion,
    ) -> TokenAmount {
        let projection = if nv >= NetworkVersion::V3 {
            DECLARED_FAULT_PROJECTION_PERIOD_V3
        } else {
            DECLARED_FAULT_PROJECTION_PERIOD_V0
        };
        expected_reward_for_power(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            projection,
        )
    }

    fn pledge_penalty_for_undeclared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        nv: NetworkVersion,
    ) -> TokenAmount {
        let projection = if nv == NetworkVersion::V0 {
            UNDECLARED_FAULT_PROJECTION_PERIOD_V0
        } else {
            UNDECLARED_FAULT_PROJECTION_PERIOD_V1
        };
        expected_reward_for_power(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            projection,
        )
    }

    fn pledge_penalty_for_termination(
        &self,
        day_reward: &TokenAmount,
        sector_age: ChainEpoch,
        twenty_day_reward_at_activation: &TokenAmount,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        reward_estimate: &FilterEstimate,
        _replaced_day_reward: &TokenAmount,
        _replaced_sector_age: ChainEpoch,
        nv: NetworkVersion,
    ) -> TokenAmount {
        // From network version 1 only half of the sector age counts.
        let age = if nv >= NetworkVersion::V1 { sector_age / 2 } else { sector_age };
        let capped_age = cmp::min(age, TERMINATION_LIFETIME_CAP_V0 * EPOCHS_IN_DAY);

        let accrued = twenty_day_reward_at_activation.clone()
            + (day_reward * capped_age).div_floor(EPOCHS_IN_DAY);
        cmp::max(
            self.pledge_penalty_for_undeclared_fault(
                reward_estimate,
                network_qa_power_estimate,
                qa_sector_power,
                nv,
            ),
            accrued,
        )
    }

    fn locked_reward_from_reward(&self, reward: &TokenAmount, _nv: NetworkVersion) -> TokenAmount {
        reward.clone()
    }
}

/// Formulas of the second actor generation (network versions 4 to 9).
pub struct MoniesV2;

/// Termination fee of the second and third generations.
#[allow(clippy::too_many_arguments)]
fn termination_fee_v2(
    day_reward: &TokenAmount,
    sector_age: ChainEpoch,
    twenty_day_reward_at_activation: &TokenAmount,
    network_qa_power_estimate: &FilterEstimate,
    qa_sector_power: &StoragePower,
    reward_estimate: &FilterEstimate,
    replaced_day_reward: &TokenAmount,
    replaced_sector_age: ChainEpoch,
) -> TokenAmount {
    // max(SP(t), BR(StartEpoch, 20d) + BR(StartEpoch, 1d) * terminationRewardFactor * min(SectorAgeInDays, 140))
    let lifetime_cap = TERMINATION_LIFETIME_CAP * EPOCHS_IN_DAY;
    let capped_sector_age = cmp::min(sector_age, lifetime_cap);

    let mut expected_reward = day_reward * capped_sector_age;
    let relevant_replaced_age = cmp::min(replaced_sector_age, lifetime_cap - capped_sector_age);
    expected_reward += replaced_day_reward * relevant_replaced_age;

    let penalized_reward = expected_reward * TERMINATION_REWARD_FACTOR_NUM;
    let penalized_reward = penalized_reward
        .div_floor(EPOCHS_IN_DAY * TERMINATION_REWARD_FACTOR_DENOM as ChainEpoch);

    cmp::max(
        expected_reward_for_power(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            TERMINATION_PENALTY_LOWER_BOUND_PROJECTION_PERIOD,
        ),
        twenty_day_reward_at_activation.clone() + penalized_reward,
    )
}

impl Monies for MoniesV2 {
    fn version(&self) -> ActorVersion {
        ActorVersion::V2
    }

    fn pledge_penalty_for_declared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        _nv: NetworkVersion,
    ) -> TokenAmount {
        self.pledge_penalty_for_continued_fault(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
        )
    }

    fn pledge_penalty_for_undeclared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        _nv: NetworkVersion,
    ) -> TokenAmount {
        expected_reward_for_power(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            TERMINATION_PENALTY_LOWER_BOUND_PROJECTION_PERIOD,
        )
    }

    fn pledge_penalty_for_termination(
        &self,
        day_reward: &TokenAmount,
        sector_age: ChainEpoch,
        twenty_day_reward_at_activation: &TokenAmount,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        reward_estimate: &FilterEstimate,
        replaced_day_reward: &TokenAmount,
        replaced_sector_age: ChainEpoch,
        _nv: NetworkVersion,
    ) -> TokenAmount {
        termination_fee_v2(
            day_reward,
            sector_age,
            twenty_day_reward_at_activation,
            network_qa_power_estimate,
            qa_sector_power,
            reward_estimate,
            replaced_day_reward,
            replaced_sector_age,
        )
    }

    fn locked_reward_from_reward(&self, reward: &TokenAmount, nv: NetworkVersion) -> TokenAmount {
        if nv >= NetworkVersion::V6 {
            (reward * LOCKED_REWARD_FACTOR_NUM).div_floor(LOCKED_REWARD_FACTOR_DENOM)
        } else {
            reward.clone()
        }
    }
}

/// Formulas of the third actor generation (network version 10 onwards).
/// Identical to the second except that the initial pledge never drops below one attoFIL.
pub struct MoniesV3;

impl Monies for MoniesV3 {
    fn version(&self) -> ActorVersion {
        ActorVersion::V3
    }

    fn pledge_penalty_for_declared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        nv: NetworkVersion,
    ) -> TokenAmount {
        MoniesV2.pledge_penalty_for_declared_fault(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            nv,
        )
    }

    fn pledge_penalty_for_undeclared_fault(
        &self,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        nv: NetworkVersion,
    ) -> TokenAmount {
        MoniesV2.pledge_penalty_for_undeclared_fault(
            reward_estimate,
            network_qa_power_estimate,
            qa_sector_power,
            nv,
        )
    }

    fn pledge_penalty_for_termination(
        &self,
        day_reward: &TokenAmount,
        sector_age: ChainEpoch,
        twenty_day_reward_at_activation: &TokenAmount,
        network_qa_power_estimate: &FilterEstimate,
        qa_sector_power: &StoragePower,
        reward_estimate: &FilterEstimate,
        replaced_day_reward: &TokenAmount,
        replaced_sector_age: ChainEpoch,
        _nv: NetworkVersion,
    ) -> TokenAmount {
        termination_fee_v2(
            day_reward,
            sector_age,
            twenty_day_reward_at_activation,
            network_qa_power_estimate,
            qa_sector_power,
            reward_estimate,
            replaced_day_reward,
            replaced_sector_age,
        )
    }

    fn initial_pledge_for_power(
        &self,
        qa_power: &StoragePower,
        baseline_power: &StoragePower,
        reward_estimate: &FilterEstimate,
        network_qa_power_estimate: &FilterEstimate,
        circulating_supply: &TokenAmount,
    ) -> TokenAmount {
        let pledge = nominal_initial_pledge(
            qa_power,
            baseline_power,
            reward_estimate,
            network_qa_power_estimate,
            circulating_supply,
        );
        cmp::max(pledge, TokenAmount::from_atto(1))
    }

    fn locked_reward_from_reward(&self, reward: &TokenAmount, nv: NetworkVersion) -> TokenAmount {
        MoniesV2.locked_reward_from_reward(reward, nv)
    }
}

/// The formulas of an actor generation.
pub fn monies_for(version: ActorVersion) -> &'static dyn Monies {
    match version {
        ActorVersion::V0 => &MoniesV0,
        ActorVersion::V2 => &MoniesV2,
        ActorVersion::V3 => &MoniesV3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_matches_generation() {
        for v in ActorVersion::ALL {
            assert_eq!(v, monies_for(v).version());
        }
    }

    #[test]
    fn locked_reward_share_by_network_version() {
        let reward = TokenAmount::from_atto(1000);
        assert_eq!(reward, MoniesV0.locked_reward_from_reward(&reward, NetworkVersion::V3));
        assert_eq!(reward, MoniesV2.locked_reward_from_reward(&reward, NetworkVersion::V5));
        assert_eq!(
            TokenAmount::from_atto(750),
            MoniesV2.locked_reward_from_reward(&reward, NetworkVersion::V6)
        );
        assert_eq!(
            TokenAmount::from_atto(750),
            MoniesV3.locked_reward_from_reward(&reward, NetworkVersion::V10)
        );
    }

    #[test]
    fn consensus_fault_penalty_is_one_block_reward() {
        let reward = TokenAmount::from_atto(123_456);
        for v in ActorVersion::ALL {
            assert_eq!(reward, monies_for(v).consensus_fault_penalty(&reward));
        }
    }

    #[test]
    fn v3_pledge_floor() {
        let zero = FilterEstimate::default();
        let qa = StoragePower::from(1);
        let supply = TokenAmount::from_atto(0);
        assert_eq!(
            TokenAmount::from_atto(0),
            MoniesV2.initial_pledge_for_power(&qa, &qa, &zero, &zero, &supply)
        );
        assert_eq!(
            TokenAmount::from_atto(1),
            MoniesV3.initial_pledge_for_power(&qa, &qa, &zero, &zero, &supply)
        );
    }
}
