// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::reward::{smooth::smooth_reward, FilterEstimate};
use fvm_ipld_encoding::tuple::*;
use fvm_shared::bigint::{bigint_ser, BigInt};
use fvm_shared::clock::{ChainEpoch, EPOCH_UNDEFINED};
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::{Spacetime, StoragePower};
use lazy_static::lazy_static;

use super::logic::*;

lazy_static! {
    /// Starting reward position estimate, the epoch-zero reward.
    static ref DEFAULT_REWARD_POSITION_ESTIMATE: TokenAmount =
        TokenAmount::from_atto(36_266_260_308_195_979_333u128);
    /// Starting reward velocity estimate.
    static ref DEFAULT_REWARD_VELOCITY_ESTIMATE: TokenAmount =
        TokenAmount::from_atto(-109_897_758_509i64);
}

/// Reward actor state
#[derive(Serialize_tuple, Deserialize_tuple, Default, Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Target cumulative sum of network power since genesis, in byte-epochs.
    #[serde(with = "bigint_ser")]
    pub cumsum_baseline: Spacetime,

    /// Realized cumulative sum of network power since genesis, capped at the baseline
    /// at each epoch.
    #[serde(with = "bigint_ser")]
    pub cumsum_realized: Spacetime,

    /// Ceiling of the real effective network time theta, the epoch at which the
    /// cumulative baseline reaches the cumulative realized power.
    pub effective_network_time: ChainEpoch,

    /// Baseline power at the effective network time.
    #[serde(with = "bigint_ser")]
    pub effective_baseline_power: StoragePower,

    /// Reward to be paid in per WinCount to block producers, before smoothing.
    pub this_epoch_reward: TokenAmount,

    pub this_epoch_reward_smoothed: FilterEstimate,

    /// Baseline power the network has targeted at `epoch`.
    #[serde(with = "bigint_ser")]
    pub this_epoch_baseline_power: StoragePower,

    /// Epoch of the next reward to be paid.
    pub epoch: ChainEpoch,

    /// Total FIL awarded to block miners so far.
    pub total_storage_power_reward: TokenAmount,

    pub simple_total: TokenAmount,
    pub baseline_total: TokenAmount,
}

impl State {
    pub fn new(curr_realized_power: &StoragePower) -> Self {
        let mut st = Self {
            effective_baseline_power: BASELINE_INITIAL_VALUE.clone(),
            this_epoch_baseline_power: INIT_BASELINE_POWER.clone(),
            epoch: EPOCH_UNDEFINED,
            this_epoch_reward_smoothed: FilterEstimate::new(
                DEFAULT_REWARD_POSITION_ESTIMATE.atto().clone(),
                DEFAULT_REWARD_VELOCITY_ESTIMATE.atto().clone(),
            ),
            simple_total: SIMPLE_TOTAL.clone(),
            baseline_total: BASELINE_TOTAL.clone(),
            ..Default::default()
        };

        st.update_to_next_epoch_with_reward(curr_realized_power);

        st
    }

    /// Advances the epoch and the baseline, accumulating capped realized power.
    pub(super) fn update_to_next_epoch(&mut self, curr_realized_power: &StoragePower) {
        self.epoch += 1;
        self.this_epoch_baseline_power = grow_baseline(&self.this_epoch_baseline_power);
        let capped_realized_power =
            std::cmp::min(&self.this_epoch_baseline_power, curr_realized_power);
        self.cumsum_realized += capped_realized_power;

        while self.cumsum_realized > self.cumsum_baseline {
            self.effective_network_time += 1;
            self.effective_baseline_power = grow_baseline(&self.effective_baseline_power);
            self.cumsum_baseline += &self.effective_baseline_power;
        }
    }

    /// Advances one epoch and recomputes this epoch's reward from the movement of theta.
    pub(super) fn update_to_next_epoch_with_reward(&mut self, curr_realized_power: &StoragePower) {
        let prev_theta = self.reward_theta();
        self.update_to_next_epoch(curr_realized_power);
        let curr_theta = self.reward_theta();
        self.this_epoch_reward = epoch_reward(
            self.epoch,
            prev_theta,
            curr_theta,
            &self.simple_total,
            &self.baseline_total,
        );
    }

    fn reward_theta(&self) -> BigInt {
        reward_theta(
            self.effective_network_time,
            &self.effective_baseline_power,
            &self.cumsum_realized,
            &self.cumsum_baseline,
        )
    }

    pub(super) fn update_smoothed_estimates(&mut self, delta: ChainEpoch) {
        self.this_epoch_reward_smoothed =
            smooth_reward(&self.this_epoch_reward_smoothed, &self.this_epoch_reward, delta);
    }
}
