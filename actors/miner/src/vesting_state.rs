// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::iter;

use fvm_ipld_encoding::tuple::*;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use itertools::{EitherOrBoth, Itertools};
use num_traits::Zero;

use super::{QuantSpec, VestSpec};

/// Miner funds that vest at the given epoch.
#[derive(Default, Debug, Serialize_tuple, Deserialize_tuple, Clone, PartialEq, Eq)]
pub struct VestingFund {
    pub epoch: ChainEpoch,
    pub amount: TokenAmount,
}

/// Vesting schedule of locked block rewards, ordered by epoch.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, Default, PartialEq, Eq)]
pub struct VestingFunds {
    pub funds: Vec<VestingFund>,
}

impl VestingFunds {
    pub fn new() -> Self {
        Default::default()
    }

    /// Removes and returns the funds that vested before `current_epoch`.
    pub fn unlock_vested_funds(&mut self, current_epoch: ChainEpoch) -> TokenAmount {
        let vested = self.funds.iter().take_while(|fund| fund.epoch < current_epoch).count();
        self.funds.drain(..vested).map(|f| f.amount).sum()
    }

    /// Adds locked funds and unlocks everything that has already vested.
    pub fn add_locked_funds(
        &mut self,
        current_epoch: ChainEpoch,
        vesting_sum: &TokenAmount,
        proving_period_start: ChainEpoch,
        spec: &VestSpec,
    ) {
        // Nothing unlocks at the start epoch, this is just the start of the clock.
        let vest_begin = current_epoch + spec.initial_delay;
        let quant = QuantSpec { unit: spec.quantization, offset: proving_period_start };

        let mut vested_so_far = TokenAmount::zero();
        let mut epoch = vest_begin;

        let new_funds = iter::from_fn(|| {
            if vested_so_far >= *vesting_sum {
                return None;
            }

            epoch += spec.step_duration;
            let vest_epoch = quant.quantize_up(epoch);

            let elapsed = vest_epoch - vest_begin;
            let target_vest = if elapsed < spec.vest_period {
                // Linear vesting
                (vesting_sum * elapsed).div_floor(spec.vest_period)
            } else {
                vesting_sum.clone()
            };

            let vest_this_time = &target_vest - &vested_so_far;
            vested_so_far = target_vest;

            Some(VestingFund { epoch: vest_epoch, amount: vest_this_time })
        });

        // Merge the new schedule into the existing one, summing entries at equal epochs.
        self.funds = std::mem::take(&mut self.funds)
            .into_iter()
            .merge_join_by(new_funds, |a, b| a.epoch.cmp(&b.epoch))
            .map(|item| match item {
                EitherOrBoth::Left(a) => a,
                EitherOrBoth::Right(b) => b,
                EitherOrBoth::Both(a, b) => {
                    VestingFund { epoch: a.epoch, amount: a.amount + b.amount }
                }
            })
            .filter(|f| f.amount.is_positive())
            .collect();
    }

    /// Unlocks unvested funds, earliest first, up to at most `target`. Funds that have
    /// already vested are left for `unlock_vested_funds`.
    pub fn unlock_unvested_funds(
        &mut self,
        current_epoch: ChainEpoch,
        target: &TokenAmount,
    ) -> TokenAmount {
        let mut amount_unlocked = TokenAmount::zero();
        for fund in self.funds.iter_mut().filter(|f| f.epoch >= current_epoch) {
            if amount_unlocked >= *target {
                break;
            }
            let take = std::cmp::min(&fund.amount, &(target - &amount_unlocked)).clone();
            fund.amount -= &take;
            amount_unlocked += take;
        }
        self.funds.retain(|f| !f.amount.is_zero());
        amount_unlocked
    }

    pub fn total(&self) -> TokenAmount {
        self.funds.iter().map(|f| &f.amount).sum()
    }
}
