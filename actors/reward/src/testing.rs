// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::MessageAccumulator;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use num_traits::Signed;

use crate::State;

/// Consistency checks on reward state once `prior_epoch` has been processed.
/// `balance` is the actor's current balance.
pub fn check_state_invariants(
    state: &State,
    prior_epoch: ChainEpoch,
    balance: &TokenAmount,
) -> MessageAccumulator {
    let acc = MessageAccumulator::default();

    // Funds can be sent to the actor by anyone, so paid plus remaining only
    // bounds the mining allocation from above.
    let allocation = &state.simple_total + &state.baseline_total;
    let accounted = &state.total_storage_power_reward + balance;
    acc.require(
        accounted >= allocation,
        &format!("paid plus balance {} below mining allocation {}", accounted, allocation),
    );

    acc.require(
        state.epoch == prior_epoch + 1,
        &format!("state epoch {} after processing epoch {}", state.epoch, prior_epoch),
    );
    acc.require(
        state.effective_network_time <= state.epoch,
        &format!(
            "effective network time {} ahead of epoch {}",
            state.effective_network_time, state.epoch
        ),
    );
    acc.require(
        !state.cumsum_realized.is_negative() && state.cumsum_realized <= state.cumsum_baseline,
        &format!(
            "realized power sum {} outside [0, {}]",
            state.cumsum_realized, state.cumsum_baseline
        ),
    );
    acc
}
