// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::runtime::{ActorCode, Runtime};
use fc_actors_runtime::{
    actor_dispatch, actor_error, ActorError, BURNT_FUNDS_ACTOR_ADDR, EXPECTED_LEADERS_PER_EPOCH,
    STORAGE_POWER_ACTOR_ADDR, SYSTEM_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::METHOD_CONSTRUCTOR;
use log::{error, warn};
use num_derive::FromPrimitive;

pub use self::logic::*;
pub use self::state::State;
pub use self::types::*;

pub mod ext;
mod expneg;
mod logic;
mod state;
pub mod testing;
mod types;

/// Penalties paid by block producers are multiplied before being handed to the miner.
pub const PENALTY_MULTIPLIER: u64 = 3;

/// Reward actor methods available
#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    AwardBlockReward = 2,
    ThisEpochReward = 3,
    UpdateNetworkKPI = 4,
}

/// Reward Actor
pub struct Actor;

impl Actor {
    /// Constructor for Reward actor
    fn constructor(rt: &impl Runtime, params: ConstructorParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        rt.create(&State::new(&params.curr_realized_power))?;
        Ok(())
    }

    /// Awards a reward to a block producer.
    /// This method is called only by the system actor, implicitly, as the last message in the
    /// evaluation of a block. The reward is sent to the miner, together with the penalty it
    /// must burn; if the miner cannot accept it, the reward is burnt instead.
    fn award_block_reward(
        rt: &impl Runtime,
        params: AwardBlockRewardParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        let prior_balance = rt.current_balance();
        if params.penalty.is_negative() {
            return Err(actor_error!(illegal_argument; "negative penalty {}", params.penalty));
        }
        if params.gas_reward.is_negative() {
            return Err(actor_error!(illegal_argument;
                "negative gas reward {}", params.gas_reward));
        }
        if prior_balance < params.gas_reward {
            return Err(actor_error!(illegal_state;
                "actor current balance {} insufficient to pay gas reward {}",
                prior_balance, params.gas_reward));
        }
        if params.win_count <= 0 {
            return Err(actor_error!(illegal_argument; "invalid win count {}", params.win_count));
        }

        let miner_id = rt.resolve_address(&params.miner).ok_or_else(
            || actor_error!(not_found; "failed to resolve given owner address {}", params.miner),
        )?;
        let miner_addr = Address::new_id(miner_id);

        let penalty: TokenAmount = &params.penalty * PENALTY_MULTIPLIER;

        let total_reward = rt.transaction(|st: &mut State, rt| {
            let mut block_reward: TokenAmount =
                (&st.this_epoch_reward * params.win_count).div_floor(EXPECTED_LEADERS_PER_EPOCH);
            let mut total_reward = &params.gas_reward + &block_reward;
            let curr_balance = rt.current_balance();
            if total_reward > curr_balance {
                warn!(
                    "reward actor balance {} below totalReward expected {}, paying out rest of balance",
                    curr_balance, total_reward
                );
                total_reward = curr_balance;
                block_reward = &total_reward - &params.gas_reward;
                if block_reward.is_negative() {
                    return Err(actor_error!(illegal_state;
                        "programming error, block reward {} below zero", block_reward));
                }
            }
            st.total_storage_power_reward += block_reward;
            Ok(total_reward)
        })?;

        let apply = IpldBlock::serialize_cbor(&ext::miner::ApplyRewardParams {
            reward: total_reward.clone(),
            penalty,
        })?;
        let res =
            rt.send(&miner_addr, ext::miner::APPLY_REWARDS_METHOD, apply, total_reward.clone());
        let delivered = matches!(&res, Ok(ret) if ret.exit_code.is_success());
        if !delivered {
            error!("failed to send ApplyRewards call to the miner actor with funds {}: {:?}",
                total_reward, res.map(|r| r.exit_code));
            rt.send_funds(&BURNT_FUNDS_ACTOR_ADDR, total_reward).map_err(|e| {
                e.wrap("failed to send unsent reward to the burnt funds actor")
            })?;
        }

        Ok(())
    }

    /// The reward estimate and baseline for the current epoch.
    fn this_epoch_reward(rt: &impl Runtime) -> Result<ThisEpochRewardReturn, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        Ok(ThisEpochRewardReturn {
            this_epoch_baseline_power: st.this_epoch_baseline_power,
            this_epoch_reward_smoothed: st.this_epoch_reward_smoothed,
        })
    }

    /// Updates the reward for the next epoch from the network's realized power.
    /// Called at the end of each epoch by the power actor; null rounds in between are
    /// caught up without minting.
    fn update_network_kpi(
        rt: &impl Runtime,
        params: UpdateNetworkKPIParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&STORAGE_POWER_ACTOR_ADDR))?;
        let curr_realized_power = params.curr_realized_power;

        rt.transaction(|st: &mut State, rt| {
            let prev = st.epoch;
            let end = rt.curr_epoch();
            while st.epoch < end {
                st.update_to_next_epoch(&curr_realized_power);
            }

            st.update_to_next_epoch_with_reward(&curr_realized_power);
            st.update_smoothed_estimates(st.epoch - prev);
            Ok(())
        })
    }
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        AwardBlockReward => award_block_reward,
        ThisEpochReward => this_epoch_reward,
        UpdateNetworkKPI => update_network_kpi,
    }
}
