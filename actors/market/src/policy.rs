// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cmp::max;

use cid::{Cid, Version};
use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::DealWeight;
use fvm_shared::bigint::{BigInt, Integer};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::commcid::{FIL_COMMITMENT_UNSEALED, SHA2_256_TRUNC254_PADDED};
use fvm_shared::econ::TokenAmount;
use fvm_shared::piece::PaddedPieceSize;
use fvm_shared::sector::StoragePower;
use fvm_shared::version::NetworkVersion;
use fvm_shared::TOTAL_FILECOIN;
use num_traits::Zero;

use crate::DealProposal;

/// Percentage of normalized circulating supply that provider collateral must cover.
/// Lowered from 5% to 1% after the first network upgrade.
pub const PROV_COLLATERAL_PERCENT_SUPPLY_NUM_V0: i64 = 5;
pub const PROV_COLLATERAL_PERCENT_SUPPLY_NUM_V1: i64 = 1;
pub const PROV_COLLATERAL_PERCENT_SUPPLY_DENOM: i64 = 100;

/// Sector quality multipliers feeding the verified-deal power weight.
const DEAL_WEIGHT_MULTIPLIER: i64 = 10;
const VERIFIED_DEAL_WEIGHT_MULTIPLIER: i64 = 100;
const QUALITY_BASE_MULTIPLIER: i64 = 10;
const SECTOR_QUALITY_PRECISION: i64 = 20;

/// Bounds (inclusive) on deal duration.
pub(crate) fn deal_duration_bounds(
    policy: &Policy,
    _size: PaddedPieceSize,
) -> (ChainEpoch, ChainEpoch) {
    (policy.min_deal_duration, policy.max_deal_duration)
}

pub(crate) fn deal_price_per_epoch_bounds(
    _size: PaddedPieceSize,
    _duration: ChainEpoch,
) -> (TokenAmount, TokenAmount) {
    (TokenAmount::zero(), TOTAL_FILECOIN.clone())
}

/// Network-wide power figures the provider collateral minimum is normalized against.
pub struct NetworkPower<'a> {
    pub raw: &'a StoragePower,
    pub quality_adj: &'a StoragePower,
    pub baseline: &'a StoragePower,
}

pub fn deal_provider_collateral_bounds(
    proposal: &DealProposal,
    power: &NetworkPower,
    network_circulating_supply: &TokenAmount,
    nv: NetworkVersion,
) -> (TokenAmount, TokenAmount) {
    // min = percent * circulating_supply * deal_power / max(baseline, network_power, deal_power)
    //
    // The first network version weighs the deal by quality-adjusted power against network
    // QA power; later versions use the raw piece size against network raw power.
    let (percent, power_share_num, network_power) = if nv < NetworkVersion::V1 {
        (
            PROV_COLLATERAL_PERCENT_SUPPLY_NUM_V0,
            deal_qa_power(proposal.piece_size, proposal.verified_deal),
            power.quality_adj,
        )
    } else {
        (PROV_COLLATERAL_PERCENT_SUPPLY_NUM_V1, BigInt::from(proposal.piece_size.0), power.raw)
    };

    let lock_target_num = network_circulating_supply * percent;
    let power_share_denom = max(max(network_power, power.baseline), &power_share_num).clone();

    let num: BigInt = power_share_num * lock_target_num.atto();
    let denom: BigInt = power_share_denom * PROV_COLLATERAL_PERCENT_SUPPLY_DENOM;
    (TokenAmount::from_atto(num.div_floor(&denom)), TOTAL_FILECOIN.clone())
}

pub(crate) fn deal_client_collateral_bounds(
    _: PaddedPieceSize,
    _: ChainEpoch,
) -> (TokenAmount, TokenAmount) {
    (TokenAmount::zero(), TOTAL_FILECOIN.clone())
}

/// Penalty to provider deal collateral if the deadline expires before sector commitment.
pub(crate) fn collateral_penalty_for_deal_activation_missed(
    provider_collateral: TokenAmount,
) -> TokenAmount {
    provider_collateral
}

/// Computes the weight for a deal proposal, which is a function of its size and duration.
pub fn deal_weight(proposal: &DealProposal) -> DealWeight {
    let deal_duration = DealWeight::from(proposal.duration());
    deal_duration * proposal.piece_size.0
}

pub fn deal_qa_power(deal_size: PaddedPieceSize, verified: bool) -> StoragePower {
    let multiplier =
        if verified { VERIFIED_DEAL_WEIGHT_MULTIPLIER } else { DEAL_WEIGHT_MULTIPLIER };
    let scaled_up_quality =
        (StoragePower::from(multiplier) << SECTOR_QUALITY_PRECISION) / QUALITY_BASE_MULTIPLIER;
    let scaled_up_qa_power = scaled_up_quality * deal_size.0;
    scaled_up_qa_power >> SECTOR_QUALITY_PRECISION
}

/// Prefix for unsealed piece CIDs (CommP).
pub fn is_piece_cid(c: &Cid) -> bool {
    c.version() == Version::V1
        && c.codec() == FIL_COMMITMENT_UNSEALED
        && c.hash().code() == SHA2_256_TRUNC254_PADDED
        && c.hash().size() == 32
}

/// First epoch at which a deal starting at `start_epoch` is settled by cron.
/// Deals are spread over the update interval by id, and the first settlement is strictly
/// after the start epoch so that a deal activated at its start epoch is never timed out.
pub fn next_update_epoch(
    deal_id: u64,
    start_epoch: ChainEpoch,
    interval: ChainEpoch,
) -> ChainEpoch {
    let offset = (deal_id % interval as u64) as ChainEpoch;
    let earliest = start_epoch + 1;
    let period_start = earliest - earliest.rem_euclid(interval);
    if period_start + offset >= earliest {
        period_start + offset
    } else {
        period_start + interval + offset
    }
}
