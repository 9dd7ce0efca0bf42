// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Minting curves. All intermediate quantities are Q.128 fixed point unless noted.

use std::str::FromStr;

use fc_actors_runtime::reward::math::PRECISION;
use fvm_shared::bigint::{BigInt, Integer};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::StoragePower;
use lazy_static::lazy_static;

use super::expneg::expneg;

lazy_static! {
    /// Per-epoch growth factor of the baseline, so that it triples over a year of epochs.
    pub static ref BASELINE_EXPONENT: StoragePower =
        StoragePower::from_str("340282591298641078465964189926313473653").unwrap_or_default();

    /// Baseline power at genesis (about 2.5 EiB).
    pub static ref BASELINE_INITIAL_VALUE: StoragePower =
        StoragePower::from(2_888_888_880_000_000_000u128);

    /// Baseline one epoch before genesis. Growing it once yields the initial value.
    pub static ref INIT_BASELINE_POWER: StoragePower =
        ((BASELINE_INITIAL_VALUE.clone() << (2 * PRECISION)) / &*BASELINE_EXPONENT) >> PRECISION;

    pub(super) static ref SIMPLE_TOTAL: TokenAmount = whole_fil(330_000_000);
    pub(super) static ref BASELINE_TOTAL: TokenAmount = whole_fil(770_000_000);

    /// lambda = ln(2) / (6 * epochs per year): six year half life.
    static ref LAMBDA: BigInt = BigInt::from(37396271439864487274534522888786u128);
    /// e^lambda - 1
    static ref EXP_LAMBDA_MINUS_ONE: BigInt = BigInt::from(37396273494747879394193016954629u128);
}

fn whole_fil(n: u64) -> TokenAmount {
    TokenAmount::from_whole(n)
}

fn q128_one() -> BigInt {
    BigInt::from(1) << PRECISION
}

/// Baseline power one epoch after `prev`.
pub(crate) fn grow_baseline(prev: &StoragePower) -> StoragePower {
    (prev * &*BASELINE_EXPONENT) >> PRECISION
}

/// The fractional effective network time: the point between `network_time - 1`
/// and `network_time` at which cumulative baseline catches up with cumulative
/// realized power, assuming linear growth over that last epoch.
pub(crate) fn reward_theta(
    network_time: ChainEpoch,
    baseline_at_network_time: &StoragePower,
    cumsum_realized: &StoragePower,
    cumsum_baseline: &StoragePower,
) -> BigInt {
    if network_time == 0 {
        return BigInt::default();
    }
    let shortfall = (cumsum_baseline - cumsum_realized) << PRECISION;
    (BigInt::from(network_time) << PRECISION) - shortfall.div_floor(baseline_at_network_time)
}

/// Exponential-decay share minted in `epoch`, in Q.128 attoFIL.
fn simple_minted(epoch: ChainEpoch, total: &TokenAmount) -> BigInt {
    let decay = expneg(&(&*LAMBDA * epoch));
    ((total.atto() * &*EXP_LAMBDA_MINUS_ONE) * decay) >> PRECISION
}

/// Cumulative baseline-share supply minted by effective network time `theta`,
/// in Q.128 attoFIL.
fn baseline_minted(theta: BigInt, total: &TokenAmount) -> BigInt {
    let remaining = expneg(&((theta * &*LAMBDA) >> PRECISION));
    (q128_one() - remaining) * total.atto()
}

/// Total reward for all leaders of `epoch`, given the movement of theta
/// across the epoch.
pub(crate) fn epoch_reward(
    epoch: ChainEpoch,
    prev_theta: BigInt,
    curr_theta: BigInt,
    simple_total: &TokenAmount,
    baseline_total: &TokenAmount,
) -> TokenAmount {
    let baseline = baseline_minted(curr_theta, baseline_total)
        - baseline_minted(prev_theta, baseline_total);
    TokenAmount::from_atto((simple_minted(epoch, simple_total) + baseline) >> PRECISION)
}
