// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_shared::bigint::{BigInt, Integer};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::StoragePower;
use num_traits::{One, Signed, Zero};

use super::alpha_beta_filter::FilterEstimate;
use crate::reward::math::PRECISION;

lazy_static! {
    /// Q.128 gain applied to the position residual.
    pub static ref DEFAULT_ALPHA: BigInt =
        "314760000000000000000000000000000000".parse().unwrap_or_default();
    /// Q.128 gain applied to the velocity residual.
    pub static ref DEFAULT_BETA: BigInt =
        "96640100000000000000000000000000".parse().unwrap_or_default();
    /// Q.128 ln(2)
    static ref LN_2: BigInt =
        "235865763225513294137944142764154484399".parse().unwrap_or_default();
    /// Squared velocities at or below this are treated as constant denominators.
    static ref EPSILON: BigInt = BigInt::one();
}

fn one_q128() -> BigInt {
    BigInt::one() << PRECISION
}

/// Natural log of a positive Q.128 number, in Q.128.
pub fn ln(z: &BigInt) -> BigInt {
    if !z.is_positive() {
        return BigInt::zero();
    }
    let k: i64 = z.bits() as i64 - 1 - PRECISION as i64;

    let x = if k > 0 { z >> k as usize } else { z << k.unsigned_abs() as usize };

    BigInt::from(k) * &*LN_2 + ln_between_one_and_two(&x)
}

/// ln(x) for Q.128 `x` in [1, 2), from the series 2 * atanh((x - 1) / (x + 1)).
fn ln_between_one_and_two(x: &BigInt) -> BigInt {
    let one = one_q128();
    let y = ((x - &one) << PRECISION).div_floor(&(x + &one));
    let y_sq = (&y * &y) >> PRECISION;

    let mut sum = BigInt::zero();
    let mut term = y;
    let mut k = 0u64;
    while !term.is_zero() {
        sum += term.div_floor(&BigInt::from(2 * k + 1));
        term = (term * &y_sq) >> PRECISION;
        k += 1;
    }
    sum * 2
}

/// Cumulative sum of the ratio of two linearly extrapolated estimates over `delta` epochs
/// starting `relative_start` epochs after the estimates were taken. The result is Q.128.
pub fn extrapolated_cum_sum_of_ratio(
    delta: ChainEpoch,
    relative_start: ChainEpoch,
    estimate_num: &FilterEstimate,
    estimate_denom: &FilterEstimate,
) -> BigInt {
    let delta_t = BigInt::from(delta) << PRECISION;
    let t0 = BigInt::from(relative_start) << PRECISION;

    let pos_1 = &estimate_num.position;
    let vel_1 = &estimate_num.velocity;
    let pos_2 = &estimate_denom.position;
    let vel_2 = &estimate_denom.velocity;

    let squared_vel_2 = (vel_2 * vel_2) >> PRECISION;

    if squared_vel_2 > *EPSILON {
        let mut x2a = ((&t0 * vel_2) >> PRECISION) + pos_2;
        let mut x2b = ((&delta_t * vel_2) >> PRECISION) + &x2a;
        x2a = ln(&x2a);
        x2b = ln(&x2b);

        let m1 = ((&x2b - &x2a) * pos_1 * vel_2) >> PRECISION;

        let m2_l = (&x2a - &x2b) * pos_2;
        let m2_r = vel_2 * &delta_t;
        let m2 = ((m2_l + m2_r) * vel_1) >> PRECISION;

        return (m2 + m1) / squared_vel_2;
    }

    let half_delta = &delta_t >> 1;
    let mut x1m = vel_1 * (t0 + half_delta);
    x1m = pos_1 + (x1m >> PRECISION);

    (x1m * delta_t) / pos_2
}

/// Smooths a new observation of network power into the running estimate.
pub fn smooth_power(
    prev: &FilterEstimate,
    observation: &StoragePower,
    epoch_delta: ChainEpoch,
) -> FilterEstimate {
    prev.observe(observation, epoch_delta, &DEFAULT_ALPHA, &DEFAULT_BETA)
}

/// Smooths a new observation of the per-epoch reward into the running estimate.
pub fn smooth_reward(
    prev: &FilterEstimate,
    observation: &TokenAmount,
    epoch_delta: ChainEpoch,
) -> FilterEstimate {
    prev.observe(observation.atto(), epoch_delta, &DEFAULT_ALPHA, &DEFAULT_BETA)
}

/// Projects a sector's expected reward over `projection_duration` epochs from the smoothed
/// reward and network power estimates. A zero power estimate projects the full reward.
pub fn expected_reward_for_power(
    reward_estimate: &FilterEstimate,
    network_qa_power_estimate: &FilterEstimate,
    qa_sector_power: &StoragePower,
    projection_duration: ChainEpoch,
) -> TokenAmount {
    let network_qa_power_smoothed = network_qa_power_estimate.estimate();

    if network_qa_power_smoothed.is_zero() {
        return TokenAmount::from_atto(reward_estimate.estimate());
    }

    let expected_reward_for_proving_period = extrapolated_cum_sum_of_ratio(
        projection_duration,
        0,
        reward_estimate,
        network_qa_power_estimate,
    );
    let br128 = qa_sector_power * expected_reward_for_proving_period; // Q.0 * Q.128 => Q.128
    TokenAmount::from_atto(std::cmp::max(br128 >> PRECISION, Default::default()))
}
