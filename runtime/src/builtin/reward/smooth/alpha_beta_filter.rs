// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use fvm_shared::bigint::{bigint_ser, BigInt, Integer};
use fvm_shared::clock::ChainEpoch;

use crate::reward::math::PRECISION;

/// Smoothed value tracked by the reward and power actors.
///
/// Both fields are Q.128 fixed point: `position` is the current value and
/// `velocity` its change per epoch.
#[derive(Default, Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct FilterEstimate {
    #[serde(with = "bigint_ser")]
    pub position: BigInt,
    #[serde(with = "bigint_ser")]
    pub velocity: BigInt,
}

impl FilterEstimate {
    /// Builds an estimate from integer position and velocity.
    pub fn new(position: BigInt, velocity: BigInt) -> Self {
        Self { position: position << PRECISION, velocity: velocity << PRECISION }
    }

    /// Integer part of the position.
    pub fn estimate(&self) -> BigInt {
        &self.position >> PRECISION
    }

    /// Position projected `delta` epochs ahead, in Q.256.
    pub fn extrapolate(&self, delta: ChainEpoch) -> BigInt {
        let elapsed = BigInt::from(delta) << PRECISION;
        &self.velocity * elapsed + (&self.position << PRECISION)
    }

    /// Folds a new integer observation into the estimate after `epoch_delta`
    /// epochs, using the given Q.128 gains.
    pub fn observe(
        &self,
        observation: &BigInt,
        epoch_delta: ChainEpoch,
        alpha: &BigInt,
        beta: &BigInt,
    ) -> FilterEstimate {
        let elapsed = BigInt::from(epoch_delta) << PRECISION;
        let predicted = ((&elapsed * &self.velocity) >> PRECISION) + &self.position;
        let residual = (observation << PRECISION) - &predicted;

        let position = predicted + ((alpha * &residual) >> PRECISION);
        let velocity = &self.velocity + (residual * beta).div_floor(&elapsed);
        FilterEstimate { position, velocity }
    }
}
