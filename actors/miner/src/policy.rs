// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::{Cid, Version};
use fc_actors_runtime::network::*;
use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::DealWeight;
use fvm_shared::bigint::{BigInt, Integer};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::commcid::{FIL_COMMITMENT_SEALED, POSEIDON_BLS12_381_A1_FC1};
use fvm_shared::sector::{RegisteredSealProof, SectorQuality, SectorSize, StoragePower};
use lazy_static::lazy_static;

use super::types::{PowerPair, SectorOnChainInfo};

/// Fractional bits carried by a [`SectorQuality`].
pub const SECTOR_QUALITY_PRECISION: i64 = 20;

pub const MAX_SECTOR_NUMBER: u64 = i64::MAX as u64;

lazy_static! {
    /// Weight of spacetime not covered by any deal.
    pub static ref QUALITY_BASE_MULTIPLIER: BigInt = BigInt::from(10);
    pub static ref DEAL_WEIGHT_MULTIPLIER: BigInt = BigInt::from(10);
    pub static ref VERIFIED_DEAL_WEIGHT_MULTIPLIER: BigInt = BigInt::from(100);
}

/// Whether `c` is shaped like a sealed sector commitment (CommR).
pub fn is_sealed_sector(c: &Cid) -> bool {
    let hash = c.hash();
    c.version() == Version::V1
        && c.codec() == FIL_COMMITMENT_SEALED
        && hash.code() == POSEIDON_BLS12_381_A1_FC1
        && hash.size() == 32
}

fn is_v1p1(proof: RegisteredSealProof) -> Option<bool> {
    use RegisteredSealProof::*;
    match proof {
        StackedDRG2KiBV1 | StackedDRG8MiBV1 | StackedDRG512MiBV1 | StackedDRG32GiBV1
        | StackedDRG64GiBV1 => Some(false),
        StackedDRG2KiBV1P1 | StackedDRG8MiBV1P1 | StackedDRG512MiBV1P1 | StackedDRG32GiBV1P1
        | StackedDRG64GiBV1P1 => Some(true),
        _ => None,
    }
}

/// Longest allowed gap between pre-commit and prove-commit for `proof`.
pub fn max_prove_commit_duration(
    policy: &Policy,
    proof: RegisteredSealProof,
) -> Option<ChainEpoch> {
    is_v1p1(proof).map(|v1p1| match v1p1 {
        true => policy.max_prove_commit_duration,
        false => EPOCHS_IN_DAY + policy.pre_commit_challenge_delay,
    })
}

/// Longest total lifetime of a sector sealed with `proof`.
pub fn seal_proof_sector_maximum_lifetime(proof: RegisteredSealProof) -> Option<ChainEpoch> {
    is_v1p1(proof).map(|v1p1| if v1p1 { 5 * EPOCHS_IN_YEAR } else { 540 * EPOCHS_IN_DAY })
}

/// Quality of a sector as the spacetime-weighted average of the multipliers
/// for its committed capacity, its deals and its verified deals, relative to
/// the base multiplier. Committed capacity alone has quality 1.
pub fn quality_for_weight(
    size: SectorSize,
    duration: ChainEpoch,
    deal_weight: &DealWeight,
    verified_weight: &DealWeight,
) -> SectorQuality {
    let spacetime = BigInt::from(size as u64) * duration;
    let uncovered = &spacetime - deal_weight - verified_weight;
    let weighted: BigInt = uncovered * &*QUALITY_BASE_MULTIPLIER
        + deal_weight * &*DEAL_WEIGHT_MULTIPLIER
        + verified_weight * &*VERIFIED_DEAL_WEIGHT_MULTIPLIER;
    let scaled = weighted << SECTOR_QUALITY_PRECISION;
    scaled.div_floor(&spacetime).div_floor(&QUALITY_BASE_MULTIPLIER)
}

/// QA power of a sector filled entirely with verified deals.
pub fn qa_power_max(size: SectorSize) -> StoragePower {
    (BigInt::from(size as u64) * &*VERIFIED_DEAL_WEIGHT_MULTIPLIER)
        .div_floor(&QUALITY_BASE_MULTIPLIER)
}

pub fn qa_power_for_weight(
    size: SectorSize,
    duration: ChainEpoch,
    deal_weight: &DealWeight,
    verified_weight: &DealWeight,
) -> StoragePower {
    let quality = quality_for_weight(size, duration, deal_weight, verified_weight);
    (quality * size as u64) >> SECTOR_QUALITY_PRECISION
}

pub fn qa_power_for_sector(size: SectorSize, sector: &SectorOnChainInfo) -> StoragePower {
    let duration = sector.expiration - sector.activation;
    qa_power_for_weight(size, duration, &sector.deal_weight, &sector.verified_deal_weight)
}

pub fn power_for_sector(size: SectorSize, sector: &SectorOnChainInfo) -> PowerPair {
    PowerPair { raw: BigInt::from(size as u64), qa: qa_power_for_sector(size, sector) }
}

pub fn power_for_sectors<'a>(
    size: SectorSize,
    sectors: impl IntoIterator<Item = &'a SectorOnChainInfo>,
) -> PowerPair {
    let mut total = PowerPair::zero();
    for sector in sectors {
        total += &power_for_sector(size, sector);
    }
    total
}

/// Specification for a linear vesting schedule.
#[derive(Debug)]
pub struct VestSpec {
    /// Delay before any amount starts vesting.
    pub initial_delay: ChainEpoch,
    /// Period over which the total should vest, after the initial delay.
    pub vest_period: ChainEpoch,
    /// Duration between successive incremental vests (independent of vesting period).
    pub step_duration: ChainEpoch,
    /// Maximum precision of vesting table (limits cardinality of table).
    pub quantization: ChainEpoch,
}

/// Block reward vesting of the first actor generation.
pub const REWARD_VESTING_SPEC_V0: VestSpec = VestSpec {
    initial_delay: 20 * EPOCHS_IN_DAY,
    vest_period: 180 * EPOCHS_IN_DAY,
    step_duration: EPOCHS_IN_DAY,
    quantization: 12 * EPOCHS_IN_HOUR,
};

pub const REWARD_VESTING_SPEC: VestSpec = VestSpec {
    initial_delay: 0,
    vest_period: 180 * EPOCHS_IN_DAY,
    step_duration: EPOCHS_IN_DAY,
    quantization: 12 * EPOCHS_IN_HOUR,
};

/// Rounds epochs to a grid of `unit` epochs offset by `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantSpec {
    pub unit: ChainEpoch,
    pub offset: ChainEpoch,
}

impl QuantSpec {
    /// Rounds `epoch` up to the next grid point, or returns it if already on one.
    pub fn quantize_up(&self, epoch: ChainEpoch) -> ChainEpoch {
        let offset = self.offset % self.unit;
        let remainder = (epoch - offset) % self.unit;
        let quantized = epoch - remainder;
        if remainder <= 0 {
            quantized
        } else {
            quantized + self.unit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_up_to_grid() {
        let q = QuantSpec { unit: 10, offset: 3 };
        assert_eq!(3, q.quantize_up(3));
        assert_eq!(13, q.quantize_up(4));
        assert_eq!(13, q.quantize_up(13));
        assert_eq!(-7, q.quantize_up(-7));
        assert_eq!(-7, q.quantize_up(-16));
    }

    #[test]
    fn quality_of_committed_capacity_is_raw_power() {
        let size = SectorSize::_32GiB;
        let duration = 180 * EPOCHS_IN_DAY;
        let zero = DealWeight::from(0);
        assert_eq!(
            BigInt::from(size as u64),
            qa_power_for_weight(size, duration, &zero, &zero)
        );
    }

    #[test]
    fn verified_deals_multiply_power_tenfold() {
        let size = SectorSize::_32GiB;
        let duration = 180 * EPOCHS_IN_DAY;
        let full = BigInt::from(size as u64) * duration;
        let zero = DealWeight::from(0);
        assert_eq!(qa_power_max(size), qa_power_for_weight(size, duration, &zero, &full));
        assert_eq!(
            BigInt::from(size as u64),
            qa_power_for_weight(size, duration, &full, &zero)
        );
    }
}
