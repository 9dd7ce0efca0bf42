// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use cid::Cid;
use fc_actors_runtime::DealWeight;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::{strict_bytes, BytesDe};
use fvm_shared::address::Address;
use fvm_shared::bigint::bigint_ser;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::{PoStProof, RegisteredSealProof, SectorNumber, StoragePower};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Raw and quality-adjusted power, always moved together.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct PowerPair {
    #[serde(with = "bigint_ser")]
    pub raw: StoragePower,
    #[serde(with = "bigint_ser")]
    pub qa: StoragePower,
}

impl PowerPair {
    pub fn new(raw: StoragePower, qa: StoragePower) -> Self {
        Self { raw, qa }
    }

    pub fn zero() -> Self {
        Default::default()
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero() && self.qa.is_zero()
    }
}

impl Add for &PowerPair {
    type Output = PowerPair;

    fn add(self, rhs: Self) -> PowerPair {
        PowerPair { raw: &self.raw + &rhs.raw, qa: &self.qa + &rhs.qa }
    }
}

impl Add for PowerPair {
    type Output = PowerPair;

    fn add(self, rhs: Self) -> PowerPair {
        &self + &rhs
    }
}

impl AddAssign<&PowerPair> for PowerPair {
    fn add_assign(&mut self, rhs: &PowerPair) {
        self.raw += &rhs.raw;
        self.qa += &rhs.qa;
    }
}

impl Sub for &PowerPair {
    type Output = PowerPair;

    fn sub(self, rhs: Self) -> PowerPair {
        PowerPair { raw: &self.raw - &rhs.raw, qa: &self.qa - &rhs.qa }
    }
}

impl Sub for PowerPair {
    type Output = PowerPair;

    fn sub(self, rhs: Self) -> PowerPair {
        &self - &rhs
    }
}

impl SubAssign<&PowerPair> for PowerPair {
    fn sub_assign(&mut self, rhs: &PowerPair) {
        self.raw -= &rhs.raw;
        self.qa -= &rhs.qa;
    }
}

impl Neg for PowerPair {
    type Output = PowerPair;

    fn neg(self) -> PowerPair {
        PowerPair { raw: -self.raw, qa: -self.qa }
    }
}

/// Storage miner actor constructor params are defined here so the power actor can send them
/// to the init actor to instantiate miners.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct MinerConstructorParams {
    pub owner: Address,
    pub worker: Address,
    pub control_addresses: Vec<Address>,
    pub seal_proof_type: RegisteredSealProof,
    #[serde(with = "strict_bytes")]
    pub peer_id: Vec<u8>,
    pub multi_addresses: Vec<BytesDe>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct GetControlAddressesReturn {
    pub owner: Address,
    pub worker: Address,
    pub control_addresses: Vec<Address>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct ChangeWorkerAddressParams {
    pub new_worker: Address,
    pub new_control_addresses: Vec<Address>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct ChangePeerIDParams {
    #[serde(with = "strict_bytes")]
    pub new_id: Vec<u8>,
}

/// A partition proven in a Window PoSt. Skipped sectors are recorded as faulty.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct PoStPartition {
    pub index: u64,
    pub skipped: BitField,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct SubmitWindowedPoStParams {
    /// Index of the deadline being proven; must be the currently open one.
    pub deadline: u64,
    /// Partitions of that deadline covered by the proof, with any skipped sectors.
    pub partitions: Vec<PoStPartition>,
    /// A single proof covering all partitions.
    pub proofs: Vec<PoStProof>,
}

/// Information provided by a miner when pre-committing a sector.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct SectorPreCommitInfo {
    pub seal_proof: RegisteredSealProof,
    pub sector_number: SectorNumber,
    /// CommR
    pub sealed_cid: Cid,
    pub seal_rand_epoch: ChainEpoch,
    pub deal_ids: Vec<DealID>,
    pub expiration: ChainEpoch,
}

/// A pre-commitment as held in state until it is proven or expires.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct SectorPreCommitOnChainInfo {
    pub info: SectorPreCommitInfo,
    pub pre_commit_deposit: TokenAmount,
    pub pre_commit_epoch: ChainEpoch,
}

/// A sector whose seal has been proven, kept in the sectors AMT.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct SectorOnChainInfo {
    pub sector_number: SectorNumber,
    /// Determines the Window PoSt proof type too.
    pub seal_proof: RegisteredSealProof,
    /// Replica commitment (CommR).
    pub sealed_cid: Cid,
    pub deal_ids: Vec<DealID>,
    /// Epoch of the prove-commit that activated the sector.
    pub activation: ChainEpoch,
    /// Last epoch the sector is committed for.
    pub expiration: ChainEpoch,
    /// Space-time of the sector's unverified deals.
    #[serde(with = "bigint_ser")]
    pub deal_weight: DealWeight,
    /// Space-time of the sector's verified deals.
    #[serde(with = "bigint_ser")]
    pub verified_deal_weight: DealWeight,
    /// Pledge locked when the sector was proven.
    pub initial_pledge: TokenAmount,
    /// Projected reward for one day, fixed at activation.
    pub expected_day_reward: TokenAmount,
    /// Projected reward for the pledge horizon, fixed at activation.
    pub expected_storage_pledge: TokenAmount,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct ProveCommitSectorParams {
    pub sector_number: SectorNumber,
    #[serde(with = "strict_bytes")]
    pub proof: Vec<u8>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct ProveCommitAggregateParams {
    pub sector_numbers: BitField,
    #[serde(with = "strict_bytes")]
    pub aggregate_proof: Vec<u8>,
}

/// Sectors of one partition named by a fault, recovery or termination declaration.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct SectorDeclaration {
    pub deadline: u64,
    pub partition: u64,
    pub sectors: BitField,
}

pub type FaultDeclaration = SectorDeclaration;
pub type RecoveryDeclaration = SectorDeclaration;
pub type TerminationDeclaration = SectorDeclaration;

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct DeclareFaultsParams {
    pub faults: Vec<FaultDeclaration>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct DeclareFaultsRecoveredParams {
    pub recoveries: Vec<RecoveryDeclaration>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct TerminateSectorsParams {
    pub terminations: Vec<TerminationDeclaration>,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct TerminateSectorsReturn {
    /// Whether all terminations were processed.
    pub done: bool,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct WithdrawBalanceParams {
    pub amount_requested: TokenAmount,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct WithdrawBalanceReturn {
    pub amount_withdrawn: TokenAmount,
}

#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct ApplyRewardParams {
    pub reward: TokenAmount,
    pub penalty: TokenAmount,
}
