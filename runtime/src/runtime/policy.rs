// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_shared::clock::ChainEpoch;
use fvm_shared::sector::{RegisteredSealProof, StoragePower};
use serde::{Deserialize, Serialize};

use crate::builtin::network::*;

/// Protocol parameters that vary between networks. Constructed with mainnet values by
/// `Default` and adjusted for local testing by the `small-deals`, `short-precommit` and
/// `min-power-2k` features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    // --- miner policy ---
    /// Maximum number of sectors proven in a single aggregate.
    pub max_aggregated_sectors: u64,
    /// Minimum number of sectors proven in a single aggregate.
    pub min_aggregated_sectors: u64,

    /// Length of a window PoSt proving period.
    pub wpost_proving_period: ChainEpoch,
    /// Length of a single deadline's challenge window.
    pub wpost_challenge_window: ChainEpoch,
    /// Number of deadlines in a proving period.
    pub wpost_period_deadlines: u64,
    /// Lookback from a deadline's challenge window opening to its randomness epoch.
    pub wpost_challenge_lookback: ChainEpoch,
    /// Maximum number of partitions in one deadline.
    pub max_partitions_per_deadline: u64,

    /// Maximum number of partitions that may be named in a single message.
    pub addressed_partitions_max: u64,
    /// Maximum number of sectors that may be named in a single message.
    pub addressed_sectors_max: u64,
    /// Maximum number of fault or recovery declarations in a single message.
    pub declarations_max: u64,

    /// Epochs between pre-commit and the earliest prove-commit.
    pub pre_commit_challenge_delay: ChainEpoch,
    /// Maximum epochs between pre-commit and prove-commit.
    pub max_prove_commit_duration: ChainEpoch,
    /// Maximum age of the seal randomness epoch at pre-commit.
    pub max_pre_commit_randomness_lookback: ChainEpoch,
    /// Minimum distance from activation to sector expiration.
    pub min_sector_expiration: ChainEpoch,
    /// Maximum distance from the current epoch to sector expiration.
    pub max_sector_expiration_extension: ChainEpoch,

    pub chain_finality: ChainEpoch,

    pub max_peer_id_length: usize,
    pub max_multiaddr_data: usize,
    pub max_control_addresses: usize,

    /// Seal proof types accepted for new sectors and miners.
    pub valid_pre_commit_proof_type: Vec<RegisteredSealProof>,

    // --- market policy ---
    pub min_deal_duration: ChainEpoch,
    pub max_deal_duration: ChainEpoch,
    pub max_deal_label_size: usize,
    /// Epochs between two settlements of an active deal by the market cron.
    pub deal_updates_interval: ChainEpoch,

    // --- power policy ---
    /// Minimum raw power for a miner's power to count towards consensus.
    pub minimum_consensus_power: StoragePower,
    pub consensus_miner_min_miners: i64,

    // --- multisig policy ---
    pub max_multisig_signers: usize,
}

impl Policy {
    pub fn can_pre_commit_seal_proof(&self, proof: RegisteredSealProof) -> bool {
        self.valid_pre_commit_proof_type.contains(&proof)
    }
}

impl Default for Policy {
    fn default() -> Policy {
        Policy {
            max_aggregated_sectors: policy_constants::MAX_AGGREGATED_SECTORS,
            min_aggregated_sectors: policy_constants::MIN_AGGREGATED_SECTORS,
            wpost_proving_period: policy_constants::WPOST_PROVING_PERIOD,
            wpost_challenge_window: policy_constants::WPOST_CHALLENGE_WINDOW,
            wpost_period_deadlines: policy_constants::WPOST_PERIOD_DEADLINES,
            wpost_challenge_lookback: policy_constants::WPOST_CHALLENGE_LOOKBACK,
            max_partitions_per_deadline: policy_constants::MAX_PARTITIONS_PER_DEADLINE,
            addressed_partitions_max: policy_constants::MAX_PARTITIONS_PER_DEADLINE,
            addressed_sectors_max: policy_constants::ADDRESSED_SECTORS_MAX,
            declarations_max: policy_constants::MAX_PARTITIONS_PER_DEADLINE,
            pre_commit_challenge_delay: policy_constants::PRE_COMMIT_CHALLENGE_DELAY,
            max_prove_commit_duration: 30 * EPOCHS_IN_DAY
                + policy_constants::PRE_COMMIT_CHALLENGE_DELAY,
            max_pre_commit_randomness_lookback: EPOCHS_IN_DAY + policy_constants::CHAIN_FINALITY,
            min_sector_expiration: 180 * EPOCHS_IN_DAY,
            max_sector_expiration_extension: 540 * EPOCHS_IN_DAY,
            chain_finality: policy_constants::CHAIN_FINALITY,
            max_peer_id_length: 128,
            max_multiaddr_data: 1024,
            max_control_addresses: 10,
            valid_pre_commit_proof_type: policy_constants::valid_pre_commit_proof_types(),
            min_deal_duration: 180 * EPOCHS_IN_DAY,
            max_deal_duration: 540 * EPOCHS_IN_DAY,
            max_deal_label_size: 256,
            deal_updates_interval: 100,
            minimum_consensus_power: StoragePower::from(
                policy_constants::MINIMUM_CONSENSUS_POWER,
            ),
            consensus_miner_min_miners: 4,
            max_multisig_signers: 256,
        }
    }
}

pub mod policy_constants {
    use fvm_shared::clock::ChainEpoch;
    use fvm_shared::sector::RegisteredSealProof;

    use crate::builtin::network::*;

    pub const MAX_AGGREGATED_SECTORS: u64 = 819;
    pub const MIN_AGGREGATED_SECTORS: u64 = 4;

    pub const WPOST_PROVING_PERIOD: ChainEpoch = EPOCHS_IN_DAY;
    // 30 minutes (48 per day)
    pub const WPOST_CHALLENGE_WINDOW: ChainEpoch = 30 * 60 / EPOCH_DURATION_SECONDS;
    pub const WPOST_PERIOD_DEADLINES: u64 = 48;
    pub const WPOST_CHALLENGE_LOOKBACK: ChainEpoch = 20;
    pub const MAX_PARTITIONS_PER_DEADLINE: u64 = 3000;
    pub const ADDRESSED_SECTORS_MAX: u64 = 25_000;

    pub const CHAIN_FINALITY: ChainEpoch = 900;

    #[cfg(not(feature = "short-precommit"))]
    pub const PRE_COMMIT_CHALLENGE_DELAY: ChainEpoch = 150;
    #[cfg(feature = "short-precommit")]
    pub const PRE_COMMIT_CHALLENGE_DELAY: ChainEpoch = 10;

    #[cfg(not(feature = "min-power-2k"))]
    pub const MINIMUM_CONSENSUS_POWER: i64 = 10 << 40;
    #[cfg(feature = "min-power-2k")]
    pub const MINIMUM_CONSENSUS_POWER: i64 = 2 << 10;

    pub fn valid_pre_commit_proof_types() -> Vec<RegisteredSealProof> {
        let mut proofs = vec![
            RegisteredSealProof::StackedDRG32GiBV1P1,
            RegisteredSealProof::StackedDRG64GiBV1P1,
        ];
        if cfg!(feature = "small-deals") {
            proofs.push(RegisteredSealProof::StackedDRG2KiBV1P1);
            proofs.push(RegisteredSealProof::StackedDRG8MiBV1P1);
        }
        proofs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_cover_proving_period() {
        let policy = Policy::default();
        assert_eq!(
            policy.wpost_proving_period,
            policy.wpost_challenge_window * policy.wpost_period_deadlines as i64
        );
    }

    #[test]
    fn proof_type_membership() {
        let mut policy = Policy::default();
        policy.valid_pre_commit_proof_type.push(RegisteredSealProof::StackedDRG2KiBV1P1);
        assert!(policy.can_pre_commit_seal_proof(RegisteredSealProof::StackedDRG2KiBV1P1));
        assert!(!Policy::default().can_pre_commit_seal_proof(RegisteredSealProof::StackedDRG2KiBV1));
    }
}
