// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
#![allow(dead_code)]

use fc_actor_miner::ext::market::{ComputeDataCommitmentParams, ComputeDataCommitmentReturn};
use fc_actor_miner::ext::power::{
    CurrentTotalPowerReturn, UpdateClaimedPowerParams, UpdatePledgeTotalParams,
};
use fc_actor_miner::testing::check_state_invariants;
use fc_actor_miner::{
    current_deadline_info, ext, monies_for, qa_power_for_sector, qa_power_for_weight, Actor,
    DeclareFaultsParams, DeclareFaultsRecoveredParams, FaultDeclaration, Method,
    MinerConstructorParams, PoStPartition, PowerPair, ProveCommitSectorParams,
    RecoveryDeclaration, SectorOnChainInfo, SectorPreCommitInfo, SectorPreCommitOnChainInfo,
    State, SubmitWindowedPoStParams,
};
use fc_actors_runtime::network::EPOCHS_IN_DAY;
use fc_actors_runtime::reward::{FilterEstimate, ThisEpochRewardReturn};
use fc_actors_runtime::runtime::{DomainSeparationTag, Runtime};
use fc_actors_runtime::test_utils::*;
use fc_actors_runtime::{
    ActorError, BURNT_FUNDS_ACTOR_ADDR, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR,
    STORAGE_MARKET_ACTOR_ADDR, STORAGE_POWER_ACTOR_ADDR,
};
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::bigint::BigInt;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::randomness::Randomness;
use fvm_shared::sector::{
    PoStProof, RegisteredPoStProof, RegisteredSealProof, SealVerifyInfo, SectorID, SectorInfo,
    SectorNumber, StoragePower, WindowPoStVerifyInfo,
};
use fvm_shared::{MethodNum, METHOD_SEND};
use num_traits::Zero;

pub const RECEIVER_ID: u64 = 1000;
pub const BIG_BALANCE: u128 = 1_000_000;

pub struct ActorHarness {
    pub receiver: Address,
    pub owner: Address,
    pub worker: Address,
    pub control: Address,
    pub seal_proof: RegisteredSealProof,
    pub post_proof: RegisteredPoStProof,

    pub epoch_reward_smooth: FilterEstimate,
    pub epoch_qa_power_smooth: FilterEstimate,
    pub baseline_power: StoragePower,
    pub circulating_supply: TokenAmount,
}

impl ActorHarness {
    pub fn new() -> Self {
        init_logging();
        let reward = TokenAmount::from_whole(10);
        let power = StoragePower::from(1u128 << 50);
        let seal_proof = RegisteredSealProof::StackedDRG32GiBV1P1;
        Self {
            receiver: Address::new_id(RECEIVER_ID),
            owner: Address::new_id(100),
            worker: Address::new_id(101),
            control: Address::new_id(102),
            seal_proof,
            post_proof: seal_proof.registered_window_post_proof().unwrap(),
            epoch_reward_smooth: FilterEstimate::new(reward.atto().clone(), BigInt::zero()),
            epoch_qa_power_smooth: FilterEstimate::new(power.clone(), BigInt::zero()),
            baseline_power: power,
            circulating_supply: TokenAmount::from_whole(1_000_000_000),
        }
    }

    pub fn new_runtime(&self) -> MockRuntime {
        let rt = MockRuntime::new(self.receiver);
        for addr in [self.owner, self.worker, self.control] {
            rt.set_address_actor_type(addr, *ACCOUNT_ACTOR_CODE_ID);
        }
        rt.set_balance(TokenAmount::from_whole(BIG_BALANCE));
        rt.set_circulating_supply(self.circulating_supply.clone());
        rt
    }

    pub fn construct_and_verify(&self, rt: &MockRuntime) {
        rt.set_caller(*INIT_ACTOR_CODE_ID, INIT_ACTOR_ADDR);
        rt.expect_validate_caller_addr(vec![INIT_ACTOR_ADDR]);
        let params = MinerConstructorParams {
            owner: self.owner,
            worker: self.worker,
            control_addresses: vec![self.control],
            seal_proof_type: self.seal_proof,
            peer_id: b"peer".to_vec(),
            multi_addresses: vec![],
        };
        let ret = rt
            .call::<Actor>(
                Method::Constructor as MethodNum,
                IpldBlock::serialize_cbor(&params).unwrap(),
            )
            .unwrap();
        expect_empty(ret);
        rt.verify();
    }

    pub fn get_state(&self, rt: &MockRuntime) -> State {
        rt.get_state()
    }

    pub fn check_state(&self, rt: &MockRuntime) {
        let st = self.get_state(rt);
        let (_, acc) = check_state_invariants(rt.policy(), &st, rt.store(), &rt.get_balance());
        acc.assert_empty();
    }

    /// Addresses allowed to act as the worker, in the order the actor checks them.
    pub fn worker_callers(&self) -> Vec<Address> {
        vec![self.control, self.worker]
    }

    /// Addresses allowed to act on behalf of the miner.
    pub fn any_callers(&self) -> Vec<Address> {
        vec![self.control, self.worker, self.owner]
    }

    pub fn expect_query_network_info(&self, rt: &MockRuntime) {
        let reward = ThisEpochRewardReturn {
            this_epoch_reward_smoothed: self.epoch_reward_smooth.clone(),
            this_epoch_baseline_power: self.baseline_power.clone(),
        };
        let power = CurrentTotalPowerReturn {
            raw_byte_power: self.baseline_power.clone(),
            quality_adj_power: self.baseline_power.clone(),
            pledge_collateral: TokenAmount::zero(),
            quality_adj_power_smoothed: self.epoch_qa_power_smooth.clone(),
        };
        rt.expect_send(
            REWARD_ACTOR_ADDR,
            ext::reward::THIS_EPOCH_REWARD_METHOD,
            None,
            TokenAmount::zero(),
            IpldBlock::serialize_cbor(&reward).unwrap(),
            ExitCode::OK,
        );
        rt.expect_send(
            STORAGE_POWER_ACTOR_ADDR,
            ext::power::CURRENT_TOTAL_POWER_METHOD,
            None,
            TokenAmount::zero(),
            IpldBlock::serialize_cbor(&power).unwrap(),
            ExitCode::OK,
        );
    }

    pub fn expect_update_power(&self, rt: &MockRuntime, delta: PowerPair) {
        if delta.is_zero() {
            return;
        }
        rt.expect_send(
            STORAGE_POWER_ACTOR_ADDR,
            ext::power::UPDATE_CLAIMED_POWER_METHOD,
            IpldBlock::serialize_cbor(&UpdateClaimedPowerParams {
                raw_byte_delta: delta.raw,
                quality_adjusted_delta: delta.qa,
            })
            .unwrap(),
            TokenAmount::zero(),
            None,
            ExitCode::OK,
        );
    }

    pub fn expect_update_pledge(&self, rt: &MockRuntime, delta: &TokenAmount) {
        if delta.is_zero() {
            return;
        }
        rt.expect_send(
            STORAGE_POWER_ACTOR_ADDR,
            ext::power::UPDATE_PLEDGE_TOTAL_METHOD,
            IpldBlock::serialize_cbor(&UpdatePledgeTotalParams { pledge_delta: delta.clone() })
                .unwrap(),
            TokenAmount::zero(),
            None,
            ExitCode::OK,
        );
    }

    pub fn expect_burn(&self, rt: &MockRuntime, amount: &TokenAmount) {
        if !amount.is_positive() {
            return;
        }
        rt.expect_send(
            BURNT_FUNDS_ACTOR_ADDR,
            METHOD_SEND,
            None,
            amount.clone(),
            None,
            ExitCode::OK,
        );
    }

    pub fn make_pre_commit_params(
        &self,
        sector_number: SectorNumber,
        challenge: ChainEpoch,
        expiration: ChainEpoch,
    ) -> SectorPreCommitInfo {
        SectorPreCommitInfo {
            seal_proof: self.seal_proof,
            sector_number,
            sealed_cid: make_sealed_cid(format!("commr-{}", sector_number).as_bytes()),
            seal_rand_epoch: challenge,
            deal_ids: vec![],
            expiration,
        }
    }

    /// An expiration comfortably inside the allowed range for a pre-commit at `epoch`.
    pub fn default_expiration(&self, rt: &MockRuntime, epoch: ChainEpoch) -> ChainEpoch {
        epoch + rt.policy().max_prove_commit_duration + 200 * EPOCHS_IN_DAY
    }

    pub fn pre_commit_deposit(&self, rt: &MockRuntime) -> TokenAmount {
        monies_for(rt.actor_version()).pre_commit_deposit_for_power(
            &self.epoch_reward_smooth,
            &self.epoch_qa_power_smooth,
            &fc_actor_miner::qa_power_max(self.sector_size()),
        )
    }

    pub fn sector_size(&self) -> fvm_shared::sector::SectorSize {
        self.seal_proof.sector_size().unwrap()
    }

    pub fn pre_commit_sector(
        &self,
        rt: &MockRuntime,
        params: SectorPreCommitInfo,
    ) -> Result<(), ActorError> {
        rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, self.worker);
        rt.expect_validate_caller_addr(vec![self.worker]);
        self.expect_query_network_info(rt);

        let ret = rt.call::<Actor>(
            Method::PreCommitSector as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        );
        if ret.is_ok() {
            rt.verify();
        } else {
            rt.reset();
        }
        ret.map(expect_empty)
    }

    pub fn pre_commit_sector_and_get(
        &self,
        rt: &MockRuntime,
        params: SectorPreCommitInfo,
    ) -> SectorPreCommitOnChainInfo {
        let number = params.sector_number;
        self.pre_commit_sector(rt, params).unwrap();
        self.get_state(rt).get_precommitted_sector(rt.store(), number).unwrap().unwrap()
    }

    fn receiver_entropy(&self) -> Vec<u8> {
        fvm_ipld_encoding::to_vec(&self.receiver).unwrap()
    }

    /// The initial pledge and power the actor will assign to a sector without deals that is
    /// activated at the current epoch.
    pub fn expected_activation(
        &self,
        rt: &MockRuntime,
        precommit: &SectorPreCommitOnChainInfo,
    ) -> (TokenAmount, PowerPair) {
        let duration = precommit.info.expiration - rt.epoch.get();
        let qa = qa_power_for_weight(
            self.sector_size(),
            duration,
            &BigInt::zero(),
            &BigInt::zero(),
        );
        let pledge = monies_for(rt.actor_version()).initial_pledge_for_power(
            &qa,
            &self.baseline_power,
            &self.epoch_reward_smooth,
            &self.epoch_qa_power_smooth,
            &self.circulating_supply,
        );
        (pledge, PowerPair::new(BigInt::from(self.sector_size() as u64), qa))
    }

    pub fn expect_seal_randomness(&self, rt: &MockRuntime, precommit: &SectorPreCommitOnChainInfo) {
        rt.expect_get_randomness_from_tickets(
            DomainSeparationTag::SealRandomness,
            precommit.info.seal_rand_epoch,
            self.receiver_entropy(),
            [1; 32],
        );
        rt.expect_get_randomness_from_beacon(
            DomainSeparationTag::InteractiveSealChallengeSeed,
            precommit.pre_commit_epoch + rt.policy().pre_commit_challenge_delay,
            self.receiver_entropy(),
            [2; 32],
        );
    }

    pub fn expect_compute_data_commitment(
        &self,
        rt: &MockRuntime,
        precommit: &SectorPreCommitOnChainInfo,
    ) -> cid::Cid {
        let commd = make_piece_cid(b"unsealed");
        rt.expect_send(
            STORAGE_MARKET_ACTOR_ADDR,
            ext::market::COMPUTE_DATA_COMMITMENT_METHOD,
            IpldBlock::serialize_cbor(&ComputeDataCommitmentParams {
                deal_ids: precommit.info.deal_ids.clone(),
                sector_type: precommit.info.seal_proof,
            })
            .unwrap(),
            TokenAmount::zero(),
            IpldBlock::serialize_cbor(&ComputeDataCommitmentReturn { commd }).unwrap(),
            ExitCode::OK,
        );
        commd
    }

    /// Proves a deal-less pre-committed sector at the current epoch and returns its on-chain info.
    pub fn prove_commit_sector_and_confirm(
        &self,
        rt: &MockRuntime,
        precommit: &SectorPreCommitOnChainInfo,
    ) -> SectorOnChainInfo {
        let proof = vec![0u8; 192];
        rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, self.worker);
        rt.expect_validate_caller_any();
        self.expect_seal_randomness(rt, precommit);
        let commd = self.expect_compute_data_commitment(rt, precommit);
        rt.expect_verify_seal(
            SealVerifyInfo {
                registered_proof: precommit.info.seal_proof,
                sector_id: SectorID { miner: RECEIVER_ID, number: precommit.info.sector_number },
                deal_ids: vec![],
                randomness: Randomness(vec![1; 32]),
                interactive_randomness: Randomness(vec![2; 32]),
                proof: proof.clone(),
                sealed_cid: precommit.info.sealed_cid,
                unsealed_cid: commd,
            },
            true,
        );
        self.expect_query_network_info(rt);
        let (pledge, power) = self.expected_activation(rt, precommit);
        self.expect_update_power(rt, power);
        self.expect_update_pledge(rt, &pledge);

        let params = ProveCommitSectorParams { sector_number: precommit.info.sector_number, proof };
        let ret = rt
            .call::<Actor>(
                Method::ProveCommitSector as MethodNum,
                IpldBlock::serialize_cbor(&params).unwrap(),
            )
            .unwrap();
        expect_empty(ret);
        rt.verify();

        self.get_state(rt).get_sector(rt.store(), precommit.info.sector_number).unwrap().unwrap()
    }

    /// Pre-commits and proves a sector, leaving the epoch just after the challenge delay.
    pub fn commit_sector(&self, rt: &MockRuntime, sector_number: SectorNumber) -> SectorOnChainInfo {
        let epoch = rt.epoch.get();
        let expiration = self.default_expiration(rt, epoch);
        let precommit = self.pre_commit_sector_and_get(
            rt,
            self.make_pre_commit_params(sector_number, epoch - 1, expiration),
        );
        rt.set_epoch(epoch + rt.policy().pre_commit_challenge_delay + 1);
        self.prove_commit_sector_and_confirm(rt, &precommit)
    }

    pub fn declare_faults(
        &self,
        rt: &MockRuntime,
        deadline: u64,
        partition: u64,
        sectors: &[SectorOnChainInfo],
    ) -> PowerPair {
        rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, self.worker);
        rt.expect_validate_caller_addr(self.any_callers());
        self.expect_query_network_info(rt);

        let monies = monies_for(rt.actor_version());
        let mut penalty = TokenAmount::zero();
        let mut power = PowerPair::zero();
        for sector in sectors {
            let qa = qa_power_for_sector(self.sector_size(), sector);
            penalty += monies.pledge_penalty_for_declared_fault(
                &self.epoch_reward_smooth,
                &self.epoch_qa_power_smooth,
                &qa,
                rt.network_version(),
            );
            power += &PowerPair::new(BigInt::from(self.sector_size() as u64), qa);
        }
        self.expect_update_power(rt, -power.clone());
        self.expect_burn(rt, &penalty);

        let params = DeclareFaultsParams {
            faults: vec![FaultDeclaration {
                deadline,
                partition,
                sectors: bitfield_of(sectors),
            }],
        };
        let ret = rt
            .call::<Actor>(
                Method::DeclareFaults as MethodNum,
                IpldBlock::serialize_cbor(&params).unwrap(),
            )
            .unwrap();
        expect_empty(ret);
        rt.verify();
        power
    }

    pub fn declare_recoveries(
        &self,
        rt: &MockRuntime,
        deadline: u64,
        partition: u64,
        sectors: BitField,
    ) -> Result<(), ActorError> {
        rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, self.worker);
        rt.expect_validate_caller_addr(self.any_callers());
        let params = DeclareFaultsRecoveredParams {
            recoveries: vec![RecoveryDeclaration { deadline, partition, sectors }],
        };
        let ret = rt.call::<Actor>(
            Method::DeclareFaultsRecovered as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        );
        if ret.is_ok() {
            rt.verify();
        } else {
            rt.reset();
        }
        ret.map(expect_empty)
    }

    /// Advances to the next opening of `deadline` and submits a proof covering partition 0,
    /// expecting the given sectors to be challenged and `power_delta` to be reported.
    pub fn submit_window_post(
        &self,
        rt: &MockRuntime,
        deadline: u64,
        challenged: &[SectorOnChainInfo],
        power_delta: PowerPair,
    ) {
        let st = self.get_state(rt);
        let policy = rt.policy();
        let now = current_deadline_info(policy, st.proving_period_start, rt.epoch.get());
        let open = now.period_start
            + policy.wpost_proving_period
            + deadline as i64 * policy.wpost_challenge_window;
        rt.set_epoch(open);
        let dl_info = current_deadline_info(policy, st.proving_period_start, open);
        assert_eq!(deadline, dl_info.index);

        rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, self.worker);
        rt.expect_validate_caller_addr(self.worker_callers());

        let proofs = vec![PoStProof { post_proof: self.post_proof, proof_bytes: vec![8; 192] }];
        if !challenged.is_empty() {
            rt.expect_get_randomness_from_beacon(
                DomainSeparationTag::WindowedPoStChallengeSeed,
                dl_info.challenge,
                self.receiver_entropy(),
                [3; 32],
            );
            rt.expect_verify_post(
                WindowPoStVerifyInfo {
                    randomness: Randomness(vec![3; 32]),
                    proofs: proofs.clone(),
                    challenged_sectors: challenged
                        .iter()
                        .map(|s| SectorInfo {
                            proof: s.seal_proof,
                            sector_number: s.sector_number,
                            sealed_cid: s.sealed_cid,
                        })
                        .collect(),
                    prover: RECEIVER_ID,
                },
                true,
            );
        }
        self.expect_update_power(rt, power_delta);

        let params = SubmitWindowedPoStParams {
            deadline,
            partitions: vec![PoStPartition { index: 0, skipped: BitField::new() }],
            proofs,
        };
        let ret = rt
            .call::<Actor>(
                Method::SubmitWindowedPoSt as MethodNum,
                IpldBlock::serialize_cbor(&params).unwrap(),
            )
            .unwrap();
        expect_empty(ret);
        rt.verify();
    }
}

pub fn bitfield_of(sectors: &[SectorOnChainInfo]) -> BitField {
    BitField::try_from_bits(sectors.iter().map(|s| s.sector_number)).unwrap()
}
