// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actor_power::ext::init::{ExecParams, EXEC_METHOD};
use fc_actor_power::ext::miner::MinerConstructorParams;
use fc_actor_power::ext::reward::UPDATE_NETWORK_KPI;
use fc_actor_power::testing::check_state_invariants;
use fc_actor_power::{
    Actor as PowerActor, Claim, CreateMinerParams, CreateMinerReturn, CurrentTotalPowerReturn,
    Method, State, UpdateClaimedPowerParams, UpdatePledgeTotalParams,
};
use fc_actor_reward::UpdateNetworkKPIParams;
use fc_actors_runtime::runtime::{Policy, Runtime, Type};
use fc_actors_runtime::test_utils::*;
use fc_actors_runtime::{
    ActorError, CRON_ACTOR_ADDR, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR, STORAGE_POWER_ACTOR_ADDR,
    SYSTEM_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::{BytesDe, RawBytes};
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::sector::{RegisteredSealProof, StoragePower};
use fvm_shared::MethodNum;
use num_traits::Zero;

pub const OWNER: Address = Address::new_id(101);
pub const MINER: Address = Address::new_id(201);
pub const SEAL_PROOF: RegisteredSealProof = RegisteredSealProof::StackedDRG32GiBV1P1;

/// Two miners of at least 100 bytes each are needed before the minimum applies.
pub fn small_consensus_policy() -> Policy {
    Policy {
        minimum_consensus_power: StoragePower::from(100),
        consensus_miner_min_miners: 2,
        ..Default::default()
    }
}

/// A power actor under test, together with the mock runtime it executes in.
pub struct Harness {
    pub rt: MockRuntime,
    created: u64,
}

impl Harness {
    /// An unconstructed power actor.
    pub fn new() -> Self {
        let rt = MockRuntime::new(STORAGE_POWER_ACTOR_ADDR);
        rt.set_caller(*SYSTEM_ACTOR_CODE_ID, SYSTEM_ACTOR_ADDR);
        Harness { rt, created: 0 }
    }

    /// A constructed power actor with no miners.
    pub fn setup() -> Self {
        let h = Self::new();
        h.construct();
        h
    }

    pub fn construct(&self) {
        self.rt.expect_validate_caller_addr(vec![SYSTEM_ACTOR_ADDR]);
        self.rt.call::<PowerActor>(Method::Constructor as MethodNum, None).unwrap();
        self.rt.verify();
    }

    pub fn state(&self) -> State {
        self.rt.get_state()
    }

    pub fn check_state(&self) {
        check_state_invariants(self.rt.policy(), &self.state(), self.rt.store()).assert_empty();
    }

    pub fn miners(&self) -> Vec<Address> {
        self.state().load_claims(self.rt.store()).unwrap().collect_keys().unwrap()
    }

    pub fn claim(&self, miner: &Address) -> Option<Claim> {
        self.state().get_claim(self.rt.store(), miner).unwrap()
    }

    /// Sends CreateMiner from the owner, expecting the Exec call to init to
    /// return `miner` and answer with `exit`.
    pub fn create_miner_with(
        &self,
        miner: Address,
        peer: &[u8],
        multiaddrs: Vec<BytesDe>,
        value: TokenAmount,
        exit: ExitCode,
    ) -> Result<Option<IpldBlock>, ActorError> {
        self.rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, OWNER);
        self.rt.set_value(value.clone());
        self.rt.set_balance(value.clone());
        self.rt.expect_validate_caller_type(CALLER_TYPES_SIGNABLE.to_vec());

        let exec = ExecParams {
            code_cid: *MINER_ACTOR_CODE_ID,
            constructor_params: RawBytes::serialize(MinerConstructorParams {
                owner: OWNER,
                worker: OWNER,
                control_addresses: vec![],
                seal_proof_type: SEAL_PROOF,
                peer_id: peer.to_vec(),
                multi_addresses: multiaddrs.clone(),
            })
            .unwrap(),
        };
        let exec_ret = if exit.is_success() {
            let robust_address = Address::new_actor(&miner.payload_bytes());
            IpldBlock::serialize_cbor(&CreateMinerReturn { id_address: miner, robust_address })
                .unwrap()
        } else {
            None
        };
        self.rt.expect_send(
            INIT_ACTOR_ADDR,
            EXEC_METHOD,
            IpldBlock::serialize_cbor(&exec).unwrap(),
            value,
            exec_ret,
            exit,
        );

        let params = CreateMinerParams {
            owner: OWNER,
            worker: OWNER,
            seal_proof_type: SEAL_PROOF,
            peer: peer.to_vec(),
            multiaddrs,
        };
        let ret = self.rt.call::<PowerActor>(
            Method::CreateMiner as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        );
        self.rt.verify();
        ret
    }

    /// Creates a miner owned by OWNER with a unique peer id and no funds.
    pub fn create_miner(&mut self, miner: Address) {
        self.created += 1;
        let peer = format!("peer-{}", self.created);
        self.create_miner_with(miner, peer.as_bytes(), vec![], TokenAmount::zero(), ExitCode::OK)
            .unwrap();
    }

    fn call_as_miner<T: serde::Serialize>(
        &self,
        miner: Address,
        method: Method,
        params: &T,
    ) -> Result<Option<IpldBlock>, ActorError> {
        self.rt.set_caller(*MINER_ACTOR_CODE_ID, miner);
        self.rt.expect_validate_caller_type(vec![Type::Miner]);
        let ret = self
            .rt
            .call::<PowerActor>(method as MethodNum, IpldBlock::serialize_cbor(params).unwrap());
        self.rt.verify();
        ret
    }

    pub fn try_claim_power(
        &self,
        miner: Address,
        raw: StoragePower,
        qa: StoragePower,
    ) -> Result<(), ActorError> {
        let params = UpdateClaimedPowerParams { raw_byte_delta: raw, quality_adjusted_delta: qa };
        self.call_as_miner(miner, Method::UpdateClaimedPower, &params).map(|_| ())
    }

    /// Applies a claim delta and checks the claim moved by exactly that much.
    pub fn claim_power(&self, miner: Address, raw: i64, qa: i64) {
        let before = self.claim(&miner).unwrap();
        self.try_claim_power(miner, raw.into(), qa.into()).unwrap();
        let after = self.claim(&miner).unwrap();
        assert_eq!(before.raw_byte_power + raw, after.raw_byte_power);
        assert_eq!(before.quality_adj_power + qa, after.quality_adj_power);
    }

    pub fn try_pledge(&self, miner: Address, delta: i64) -> Result<(), ActorError> {
        let params = UpdatePledgeTotalParams { pledge_delta: TokenAmount::from_atto(delta) };
        self.call_as_miner(miner, Method::UpdatePledgeTotal, &params).map(|_| ())
    }

    pub fn pledge(&self, miner: Address, delta: i64) {
        let before = self.state().total_pledge_collateral;
        self.try_pledge(miner, delta).unwrap();
        assert_eq!(before + TokenAmount::from_atto(delta), self.state().total_pledge_collateral);
    }

    pub fn current_total(&self) -> CurrentTotalPowerReturn {
        self.rt.expect_validate_caller_any();
        let ret = self
            .rt
            .call::<PowerActor>(Method::CurrentTotalPower as MethodNum, None)
            .unwrap()
            .unwrap()
            .deserialize()
            .unwrap();
        self.rt.verify();
        ret
    }

    /// Asserts the live (not yet snapshotted) network totals.
    pub fn assert_totals(&self, raw: i64, qa: i64) {
        let (total_raw, total_qa) = self.state().current_total_power(self.rt.policy());
        assert_eq!(StoragePower::from(raw), total_raw, "raw power");
        assert_eq!(StoragePower::from(qa), total_qa, "qa power");
    }

    pub fn assert_pledge(&self, atto: i64) {
        assert_eq!(TokenAmount::from_atto(atto), self.state().total_pledge_collateral);
    }

    pub fn assert_qualified(&self, count: i64) {
        assert_eq!(count, self.state().miner_above_min_power_count);
    }

    /// Runs the end-of-epoch tick from cron, expecting `realized` raw power
    /// to be reported to the reward actor.
    pub fn tick(&self, epoch: ChainEpoch, realized: &StoragePower) {
        self.rt.set_epoch(epoch);
        self.rt.set_caller(*CRON_ACTOR_CODE_ID, CRON_ACTOR_ADDR);
        self.rt.expect_validate_caller_addr(vec![CRON_ACTOR_ADDR]);
        self.rt.expect_send(
            REWARD_ACTOR_ADDR,
            UPDATE_NETWORK_KPI,
            IpldBlock::serialize_cbor(&UpdateNetworkKPIParams {
                curr_realized_power: realized.clone(),
            })
            .unwrap(),
            TokenAmount::zero(),
            None,
            ExitCode::OK,
        );
        self.rt.call::<PowerActor>(Method::OnEpochTickEnd as MethodNum, None).unwrap();
        self.rt.verify();
        assert_eq!(epoch + 1, self.state().first_cron_epoch);
    }
}
