// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#![allow(dead_code)]

use fc_actor_multisig::testing::check_state_invariants;
use fc_actor_multisig::{
    compute_proposal_hash, Actor, AddSignerParams, ApproveReturn, ChangeNumApprovalsThresholdParams,
    ConstructorParams, LockBalanceParams, Method, ProposeParams, ProposeReturn,
    RemoveSignerParams, State, SwapSignerParams, Transaction, TxnID, TxnIDParams,
};
use fc_actors_runtime::test_utils::*;
use fc_actors_runtime::{ActorError, INIT_ACTOR_ADDR};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::MethodNum;

pub struct ActorHarness {}

impl ActorHarness {
    pub fn new() -> ActorHarness {
        ActorHarness {}
    }

    pub fn construct_and_verify(
        &self,
        rt: &MockRuntime,
        initial_approvals: u64,
        unlock_duration: ChainEpoch,
        start_epoch: ChainEpoch,
        initial_signers: Vec<Address>,
    ) {
        let params = ConstructorParams {
            signers: initial_signers,
            num_approvals_threshold: initial_approvals,
            unlock_duration,
            start_epoch,
        };
        rt.set_caller(*INIT_ACTOR_CODE_ID, INIT_ACTOR_ADDR);
        rt.expect_validate_caller_addr(vec![INIT_ACTOR_ADDR]);
        let result = rt
            .call::<Actor>(
                Method::Constructor as u64,
                IpldBlock::serialize_cbor(&params).unwrap(),
            )
            .unwrap();
        expect_empty(result);
        rt.verify();
    }

    pub fn propose(
        &self,
        rt: &MockRuntime,
        to: Address,
        value: TokenAmount,
        method: MethodNum,
        params: RawBytes,
    ) -> Result<ProposeReturn, ActorError> {
        rt.expect_validate_caller_type(CALLER_TYPES_SIGNABLE.to_vec());
        let propose_params = ProposeParams { to, value, method, params };
        let ret = rt.call::<Actor>(
            Method::Propose as u64,
            IpldBlock::serialize_cbor(&propose_params).unwrap(),
        );
        rt.verify();
        ret.map(|r| r.unwrap().deserialize().unwrap())
    }

    /// Proposes a transaction that does not reach the threshold and returns its proposal hash.
    pub fn propose_ok(
        &self,
        rt: &MockRuntime,
        to: Address,
        value: TokenAmount,
        method: MethodNum,
        params: RawBytes,
    ) -> [u8; 32] {
        let txn = Transaction {
            to,
            value: value.clone(),
            method,
            params: params.clone(),
            approved: vec![*rt.caller.borrow()],
        };
        let ret = self.propose(rt, to, value, method, params).unwrap();
        assert!(!ret.applied, "proposal unexpectedly applied");
        compute_proposal_hash(&txn, rt).unwrap()
    }

    pub fn approve(
        &self,
        rt: &MockRuntime,
        txn_id: TxnID,
        proposal_hash: &[u8],
    ) -> Result<ApproveReturn, ActorError> {
        rt.expect_validate_caller_type(CALLER_TYPES_SIGNABLE.to_vec());
        let params = TxnIDParams { id: txn_id, proposal_hash: proposal_hash.to_vec() };
        let ret =
            rt.call::<Actor>(Method::Approve as u64, IpldBlock::serialize_cbor(&params).unwrap());
        rt.verify();
        ret.map(|r| r.unwrap().deserialize().unwrap())
    }

    pub fn approve_ok(&self, rt: &MockRuntime, txn_id: TxnID, proposal_hash: &[u8]) -> ApproveReturn {
        let ret = self.approve(rt, txn_id, proposal_hash).unwrap();
        assert!(ret.applied, "approval did not apply the transaction");
        ret
    }

    pub fn cancel(
        &self,
        rt: &MockRuntime,
        txn_id: TxnID,
        proposal_hash: &[u8],
    ) -> Result<Option<IpldBlock>, ActorError> {
        rt.expect_validate_caller_type(CALLER_TYPES_SIGNABLE.to_vec());
        let params = TxnIDParams { id: txn_id, proposal_hash: proposal_hash.to_vec() };
        let ret =
            rt.call::<Actor>(Method::Cancel as u64, IpldBlock::serialize_cbor(&params).unwrap());
        rt.verify();
        ret
    }

    pub fn add_signer(
        &self,
        rt: &MockRuntime,
        signer: Address,
        increase: bool,
    ) -> Result<Option<IpldBlock>, ActorError> {
        rt.expect_validate_caller_addr(vec![rt.receiver]);
        let params = AddSignerParams { signer, increase };
        let ret =
            rt.call::<Actor>(Method::AddSigner as u64, IpldBlock::serialize_cbor(&params).unwrap());
        rt.verify();
        ret
    }

    pub fn remove_signer(
        &self,
        rt: &MockRuntime,
        signer: Address,
        decrease: bool,
    ) -> Result<Option<IpldBlock>, ActorError> {
        rt.expect_validate_caller_addr(vec![rt.receiver]);
        let params = RemoveSignerParams { signer, decrease };
        let ret = rt
            .call::<Actor>(Method::RemoveSigner as u64, IpldBlock::serialize_cbor(&params).unwrap());
        rt.verify();
        ret
    }

    pub fn swap_signers(
        &self,
        rt: &MockRuntime,
        old_signer: Address,
        new_signer: Address,
    ) -> Result<Option<IpldBlock>, ActorError> {
        rt.expect_validate_caller_addr(vec![rt.receiver]);
        let params = SwapSignerParams { from: old_signer, to: new_signer };
        let ret =
            rt.call::<Actor>(Method::SwapSigner as u64, IpldBlock::serialize_cbor(&params).unwrap());
        rt.verify();
        ret
    }

    pub fn change_num_approvals_threshold(
        &self,
        rt: &MockRuntime,
        new_threshold: u64,
    ) -> Result<Option<IpldBlock>, ActorError> {
        rt.expect_validate_caller_addr(vec![rt.receiver]);
        let params = ChangeNumApprovalsThresholdParams { new_threshold };
        let ret = rt.call::<Actor>(
            Method::ChangeNumApprovalsThreshold as u64,
            IpldBlock::serialize_cbor(&params).unwrap(),
        );
        rt.verify();
        ret
    }

    pub fn lock_balance(
        &self,
        rt: &MockRuntime,
        start: ChainEpoch,
        duration: ChainEpoch,
        amount: TokenAmount,
    ) -> Result<Option<IpldBlock>, ActorError> {
        rt.expect_validate_caller_addr(vec![rt.receiver]);
        let params = LockBalanceParams { start_epoch: start, unlock_duration: duration, amount };
        let ret =
            rt.call::<Actor>(Method::LockBalance as u64, IpldBlock::serialize_cbor(&params).unwrap());
        rt.verify();
        ret
    }

    pub fn assert_transactions(&self, rt: &MockRuntime, mut expected: Vec<(TxnID, Transaction)>) {
        let st: State = rt.get_state();
        let ptx = st.load_pending_txs(&rt.store).unwrap();
        let mut actual = Vec::new();
        ptx.for_each(|id, txn| {
            actual.push((id, txn.clone()));
            Ok(())
        })
        .unwrap();
        expected.sort_by_key(|(id, _)| *id);
        actual.sort_by_key(|(id, _)| *id);
        assert_eq!(expected, actual);
    }

    pub fn check_state(&self, rt: &MockRuntime) {
        let (_, acc) = check_state_invariants(&rt.get_state(), &rt.store);
        acc.assert_empty();
    }
}
