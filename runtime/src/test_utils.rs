// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use core::fmt;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use anyhow::anyhow;
use cid::Cid;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::CborStore;
use fvm_shared::address::{Address, Protocol};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::commcid::{data_commitment_v1_to_cid, replica_commitment_v1_to_cid};
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::piece::PieceInfo;
use fvm_shared::randomness::RANDOMNESS_LENGTH;
use fvm_shared::sector::{
    AggregateSealVerifyProofAndInfos, RegisteredSealProof, SealVerifyInfo, WindowPoStVerifyInfo,
};
use fvm_shared::version::NetworkVersion;
use fvm_shared::{ActorID, MethodNum, Response};
use multihash::Code;
use rand::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::runtime::{
    ActorCode, ActorVersion, BuiltinActors, DomainSeparationTag, MessageInfo, Policy, Primitives,
    Runtime, Type, Verifier, EMPTY_ARR_CID,
};
use crate::test_blockstores::MemoryBlockstore;
use crate::{actor_error, ActorError, SendError};

lazy_static! {
    static ref V3: &'static BuiltinActors = BuiltinActors::for_version(ActorVersion::V3);
    pub static ref SYSTEM_ACTOR_CODE_ID: Cid = V3.system_code_id();
    pub static ref INIT_ACTOR_CODE_ID: Cid = V3.init_code_id();
    pub static ref CRON_ACTOR_CODE_ID: Cid = V3.cron_code_id();
    pub static ref ACCOUNT_ACTOR_CODE_ID: Cid = V3.account_code_id();
    pub static ref POWER_ACTOR_CODE_ID: Cid = V3.storage_power_code_id();
    pub static ref MINER_ACTOR_CODE_ID: Cid = V3.storage_miner_code_id();
    pub static ref MARKET_ACTOR_CODE_ID: Cid = V3.storage_market_code_id();
    pub static ref PAYCH_ACTOR_CODE_ID: Cid = V3.payment_channel_code_id();
    pub static ref MULTISIG_ACTOR_CODE_ID: Cid = V3.multisig_code_id();
    pub static ref REWARD_ACTOR_CODE_ID: Cid = V3.reward_code_id();
    pub static ref VERIFREG_ACTOR_CODE_ID: Cid = V3.verified_registry_code_id();
    pub static ref CALLER_TYPES_SIGNABLE: Vec<Type> = vec![Type::Account, Type::Multisig];
}

/// Installs a logger for tests. Safe to call repeatedly.
pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// Runtime double for actor unit tests. Every syscall an actor makes must have been
/// announced with an `expect_*` call; `verify` asserts that all of them were consumed.
pub struct MockRuntime {
    pub epoch: Cell<ChainEpoch>,
    pub network_version: Cell<NetworkVersion>,
    pub id_addresses: RefCell<HashMap<Address, ActorID>>,
    pub actor_code_cids: RefCell<HashMap<ActorID, Cid>>,
    pub new_actor_addr: RefCell<Option<Address>>,
    pub receiver: Address,
    pub caller: RefCell<Address>,
    pub caller_type: RefCell<Cid>,
    pub origin: RefCell<Address>,
    pub value_received: RefCell<TokenAmount>,
    pub hash_func: Box<dyn Fn(&[u8]) -> [u8; 32]>,

    // Actor State
    pub state: RefCell<Option<Cid>>,
    pub balance: RefCell<TokenAmount>,

    // VM Impl
    pub in_call: Cell<bool>,
    pub store: MemoryBlockstore,
    pub in_transaction: Cell<bool>,

    // Expectations
    pub expectations: RefCell<Expectations>,

    // policy
    pub policy: Policy,

    pub circulating_supply: RefCell<TokenAmount>,
}

#[derive(Default)]
pub struct Expectations {
    pub expect_validate_caller_any: bool,
    pub expect_validate_caller_addr: Option<Vec<Address>>,
    pub expect_validate_caller_type: Option<Vec<Type>>,
    pub expect_sends: VecDeque<ExpectedMessage>,
    pub expect_create_actor: Option<ExpectCreateActor>,
    pub expect_verify_sigs: VecDeque<ExpectedVerifySig>,
    pub expect_verify_seal: Option<ExpectVerifySeal>,
    pub expect_verify_post: Option<ExpectVerifyPoSt>,
    pub expect_aggregate_verify_seals: Option<ExpectAggregateVerifySeals>,
    pub expect_compute_unsealed_sector_cid: VecDeque<ExpectComputeUnsealedSectorCid>,
    pub expect_get_randomness_tickets: VecDeque<ExpectRandomness>,
    pub expect_get_randomness_beacon: VecDeque<ExpectRandomness>,
    pub expect_gas_charge: VecDeque<i64>,
}

impl Expectations {
    fn reset(&mut self) {
        *self = Default::default();
    }

    fn verify(&mut self) {
        assert!(!self.expect_validate_caller_any, "expected ValidateCallerAny, not received");
        assert!(
            self.expect_validate_caller_addr.is_none(),
            "expected ValidateCallerAddr {:?}, not received",
            self.expect_validate_caller_addr
        );
        assert!(
            self.expect_validate_caller_type.is_none(),
            "expected ValidateCallerType {:?}, not received",
            self.expect_validate_caller_type
        );
        assert!(
            self.expect_sends.is_empty(),
            "expected all message to be sent, unsent messages {:?}",
            self.expect_sends
        );
        assert!(
            self.expect_create_actor.is_none(),
            "expected actor to be created, uncreated actor: {:?}",
            self.expect_create_actor
        );
        assert!(
            self.expect_verify_sigs.is_empty(),
            "expect_verify_sigs: {:?}, not received",
            self.expect_verify_sigs
        );
        assert!(
            self.expect_verify_seal.is_none(),
            "expect_verify_seal {:?}, not received",
            self.expect_verify_seal
        );
        assert!(
            self.expect_verify_post.is_none(),
            "expect_verify_post {:?}, not received",
            self.expect_verify_post
        );
        assert!(
            self.expect_aggregate_verify_seals.is_none(),
            "expect_aggregate_verify_seals {:?}, not received",
            self.expect_aggregate_verify_seals
        );
        assert!(
            self.expect_compute_unsealed_sector_cid.is_empty(),
            "expect_compute_unsealed_sector_cid: {:?}, not received",
            self.expect_compute_unsealed_sector_cid
        );
        assert!(
            self.expect_get_randomness_tickets.is_empty(),
            "expect_get_randomness_tickets {:?}, not received",
            self.expect_get_randomness_tickets
        );
        assert!(
            self.expect_get_randomness_beacon.is_empty(),
            "expect_get_randomness_beacon {:?}, not received",
            self.expect_get_randomness_beacon
        );
        assert!(
            self.expect_gas_charge.is_empty(),
            "expect_gas_charge {:?}, not received",
            self.expect_gas_charge
        );
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            epoch: Cell::new(0),
            network_version: Cell::new(NetworkVersion::V10),
            id_addresses: Default::default(),
            actor_code_cids: Default::default(),
            new_actor_addr: Default::default(),
            receiver: Address::new_id(0),
            caller: RefCell::new(Address::new_id(0)),
            caller_type: RefCell::new(*EMPTY_ARR_CID),
            origin: RefCell::new(Address::new_id(0)),
            value_received: Default::default(),
            hash_func: Box::new(blake2b_256),
            state: Default::default(),
            balance: Default::default(),
            in_call: Default::default(),
            store: MemoryBlockstore::new(),
            in_transaction: Default::default(),
            expectations: Default::default(),
            policy: Default::default(),
            circulating_supply: Default::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExpectCreateActor {
    pub code_id: Cid,
    pub actor_id: ActorID,
}

#[derive(Clone, Debug)]
pub struct ExpectedMessage {
    pub to: Address,
    pub method: MethodNum,
    pub params: Option<IpldBlock>,
    pub value: TokenAmount,

    // returns from applying expectedMessage
    pub send_return: Option<IpldBlock>,
    pub exit_code: ExitCode,
}

#[derive(Debug)]
pub struct ExpectedVerifySig {
    pub sig: Signature,
    pub signer: Address,
    pub plaintext: Vec<u8>,
    pub result: bool,
}

#[derive(Clone, Debug)]
pub struct ExpectVerifySeal {
    seal: SealVerifyInfo,
    result: bool,
}

#[derive(Clone, Debug)]
pub struct ExpectVerifyPoSt {
    post: WindowPoStVerifyInfo,
    result: bool,
}

#[derive(Clone, Debug)]
pub struct ExpectAggregateVerifySeals {
    in_svis: usize,
    in_proof: Vec<u8>,
    result: bool,
}

#[derive(Clone, Debug)]
pub struct ExpectComputeUnsealedSectorCid {
    reg: RegisteredSealProof,
    pieces: Vec<PieceInfo>,
    cid: Cid,
    exit_code: ExitCode,
}

#[derive(Clone, Debug)]
pub struct ExpectRandomness {
    tag: DomainSeparationTag,
    epoch: ChainEpoch,
    entropy: Vec<u8>,
    out: [u8; RANDOMNESS_LENGTH],
}

pub fn expect_empty(res: Option<IpldBlock>) {
    assert!(res.is_none(), "expected no return value, got {:?}", res);
}

pub fn expect_abort_contains_message<T: fmt::Debug>(
    expect_exit_code: ExitCode,
    expect_msg: &str,
    res: Result<T, ActorError>,
) {
    let err = res.expect_err(&format!(
        "expected abort with exit code {}, but call succeeded",
        expect_exit_code
    ));
    assert_eq!(
        err.exit_code(),
        expect_exit_code,
        "expected failure with exit code {}, but failed with exit code {}; error message: {}",
        expect_exit_code,
        err.exit_code(),
        err.msg(),
    );
    assert!(
        err.msg().contains(expect_msg),
        "expected err message '{}' to contain '{}'",
        err.msg(),
        expect_msg,
    );
}

pub fn expect_abort<T: fmt::Debug>(exit_code: ExitCode, res: Result<T, ActorError>) {
    expect_abort_contains_message(exit_code, "", res);
}

impl MockRuntime {
    pub fn new(receiver: Address) -> Self {
        MockRuntime { receiver, ..Default::default() }
    }

    ///// Runtime access for tests /////

    pub fn get_state<T: DeserializeOwned>(&self) -> T {
        let root = self.state.borrow().expect("state not constructed");
        self.store.get_cbor(&root).unwrap().unwrap()
    }

    pub fn replace_state<T: Serialize>(&self, obj: &T) {
        *self.state.borrow_mut() = Some(self.store.put_cbor(obj, Code::Blake2b256).unwrap());
    }

    pub fn set_balance(&self, amount: TokenAmount) {
        *self.balance.borrow_mut() = amount;
    }

    pub fn add_balance(&self, amount: TokenAmount) {
        *self.balance.borrow_mut() += amount;
    }

    pub fn get_balance(&self) -> TokenAmount {
        self.balance.borrow().clone()
    }

    pub fn set_value(&self, value: TokenAmount) {
        *self.value_received.borrow_mut() = value;
    }

    /// Sets the immediate caller and registers its code so that type checks find it.
    pub fn set_caller(&self, code_id: Cid, address: Address) {
        *self.caller.borrow_mut() = address;
        *self.caller_type.borrow_mut() = code_id;
        if let Ok(id) = address.id() {
            self.actor_code_cids.borrow_mut().insert(id, code_id);
        }
    }

    pub fn set_address_actor_type(&self, address: Address, actor_type: Cid) {
        if let Ok(id) = address.id() {
            self.actor_code_cids.borrow_mut().insert(id, actor_type);
        }
    }

    pub fn add_id_address(&self, source: Address, target: Address) {
        assert_eq!(target.protocol(), Protocol::ID, "target must use ID address protocol");
        self.id_addresses.borrow_mut().insert(source, target.id().unwrap());
    }

    pub fn set_new_actor_address(&self, addr: Address) {
        *self.new_actor_addr.borrow_mut() = Some(addr);
    }

    pub fn set_circulating_supply(&self, circ_supply: TokenAmount) {
        *self.circulating_supply.borrow_mut() = circ_supply;
    }

    pub fn set_epoch(&self, epoch: ChainEpoch) {
        self.epoch.set(epoch);
    }

    pub fn set_network_version(&self, nv: NetworkVersion) {
        self.network_version.set(nv);
    }

    /// Invokes a method on actor `A`. State written by a failed call is discarded.
    pub fn call<A: ActorCode>(
        &self,
        method_num: MethodNum,
        params: Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError> {
        self.in_call.set(true);
        let prev_state = *self.state.borrow();
        let prev_balance = self.balance.borrow().clone();
        let res = A::invoke_method(self, method_num, params);

        if res.is_err() {
            *self.state.borrow_mut() = prev_state;
            *self.balance.borrow_mut() = prev_balance;
        }
        self.in_call.set(false);
        res
    }

    /// Verifies that all mock expectations have been met.
    pub fn verify(&self) {
        self.expectations.borrow_mut().verify()
    }

    /// Clears all mock expectations.
    pub fn reset(&self) {
        self.expectations.borrow_mut().reset();
    }

    ///// Mock expectations /////

    pub fn expect_validate_caller_addr(&self, addr: Vec<Address>) {
        assert!(!addr.is_empty(), "addrs must be non-empty");
        self.expectations.borrow_mut().expect_validate_caller_addr = Some(addr);
    }

    pub fn expect_validate_caller_type(&self, types: Vec<Type>) {
        assert!(!types.is_empty(), "types must be non-empty");
        self.expectations.borrow_mut().expect_validate_caller_type = Some(types);
    }

    pub fn expect_validate_caller_any(&self) {
        self.expectations.borrow_mut().expect_validate_caller_any = true;
    }

    pub fn expect_verify_signature(&self, exp: ExpectedVerifySig) {
        self.expectations.borrow_mut().expect_verify_sigs.push_back(exp);
    }

    pub fn expect_compute_unsealed_sector_cid(
        &self,
        reg: RegisteredSealProof,
        pieces: Vec<PieceInfo>,
        cid: Cid,
        exit_code: ExitCode,
    ) {
        let exp = ExpectComputeUnsealedSectorCid { reg, pieces, cid, exit_code };
        self.expectations.borrow_mut().expect_compute_unsealed_sector_cid.push_back(exp);
    }

    pub fn expect_send(
        &self,
        to: Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
        send_return: Option<IpldBlock>,
        exit_code: ExitCode,
    ) {
        self.expectations.borrow_mut().expect_sends.push_back(ExpectedMessage {
            to,
            method,
            params,
            value,
            send_return,
            exit_code,
        })
    }

    pub fn expect_create_actor(&self, code_id: Cid, actor_id: ActorID) {
        let a = ExpectCreateActor { code_id, actor_id };
        self.expectations.borrow_mut().expect_create_actor = Some(a);
    }

    pub fn expect_verify_seal(&self, seal: SealVerifyInfo, result: bool) {
        self.expectations.borrow_mut().expect_verify_seal = Some(ExpectVerifySeal { seal, result });
    }

    pub fn expect_verify_post(&self, post: WindowPoStVerifyInfo, result: bool) {
        self.expectations.borrow_mut().expect_verify_post = Some(ExpectVerifyPoSt { post, result });
    }

    pub fn expect_aggregate_verify_seals(&self, in_svis: usize, in_proof: Vec<u8>, result: bool) {
        let a = ExpectAggregateVerifySeals { in_svis, in_proof, result };
        self.expectations.borrow_mut().expect_aggregate_verify_seals = Some(a);
    }

    pub fn expect_get_randomness_from_tickets(
        &self,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: Vec<u8>,
        out: [u8; RANDOMNESS_LENGTH],
    ) {
        let a = ExpectRandomness { tag, epoch, entropy, out };
        self.expectations.borrow_mut().expect_get_randomness_tickets.push_back(a);
    }

    pub fn expect_get_randomness_from_beacon(
        &self,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: Vec<u8>,
        out: [u8; RANDOMNESS_LENGTH],
    ) {
        let a = ExpectRandomness { tag, epoch, entropy, out };
        self.expectations.borrow_mut().expect_get_randomness_beacon.push_back(a);
    }

    pub fn expect_gas_charge(&self, value: i64) {
        self.expectations.borrow_mut().expect_gas_charge.push_back(value);
    }

    ///// Private helpers /////

    fn require_in_call(&self) {
        assert!(self.in_call.get(), "invalid runtime invocation outside of method call")
    }

    fn check_randomness(
        &self,
        expected: ExpectRandomness,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: &[u8],
    ) -> [u8; RANDOMNESS_LENGTH] {
        assert!(epoch <= self.epoch.get(), "attempt to get randomness from future");
        assert_eq!(
            expected.tag, tag,
            "unexpected domain separation tag, expected: {:?}, actual: {:?}",
            expected.tag, tag
        );
        assert_eq!(
            expected.epoch, epoch,
            "unexpected epoch, expected: {:?}, actual: {:?}",
            expected.epoch, epoch
        );
        assert_eq!(
            expected.entropy, *entropy,
            "unexpected entropy, expected {:?}, actual: {:?}",
            expected.entropy, entropy
        );
        expected.out
    }
}

impl MessageInfo for MockRuntime {
    fn caller(&self) -> Address {
        *self.caller.borrow()
    }
    fn origin(&self) -> Address {
        *self.origin.borrow()
    }
    fn receiver(&self) -> Address {
        self.receiver
    }
    fn value_received(&self) -> TokenAmount {
        self.value_received.borrow().clone()
    }
}

impl Runtime for MockRuntime {
    type Blockstore = MemoryBlockstore;

    fn network_version(&self) -> NetworkVersion {
        self.network_version.get()
    }

    fn message(&self) -> &dyn MessageInfo {
        self.require_in_call();
        self
    }

    fn curr_epoch(&self) -> ChainEpoch {
        self.require_in_call();
        self.epoch.get()
    }

    fn policy(&self) -> &Policy {
        &self.policy
    }

    fn validate_immediate_caller_accept_any(&self) -> Result<(), ActorError> {
        self.require_in_call();
        let mut exp = self.expectations.borrow_mut();
        assert!(exp.expect_validate_caller_any, "unexpected validate-caller-any");
        exp.expect_validate_caller_any = false;
        Ok(())
    }

    fn validate_immediate_caller_is<'a, I>(&self, addresses: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        self.require_in_call();

        let addrs: Vec<Address> = addresses.into_iter().cloned().collect();

        let expected_addrs = self
            .expectations
            .borrow_mut()
            .expect_validate_caller_addr
            .take()
            .expect("unexpected validate caller addrs");
        assert_eq!(
            &addrs, &expected_addrs,
            "unexpected validate caller addrs {:?}, expected {:?}",
            addrs, expected_addrs
        );

        let caller = self.caller();
        if addrs.contains(&caller) {
            return Ok(());
        }
        Err(actor_error!(forbidden;
                "caller address {:?} forbidden, allowed: {:?}",
                caller, &addrs
        ))
    }

    fn validate_immediate_caller_type<'a, I>(&self, types: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Type>,
    {
        self.require_in_call();
        let types: Vec<Type> = types.into_iter().cloned().collect();
        let expected_caller_type = self
            .expectations
            .borrow_mut()
            .expect_validate_caller_type
            .take()
            .expect("unexpected validate caller code");
        assert_eq!(
            &types, &expected_caller_type,
            "unexpected validate caller code {:?}, expected {:?}",
            types, expected_caller_type,
        );

        let caller_type = *self.caller_type.borrow();
        match self.resolve_builtin_actor_type(&caller_type) {
            Some(t) if types.contains(&t) => Ok(()),
            _ => Err(actor_error!(forbidden; "caller type {:?} forbidden, allowed: {:?}",
                caller_type, types)),
        }
    }

    fn current_balance(&self) -> TokenAmount {
        self.require_in_call();
        self.balance.borrow().clone()
    }

    fn actor_balance(&self, id: ActorID) -> Option<TokenAmount> {
        (self.receiver.id().ok() == Some(id)).then(|| self.balance.borrow().clone())
    }

    fn resolve_address(&self, address: &Address) -> Option<ActorID> {
        if let Ok(id) = address.id() {
            return Some(id);
        }
        self.id_addresses.borrow().get(address).copied()
    }

    fn get_actor_code_cid(&self, id: &ActorID) -> Option<Cid> {
        self.actor_code_cids.borrow().get(id).cloned()
    }

    fn get_randomness_from_tickets(
        &self,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError> {
        let expected = self
            .expectations
            .borrow_mut()
            .expect_get_randomness_tickets
            .pop_front()
            .expect("unexpected call to get_randomness_from_tickets");
        Ok(self.check_randomness(expected, tag, epoch, entropy))
    }

    fn get_randomness_from_beacon(
        &self,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError> {
        let expected = self
            .expectations
            .borrow_mut()
            .expect_get_randomness_beacon
            .pop_front()
            .expect("unexpected call to get_randomness_from_beacon");
        Ok(self.check_randomness(expected, tag, epoch, entropy))
    }

    fn get_state_root(&self) -> Result<Cid, ActorError> {
        Ok(self.state.borrow().unwrap_or(*EMPTY_ARR_CID))
    }

    fn set_state_root(&self, root: &Cid) -> Result<(), ActorError> {
        *self.state.borrow_mut() = Some(*root);
        Ok(())
    }

    fn transaction<S, RT, F>(&self, f: F) -> Result<RT, ActorError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce(&mut S, &Self) -> Result<RT, ActorError>,
    {
        if self.in_transaction.get() {
            return Err(actor_error!(assertion_failed; "nested transaction"));
        }
        let mut read_only = self.state()?;
        self.in_transaction.set(true);
        let ret = f(&mut read_only, self);
        if ret.is_ok() {
            self.replace_state(&read_only);
        }
        self.in_transaction.set(false);
        ret
    }

    fn store(&self) -> &MemoryBlockstore {
        &self.store
    }

    fn send(
        &self,
        to: &Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    ) -> Result<Response, SendError> {
        self.require_in_call();
        if self.in_transaction.get() {
            return Err(SendError("side-effect within transaction".to_string()));
        }

        let expected_msg = self.expectations.borrow_mut().expect_sends.pop_front();
        let expected_msg = expected_msg.unwrap_or_else(|| {
            panic!(
                "unexpected message to: {:?} method: {:?}, value: {:?}, params: {:?}",
                to, method, value, params
            )
        });

        assert!(
            expected_msg.to == *to
                && expected_msg.method == method
                && expected_msg.params == params
                && expected_msg.value == value,
            "message being sent does not match expectation.\n\
             Message  - to: {:?}, method: {:?}, value: {:?}, params: {:?}\n\
             Expected - to: {:?}, method: {:?}, value: {:?}, params: {:?}",
            to,
            method,
            value,
            params,
            expected_msg.to,
            expected_msg.method,
            expected_msg.value,
            expected_msg.params,
        );

        {
            let mut balance = self.balance.borrow_mut();
            if value > *balance {
                return Err(SendError(format!(
                    "cannot send value: {:?} exceeds balance: {:?}",
                    value, *balance
                )));
            }
            // A failed callee keeps nothing it was sent.
            if expected_msg.exit_code.is_success() {
                *balance -= value;
            }
        }

        Ok(Response { exit_code: expected_msg.exit_code, return_data: expected_msg.send_return })
    }

    fn new_actor_address(&self) -> Result<Address, ActorError> {
        self.require_in_call();
        let ret = self.new_actor_addr.borrow_mut().take();
        Ok(ret.expect("unexpected call to new actor address"))
    }

    fn create_actor(&self, code_id: Cid, actor_id: ActorID) -> Result<(), ActorError> {
        self.require_in_call();
        if self.in_transaction.get() {
            return Err(actor_error!(assertion_failed; "side-effect within transaction"));
        }
        let expect_create_actor = self
            .expectations
            .borrow_mut()
            .expect_create_actor
            .take()
            .expect("unexpected call to create actor");

        assert!(
            expect_create_actor.code_id == code_id && expect_create_actor.actor_id == actor_id,
            "unexpected actor being created, expected code: {:?} id: {:?}, actual code: {:?} id: {:?}",
            expect_create_actor.code_id,
            expect_create_actor.actor_id,
            code_id,
            actor_id
        );
        self.actor_code_cids.borrow_mut().insert(actor_id, code_id);
        Ok(())
    }

    fn total_fil_circ_supply(&self) -> TokenAmount {
        self.circulating_supply.borrow().clone()
    }

    fn charge_gas(&self, _: &'static str, value: i64) {
        let mut exs = self.expectations.borrow_mut();
        // Gas is only checked when a test asks for it.
        if let Some(expected) = exs.expect_gas_charge.pop_front() {
            assert_eq!(expected, value, "expected gas charge {:?}, actual {:?}", expected, value);
        }
    }
}

impl Primitives for MockRuntime {
    fn verify_signature(&self, signature: &Signature, signer: &Address, plaintext: &[u8]) -> bool {
        let exp = self.expectations.borrow_mut().expect_verify_sigs.pop_front();
        let exp = exp.unwrap_or_else(|| {
            panic!(
                "unexpected signature verification sig: {:?}, signer: {}, plaintext: {}",
                signature,
                signer,
                hex::encode(plaintext)
            )
        });
        if exp.sig != *signature || exp.signer != *signer || exp.plaintext[..] != *plaintext {
            panic!(
                "unexpected signature verification\n\
                sig: {:?}, signer: {}, plaintext: {}\n\
                expected sig: {:?}, signer: {}, plaintext: {}",
                signature,
                signer,
                hex::encode(plaintext),
                exp.sig,
                exp.signer,
                hex::encode(exp.plaintext)
            )
        }
        exp.result
    }

    fn hash_blake2b(&self, data: &[u8]) -> [u8; 32] {
        (*self.hash_func)(data)
    }

    fn compute_unsealed_sector_cid(
        &self,
        reg: RegisteredSealProof,
        pieces: &[PieceInfo],
    ) -> anyhow::Result<Cid> {
        let exp = self
            .expectations
            .borrow_mut()
            .expect_compute_unsealed_sector_cid
            .pop_front()
            .expect("unexpected syscall to ComputeUnsealedSectorCID");

        assert_eq!(exp.reg, reg, "unexpected compute_unsealed_sector_cid: reg mismatch");
        assert!(
            exp.pieces[..].eq(pieces),
            "unexpected compute_unsealed_sector_cid: pieces mismatch"
        );

        if exp.exit_code != ExitCode::OK {
            return Err(anyhow!(ActorError::unchecked(
                exp.exit_code,
                "expected failure".to_string(),
            )));
        }
        Ok(exp.cid)
    }
}

impl Verifier for MockRuntime {
    fn verify_seal(&self, seal: &SealVerifyInfo) -> bool {
        let exp = self
            .expectations
            .borrow_mut()
            .expect_verify_seal
            .take()
            .expect("unexpected syscall to verify seal");
        assert_eq!(exp.seal, *seal, "unexpected seal verification");
        exp.result
    }

    fn verify_post(&self, post: &WindowPoStVerifyInfo) -> bool {
        let exp = self
            .expectations
            .borrow_mut()
            .expect_verify_post
            .take()
            .expect("unexpected syscall to verify PoSt");
        assert_eq!(exp.post, *post, "unexpected PoSt verification");
        exp.result
    }

    fn verify_aggregate_seals(&self, aggregate: &AggregateSealVerifyProofAndInfos) -> bool {
        let exp = self
            .expectations
            .borrow_mut()
            .expect_aggregate_verify_seals
            .take()
            .expect("unexpected call to verify aggregate seals");
        assert_eq!(exp.in_svis, aggregate.infos.len(), "length mismatch");
        assert_eq!(exp.in_proof, aggregate.proof, "proof mismatch");
        exp.result
    }
}

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_simd::Params::new()
        .hash_length(32)
        .to_state()
        .update(data)
        .finalize()
        .as_bytes()
        .try_into()
        .unwrap()
}

/// A well-formed unsealed commitment CID derived from `input`.
pub fn make_piece_cid(input: &[u8]) -> Cid {
    data_commitment_v1_to_cid(&blake2b_256(input)).unwrap()
}

/// A well-formed sealed commitment CID derived from `input`.
pub fn make_sealed_cid(input: &[u8]) -> Cid {
    replica_commitment_v1_to_cid(&blake2b_256(input)).unwrap()
}

pub fn new_bls_addr(s: u8) -> Address {
    let seed = [s; 32];
    let mut rng: StdRng = SeedableRng::from_seed(seed);
    let mut key = [0u8; 48];
    rng.fill_bytes(&mut key);
    Address::new_bls(&key).unwrap()
}
