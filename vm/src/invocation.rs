// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::{Cell, RefCell};

use cid::Cid;
use fc_actor_account::Actor as AccountActor;
use fc_actor_cron::Actor as CronActor;
use fc_actor_init::{Actor as InitActor, State as InitState};
use fc_actor_market::Actor as MarketActor;
use fc_actor_miner::Actor as MinerActor;
use fc_actor_multisig::Actor as MultisigActor;
use fc_actor_power::Actor as PowerActor;
use fc_actor_reward::Actor as RewardActor;
use fc_actor_system::Actor as SystemActor;
use fc_actors_runtime::runtime::builtins::Type;
use fc_actors_runtime::runtime::{
    draw_randomness, resolve_builtin, ActorCode, ActorVersion, BuiltinActors, DomainSeparationTag,
    MessageInfo, Policy, Primitives, Runtime, Verifier, EMPTY_ARR_CID,
};
use fc_actors_runtime::{actor_error, ActorError, SendError, INIT_ACTOR_ID, SYSTEM_ACTOR_ID};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::{CborStore, DAG_CBOR};
use fvm_shared::address::{Address, Protocol};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::piece::PieceInfo;
use fvm_shared::randomness::RANDOMNESS_LENGTH;
use fvm_shared::sector::{
    AggregateSealVerifyProofAndInfos, RegisteredSealProof, SealVerifyInfo, WindowPoStVerifyInfo,
};
use fvm_shared::version::NetworkVersion;
use fvm_shared::{ActorID, MethodNum, Response, METHOD_CONSTRUCTOR, METHOD_SEND};
use log::{debug, trace};
use multihash::Code;
use num_traits::Zero;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::externs::{ProofVerifier, Rand, SignatureVerifier};
use crate::gas::{GasBlockstore, GasCharge, GasTracker, PriceList};
use crate::state_tree::Actor;
use crate::{blake2b_256, VM};

/// Context shared by every invocation of one top-level message.
pub(crate) struct TopCtx<'a> {
    pub gas: &'a RefCell<GasTracker>,
    pub price_list: &'a PriceList,
    pub network_version: NetworkVersion,
    pub origin: ActorID,
    /// Key or actor address of the origin, stable across re-orgs.
    pub origin_stable: Address,
    pub nonce: u64,
    pub new_actor_addr_count: Cell<u64>,
    pub circ_supply: TokenAmount,
}

impl<'a> TopCtx<'a> {
    fn charge(&self, charge: GasCharge) -> Result<(), ActorError> {
        self.gas.borrow_mut().charge(charge)
    }

    fn gas_store<BS>(&self, store: &'a BS) -> GasBlockstore<'a, BS> {
        GasBlockstore { store, gas: self.gas, price_list: self.price_list }
    }

    fn builtin_actors(&self) -> &'static BuiltinActors {
        BuiltinActors::for_version(ActorVersion::for_network(self.network_version))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct InternalMessage {
    pub from: ActorID,
    pub to: Address,
    pub value: TokenAmount,
    pub method: MethodNum,
    pub params: Option<IpldBlock>,
}

/// Runs one message between actors, from value transfer through method dispatch.
/// All state changes made by a failing invocation are reverted.
pub(crate) fn execute<'a, 'bs, BS: Blockstore>(
    vm: &'a VM<'bs, BS>,
    top: &'a TopCtx<'a>,
    msg: InternalMessage,
) -> Result<Option<IpldBlock>, ActorError> {
    top.charge(top.price_list.on_method_invocation(&msg.value, msg.method))?;
    let snapshot = vm.snapshot()?;
    let res = invoke(vm, top, msg);
    if let Err(e) = &res {
        trace!("invocation failed with {:?}, reverting: {}", e.exit_code(), e.msg());
        vm.restore(&snapshot)?;
    }
    res
}

fn invoke<'a, 'bs, BS: Blockstore>(
    vm: &'a VM<'bs, BS>,
    top: &'a TopCtx<'a>,
    msg: InternalMessage,
) -> Result<Option<IpldBlock>, ActorError> {
    let to = resolve_target(vm, top, &msg.to)?;
    transfer(vm, msg.from, to, &msg.value)?;
    if msg.method == METHOD_SEND {
        return Ok(None);
    }

    let code = vm
        .actor_by_id(to)?
        .ok_or_else(|| {
            ActorError::unchecked(ExitCode::SYS_INVALID_RECEIVER, format!("no actor at {}", to))
        })?
        .code;
    let typ = resolve_builtin(&code).map(|(_, t)| t).ok_or_else(|| {
        ActorError::unchecked(ExitCode::SYS_INVALID_RECEIVER, format!("unknown code {}", code))
    })?;

    debug!("invoking {:?} method {} on {} from {}", typ, msg.method, to, msg.from);
    let method = msg.method;
    let params = msg.params.clone();
    let ctx = InvocationCtx::new(vm, top, msg, to);
    let res = match typ {
        Type::System => SystemActor::invoke_method(&ctx, method, params),
        Type::Init => InitActor::invoke_method(&ctx, method, params),
        Type::Cron => CronActor::invoke_method(&ctx, method, params),
        Type::Account => AccountActor::invoke_method(&ctx, method, params),
        Type::Power => PowerActor::invoke_method(&ctx, method, params),
        Type::Miner => MinerActor::invoke_method(&ctx, method, params),
        Type::Market => MarketActor::invoke_method(&ctx, method, params),
        Type::Multisig => MultisigActor::invoke_method(&ctx, method, params),
        Type::Reward => RewardActor::invoke_method(&ctx, method, params),
        Type::PaymentChannel | Type::VerifiedRegistry => Err(ActorError::unchecked(
            ExitCode::SYS_INVALID_RECEIVER,
            format!("{:?} actors cannot be invoked", typ),
        )),
    };
    match res {
        Ok(_) if !ctx.caller_validated.get() => Err(ActorError::unchecked(
            ExitCode::SYS_ASSERTION_FAILED,
            format!("{:?} method {} did not validate its caller", typ, method),
        )),
        res => res,
    }
}

/// Resolves the receiver to an ID, creating an account actor for an unknown key address.
fn resolve_target<'a, 'bs, BS: Blockstore>(
    vm: &'a VM<'bs, BS>,
    top: &'a TopCtx<'a>,
    target: &Address,
) -> Result<ActorID, ActorError> {
    if let Some(id) = vm.resolve_id(target)? {
        if vm.actor_by_id(id)?.is_some() {
            return Ok(id);
        }
    }

    if !matches!(target.protocol(), Protocol::BLS | Protocol::Secp256k1) {
        return Err(ActorError::unchecked(
            ExitCode::SYS_INVALID_RECEIVER,
            format!("cannot create account for address {} type {}", target, target.protocol()),
        ));
    }

    let store = top.gas_store(vm.store);
    let mut init = vm
        .actor_by_id(INIT_ACTOR_ID)?
        .ok_or_else(|| actor_error!(illegal_state; "init actor not found"))?;
    let mut st: InitState = store
        .get_cbor(&init.head)
        .map_err(|e| actor_error!(illegal_state; "failed to load init state: {}", e))?
        .ok_or_else(|| actor_error!(illegal_state; "init state {} not found", init.head))?;
    let id = st.map_address_to_new_id(&store, target)?;
    init.head = store
        .put_cbor(&st, Code::Blake2b256)
        .map_err(|e| actor_error!(illegal_state; "failed to store init state: {}", e))?;
    vm.set_actor_by_id(INIT_ACTOR_ID, init)?;

    top.charge(top.price_list.on_create_actor())?;
    let code = top.builtin_actors().account_code_id();
    vm.set_actor_by_id(id, Actor::new(code, *EMPTY_ARR_CID, 0, TokenAmount::zero()))?;
    debug!("created account {} for {}", id, target);

    execute(
        vm,
        top,
        InternalMessage {
            from: SYSTEM_ACTOR_ID,
            to: Address::new_id(id),
            value: TokenAmount::zero(),
            method: METHOD_CONSTRUCTOR,
            params: IpldBlock::serialize_cbor(target)?,
        },
    )?;
    Ok(id)
}

fn transfer<BS: Blockstore>(
    vm: &VM<'_, BS>,
    from: ActorID,
    to: ActorID,
    value: &TokenAmount,
) -> Result<(), ActorError> {
    if value.is_negative() {
        return Err(ActorError::unchecked(
            ExitCode::SYS_ASSERTION_FAILED,
            format!("attempt to transfer negative value {}", value),
        ));
    }
    if value.is_zero() {
        return Ok(());
    }
    let mut sender = vm.actor_by_id(from)?.ok_or_else(|| {
        ActorError::unchecked(ExitCode::SYS_SENDER_INVALID, format!("sender {} not found", from))
    })?;
    if &sender.balance < value {
        return Err(ActorError::unchecked(
            ExitCode::SYS_INSUFFICIENT_FUNDS,
            format!("sender {} balance {} below transfer {}", from, sender.balance, value),
        ));
    }
    // Debit before loading the receiver so that a self-send nets to zero.
    sender.balance -= value;
    vm.set_actor_by_id(from, sender)?;

    let mut receiver = vm.actor_by_id(to)?.ok_or_else(|| {
        ActorError::unchecked(ExitCode::SYS_INVALID_RECEIVER, format!("receiver {} not found", to))
    })?;
    receiver.balance += value;
    vm.set_actor_by_id(to, receiver)
}

/// The runtime seen by one actor method invocation.
pub(crate) struct InvocationCtx<'a, 'bs, BS: Blockstore> {
    vm: &'a VM<'bs, BS>,
    top: &'a TopCtx<'a>,
    msg: InternalMessage,
    receiver: ActorID,
    store: GasBlockstore<'a, BS>,
    allow_side_effects: Cell<bool>,
    caller_validated: Cell<bool>,
}

impl<'a, 'bs, BS: Blockstore> InvocationCtx<'a, 'bs, BS> {
    fn new(
        vm: &'a VM<'bs, BS>,
        top: &'a TopCtx<'a>,
        msg: InternalMessage,
        receiver: ActorID,
    ) -> Self {
        Self {
            vm,
            top,
            msg,
            receiver,
            store: top.gas_store(vm.store),
            allow_side_effects: Cell::new(true),
            caller_validated: Cell::new(false),
        }
    }

    fn validate_once(&self) -> Result<(), ActorError> {
        if self.caller_validated.replace(true) {
            return Err(ActorError::unchecked(
                ExitCode::SYS_ASSERTION_FAILED,
                "caller double validated".to_string(),
            ));
        }
        Ok(())
    }

    fn receiver_actor(&self) -> Result<Actor, ActorError> {
        self.vm.actor_by_id(self.receiver)?.ok_or_else(|| {
            ActorError::unchecked(
                ExitCode::SYS_ASSERTION_FAILED,
                format!("receiver {} does not exist", self.receiver),
            )
        })
    }

    fn charge_quietly(&self, charge: GasCharge) {
        // Exhaustion is sticky and surfaces at the end of the message.
        let _ = self.top.charge(charge);
    }

    /// Resolves a signer to the key address behind it.
    fn signing_key(&self, signer: &Address) -> Option<Address> {
        match signer.protocol() {
            Protocol::BLS | Protocol::Secp256k1 => Some(*signer),
            _ => {
                let id = self.resolve_address(signer)?;
                let code = self.get_actor_code_cid(&id)?;
                if self.resolve_builtin_actor_type(&code) != Some(Type::Account) {
                    return None;
                }
                let st: fc_actor_account::State = self.vm.get_state_by_id(id).ok().flatten()?;
                Some(st.address)
            }
        }
    }

    fn randomness(
        &self,
        base: anyhow::Result<[u8; RANDOMNESS_LENGTH]>,
        personalization: DomainSeparationTag,
        rand_epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError> {
        let base = base.map_err(|e| {
            actor_error!(illegal_argument; "failed to get randomness for epoch {}: {}", rand_epoch, e)
        })?;
        Ok(draw_randomness(blake2b_256, &base, personalization, rand_epoch, entropy))
    }
}

impl<BS: Blockstore> MessageInfo for InvocationCtx<'_, '_, BS> {
    fn caller(&self) -> Address {
        Address::new_id(self.msg.from)
    }

    fn origin(&self) -> Address {
        Address::new_id(self.top.origin)
    }

    fn receiver(&self) -> Address {
        Address::new_id(self.receiver)
    }

    fn value_received(&self) -> TokenAmount {
        self.msg.value.clone()
    }
}

impl<'a, 'bs, BS: Blockstore> Runtime for InvocationCtx<'a, 'bs, BS> {
    type Blockstore = GasBlockstore<'a, BS>;

    fn network_version(&self) -> NetworkVersion {
        self.top.network_version
    }

    fn message(&self) -> &dyn MessageInfo {
        self
    }

    fn curr_epoch(&self) -> ChainEpoch {
        self.vm.epoch()
    }

    fn policy(&self) -> &Policy {
        &self.vm.config.policy
    }

    fn validate_immediate_caller_accept_any(&self) -> Result<(), ActorError> {
        self.validate_once()
    }

    fn validate_immediate_caller_is<'b, I>(&self, addresses: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'b Address>,
    {
        self.validate_once()?;
        let caller = self.message().caller();
        if addresses.into_iter().any(|a| *a == caller) {
            return Ok(());
        }
        Err(actor_error!(forbidden; "caller {} is not one of the supported", caller))
    }

    fn validate_immediate_caller_type<'b, I>(&self, types: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'b Type>,
    {
        self.validate_once()?;
        let caller_type = self
            .get_actor_code_cid(&self.msg.from)
            .and_then(|code| self.resolve_builtin_actor_type(&code));
        match caller_type {
            Some(t) if types.into_iter().any(|allowed| *allowed == t) => Ok(()),
            _ => Err(actor_error!(forbidden;
                "caller {} of type {:?} is not of a supported type", self.msg.from, caller_type)),
        }
    }

    fn current_balance(&self) -> TokenAmount {
        self.actor_balance(self.receiver).unwrap_or_else(TokenAmount::zero)
    }

    fn actor_balance(&self, id: ActorID) -> Option<TokenAmount> {
        self.vm.actor_by_id(id).ok().flatten().map(|a| a.balance)
    }

    fn resolve_address(&self, address: &Address) -> Option<ActorID> {
        self.vm.resolve_id(address).ok().flatten()
    }

    fn get_actor_code_cid(&self, id: &ActorID) -> Option<Cid> {
        self.vm.actor_by_id(*id).ok().flatten().map(|a| a.code)
    }

    /// Actors keep the code they were created with, so callers of any generation resolve.
    fn resolve_builtin_actor_type(&self, code_id: &Cid) -> Option<Type> {
        resolve_builtin(code_id).map(|(_, t)| t)
    }

    fn get_randomness_from_tickets(
        &self,
        personalization: DomainSeparationTag,
        rand_epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError> {
        let base = self.vm.externs.ticket_randomness(rand_epoch);
        self.randomness(base, personalization, rand_epoch, entropy)
    }

    fn get_randomness_from_beacon(
        &self,
        personalization: DomainSeparationTag,
        rand_epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError> {
        let base = self.vm.externs.beacon_randomness(rand_epoch);
        self.randomness(base, personalization, rand_epoch, entropy)
    }

    fn get_state_root(&self) -> Result<Cid, ActorError> {
        Ok(self.receiver_actor()?.head)
    }

    fn set_state_root(&self, root: &Cid) -> Result<(), ActorError> {
        let mut actor = self.receiver_actor()?;
        actor.head = *root;
        self.vm.set_actor_by_id(self.receiver, actor)
    }

    fn transaction<S, RT, F>(&self, f: F) -> Result<RT, ActorError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce(&mut S, &Self) -> Result<RT, ActorError>,
    {
        let mut st: S = self.state()?;
        self.allow_side_effects.set(false);
        let result = f(&mut st, self);
        self.allow_side_effects.set(true);
        let ret = result?;
        let root = self
            .store
            .put_cbor(&st, Code::Blake2b256)
            .map_err(|e| actor_error!(illegal_state; "failed to write state: {}", e))?;
        self.set_state_root(&root)?;
        Ok(ret)
    }

    fn store(&self) -> &GasBlockstore<'a, BS> {
        &self.store
    }

    fn send(
        &self,
        to: &Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    ) -> Result<Response, SendError> {
        if !self.allow_side_effects.get() {
            return Err(SendError(format!(
                "actor {} cannot send to {} inside a state transaction",
                self.receiver, to
            )));
        }
        let msg = InternalMessage { from: self.receiver, to: *to, value, method, params };
        Ok(match execute(self.vm, self.top, msg) {
            Ok(return_data) => Response { exit_code: ExitCode::OK, return_data },
            Err(mut e) => {
                let data = e.take_data();
                let return_data = if data.is_empty() {
                    None
                } else {
                    Some(IpldBlock { codec: DAG_CBOR, data: data.into() })
                };
                Response { exit_code: e.exit_code(), return_data }
            }
        })
    }

    fn new_actor_address(&self) -> Result<Address, ActorError> {
        let count = self.top.new_actor_addr_count.get();
        self.top.new_actor_addr_count.set(count + 1);
        let mut b = self.top.origin_stable.to_bytes();
        b.extend_from_slice(&self.top.nonce.to_be_bytes());
        b.extend_from_slice(&count.to_be_bytes());
        Ok(Address::new_actor(&b))
    }

    fn create_actor(&self, code_id: Cid, actor_id: ActorID) -> Result<(), ActorError> {
        if self.receiver != INIT_ACTOR_ID {
            return Err(actor_error!(forbidden; "actor {} may not create actors", self.receiver));
        }
        match resolve_builtin(&code_id) {
            Some((_, t)) if !t.is_singleton() => {}
            _ => {
                return Err(ActorError::unchecked(
                    ExitCode::SYS_ASSERTION_FAILED,
                    format!("cannot create actor with code {}", code_id),
                ))
            }
        }
        if self.vm.actor_by_id(actor_id)?.is_some() {
            return Err(actor_error!(forbidden;
                "attempt to create new actor at existing address {}", actor_id));
        }
        self.top.charge(self.top.price_list.on_create_actor())?;
        self.vm.set_actor_by_id(
            actor_id,
            Actor::new(code_id, *EMPTY_ARR_CID, 0, TokenAmount::zero()),
        )
    }

    fn total_fil_circ_supply(&self) -> TokenAmount {
        self.top.circ_supply.clone()
    }

    fn charge_gas(&self, name: &'static str, compute: i64) {
        self.charge_quietly(GasCharge::new(name, compute, 0));
    }
}

impl<BS: Blockstore> Primitives for InvocationCtx<'_, '_, BS> {
    fn hash_blake2b(&self, data: &[u8]) -> [u8; 32] {
        self.charge_quietly(self.top.price_list.on_hashing(data.len()));
        blake2b_256(data)
    }

    fn compute_unsealed_sector_cid(
        &self,
        proof_type: RegisteredSealProof,
        pieces: &[PieceInfo],
    ) -> Result<Cid, anyhow::Error> {
        self.top.charge(self.top.price_list.on_compute_unsealed_sector_cid())?;
        self.vm.externs.compute_unsealed_sector_cid(proof_type, pieces)
    }

    fn verify_signature(&self, signature: &Signature, signer: &Address, plaintext: &[u8]) -> bool {
        self.charge_quietly(self.top.price_list.on_verify_signature(signature.sig_type));
        match self.signing_key(signer) {
            Some(key) => self.vm.externs.verify_signature(signature, &key, plaintext),
            None => false,
        }
    }
}

impl<BS: Blockstore> Verifier for InvocationCtx<'_, '_, BS> {
    fn verify_seal(&self, vi: &SealVerifyInfo) -> bool {
        self.charge_quietly(self.top.price_list.on_verify_seal());
        self.vm.externs.verify_seal(vi)
    }

    fn verify_post(&self, verify_info: &WindowPoStVerifyInfo) -> bool {
        self.charge_quietly(self.top.price_list.on_verify_post(verify_info));
        self.vm.externs.verify_post(verify_info)
    }

    fn verify_aggregate_seals(&self, aggregate: &AggregateSealVerifyProofAndInfos) -> bool {
        self.charge_quietly(self.top.price_list.on_verify_aggregate_seals(aggregate));
        self.vm.externs.verify_aggregate_seals(aggregate)
    }
}
