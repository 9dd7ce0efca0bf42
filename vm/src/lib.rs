// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A message-execution VM for the built-in actors.
//!
//! The VM owns the state tree and applies messages to it: it validates the sender, meters
//! gas, transfers value, dispatches to actor code and rolls back the state changes of any
//! invocation that fails. Host capabilities (proofs, signatures, randomness, supply) come
//! from an [`Externs`] implementation.

use std::cell::{Cell, RefCell};

use cid::Cid;
use fc_actor_account::State as AccountState;
use fc_actor_init::State as InitState;
use fc_actors_runtime::runtime::builtins::Type;
use fc_actors_runtime::runtime::{resolve_builtin, ActorVersion, BuiltinActors, EMPTY_ARR_CID};
use fc_actors_runtime::{
    ActorError, BURNT_FUNDS_ACTOR_ADDR, BURNT_FUNDS_ACTOR_ID, CRON_ACTOR_ID, INIT_ACTOR_ID,
    REWARD_ACTOR_ID, STORAGE_MARKET_ACTOR_ADDR, STORAGE_MARKET_ACTOR_ID, STORAGE_POWER_ACTOR_ADDR,
    STORAGE_POWER_ACTOR_ID, SYSTEM_ACTOR_ID,
};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::{CborStore, RawBytes, DAG_CBOR};
use fvm_shared::address::{Address, Protocol};
use fvm_shared::bigint::Zero;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::message::Message;
use fvm_shared::receipt::Receipt;
use fvm_shared::version::NetworkVersion;
use fvm_shared::{ActorID, MethodNum, METHOD_CONSTRUCTOR, METHOD_SEND};
use log::{debug, info};
use multihash::Code;
use serde::de::DeserializeOwned;

pub use self::blockstore::SyncBlockstore;
pub use self::config::NetworkConfig;
pub use self::error::VmError;
pub use self::externs::{
    CirculatingSupply, Externs, FakeExterns, ProofVerifier, Rand, SignatureVerifier,
};
pub use self::gas::{price_list_by_network_version, GasCharge, GasTracker, PriceList};
pub use self::state_tree::{Actor, StateTree};

use self::invocation::{execute, InternalMessage, TopCtx};

pub mod blockstore;
pub mod config;
pub mod error;
pub mod externs;
pub mod gas;
mod invocation;
pub mod state_tree;

/// Hashes input data using blake2b with 256 bit output.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new().hash_length(32).to_state().update(data).finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// Outcome of applying a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRet {
    pub msg_receipt: Receipt,
    /// Message of the error that made the message fail, if it did.
    pub failure_info: Option<String>,
}

impl ApplyRet {
    fn failed(exit_code: ExitCode, gas_used: i64, info: String) -> Self {
        ApplyRet {
            msg_receipt: Receipt {
                exit_code,
                return_data: RawBytes::default(),
                gas_used: gas_used as u64,
                events_root: None,
            },
            failure_info: Some(info),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.msg_receipt.exit_code
    }

    /// Decodes the return value of a successful message.
    pub fn ret<T: DeserializeOwned>(&self) -> Result<T, VmError> {
        Ok(self.msg_receipt.return_data.deserialize()?)
    }
}

pub struct VM<'bs, BS: Blockstore> {
    store: &'bs BS,
    tree: RefCell<StateTree<'bs, BS>>,
    epoch: Cell<ChainEpoch>,
    config: NetworkConfig,
    externs: Box<dyn Externs + 'bs>,
}

impl<'bs, BS: Blockstore> VM<'bs, BS> {
    /// A VM over an empty state tree.
    pub fn new(store: &'bs BS, config: NetworkConfig, externs: impl Externs + 'bs) -> Self {
        VM {
            store,
            tree: RefCell::new(StateTree::new(store)),
            epoch: Cell::new(0),
            config,
            externs: Box::new(externs),
        }
    }

    /// A VM over an existing state tree.
    pub fn load(
        store: &'bs BS,
        root: &Cid,
        epoch: ChainEpoch,
        config: NetworkConfig,
        externs: impl Externs + 'bs,
    ) -> Result<Self, VmError> {
        Ok(VM {
            store,
            tree: RefCell::new(StateTree::load(store, root)?),
            epoch: Cell::new(epoch),
            config,
            externs: Box::new(externs),
        })
    }

    /// A VM with the singleton actors constructed at epoch zero.
    /// The reward actor starts out holding `reward_balance`.
    pub fn genesis(
        store: &'bs BS,
        config: NetworkConfig,
        externs: impl Externs + 'bs,
        reward_balance: TokenAmount,
    ) -> Result<Self, VmError> {
        let vm = Self::new(store, config, externs);

        vm.construct_singleton(SYSTEM_ACTOR_ID, Type::System, None)?;
        vm.construct_singleton(
            INIT_ACTOR_ID,
            Type::Init,
            IpldBlock::serialize_cbor(&fc_actor_init::ConstructorParams {
                network_name: vm.config.network_name.clone(),
            })?,
        )?;
        vm.construct_singleton(
            REWARD_ACTOR_ID,
            Type::Reward,
            IpldBlock::serialize_cbor(&fc_actor_reward::ConstructorParams {
                curr_realized_power: Zero::zero(),
            })?,
        )?;
        let mut reward = vm.actor_by_id(REWARD_ACTOR_ID)?.ok_or(VmError::ActorNotFound(
            Address::new_id(REWARD_ACTOR_ID),
        ))?;
        reward.balance = reward_balance;
        vm.set_actor_by_id(REWARD_ACTOR_ID, reward)?;

        vm.construct_singleton(
            CRON_ACTOR_ID,
            Type::Cron,
            IpldBlock::serialize_cbor(&fc_actor_cron::ConstructorParams {
                entries: vec![
                    fc_actor_cron::Entry {
                        receiver: STORAGE_POWER_ACTOR_ADDR,
                        method_num: fc_actor_power::Method::OnEpochTickEnd as MethodNum,
                    },
                    fc_actor_cron::Entry {
                        receiver: STORAGE_MARKET_ACTOR_ADDR,
                        method_num: fc_actor_market::Method::CronTick as MethodNum,
                    },
                ],
            })?,
        )?;
        vm.construct_singleton(STORAGE_POWER_ACTOR_ID, Type::Power, None)?;
        vm.construct_singleton(STORAGE_MARKET_ACTOR_ID, Type::Market, None)?;

        let burnt_state = store.put_cbor(
            &AccountState { address: BURNT_FUNDS_ACTOR_ADDR },
            Code::Blake2b256,
        )?;
        vm.set_actor_by_id(
            BURNT_FUNDS_ACTOR_ID,
            Actor::new(
                vm.builtin_actors().account_code_id(),
                burnt_state,
                0,
                TokenAmount::zero(),
            ),
        )?;

        let root = vm.checkpoint()?;
        info!("constructed genesis state {} for network {}", root, vm.config.network_name);
        Ok(vm)
    }

    fn construct_singleton(
        &self,
        id: ActorID,
        typ: Type,
        params: Option<IpldBlock>,
    ) -> Result<(), VmError> {
        let code = self.builtin_actors().code_id(typ);
        self.set_actor_by_id(id, Actor::new(code, *EMPTY_ARR_CID, 0, TokenAmount::zero()))?;
        self.send_implicit(SYSTEM_ACTOR_ID, Address::new_id(id), METHOD_CONSTRUCTOR, params)
            .map_err(|e| e.wrap(format!("failed to construct {:?} actor", typ)))?;
        Ok(())
    }

    /// Credits a new or existing account for `key` out of thin air.
    /// Used to fund genesis allocations and test principals.
    pub fn create_account(&self, key: &Address, balance: TokenAmount) -> Result<Address, VmError> {
        self.send_implicit(SYSTEM_ACTOR_ID, *key, METHOD_SEND, None)?;
        let id = self.resolve_id(key)?.ok_or(VmError::ActorNotFound(*key))?;
        let mut actor = self.actor_by_id(id)?.ok_or(VmError::ActorNotFound(*key))?;
        actor.balance += balance;
        self.set_actor_by_id(id, actor)?;
        self.checkpoint()?;
        Ok(Address::new_id(id))
    }

    pub fn store(&self) -> &'bs BS {
        self.store
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn epoch(&self) -> ChainEpoch {
        self.epoch.get()
    }

    pub fn set_epoch(&self, epoch: ChainEpoch) {
        self.epoch.set(epoch)
    }

    pub fn network_version(&self) -> NetworkVersion {
        self.config.network_version(self.epoch())
    }

    /// Code IDs of the actor generation running at the current epoch.
    pub fn builtin_actors(&self) -> &'static BuiltinActors {
        BuiltinActors::for_version(ActorVersion::for_network(self.network_version()))
    }

    /// Flushes the state tree and returns its root.
    pub fn checkpoint(&self) -> Result<Cid, VmError> {
        Ok(self.snapshot()?)
    }

    /// Discards every change made since `root` was checkpointed.
    pub fn revert(&self, root: &Cid) -> Result<(), VmError> {
        Ok(self.restore(root)?)
    }

    pub fn actor(&self, address: &Address) -> Result<Option<Actor>, VmError> {
        match self.resolve_id(address)? {
            Some(id) => Ok(self.actor_by_id(id)?),
            None => Ok(None),
        }
    }

    /// Balance of the actor at `address`, zero if there is none.
    pub fn balance(&self, address: &Address) -> Result<TokenAmount, VmError> {
        Ok(self.actor(address)?.map(|a| a.balance).unwrap_or_else(TokenAmount::zero))
    }

    pub fn resolve_id_address(&self, address: &Address) -> Result<Option<Address>, VmError> {
        Ok(self.resolve_id(address)?.map(Address::new_id))
    }

    /// Decodes the state of the actor at `address`.
    pub fn get_state<T: DeserializeOwned>(&self, address: &Address) -> Result<Option<T>, VmError> {
        match self.resolve_id(address)? {
            Some(id) => Ok(self.get_state_by_id(id)?),
            None => Ok(None),
        }
    }

    /// Visits every actor in the state tree.
    pub fn for_each_actor<F>(&self, f: F) -> Result<(), VmError>
    where
        F: FnMut(ActorID, &Actor) -> Result<(), ActorError>,
    {
        Ok(self.tree.borrow().for_each(f)?)
    }

    /// Applies a signed message from an account.
    ///
    /// The sender pays `gas_fee_cap * gas_limit` up front and is refunded for unused gas;
    /// the gas used is burnt. If execution fails, every state change except the nonce
    /// increment and the gas payment is reverted.
    pub fn apply_message(&self, msg: &Message) -> Result<ApplyRet, VmError> {
        let nv = self.network_version();
        let prices = self.config.prices(nv);
        let gas_limit = i64::try_from(msg.gas_limit).unwrap_or(i64::MAX);

        let inclusion = prices.on_chain_message(fvm_ipld_encoding::to_vec(msg)?.len());
        if inclusion.total() > gas_limit {
            return Ok(ApplyRet::failed(
                ExitCode::SYS_OUT_OF_GAS,
                0,
                format!("gas limit {} below inclusion cost {}", gas_limit, inclusion.total()),
            ));
        }

        let sender_id = match self.resolve_id(&msg.from)? {
            Some(id) => id,
            None => {
                return Ok(ApplyRet::failed(
                    ExitCode::SYS_SENDER_INVALID,
                    0,
                    format!("sender {} not found", msg.from),
                ))
            }
        };
        let mut sender = match self.actor_by_id(sender_id)? {
            Some(a) if resolve_builtin(&a.code).map(|(_, t)| t) == Some(Type::Account) => a,
            Some(_) => {
                return Ok(ApplyRet::failed(
                    ExitCode::SYS_SENDER_INVALID,
                    0,
                    format!("sender {} is not an account", msg.from),
                ))
            }
            None => {
                return Ok(ApplyRet::failed(
                    ExitCode::SYS_SENDER_INVALID,
                    0,
                    format!("sender {} not found", msg.from),
                ))
            }
        };
        if sender.nonce != msg.sequence {
            return Ok(ApplyRet::failed(
                ExitCode::SYS_SENDER_STATE_INVALID,
                0,
                format!("nonce {} does not match sender nonce {}", msg.sequence, sender.nonce),
            ));
        }
        let gas_cost = &msg.gas_fee_cap * gas_limit;
        if sender.balance < gas_cost {
            return Ok(ApplyRet::failed(
                ExitCode::SYS_SENDER_STATE_INVALID,
                0,
                format!("sender balance {} below gas cost {}", sender.balance, gas_cost),
            ));
        }

        sender.nonce += 1;
        sender.balance -= &gas_cost;
        self.set_actor_by_id(sender_id, sender.clone())?;
        let snapshot = self.snapshot()?;

        let gas = RefCell::new(GasTracker::new(gas_limit));
        gas.borrow_mut().charge(inclusion)?;
        let top = TopCtx {
            gas: &gas,
            price_list: prices,
            network_version: nv,
            origin: sender_id,
            origin_stable: self.stable_address(sender_id, &msg.from)?,
            nonce: sender.nonce - 1,
            new_actor_addr_count: Cell::new(0),
            circ_supply: self.externs.circulating_supply(self.epoch()),
        };
        let res = execute(
            self,
            &top,
            InternalMessage {
                from: sender_id,
                to: msg.to,
                value: msg.value.clone(),
                method: msg.method_num,
                params: params_block(&msg.params),
            },
        );

        let (mut exit_code, mut return_data, mut failure_info) = match res {
            Ok(ret) => (ExitCode::OK, ret.map(|b| RawBytes::new(b.data)).unwrap_or_default(), None),
            Err(mut e) => (e.exit_code(), e.take_data(), Some(e.msg().to_string())),
        };
        if exit_code.is_success() {
            if let Err(e) = gas.borrow_mut().charge(prices.on_chain_return_value(return_data.len()))
            {
                failure_info = Some(e.msg().to_string());
            }
        }
        if gas.borrow().is_exhausted() {
            exit_code = ExitCode::SYS_OUT_OF_GAS;
            return_data = RawBytes::default();
        }
        if !exit_code.is_success() {
            self.restore(&snapshot)?;
        }

        let gas_used = gas.borrow().gas_used();
        let refund = &msg.gas_fee_cap * (gas_limit - gas_used);
        let burn = &msg.gas_fee_cap * gas_used;
        self.credit(sender_id, &refund)?;
        self.credit(BURNT_FUNDS_ACTOR_ID, &burn)?;
        let root = self.snapshot()?;

        info!(
            "applied message {} -> {} method {}: exit {:?}, gas used {}, state {}",
            msg.from, msg.to, msg.method_num, exit_code, gas_used, root
        );
        Ok(ApplyRet {
            msg_receipt: Receipt {
                exit_code,
                return_data,
                gas_used: gas_used as u64,
                events_root: None,
            },
            failure_info,
        })
    }

    /// Applies a message from a system actor, without nonce or gas accounting.
    /// A failing message has all its state changes reverted.
    pub fn apply_implicit_message(&self, msg: &Message) -> Result<ApplyRet, VmError> {
        let from = self.resolve_id(&msg.from)?.ok_or(VmError::ActorNotFound(msg.from))?;
        let snapshot = self.snapshot()?;
        let gas = RefCell::new(GasTracker::new(i64::MAX));
        let params = params_block(&msg.params);
        let res =
            self.execute_with(&gas, from, msg.from, msg.to, &msg.value, msg.method_num, params);
        let ret = match res {
            Ok(ret) => ApplyRet {
                msg_receipt: Receipt {
                    exit_code: ExitCode::OK,
                    return_data: ret.map(|b| RawBytes::new(b.data)).unwrap_or_default(),
                    gas_used: 0,
                    events_root: None,
                },
                failure_info: None,
            },
            Err(e) => {
                self.restore(&snapshot)?;
                ApplyRet::failed(e.exit_code(), 0, e.msg().to_string())
            }
        };
        let root = self.snapshot()?;
        debug!(
            "applied implicit message {} -> {} method {}: exit {:?}, state {}",
            msg.from,
            msg.to,
            msg.method_num,
            ret.exit_code(),
            root
        );
        Ok(ret)
    }

    fn send_implicit(
        &self,
        from: ActorID,
        to: Address,
        method: MethodNum,
        params: Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError> {
        let gas = RefCell::new(GasTracker::new(i64::MAX));
        let res = self.execute_with(
            &gas,
            from,
            Address::new_id(from),
            to,
            &TokenAmount::zero(),
            method,
            params,
        )?;
        self.snapshot()?;
        Ok(res)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_with(
        &self,
        gas: &RefCell<GasTracker>,
        from: ActorID,
        origin_stable: Address,
        to: Address,
        value: &TokenAmount,
        method: MethodNum,
        params: Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError> {
        let nv = self.network_version();
        let nonce = self.actor_by_id(from)?.map(|a| a.nonce).unwrap_or_default();
        let top = TopCtx {
            gas,
            price_list: self.config.prices(nv),
            network_version: nv,
            origin: from,
            origin_stable,
            nonce,
            new_actor_addr_count: Cell::new(0),
            circ_supply: self.externs.circulating_supply(self.epoch()),
        };
        execute(self, &top, InternalMessage { from, to, value: value.clone(), method, params })
    }

    /// The key address behind an account, or the sender address as given.
    fn stable_address(&self, id: ActorID, given: &Address) -> Result<Address, ActorError> {
        if given.protocol() != Protocol::ID {
            return Ok(*given);
        }
        Ok(self.get_state_by_id::<AccountState>(id)?.map(|st| st.address).unwrap_or(*given))
    }

    fn credit(&self, id: ActorID, amount: &TokenAmount) -> Result<(), ActorError> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut actor = self.actor_by_id(id)?.ok_or_else(|| {
            ActorError::unchecked(ExitCode::SYS_ASSERTION_FAILED, format!("no actor {}", id))
        })?;
        actor.balance += amount;
        self.set_actor_by_id(id, actor)
    }

    pub(crate) fn actor_by_id(&self, id: ActorID) -> Result<Option<Actor>, ActorError> {
        self.tree.borrow().get_actor(id)
    }

    pub(crate) fn set_actor_by_id(&self, id: ActorID, actor: Actor) -> Result<(), ActorError> {
        self.tree.borrow_mut().set_actor(id, actor)
    }

    pub(crate) fn snapshot(&self) -> Result<Cid, ActorError> {
        self.tree.borrow_mut().flush()
    }

    pub(crate) fn restore(&self, root: &Cid) -> Result<(), ActorError> {
        self.tree.borrow_mut().revert(root)
    }

    /// Resolves any address to an actor ID through the init actor's address map.
    pub(crate) fn resolve_id(&self, address: &Address) -> Result<Option<ActorID>, ActorError> {
        if let Ok(id) = address.id() {
            return Ok(Some(id));
        }
        let st: InitState = match self.get_state_by_id(INIT_ACTOR_ID)? {
            Some(st) => st,
            None => return Ok(None),
        };
        Ok(st.resolve_address(self.store, address)?.and_then(|a| a.id().ok()))
    }

    pub(crate) fn get_state_by_id<T: DeserializeOwned>(
        &self,
        id: ActorID,
    ) -> Result<Option<T>, ActorError> {
        let head = match self.actor_by_id(id)? {
            Some(a) => a.head,
            None => return Ok(None),
        };
        self.store
            .get_cbor(&head)
            .map_err(|e| ActorError::serialization(format!("failed to load state {}: {}", head, e)))
    }
}

fn params_block(params: &RawBytes) -> Option<IpldBlock> {
    if params.is_empty() {
        None
    } else {
        Some(IpldBlock { codec: DAG_CBOR, data: params.to_vec() })
    }
}
