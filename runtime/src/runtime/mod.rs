// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::CborStore;
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::piece::PieceInfo;
use fvm_shared::randomness::RANDOMNESS_LENGTH;
use fvm_shared::sector::{
    AggregateSealVerifyProofAndInfos, RegisteredSealProof, SealVerifyInfo, WindowPoStVerifyInfo,
};
use fvm_shared::version::NetworkVersion;
use fvm_shared::{ActorID, MethodNum, Response, METHOD_SEND};
use multihash::Code;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use self::builtins::Type;
pub use self::empty::EMPTY_ARR_CID;
pub use self::policy::*;
pub use self::randomness::{draw_randomness, DomainSeparationTag};
pub use self::version::*;
use crate::{actor_error, extract_send_result, ActorError, SendError};

pub mod builtins;
pub(crate) mod empty;
pub mod policy;
mod randomness;
pub mod version;

/// Entry point of a built-in actor's code.
pub trait ActorCode {
    /// Method numbers this actor understands, as an enum.
    type Methods;

    /// Runs `method` against the receiver. Unknown methods fail with
    /// `USR_UNHANDLED_MESSAGE`; undecodable arguments with `USR_ILLEGAL_ARGUMENT`.
    fn invoke_method<RT>(
        rt: &RT,
        method: MethodNum,
        args: Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError>
    where
        RT: Runtime;
}

/// What an executing actor can see and do, besides reading its parameters.
///
/// Every exported method must call exactly one of the `validate_immediate_caller_*`
/// functions, before any send.
pub trait Runtime: Primitives + Verifier {
    type Blockstore: Blockstore;

    // Chain context.

    fn network_version(&self) -> NetworkVersion;

    fn actor_version(&self) -> ActorVersion {
        ActorVersion::for_network(self.network_version())
    }

    /// The code table of the generation selected by the network version.
    fn builtin_actors(&self) -> &'static BuiltinActors {
        BuiltinActors::for_version(self.actor_version())
    }

    fn curr_epoch(&self) -> ChainEpoch;

    fn policy(&self) -> &Policy;

    fn message(&self) -> &dyn MessageInfo;

    /// Circulating supply at the start of this epoch.
    fn total_fil_circ_supply(&self) -> TokenAmount;

    // Caller validation.

    fn validate_immediate_caller_accept_any(&self) -> Result<(), ActorError>;

    fn validate_immediate_caller_is<'a, I>(&self, addresses: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Address>;

    fn validate_immediate_caller_type<'a, I>(&self, types: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Type>;

    /// `USR_ILLEGAL_ARGUMENT` carrying `msg` when `predicate` is false.
    fn validate_argument(&self, predicate: bool, msg: &str) -> Result<(), ActorError> {
        match predicate {
            true => Ok(()),
            false => Err(ActorError::illegal_argument(msg.to_string())),
        }
    }

    // Actors and balances.

    fn current_balance(&self) -> TokenAmount;

    fn actor_balance(&self, id: ActorID) -> Option<TokenAmount>;

    /// The actor id behind `address`. ID addresses resolve to themselves without
    /// a lookup; others go through the init actor's address table.
    fn resolve_address(&self, address: &Address) -> Option<ActorID>;

    fn get_actor_code_cid(&self, id: &ActorID) -> Option<Cid>;

    fn resolve_builtin_actor_type(&self, code_id: &Cid) -> Option<Type> {
        self.builtin_actors().resolve(code_id)
    }

    fn get_code_cid_for_type(&self, typ: Type) -> Cid {
        self.builtin_actors().code_id(typ)
    }

    /// A fresh robust address derived from the origin and its nonce.
    fn new_actor_address(&self) -> Result<Address, ActorError>;

    /// Installs `code_id` with empty state at `actor_id`. Init actor only.
    fn create_actor(&self, code_id: Cid, actor_id: ActorID) -> Result<(), ActorError>;

    // Randomness.

    fn get_randomness_from_tickets(
        &self,
        personalization: DomainSeparationTag,
        rand_epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError>;

    fn get_randomness_from_beacon(
        &self,
        personalization: DomainSeparationTag,
        rand_epoch: ChainEpoch,
        entropy: &[u8],
    ) -> Result<[u8; RANDOMNESS_LENGTH], ActorError>;

    // State.

    fn store(&self) -> &Self::Blockstore;

    fn get_state_root(&self) -> Result<Cid, ActorError>;

    fn set_state_root(&self, root: &Cid) -> Result<(), ActorError>;

    /// Writes the receiver's first state object. Fails unless the root is still
    /// the empty array left by `create_actor`.
    fn create<T: Serialize>(&self, obj: &T) -> Result<(), ActorError> {
        let root = self.get_state_root()?;
        if root != *EMPTY_ARR_CID {
            return Err(actor_error!(illegal_state; "state already initialized at {}", root));
        }
        let written = self
            .store()
            .put_cbor(obj, Code::Blake2b256)
            .map_err(|e| actor_error!(illegal_argument; "failed to write initial state: {}", e))?;
        self.set_state_root(&written)
    }

    /// A read-only copy of the receiver's state.
    fn state<T: DeserializeOwned>(&self) -> Result<T, ActorError> {
        let root = self.get_state_root()?;
        match self.store().get_cbor(&root) {
            Ok(Some(st)) => Ok(st),
            Ok(None) => Err(actor_error!(illegal_state; "state {} missing from store", root)),
            Err(e) => Err(actor_error!(serialization; "failed to decode state {}: {}", root, e)),
        }
    }

    /// Runs `f` over a mutable copy of the state and commits it when `f`
    /// returns `Ok`. Nothing is written on error. Sends fail while `f` runs.
    fn transaction<S, RT, F>(&self, f: F) -> Result<RT, ActorError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce(&mut S, &Self) -> Result<RT, ActorError>;

    // Messaging.

    /// Calls another actor. `Ok` carries the callee's exit code, whatever it is,
    /// and a failed callee's changes are already rolled back. `Err` means the
    /// call never ran.
    fn send(
        &self,
        to: &Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    ) -> Result<Response, SendError>;

    /// A bare value transfer that must succeed.
    fn send_funds(&self, to: &Address, value: TokenAmount) -> Result<(), ActorError> {
        extract_send_result(self.send(to, METHOD_SEND, None, value)).map(|_| ())
    }

    fn charge_gas(&self, name: &'static str, compute: i64);
}

/// The message being executed. All addresses are ID addresses.
pub trait MessageInfo {
    /// The immediate caller.
    fn caller(&self) -> Address;

    /// The account that signed the top-level message.
    fn origin(&self) -> Address;

    fn receiver(&self) -> Address;

    /// Already credited to `current_balance` when the method starts.
    fn value_received(&self) -> TokenAmount;
}

/// Deterministic functions provided by the host.
pub trait Primitives {
    fn hash_blake2b(&self, data: &[u8]) -> [u8; 32];

    /// CommD of a sector from its pieces.
    fn compute_unsealed_sector_cid(
        &self,
        proof_type: RegisteredSealProof,
        pieces: &[PieceInfo],
    ) -> Result<Cid, anyhow::Error>;

    fn verify_signature(&self, signature: &Signature, signer: &Address, plaintext: &[u8]) -> bool;
}

/// Proof checks provided by the host.
pub trait Verifier {
    fn verify_seal(&self, vi: &SealVerifyInfo) -> bool;

    fn verify_post(&self, verify_info: &WindowPoStVerifyInfo) -> bool;

    fn verify_aggregate_seals(&self, aggregate: &AggregateSealVerifyProofAndInfos) -> bool;
}
