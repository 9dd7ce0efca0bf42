// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::runtime::{ActorCode, Runtime};
use fc_actors_runtime::{actor_dispatch, actor_error, ActorError, SYSTEM_ACTOR_ADDR};
use fvm_shared::address::Address;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::METHOD_CONSTRUCTOR;
use num_derive::FromPrimitive;

use crate::state::key_signature_type;
use crate::types::AuthenticateMessageParams;

pub use self::state::State;

mod state;
pub mod testing;
pub mod types;

#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    PubkeyAddress = 2,
    AuthenticateMessage = 3,
}

/// A principal backed by a BLS or secp256k1 key.
pub struct Actor;

impl Actor {
    /// Invoked by the VM when value is first sent to a key address.
    pub fn constructor(rt: &impl Runtime, address: Address) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        if key_signature_type(&address).is_none() {
            return Err(actor_error!(illegal_argument;
                "account must be keyed by a BLS or SECP address, got {}", address));
        }
        rt.create(&State { address })
    }

    pub fn pubkey_address(rt: &impl Runtime) -> Result<Address, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        Ok(rt.state::<State>()?.address)
    }

    /// Checks `params.signature` against the account key. The bytes are the bare
    /// signature without a type prefix.
    pub fn authenticate_message(
        rt: &impl Runtime,
        params: AuthenticateMessageParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        let sig_type = st.signature_type().ok_or_else(|| {
            actor_error!(illegal_state; "account key {} is not a key address", st.address)
        })?;

        let sig = Signature { sig_type, bytes: params.signature };
        if rt.verify_signature(&sig, &st.address, &params.message) {
            Ok(())
        } else {
            Err(actor_error!(illegal_argument; "signature does not match account key"))
        }
    }
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        PubkeyAddress => pubkey_address,
        AuthenticateMessage => authenticate_message,
    }
}
