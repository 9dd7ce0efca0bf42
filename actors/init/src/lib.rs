// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::runtime::{ActorCode, Runtime, Type};
use fc_actors_runtime::{
    actor_dispatch, actor_error, extract_send_result, ActorContext, ActorError,
    SYSTEM_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::{RawBytes, CBOR};
use fvm_shared::address::Address;
use fvm_shared::{ActorID, METHOD_CONSTRUCTOR};
use num_derive::FromPrimitive;

pub use self::state::State;
pub use self::types::*;

mod state;
pub mod testing;
mod types;

/// Init actor methods available
#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    Exec = 2,
}

/// Init actor
pub struct Actor;

impl Actor {
    /// Init actor constructor
    pub fn constructor(rt: &impl Runtime, params: ConstructorParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        let state = State::new(rt.store(), params.network_name)
            .context("failed to construct init actor state")?;
        rt.create(&state)?;
        Ok(())
    }

    /// Exec init actor
    pub fn exec(rt: &impl Runtime, params: ExecParams) -> Result<ExecReturn, ActorError> {
        rt.validate_immediate_caller_accept_any()?;

        log::trace!("called exec; params.code_cid: {:?}", &params.code_cid);

        let caller = rt.message().caller();
        let caller_code = caller
            .id()
            .ok()
            .and_then(|id| rt.get_actor_code_cid(&id))
            .ok_or_else(|| actor_error!(illegal_state, "no code for caller at {}", caller))?;

        if !can_exec(rt, &caller_code, &params.code_cid) {
            return Err(actor_error!(forbidden;
                "caller type {} cannot exec actor type {}",
                caller_code, params.code_cid
            ));
        }

        // Stable across re-orgs, unlike the ID allocated below.
        let robust_address = rt.new_actor_address()?;

        let id_address: ActorID = rt.transaction(|s: &mut State, rt| {
            s.map_address_to_new_id(rt.store(), &robust_address)
                .context("failed to allocate ID address")
        })?;

        rt.create_actor(params.code_cid, id_address)?;

        extract_send_result(rt.send(
            &Address::new_id(id_address),
            METHOD_CONSTRUCTOR,
            constructor_block(params.constructor_params),
            rt.message().value_received(),
        ))
        .context("constructor failed")?;

        log::info!(
            "created actor {} ({}) with code {}",
            id_address,
            robust_address,
            params.code_cid
        );
        Ok(ExecReturn { id_address: Address::new_id(id_address), robust_address })
    }
}

fn constructor_block(params: RawBytes) -> Option<IpldBlock> {
    if params.is_empty() {
        None
    } else {
        Some(IpldBlock { codec: CBOR, data: params.into() })
    }
}

/// Multisig and payment channel actors may be created by anyone, miners only by the power actor.
fn can_exec(rt: &impl Runtime, caller: &Cid, exec: &Cid) -> bool {
    match rt.resolve_builtin_actor_type(exec) {
        Some(Type::Multisig) | Some(Type::PaymentChannel) => true,
        Some(Type::Miner) => rt.resolve_builtin_actor_type(caller) == Some(Type::Power),
        _ => false,
    }
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        Exec => exec,
    }
}
