// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::CborStore;
use fvm_shared::error::ExitCode;
use fvm_shared::METHOD_CONSTRUCTOR;
use multihash::Code;
use num_derive::FromPrimitive;

use fc_actors_runtime::runtime::{ActorCode, BuiltinActors, Runtime, Type};
use fc_actors_runtime::{
    actor_dispatch, ActorContext, ActorError, AsActorError, SYSTEM_ACTOR_ADDR,
};

/// Pairs of actor type name and code ID, in `Type::ALL` order.
pub type Registry = Vec<(String, Cid)>;

#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
}

#[derive(Deserialize_tuple, Serialize_tuple, Debug, Clone)]
pub struct State {
    /// Root of the [`Registry`] for the generation active at genesis.
    pub builtin_actors: Cid,
}

impl State {
    pub fn new<BS: Blockstore>(store: &BS, actors: &BuiltinActors) -> Result<Self, ActorError> {
        let registry: Registry =
            Type::ALL.iter().map(|&t| (t.name().to_string(), actors.code_id(t))).collect();
        let builtin_actors = store
            .put_cbor(&registry, Code::Blake2b256)
            .context_code(ExitCode::USR_ILLEGAL_STATE, "failed to write actor registry")?;
        Ok(State { builtin_actors })
    }

    pub fn get_builtin_actors<BS: Blockstore>(&self, store: &BS) -> Result<Registry, ActorError> {
        let registry: Option<Registry> =
            store.get_cbor(&self.builtin_actors).exit_code(ExitCode::USR_SERIALIZATION)?;
        registry.context_code(ExitCode::USR_ILLEGAL_STATE, "actor registry missing")
    }

    /// Code ID registered under a type name such as `"storageminer"`.
    pub fn code_for<BS: Blockstore>(&self, store: &BS, name: &str) -> Result<Cid, ActorError> {
        let registry = self.get_builtin_actors(store)?;
        registry
            .into_iter()
            .find_map(|(n, code)| (n == name).then_some(code))
            .with_context_code(ExitCode::USR_NOT_FOUND, || format!("no actor named {}", name))
    }
}

/// Runs once at genesis and holds nothing but the actor registry.
pub struct Actor;

impl Actor {
    pub fn constructor(rt: &impl Runtime) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(&[SYSTEM_ACTOR_ADDR])?;
        let st = State::new(rt.store(), rt.builtin_actors()).context("constructing system state")?;
        rt.create(&st)
    }
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
    }
}
