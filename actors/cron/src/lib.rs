// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::runtime::{ActorCode, Runtime};
use fc_actors_runtime::{actor_dispatch, ActorError, SYSTEM_ACTOR_ADDR};
use fvm_ipld_encoding::tuple::*;
use fvm_shared::econ::TokenAmount;
use fvm_shared::METHOD_CONSTRUCTOR;
use log::{debug, warn};
use num_derive::FromPrimitive;

pub use self::state::{Entry, State};

mod state;

#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    EpochTick = 2,
}

/// The fixed schedule, set once at genesis.
#[derive(Default, Debug, Serialize_tuple, Deserialize_tuple)]
pub struct ConstructorParams {
    pub entries: Vec<Entry>,
}

/// Calls a fixed list of singleton methods once per epoch.
pub struct Actor;

impl Actor {
    pub fn constructor(rt: &impl Runtime, params: ConstructorParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        rt.create(&State { entries: params.entries })
    }

    /// Applied by the system as the last implicit message of each epoch.
    /// A failing entry does not stop the ones after it.
    pub fn epoch_tick(rt: &impl Runtime) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        let st: State = rt.state()?;
        debug!("cron tick at epoch {} with {} entries", rt.curr_epoch(), st.entries.len());
        for entry in &st.entries {
            Self::run_entry(rt, entry);
        }
        Ok(())
    }

    fn run_entry(rt: &impl Runtime, entry: &Entry) {
        let outcome = rt.send(&entry.receiver, entry.method_num, None, TokenAmount::default());
        match outcome {
            Ok(resp) if resp.exit_code.is_success() => {}
            Ok(resp) => warn!(
                "cron entry {}:{} aborted with {}",
                entry.receiver, entry.method_num, resp.exit_code
            ),
            Err(e) => warn!("cron entry {}:{} not sent: {}", entry.receiver, entry.method_num, e),
        }
    }
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        EpochTick => epoch_tick,
    }
}
