// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::ActorID;
use fvm_shared::METHOD_SEND;

use crate::runtime::Runtime;
use crate::{actor_error, extract_send_result, ActorContext, ActorError};

pub const HAMT_BIT_WIDTH: u32 = 5;
pub const BALANCE_TABLE_BIT_WIDTH: u32 = 6;

/// Returns the ID behind `address`. Unknown key addresses are first brought
/// into existence with a zero-value send, which makes the VM create an
/// account for them.
pub fn resolve_to_actor_id(rt: &impl Runtime, address: &Address) -> Result<ActorID, ActorError> {
    if let Some(id) = rt.resolve_address(address) {
        return Ok(id);
    }
    extract_send_result(rt.send(address, METHOD_SEND, None, TokenAmount::default()))
        .with_context(|| format!("failed to create account for {}", address))?;
    rt.resolve_address(address)
        .ok_or_else(|| actor_error!(illegal_argument, "address {} did not resolve", address))
}
