// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::ActorError;
use fvm_shared::address::Address;
use thiserror::Error;

/// Failures of the VM itself, as opposed to messages that execute and exit non-zero.
/// These indicate a corrupt state tree or a misconfigured host and abort the caller.
#[derive(Error, Debug)]
pub enum VmError {
    #[error("actor {0} not found")]
    ActorNotFound(Address),
    #[error("state error: {0}")]
    State(#[from] ActorError),
    #[error("encoding error: {0}")]
    Encoding(#[from] fvm_ipld_encoding::Error),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
