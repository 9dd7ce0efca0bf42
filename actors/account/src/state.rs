// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::{Address, Protocol};
use fvm_shared::crypto::signature::SignatureType;

/// An account only remembers the key address it was created for.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub address: Address,
}

impl State {
    /// Signature scheme of the account key, `None` for non-key addresses.
    pub fn signature_type(&self) -> Option<SignatureType> {
        key_signature_type(&self.address)
    }
}

pub(crate) fn key_signature_type(addr: &Address) -> Option<SignatureType> {
    match addr.protocol() {
        Protocol::BLS => Some(SignatureType::BLS),
        Protocol::Secp256k1 => Some(SignatureType::Secp256k1),
        _ => None,
    }
}
