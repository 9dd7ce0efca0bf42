// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Wire types of the actors the power actor calls out to, mirrored here so
//! the crate does not depend on them.

use cid::Cid;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::{strict_bytes, BytesDe, RawBytes};
use fvm_shared::address::Address;
use fvm_shared::sector::RegisteredSealProof;

pub mod init {
    use super::*;

    pub const EXEC_METHOD: u64 = 2;

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
    pub struct ExecParams {
        pub code_cid: Cid,
        pub constructor_params: RawBytes,
    }

    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
    pub struct ExecReturn {
        pub id_address: Address,
        pub robust_address: Address,
    }
}

pub mod miner {
    use super::*;

    /// Miner constructor arguments. Control addresses are always empty when
    /// the power actor creates the miner.
    #[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
    pub struct MinerConstructorParams {
        pub owner: Address,
        pub worker: Address,
        pub control_addresses: Vec<Address>,
        pub seal_proof_type: RegisteredSealProof,
        #[serde(with = "strict_bytes")]
        pub peer_id: Vec<u8>,
        pub multi_addresses: Vec<BytesDe>,
    }
}

pub mod reward {
    /// Reports the new network raw byte power; value is a `BigIntSer`.
    pub const UPDATE_NETWORK_KPI: u64 = 4;
}
