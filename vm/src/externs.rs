// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Capabilities the VM takes from its host: signature and proof verification,
//! chain randomness and the circulating supply.

use std::collections::HashSet;

use anyhow::anyhow;
use cid::Cid;
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::commcid::data_commitment_v1_to_cid;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::piece::PieceInfo;
use fvm_shared::randomness::RANDOMNESS_LENGTH;
use fvm_shared::sector::{
    AggregateSealVerifyProofAndInfos, RegisteredSealProof, SealVerifyInfo, WindowPoStVerifyInfo,
};

use crate::blake2b_256;

pub trait SignatureVerifier {
    /// Checks a signature by the key behind `signer`, which is always a key address.
    fn verify_signature(&self, signature: &Signature, signer: &Address, plaintext: &[u8]) -> bool;
}

pub trait ProofVerifier {
    fn verify_seal(&self, info: &SealVerifyInfo) -> bool;
    fn verify_post(&self, info: &WindowPoStVerifyInfo) -> bool;
    fn verify_aggregate_seals(&self, aggregate: &AggregateSealVerifyProofAndInfos) -> bool;
    fn compute_unsealed_sector_cid(
        &self,
        proof_type: RegisteredSealProof,
        pieces: &[PieceInfo],
    ) -> anyhow::Result<Cid>;
}

/// Source of the base randomness that actors draw from.
pub trait Rand {
    fn ticket_randomness(&self, round: ChainEpoch) -> anyhow::Result<[u8; RANDOMNESS_LENGTH]>;
    fn beacon_randomness(&self, round: ChainEpoch) -> anyhow::Result<[u8; RANDOMNESS_LENGTH]>;
}

pub trait CirculatingSupply {
    fn circulating_supply(&self, epoch: ChainEpoch) -> TokenAmount;
}

/// Everything the VM needs from outside the state tree.
pub trait Externs: SignatureVerifier + ProofVerifier + Rand + CirculatingSupply {}

impl<T> Externs for T where T: SignatureVerifier + ProofVerifier + Rand + CirculatingSupply {}

/// Externs for tests and local networks.
/// Every signature and proof verifies unless its bytes were marked invalid.
#[derive(Debug, Default, Clone)]
pub struct FakeExterns {
    invalid_proofs: HashSet<Vec<u8>>,
    invalid_signatures: HashSet<Vec<u8>>,
    circulating_supply: TokenAmount,
}

impl FakeExterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circulating_supply(mut self, supply: TokenAmount) -> Self {
        self.circulating_supply = supply;
        self
    }

    /// Seal, aggregate and PoSt proofs with these bytes fail verification.
    pub fn with_invalid_proof(mut self, proof: &[u8]) -> Self {
        self.invalid_proofs.insert(proof.to_vec());
        self
    }

    pub fn with_invalid_signature(mut self, signature: &[u8]) -> Self {
        self.invalid_signatures.insert(signature.to_vec());
        self
    }

    fn fake_randomness(domain: &[u8], round: ChainEpoch) -> [u8; RANDOMNESS_LENGTH] {
        let mut data = domain.to_vec();
        data.extend_from_slice(&round.to_be_bytes());
        blake2b_256(&data)
    }
}

impl SignatureVerifier for FakeExterns {
    fn verify_signature(
        &self,
        signature: &Signature,
        _signer: &Address,
        _plaintext: &[u8],
    ) -> bool {
        !self.invalid_signatures.contains(&signature.bytes)
    }
}

impl ProofVerifier for FakeExterns {
    fn verify_seal(&self, info: &SealVerifyInfo) -> bool {
        !self.invalid_proofs.contains(&info.proof)
    }

    fn verify_post(&self, info: &WindowPoStVerifyInfo) -> bool {
        info.proofs.iter().all(|p| !self.invalid_proofs.contains(&p.proof_bytes))
    }

    fn verify_aggregate_seals(&self, aggregate: &AggregateSealVerifyProofAndInfos) -> bool {
        !self.invalid_proofs.contains(&aggregate.proof)
    }

    /// A commitment over the piece CIDs, stable for a given piece list.
    fn compute_unsealed_sector_cid(
        &self,
        _proof_type: RegisteredSealProof,
        pieces: &[PieceInfo],
    ) -> anyhow::Result<Cid> {
        let mut data = Vec::new();
        for piece in pieces {
            data.extend_from_slice(&piece.cid.to_bytes());
            data.extend_from_slice(&piece.size.0.to_be_bytes());
        }
        data_commitment_v1_to_cid(&blake2b_256(&data)).map_err(|e| anyhow!(e))
    }
}

impl Rand for FakeExterns {
    fn ticket_randomness(&self, round: ChainEpoch) -> anyhow::Result<[u8; RANDOMNESS_LENGTH]> {
        Ok(Self::fake_randomness(b"ticket", round))
    }

    fn beacon_randomness(&self, round: ChainEpoch) -> anyhow::Result<[u8; RANDOMNESS_LENGTH]> {
        Ok(Self::fake_randomness(b"beacon", round))
    }
}

impl CirculatingSupply for FakeExterns {
    fn circulating_supply(&self, _epoch: ChainEpoch) -> TokenAmount {
        self.circulating_supply.clone()
    }
}
