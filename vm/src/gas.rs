// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::RefCell;
use std::collections::HashMap;

use cid::Cid;
use fc_actors_runtime::ActorError;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::crypto::signature::SignatureType;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::sector::{
    AggregateSealVerifyProofAndInfos, RegisteredPoStProof, WindowPoStVerifyInfo,
};
use fvm_shared::version::NetworkVersion;
use fvm_shared::{MethodNum, METHOD_SEND};
use log::trace;
use num_traits::Zero;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Single gas charge in the VM. Contains information about what gas was for, as well
/// as the amount of gas needed for computation and storage respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasCharge {
    pub name: &'static str,
    pub compute_gas: i64,
    pub storage_gas: i64,
}

impl GasCharge {
    pub fn new(name: &'static str, compute_gas: i64, storage_gas: i64) -> Self {
        Self { name, compute_gas, storage_gas }
    }

    /// Calculates total gas charge based on compute and storage multipliers.
    pub fn total(&self) -> i64 {
        self.compute_gas + self.storage_gas
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingCost {
    pub flat: i64,
    pub scale: i64,
}

/// Provides prices for operations in the VM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub storage_gas_multiplier: i64,

    /// Charged to the originator of an on-chain message, whether it succeeds or not:
    /// `base + len(serialized message) * per_byte`.
    pub on_chain_message_compute_base: i64,
    pub on_chain_message_storage_base: i64,
    pub on_chain_message_storage_per_byte: i64,
    pub on_chain_return_value_per_byte: i64,

    /// Charged for every send, including the top-level one.
    pub send_base: i64,
    pub send_transfer_funds: i64,
    pub send_transfer_only_premium: i64,
    pub send_invoke_method: i64,

    pub ipld_get_base: i64,
    pub ipld_put_base: i64,
    pub ipld_put_per_byte: i64,

    pub create_actor_compute: i64,
    pub create_actor_storage: i64,

    pub bls_sig_cost: i64,
    pub secp256k1_sig_cost: i64,

    pub hashing_base: i64,
    pub compute_unsealed_sector_cid_base: i64,
    pub verify_seal_base: i64,
    pub verify_aggregate_seal_per_sector: i64,
    pub verify_post_lookup: HashMap<RegisteredPoStProof, ScalingCost>,
    pub verify_post_discount: bool,
}

static BASE_PRICES: Lazy<PriceList> = Lazy::new(|| PriceList {
    storage_gas_multiplier: 1000,

    on_chain_message_compute_base: 38863,
    on_chain_message_storage_base: 36,
    on_chain_message_storage_per_byte: 1,
    on_chain_return_value_per_byte: 1,

    send_base: 29233,
    send_transfer_funds: 27500,
    send_transfer_only_premium: 159672,
    send_invoke_method: -5377,

    ipld_get_base: 75242,
    ipld_put_base: 84070,
    ipld_put_per_byte: 1,

    create_actor_compute: 1108454,
    create_actor_storage: 36 + 40,

    bls_sig_cost: 16598605,
    secp256k1_sig_cost: 1637292,

    hashing_base: 31355,
    compute_unsealed_sector_cid_base: 98647,
    verify_seal_base: 2000,
    verify_aggregate_seal_per_sector: 449900,
    verify_post_lookup: [
        (
            RegisteredPoStProof::StackedDRGWindow512MiBV1,
            ScalingCost { flat: 123861062, scale: 9226981 },
        ),
        (
            RegisteredPoStProof::StackedDRGWindow32GiBV1,
            ScalingCost { flat: 748593537, scale: 85639 },
        ),
        (
            RegisteredPoStProof::StackedDRGWindow64GiBV1,
            ScalingCost { flat: 748593537, scale: 85639 },
        ),
    ]
    .into_iter()
    .collect(),
    verify_post_discount: true,
});

static CALICO_PRICES: Lazy<PriceList> = Lazy::new(|| PriceList {
    storage_gas_multiplier: 1300,
    ipld_get_base: 114617,
    ipld_put_base: 353640,
    verify_post_lookup: [
        RegisteredPoStProof::StackedDRGWindow512MiBV1,
        RegisteredPoStProof::StackedDRGWindow32GiBV1,
        RegisteredPoStProof::StackedDRGWindow64GiBV1,
    ]
    .into_iter()
    .map(|p| (p, ScalingCost { flat: 117680921, scale: 43780 }))
    .collect(),
    verify_post_discount: false,
    ..BASE_PRICES.clone()
});

/// Returns the gas prices in effect at a network version.
pub fn price_list_by_network_version(nv: NetworkVersion) -> &'static PriceList {
    if nv >= NetworkVersion::V7 {
        &CALICO_PRICES
    } else {
        &BASE_PRICES
    }
}

impl PriceList {
    /// Gas for storing a message of a given size in the chain.
    pub fn on_chain_message(&self, msg_size: usize) -> GasCharge {
        GasCharge::new(
            "OnChainMessage",
            self.on_chain_message_compute_base,
            (self.on_chain_message_storage_base
                + self.on_chain_message_storage_per_byte * msg_size as i64)
                * self.storage_gas_multiplier,
        )
    }

    /// Gas for storing the return value of a message in the chain.
    pub fn on_chain_return_value(&self, data_size: usize) -> GasCharge {
        GasCharge::new(
            "OnChainReturnValue",
            0,
            data_size as i64 * self.on_chain_return_value_per_byte * self.storage_gas_multiplier,
        )
    }

    pub fn on_method_invocation(&self, value: &TokenAmount, method_num: MethodNum) -> GasCharge {
        let mut ret = self.send_base;
        if !value.is_zero() {
            ret += self.send_transfer_funds;
            if method_num == METHOD_SEND {
                ret += self.send_transfer_only_premium;
            }
        }
        if method_num != METHOD_SEND {
            ret += self.send_invoke_method;
        }
        GasCharge::new("OnMethodInvocation", ret, 0)
    }

    pub fn on_ipld_get(&self) -> GasCharge {
        GasCharge::new("OnIpldGet", self.ipld_get_base, 0)
    }

    pub fn on_ipld_put(&self, data_size: usize) -> GasCharge {
        GasCharge::new(
            "OnIpldPut",
            self.ipld_put_base,
            data_size as i64 * self.ipld_put_per_byte * self.storage_gas_multiplier,
        )
    }

    pub fn on_create_actor(&self) -> GasCharge {
        GasCharge::new(
            "OnCreateActor",
            self.create_actor_compute,
            self.create_actor_storage * self.storage_gas_multiplier,
        )
    }

    pub fn on_verify_signature(&self, sig_type: SignatureType) -> GasCharge {
        let val = match sig_type {
            SignatureType::BLS => self.bls_sig_cost,
            _ => self.secp256k1_sig_cost,
        };
        GasCharge::new("OnVerifySignature", val, 0)
    }

    pub fn on_hashing(&self, _data_size: usize) -> GasCharge {
        GasCharge::new("OnHashing", self.hashing_base, 0)
    }

    pub fn on_compute_unsealed_sector_cid(&self) -> GasCharge {
        GasCharge::new("OnComputeUnsealedSectorCid", self.compute_unsealed_sector_cid_base, 0)
    }

    pub fn on_verify_seal(&self) -> GasCharge {
        GasCharge::new("OnVerifySeal", self.verify_seal_base, 0)
    }

    pub fn on_verify_aggregate_seals(
        &self,
        aggregate: &AggregateSealVerifyProofAndInfos,
    ) -> GasCharge {
        GasCharge::new(
            "OnVerifyAggregateSeals",
            self.verify_aggregate_seal_per_sector * aggregate.infos.len() as i64,
            0,
        )
    }

    pub fn on_verify_post(&self, info: &WindowPoStVerifyInfo) -> GasCharge {
        let proof = info
            .proofs
            .first()
            .map(|p| p.post_proof)
            .unwrap_or(RegisteredPoStProof::StackedDRGWindow512MiBV1);
        let cost = self
            .verify_post_lookup
            .get(&proof)
            .or_else(|| self.verify_post_lookup.get(&RegisteredPoStProof::StackedDRGWindow512MiBV1))
            .copied()
            .unwrap_or(ScalingCost { flat: 0, scale: 0 });
        let mut gas_used = cost.flat + info.challenged_sectors.len() as i64 * cost.scale;
        if self.verify_post_discount {
            gas_used /= 2;
        }
        GasCharge::new("OnVerifyPost", gas_used, 0)
    }
}

/// Meters the gas consumed by one message against its limit.
/// Once exhausted, every further charge fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTracker {
    gas_limit: i64,
    gas_used: i64,
    exhausted: bool,
}

impl GasTracker {
    pub fn new(gas_limit: i64) -> Self {
        Self { gas_limit, gas_used: 0, exhausted: false }
    }

    /// Adds a charge, failing with `SYS_OUT_OF_GAS` if it exceeds the limit.
    /// An overrunning charge consumes the rest of the limit.
    pub fn charge(&mut self, charge: GasCharge) -> Result<(), ActorError> {
        let total = charge.total();
        trace!("charging {} gas for {}", total, charge.name);
        let used = self.gas_used.saturating_add(total);
        if self.exhausted || used > self.gas_limit {
            self.gas_used = self.gas_limit;
            self.exhausted = true;
            return Err(ActorError::unchecked(
                ExitCode::SYS_OUT_OF_GAS,
                format!(
                    "not enough gas for {}: used={}, limit={}",
                    charge.name, used, self.gas_limit
                ),
            ));
        }
        self.gas_used = used;
        Ok(())
    }

    pub fn gas_used(&self) -> i64 {
        self.gas_used
    }

    pub fn gas_limit(&self) -> i64 {
        self.gas_limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Blockstore wrapper charging the message's gas for every read and write.
pub struct GasBlockstore<'a, BS> {
    pub store: &'a BS,
    pub gas: &'a RefCell<GasTracker>,
    pub price_list: &'a PriceList,
}

impl<BS: Blockstore> Blockstore for GasBlockstore<'_, BS> {
    fn get(&self, k: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        self.gas.borrow_mut().charge(self.price_list.on_ipld_get())?;
        self.store.get(k)
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> anyhow::Result<()> {
        self.gas.borrow_mut().charge(self.price_list.on_ipld_put(block.len()))?;
        self.store.put_keyed(k, block)
    }

    fn has(&self, k: &Cid) -> anyhow::Result<bool> {
        self.store.has(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockstore::SyncBlockstore;
    use fc_actors_runtime::ContentStore;

    #[test]
    fn tracker_exhausts_at_limit() {
        let mut tracker = GasTracker::new(100);
        tracker.charge(GasCharge::new("a", 60, 0)).unwrap();
        tracker.charge(GasCharge::new("b", 20, 20)).unwrap();
        assert_eq!(100, tracker.gas_used());

        let err = tracker.charge(GasCharge::new("c", 1, 0)).unwrap_err();
        assert_eq!(ExitCode::SYS_OUT_OF_GAS, err.exit_code());
        assert!(tracker.is_exhausted());
        assert_eq!(100, tracker.gas_used());

        // Nothing is free once exhausted.
        assert!(tracker.charge(GasCharge::new("d", 0, 0)).is_err());
    }

    #[test]
    fn method_invocation_prices() {
        let prices = price_list_by_network_version(NetworkVersion::V0);
        let send_only = prices.on_method_invocation(&TokenAmount::from_atto(1), METHOD_SEND);
        assert_eq!(29233 + 27500 + 159672, send_only.total());
        let call = prices.on_method_invocation(&TokenAmount::zero(), 2);
        assert_eq!(29233 - 5377, call.total());
    }

    #[test]
    fn calico_raises_storage_costs() {
        let base = price_list_by_network_version(NetworkVersion::V6);
        let calico = price_list_by_network_version(NetworkVersion::V7);
        assert!(calico.on_chain_message(100).total() > base.on_chain_message(100).total());
        assert_eq!(base.send_base, calico.send_base);
    }

    #[test]
    fn blockstore_charges_reads_and_writes() {
        let inner = SyncBlockstore::new();
        let gas = RefCell::new(GasTracker::new(i64::MAX));
        let prices = price_list_by_network_version(NetworkVersion::V0);
        let bs = GasBlockstore { store: &inner, gas: &gas, price_list: prices };

        let cid = bs.put_raw(b"abc").unwrap();
        let after_put = gas.borrow().gas_used();
        assert_eq!(prices.on_ipld_put(3).total(), after_put);

        bs.get_raw(&cid).unwrap();
        assert_eq!(after_put + prices.on_ipld_get().total(), gas.borrow().gas_used());
    }

    #[test]
    fn blockstore_fails_when_out_of_gas() {
        let inner = SyncBlockstore::new();
        let gas = RefCell::new(GasTracker::new(10));
        let prices = price_list_by_network_version(NetworkVersion::V0);
        let bs = GasBlockstore { store: &inner, gas: &gas, price_list: prices };
        assert!(bs.put_raw(b"abc").is_err());
        assert!(inner.is_empty());
        assert!(gas.borrow().is_exhausted());
    }
}
