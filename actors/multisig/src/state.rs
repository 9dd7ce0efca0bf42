// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::{
    actor_error, linear_vesting_locked, ActorError, Config, Map, DEFAULT_HAMT_CONFIG,
};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;

use crate::{Transaction, TxnID};

pub type PendingTxnMap<BS> = Map<BS, TxnID, Transaction>;
pub const PENDING_TXN_CONFIG: Config = DEFAULT_HAMT_CONFIG;

/// Multisig actor state
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct State {
    pub signers: Vec<Address>,
    pub num_approvals_threshold: u64,
    pub next_tx_id: TxnID,

    // Linear unlock
    pub initial_balance: TokenAmount,
    pub start_epoch: ChainEpoch,
    pub unlock_duration: ChainEpoch,

    pub pending_txs: Cid,
}

impl State {
    pub fn new<BS: Blockstore>(
        store: &BS,
        signers: Vec<Address>,
        num_approvals_threshold: u64,
    ) -> Result<Self, ActorError> {
        let pending_txs = PendingTxnMap::flush_empty(store, PENDING_TXN_CONFIG)?;
        Ok(Self {
            signers,
            num_approvals_threshold,
            next_tx_id: TxnID::default(),
            initial_balance: TokenAmount::zero(),
            start_epoch: 0,
            unlock_duration: 0,
            pending_txs,
        })
    }

    /// Sets the vesting schedule.
    pub fn set_locked(
        &mut self,
        start_epoch: ChainEpoch,
        unlock_duration: ChainEpoch,
        locked_amount: TokenAmount,
    ) {
        self.start_epoch = start_epoch;
        self.unlock_duration = unlock_duration;
        self.initial_balance = locked_amount;
    }

    /// Returns the amount still locked `elapsed_epoch` epochs after the vesting start.
    pub fn amount_locked(&self, elapsed_epoch: ChainEpoch) -> TokenAmount {
        if self.unlock_duration == 0 {
            return TokenAmount::zero();
        }
        linear_vesting_locked(&self.initial_balance, elapsed_epoch, self.unlock_duration)
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Checks that spending `amount_to_spend` leaves at least the locked amount behind.
    pub fn check_available(
        &self,
        balance: TokenAmount,
        amount_to_spend: &TokenAmount,
        curr_epoch: ChainEpoch,
    ) -> Result<(), ActorError> {
        if amount_to_spend.is_negative() {
            return Err(actor_error!(
                illegal_argument,
                "amount to spend {} less than zero",
                amount_to_spend
            ));
        }
        if &balance < amount_to_spend {
            return Err(actor_error!(
                insufficient_funds,
                "current balance {} less than amount to spend {}",
                balance,
                amount_to_spend
            ));
        }
        if amount_to_spend.is_zero() {
            // Always permit a transaction that sends no value,
            // even if the lockup exceeds the current balance.
            return Ok(());
        }

        let remaining_balance = balance - amount_to_spend;
        let amount_locked = self.amount_locked(curr_epoch - self.start_epoch);
        if remaining_balance < amount_locked {
            return Err(actor_error!(
                insufficient_funds,
                "actor balance {} if spent {} would be less than required locked amount {}",
                remaining_balance,
                amount_to_spend,
                amount_locked
            ));
        }
        Ok(())
    }

    pub fn load_pending_txs<'bs, BS: Blockstore>(
        &self,
        store: &'bs BS,
    ) -> Result<PendingTxnMap<&'bs BS>, ActorError> {
        PendingTxnMap::load(store, &self.pending_txs, PENDING_TXN_CONFIG, "pending txns")
    }

    /// Iterates all pending transactions and removes an address from each list of approvals,
    /// if present. If an approval list becomes empty, the pending transaction is deleted.
    pub fn purge_approvals<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
    ) -> Result<(), ActorError> {
        let mut txns = self.load_pending_txs(store)?;

        let mut txn_ids_to_purge = Vec::new();
        txns.for_each(|id, txn| {
            if txn.approved.contains(addr) {
                txn_ids_to_purge.push((id, txn.clone()));
            }
            Ok(())
        })?;

        for (id, mut txn) in txn_ids_to_purge {
            txn.approved.retain(|a| a != addr);
            if txn.approved.is_empty() {
                txns.remove(&id)?;
            } else {
                txns.set(&id, txn)?;
            }
        }

        self.pending_txs = txns.flush()?;
        Ok(())
    }
}
