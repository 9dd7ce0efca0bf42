// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashSet;

use fc_actors_runtime::MessageAccumulator;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::{Address, Protocol};

use crate::{State, TxnID};

pub struct StateSummary {
    pub pending_tx_count: u64,
    pub num_approvals_threshold: u64,
    pub signer_count: usize,
}

/// Checks internal invariants of multisig state.
pub fn check_state_invariants<BS: Blockstore>(
    state: &State,
    store: &BS,
) -> (StateSummary, MessageAccumulator) {
    let acc = MessageAccumulator::default();

    let mut signers: HashSet<Address> = HashSet::new();
    for signer in &state.signers {
        acc.require(
            signer.protocol() == Protocol::ID,
            &format!("signer {} is not an ID address", signer),
        );
        acc.require(signers.insert(*signer), &format!("duplicate signer {}", signer));
    }

    acc.require(
        state.num_approvals_threshold > 0,
        "approvals threshold must be at least one",
    );
    acc.require(
        state.num_approvals_threshold <= signers.len() as u64,
        &format!(
            "approvals threshold {} exceeds {} signers",
            state.num_approvals_threshold,
            signers.len()
        ),
    );
    acc.require(
        state.unlock_duration >= 0,
        &format!("negative unlock duration {}", state.unlock_duration),
    );

    let mut pending_tx_count = 0;
    match state.load_pending_txs(store) {
        Ok(txns) => {
            let ret = txns.for_each(|id: TxnID, txn| {
                acc.require(
                    id < state.next_tx_id,
                    &format!("transaction id {} not below next id {}", id, state.next_tx_id),
                );
                acc.require(
                    !txn.approved.is_empty(),
                    &format!("transaction {} has no approvals", id),
                );
                let mut approvers = HashSet::new();
                for approver in &txn.approved {
                    acc.require(
                        signers.contains(approver),
                        &format!("approver {} of transaction {} is not a signer", approver, id),
                    );
                    acc.require(
                        approvers.insert(*approver),
                        &format!("{} approved transaction {} twice", approver, id),
                    );
                }
                acc.require(
                    !txn.value.is_negative(),
                    &format!("transaction {} has negative value {}", id, txn.value),
                );
                pending_tx_count += 1;
                Ok(())
            });
            acc.require_no_error(ret, "error iterating pending transactions");
        }
        Err(e) => acc.add(&format!("error loading pending transactions: {}", e)),
    }

    (
        StateSummary {
            pending_tx_count,
            num_approvals_threshold: state.num_approvals_threshold,
            signer_count: signers.len(),
        },
        acc,
    )
}
