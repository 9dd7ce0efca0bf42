// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, BTreeSet};

use cid::Cid;
use fc_actors_runtime::{MessageAccumulator, Map, BALANCE_TABLE_HAMT_CONFIG};
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::{Address, Protocol};
use fvm_shared::clock::{ChainEpoch, EPOCH_UNDEFINED};
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;

use crate::{DealProposal, DealState, State};

pub struct DealSummary {
    pub provider: Address,
    pub client: Address,
    pub start_epoch: ChainEpoch,
    pub end_epoch: ChainEpoch,
    pub sector_start_epoch: ChainEpoch,
    pub last_update_epoch: ChainEpoch,
    pub slash_epoch: ChainEpoch,
}

#[derive(Default)]
pub struct StateSummary {
    pub deals: BTreeMap<DealID, DealSummary>,
    pub pending_proposal_count: u64,
    pub deal_state_count: u64,
    pub locked_total: TokenAmount,
    pub next_id: DealID,
}

/// Checks internal invariants of market state.
pub fn check_state_invariants<BS: Blockstore>(
    state: &State,
    store: &BS,
) -> (StateSummary, MessageAccumulator) {
    let acc = MessageAccumulator::default();

    acc.require(
        !state.total_client_locked_collateral.is_negative(),
        &format!(
            "negative total client locked collateral {}",
            state.total_client_locked_collateral
        ),
    );
    acc.require(
        !state.total_provider_locked_collateral.is_negative(),
        &format!(
            "negative total provider locked collateral {}",
            state.total_provider_locked_collateral
        ),
    );
    acc.require(
        !state.total_client_storage_fee.is_negative(),
        &format!("negative total client storage fee {}", state.total_client_storage_fee),
    );

    let mut summary = StateSummary { next_id: state.next_id, ..Default::default() };
    let mut proposals: BTreeMap<DealID, DealProposal> = BTreeMap::new();

    // Proposals
    match state.load_proposals(store) {
        Ok(map) => {
            let ret = map.for_each(|id, proposal| {
                acc.require(
                    proposal.client.protocol() == Protocol::ID,
                    &format!("client address for deal {} is not an ID address", id),
                );
                acc.require(
                    proposal.provider.protocol() == Protocol::ID,
                    &format!("provider address for deal {} is not an ID address", id),
                );
                acc.require(id < state.next_id, &format!("deal id {} not less than next id", id));
                proposals.insert(id, proposal.clone());
                summary.deals.insert(
                    id,
                    DealSummary {
                        provider: proposal.provider,
                        client: proposal.client,
                        start_epoch: proposal.start_epoch,
                        end_epoch: proposal.end_epoch,
                        sector_start_epoch: EPOCH_UNDEFINED,
                        last_update_epoch: EPOCH_UNDEFINED,
                        slash_epoch: EPOCH_UNDEFINED,
                    },
                );
                Ok(())
            });
            acc.require_no_error(ret, "error iterating proposals");
        }
        Err(e) => acc.add(&format!("error loading proposals: {}", e)),
    }

    // States
    let mut activated: BTreeSet<DealID> = BTreeSet::new();
    match state.load_deal_states(store) {
        Ok(map) => {
            let ret = map.for_each(|id, deal_state: &DealState| {
                activated.insert(id);
                summary.deal_state_count += 1;
                acc.require(
                    deal_state.sector_start_epoch >= 0,
                    &format!("deal {} state start epoch undefined", id),
                );
                acc.require(
                    deal_state.last_updated_epoch == EPOCH_UNDEFINED
                        || deal_state.last_updated_epoch >= deal_state.sector_start_epoch,
                    &format!("deal {} state last updated before sector start", id),
                );
                match summary.deals.get_mut(&id) {
                    Some(deal) => {
                        acc.require(
                            !deal_state.is_slashed() || deal_state.slash_epoch <= deal.end_epoch,
                            &format!("deal {} slashed after its end epoch", id),
                        );
                        deal.sector_start_epoch = deal_state.sector_start_epoch;
                        deal.last_update_epoch = deal_state.last_updated_epoch;
                        deal.slash_epoch = deal_state.slash_epoch;
                    }
                    None => acc.add(&format!("no deal proposal for deal state {}", id)),
                }
                Ok(())
            });
            acc.require_no_error(ret, "error iterating deal states");
        }
        Err(e) => acc.add(&format!("error loading deal states: {}", e)),
    }

    // Pending proposals
    let mut pending_cids: BTreeSet<Cid> = BTreeSet::new();
    for (id, proposal) in &proposals {
        if activated.contains(id) {
            continue;
        }
        match proposal.cid() {
            Ok(pcid) => {
                pending_cids.insert(pcid);
            }
            Err(e) => acc.add(&format!("error computing cid of deal {}: {}", id, e)),
        }
    }
    match state.load_pending_proposals(store) {
        Ok(set) => {
            let ret = set.for_each(|pcid| {
                summary.pending_proposal_count += 1;
                acc.require(
                    pending_cids.contains(&pcid),
                    &format!("pending proposal {} is not an unactivated deal", pcid),
                );
                Ok(())
            });
            acc.require_no_error(ret, "error iterating pending proposals");
            acc.require(
                summary.pending_proposal_count == pending_cids.len() as u64,
                &format!(
                    "{} pending proposals recorded, {} unactivated deals",
                    summary.pending_proposal_count,
                    pending_cids.len()
                ),
            );
        }
        Err(e) => acc.add(&format!("error loading pending proposals: {}", e)),
    }

    // Escrow and locked balances
    let escrow = Map::<_, Address, TokenAmount>::load(
        store,
        &state.escrow_table,
        BALANCE_TABLE_HAMT_CONFIG,
        "escrow table",
    );
    let locked = Map::<_, Address, TokenAmount>::load(
        store,
        &state.locked_table,
        BALANCE_TABLE_HAMT_CONFIG,
        "locked table",
    );
    match (escrow, locked) {
        (Ok(escrow), Ok(locked)) => {
            let mut locked_total = TokenAmount::zero();
            let ret = locked.for_each(|addr, amount| {
                locked_total += amount;
                match escrow.try_get(&addr) {
                    Ok(Some(balance)) => acc.require(
                        amount <= balance,
                        &format!("locked {} exceeds escrow {} for {}", amount, balance, addr),
                    ),
                    Ok(None) => acc.require(
                        amount.is_zero(),
                        &format!("locked {} without escrow for {}", amount, addr),
                    ),
                    Err(e) => acc.add(&format!("error reading escrow of {}: {}", addr, e)),
                }
                Ok(())
            });
            acc.require_no_error(ret, "error iterating locked table");
            acc.require(
                locked_total == state.total_locked(),
                &format!(
                    "locked table total {} does not match recorded total {}",
                    locked_total,
                    state.total_locked()
                ),
            );
            summary.locked_total = locked_total;
        }
        (Err(e), _) | (_, Err(e)) => acc.add(&format!("error loading balance tables: {}", e)),
    }

    // Party index
    match state.load_deals_by_party(store) {
        Ok(index) => {
            for (id, proposal) in &proposals {
                for party in [&proposal.client, &proposal.provider] {
                    match index.get(party) {
                        Ok(Some(set)) => acc.require(
                            set.has(id).unwrap_or(false),
                            &format!("deal {} missing from index of {}", id, party),
                        ),
                        Ok(None) => acc.add(&format!("no deal index for party {}", party)),
                        Err(e) => acc.add(&format!("error reading index of {}: {}", party, e)),
                    }
                }
            }
            let ret = index.for_each_key(|party| {
                index.for_each_in(&party, |id: DealID| {
                    acc.require(
                        proposals.contains_key(&id),
                        &format!("party {} indexes removed deal {}", party, id),
                    );
                    Ok(())
                })
            });
            acc.require_no_error(ret, "error iterating deals by party");
        }
        Err(e) => acc.add(&format!("error loading deals by party: {}", e)),
    }

    // Every live deal is scheduled for processing after the last cron tick
    match state.load_deal_ops(store) {
        Ok(ops) => {
            let mut scheduled: BTreeSet<DealID> = BTreeSet::new();
            let ret = ops.for_each_key(|epoch| {
                ops.for_each_in(&epoch, |id: DealID| {
                    if epoch > state.last_cron {
                        scheduled.insert(id);
                    }
                    Ok(())
                })
            });
            acc.require_no_error(ret, "error iterating deal ops");
            for id in proposals.keys() {
                acc.require(
                    scheduled.contains(id),
                    &format!("deal {} is not scheduled for processing", id),
                );
            }
        }
        Err(e) => acc.add(&format!("error loading deal ops: {}", e)),
    }

    (summary, acc)
}
