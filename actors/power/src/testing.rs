// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::MessageAccumulator;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::sector::StoragePower;
use num_traits::Signed;

use crate::State;

#[derive(Default)]
struct ClaimTotals {
    count: i64,
    raw_committed: StoragePower,
    qa_committed: StoragePower,
    qualified: i64,
    raw_qualified: StoragePower,
    qa_qualified: StoragePower,
}

/// Recomputes the aggregate fields of power state from the claims table and
/// reports every mismatch.
pub fn check_state_invariants<BS: Blockstore>(
    policy: &Policy,
    state: &State,
    store: &BS,
) -> MessageAccumulator {
    let acc = MessageAccumulator::default();

    for (name, value) in [
        ("raw power", &state.total_raw_byte_power),
        ("qa power", &state.total_quality_adj_power),
        ("raw committed", &state.total_bytes_committed),
        ("qa committed", &state.total_qa_bytes_committed),
    ] {
        acc.require(!value.is_negative(), &format!("total {} is negative: {}", name, value));
    }
    acc.require(
        state.total_raw_byte_power <= state.total_bytes_committed,
        &format!(
            "raw power {} exceeds committed {}",
            state.total_raw_byte_power, state.total_bytes_committed
        ),
    );
    acc.require(
        state.total_quality_adj_power <= state.total_qa_bytes_committed,
        &format!(
            "qa power {} exceeds committed {}",
            state.total_quality_adj_power, state.total_qa_bytes_committed
        ),
    );

    let mut totals = ClaimTotals::default();
    match state.load_claims(store) {
        Ok(claims) => {
            let res = claims.for_each(|_, claim| {
                totals.count += 1;
                totals.raw_committed += &claim.raw_byte_power;
                totals.qa_committed += &claim.quality_adj_power;
                if claim.raw_byte_power >= policy.minimum_consensus_power {
                    totals.qualified += 1;
                    totals.raw_qualified += &claim.raw_byte_power;
                    totals.qa_qualified += &claim.quality_adj_power;
                }
                Ok(())
            });
            acc.require_no_error(res, "error iterating claims");
        }
        Err(e) => {
            acc.add(&format!("error loading claims: {}", e));
            return acc;
        }
    }

    let expect = |what: &str, recorded: String, summed: String| {
        acc.require(
            recorded == summed,
            &format!("{}: recorded {} but claims sum to {}", what, recorded, summed),
        );
    };
    let count = state.miner_count.to_string();
    expect("miner count", count, totals.count.to_string());
    let raw_committed = state.total_bytes_committed.to_string();
    expect("raw committed", raw_committed, totals.raw_committed.to_string());
    let qa_committed = state.total_qa_bytes_committed.to_string();
    expect("qa committed", qa_committed, totals.qa_committed.to_string());
    let qualified = state.miner_above_min_power_count.to_string();
    expect("miners above minimum", qualified, totals.qualified.to_string());
    let raw = state.total_raw_byte_power.to_string();
    expect("raw power", raw, totals.raw_qualified.to_string());
    let qa = state.total_quality_adj_power.to_string();
    expect("qa power", qa, totals.qa_qualified.to_string());
    acc
}
