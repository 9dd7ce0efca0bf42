// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::MessageAccumulator;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::SectorNumber;
use num_traits::Zero;

use crate::{power_for_sectors, PowerPair, SectorOnChainInfo, State};

pub struct StateSummary {
    pub live_power: PowerPair,
    pub active_power: PowerPair,
    pub faulty_power: PowerPair,
    pub sealed_sectors: BTreeMap<SectorNumber, SectorOnChainInfo>,
}

/// Checks internal invariants of miner state
pub fn check_state_invariants<BS: Blockstore>(
    policy: &Policy,
    state: &State,
    store: &BS,
    balance: &TokenAmount,
) -> (StateSummary, MessageAccumulator) {
    let acc = MessageAccumulator::default();
    let mut summary = StateSummary {
        live_power: PowerPair::zero(),
        active_power: PowerPair::zero(),
        faulty_power: PowerPair::zero(),
        sealed_sectors: BTreeMap::new(),
    };

    acc.require_no_error(
        state.check_balance_invariants(balance),
        "balance invariants broken",
    );

    let info = match state.get_info(store) {
        Ok(info) => info,
        Err(e) => {
            acc.add(&format!("error loading miner info: {e}"));
            return (summary, acc);
        }
    };

    match state.load_sectors(store) {
        Ok(sectors) => {
            let ret = sectors.map.for_each(|number, sector| {
                acc.require(
                    number == sector.sector_number,
                    &format!("sector {} stored under key {}", sector.sector_number, number),
                );
                summary.sealed_sectors.insert(number, sector.clone());
                Ok(())
            });
            acc.require_no_error(ret, "error iterating sectors");
        }
        Err(e) => acc.add(&format!("error loading sectors: {e}")),
    }

    let mut pledge_sum = TokenAmount::zero();
    for sector in summary.sealed_sectors.values() {
        pledge_sum += &sector.initial_pledge;
    }
    acc.require(
        pledge_sum == state.initial_pledge,
        &format!(
            "sum of sector initial pledge {} does not match recorded {}",
            pledge_sum, state.initial_pledge
        ),
    );

    let deadlines = match state.load_deadlines(store) {
        Ok(deadlines) => deadlines,
        Err(e) => {
            acc.add(&format!("error loading deadlines: {e}"));
            return (summary, acc);
        }
    };
    acc.require(
        deadlines.due.len() as u64 == policy.wpost_period_deadlines,
        &format!(
            "expected {} deadlines, found {}",
            policy.wpost_period_deadlines,
            deadlines.due.len()
        ),
    );

    let mut all_sectors = BitField::new();
    let ret = deadlines.for_each(store, |dl_idx, deadline| {
        let acc = acc.with_prefix(&format!("deadline {dl_idx}: "));
        if let Err(e) = deadline.validate_state() {
            acc.add(e);
        }

        let mut live_count = 0;
        let mut total_count = 0;
        let mut faulty_power = PowerPair::zero();
        let partitions = deadline.load_partitions(store)?;
        partitions.for_each(|part_idx, partition| {
            let acc = acc.with_prefix(&format!("partition {part_idx}: "));
            if let Err(e) = partition.validate_state() {
                acc.add(e);
            }
            if partition.sectors.len() > info.window_post_partition_sectors {
                acc.add(&format!("partition holds {} sectors", partition.sectors.len()));
            }
            acc.require(
                !all_sectors.contains_any(&partition.sectors),
                "sectors assigned to more than one partition",
            );
            all_sectors |= &partition.sectors;

            let live = partition.live_sectors();
            let live_infos: Vec<_> =
                live.iter().filter_map(|n| summary.sealed_sectors.get(&n)).collect();
            acc.require(
                live_infos.len() as u64 == live.len(),
                "live sectors missing from sector store",
            );
            let live_power = power_for_sectors(info.sector_size, live_infos);
            acc.require(
                live_power == partition.live_power,
                &format!(
                    "live power {:?} does not match sectors {:?}",
                    partition.live_power, live_power
                ),
            );

            live_count += live.len();
            total_count += partition.sectors.len();
            faulty_power += &partition.faulty_power;
            summary.live_power += &partition.live_power;
            summary.active_power += &partition.active_power();
            summary.faulty_power += &partition.faulty_power;
            Ok(())
        })?;

        acc.require(
            live_count == deadline.live_sectors,
            &format!("live sectors {} recorded as {}", live_count, deadline.live_sectors),
        );
        acc.require(
            total_count == deadline.total_sectors,
            &format!("total sectors {} recorded as {}", total_count, deadline.total_sectors),
        );
        acc.require(
            faulty_power == deadline.faulty_power,
            &format!(
                "faulty power {:?} recorded as {:?}",
                faulty_power, deadline.faulty_power
            ),
        );
        Ok(())
    });
    acc.require_no_error(ret, "error iterating deadlines");

    (summary, acc)
}
