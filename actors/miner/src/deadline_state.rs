// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::{
    actor_error, ActorContext, ActorError, AsActorError, Config, Map, DEFAULT_HAMT_CONFIG,
};
use fvm_ipld_bitfield::BitField;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::CborStore;
use fvm_shared::clock::{ChainEpoch, EPOCH_UNDEFINED};
use fvm_shared::error::ExitCode;
use fvm_shared::sector::SectorSize;
use multihash::Code;
use num_traits::Signed;

use super::{Partition, PowerPair, SectorOnChainInfo};

pub const PARTITIONS_CONFIG: Config = DEFAULT_HAMT_CONFIG;

pub type PartitionsMap<BS> = Map<BS, u64, Partition>;

/// Timing of one Window PoSt deadline within a proving period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineInfo {
    /// Epoch at which this info was calculated.
    pub current_epoch: ChainEpoch,
    /// First epoch of the proving period (<= CurrentEpoch).
    pub period_start: ChainEpoch,
    /// Current deadline index, in [0..WPoStProvingPeriodDeadlines).
    pub index: u64,
    /// First epoch from which a proof may be submitted (>= CurrentEpoch).
    pub open: ChainEpoch,
    /// First epoch from which a proof may no longer be submitted (>= Open).
    pub close: ChainEpoch,
    /// Epoch at which to sample the chain for challenge (< Open).
    pub challenge: ChainEpoch,
}

impl DeadlineInfo {
    pub fn new(
        policy: &Policy,
        period_start: ChainEpoch,
        index: u64,
        current_epoch: ChainEpoch,
    ) -> Self {
        let open = period_start + (index as i64) * policy.wpost_challenge_window;
        Self {
            current_epoch,
            period_start,
            index,
            open,
            close: open + policy.wpost_challenge_window,
            challenge: open - policy.wpost_challenge_lookback,
        }
    }

    pub fn is_open(&self) -> bool {
        self.current_epoch >= self.open && self.current_epoch < self.close
    }
}

/// The deadline open at `current_epoch` for a miner whose proving periods are aligned to
/// `proving_period_start`.
pub fn current_deadline_info(
    policy: &Policy,
    proving_period_start: ChainEpoch,
    current_epoch: ChainEpoch,
) -> DeadlineInfo {
    let progress = (current_epoch - proving_period_start).rem_euclid(policy.wpost_proving_period);
    let period_start = current_epoch - progress;
    let index = (progress / policy.wpost_challenge_window) as u64;
    DeadlineInfo::new(policy, period_start, index, current_epoch)
}

/// Roots of all the deadlines of a proving period.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone, PartialEq, Eq)]
pub struct Deadlines {
    pub due: Vec<Cid>,
}

impl Deadlines {
    pub fn new(policy: &Policy, empty_deadline_cid: Cid) -> Self {
        Self { due: vec![empty_deadline_cid; policy.wpost_period_deadlines as usize] }
    }

    pub fn load_deadline<BS: Blockstore>(
        &self,
        store: &BS,
        idx: u64,
    ) -> Result<Deadline, ActorError> {
        let root = self
            .due
            .get(idx as usize)
            .ok_or_else(|| actor_error!(illegal_argument; "invalid deadline {}", idx))?;
        store
            .get_cbor(root)
            .with_context_code(ExitCode::USR_ILLEGAL_STATE, || {
                format!("failed to load deadline {}", idx)
            })?
            .ok_or_else(|| actor_error!(illegal_state; "deadline {} not found", idx))
    }

    pub fn update_deadline<BS: Blockstore>(
        &mut self,
        store: &BS,
        idx: u64,
        deadline: &Deadline,
    ) -> Result<(), ActorError> {
        let slot = self
            .due
            .get_mut(idx as usize)
            .ok_or_else(|| actor_error!(illegal_argument; "invalid deadline {}", idx))?;
        *slot = store
            .put_cbor(deadline, Code::Blake2b256)
            .with_context_code(ExitCode::USR_ILLEGAL_STATE, || {
                format!("failed to store deadline {}", idx)
            })?;
        Ok(())
    }

    pub fn for_each<BS: Blockstore>(
        &self,
        store: &BS,
        mut f: impl FnMut(u64, Deadline) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        for idx in 0..self.due.len() as u64 {
            f(idx, self.load_deadline(store, idx)?)?;
        }
        Ok(())
    }
}

/// Deadline holds the state for all sectors due at a specific deadline.
#[derive(Serialize_tuple, Deserialize_tuple, Debug, Clone)]
pub struct Deadline {
    /// Partitions in this deadline, in order.
    pub partitions: Cid, // Map, HAMT[u64]Partition
    /// Partitions proven in the challenge window opening at `posted_window`.
    pub partitions_posted: BitField,
    pub posted_window: ChainEpoch,
    /// The number of non-terminated sectors in this deadline (incl faulty).
    pub live_sectors: u64,
    /// The total number of sectors in this deadline (incl dead).
    pub total_sectors: u64,
    /// Memoized sum of faulty power in partitions.
    pub faulty_power: PowerPair,
}

impl Deadline {
    pub fn new<BS: Blockstore>(store: &BS) -> Result<Self, ActorError> {
        let empty_partitions = PartitionsMap::flush_empty(store, PARTITIONS_CONFIG)
            .context("failed to create empty partitions map")?;
        Ok(Self {
            partitions: empty_partitions,
            partitions_posted: BitField::new(),
            posted_window: EPOCH_UNDEFINED,
            live_sectors: 0,
            total_sectors: 0,
            faulty_power: PowerPair::zero(),
        })
    }

    /// Forgets the posts of earlier challenge windows.
    pub fn start_window(&mut self, window_open: ChainEpoch) {
        if self.posted_window != window_open {
            self.partitions_posted = BitField::new();
            self.posted_window = window_open;
        }
    }

    pub fn load_partitions<BS: Blockstore>(
        &self,
        store: BS,
    ) -> Result<PartitionsMap<BS>, ActorError> {
        PartitionsMap::load(store, &self.partitions, PARTITIONS_CONFIG, "partitions")
    }

    pub fn partition_count<BS: Blockstore>(&self, store: &BS) -> Result<u64, ActorError> {
        Ok(self.load_partitions(store)?.collect_keys()?.len() as u64)
    }

    pub fn load_partition<BS: Blockstore>(
        &self,
        store: &BS,
        idx: u64,
    ) -> Result<Partition, ActorError> {
        self.load_partitions(store)?
            .try_get(&idx)?
            .cloned()
            .ok_or_else(|| actor_error!(not_found; "no partition {}", idx))
    }

    pub fn save_partition<BS: Blockstore>(
        &mut self,
        store: &BS,
        idx: u64,
        partition: Partition,
    ) -> Result<(), ActorError> {
        let mut partitions = self.load_partitions(store)?;
        partitions.set(&idx, partition)?;
        self.partitions = partitions.flush()?;
        Ok(())
    }

    /// Adds sectors to the deadline, filling the last partition up to `partition_size` before
    /// opening new ones. Returns the power added and the partition each sector landed in.
    pub fn add_sectors<BS: Blockstore>(
        &mut self,
        store: &BS,
        partition_size: u64,
        sector_size: SectorSize,
        mut sectors: &[SectorOnChainInfo],
    ) -> Result<(PowerPair, Vec<(u64, u64)>), ActorError> {
        let mut partitions = self.load_partitions(store)?;
        let mut next_idx = partitions.collect_keys()?.into_iter().max().unwrap_or(0);
        let mut total_power = PowerPair::zero();
        let mut assignments = Vec::with_capacity(sectors.len());

        while !sectors.is_empty() {
            let mut partition = partitions.try_get(&next_idx)?.cloned().unwrap_or_default();
            let room = partition_size.saturating_sub(partition.sectors.len()) as usize;
            if room == 0 {
                next_idx += 1;
                continue;
            }
            let take = room.min(sectors.len());
            let (batch, rest) = sectors.split_at(take);
            sectors = rest;

            total_power += &partition.add_sectors(sector_size, batch)?;
            assignments.extend(batch.iter().map(|s| (s.sector_number, next_idx)));
            partitions.set(&next_idx, partition)?;
        }

        self.partitions = partitions.flush()?;
        let added = assignments.len() as u64;
        self.live_sectors += added;
        self.total_sectors += added;
        Ok((total_power, assignments))
    }

    pub fn validate_state(&self) -> Result<(), &'static str> {
        if self.live_sectors > self.total_sectors {
            return Err("deadline has more live sectors than total");
        }
        if self.faulty_power.raw.is_negative() {
            return Err("deadline faulty power is negative");
        }
        Ok(())
    }
}
