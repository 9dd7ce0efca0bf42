// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use anyhow::anyhow;
use fc_actors_runtime::runtime::Policy;
use fvm_ipld_bitfield::BitField;

/// Maps deadlines to partition maps.
#[derive(Default, Debug)]
pub struct DeadlineSectorMap(BTreeMap<u64, PartitionSectorMap>);

impl DeadlineSectorMap {
    pub fn new() -> Self {
        Default::default()
    }

    /// Counts the number of partitions & sectors contained within the map, and returns an
    /// error if they exceed the given maximums.
    pub fn check(&self, max_partitions: u64, max_sectors: u64) -> anyhow::Result<()> {
        let (partition_count, sector_count) =
            self.count().map_err(|e| anyhow!("failed to count sectors: {:?}", e))?;

        if partition_count > max_partitions {
            return Err(anyhow!("too many partitions {}, max {}", partition_count, max_partitions));
        }

        if sector_count > max_sectors {
            return Err(anyhow!("too many sectors {}, max {}", sector_count, max_sectors));
        }

        Ok(())
    }

    /// Counts the number of partitions & sectors within the map.
    pub fn count(&self) -> anyhow::Result<(/* partitions */ u64, /* sectors */ u64)> {
        self.0.iter().try_fold((0_u64, 0_u64), |(partitions, sectors), (deadline_idx, pm)| {
            let (partition_count, sector_count) = pm
                .count()
                .map_err(|e| anyhow!("when counting deadline {}: {:?}", deadline_idx, e))?;
            Ok((
                partitions
                    .checked_add(partition_count)
                    .ok_or_else(|| anyhow!("integer overflow when counting partitions"))?,
                sectors
                    .checked_add(sector_count)
                    .ok_or_else(|| anyhow!("integer overflow when counting sectors"))?,
            ))
        })
    }

    /// Records the given sector bitfield at the given deadline/partition index.
    pub fn add(
        &mut self,
        policy: &Policy,
        deadline_idx: u64,
        partition_idx: u64,
        sector_numbers: BitField,
    ) -> anyhow::Result<()> {
        if deadline_idx >= policy.wpost_period_deadlines {
            return Err(anyhow!("invalid deadline {}", deadline_idx));
        }

        self.0.entry(deadline_idx).or_default().add(partition_idx, sector_numbers)
    }

    /// Records the given sectors at the given deadline/partition index.
    pub fn add_values(
        &mut self,
        policy: &Policy,
        deadline_idx: u64,
        partition_idx: u64,
        sector_numbers: &[u64],
    ) -> anyhow::Result<()> {
        self.add(
            policy,
            deadline_idx,
            partition_idx,
            BitField::try_from_bits(sector_numbers.iter().copied())?,
        )
    }

    /// Returns the deadlines in the map, in ascending order.
    pub fn deadlines(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.keys().copied()
    }

    /// Walks the deadlines in deadline order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &PartitionSectorMap)> + '_ {
        self.0.iter().map(|(&i, x)| (i, x))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Maps partitions to sector bitfields.
#[derive(Default, Debug)]
pub struct PartitionSectorMap(BTreeMap<u64, BitField>);

impl PartitionSectorMap {
    /// Records the given sectors at the given partition.
    pub fn add_values(
        &mut self,
        partition_idx: u64,
        sector_numbers: Vec<u64>,
    ) -> anyhow::Result<()> {
        self.add(partition_idx, BitField::try_from_bits(sector_numbers)?)
    }

    /// Records the given sector bitfield at the given partition index, merging
    /// it with any existing bitfields if necessary.
    pub fn add(&mut self, partition_idx: u64, sector_numbers: BitField) -> anyhow::Result<()> {
        match self.0.get_mut(&partition_idx) {
            Some(old_sector_numbers) => {
                *old_sector_numbers |= &sector_numbers;
            }
            None => {
                self.0.insert(partition_idx, sector_numbers);
            }
        }
        Ok(())
    }

    /// Counts the number of partitions & sectors within the map.
    pub fn count(&self) -> anyhow::Result<(/* partitions */ u64, /* sectors */ u64)> {
        let sectors = self.0.values().try_fold(0_u64, |sectors, bf| {
            sectors
                .checked_add(bf.len())
                .ok_or_else(|| anyhow!("integer overflow when counting sectors"))
        })?;
        Ok((self.0.len() as u64, sectors))
    }

    /// Returns the partitions in the map, in ascending order.
    pub fn partitions(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.keys().copied()
    }

    /// Walks the partitions in the map, in order of increasing index.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &BitField)> + '_ {
        self.0.iter().map(|(&i, x)| (i, x))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
