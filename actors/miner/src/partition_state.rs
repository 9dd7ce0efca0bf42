// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::{actor_error, ActorError};
use fvm_ipld_bitfield::BitField;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::sector::SectorSize;

use super::{power_for_sectors, PowerPair, SectorOnChainInfo, Sectors};

/// A group of sectors proven together in one Window PoSt.
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, Default, PartialEq)]
pub struct Partition {
    /// Sector numbers in this partition, including faulty and terminated sectors.
    pub sectors: BitField,
    /// Subset of sectors detected/declared faulty and not yet recovered (excl. from PoSt).
    /// Faults ∩ Terminated = ∅
    pub faults: BitField,
    /// Subset of faulty sectors expected to recover on next PoSt
    /// Recoveries ∩ Terminated = ∅
    pub recoveries: BitField,
    /// Subset of sectors terminated but not yet removed from partition (excl. from PoSt)
    pub terminated: BitField,
    /// Power of not-yet-terminated sectors (incl faulty).
    pub live_power: PowerPair,
    /// Power of currently-faulty sectors. FaultyPower <= LivePower.
    pub faulty_power: PowerPair,
    /// Power of expected-to-recover sectors. RecoveringPower <= FaultyPower.
    pub recovering_power: PowerPair,
}

/// Changes produced by recording faults in a partition.
#[derive(Debug, Default)]
pub struct FaultResult {
    /// Sectors that were not already faulty.
    pub new_faults: BitField,
    /// Sector infos of the new faults.
    pub new_fault_infos: Vec<SectorOnChainInfo>,
    /// Power of the new faults.
    pub new_faulty_power: PowerPair,
}

impl Partition {
    pub fn new() -> Self {
        Default::default()
    }

    /// Live sectors are those that are not terminated (but may be faulty).
    pub fn live_sectors(&self) -> BitField {
        &self.sectors - &self.terminated
    }

    /// Active sectors are those that are neither terminated nor faulty, i.e. actively contributing power.
    pub fn active_sectors(&self) -> BitField {
        &self.live_sectors() - &self.faults
    }

    /// Active power is power of non-faulty sectors.
    pub fn active_power(&self) -> PowerPair {
        &self.live_power - &self.faulty_power
    }

    fn require_live(&self, sector_numbers: &BitField) -> Result<(), ActorError> {
        if !self.live_sectors().contains_all(sector_numbers) {
            return Err(actor_error!(
                illegal_argument;
                "sectors are not all live members of the partition"
            ));
        }
        Ok(())
    }

    /// Adds new, active sectors to the partition and returns their power.
    pub fn add_sectors(
        &mut self,
        sector_size: SectorSize,
        sectors: &[SectorOnChainInfo],
    ) -> Result<PowerPair, ActorError> {
        let numbers = BitField::try_from_bits(sectors.iter().map(|s| s.sector_number))
            .map_err(|e| actor_error!(illegal_argument; "invalid sector numbers: {}", e))?;
        if self.sectors.contains_any(&numbers) {
            return Err(actor_error!(illegal_argument; "sectors already in partition"));
        }
        let power = power_for_sectors(sector_size, sectors);
        self.sectors |= &numbers;
        self.live_power += &power;
        Ok(power)
    }

    /// Marks live sectors as faulty. Sectors already faulty are ignored, except that any pending
    /// recovery for them is retracted.
    pub fn record_faults<BS: Blockstore>(
        &mut self,
        sectors: &Sectors<BS>,
        sector_size: SectorSize,
        sector_numbers: &BitField,
    ) -> Result<FaultResult, ActorError> {
        self.require_live(sector_numbers)?;

        let retracted = sector_numbers & &self.recoveries;
        if !retracted.is_empty() {
            let retracted_power =
                power_for_sectors(sector_size, &sectors.load_sectors(&retracted)?);
            self.recoveries = &self.recoveries - &retracted;
            self.recovering_power -= &retracted_power;
        }

        let new_faults = sector_numbers - &self.faults;
        let new_fault_infos = sectors.load_sectors(&new_faults)?;
        let new_faulty_power = power_for_sectors(sector_size, &new_fault_infos);
        self.faults |= &new_faults;
        self.faulty_power += &new_faulty_power;

        Ok(FaultResult { new_faults, new_fault_infos, new_faulty_power })
    }

    /// Declares faulty sectors as recovering. Sectors that are not faulty or are already
    /// recovering are ignored.
    pub fn declare_faults_recovered<BS: Blockstore>(
        &mut self,
        sectors: &Sectors<BS>,
        sector_size: SectorSize,
        sector_numbers: &BitField,
    ) -> Result<PowerPair, ActorError> {
        self.require_live(sector_numbers)?;

        let new_recoveries = &(sector_numbers & &self.faults) - &self.recoveries;
        let power = power_for_sectors(sector_size, &sectors.load_sectors(&new_recoveries)?);
        self.recoveries |= &new_recoveries;
        self.recovering_power += &power;
        Ok(power)
    }

    /// Clears all pending recoveries, restoring their sectors to active status.
    /// Returns the recovered power.
    pub fn recover_faults(&mut self) -> PowerPair {
        let recovered = std::mem::take(&mut self.recovering_power);
        self.faults = &self.faults - &self.recoveries;
        self.recoveries = BitField::new();
        self.faulty_power -= &recovered;
        recovered
    }

    /// Terminates live sectors. Returns the infos of the terminated sectors and the active
    /// power removed, which excludes sectors that were faulty.
    pub fn terminate_sectors<BS: Blockstore>(
        &mut self,
        sectors: &Sectors<BS>,
        sector_size: SectorSize,
        sector_numbers: &BitField,
    ) -> Result<(Vec<SectorOnChainInfo>, PowerPair), ActorError> {
        self.require_live(sector_numbers)?;

        let infos = sectors.load_sectors(sector_numbers)?;
        let removed_power = power_for_sectors(sector_size, &infos);

        let faulty = sector_numbers & &self.faults;
        let faulty_power = power_for_sectors(sector_size, &sectors.load_sectors(&faulty)?);
        let recovering = sector_numbers & &self.recoveries;
        let recovering_power =
            power_for_sectors(sector_size, &sectors.load_sectors(&recovering)?);

        self.terminated |= sector_numbers;
        self.faults = &self.faults - sector_numbers;
        self.recoveries = &self.recoveries - sector_numbers;
        self.live_power -= &removed_power;
        self.faulty_power -= &faulty_power;
        self.recovering_power -= &recovering_power;

        Ok((infos, &removed_power - &faulty_power))
    }

    /// Checks the internal consistency of the bitfields and power totals.
    pub fn validate_state(&self) -> Result<(), &'static str> {
        if !self.sectors.contains_all(&self.terminated) {
            return Err("terminated sectors are not a subset of sectors");
        }
        if self.faults.contains_any(&self.terminated) {
            return Err("faulty sectors are terminated");
        }
        if !self.faults.contains_all(&self.recoveries) {
            return Err("recovering sectors are not a subset of faults");
        }
        if self.live_power.raw < self.faulty_power.raw {
            return Err("faulty power exceeds live power");
        }
        if self.faulty_power.raw < self.recovering_power.raw {
            return Err("recovering power exceeds faulty power");
        }
        Ok(())
    }
}
