// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::{actor_error, ActorError, Config, Map, DEFAULT_HAMT_CONFIG};
use fvm_ipld_bitfield::BitField;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::sector::SectorNumber;

use super::SectorOnChainInfo;

pub const SECTORS_CONFIG: Config = DEFAULT_HAMT_CONFIG;

/// Proven sectors of a miner, keyed by sector number.
pub struct Sectors<BS: Blockstore> {
    pub map: Map<BS, SectorNumber, SectorOnChainInfo>,
}

impl<BS: Blockstore> Sectors<BS> {
    pub fn load(store: BS, root: &Cid) -> Result<Self, ActorError> {
        Ok(Self { map: Map::load(store, root, SECTORS_CONFIG, "sectors")? })
    }

    /// Loads the infos for every sector in the bitfield, failing if any is missing.
    pub fn load_sectors(&self, sectors: &BitField) -> Result<Vec<SectorOnChainInfo>, ActorError> {
        sectors
            .iter()
            .map(|number| {
                self.map
                    .try_get(&number)?
                    .cloned()
                    .ok_or_else(|| actor_error!(not_found; "sector {} not found", number))
            })
            .collect()
    }

    pub fn get(&self, number: SectorNumber) -> Result<Option<SectorOnChainInfo>, ActorError> {
        Ok(self.map.try_get(&number)?.cloned())
    }

    pub fn store(&mut self, infos: Vec<SectorOnChainInfo>) -> Result<(), ActorError> {
        for info in infos {
            let number = info.sector_number;
            if self.map.set(&number, info)?.is_some() {
                return Err(actor_error!(illegal_state; "sector {} already stored", number));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, sectors: &BitField) -> Result<(), ActorError> {
        for number in sectors.iter() {
            self.map.remove(&number)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<Cid, ActorError> {
        self.map.flush()
    }
}
