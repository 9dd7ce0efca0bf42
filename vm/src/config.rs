// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actors_runtime::runtime::{Policy, UpgradeSchedule};
use fvm_shared::clock::ChainEpoch;
use fvm_shared::version::NetworkVersion;
use serde::{Deserialize, Serialize};

use crate::gas::{price_list_by_network_version, PriceList};

/// Parameters of the network a VM executes for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_name: String,
    pub upgrade_schedule: UpgradeSchedule,
    pub policy: Policy,
    /// Overrides the price list that would otherwise follow the network version.
    #[serde(default)]
    pub price_list: Option<PriceList>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_name: "localnet".to_string(),
            upgrade_schedule: UpgradeSchedule::default(),
            policy: Policy::default(),
            price_list: None,
        }
    }
}

impl NetworkConfig {
    /// A network running at `nv` from genesis.
    pub fn fixed(network_name: impl Into<String>, nv: NetworkVersion) -> Self {
        Self {
            network_name: network_name.into(),
            upgrade_schedule: UpgradeSchedule::fixed(nv),
            ..Default::default()
        }
    }

    pub fn network_version(&self, epoch: ChainEpoch) -> NetworkVersion {
        self.upgrade_schedule.network_version(epoch)
    }

    pub fn prices(&self, nv: NetworkVersion) -> &PriceList {
        match &self.price_list {
            Some(prices) => prices,
            None => price_list_by_network_version(nv),
        }
    }
}
