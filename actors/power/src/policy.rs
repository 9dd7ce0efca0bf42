// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_shared::sector::StoragePower;

lazy_static! {
    /// Starting position of the smoothed quality-adjusted power estimate: 750 TiB.
    pub static ref INITIAL_QA_POWER_ESTIMATE_POSITION: StoragePower =
        StoragePower::from(750_000) * (1 << 30);
    /// Starting velocity of the smoothed quality-adjusted power estimate: 3.75 TiB per epoch.
    pub static ref INITIAL_QA_POWER_ESTIMATE_VELOCITY: StoragePower =
        StoragePower::from(3_840) * (1 << 30);
}
