// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Chain timing constants shared by every actor.

/// Block time. Sector expirations and deal schedules are all expressed in
/// epochs of this length.
pub const EPOCH_DURATION_SECONDS: i64 = 30;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
// 365.24219 days
const SECONDS_PER_YEAR: i64 = 31_556_925;

pub const EPOCHS_IN_HOUR: i64 = 60 * 60 / EPOCH_DURATION_SECONDS;
pub const EPOCHS_IN_DAY: i64 = SECONDS_PER_DAY / EPOCH_DURATION_SECONDS;
pub const EPOCHS_IN_YEAR: i64 = SECONDS_PER_YEAR / EPOCH_DURATION_SECONDS;

/// Expected number of block winners per epoch; scales the block reward.
pub const EXPECTED_LEADERS_PER_EPOCH: u64 = 5;
