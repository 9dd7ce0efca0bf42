// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::bigint::BigInt;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;

pub use self::actor_error::*;
pub use self::builtin::*;
pub use self::util::*;
pub use dispatch::dispatch;

pub mod actor_error;
pub mod builtin;
pub mod runtime;
pub mod util;

mod dispatch;
#[cfg(feature = "test_utils")]
pub mod test_blockstores;
#[cfg(feature = "test_utils")]
pub mod test_utils;

#[macro_use]
extern crate lazy_static;

/// Key hashing used by every HAMT in actor state.
pub type Hasher = fvm_ipld_hamt::Sha256;

/// Deal weight
pub type DealWeight = BigInt;

/// Standard configuration for a HAMT used in actor state: bit width 5, single-level buckets of 3.
pub const DEFAULT_HAMT_CONFIG: Config =
    Config { bit_width: HAMT_BIT_WIDTH, min_data_depth: 0, max_array_width: 3 };

/// Balance tables use a wider fan-out.
pub const BALANCE_TABLE_HAMT_CONFIG: Config =
    Config { bit_width: BALANCE_TABLE_BIT_WIDTH, min_data_depth: 0, max_array_width: 3 };

/// Writes an empty HAMT with the default configuration to the store and returns its root.
pub fn make_empty_map<BS: Blockstore>(store: &BS) -> Result<Cid, ActorError> {
    Map::<_, Vec<u8>, ()>::flush_empty(store, DEFAULT_HAMT_CONFIG)
}

/// Amount locked in a linear vesting schedule `elapsed` epochs after it started.
/// The locked amount rounds up so that funds are never released early.
pub fn linear_vesting_locked(
    initial: &TokenAmount,
    elapsed: ChainEpoch,
    duration: ChainEpoch,
) -> TokenAmount {
    if elapsed >= duration {
        return TokenAmount::zero();
    }
    if elapsed <= 0 {
        return initial.clone();
    }
    let remaining = duration - elapsed;
    let numerator: TokenAmount = initial * remaining;
    TokenAmount::from_atto(num::Integer::div_ceil(numerator.atto(), &BigInt::from(duration)))
}
