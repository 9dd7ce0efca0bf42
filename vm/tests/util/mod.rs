// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#![allow(dead_code)]

use fc_actors_runtime::test_utils::new_bls_addr;
use fc_vm::{ApplyRet, FakeExterns, NetworkConfig, SyncBlockstore, VM};
use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::message::Message;
use fvm_shared::version::NetworkVersion;
use fvm_shared::MethodNum;
use num_traits::Zero;
use serde::Serialize;

pub const GAS_LIMIT: u64 = 10_000_000_000;

/// A VM at network version 10 with the singleton actors in place.
pub fn genesis(store: &SyncBlockstore) -> VM<'_, SyncBlockstore> {
    genesis_with(store, NetworkConfig::fixed("test", NetworkVersion::V10), FakeExterns::new())
}

pub fn genesis_with(
    store: &SyncBlockstore,
    config: NetworkConfig,
    externs: FakeExterns,
) -> VM<'_, SyncBlockstore> {
    VM::genesis(store, config, externs, TokenAmount::from_whole(1_000_000)).unwrap()
}

/// Creates `n` BLS-keyed accounts, returning their ID addresses.
pub fn create_accounts(
    v: &VM<'_, SyncBlockstore>,
    n: u8,
    balance: TokenAmount,
) -> Vec<Address> {
    create_accounts_seeded(v, 0, n, balance)
}

pub fn create_accounts_seeded(
    v: &VM<'_, SyncBlockstore>,
    seed: u8,
    n: u8,
    balance: TokenAmount,
) -> Vec<Address> {
    (seed..seed + n)
        .map(|s| v.create_account(&new_bls_addr(s + 1), balance.clone()).unwrap())
        .collect()
}

/// A message from `from` carrying its current nonce, with free gas.
pub fn message<S: Serialize>(
    v: &VM<'_, SyncBlockstore>,
    from: Address,
    to: Address,
    value: TokenAmount,
    method: MethodNum,
    params: Option<S>,
) -> Message {
    let sequence = v.actor(&from).unwrap().map(|a| a.nonce).unwrap_or_default();
    Message {
        version: 0,
        from,
        to,
        sequence,
        value,
        method_num: method,
        params: params.map(|p| RawBytes::serialize(p).unwrap()).unwrap_or_default(),
        gas_limit: GAS_LIMIT,
        gas_fee_cap: TokenAmount::zero(),
        gas_premium: TokenAmount::zero(),
    }
}

pub fn apply_ok<S: Serialize>(
    v: &VM<'_, SyncBlockstore>,
    from: Address,
    to: Address,
    value: TokenAmount,
    method: MethodNum,
    params: Option<S>,
) -> ApplyRet {
    apply_code(v, from, to, value, method, params, ExitCode::OK)
}

pub fn apply_code<S: Serialize>(
    v: &VM<'_, SyncBlockstore>,
    from: Address,
    to: Address,
    value: TokenAmount,
    method: MethodNum,
    params: Option<S>,
    code: ExitCode,
) -> ApplyRet {
    let ret = v.apply_message(&message(v, from, to, value, method, params)).unwrap();
    assert_eq!(code, ret.exit_code(), "unexpected exit: {:?}", ret.failure_info);
    ret
}
