// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actor_cron::{Actor as CronActor, ConstructorParams, Entry, Method, State};
use fc_actors_runtime::test_utils::*;
use fc_actors_runtime::{
    STORAGE_MARKET_ACTOR_ADDR, STORAGE_POWER_ACTOR_ADDR, SYSTEM_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::MethodNum;

fn construct_runtime() -> MockRuntime {
    let rt = MockRuntime::new(Address::new_id(3));
    rt.set_caller(*SYSTEM_ACTOR_CODE_ID, SYSTEM_ACTOR_ADDR);
    rt
}

fn construct_and_verify(rt: &MockRuntime, params: &ConstructorParams) {
    rt.expect_validate_caller_addr(vec![SYSTEM_ACTOR_ADDR]);
    let ret = rt
        .call::<CronActor>(
            Method::Constructor as MethodNum,
            IpldBlock::serialize_cbor(params).unwrap(),
        )
        .unwrap();
    expect_empty(ret);
    rt.verify();
}

fn epoch_tick_and_verify(rt: &MockRuntime) {
    rt.expect_validate_caller_addr(vec![SYSTEM_ACTOR_ADDR]);
    let ret = rt.call::<CronActor>(Method::EpochTick as MethodNum, None).unwrap();
    expect_empty(ret);
    rt.verify();
}

#[test]
fn construct_with_empty_entries() {
    let rt = construct_runtime();

    construct_and_verify(&rt, &ConstructorParams::default());
    let state: State = rt.get_state();

    assert!(state.entries.is_empty());
}

#[test]
fn construct_with_entries() {
    let rt = construct_runtime();

    let entry1 = Entry { receiver: Address::new_id(1001), method_num: 1001 };
    let entry2 = Entry { receiver: Address::new_id(1002), method_num: 1002 };
    let params = ConstructorParams { entries: vec![entry1.clone(), entry2.clone()] };

    construct_and_verify(&rt, &params);

    let state: State = rt.get_state();
    assert_eq!(vec![entry1, entry2], state.entries);
}

#[test]
fn epoch_tick_with_empty_entries() {
    let rt = construct_runtime();

    construct_and_verify(&rt, &ConstructorParams::default());
    epoch_tick_and_verify(&rt);
}

#[test]
fn epoch_tick_with_entries() {
    let rt = construct_runtime();

    let entry1 = Entry { receiver: STORAGE_POWER_ACTOR_ADDR, method_num: 5 };
    let entry2 = Entry { receiver: STORAGE_MARKET_ACTOR_ADDR, method_num: 8 };
    let entry3 = Entry { receiver: Address::new_id(1003), method_num: 1003 };
    let params = ConstructorParams { entries: vec![entry1.clone(), entry2.clone(), entry3.clone()] };

    construct_and_verify(&rt, &params);

    // Sends go out in entry order and a failing entry does not stop the rest.
    rt.expect_send(
        entry1.receiver,
        entry1.method_num,
        None,
        TokenAmount::default(),
        None,
        ExitCode::OK,
    );
    rt.expect_send(
        entry2.receiver,
        entry2.method_num,
        None,
        TokenAmount::default(),
        None,
        ExitCode::USR_ILLEGAL_ARGUMENT,
    );
    rt.expect_send(
        entry3.receiver,
        entry3.method_num,
        None,
        TokenAmount::default(),
        None,
        ExitCode::OK,
    );

    epoch_tick_and_verify(&rt);
}

#[test]
fn epoch_tick_requires_system_caller() {
    let rt = construct_runtime();
    construct_and_verify(&rt, &ConstructorParams::default());

    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, Address::new_id(1234));
    rt.expect_validate_caller_addr(vec![SYSTEM_ACTOR_ADDR]);
    expect_abort(
        ExitCode::USR_FORBIDDEN,
        rt.call::<CronActor>(Method::EpochTick as MethodNum, None),
    );
    rt.verify();
}
