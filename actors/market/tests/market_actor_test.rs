// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actor_market::{
    deal_weight, Actor as MarketActor, ComputeDataCommitmentParams, ComputeDataCommitmentReturn,
    Method, State, WithdrawBalanceParams,
};
use fc_actors_runtime::runtime::Type;
use fc_actors_runtime::test_utils::*;
use fc_actors_runtime::BURNT_FUNDS_ACTOR_ADDR;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::clock::EPOCH_UNDEFINED;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::piece::PieceInfo;
use fvm_shared::sector::RegisteredSealProof;
use fvm_shared::{MethodNum, METHOD_SEND};
use num_traits::Zero;
use test_case::test_case;

use harness::*;

mod harness;

const SECTOR_EXPIRY: i64 = 1000;

#[test]
fn construct_empty_market() {
    let rt = setup();
    let st: State = rt.get_state();
    assert_eq!(0, st.next_id);
    assert_eq!(EPOCH_UNDEFINED, st.last_cron);
    assert_eq!(TokenAmount::zero(), st.total_locked());
    check_state(&rt);
}

#[test]
fn constructor_rejects_other_callers() {
    let rt = MockRuntime::new(fc_actors_runtime::STORAGE_MARKET_ACTOR_ADDR);
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, CLIENT);
    rt.expect_validate_caller_addr(vec![
        fc_actors_runtime::SYSTEM_ACTOR_ADDR,
        fc_actors_runtime::INIT_ACTOR_ADDR,
    ]);
    expect_abort(
        ExitCode::USR_FORBIDDEN,
        rt.call::<MarketActor>(Method::Constructor as MethodNum, None),
    );
    rt.verify();
}

#[test]
fn add_balance_accumulates_in_escrow() {
    let rt = setup();
    add_participant_funds(&rt, CLIENT, TokenAmount::from_atto(1000));
    add_participant_funds(&rt, CLIENT, TokenAmount::from_atto(234));

    assert_eq!(TokenAmount::from_atto(1234), get_escrow_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &CLIENT));
    check_state(&rt);
}

#[test]
fn add_balance_requires_positive_value() {
    let rt = setup();
    expect_abort(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        add_balance_raw(&rt, CLIENT, CLIENT, TokenAmount::zero()),
    );
    rt.verify();
}

#[test]
fn add_balance_for_miner_requires_owner_or_worker() {
    let rt = setup();
    expect_provider_control_address(&rt, PROVIDER);
    expect_abort_contains_message(
        ExitCode::USR_FORBIDDEN,
        "neither owner nor worker",
        add_balance_raw(&rt, CLIENT, PROVIDER, TokenAmount::from_atto(10)),
    );
    rt.verify();

    // the worker may fund the miner too
    expect_provider_control_address(&rt, PROVIDER);
    add_balance_raw(&rt, WORKER, PROVIDER, TokenAmount::from_atto(10)).unwrap();
    rt.verify();
    assert_eq!(TokenAmount::from_atto(10), get_escrow_balance(&rt, &PROVIDER));
    assert_eq!(TokenAmount::zero(), get_escrow_balance(&rt, &WORKER));
}

#[test]
fn withdraw_client_balance_partially() {
    let rt = setup();
    add_participant_funds(&rt, CLIENT, TokenAmount::from_atto(1000));

    withdraw_client_balance(&rt, CLIENT, TokenAmount::from_atto(400), TokenAmount::from_atto(400));
    assert_eq!(TokenAmount::from_atto(600), get_escrow_balance(&rt, &CLIENT));
    check_state(&rt);
}

#[test]
fn withdraw_provider_balance_pays_owner() {
    let rt = setup();
    add_provider_funds(&rt, TokenAmount::from_atto(700));

    withdraw_provider_balance(&rt, TokenAmount::from_atto(700), TokenAmount::from_atto(700));
    assert_eq!(TokenAmount::zero(), get_escrow_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn withdraw_never_touches_locked_funds() {
    let rt = setup();
    let deal = funded_deal(&rt);
    add_participant_funds(&rt, CLIENT, TokenAmount::from_atto(50));
    publish_deals(&rt, &[deal.clone()]);

    // only the unlocked remainder comes out
    withdraw_client_balance(&rt, CLIENT, TokenAmount::from_atto(10_000), TokenAmount::from_atto(50));
    assert_eq!(deal.client_balance_requirement(), get_escrow_balance(&rt, &CLIENT));
    assert_eq!(deal.client_balance_requirement(), get_locked_balance(&rt, &CLIENT));

    withdraw_provider_balance(&rt, TokenAmount::from_atto(1), TokenAmount::zero());
    assert_eq!(deal.provider_collateral, get_escrow_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn withdraw_rejects_negative_amount() {
    let rt = setup();
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, CLIENT);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    let params =
        WithdrawBalanceParams { provider_or_client: CLIENT, amount: TokenAmount::from_atto(-1) };
    expect_abort(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        rt.call::<MarketActor>(
            Method::WithdrawBalance as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        ),
    );
    rt.verify();
}

#[test]
fn withdraw_by_other_party_is_forbidden() {
    let rt = setup();
    add_participant_funds(&rt, CLIENT, TokenAmount::from_atto(1000));

    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, CONTROL);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    rt.expect_validate_caller_addr(vec![CLIENT]);
    let params =
        WithdrawBalanceParams { provider_or_client: CLIENT, amount: TokenAmount::from_atto(1) };
    expect_abort(
        ExitCode::USR_FORBIDDEN,
        rt.call::<MarketActor>(
            Method::WithdrawBalance as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        ),
    );
    rt.verify();
    assert_eq!(TokenAmount::from_atto(1000), get_escrow_balance(&rt, &CLIENT));
}

#[test]
fn withdraw_by_miner_actor_is_rejected_before_any_send() {
    let rt = setup();
    add_provider_funds(&rt, TokenAmount::from_atto(500));

    rt.set_caller(*MINER_ACTOR_CODE_ID, PROVIDER);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    let params =
        WithdrawBalanceParams { provider_or_client: PROVIDER, amount: TokenAmount::from_atto(1) };
    expect_abort(
        ExitCode::USR_FORBIDDEN,
        rt.call::<MarketActor>(
            Method::WithdrawBalance as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        ),
    );
    rt.verify();
    assert_eq!(TokenAmount::from_atto(500), get_escrow_balance(&rt, &PROVIDER));
}

#[test]
fn publish_locks_funds_and_indexes_deals() {
    let rt = setup();
    let deal1 = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH, END_EPOCH);
    let deal2 = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH + 1, END_EPOCH);
    add_participant_funds(
        &rt,
        CLIENT,
        deal1.client_balance_requirement() + deal2.client_balance_requirement(),
    );
    add_provider_funds(&rt, &deal1.provider_collateral + &deal2.provider_collateral);

    let ids = publish_deals(&rt, &[deal1.clone(), deal2.clone()]);
    assert_eq!(vec![0, 1], ids);

    assert_eq!(Some(deal1.clone()), get_proposal(&rt, 0));
    assert_eq!(Some(deal2.clone()), get_proposal(&rt, 1));
    assert!(get_deal_state(&rt, 0).is_none());

    let st: State = rt.get_state();
    assert_eq!(2, st.next_id);
    assert_eq!(vec![0, 1], {
        let mut ids = st.deals_for_party(&rt.store, &CLIENT).unwrap();
        ids.sort_unstable();
        ids
    });
    assert!(st.has_pending_proposal(&rt.store, &deal1.cid().unwrap()).unwrap());
    assert_eq!(
        deal1.client_balance_requirement() + deal2.client_balance_requirement(),
        get_locked_balance(&rt, &CLIENT)
    );
    assert_eq!(get_escrow_balance(&rt, &PROVIDER), get_locked_balance(&rt, &PROVIDER));
    assert_eq!(
        &deal1.total_storage_fee() + &deal2.total_storage_fee(),
        st.total_client_storage_fee
    );
    check_state(&rt);
}

#[test]
fn publish_resolves_key_addresses() {
    let rt = setup();
    let client_key = new_bls_addr(7);
    rt.add_id_address(client_key, CLIENT);

    let mut deal = funded_deal(&rt);
    deal.client = client_key;
    let ids = publish_deals(&rt, &[deal.clone()]);

    let stored = get_proposal(&rt, ids[0]).unwrap();
    assert_eq!(CLIENT, stored.client);
    assert_eq!(PROVIDER, stored.provider);
    check_state(&rt);
}

#[test]
fn publish_fails_on_empty_deal_list() {
    let rt = setup();
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, WORKER);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    expect_abort_contains_message(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        "empty deals",
        publish_deals_raw(&rt, &[]),
    );
    rt.verify();
}

#[test]
fn publish_must_come_from_worker() {
    let rt = setup();
    let deal = funded_deal(&rt);

    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, OWNER);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    expect_provider_control_address(&rt, PROVIDER);
    expect_abort(ExitCode::USR_FORBIDDEN, publish_deals_raw(&rt, &[deal]));
    rt.verify();
}

#[test]
fn publish_requires_miner_provider() {
    let rt = setup();
    let deal = generate_deal_proposal(CLIENT, CONTROL, START_EPOCH, END_EPOCH);

    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, WORKER);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    expect_abort_contains_message(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        "not a storage miner",
        publish_deals_raw(&rt, &[deal]),
    );
    rt.verify();
}

#[test]
fn publish_rejects_bad_signature() {
    let rt = setup();
    let deal = funded_deal(&rt);

    expect_publish_preamble(&rt);
    expect_client_signature(&rt, &deal, false);
    expect_abort_contains_message(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        "signature",
        publish_deals_raw(&rt, &[deal]),
    );
    rt.verify();
    check_state(&rt);
}

#[test_case(|d| d.start_epoch = 50 ; "start epoch already elapsed")]
#[test_case(|d| d.end_epoch = d.start_epoch ; "end not after start")]
#[test_case(|d| d.end_epoch = d.start_epoch + 50 ; "duration too short")]
#[test_case(|d| d.label = "x".repeat(257) ; "label too long")]
#[test_case(|d| d.piece_cid = make_sealed_cid(b"sector") ; "not a piece cid")]
#[test_case(|d| d.piece_size = fvm_shared::piece::PaddedPieceSize(1000) ; "invalid piece size")]
#[test_case(|d| d.storage_price_per_epoch = TokenAmount::from_atto(-1) ; "negative price")]
#[test_case(|d| d.client_collateral = TokenAmount::from_atto(-1) ; "negative client collateral")]
fn publish_rejects_invalid_deal(mutate: fn(&mut fc_actor_market::DealProposal)) {
    let rt = setup();
    let mut deal = funded_deal(&rt);
    mutate(&mut deal);
    rt.set_epoch(START_EPOCH - 20);

    expect_publish_preamble(&rt);
    expect_client_signature(&rt, &deal, true);
    expect_abort(ExitCode::USR_ILLEGAL_ARGUMENT, publish_deals_raw(&rt, &[deal]));
    rt.verify();

    let st: State = rt.get_state();
    assert_eq!(0, st.next_id);
    check_state(&rt);
}

#[test]
fn publish_rejects_mixed_providers() {
    let rt = setup();
    let deal1 = funded_deal(&rt);
    let deal2 = generate_deal_proposal(CLIENT, CONTROL, START_EPOCH, END_EPOCH);

    expect_publish_preamble(&rt);
    expect_client_signature(&rt, &deal1, true);
    expect_client_signature(&rt, &deal2, true);
    expect_abort_contains_message(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        "multiple providers",
        publish_deals_raw(&rt, &[deal1, deal2]),
    );
    rt.verify();
}

#[test]
fn publish_fails_without_client_funds() {
    let rt = setup();
    let deal = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH, END_EPOCH);
    add_participant_funds(&rt, CLIENT, TokenAmount::from_atto(1));
    add_provider_funds(&rt, deal.provider_collateral.clone());

    expect_publish_preamble(&rt);
    expect_client_signature(&rt, &deal, true);
    expect_abort(ExitCode::USR_INSUFFICIENT_FUNDS, publish_deals_raw(&rt, &[deal]));
    rt.verify();
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn publish_batch_is_atomic() {
    let rt = setup();
    // enough for the first deal only
    let deal1 = funded_deal(&rt);
    let deal2 = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH + 1, END_EPOCH);

    expect_publish_preamble(&rt);
    expect_client_signature(&rt, &deal1, true);
    expect_client_signature(&rt, &deal2, true);
    expect_abort(ExitCode::USR_INSUFFICIENT_FUNDS, publish_deals_raw(&rt, &[deal1, deal2]));
    rt.verify();

    assert!(get_proposal(&rt, 0).is_none());
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &CLIENT));
    check_state(&rt);
}

#[test]
fn publish_rejects_duplicate_proposal() {
    let rt = setup();
    let deal = funded_deal(&rt);
    add_participant_funds(&rt, CLIENT, deal.client_balance_requirement());
    add_provider_funds(&rt, deal.provider_collateral.clone());
    publish_deals(&rt, &[deal.clone()]);

    expect_publish_preamble(&rt);
    expect_client_signature(&rt, &deal, true);
    expect_abort_contains_message(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        "duplicate",
        publish_deals_raw(&rt, &[deal.clone()]),
    );
    rt.verify();

    // the same proposal is accepted again once the first one is activated
    rt.set_epoch(START_EPOCH - 10);
    activate_deals(&rt, SECTOR_EXPIRY, &[0]);
    assert_eq!(vec![1], publish_deals(&rt, &[deal]));
    check_state(&rt);
}

#[test]
fn activation_returns_deal_weights() {
    let rt = setup();
    let deal1 = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH, END_EPOCH);
    let mut deal2 = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH + 1, END_EPOCH);
    deal2.verified_deal = true;
    add_participant_funds(
        &rt,
        CLIENT,
        deal1.client_balance_requirement() + deal2.client_balance_requirement(),
    );
    add_provider_funds(&rt, &deal1.provider_collateral + &deal2.provider_collateral);
    let ids = publish_deals(&rt, &[deal1.clone(), deal2.clone()]);

    rt.set_epoch(START_EPOCH - 10);
    let ret = activate_deals(&rt, SECTOR_EXPIRY, &ids);
    assert_eq!(deal_weight(&deal1), ret.deal_weight);
    assert_eq!(deal_weight(&deal2), ret.verified_deal_weight);

    let state = get_deal_state(&rt, ids[0]).unwrap();
    assert_eq!(START_EPOCH - 10, state.sector_start_epoch);
    assert_eq!(EPOCH_UNDEFINED, state.last_updated_epoch);
    assert_eq!(EPOCH_UNDEFINED, state.slash_epoch);

    let st: State = rt.get_state();
    assert!(!st.has_pending_proposal(&rt.store, &deal1.cid().unwrap()).unwrap());
    check_state(&rt);
}

#[test]
fn deal_cannot_be_activated_twice() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal]);

    rt.set_epoch(START_EPOCH - 10);
    activate_deals(&rt, SECTOR_EXPIRY, &ids);
    let before: State = rt.get_state();

    expect_abort_contains_message(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        "already activated",
        activate_deals_raw(&rt, PROVIDER, SECTOR_EXPIRY, &ids),
    );
    rt.verify();
    let after: State = rt.get_state();
    assert_eq!(before, after);
}

#[test]
fn activation_checks() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal]);

    // not the provider
    expect_abort(ExitCode::USR_FORBIDDEN, activate_deals_raw(&rt, CONTROL, SECTOR_EXPIRY, &ids));
    rt.verify();

    // sector expires before the deal ends
    expect_abort(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        activate_deals_raw(&rt, PROVIDER, END_EPOCH - 1, &ids),
    );
    rt.verify();

    // unknown deal
    expect_abort(ExitCode::USR_NOT_FOUND, activate_deals_raw(&rt, PROVIDER, SECTOR_EXPIRY, &[7]));
    rt.verify();

    // too late
    rt.set_epoch(START_EPOCH + 1);
    expect_abort(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        activate_deals_raw(&rt, PROVIDER, SECTOR_EXPIRY, &ids),
    );
    rt.verify();
    assert!(get_deal_state(&rt, ids[0]).is_none());
}

#[test]
fn terminate_stamps_slash_epoch_on_owned_active_deals() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal]);
    rt.set_epoch(START_EPOCH - 10);
    activate_deals(&rt, SECTOR_EXPIRY, &ids);

    // other miners and unknown deals are ignored
    rt.set_address_actor_type(CONTROL, *MINER_ACTOR_CODE_ID);
    terminate_deals(&rt, CONTROL, 150, &ids);
    assert_eq!(EPOCH_UNDEFINED, get_deal_state(&rt, ids[0]).unwrap().slash_epoch);
    terminate_deals(&rt, PROVIDER, 150, &[42]);

    terminate_deals(&rt, PROVIDER, 150, &ids);
    assert_eq!(150, get_deal_state(&rt, ids[0]).unwrap().slash_epoch);

    // a second termination keeps the first slash epoch
    terminate_deals(&rt, PROVIDER, 160, &ids);
    assert_eq!(150, get_deal_state(&rt, ids[0]).unwrap().slash_epoch);

    // expired at the termination epoch
    let deal2 = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH + 1, END_EPOCH);
    add_participant_funds(&rt, CLIENT, deal2.client_balance_requirement());
    add_provider_funds(&rt, deal2.provider_collateral.clone());
    let ids2 = publish_deals(&rt, &[deal2]);
    activate_deals(&rt, SECTOR_EXPIRY, &ids2);
    terminate_deals(&rt, PROVIDER, END_EPOCH, &ids2);
    assert_eq!(EPOCH_UNDEFINED, get_deal_state(&rt, ids2[0]).unwrap().slash_epoch);
    check_state(&rt);
}

#[test]
fn compute_data_commitment_from_deal_pieces() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal.clone()]);

    let commd = make_piece_cid(b"unsealed");
    let pieces = vec![PieceInfo { cid: deal.piece_cid, size: deal.piece_size }];
    rt.set_caller(*MINER_ACTOR_CODE_ID, PROVIDER);
    rt.expect_validate_caller_type(vec![Type::Miner]);
    rt.expect_compute_unsealed_sector_cid(
        RegisteredSealProof::StackedDRG2KiBV1,
        pieces.clone(),
        commd,
        ExitCode::OK,
    );
    let params = ComputeDataCommitmentParams {
        deal_ids: ids.clone(),
        sector_type: RegisteredSealProof::StackedDRG2KiBV1,
    };
    let ret: ComputeDataCommitmentReturn = rt
        .call::<MarketActor>(
            Method::ComputeDataCommitment as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        )
        .unwrap()
        .unwrap()
        .deserialize()
        .unwrap();
    rt.verify();
    assert_eq!(commd, ret.commd);

    // a failing computation is reported as an invalid argument
    rt.expect_validate_caller_type(vec![Type::Miner]);
    rt.expect_compute_unsealed_sector_cid(
        RegisteredSealProof::StackedDRG2KiBV1,
        pieces,
        commd,
        ExitCode::SYS_ASSERTION_FAILED,
    );
    expect_abort(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        rt.call::<MarketActor>(
            Method::ComputeDataCommitment as MethodNum,
            IpldBlock::serialize_cbor(&params).unwrap(),
        ),
    );
    rt.verify();
}

#[test]
fn cron_times_out_unactivated_deal() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal.clone()]);

    // nothing is due before the first scheduled epoch
    rt.set_epoch(START_EPOCH);
    cron_tick(&rt);
    assert!(get_proposal(&rt, ids[0]).is_some());

    rt.set_epoch(START_EPOCH + 100);
    cron_tick_and_burn(&rt, deal.provider_collateral.clone());

    assert!(get_proposal(&rt, ids[0]).is_none());
    assert_eq!(deal.client_balance_requirement(), get_escrow_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_escrow_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn cron_pays_provider_and_expires_deal() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal.clone()]);
    rt.set_epoch(START_EPOCH - 10);
    activate_deals(&rt, SECTOR_EXPIRY, &ids);

    // deal 0 is first processed at epoch 200
    rt.set_epoch(200);
    cron_tick(&rt);
    let paid = TokenAmount::from_atto(PRICE_PER_EPOCH * 100);
    assert_eq!(&deal.provider_collateral + &paid, get_escrow_balance(&rt, &PROVIDER));
    assert_eq!(deal.client_balance_requirement() - &paid, get_locked_balance(&rt, &CLIENT));
    assert_eq!(200, get_deal_state(&rt, ids[0]).unwrap().last_updated_epoch);
    check_state(&rt);

    // running cron again in the same epoch changes nothing
    let before: State = rt.get_state();
    cron_tick(&rt);
    let after: State = rt.get_state();
    assert_eq!(before.escrow_table, after.escrow_table);
    assert_eq!(before.locked_table, after.locked_table);

    rt.set_epoch(END_EPOCH);
    cron_tick(&rt);
    assert!(get_proposal(&rt, ids[0]).is_none());
    assert_eq!(
        &deal.provider_collateral + deal.total_storage_fee(),
        get_escrow_balance(&rt, &PROVIDER)
    );
    assert_eq!(deal.client_collateral, get_escrow_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn cron_settles_slashed_deal() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal.clone()]);
    rt.set_epoch(START_EPOCH - 10);
    activate_deals(&rt, SECTOR_EXPIRY, &ids);

    rt.set_epoch(200);
    cron_tick(&rt);

    rt.set_epoch(250);
    terminate_deals(&rt, PROVIDER, 250, &ids);

    rt.set_epoch(300);
    cron_tick_and_burn(&rt, deal.provider_collateral.clone());

    // paid for 100..250, the rest of the fee returns to the client
    let paid = TokenAmount::from_atto(PRICE_PER_EPOCH * 150);
    assert!(get_proposal(&rt, ids[0]).is_none());
    assert_eq!(paid, get_escrow_balance(&rt, &PROVIDER));
    assert_eq!(deal.client_balance_requirement() - &paid, get_escrow_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &CLIENT));
    assert_eq!(TokenAmount::zero(), get_locked_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn withdraw_settles_deals_before_paying_out() {
    let rt = setup();
    let deal = funded_deal(&rt);
    let ids = publish_deals(&rt, &[deal.clone()]);
    rt.set_epoch(START_EPOCH - 10);
    activate_deals(&rt, SECTOR_EXPIRY, &ids);

    // settled up to the previous epoch, so 149 epochs are owed
    rt.set_epoch(250);
    let owed = TokenAmount::from_atto(PRICE_PER_EPOCH * 149);
    withdraw_provider_balance(&rt, owed.clone(), owed.clone());
    assert_eq!(deal.provider_collateral, get_escrow_balance(&rt, &PROVIDER));
    assert_eq!(249, get_deal_state(&rt, ids[0]).unwrap().last_updated_epoch);

    // cron picks up from where the withdrawal left off
    rt.set_epoch(300);
    cron_tick(&rt);
    let owed = TokenAmount::from_atto(PRICE_PER_EPOCH * 51);
    assert_eq!(&deal.provider_collateral + &owed, get_escrow_balance(&rt, &PROVIDER));
    check_state(&rt);
}

#[test]
fn withdraw_burns_collateral_of_timed_out_deals() {
    let rt = setup();
    let deal = funded_deal(&rt);
    publish_deals(&rt, &[deal.clone()]);

    rt.set_epoch(START_EPOCH + 10);
    let client = CLIENT;
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, client);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    rt.expect_validate_caller_addr(vec![client]);
    rt.expect_send(
        BURNT_FUNDS_ACTOR_ADDR,
        METHOD_SEND,
        None,
        deal.provider_collateral.clone(),
        None,
        ExitCode::OK,
    );
    rt.expect_send(
        client,
        METHOD_SEND,
        None,
        deal.client_balance_requirement(),
        None,
        ExitCode::OK,
    );
    let params = WithdrawBalanceParams {
        provider_or_client: client,
        amount: deal.client_balance_requirement(),
    };
    rt.call::<MarketActor>(
        Method::WithdrawBalance as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
    .unwrap();
    rt.verify();

    assert!(get_proposal(&rt, 0).is_none());
    assert_eq!(TokenAmount::zero(), get_escrow_balance(&rt, &client));
    check_state(&rt);
}

#[test]
fn cron_requires_cron_caller() {
    let rt = setup();
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, CLIENT);
    rt.expect_validate_caller_addr(vec![fc_actors_runtime::CRON_ACTOR_ADDR]);
    expect_abort(ExitCode::USR_FORBIDDEN, rt.call::<MarketActor>(Method::CronTick as MethodNum, None));
    rt.verify();
}

#[test]
fn unknown_escrow_address_is_not_found() {
    let rt = setup();
    let unknown = Address::new_id(999);
    expect_abort(
        ExitCode::USR_ILLEGAL_ARGUMENT,
        add_balance_raw(&rt, CLIENT, unknown, TokenAmount::from_atto(1)),
    );
    rt.verify();

    let key = new_bls_addr(3);
    expect_abort(
        ExitCode::USR_NOT_FOUND,
        add_balance_raw(&rt, CLIENT, key, TokenAmount::from_atto(1)),
    );
    rt.verify();
}
