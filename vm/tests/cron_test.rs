// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actor_cron::Method as CronMethod;
use fc_actor_market::{
    AddBalanceParams, ClientDealProposal, DealProposal, Method as MarketMethod,
    PublishStorageDealsParams, State as MarketState,
};
use fc_actor_power::{CreateMinerParams, CreateMinerReturn, Method as PowerMethod};
use fc_actor_reward::State as RewardState;
use fc_actors_runtime::test_utils::make_piece_cid;
use fc_actors_runtime::{
    CRON_ACTOR_ADDR, EPOCHS_IN_DAY, REWARD_ACTOR_ADDR, STORAGE_MARKET_ACTOR_ADDR,
    STORAGE_POWER_ACTOR_ADDR, SYSTEM_ACTOR_ADDR,
};
use fc_vm::SyncBlockstore;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::crypto::signature::{Signature, SignatureType};
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::message::Message;
use fvm_shared::piece::PaddedPieceSize;
use fvm_shared::sector::RegisteredSealProof;
use num_traits::Zero;

mod util;
use util::*;

fn epoch_tick() -> Message {
    Message {
        version: 0,
        from: SYSTEM_ACTOR_ADDR,
        to: CRON_ACTOR_ADDR,
        sequence: 0,
        value: TokenAmount::zero(),
        method_num: CronMethod::EpochTick as u64,
        params: RawBytes::default(),
        gas_limit: 0,
        gas_fee_cap: TokenAmount::zero(),
        gas_premium: TokenAmount::zero(),
    }
}

#[test]
fn cron_times_out_deals_that_were_never_activated() {
    let store = SyncBlockstore::new();
    let v = genesis(&store);
    let addrs = create_accounts(&v, 2, TokenAmount::from_whole(10_000));
    let (worker, client) = (addrs[0], addrs[1]);
    let miner: CreateMinerReturn = apply_ok(
        &v,
        worker,
        STORAGE_POWER_ACTOR_ADDR,
        TokenAmount::zero(),
        PowerMethod::CreateMiner as u64,
        Some(CreateMinerParams {
            owner: worker,
            worker,
            seal_proof_type: RegisteredSealProof::StackedDRG32GiBV1P1,
            peer: vec![],
            multiaddrs: vec![],
        }),
    )
    .ret()
    .unwrap();

    apply_ok(
        &v,
        client,
        STORAGE_MARKET_ACTOR_ADDR,
        TokenAmount::from_whole(5),
        MarketMethod::AddBalance as u64,
        Some(AddBalanceParams { provider_or_client: client }),
    );
    let start = 400;
    let proposal = DealProposal {
        piece_cid: make_piece_cid(b"never-sealed"),
        piece_size: PaddedPieceSize(2048),
        verified_deal: false,
        client,
        provider: miner.id_address,
        label: "never-sealed".to_string(),
        start_epoch: start,
        end_epoch: start + 200 * EPOCHS_IN_DAY,
        storage_price_per_epoch: TokenAmount::zero(),
        provider_collateral: TokenAmount::zero(),
        client_collateral: TokenAmount::from_whole(2),
    };
    apply_ok(
        &v,
        worker,
        STORAGE_MARKET_ACTOR_ADDR,
        TokenAmount::zero(),
        MarketMethod::PublishStorageDeals as u64,
        Some(PublishStorageDealsParams {
            deals: vec![ClientDealProposal {
                proposal,
                client_signature: Signature { sig_type: SignatureType::BLS, bytes: vec![] },
            }],
        }),
    );
    let market: MarketState = v.get_state(&STORAGE_MARKET_ACTOR_ADDR).unwrap().unwrap();
    assert_eq!(TokenAmount::from_whole(2), market.get_locked_balance(v.store(), &client).unwrap());

    // Nothing is due before the deal's first update epoch.
    v.set_epoch(start);
    let ret = v.apply_implicit_message(&epoch_tick()).unwrap();
    assert_eq!(ExitCode::OK, ret.exit_code());
    let market: MarketState = v.get_state(&STORAGE_MARKET_ACTOR_ADDR).unwrap().unwrap();
    assert_eq!(start, market.last_cron);
    assert!(market.find_proposal(v.store(), 0).unwrap().is_some());

    let interval = v.config().policy.deal_updates_interval;
    v.set_epoch(start + interval + 1);
    let ret = v.apply_implicit_message(&epoch_tick()).unwrap();
    assert_eq!(ExitCode::OK, ret.exit_code());

    let market: MarketState = v.get_state(&STORAGE_MARKET_ACTOR_ADDR).unwrap().unwrap();
    assert!(market.find_proposal(v.store(), 0).unwrap().is_none());
    assert!(market.get_locked_balance(v.store(), &client).unwrap().is_zero());
    assert_eq!(TokenAmount::from_whole(5), market.get_escrow_balance(v.store(), &client).unwrap());

    let reward: RewardState = v.get_state(&REWARD_ACTOR_ADDR).unwrap().unwrap();
    assert!(reward.epoch > 0);
}

#[test]
fn implicit_messages_do_not_touch_the_sender_nonce() {
    let store = SyncBlockstore::new();
    let v = genesis(&store);
    let before = v.actor(&SYSTEM_ACTOR_ADDR).unwrap().unwrap();

    let ret = v.apply_implicit_message(&epoch_tick()).unwrap();
    assert_eq!(ExitCode::OK, ret.exit_code());
    assert_eq!(0, ret.msg_receipt.gas_used);
    assert_eq!(before.nonce, v.actor(&SYSTEM_ACTOR_ADDR).unwrap().unwrap().nonce);
}
