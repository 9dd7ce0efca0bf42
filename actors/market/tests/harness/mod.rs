// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
#![allow(dead_code)]

use fc_actor_market::ext::miner::{ControlAddressesReturn, CONTROL_ADDRESSES_METHOD};
use fc_actor_market::ext::power::{CurrentTotalPowerReturn, CURRENT_TOTAL_POWER_METHOD};
use fc_actor_market::ext::reward::{ThisEpochRewardReturn, THIS_EPOCH_REWARD_METHOD};
use fc_actor_market::testing::check_state_invariants;
use fc_actor_market::{
    Actor as MarketActor, AddBalanceParams, ClientDealProposal, DealProposal, DealState, Method,
    OnMinerSectorsTerminateParams, PublishStorageDealsParams, PublishStorageDealsReturn, State,
    VerifyDealsOnSectorProveCommitParams, VerifyDealsOnSectorProveCommitReturn,
    WithdrawBalanceParams,
};
use fc_actors_runtime::reward::FilterEstimate;
use fc_actors_runtime::runtime::{Policy, Type};
use fc_actors_runtime::test_utils::*;
use fc_actors_runtime::{
    ActorError, BURNT_FUNDS_ACTOR_ADDR, CRON_ACTOR_ADDR, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR,
    STORAGE_MARKET_ACTOR_ADDR, STORAGE_POWER_ACTOR_ADDR, SYSTEM_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::bigint::BigInt;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::piece::PaddedPieceSize;
use fvm_shared::sector::StoragePower;
use fvm_shared::{MethodNum, METHOD_SEND};
use num_traits::Zero;

pub const OWNER: Address = Address::new_id(101);
pub const WORKER: Address = Address::new_id(102);
pub const PROVIDER: Address = Address::new_id(103);
pub const CLIENT: Address = Address::new_id(104);
pub const CONTROL: Address = Address::new_id(105);

pub const START_EPOCH: ChainEpoch = 100;
pub const END_EPOCH: ChainEpoch = 400;
pub const PRICE_PER_EPOCH: u64 = 10;
pub const PROVIDER_COLLATERAL: u64 = 500;
pub const CLIENT_COLLATERAL: u64 = 300;

/// Deal durations short enough to drive a deal through cron in a test.
pub fn short_deal_policy() -> Policy {
    Policy {
        min_deal_duration: 100,
        max_deal_duration: 10_000,
        deal_updates_interval: 100,
        ..Default::default()
    }
}

pub fn setup() -> MockRuntime {
    init_logging();
    let mut rt = MockRuntime::new(STORAGE_MARKET_ACTOR_ADDR);
    rt.policy = short_deal_policy();

    for addr in [OWNER, WORKER, CLIENT, CONTROL] {
        rt.set_address_actor_type(addr, *ACCOUNT_ACTOR_CODE_ID);
    }
    rt.set_address_actor_type(PROVIDER, *MINER_ACTOR_CODE_ID);

    construct_and_verify(&rt);
    rt
}

pub fn construct_and_verify(rt: &MockRuntime) {
    rt.set_caller(*SYSTEM_ACTOR_CODE_ID, SYSTEM_ACTOR_ADDR);
    rt.expect_validate_caller_addr(vec![SYSTEM_ACTOR_ADDR, INIT_ACTOR_ADDR]);
    assert!(rt.call::<MarketActor>(Method::Constructor as MethodNum, None).unwrap().is_none());
    rt.verify();
}

pub fn check_state(rt: &MockRuntime) {
    let st: State = rt.get_state();
    let (_, acc) = check_state_invariants(&st, &rt.store);
    acc.assert_empty();
}

pub fn get_escrow_balance(rt: &MockRuntime, addr: &Address) -> TokenAmount {
    let st: State = rt.get_state();
    st.get_escrow_balance(&rt.store, addr).unwrap()
}

pub fn get_locked_balance(rt: &MockRuntime, addr: &Address) -> TokenAmount {
    let st: State = rt.get_state();
    st.get_locked_balance(&rt.store, addr).unwrap()
}

pub fn get_deal_state(rt: &MockRuntime, id: DealID) -> Option<DealState> {
    let st: State = rt.get_state();
    st.find_deal_state(&rt.store, id).unwrap()
}

pub fn get_proposal(rt: &MockRuntime, id: DealID) -> Option<DealProposal> {
    let st: State = rt.get_state();
    st.find_proposal(&rt.store, id).unwrap()
}

pub fn expect_provider_control_address(rt: &MockRuntime, provider: Address) {
    let ret = ControlAddressesReturn {
        owner: OWNER,
        worker: WORKER,
        control_addresses: vec![CONTROL],
    };
    rt.expect_send(
        provider,
        CONTROL_ADDRESSES_METHOD,
        None,
        TokenAmount::zero(),
        IpldBlock::serialize_cbor(&ret).unwrap(),
        ExitCode::OK,
    );
}

pub fn add_balance_raw(
    rt: &MockRuntime,
    caller: Address,
    nominal: Address,
    amount: TokenAmount,
) -> Result<Option<IpldBlock>, ActorError> {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, caller);
    rt.set_value(amount);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    let params = AddBalanceParams { provider_or_client: nominal };
    rt.call::<MarketActor>(Method::AddBalance as MethodNum, IpldBlock::serialize_cbor(&params).unwrap())
}

pub fn add_participant_funds(rt: &MockRuntime, addr: Address, amount: TokenAmount) {
    add_balance_raw(rt, addr, addr, amount.clone()).unwrap();
    rt.verify();
    rt.add_balance(amount);
}

pub fn add_provider_funds(rt: &MockRuntime, amount: TokenAmount) {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, OWNER);
    rt.set_value(amount.clone());
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    expect_provider_control_address(rt, PROVIDER);
    let params = AddBalanceParams { provider_or_client: PROVIDER };
    rt.call::<MarketActor>(
        Method::AddBalance as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
    .unwrap();
    rt.verify();
    rt.add_balance(amount);
}

pub fn withdraw_client_balance(
    rt: &MockRuntime,
    client: Address,
    requested: TokenAmount,
    expected: TokenAmount,
) {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, client);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    rt.expect_validate_caller_addr(vec![client]);
    rt.expect_send(client, METHOD_SEND, None, expected, None, ExitCode::OK);
    let params = WithdrawBalanceParams { provider_or_client: client, amount: requested };
    rt.call::<MarketActor>(
        Method::WithdrawBalance as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
    .unwrap();
    rt.verify();
}

pub fn withdraw_provider_balance(rt: &MockRuntime, requested: TokenAmount, expected: TokenAmount) {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, OWNER);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    expect_provider_control_address(rt, PROVIDER);
    rt.expect_validate_caller_addr(vec![OWNER, WORKER]);
    rt.expect_send(OWNER, METHOD_SEND, None, expected, None, ExitCode::OK);
    let params = WithdrawBalanceParams { provider_or_client: PROVIDER, amount: requested };
    rt.call::<MarketActor>(
        Method::WithdrawBalance as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
    .unwrap();
    rt.verify();
}

pub fn generate_deal_proposal(
    client: Address,
    provider: Address,
    start_epoch: ChainEpoch,
    end_epoch: ChainEpoch,
) -> DealProposal {
    DealProposal {
        piece_cid: make_piece_cid(format!("{}-{}-{}", client, start_epoch, end_epoch).as_bytes()),
        piece_size: PaddedPieceSize(2048),
        verified_deal: false,
        client,
        provider,
        label: "label".to_string(),
        start_epoch,
        end_epoch,
        storage_price_per_epoch: TokenAmount::from_atto(PRICE_PER_EPOCH),
        provider_collateral: TokenAmount::from_atto(PROVIDER_COLLATERAL),
        client_collateral: TokenAmount::from_atto(CLIENT_COLLATERAL),
    }
}

/// The default deal, with both parties funded for exactly what it locks.
pub fn funded_deal(rt: &MockRuntime) -> DealProposal {
    let deal = generate_deal_proposal(CLIENT, PROVIDER, START_EPOCH, END_EPOCH);
    add_participant_funds(rt, CLIENT, deal.client_balance_requirement());
    add_provider_funds(rt, deal.provider_collateral.clone());
    deal
}

pub fn client_signature(proposal: &DealProposal) -> Signature {
    Signature::new_bls(format!("sig-{}", proposal.piece_cid).into_bytes())
}

/// Sets up the worker as caller and the sends publication makes before validating deals.
pub fn expect_publish_preamble(rt: &MockRuntime) {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, WORKER);
    rt.expect_validate_caller_type(vec![Type::Account, Type::Multisig]);
    expect_provider_control_address(rt, PROVIDER);
    expect_query_network_info(rt);
}

pub fn expect_query_network_info(rt: &MockRuntime) {
    let reward = ThisEpochRewardReturn {
        this_epoch_reward_smoothed: FilterEstimate::new(BigInt::from(1000), BigInt::zero()),
        this_epoch_baseline_power: StoragePower::from(1u64 << 30),
    };
    rt.expect_send(
        REWARD_ACTOR_ADDR,
        THIS_EPOCH_REWARD_METHOD,
        None,
        TokenAmount::zero(),
        IpldBlock::serialize_cbor(&reward).unwrap(),
        ExitCode::OK,
    );
    let power = CurrentTotalPowerReturn {
        raw_byte_power: StoragePower::from(1u64 << 30),
        quality_adj_power: StoragePower::from(1u64 << 30),
        pledge_collateral: TokenAmount::zero(),
        quality_adj_power_smoothed: FilterEstimate::new(BigInt::zero(), BigInt::zero()),
    };
    rt.expect_send(
        STORAGE_POWER_ACTOR_ADDR,
        CURRENT_TOTAL_POWER_METHOD,
        None,
        TokenAmount::zero(),
        IpldBlock::serialize_cbor(&power).unwrap(),
        ExitCode::OK,
    );
}

pub fn expect_client_signature(rt: &MockRuntime, proposal: &DealProposal, valid: bool) {
    rt.expect_verify_signature(ExpectedVerifySig {
        sig: client_signature(proposal),
        signer: proposal.client,
        plaintext: proposal.marshal_cbor().unwrap(),
        result: valid,
    });
}

pub fn publish_deals_raw(
    rt: &MockRuntime,
    deals: &[DealProposal],
) -> Result<Option<IpldBlock>, ActorError> {
    let params = PublishStorageDealsParams {
        deals: deals
            .iter()
            .map(|proposal| ClientDealProposal {
                proposal: proposal.clone(),
                client_signature: client_signature(proposal),
            })
            .collect(),
    };
    rt.call::<MarketActor>(
        Method::PublishStorageDeals as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
}

pub fn publish_deals(rt: &MockRuntime, deals: &[DealProposal]) -> Vec<DealID> {
    expect_publish_preamble(rt);
    for deal in deals {
        expect_client_signature(rt, deal, true);
    }
    let ret: PublishStorageDealsReturn =
        publish_deals_raw(rt, deals).unwrap().unwrap().deserialize().unwrap();
    rt.verify();
    assert_eq!(deals.len(), ret.ids.len());
    ret.ids
}

pub fn activate_deals_raw(
    rt: &MockRuntime,
    provider: Address,
    sector_expiry: ChainEpoch,
    deal_ids: &[DealID],
) -> Result<Option<IpldBlock>, ActorError> {
    rt.set_caller(*MINER_ACTOR_CODE_ID, provider);
    rt.expect_validate_caller_type(vec![Type::Miner]);
    let params =
        VerifyDealsOnSectorProveCommitParams { deal_ids: deal_ids.to_vec(), sector_expiry };
    rt.call::<MarketActor>(
        Method::VerifyDealsOnSectorProveCommit as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
}

pub fn activate_deals(
    rt: &MockRuntime,
    sector_expiry: ChainEpoch,
    deal_ids: &[DealID],
) -> VerifyDealsOnSectorProveCommitReturn {
    let ret = activate_deals_raw(rt, PROVIDER, sector_expiry, deal_ids)
        .unwrap()
        .unwrap()
        .deserialize()
        .unwrap();
    rt.verify();
    ret
}

pub fn terminate_deals(rt: &MockRuntime, provider: Address, epoch: ChainEpoch, deal_ids: &[DealID]) {
    rt.set_caller(*MINER_ACTOR_CODE_ID, provider);
    rt.expect_validate_caller_type(vec![Type::Miner]);
    let params = OnMinerSectorsTerminateParams { epoch, deal_ids: deal_ids.to_vec() };
    rt.call::<MarketActor>(
        Method::OnMinerSectorsTerminate as MethodNum,
        IpldBlock::serialize_cbor(&params).unwrap(),
    )
    .unwrap();
    rt.verify();
}

pub fn cron_tick(rt: &MockRuntime) {
    cron_tick_and_burn(rt, TokenAmount::zero());
}

pub fn cron_tick_and_burn(rt: &MockRuntime, burned: TokenAmount) {
    rt.set_caller(*CRON_ACTOR_CODE_ID, CRON_ACTOR_ADDR);
    rt.expect_validate_caller_addr(vec![CRON_ACTOR_ADDR]);
    if !burned.is_zero() {
        rt.expect_send(BURNT_FUNDS_ACTOR_ADDR, METHOD_SEND, None, burned, None, ExitCode::OK);
    }
    assert!(rt.call::<MarketActor>(Method::CronTick as MethodNum, None).unwrap().is_none());
    rt.verify();
}
