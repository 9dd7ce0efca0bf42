// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fc_actor_miner::{monies_for, INITIAL_PLEDGE_PROJECTION_PERIOD};
use fc_actors_runtime::network::EPOCHS_IN_DAY;
use fc_actors_runtime::reward::smooth::expected_reward_for_power;
use fc_actors_runtime::reward::FilterEstimate;
use fc_actors_runtime::runtime::ActorVersion;
use fvm_shared::bigint::BigInt;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::StoragePower;
use fvm_shared::version::NetworkVersion;
use num_traits::Zero;
use test_case::test_case;

struct Network {
    reward: FilterEstimate,
    power: FilterEstimate,
    qa: StoragePower,
}

fn network() -> Network {
    Network {
        reward: FilterEstimate::new(TokenAmount::from_whole(20).atto().clone(), BigInt::zero()),
        power: FilterEstimate::new(StoragePower::from(1u128 << 55), BigInt::zero()),
        qa: StoragePower::from(32u64 << 30),
    }
}

fn termination_fee(version: ActorVersion, nv: NetworkVersion, age: ChainEpoch) -> TokenAmount {
    let n = network();
    let day_reward = expected_reward_for_power(&n.reward, &n.power, &n.qa, EPOCHS_IN_DAY);
    let storage_pledge =
        expected_reward_for_power(&n.reward, &n.power, &n.qa, INITIAL_PLEDGE_PROJECTION_PERIOD);
    monies_for(version).pledge_penalty_for_termination(
        &day_reward,
        age,
        &storage_pledge,
        &n.power,
        &n.qa,
        &n.reward,
        &TokenAmount::zero(),
        0,
        nv,
    )
}

#[test_case(ActorVersion::V0, NetworkVersion::V2; "v0")]
#[test_case(ActorVersion::V2, NetworkVersion::V8; "v2")]
#[test_case(ActorVersion::V3, NetworkVersion::V10; "v3")]
fn termination_fee_grows_with_age(version: ActorVersion, nv: NetworkVersion) {
    let young = termination_fee(version, nv, 10 * EPOCHS_IN_DAY);
    let older = termination_fee(version, nv, 60 * EPOCHS_IN_DAY);
    assert!(young.is_positive());
    assert!(older > young, "fee at 60 days {} not above fee at 10 days {}", older, young);
}

#[test_case(ActorVersion::V0, NetworkVersion::V2; "v0")]
#[test_case(ActorVersion::V2, NetworkVersion::V8; "v2")]
#[test_case(ActorVersion::V3, NetworkVersion::V10; "v3")]
fn termination_fee_stops_growing_after_lifetime_cap(version: ActorVersion, nv: NetworkVersion) {
    let capped = termination_fee(version, nv, 150 * EPOCHS_IN_DAY);
    let ancient = termination_fee(version, nv, 400 * EPOCHS_IN_DAY);
    assert_eq!(capped, ancient);
}

#[test]
fn replaced_sector_age_counts_toward_fee() {
    let n = network();
    let day_reward = expected_reward_for_power(&n.reward, &n.power, &n.qa, EPOCHS_IN_DAY);
    let storage_pledge =
        expected_reward_for_power(&n.reward, &n.power, &n.qa, INITIAL_PLEDGE_PROJECTION_PERIOD);
    let monies = monies_for(ActorVersion::V3);
    let fee = |replaced_age: ChainEpoch| {
        monies.pledge_penalty_for_termination(
            &day_reward,
            10 * EPOCHS_IN_DAY,
            &storage_pledge,
            &n.power,
            &n.qa,
            &n.reward,
            &day_reward,
            replaced_age,
            NetworkVersion::V10,
        )
    };
    assert!(fee(30 * EPOCHS_IN_DAY) > fee(0));
}

#[test_case(ActorVersion::V0; "v0")]
#[test_case(ActorVersion::V2; "v2")]
#[test_case(ActorVersion::V3; "v3")]
fn deposit_and_pledge_scale_with_power(version: ActorVersion) {
    let n = network();
    let monies = monies_for(version);
    let small = monies.pre_commit_deposit_for_power(&n.reward, &n.power, &n.qa);
    let large = monies.pre_commit_deposit_for_power(&n.reward, &n.power, &(&n.qa * 10));
    assert!(small.is_positive());
    assert!(large > small);

    let circulating = TokenAmount::from_whole(500_000_000);
    let baseline = StoragePower::from(1u128 << 55);
    let pledge =
        monies.initial_pledge_for_power(&n.qa, &baseline, &n.reward, &n.power, &circulating);
    assert!(pledge.is_positive());
}

#[test]
fn first_generation_declared_fault_penalty_rises_at_network_version_3() {
    let n = network();
    let monies = monies_for(ActorVersion::V0);
    let before =
        monies.pledge_penalty_for_declared_fault(&n.reward, &n.power, &n.qa, NetworkVersion::V2);
    let after =
        monies.pledge_penalty_for_declared_fault(&n.reward, &n.power, &n.qa, NetworkVersion::V3);
    assert!(after > before, "{} <= {}", after, before);
}
