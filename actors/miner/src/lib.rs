// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cmp;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use fc_actors_runtime::network::EPOCHS_IN_DAY;
use fc_actors_runtime::reward::smooth::expected_reward_for_power;
use fc_actors_runtime::runtime::{ActorCode, DomainSeparationTag, Policy, Runtime, Type};
use fc_actors_runtime::{
    actor_dispatch, actor_error, deserialize_block, extract_send_result, ActorContext,
    ActorError, AsActorError, BURNT_FUNDS_ACTOR_ADDR, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR,
    STORAGE_MARKET_ACTOR_ADDR, STORAGE_POWER_ACTOR_ADDR,
};
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::BytesDe;
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::randomness::Randomness;
use fvm_shared::sector::{
    AggregateSealVerifyInfo, AggregateSealVerifyProofAndInfos, RegisteredAggregateProof,
    RegisteredSealProof, SealVerifyInfo, SectorID, SectorInfo, WindowPoStVerifyInfo,
};
use fvm_shared::{ActorID, METHOD_CONSTRUCTOR, METHOD_SEND};
use log::{debug, info};
use num_derive::FromPrimitive;
use num_traits::Zero;

pub use self::deadline_state::*;
pub use self::monies::*;
pub use self::partition_state::*;
pub use self::policy::*;
pub use self::sector_map::*;
pub use self::sectors::*;
pub use self::state::*;
pub use self::types::*;
pub use self::vesting_state::*;

mod deadline_state;
#[doc(hidden)]
pub mod ext;
mod monies;
mod partition_state;
mod policy;
mod sector_map;
mod sectors;
mod state;
pub mod testing;
mod types;
mod vesting_state;

/// Storage Miner actor methods available
#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    ControlAddresses = 2,
    ChangeWorkerAddress = 3,
    ChangePeerID = 4,
    SubmitWindowedPoSt = 5,
    PreCommitSector = 6,
    ProveCommitSector = 7,
    TerminateSectors = 9,
    DeclareFaults = 10,
    DeclareFaultsRecovered = 11,
    ApplyRewards = 14,
    WithdrawBalance = 16,
    ProveCommitAggregate = 26,
}

/// Miner Actor
pub struct Actor;

impl Actor {
    /// Invoked by the init actor on behalf of the power actor's CreateMiner.
    pub fn constructor(
        rt: &impl Runtime,
        params: MinerConstructorParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&INIT_ACTOR_ADDR))?;

        let policy = rt.policy();
        check_control_addresses(policy, &params.control_addresses)?;
        check_peer_info(policy, &params.peer_id, &params.multi_addresses)?;
        if !policy.can_pre_commit_seal_proof(params.seal_proof_type) {
            return Err(actor_error!(
                illegal_argument,
                "proof type {:?} not allowed for new miner actors",
                params.seal_proof_type
            ));
        }

        let owner = resolve_control_address(rt, params.owner)?;
        let worker = resolve_worker_address(rt, params.worker)?;
        let control_addresses = params
            .control_addresses
            .into_iter()
            .map(|address| resolve_control_address(rt, address))
            .collect::<Result<Vec<_>, _>>()?;

        let current_epoch = rt.curr_epoch();
        let offset = assign_proving_period_offset(rt, current_epoch)?;
        let period_start = current_proving_period_start(policy, current_epoch, offset);

        let info = MinerInfo::new(
            owner,
            worker,
            control_addresses,
            params.peer_id,
            params.multi_addresses,
            params.seal_proof_type,
        )?;
        let st = State::new(policy, rt.store(), &info, period_start)
            .context("failed to construct state")?;
        rt.create(&st)?;

        info!(
            "constructed miner {} with owner {} worker {} proving period start {}",
            rt.message().receiver(),
            owner,
            worker,
            period_start
        );
        Ok(())
    }

    /// Returns the "controlling" addresses: the owner, the worker, and all control addresses
    fn control_addresses(rt: &impl Runtime) -> Result<GetControlAddressesReturn, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let state: State = rt.state()?;
        let info = state.get_info(rt.store())?;
        Ok(GetControlAddressesReturn {
            owner: info.owner,
            worker: info.worker,
            control_addresses: info.control_addresses,
        })
    }

    /// Replaces the worker and the control addresses. Takes effect immediately.
    fn change_worker_address(
        rt: &impl Runtime,
        params: ChangeWorkerAddressParams,
    ) -> Result<(), ActorError> {
        let state: State = rt.state()?;
        let owner = state.get_info(rt.store())?.owner;
        rt.validate_immediate_caller_is(std::iter::once(&owner))?;

        check_control_addresses(rt.policy(), &params.new_control_addresses)?;
        let new_worker = resolve_worker_address(rt, params.new_worker)?;
        let control_addresses = params
            .new_control_addresses
            .into_iter()
            .map(|address| resolve_control_address(rt, address))
            .collect::<Result<Vec<_>, _>>()?;

        rt.transaction(|state: &mut State, rt| {
            let mut info = state.get_info(rt.store())?;
            info.worker = new_worker;
            info.control_addresses = control_addresses;
            state.save_info(rt.store(), &info).context("could not save miner info")
        })
    }

    fn change_peer_id(rt: &impl Runtime, params: ChangePeerIDParams) -> Result<(), ActorError> {
        check_peer_info(rt.policy(), &params.new_id, &[])?;

        rt.transaction(|state: &mut State, rt| {
            let mut info = state.get_info(rt.store())?;

            rt.validate_immediate_caller_is(
                info.control_addresses.iter().chain(&[info.worker, info.owner]),
            )?;

            info.peer_id = params.new_id;
            state.save_info(rt.store(), &info).context("could not save miner info")
        })
    }

    /// Invoked by miner's worker address to submit their fallback post
    fn submit_windowed_post(
        rt: &impl Runtime,
        params: SubmitWindowedPoStParams,
    ) -> Result<(), ActorError> {
        let current_epoch = rt.curr_epoch();
        let policy = rt.policy();

        let st: State = rt.state()?;
        let info = st.get_info(rt.store())?;
        rt.validate_immediate_caller_is(
            info.control_addresses.iter().chain(std::iter::once(&info.worker)),
        )?;

        if params.proofs.len() != 1 {
            return Err(actor_error!(
                illegal_argument,
                "expected exactly one proof, got {}",
                params.proofs.len()
            ));
        }
        if params.proofs[0].post_proof != info.window_post_proof_type {
            return Err(actor_error!(
                illegal_argument,
                "expected proof of type {:?}, got {:?}",
                info.window_post_proof_type,
                params.proofs[0].post_proof
            ));
        }
        if params.deadline >= policy.wpost_period_deadlines {
            return Err(actor_error!(illegal_argument, "invalid deadline {}", params.deadline));
        }
        if params.partitions.len() as u64 > policy.max_partitions_per_deadline {
            return Err(actor_error!(
                illegal_argument,
                "too many partitions {}, limit {}",
                params.partitions.len(),
                policy.max_partitions_per_deadline
            ));
        }

        let dl_info = current_deadline_info(policy, st.proving_period_start, current_epoch);
        if params.deadline != dl_info.index {
            return Err(actor_error!(
                illegal_argument,
                "invalid deadline {} at epoch {}, expected {}",
                params.deadline,
                current_epoch,
                dl_info.index
            ));
        }

        // Skipped sectors are charged as undeclared faults, which needs the network estimates.
        let estimates = if params.partitions.iter().any(|p| !p.skipped.is_empty()) {
            Some((request_current_epoch_block_reward(rt)?, request_current_total_power(rt)?))
        } else {
            None
        };
        let monies = monies_for(rt.actor_version());
        let nv = rt.network_version();

        let (power_delta, to_burn, pledge_delta, challenged) =
            rt.transaction(|st: &mut State, rt| {
                let store = rt.store();
                let info = st.get_info(store)?;
                let sectors = st.load_sectors(store)?;
                let mut deadlines = st.load_deadlines(store)?;
                let mut deadline = deadlines.load_deadline(store, params.deadline)?;
                deadline.start_window(dl_info.open);

                let mut power_delta = PowerPair::zero();
                let mut new_fault_infos = Vec::new();
                let mut challenged = Vec::new();
                let mut posted_any = false;

                for post in &params.partitions {
                    if deadline.partitions_posted.get(post.index) {
                        debug!("skipping already proven partition {}", post.index);
                        continue;
                    }
                    let mut partition = deadline.load_partition(store, post.index)?;
                    if !partition.sectors.contains_all(&post.skipped) {
                        return Err(actor_error!(
                            illegal_argument,
                            "skipped sectors outside partition {}",
                            post.index
                        ));
                    }

                    let skipped = &post.skipped & &partition.live_sectors();
                    let fault = partition.record_faults(&sectors, info.sector_size, &skipped)?;
                    let recovered = partition.recover_faults();

                    power_delta -= &fault.new_faulty_power;
                    power_delta += &recovered;
                    deadline.faulty_power += &fault.new_faulty_power;
                    deadline.faulty_power -= &recovered;
                    new_fault_infos.extend(fault.new_fault_infos);
                    challenged.extend(sectors.load_sectors(&partition.active_sectors())?);

                    deadline.save_partition(store, post.index, partition)?;
                    deadline.partitions_posted.set(post.index);
                    posted_any = true;
                }
                if !posted_any {
                    return Err(actor_error!(
                        illegal_argument,
                        "all partitions already proven at deadline {}",
                        params.deadline
                    ));
                }

                deadlines.update_deadline(store, params.deadline, &deadline)?;
                st.save_deadlines(store, &deadlines)?;

                let mut penalty = TokenAmount::zero();
                if let Some((reward, power)) = &estimates {
                    for sector in &new_fault_infos {
                        penalty += monies.pledge_penalty_for_undeclared_fault(
                            &reward.this_epoch_reward_smoothed,
                            &power.quality_adj_power_smoothed,
                            &qa_power_for_sector(info.sector_size, sector),
                            nv,
                        );
                    }
                }
                st.apply_penalty(&penalty)?;
                let balance = rt.current_balance();
                let (from_vesting, from_balance) =
                    st.repay_partial_debt_in_priority_order(store, current_epoch, &balance)?;

                Ok((power_delta, &from_vesting + &from_balance, -from_vesting, challenged))
            })?;

        verify_windowed_post(rt, dl_info.challenge, &challenged, params.proofs)?;

        request_update_power(rt, power_delta)?;
        burn_funds(rt, to_burn)?;
        notify_pledge_changed(rt, &pledge_delta)?;
        Ok(())
    }

    /// Pledges to seal and commit a single sector.
    fn pre_commit_sector(
        rt: &impl Runtime,
        params: SectorPreCommitInfo,
    ) -> Result<(), ActorError> {
        let current_epoch = rt.curr_epoch();
        let policy = rt.policy();

        let st: State = rt.state()?;
        let info = st.get_info(rt.store())?;
        rt.validate_immediate_caller_is(std::iter::once(&info.worker))?;

        if !policy.can_pre_commit_seal_proof(params.seal_proof) {
            return Err(actor_error!(
                illegal_argument,
                "unsupported seal proof type {:?}",
                params.seal_proof
            ));
        }
        if params.seal_proof != info.seal_proof_type {
            return Err(actor_error!(
                illegal_argument,
                "sector seal proof {:?} must match miner seal proof type {:?}",
                params.seal_proof,
                info.seal_proof_type
            ));
        }
        if params.sector_number > MAX_SECTOR_NUMBER {
            return Err(actor_error!(
                illegal_argument,
                "sector number {} out of range 0..(2^63-1)",
                params.sector_number
            ));
        }
        if !is_sealed_sector(&params.sealed_cid) {
            return Err(actor_error!(illegal_argument, "sealed CID had wrong prefix"));
        }
        if params.seal_rand_epoch >= current_epoch {
            return Err(actor_error!(
                illegal_argument,
                "seal challenge epoch {} must be before now {}",
                params.seal_rand_epoch,
                current_epoch
            ));
        }
        let challenge_earliest = current_epoch - policy.max_pre_commit_randomness_lookback;
        if params.seal_rand_epoch < challenge_earliest {
            return Err(actor_error!(
                illegal_argument,
                "seal challenge epoch {} too old, must be after {}",
                params.seal_rand_epoch,
                challenge_earliest
            ));
        }
        let max_activation = current_epoch
            + max_prove_commit_duration(policy, params.seal_proof).ok_or_else(|| {
                actor_error!(
                    illegal_argument,
                    "no max seal duration set for {:?}",
                    params.seal_proof
                )
            })?;
        validate_expiration(
            policy,
            current_epoch,
            max_activation,
            params.expiration,
            params.seal_proof,
        )?;
        if !st.fee_debt.is_zero() {
            return Err(actor_error!(
                insufficient_funds,
                "cannot pre-commit while fee debt {} is outstanding",
                st.fee_debt
            ));
        }

        let reward_stats = request_current_epoch_block_reward(rt)?;
        let power_total = request_current_total_power(rt)?;
        let deposit_req = monies_for(rt.actor_version()).pre_commit_deposit_for_power(
            &reward_stats.this_epoch_reward_smoothed,
            &power_total.quality_adj_power_smoothed,
            &qa_power_max(info.sector_size),
        );

        rt.transaction(|st: &mut State, rt| {
            let store = rt.store();
            st.allocate_sector_number(store, params.sector_number)?;

            let available_balance = st.get_available_balance(&rt.current_balance())?;
            if available_balance < deposit_req {
                return Err(actor_error!(
                    insufficient_funds,
                    "insufficient funds for pre-commit deposit: {}",
                    deposit_req
                ));
            }
            st.add_pre_commit_deposit(&deposit_req)?;

            let sector_number = params.sector_number;
            st.put_precommitted_sector(
                store,
                SectorPreCommitOnChainInfo {
                    info: params,
                    pre_commit_deposit: deposit_req,
                    pre_commit_epoch: current_epoch,
                },
            )
            .with_context(|| format!("failed to write pre-committed sector {}", sector_number))
        })
    }

    /// Checks state of the corresponding sector pre-commitment, verifies the proof, and
    /// activates the sector.
    fn prove_commit_sector(
        rt: &impl Runtime,
        params: ProveCommitSectorParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_accept_any()?;

        if params.sector_number > MAX_SECTOR_NUMBER {
            return Err(actor_error!(illegal_argument, "sector number greater than maximum"));
        }

        let st: State = rt.state()?;
        let precommit = st
            .get_precommitted_sector(rt.store(), params.sector_number)?
            .ok_or_else(|| {
                actor_error!(not_found, "no pre-committed sector {}", params.sector_number)
            })?;
        validate_prove_commit_timing(rt.policy(), rt.curr_epoch(), &precommit)?;

        let randomness = seal_randomness(rt, &precommit)?;
        let unsealed_cid =
            request_unsealed_sector_cid(rt, precommit.info.seal_proof, &precommit.info.deal_ids)?;

        let svi = SealVerifyInfo {
            registered_proof: precommit.info.seal_proof,
            sector_id: SectorID { miner: receiver_id(rt)?, number: precommit.info.sector_number },
            deal_ids: precommit.info.deal_ids.clone(),
            randomness: randomness.0,
            interactive_randomness: randomness.1,
            proof: params.proof,
            sealed_cid: precommit.info.sealed_cid,
            unsealed_cid,
        };
        if !rt.verify_seal(&svi) {
            return Err(actor_error!(
                illegal_argument,
                "invalid seal proof for sector {}",
                params.sector_number
            ));
        }

        activate_sectors(rt, vec![precommit])
    }

    /// Proves a batch of pre-committed sectors with a single aggregate proof.
    fn prove_commit_aggregate(
        rt: &impl Runtime,
        params: ProveCommitAggregateParams,
    ) -> Result<(), ActorError> {
        let policy = rt.policy();
        let st: State = rt.state()?;
        let info = st.get_info(rt.store())?;
        rt.validate_immediate_caller_is(
            info.control_addresses.iter().chain(std::iter::once(&info.worker)),
        )?;

        let agg_sectors_count = params.sector_numbers.len();
        if agg_sectors_count > policy.max_aggregated_sectors {
            return Err(actor_error!(
                illegal_argument,
                "too many sectors addressed, addressed {} want <= {}",
                agg_sectors_count,
                policy.max_aggregated_sectors
            ));
        }
        if agg_sectors_count < policy.min_aggregated_sectors {
            return Err(actor_error!(
                illegal_argument,
                "too few sectors addressed, addressed {} want >= {}",
                agg_sectors_count,
                policy.min_aggregated_sectors
            ));
        }

        let miner = receiver_id(rt)?;
        let mut precommits = Vec::with_capacity(agg_sectors_count as usize);
        let mut infos = Vec::with_capacity(agg_sectors_count as usize);
        for sector_number in params.sector_numbers.iter() {
            let precommit =
                st.get_precommitted_sector(rt.store(), sector_number)?.ok_or_else(|| {
                    actor_error!(not_found, "no pre-committed sector {}", sector_number)
                })?;
            validate_prove_commit_timing(policy, rt.curr_epoch(), &precommit)?;

            let (randomness, interactive_randomness) = seal_randomness(rt, &precommit)?;
            let unsealed_cid = request_unsealed_sector_cid(
                rt,
                precommit.info.seal_proof,
                &precommit.info.deal_ids,
            )?;
            infos.push(AggregateSealVerifyInfo {
                sector_number,
                randomness,
                interactive_randomness,
                sealed_cid: precommit.info.sealed_cid,
                unsealed_cid,
            });
            precommits.push(precommit);
        }

        let aggregate = AggregateSealVerifyProofAndInfos {
            miner,
            seal_proof: info.seal_proof_type,
            aggregate_proof: RegisteredAggregateProof::SnarkPackV1,
            proof: params.aggregate_proof,
            infos,
        };
        if !rt.verify_aggregate_seals(&aggregate) {
            return Err(actor_error!(illegal_argument, "aggregate seal verify failed"));
        }

        activate_sectors(rt, precommits)
    }

    fn declare_faults(rt: &impl Runtime, params: DeclareFaultsParams) -> Result<(), ActorError> {
        let policy = rt.policy();
        if params.faults.len() as u64 > policy.declarations_max {
            return Err(actor_error!(
                illegal_argument,
                "too many fault declarations for a single message: {} > {}",
                params.faults.len(),
                policy.declarations_max
            ));
        }

        let st: State = rt.state()?;
        let info = st.get_info(rt.store())?;
        rt.validate_immediate_caller_is(
            info.control_addresses.iter().chain(&[info.worker, info.owner]),
        )?;

        let to_process = declarations_to_map(policy, params.faults)?;

        let reward = request_current_epoch_block_reward(rt)?;
        let power = request_current_total_power(rt)?;
        let monies = monies_for(rt.actor_version());
        let nv = rt.network_version();
        let current_epoch = rt.curr_epoch();

        let (new_faulty_power, to_burn, pledge_delta) = rt.transaction(|st: &mut State, rt| {
            let store = rt.store();
            let sectors = st.load_sectors(store)?;
            let mut deadlines = st.load_deadlines(store)?;

            let mut new_faulty_power = PowerPair::zero();
            let mut penalty = TokenAmount::zero();
            for (dl_idx, partition_map) in to_process.iter() {
                let mut deadline = deadlines.load_deadline(store, dl_idx)?;
                for (part_idx, sector_numbers) in partition_map.iter() {
                    let mut partition = deadline
                        .load_partition(store, part_idx)
                        .with_context(|| format!("in deadline {}", dl_idx))?;
                    let fault =
                        partition.record_faults(&sectors, info.sector_size, sector_numbers)?;
                    for sector in &fault.new_fault_infos {
                        penalty += monies.pledge_penalty_for_declared_fault(
                            &reward.this_epoch_reward_smoothed,
                            &power.quality_adj_power_smoothed,
                            &qa_power_for_sector(info.sector_size, sector),
                            nv,
                        );
                    }
                    deadline.faulty_power += &fault.new_faulty_power;
                    new_faulty_power += &fault.new_faulty_power;
                    deadline.save_partition(store, part_idx, partition)?;
                }
                deadlines.update_deadline(store, dl_idx, &deadline)?;
            }
            st.save_deadlines(store, &deadlines)?;

            st.apply_penalty(&penalty)?;
            let balance = rt.current_balance();
            let (from_vesting, from_balance) =
                st.repay_partial_debt_in_priority_order(store, current_epoch, &balance)?;
            Ok((new_faulty_power, &from_vesting + &from_balance, -from_vesting))
        })?;

        request_update_power(rt, -new_faulty_power)?;
        burn_funds(rt, to_burn)?;
        notify_pledge_changed(rt, &pledge_delta)?;
        Ok(())
    }

    fn declare_faults_recovered(
        rt: &impl Runtime,
        params: DeclareFaultsRecoveredParams,
    ) -> Result<(), ActorError> {
        let policy = rt.policy();
        if params.recoveries.len() as u64 > policy.declarations_max {
            return Err(actor_error!(
                illegal_argument,
                "too many recovery declarations for a single message: {} > {}",
                params.recoveries.len(),
                policy.declarations_max
            ));
        }

        let st: State = rt.state()?;
        let info = st.get_info(rt.store())?;
        rt.validate_immediate_caller_is(
            info.control_addresses.iter().chain(&[info.worker, info.owner]),
        )?;

        let to_process = declarations_to_map(policy, params.recoveries)?;

        let fee_to_burn = rt.transaction(|st: &mut State, rt| {
            // Recoveries are not accepted while the miner owes fees.
            let fee_to_burn = st.repay_debts(&rt.current_balance())?;

            let store = rt.store();
            let sectors = st.load_sectors(store)?;
            let mut deadlines = st.load_deadlines(store)?;
            for (dl_idx, partition_map) in to_process.iter() {
                let mut deadline = deadlines.load_deadline(store, dl_idx)?;
                for (part_idx, sector_numbers) in partition_map.iter() {
                    let mut partition = deadline
                        .load_partition(store, part_idx)
                        .with_context(|| format!("in deadline {}", dl_idx))?;
                    partition.declare_faults_recovered(&sectors, info.sector_size, sector_numbers)?;
                    deadline.save_partition(store, part_idx, partition)?;
                }
                deadlines.update_deadline(store, dl_idx, &deadline)?;
            }
            st.save_deadlines(store, &deadlines)?;
            Ok(fee_to_burn)
        })?;

        burn_funds(rt, fee_to_burn)
    }

    /// Marks some sectors as terminated at the present epoch, charging the termination fee
    /// and releasing their pledge.
    fn terminate_sectors(
        rt: &impl Runtime,
        params: TerminateSectorsParams,
    ) -> Result<TerminateSectorsReturn, ActorError> {
        let policy = rt.policy();
        if params.terminations.len() as u64 > policy.declarations_max {
            return Err(actor_error!(
                illegal_argument,
                "too many declarations when terminating sectors: {} > {}",
                params.terminations.len(),
                policy.declarations_max
            ));
        }

        let st: State = rt.state()?;
        let info = st.get_info(rt.store())?;
        rt.validate_immediate_caller_is(
            info.control_addresses.iter().chain(&[info.worker, info.owner]),
        )?;

        let to_process = declarations_to_map(policy, params.terminations)?;

        let reward = request_current_epoch_block_reward(rt)?;
        let power = request_current_total_power(rt)?;
        let monies = monies_for(rt.actor_version());
        let nv = rt.network_version();
        let current_epoch = rt.curr_epoch();

        let (removed_power, deal_ids, to_burn, pledge_delta) =
            rt.transaction(|st: &mut State, rt| {
                let store = rt.store();
                let sectors = st.load_sectors(store)?;
                let mut deadlines = st.load_deadlines(store)?;

                let mut removed_power = PowerPair::zero();
                let mut terminated = Vec::new();
                for (dl_idx, partition_map) in to_process.iter() {
                    let mut deadline = deadlines.load_deadline(store, dl_idx)?;
                    for (part_idx, sector_numbers) in partition_map.iter() {
                        let mut partition = deadline
                            .load_partition(store, part_idx)
                            .with_context(|| format!("in deadline {}", dl_idx))?;
                        let (infos, active_power) = partition.terminate_sectors(
                            &sectors,
                            info.sector_size,
                            sector_numbers,
                        )?;
                        let faulty_power =
                            &power_for_sectors(info.sector_size, &infos) - &active_power;
                        deadline.faulty_power -= &faulty_power;
                        deadline.live_sectors = deadline
                            .live_sectors
                            .checked_sub(infos.len() as u64)
                            .context_code(
                                ExitCode::USR_ILLEGAL_STATE,
                                "deadline live sector count underflow",
                            )?;
                        removed_power += &active_power;
                        terminated.extend(infos);
                        deadline.save_partition(store, part_idx, partition)?;
                    }
                    deadlines.update_deadline(store, dl_idx, &deadline)?;
                }
                st.save_deadlines(store, &deadlines)?;

                let mut penalty = TokenAmount::zero();
                let mut pledge_released = TokenAmount::zero();
                let mut deal_ids: Vec<DealID> = Vec::new();
                let mut numbers = Vec::with_capacity(terminated.len());
                for sector in &terminated {
                    penalty += monies.pledge_penalty_for_termination(
                        &sector.expected_day_reward,
                        current_epoch - sector.activation,
                        &sector.expected_storage_pledge,
                        &power.quality_adj_power_smoothed,
                        &qa_power_for_sector(info.sector_size, sector),
                        &reward.this_epoch_reward_smoothed,
                        &TokenAmount::zero(),
                        0,
                        nv,
                    );
                    pledge_released += &sector.initial_pledge;
                    deal_ids.extend(&sector.deal_ids);
                    numbers.push(sector.sector_number);
                }

                let mut sectors = st.load_sectors(store)?;
                let removed = BitField::try_from_bits(numbers)
                    .context_code(ExitCode::USR_ILLEGAL_STATE, "invalid sector numbers")?;
                sectors.remove(&removed)?;
                st.sectors = sectors.flush()?;

                st.add_initial_pledge(&-pledge_released.clone())?;
                st.apply_penalty(&penalty)?;
                let (from_vesting, from_balance) = st.repay_partial_debt_in_priority_order(
                    store,
                    current_epoch,
                    &rt.current_balance(),
                )?;

                let pledge_delta = -(pledge_released + &from_vesting);
                Ok((removed_power, deal_ids, from_vesting + from_balance, pledge_delta))
            })?;

        burn_funds(rt, to_burn)?;
        request_terminate_deals(rt, current_epoch, deal_ids)?;
        request_update_power(rt, -removed_power)?;
        notify_pledge_changed(rt, &pledge_delta)?;

        Ok(TerminateSectorsReturn { done: true })
    }

    /// Locks block rewards in the vesting table and pays down fee debt from them.
    fn apply_rewards(rt: &impl Runtime, params: ApplyRewardParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&REWARD_ACTOR_ADDR))?;

        if params.reward.is_negative() {
            return Err(actor_error!(
                illegal_argument,
                "cannot lock up a negative amount of funds {}",
                params.reward
            ));
        }
        if params.penalty.is_negative() {
            return Err(actor_error!(
                illegal_argument,
                "cannot penalize a negative amount of funds {}",
                params.penalty
            ));
        }

        let monies = monies_for(rt.actor_version());
        let nv = rt.network_version();
        let current_epoch = rt.curr_epoch();

        let (pledge_delta, to_burn) = rt.transaction(|st: &mut State, rt| {
            let store = rt.store();
            let mut pledge_delta_total = TokenAmount::zero();

            st.apply_penalty(&params.penalty)?;

            let reward_to_lock = monies.locked_reward_from_reward(&params.reward, nv);
            let newly_vested = st.add_locked_funds(
                store,
                current_epoch,
                &reward_to_lock,
                monies.reward_vesting_spec(),
            )?;
            pledge_delta_total += &reward_to_lock;
            pledge_delta_total -= &newly_vested;

            let balance = rt.current_balance();
            let (from_vesting, from_balance) =
                st.repay_partial_debt_in_priority_order(store, current_epoch, &balance)?;
            pledge_delta_total -= &from_vesting;

            Ok((pledge_delta_total, from_vesting + from_balance))
        })?;

        notify_pledge_changed(rt, &pledge_delta)?;
        burn_funds(rt, to_burn)?;
        Ok(())
    }

    fn withdraw_balance(
        rt: &impl Runtime,
        params: WithdrawBalanceParams,
    ) -> Result<WithdrawBalanceReturn, ActorError> {
        if params.amount_requested.is_negative() {
            return Err(actor_error!(
                illegal_argument,
                "negative fund requested for withdrawal: {}",
                params.amount_requested
            ));
        }

        let st: State = rt.state()?;
        let owner = st.get_info(rt.store())?.owner;
        rt.validate_immediate_caller_is(std::iter::once(&owner))?;

        let current_epoch = rt.curr_epoch();
        let (amount_withdrawn, newly_vested, fee_to_burn) =
            rt.transaction(|st: &mut State, rt| {
                let newly_vested = st.unlock_vested_funds(rt.store(), current_epoch)?;

                // Fee debt is repaid before anything is released to the owner.
                let available_balance = st.get_available_balance(&rt.current_balance())?;
                let fee_to_burn = st.repay_debts(&rt.current_balance())?;

                let amount_withdrawn =
                    cmp::min(&available_balance, &params.amount_requested).clone();
                if amount_withdrawn.is_negative() {
                    return Err(actor_error!(
                        illegal_state,
                        "negative amount to withdraw: {}",
                        amount_withdrawn
                    ));
                }
                Ok((amount_withdrawn, newly_vested, fee_to_burn))
            })?;

        if amount_withdrawn.is_positive() {
            rt.send_funds(&owner, amount_withdrawn.clone())?;
        }
        burn_funds(rt, fee_to_burn)?;
        notify_pledge_changed(rt, &-newly_vested)?;

        let st: State = rt.state()?;
        st.check_balance_invariants(&rt.current_balance())?;

        Ok(WithdrawBalanceReturn { amount_withdrawn })
    }
}

/// Stores proven sectors, locks their pledge and assigns them to deadlines.
fn activate_sectors(
    rt: &impl Runtime,
    precommits: Vec<SectorPreCommitOnChainInfo>,
) -> Result<(), ActorError> {
    let current_epoch = rt.curr_epoch();

    let mut weights = Vec::with_capacity(precommits.len());
    for precommit in &precommits {
        weights.push(verify_deals(rt, &precommit.info.deal_ids, precommit.info.expiration)?);
    }

    let reward = request_current_epoch_block_reward(rt)?;
    let power = request_current_total_power(rt)?;
    let circulating_supply = rt.total_fil_circ_supply();
    let monies = monies_for(rt.actor_version());
    let policy = rt.policy();

    let (total_pledge, new_power) = rt.transaction(|st: &mut State, rt| {
        let store = rt.store();
        let info = st.get_info(store)?;

        let mut deposit_to_unlock = TokenAmount::zero();
        let mut total_pledge = TokenAmount::zero();
        let mut numbers = Vec::with_capacity(precommits.len());
        let mut new_sectors = Vec::with_capacity(precommits.len());
        for (precommit, weight) in precommits.into_iter().zip(weights) {
            let duration = precommit.info.expiration - current_epoch;
            if duration < policy.min_sector_expiration {
                return Err(actor_error!(
                    illegal_argument,
                    "sector {} would expire {} epochs after activation, minimum is {}",
                    precommit.info.sector_number,
                    duration,
                    policy.min_sector_expiration
                ));
            }

            let qa_power = qa_power_for_weight(
                info.sector_size,
                duration,
                &weight.deal_weight,
                &weight.verified_deal_weight,
            );
            let day_reward = expected_reward_for_power(
                &reward.this_epoch_reward_smoothed,
                &power.quality_adj_power_smoothed,
                &qa_power,
                EPOCHS_IN_DAY,
            );
            let storage_pledge = expected_reward_for_power(
                &reward.this_epoch_reward_smoothed,
                &power.quality_adj_power_smoothed,
                &qa_power,
                INITIAL_PLEDGE_PROJECTION_PERIOD,
            );
            let initial_pledge = monies.initial_pledge_for_power(
                &qa_power,
                &reward.this_epoch_baseline_power,
                &reward.this_epoch_reward_smoothed,
                &power.quality_adj_power_smoothed,
                &circulating_supply,
            );

            deposit_to_unlock += &precommit.pre_commit_deposit;
            total_pledge += &initial_pledge;
            numbers.push(precommit.info.sector_number);
            new_sectors.push(SectorOnChainInfo {
                sector_number: precommit.info.sector_number,
                seal_proof: precommit.info.seal_proof,
                sealed_cid: precommit.info.sealed_cid,
                deal_ids: precommit.info.deal_ids,
                activation: current_epoch,
                expiration: precommit.info.expiration,
                deal_weight: weight.deal_weight,
                verified_deal_weight: weight.verified_deal_weight,
                initial_pledge,
                expected_day_reward: day_reward,
                expected_storage_pledge: storage_pledge,
            });
        }

        st.add_pre_commit_deposit(&-deposit_to_unlock)?;
        let available_balance = st.get_available_balance(&rt.current_balance())?;
        if available_balance < total_pledge {
            return Err(actor_error!(
                insufficient_funds,
                "insufficient funds for aggregate initial pledge requirement {}, available: {}",
                total_pledge,
                available_balance
            ));
        }
        st.add_initial_pledge(&total_pledge)?;
        st.delete_precommitted_sectors(store, &numbers)?;

        let mut sectors = st.load_sectors(store)?;
        sectors.store(new_sectors.clone())?;
        st.sectors = sectors.flush()?;

        let new_power = st.assign_sectors_to_deadlines(
            store,
            info.window_post_partition_sectors,
            info.sector_size,
            new_sectors,
        )?;
        Ok((total_pledge, new_power))
    })?;

    request_update_power(rt, new_power)?;
    notify_pledge_changed(rt, &total_pledge)?;
    Ok(())
}

fn declarations_to_map(
    policy: &Policy,
    declarations: Vec<SectorDeclaration>,
) -> Result<DeadlineSectorMap, ActorError> {
    let mut to_process = DeadlineSectorMap::new();
    for decl in declarations {
        to_process
            .add(policy, decl.deadline, decl.partition, decl.sectors)
            .map_err(|e| actor_error!(illegal_argument, "failed to process declaration: {}", e))?;
    }
    to_process
        .check(policy.addressed_partitions_max, policy.addressed_sectors_max)
        .map_err(|e| actor_error!(illegal_argument, "cannot process requested parameters: {}", e))?;
    Ok(to_process)
}

fn validate_expiration(
    policy: &Policy,
    curr_epoch: ChainEpoch,
    activation: ChainEpoch,
    expiration: ChainEpoch,
    seal_proof: RegisteredSealProof,
) -> Result<(), ActorError> {
    // Expiration must be after activation. Check this explicitly to avoid an underflow below.
    if expiration <= activation {
        return Err(actor_error!(
            illegal_argument,
            "sector expiration {} must be after activation {}",
            expiration,
            activation
        ));
    }
    // expiration cannot be less than minimum after activation
    if expiration - activation < policy.min_sector_expiration {
        return Err(actor_error!(
            illegal_argument,
            "invalid expiration {}, total sector lifetime ({}) must exceed {} after activation {}",
            expiration,
            expiration - activation,
            policy.min_sector_expiration,
            activation
        ));
    }
    // expiration cannot exceed MaxSectorExpirationExtension from now
    if expiration > curr_epoch + policy.max_sector_expiration_extension {
        return Err(actor_error!(
            illegal_argument,
            "invalid expiration {}, cannot be more than {} past current epoch {}",
            expiration,
            policy.max_sector_expiration_extension,
            curr_epoch
        ));
    }
    // total sector lifetime cannot exceed SectorMaximumLifetime for the sector's seal proof
    let max_lifetime = seal_proof_sector_maximum_lifetime(seal_proof).ok_or_else(|| {
        actor_error!(illegal_argument, "unrecognized seal proof type {:?}", seal_proof)
    })?;
    if expiration - activation > max_lifetime {
        return Err(actor_error!(
            illegal_argument,
            "invalid expiration {}, total sector lifetime ({}) cannot exceed {} after activation {}",
            expiration,
            expiration - activation,
            max_lifetime,
            activation
        ));
    }
    Ok(())
}

fn validate_prove_commit_timing(
    policy: &Policy,
    curr_epoch: ChainEpoch,
    precommit: &SectorPreCommitOnChainInfo,
) -> Result<(), ActorError> {
    let max_duration = max_prove_commit_duration(policy, precommit.info.seal_proof)
        .ok_or_else(|| {
            actor_error!(
                illegal_state,
                "no max seal duration for proof type: {:?}",
                precommit.info.seal_proof
            )
        })?;
    let prove_commit_due = precommit.pre_commit_epoch + max_duration;
    if curr_epoch > prove_commit_due {
        return Err(actor_error!(
            illegal_argument,
            "commitment proof for {} too late at {}, due {}",
            precommit.info.sector_number,
            curr_epoch,
            prove_commit_due
        ));
    }
    let earliest = precommit.pre_commit_epoch + policy.pre_commit_challenge_delay;
    if curr_epoch <= earliest {
        return Err(actor_error!(
            forbidden,
            "too early to prove sector {}, challenge is drawn at {}",
            precommit.info.sector_number,
            earliest
        ));
    }
    Ok(())
}

fn receiver_id(rt: &impl Runtime) -> Result<ActorID, ActorError> {
    rt.message()
        .receiver()
        .id()
        .context_code(ExitCode::USR_ILLEGAL_STATE, "receiver must be an ID address")
}

fn receiver_entropy(rt: &impl Runtime) -> Result<Vec<u8>, ActorError> {
    fvm_ipld_encoding::to_vec(&rt.message().receiver())
        .context_code(ExitCode::USR_SERIALIZATION, "failed to serialize receiver address")
}

/// Seal and interactive randomness for a pre-committed sector.
fn seal_randomness(
    rt: &impl Runtime,
    precommit: &SectorPreCommitOnChainInfo,
) -> Result<(Randomness, Randomness), ActorError> {
    let entropy = receiver_entropy(rt)?;
    let randomness = rt.get_randomness_from_tickets(
        DomainSeparationTag::SealRandomness,
        precommit.info.seal_rand_epoch,
        &entropy,
    )?;
    let interactive_epoch = precommit.pre_commit_epoch + rt.policy().pre_commit_challenge_delay;
    let interactive_randomness = rt.get_randomness_from_beacon(
        DomainSeparationTag::InteractiveSealChallengeSeed,
        interactive_epoch,
        &entropy,
    )?;
    Ok((Randomness(randomness.to_vec()), Randomness(interactive_randomness.to_vec())))
}

fn verify_windowed_post(
    rt: &impl Runtime,
    challenge_epoch: ChainEpoch,
    challenged: &[SectorOnChainInfo],
    proofs: Vec<fvm_shared::sector::PoStProof>,
) -> Result<(), ActorError> {
    if challenged.is_empty() {
        debug!("no sectors challenged, skipping window post verification");
        return Ok(());
    }

    let entropy = receiver_entropy(rt)?;
    let randomness = rt.get_randomness_from_beacon(
        DomainSeparationTag::WindowedPoStChallengeSeed,
        challenge_epoch,
        &entropy,
    )?;

    let verify_info = WindowPoStVerifyInfo {
        randomness: Randomness(randomness.to_vec()),
        proofs,
        challenged_sectors: challenged
            .iter()
            .map(|s| SectorInfo {
                proof: s.seal_proof,
                sector_number: s.sector_number,
                sealed_cid: s.sealed_cid,
            })
            .collect(),
        prover: receiver_id(rt)?,
    };
    if !rt.verify_post(&verify_info) {
        return Err(actor_error!(illegal_argument, "invalid PoSt {:?}", verify_info));
    }
    Ok(())
}

fn verify_deals(
    rt: &impl Runtime,
    deal_ids: &[DealID],
    sector_expiry: ChainEpoch,
) -> Result<ext::market::VerifyDealsOnSectorProveCommitReturn, ActorError> {
    if deal_ids.is_empty() {
        return Ok(Default::default());
    }
    deserialize_block(
        extract_send_result(rt.send(
            &STORAGE_MARKET_ACTOR_ADDR,
            ext::market::VERIFY_DEALS_FOR_ACTIVATION_METHOD,
            IpldBlock::serialize_cbor(&ext::market::VerifyDealsOnSectorProveCommitParams {
                deal_ids: deal_ids.to_vec(),
                sector_expiry,
            })?,
            TokenAmount::zero(),
        ))
        .context("failed to verify deals and get deal weight")?,
    )
}

fn request_unsealed_sector_cid(
    rt: &impl Runtime,
    sector_type: RegisteredSealProof,
    deal_ids: &[DealID],
) -> Result<cid::Cid, ActorError> {
    let ret: ext::market::ComputeDataCommitmentReturn = deserialize_block(
        extract_send_result(rt.send(
            &STORAGE_MARKET_ACTOR_ADDR,
            ext::market::COMPUTE_DATA_COMMITMENT_METHOD,
            IpldBlock::serialize_cbor(&ext::market::ComputeDataCommitmentParams {
                deal_ids: deal_ids.to_vec(),
                sector_type,
            })?,
            TokenAmount::zero(),
        ))
        .context("failed to request unsealed sector CID")?,
    )?;
    Ok(ret.commd)
}

fn request_terminate_deals(
    rt: &impl Runtime,
    epoch: ChainEpoch,
    deal_ids: Vec<DealID>,
) -> Result<(), ActorError> {
    if deal_ids.is_empty() {
        return Ok(());
    }
    extract_send_result(rt.send(
        &STORAGE_MARKET_ACTOR_ADDR,
        ext::market::ON_MINER_SECTORS_TERMINATE_METHOD,
        IpldBlock::serialize_cbor(&ext::market::OnMinerSectorsTerminateParams {
            epoch,
            deal_ids,
        })?,
        TokenAmount::zero(),
    ))
    .context("failed to terminate deals")?;
    Ok(())
}

fn request_update_power(rt: &impl Runtime, delta: PowerPair) -> Result<(), ActorError> {
    if delta.is_zero() {
        return Ok(());
    }

    let delta_clone = delta.clone();

    extract_send_result(rt.send(
        &STORAGE_POWER_ACTOR_ADDR,
        ext::power::UPDATE_CLAIMED_POWER_METHOD,
        IpldBlock::serialize_cbor(&ext::power::UpdateClaimedPowerParams {
            raw_byte_delta: delta.raw,
            quality_adjusted_delta: delta.qa,
        })?,
        TokenAmount::zero(),
    ))
    .map_err(|e| e.wrap(format!("failed to update power with {:?}", delta_clone)))?;

    Ok(())
}

/// Requests the current epoch target block reward from the reward actor.
/// return value includes reward, smoothed estimate of reward, and baseline power
fn request_current_epoch_block_reward(
    rt: &impl Runtime,
) -> Result<ext::reward::ThisEpochRewardReturn, ActorError> {
    deserialize_block(
        extract_send_result(rt.send(
            &REWARD_ACTOR_ADDR,
            ext::reward::THIS_EPOCH_REWARD_METHOD,
            None,
            TokenAmount::zero(),
        ))
        .map_err(|e| e.wrap("failed to check epoch baseline power"))?,
    )
}

/// Requests the current network total power and pledge from the power actor.
fn request_current_total_power(
    rt: &impl Runtime,
) -> Result<ext::power::CurrentTotalPowerReturn, ActorError> {
    deserialize_block(
        extract_send_result(rt.send(
            &STORAGE_POWER_ACTOR_ADDR,
            ext::power::CURRENT_TOTAL_POWER_METHOD,
            None,
            TokenAmount::zero(),
        ))
        .map_err(|e| e.wrap("failed to check current power"))?,
    )
}

/// Resolves an address to an ID address and verifies that it is the address of an account actor.
fn resolve_worker_address(rt: &impl Runtime, raw: Address) -> Result<Address, ActorError> {
    let resolved = rt
        .resolve_address(&raw)
        .ok_or_else(|| actor_error!(illegal_argument, "unable to resolve address: {}", raw))?;

    let worker_code = rt
        .get_actor_code_cid(&resolved)
        .ok_or_else(|| actor_error!(illegal_argument, "no code for address: {}", resolved))?;
    if rt.resolve_builtin_actor_type(&worker_code) != Some(Type::Account) {
        return Err(actor_error!(
            illegal_argument,
            "worker actor type must be an account, was {}",
            worker_code
        ));
    }
    Ok(Address::new_id(resolved))
}

/// Resolves an address to an ID address of a principal (account or multisig) actor.
fn resolve_control_address(rt: &impl Runtime, raw: Address) -> Result<Address, ActorError> {
    let resolved = rt
        .resolve_address(&raw)
        .ok_or_else(|| actor_error!(illegal_argument, "unable to resolve address: {}", raw))?;

    let code = rt
        .get_actor_code_cid(&resolved)
        .ok_or_else(|| actor_error!(illegal_argument, "no code for address: {}", resolved))?;
    match rt.resolve_builtin_actor_type(&code) {
        Some(typ) if typ.is_principal() => Ok(Address::new_id(resolved)),
        _ => Err(actor_error!(
            illegal_argument,
            "owner actor type must be a principal, was {}",
            code
        )),
    }
}

fn burn_funds(rt: &impl Runtime, amount: TokenAmount) -> Result<(), ActorError> {
    debug!("storage provider {} burning {}", rt.message().receiver(), amount);
    if amount.is_positive() {
        extract_send_result(rt.send(&BURNT_FUNDS_ACTOR_ADDR, METHOD_SEND, None, amount))?;
    }
    Ok(())
}

fn notify_pledge_changed(rt: &impl Runtime, pledge_delta: &TokenAmount) -> Result<(), ActorError> {
    if !pledge_delta.is_zero() {
        extract_send_result(rt.send(
            &STORAGE_POWER_ACTOR_ADDR,
            ext::power::UPDATE_PLEDGE_TOTAL_METHOD,
            IpldBlock::serialize_cbor(&ext::power::UpdatePledgeTotalParams {
                pledge_delta: pledge_delta.clone(),
            })?,
            TokenAmount::zero(),
        ))?;
    }
    Ok(())
}

/// Assigns proving period offset randomly in the range [0, WPoStProvingPeriod) by hashing
/// the actor's address and current epoch.
fn assign_proving_period_offset(
    rt: &impl Runtime,
    current_epoch: ChainEpoch,
) -> Result<ChainEpoch, ActorError> {
    let mut my_addr = receiver_entropy(rt)?;
    my_addr
        .write_i64::<BigEndian>(current_epoch)
        .context_code(ExitCode::USR_SERIALIZATION, "failed to encode epoch")?;

    let digest = rt.hash_blake2b(&my_addr);

    let mut offset: u64 = BigEndian::read_u64(&digest);
    offset %= rt.policy().wpost_proving_period as u64;

    // Conversion from i64 to u64 is safe because it's % WPOST_PROVING_PERIOD which is i64
    Ok(offset as ChainEpoch)
}

/// Computes the epoch at which the proving period containing `current_epoch` started, given
/// the period's offset from a multiple of WPoStProvingPeriod.
pub fn current_proving_period_start(
    policy: &Policy,
    current_epoch: ChainEpoch,
    offset: ChainEpoch,
) -> ChainEpoch {
    let curr_modulus = current_epoch % policy.wpost_proving_period;

    let period_progress = if curr_modulus >= offset {
        curr_modulus - offset
    } else {
        policy.wpost_proving_period - (offset - curr_modulus)
    };

    current_epoch - period_progress
}

fn check_control_addresses(policy: &Policy, control_addrs: &[Address]) -> Result<(), ActorError> {
    if control_addrs.len() > policy.max_control_addresses {
        return Err(actor_error!(
            illegal_argument,
            "control addresses length {} exceeds max control addresses length {}",
            control_addrs.len(),
            policy.max_control_addresses
        ));
    }

    Ok(())
}

fn check_peer_info(
    policy: &Policy,
    peer_id: &[u8],
    multiaddrs: &[BytesDe],
) -> Result<(), ActorError> {
    if peer_id.len() > policy.max_peer_id_length {
        return Err(actor_error!(
            illegal_argument,
            "peer ID size of {} exceeds maximum size of {}",
            peer_id.len(),
            policy.max_peer_id_length
        ));
    }

    let mut total_size = 0;
    for ma in multiaddrs {
        if ma.0.is_empty() {
            return Err(actor_error!(illegal_argument, "invalid empty multiaddr"));
        }
        total_size += ma.0.len();
    }

    if total_size > policy.max_multiaddr_data {
        return Err(actor_error!(
            illegal_argument,
            "multiaddr size of {} exceeds maximum of {}",
            total_size,
            policy.max_multiaddr_data
        ));
    }

    Ok(())
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        ControlAddresses => control_addresses,
        ChangeWorkerAddress => change_worker_address,
        ChangePeerID => change_peer_id,
        SubmitWindowedPoSt => submit_windowed_post,
        PreCommitSector => pre_commit_sector,
        ProveCommitSector => prove_commit_sector,
        TerminateSectors => terminate_sectors,
        DeclareFaults => declare_faults,
        DeclareFaultsRecovered => declare_faults_recovered,
        ApplyRewards => apply_rewards,
        WithdrawBalance => withdraw_balance,
        ProveCommitAggregate => prove_commit_aggregate,
    }
}
