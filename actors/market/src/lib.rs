// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fc_actors_runtime::runtime::{ActorCode, Runtime, Type};
use fc_actors_runtime::{
    actor_dispatch, actor_error, deserialize_block, extract_send_result, ActorContext,
    ActorError, AsActorError, BURNT_FUNDS_ACTOR_ADDR, CRON_ACTOR_ADDR, INIT_ACTOR_ADDR,
    REWARD_ACTOR_ADDR, STORAGE_POWER_ACTOR_ADDR, SYSTEM_ACTOR_ADDR,
};
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::piece::PieceInfo;
use fvm_shared::sector::StoragePower;
use fvm_shared::{ActorID, METHOD_CONSTRUCTOR};
use log::{debug, info, warn};
use num_derive::FromPrimitive;
use num_traits::Zero;

pub use self::deal::*;
pub use self::policy::*;
pub use self::state::*;
pub use self::types::*;

mod deal;
#[doc(hidden)]
pub mod ext;
mod policy;
mod state;
pub mod testing;
mod types;

/// Storage market actor methods available
#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    AddBalance = 2,
    WithdrawBalance = 3,
    PublishStorageDeals = 4,
    VerifyDealsOnSectorProveCommit = 5,
    OnMinerSectorsTerminate = 6,
    ComputeDataCommitment = 7,
    CronTick = 8,
}

const CALLER_TYPES_SIGNABLE: &[Type] = &[Type::Account, Type::Multisig];

/// Market Actor
pub struct Actor;

impl Actor {
    pub fn constructor(rt: &impl Runtime) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is([&SYSTEM_ACTOR_ADDR, &INIT_ACTOR_ADDR])?;

        let st = State::new(rt.store())?;
        rt.create(&st)?;
        Ok(())
    }

    /// Deposits the received value into the balance held in escrow.
    fn add_balance(rt: &impl Runtime, params: AddBalanceParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_type(CALLER_TYPES_SIGNABLE)?;

        let msg_value = rt.message().value_received();
        rt.validate_argument(msg_value.is_positive(), "balance to add must be greater than zero")?;

        let escrow = escrow_address(rt, &params.provider_or_client)?;
        if let Some(approved) = &escrow.miner_approved {
            let caller = rt.message().caller();
            if !approved.contains(&caller) {
                return Err(actor_error!(
                    forbidden,
                    "caller {} is neither owner nor worker of miner {}",
                    caller,
                    escrow.nominal
                ));
            }
        }

        rt.transaction(|st: &mut State, rt| {
            st.add_balance_to_escrow_table(rt.store(), &escrow.nominal, &msg_value)?;
            Ok(())
        })?;

        debug!("added {} to escrow of {}", msg_value, escrow.nominal);
        Ok(())
    }

    /// Attempt to withdraw the specified amount from the balance held in escrow.
    /// If less than the specified amount is available, yields the entire available balance.
    fn withdraw_balance(
        rt: &impl Runtime,
        params: WithdrawBalanceParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_type(CALLER_TYPES_SIGNABLE)?;
        if params.amount.is_negative() {
            return Err(actor_error!(illegal_argument, "negative amount: {}", params.amount));
        }

        let escrow = escrow_address(rt, &params.provider_or_client)?;
        rt.validate_immediate_caller_is(escrow.approved_callers().iter())?;

        let (amount_slashed, amount_extracted) = rt.transaction(|st: &mut State, rt| {
            let epoch = rt.curr_epoch() - 1;
            let interval = rt.policy().deal_updates_interval;
            let mut amount_slashed = TokenAmount::zero();
            for deal_id in st.deals_for_party(rt.store(), &escrow.nominal)? {
                let deal = match st.find_proposal(rt.store(), deal_id)? {
                    Some(deal) => deal,
                    None => continue,
                };
                if let DealSettlement::Removed { slashed } =
                    st.update_pending_deal_state(rt.store(), deal_id, &deal, epoch, interval)?
                {
                    amount_slashed += slashed;
                }
            }

            let ex = st
                .withdraw_balance_from_escrow_table(rt.store(), &escrow.nominal, &params.amount)
                .with_context(|| format!("failed to withdraw from escrow of {}", escrow.nominal))?;
            Ok((amount_slashed, ex))
        })?;

        if amount_slashed.is_positive() {
            rt.send_funds(&BURNT_FUNDS_ACTOR_ADDR, amount_slashed)?;
        }
        info!(
            "withdrew {} of {} requested from escrow of {} to {}",
            amount_extracted, params.amount, escrow.nominal, escrow.recipient
        );
        rt.send_funds(&escrow.recipient, amount_extracted)?;
        Ok(())
    }

    /// Publish a new set of storage deals (not yet included in a sector).
    fn publish_storage_deals(
        rt: &impl Runtime,
        params: PublishStorageDealsParams,
    ) -> Result<PublishStorageDealsReturn, ActorError> {
        // Deal message must have a From field identical to the provider of all the deals.
        // This allows us to retain and verify only the client's signature in each deal proposal itself.
        rt.validate_immediate_caller_type(CALLER_TYPES_SIGNABLE)?;
        if params.deals.is_empty() {
            return Err(actor_error!(illegal_argument, "empty deals parameter"));
        }

        // All deals should have the same provider so get worker once
        let provider_raw = params.deals[0].proposal.provider;
        let provider_id = rt.resolve_address(&provider_raw).ok_or_else(|| {
            actor_error!(not_found, "failed to resolve provider address {}", provider_raw)
        })?;
        let provider = Address::new_id(provider_id);
        let code_id = rt
            .get_actor_code_cid(&provider_id)
            .with_context_code(ExitCode::USR_ILLEGAL_ARGUMENT, || {
                format!("no code ID for address {}", provider)
            })?;
        if rt.resolve_builtin_actor_type(&code_id) != Some(Type::Miner) {
            return Err(actor_error!(
                illegal_argument,
                "deal provider {} is not a storage miner actor",
                provider
            ));
        }

        let (_, worker, _) = request_miner_control_addrs(rt, provider_id)?;
        let caller = rt.message().caller();
        if caller != worker {
            return Err(actor_error!(
                forbidden,
                "caller {} is not worker {} of provider {}",
                caller,
                worker,
                provider
            ));
        }

        let baseline_power = request_current_baseline_power(rt)?;
        let (network_raw_power, network_qa_power) = request_current_network_power(rt)?;
        let network_power = NetworkPower {
            raw: &network_raw_power,
            quality_adj: &network_qa_power,
            baseline: &baseline_power,
        };
        let circulating_supply = rt.total_fil_circ_supply();

        let mut proposals: Vec<(DealProposal, Cid)> = Vec::with_capacity(params.deals.len());
        for (di, deal) in params.deals.iter().enumerate() {
            validate_deal(rt, deal, &network_power, &circulating_supply)
                .with_context(|| format!("invalid deal {}", di))?;

            let deal_provider = rt.resolve_address(&deal.proposal.provider);
            if deal_provider != Some(provider_id) {
                return Err(actor_error!(
                    illegal_argument,
                    "cannot publish deals from multiple providers in one batch"
                ));
            }

            let client_id = rt.resolve_address(&deal.proposal.client).ok_or_else(|| {
                actor_error!(
                    illegal_argument,
                    "failed to resolve client address {}",
                    deal.proposal.client
                )
            })?;

            // Normalise provider and client addresses in the proposal stored on chain.
            let mut proposal = deal.proposal.clone();
            proposal.provider = provider;
            proposal.client = Address::new_id(client_id);
            let pcid = proposal.cid()?;
            proposals.push((proposal, pcid));
        }

        let ids = rt.transaction(|st: &mut State, rt| {
            let interval = rt.policy().deal_updates_interval;
            let mut new_deal_ids = Vec::with_capacity(proposals.len());
            let mut deals_by_epoch: Vec<(ChainEpoch, DealID)> = Vec::new();
            for (proposal, pcid) in &proposals {
                st.lock_client_and_provider_balances(rt.store(), proposal)?;

                let id = st.generate_storage_deal_id();
                st.put_deal_proposal(rt.store(), id, proposal, *pcid)?;

                deals_by_epoch.push((next_update_epoch(id, proposal.start_epoch, interval), id));
                new_deal_ids.push(id);
            }
            st.put_deals_by_epoch(rt.store(), &deals_by_epoch)?;
            Ok(new_deal_ids)
        })?;

        info!("published {} deals for provider {}: {:?}", ids.len(), provider, ids);
        Ok(PublishStorageDealsReturn { ids })
    }

    /// Verify that a given set of storage deals is valid for a sector currently being ProveCommitted,
    /// update the market's internal state accordingly, and return DealWeight of the set of storage deals given.
    /// Note: in the case of a capacity-commitment sector (one with zero deals), this function should succeed vacuously.
    fn verify_deals_on_sector_prove_commit(
        rt: &impl Runtime,
        params: VerifyDealsOnSectorProveCommitParams,
    ) -> Result<VerifyDealsOnSectorProveCommitReturn, ActorError> {
        rt.validate_immediate_caller_type(std::iter::once(&Type::Miner))?;
        let miner_addr = rt.message().caller();
        let curr_epoch = rt.curr_epoch();

        rt.transaction(|st: &mut State, rt| {
            let mut weights = VerifyDealsOnSectorProveCommitReturn::default();
            for deal_id in &params.deal_ids {
                let proposal = st
                    .get_proposal(rt.store(), *deal_id)
                    .with_context(|| format!("no proposal for deal {}", deal_id))?;

                validate_deal_can_activate(&proposal, &miner_addr, params.sector_expiry, curr_epoch)
                    .with_context(|| format!("cannot activate deal {}", deal_id))?;

                if st.find_deal_state(rt.store(), *deal_id)?.is_some() {
                    return Err(actor_error!(
                        illegal_argument,
                        "deal {} already activated",
                        deal_id
                    ));
                }

                st.put_deal_state(rt.store(), *deal_id, DealState::activated_at(curr_epoch))?;
                st.remove_pending_proposal(rt.store(), &proposal)?;

                if proposal.verified_deal {
                    weights.verified_deal_weight += deal_weight(&proposal);
                } else {
                    weights.deal_weight += deal_weight(&proposal);
                }
            }
            Ok(weights)
        })
    }

    /// Terminate a set of deals in response to their containing sector being terminated.
    /// Slash provider collateral, refund client collateral, and refund partial unpaid escrow
    /// amount to client.
    fn on_miner_sectors_terminate(
        rt: &impl Runtime,
        params: OnMinerSectorsTerminateParams,
    ) -> Result<(), ActorError> {
        rt.validate_immediate_caller_type(std::iter::once(&Type::Miner))?;
        let miner_addr = rt.message().caller();

        rt.transaction(|st: &mut State, rt| {
            for id in &params.deal_ids {
                // A deal may already have been removed by cron.
                let deal = match st.find_proposal(rt.store(), *id)? {
                    Some(deal) => deal,
                    None => {
                        debug!("ignoring termination of missing deal {}", id);
                        continue;
                    }
                };

                // Deals may be terminated by any miner's sector, but only the provider's own
                // sectors count.
                if deal.provider != miner_addr {
                    warn!("miner {} cannot terminate deal {} of {}", miner_addr, id, deal.provider);
                    continue;
                }

                // do not slash expired deals
                if deal.end_epoch <= params.epoch {
                    debug!("ignoring termination of expired deal {}", id);
                    continue;
                }

                let mut state = match st.find_deal_state(rt.store(), *id)? {
                    Some(state) => state,
                    None => {
                        debug!("ignoring termination of unactivated deal {}", id);
                        continue;
                    }
                };

                // if a deal is already slashed, don't need to do anything
                if state.is_slashed() {
                    debug!("deal {} already slashed at {}", id, state.slash_epoch);
                    continue;
                }

                // mark the deal for slashing here. Actual releasing of locked funds for the client
                // and slashing of provider collateral happens in the cron tick.
                state.slash_epoch = params.epoch;
                st.put_deal_state(rt.store(), *id, state)?;
            }
            Ok(())
        })
    }

    fn compute_data_commitment(
        rt: &impl Runtime,
        params: ComputeDataCommitmentParams,
    ) -> Result<ComputeDataCommitmentReturn, ActorError> {
        rt.validate_immediate_caller_type(std::iter::once(&Type::Miner))?;

        let st: State = rt.state()?;
        let mut pieces: Vec<PieceInfo> = Vec::with_capacity(params.deal_ids.len());
        for id in &params.deal_ids {
            let deal = st
                .get_proposal(rt.store(), *id)
                .with_context(|| format!("no proposal for deal {}", id))?;
            pieces.push(PieceInfo { cid: deal.piece_cid, size: deal.piece_size });
        }

        let commd = rt
            .compute_unsealed_sector_cid(params.sector_type, &pieces)
            .context_code(ExitCode::USR_ILLEGAL_ARGUMENT, "failed to compute unsealed sector CID")?;

        Ok(ComputeDataCommitmentReturn { commd })
    }

    fn cron_tick(rt: &impl Runtime) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&CRON_ACTOR_ADDR))?;
        let curr_epoch = rt.curr_epoch();

        let amount_slashed = rt.transaction(|st: &mut State, rt| {
            let interval = rt.policy().deal_updates_interval;
            let mut amount_slashed = TokenAmount::zero();

            for epoch in (st.last_cron + 1)..=curr_epoch {
                let deal_ids = st.get_deals_for_epoch(rt.store(), epoch)?;
                let mut rescheduled: Vec<(ChainEpoch, DealID)> = Vec::new();

                for deal_id in deal_ids {
                    // removed since it was scheduled
                    let deal = match st.find_proposal(rt.store(), deal_id)? {
                        Some(deal) => deal,
                        None => continue,
                    };

                    match st.update_pending_deal_state(rt.store(), deal_id, &deal, epoch, interval)?
                    {
                        DealSettlement::NotDue => {
                            let next = if deal.start_epoch > epoch {
                                next_update_epoch(deal_id, deal.start_epoch, interval)
                            } else {
                                epoch + interval
                            };
                            rescheduled.push((next, deal_id));
                        }
                        DealSettlement::Continue(next) => rescheduled.push((next, deal_id)),
                        DealSettlement::Removed { slashed } => amount_slashed += slashed,
                    }
                }

                st.remove_deals_by_epoch(rt.store(), epoch)?;
                st.put_deals_by_epoch(rt.store(), &rescheduled)?;
            }

            st.last_cron = curr_epoch;
            Ok(amount_slashed)
        })?;

        if amount_slashed.is_positive() {
            debug!("burning {} of slashed deal collateral", amount_slashed);
            rt.send_funds(&BURNT_FUNDS_ACTOR_ADDR, amount_slashed)?;
        }
        Ok(())
    }
}

/// Balance owner resolved for an escrow operation.
struct EscrowAddress {
    /// ID address the balance is recorded under.
    nominal: Address,
    /// Where withdrawn funds go: the owner for a miner, the nominal address otherwise.
    recipient: Address,
    /// Owner and worker when the nominal address is a miner.
    miner_approved: Option<Vec<Address>>,
}

impl EscrowAddress {
    fn approved_callers(&self) -> Vec<Address> {
        self.miner_approved.clone().unwrap_or_else(|| vec![self.nominal])
    }
}

fn escrow_address(rt: &impl Runtime, addr: &Address) -> Result<EscrowAddress, ActorError> {
    let id = rt
        .resolve_address(addr)
        .ok_or_else(|| actor_error!(not_found, "failed to resolve address {}", addr))?;
    let nominal = Address::new_id(id);

    let code_id = rt
        .get_actor_code_cid(&id)
        .with_context_code(ExitCode::USR_ILLEGAL_ARGUMENT, || {
            format!("no code for address {}", nominal)
        })?;

    if rt.resolve_builtin_actor_type(&code_id) == Some(Type::Miner) {
        // Storage miner actor entry; implied funds recipient is the associated owner address.
        let (owner, worker, _) = request_miner_control_addrs(rt, id)?;
        return Ok(EscrowAddress {
            nominal,
            recipient: owner,
            miner_approved: Some(vec![owner, worker]),
        });
    }

    Ok(EscrowAddress { nominal, recipient: nominal, miner_approved: None })
}

/// Validates a deal's signature, bounds and timing against the current chain state.
fn validate_deal(
    rt: &impl Runtime,
    deal: &ClientDealProposal,
    network_power: &NetworkPower,
    circulating_supply: &TokenAmount,
) -> Result<(), ActorError> {
    let proposal = &deal.proposal;
    let bytes = proposal.marshal_cbor()?;
    if !rt.verify_signature(&deal.client_signature, &proposal.client, &bytes) {
        return Err(actor_error!(illegal_argument, "signature proposal invalid"));
    }

    if proposal.label.len() > rt.policy().max_deal_label_size {
        return Err(actor_error!(
            illegal_argument,
            "deal label can be at most {} bytes, is {}",
            rt.policy().max_deal_label_size,
            proposal.label.len()
        ));
    }

    proposal
        .piece_size
        .validate()
        .map_err(|e| actor_error!(illegal_argument, "proposal piece size is invalid: {}", e))?;

    if !is_piece_cid(&proposal.piece_cid) {
        return Err(actor_error!(illegal_argument, "proposal piece CID is not a piece commitment"));
    }

    if proposal.end_epoch <= proposal.start_epoch {
        return Err(actor_error!(illegal_argument, "proposal end before proposal start"));
    }

    if rt.curr_epoch() > proposal.start_epoch {
        return Err(actor_error!(illegal_argument, "deal start epoch has already elapsed"));
    }

    let (min_dur, max_dur) = deal_duration_bounds(rt.policy(), proposal.piece_size);
    if proposal.duration() < min_dur || proposal.duration() > max_dur {
        return Err(actor_error!(illegal_argument, "deal duration out of bounds"));
    }

    let (min_price, max_price) =
        deal_price_per_epoch_bounds(proposal.piece_size, proposal.duration());
    if proposal.storage_price_per_epoch < min_price || proposal.storage_price_per_epoch > max_price
    {
        return Err(actor_error!(illegal_argument, "storage price out of bounds"));
    }

    let (min_provider_collateral, max_provider_collateral) = deal_provider_collateral_bounds(
        proposal,
        network_power,
        circulating_supply,
        rt.network_version(),
    );
    if proposal.provider_collateral < min_provider_collateral
        || proposal.provider_collateral > max_provider_collateral
    {
        return Err(actor_error!(
            illegal_argument,
            "provider collateral {} out of bounds [{}, {}]",
            proposal.provider_collateral,
            min_provider_collateral,
            max_provider_collateral
        ));
    }

    let (min_client_collateral, max_client_collateral) =
        deal_client_collateral_bounds(proposal.piece_size, proposal.duration());
    if proposal.client_collateral < min_client_collateral
        || proposal.client_collateral > max_client_collateral
    {
        return Err(actor_error!(illegal_argument, "client collateral out of bounds"));
    }

    Ok(())
}

fn validate_deal_can_activate(
    proposal: &DealProposal,
    miner_addr: &Address,
    sector_expiration: ChainEpoch,
    curr_epoch: ChainEpoch,
) -> Result<(), ActorError> {
    if &proposal.provider != miner_addr {
        return Err(actor_error!(
            forbidden,
            "proposal has provider {}, must be {}",
            proposal.provider,
            miner_addr
        ));
    }

    if curr_epoch > proposal.start_epoch {
        return Err(actor_error!(
            illegal_argument,
            "proposal start epoch {} has already elapsed at {}",
            proposal.start_epoch,
            curr_epoch
        ));
    }

    if proposal.end_epoch > sector_expiration {
        return Err(actor_error!(
            illegal_argument,
            "proposal expiration {} exceeds sector expiration {}",
            proposal.end_epoch,
            sector_expiration
        ));
    }

    Ok(())
}

/// Requests the owner, worker and control addresses of a miner.
fn request_miner_control_addrs(
    rt: &impl Runtime,
    miner_id: ActorID,
) -> Result<(Address, Address, Vec<Address>), ActorError> {
    let addrs: ext::miner::ControlAddressesReturn =
        deserialize_block(extract_send_result(rt.send(
            &Address::new_id(miner_id),
            ext::miner::CONTROL_ADDRESSES_METHOD,
            None,
            TokenAmount::zero(),
        ))?)?;

    Ok((addrs.owner, addrs.worker, addrs.control_addresses))
}

/// Requests the current epoch target block reward from the reward actor.
/// return value includes reward, smoothed estimate of reward, and baseline power
fn request_current_baseline_power(rt: &impl Runtime) -> Result<StoragePower, ActorError> {
    let ret: ext::reward::ThisEpochRewardReturn = deserialize_block(extract_send_result(
        rt.send(
            &REWARD_ACTOR_ADDR,
            ext::reward::THIS_EPOCH_REWARD_METHOD,
            None,
            TokenAmount::zero(),
        ),
    )?)?;
    Ok(ret.this_epoch_baseline_power)
}

/// Requests the current network total power and pledge from the power actor.
/// Returns a tuple of (raw_power, qa_power).
fn request_current_network_power(
    rt: &impl Runtime,
) -> Result<(StoragePower, StoragePower), ActorError> {
    let ret: ext::power::CurrentTotalPowerReturn =
        deserialize_block(extract_send_result(rt.send(
            &STORAGE_POWER_ACTOR_ADDR,
            ext::power::CURRENT_TOTAL_POWER_METHOD,
            None,
            TokenAmount::zero(),
        ))?)?;
    Ok((ret.raw_byte_power, ret.quality_adj_power))
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        AddBalance => add_balance,
        WithdrawBalance => withdraw_balance,
        PublishStorageDeals => publish_storage_deals,
        VerifyDealsOnSectorProveCommit => verify_deals_on_sector_prove_commit,
        OnMinerSectorsTerminate => on_miner_sectors_terminate,
        ComputeDataCommitment => compute_data_commitment,
        CronTick => cron_tick,
    }
}
