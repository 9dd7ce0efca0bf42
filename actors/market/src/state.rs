// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cmp::{max, min};

use cid::Cid;
use fc_actors_runtime::{
    actor_error, ActorContext, ActorError, BalanceTable, Config, Map, Set, SetMultimap,
    SetMultimapConfig, DEFAULT_HAMT_CONFIG,
};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::clock::{ChainEpoch, EPOCH_UNDEFINED};
use fvm_shared::deal::DealID;
use fvm_shared::econ::TokenAmount;
use log::debug;
use num_traits::Zero;

use crate::policy::collateral_penalty_for_deal_activation_missed;
use crate::{DealProposal, DealState};

pub const PROPOSALS_CONFIG: Config = DEFAULT_HAMT_CONFIG;
pub const STATES_CONFIG: Config = DEFAULT_HAMT_CONFIG;
pub const PENDING_PROPOSALS_CONFIG: Config = DEFAULT_HAMT_CONFIG;

pub type DealArray<BS> = Map<BS, DealID, DealProposal>;
pub type DealMetaArray<BS> = Map<BS, DealID, DealState>;
pub type PendingProposalsSet<BS> = Set<BS, Cid>;
pub type DealsByParty<BS> = SetMultimap<BS, Address, DealID>;
pub type DealOpsByEpoch<BS> = SetMultimap<BS, ChainEpoch, DealID>;

fn multimap_config() -> SetMultimapConfig {
    SetMultimapConfig { outer: DEFAULT_HAMT_CONFIG, inner: DEFAULT_HAMT_CONFIG }
}

pub enum Reason {
    ClientCollateral,
    ClientStorageFee,
    ProviderCollateral,
}

/// Outcome of settling a deal at some epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DealSettlement {
    /// Nothing to do yet: the deal has not started, or was already settled up to this epoch.
    NotDue,
    /// Payment up to the epoch was made. The deal should next be settled at the given epoch.
    Continue(ChainEpoch),
    /// The deal expired, was slashed or timed out, and has been removed.
    Removed { slashed: TokenAmount },
}

/// Market actor state
#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    /// Proposals are deals that have been proposed and not yet cleaned up after expiry or termination.
    /// Map<DealID, DealProposal>
    pub proposals: Cid,

    /// States contains state for deals that have been activated and not yet cleaned up after expiry or termination.
    /// After expiration, the state exists until the proposal is cleaned up too.
    /// Invariant: keys(States) ⊆ keys(Proposals).
    /// Map<DealID, DealState>
    pub states: Cid,

    /// PendingProposals tracks dealProposals that have not yet been activated.
    /// We track them here to ensure that miners can't publish the same deal proposal twice
    pub pending_proposals: Cid,

    /// Total amount held in escrow, indexed by actor address (including both locked and unlocked amounts).
    pub escrow_table: Cid,

    /// Amount locked, indexed by actor address.
    /// Note: the amounts in this table do not affect the overall amount in escrow:
    /// only the _portion_ of the total escrow amount that is locked.
    pub locked_table: Cid,

    /// Deal id state sequential incrementer
    pub next_id: DealID,

    /// Deal ids indexed by client and by provider address.
    /// SetMultimap<Address, DealID>
    pub deals_by_party: Cid,

    /// Metadata cached for efficient iteration over deals.
    /// SetMultimap<ChainEpoch, DealID>
    pub deal_ops_by_epoch: Cid,
    pub last_cron: ChainEpoch,

    /// Total Client Collateral that is locked -> unlocked when deal is terminated
    pub total_client_locked_collateral: TokenAmount,
    /// Total Provider Collateral that is locked -> unlocked when deal is terminated
    pub total_provider_locked_collateral: TokenAmount,
    /// Total storage fee that is locked in escrow -> unlocked when payments are made
    pub total_client_storage_fee: TokenAmount,
}

impl State {
    pub fn new<BS: Blockstore>(store: &BS) -> Result<Self, ActorError> {
        let empty_proposals = DealArray::<_>::flush_empty(store, PROPOSALS_CONFIG)
            .context("failed to create empty proposals map")?;
        let empty_states = DealMetaArray::<_>::flush_empty(store, STATES_CONFIG)
            .context("failed to create empty states map")?;
        let empty_pending_proposals =
            PendingProposalsSet::empty(store, PENDING_PROPOSALS_CONFIG, "pending proposals")
                .flush()
                .context("failed to create empty pending proposals set")?;
        let empty_balance_table = BalanceTable::new(store, "balance table")
            .context("failed to create empty balance table")?
            .root();
        let empty_multimap = DealOpsByEpoch::empty(store, multimap_config(), "deal ops")
            .flush()
            .context("failed to create empty multiset")?;

        Ok(Self {
            proposals: empty_proposals,
            states: empty_states,
            pending_proposals: empty_pending_proposals,
            escrow_table: empty_balance_table,
            locked_table: empty_balance_table,
            next_id: 0,
            deals_by_party: empty_multimap,
            deal_ops_by_epoch: empty_multimap,
            last_cron: EPOCH_UNDEFINED,
            total_client_locked_collateral: TokenAmount::zero(),
            total_provider_locked_collateral: TokenAmount::zero(),
            total_client_storage_fee: TokenAmount::zero(),
        })
    }

    pub fn total_locked(&self) -> TokenAmount {
        &self.total_client_locked_collateral
            + &self.total_provider_locked_collateral
            + &self.total_client_storage_fee
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Proposals and states
    ////////////////////////////////////////////////////////////////////////////////

    pub fn load_proposals<BS: Blockstore>(&self, store: BS) -> Result<DealArray<BS>, ActorError> {
        DealArray::load(store, &self.proposals, PROPOSALS_CONFIG, "deal proposals")
    }

    pub fn load_deal_states<BS: Blockstore>(
        &self,
        store: BS,
    ) -> Result<DealMetaArray<BS>, ActorError> {
        DealMetaArray::load(store, &self.states, STATES_CONFIG, "deal states")
    }

    /// Returns the proposal, failing with `USR_NOT_FOUND` if there is none.
    pub fn get_proposal<BS: Blockstore>(
        &self,
        store: &BS,
        id: DealID,
    ) -> Result<DealProposal, ActorError> {
        self.load_proposals(store)?.get(&id).cloned()
    }

    pub fn find_proposal<BS: Blockstore>(
        &self,
        store: &BS,
        id: DealID,
    ) -> Result<Option<DealProposal>, ActorError> {
        Ok(self.load_proposals(store)?.try_get(&id)?.cloned())
    }

    pub fn find_deal_state<BS: Blockstore>(
        &self,
        store: &BS,
        id: DealID,
    ) -> Result<Option<DealState>, ActorError> {
        Ok(self.load_deal_states(store)?.try_get(&id)?.copied())
    }

    pub fn put_deal_state<BS: Blockstore>(
        &mut self,
        store: &BS,
        id: DealID,
        state: DealState,
    ) -> Result<(), ActorError> {
        let mut states = self.load_deal_states(store)?;
        states.set(&id, state)?;
        self.states = states.flush()?;
        Ok(())
    }

    /// Records a newly published deal: the proposal, its pending CID and the party index.
    pub fn put_deal_proposal<BS: Blockstore>(
        &mut self,
        store: &BS,
        id: DealID,
        proposal: &DealProposal,
        proposal_cid: Cid,
    ) -> Result<(), ActorError> {
        let mut pending = self.load_pending_proposals(store)?;
        if !pending.put(&proposal_cid)? {
            return Err(actor_error!(
                illegal_argument,
                "cannot publish duplicate deal proposal {}",
                proposal_cid
            ));
        }
        self.pending_proposals = pending.flush()?;

        let mut proposals = self.load_proposals(store)?;
        proposals.set(&id, proposal.clone())?;
        self.proposals = proposals.flush()?;

        let mut by_party = self.load_deals_by_party(store)?;
        by_party.put(&proposal.client, id)?;
        by_party.put(&proposal.provider, id)?;
        self.deals_by_party = by_party.flush()?;
        Ok(())
    }

    /// Deletes every trace of a deal: proposal, state, pending CID and party index entries.
    /// Scheduled cron entries are left behind and skipped when they come due.
    pub fn remove_deal<BS: Blockstore>(
        &mut self,
        store: &BS,
        id: DealID,
        proposal: &DealProposal,
    ) -> Result<(), ActorError> {
        let mut proposals = self.load_proposals(store)?;
        proposals.remove(&id).with_context(|| format!("failed to delete deal {} proposal", id))?;
        self.proposals = proposals.flush()?;

        let mut states = self.load_deal_states(store)?;
        if states.try_remove(&id)?.is_some() {
            self.states = states.flush()?;
        }

        self.remove_pending_proposal(store, proposal)?;

        let mut by_party = self.load_deals_by_party(store)?;
        by_party.remove(&proposal.client, id)?;
        by_party.remove(&proposal.provider, id)?;
        self.deals_by_party = by_party.flush()?;
        Ok(())
    }

    pub fn generate_storage_deal_id(&mut self) -> DealID {
        let ret = self.next_id;
        self.next_id += 1;
        ret
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Indexes
    ////////////////////////////////////////////////////////////////////////////////

    pub fn load_pending_proposals<BS: Blockstore>(
        &self,
        store: BS,
    ) -> Result<PendingProposalsSet<BS>, ActorError> {
        PendingProposalsSet::load(
            store,
            &self.pending_proposals,
            PENDING_PROPOSALS_CONFIG,
            "pending proposals",
        )
    }

    pub fn has_pending_proposal<BS: Blockstore>(
        &self,
        store: &BS,
        proposal_cid: &Cid,
    ) -> Result<bool, ActorError> {
        self.load_pending_proposals(store)?.has(proposal_cid)
    }

    /// Drops the proposal from the pending set, if it is still there.
    pub fn remove_pending_proposal<BS: Blockstore>(
        &mut self,
        store: &BS,
        proposal: &DealProposal,
    ) -> Result<(), ActorError> {
        let mut pending = self.load_pending_proposals(store)?;
        if pending.delete(&proposal.cid()?)? {
            self.pending_proposals = pending.flush()?;
        }
        Ok(())
    }

    pub fn load_deals_by_party<BS: Blockstore>(
        &self,
        store: BS,
    ) -> Result<DealsByParty<BS>, ActorError>
    where
        BS: Clone,
    {
        DealsByParty::load(store, &self.deals_by_party, multimap_config(), "deals by party")
    }

    /// Ids of every live deal the address is client or provider of.
    pub fn deals_for_party<BS: Blockstore>(
        &self,
        store: &BS,
        party: &Address,
    ) -> Result<Vec<DealID>, ActorError> {
        let mut ids = Vec::new();
        self.load_deals_by_party(store)?.for_each_in(party, |id| {
            ids.push(id);
            Ok(())
        })?;
        Ok(ids)
    }

    pub fn load_deal_ops<BS: Blockstore>(
        &self,
        store: BS,
    ) -> Result<DealOpsByEpoch<BS>, ActorError>
    where
        BS: Clone,
    {
        DealOpsByEpoch::load(store, &self.deal_ops_by_epoch, multimap_config(), "deal ops")
    }

    pub fn put_deals_by_epoch<BS: Blockstore>(
        &mut self,
        store: &BS,
        new_deals_by_epoch: &[(ChainEpoch, DealID)],
    ) -> Result<(), ActorError> {
        let mut deals_by_epoch = self.load_deal_ops(store)?;
        for (epoch, id) in new_deals_by_epoch {
            deals_by_epoch.put(epoch, *id).context("failed to set deal ops by epoch")?;
        }
        self.deal_ops_by_epoch = deals_by_epoch.flush()?;
        Ok(())
    }

    pub fn get_deals_for_epoch<BS: Blockstore>(
        &self,
        store: &BS,
        epoch: ChainEpoch,
    ) -> Result<Vec<DealID>, ActorError> {
        let mut deal_ids = Vec::new();
        self.load_deal_ops(store)?.for_each_in(&epoch, |id| {
            deal_ids.push(id);
            Ok(())
        })?;
        Ok(deal_ids)
    }

    pub fn remove_deals_by_epoch<BS: Blockstore>(
        &mut self,
        store: &BS,
        epoch: ChainEpoch,
    ) -> Result<(), ActorError> {
        let mut deals_by_epoch = self.load_deal_ops(store)?;
        deals_by_epoch.remove_all(&epoch)?;
        self.deal_ops_by_epoch = deals_by_epoch.flush()?;
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Balances
    ////////////////////////////////////////////////////////////////////////////////

    /// Credits escrow and makes sure the address has a locked entry.
    pub fn add_balance_to_escrow_table<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
        amount: &TokenAmount,
    ) -> Result<(), ActorError> {
        let mut escrow_table = BalanceTable::from_root(store, &self.escrow_table, "escrow table")?;
        escrow_table.add_create(addr, amount)?;
        self.escrow_table = escrow_table.root();

        let mut locked_table = BalanceTable::from_root(store, &self.locked_table, "locked table")?;
        if !locked_table.contains(addr)? {
            locked_table.set(addr, TokenAmount::zero())?;
            self.locked_table = locked_table.root();
        }
        Ok(())
    }

    /// Subtracts up to `amount` from escrow without touching locked funds.
    /// Returns the amount actually withdrawn.
    pub fn withdraw_balance_from_escrow_table<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
        amount: &TokenAmount,
    ) -> Result<TokenAmount, ActorError> {
        let mut escrow_table = BalanceTable::from_root(store, &self.escrow_table, "escrow table")?;
        let locked_table = BalanceTable::from_root(store, &self.locked_table, "locked table")?;

        let min_balance = locked_table.get_or_zero(addr)?;
        let ex = escrow_table.subtract_with_minimum(addr, amount, &min_balance)?;

        self.escrow_table = escrow_table.root();
        Ok(ex)
    }

    pub fn get_escrow_balance<BS: Blockstore>(
        &self,
        store: &BS,
        addr: &Address,
    ) -> Result<TokenAmount, ActorError> {
        BalanceTable::from_root(store, &self.escrow_table, "escrow table")?.get_or_zero(addr)
    }

    pub fn get_locked_balance<BS: Blockstore>(
        &self,
        store: &BS,
        addr: &Address,
    ) -> Result<TokenAmount, ActorError> {
        BalanceTable::from_root(store, &self.locked_table, "locked table")?.get_or_zero(addr)
    }

    fn maybe_lock_balance<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
        amount: &TokenAmount,
    ) -> Result<(), ActorError> {
        if amount.is_negative() {
            return Err(actor_error!(illegal_state, "cannot lock negative amount {}", amount));
        }

        let escrow_table = BalanceTable::from_root(store, &self.escrow_table, "escrow table")?;
        let mut locked_table = BalanceTable::from_root(store, &self.locked_table, "locked table")?;

        let prev_locked = locked_table.get_or_zero(addr)?;
        let escrow_balance = escrow_table.get_or_zero(addr)?;
        if &prev_locked + amount > escrow_balance {
            return Err(actor_error!(insufficient_funds;
                    "not enough balance to lock for addr {}: \
                    escrow balance {} < prev locked {} + amount {}",
                    addr, escrow_balance, prev_locked, amount));
        }

        locked_table.add_create(addr, amount)?;
        self.locked_table = locked_table.root();
        Ok(())
    }

    pub fn lock_client_and_provider_balances<BS: Blockstore>(
        &mut self,
        store: &BS,
        proposal: &DealProposal,
    ) -> Result<(), ActorError> {
        self.maybe_lock_balance(store, &proposal.client, &proposal.client_balance_requirement())
            .context("failed to lock client funds")?;
        self.maybe_lock_balance(store, &proposal.provider, proposal.provider_balance_requirement())
            .context("failed to lock provider funds")?;

        self.total_client_locked_collateral += &proposal.client_collateral;
        self.total_client_storage_fee += proposal.total_storage_fee();
        self.total_provider_locked_collateral += &proposal.provider_collateral;
        Ok(())
    }

    fn unlock_balance<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
        amount: &TokenAmount,
        lock_reason: Reason,
    ) -> Result<(), ActorError> {
        if amount.is_negative() {
            return Err(actor_error!(illegal_state, "unlock negative amount: {}", amount));
        }

        let mut locked_table = BalanceTable::from_root(store, &self.locked_table, "locked table")?;
        locked_table.must_subtract(addr, amount).context("unlocking balance")?;

        match lock_reason {
            Reason::ClientCollateral => {
                self.total_client_locked_collateral -= amount;
            }
            Reason::ClientStorageFee => {
                self.total_client_storage_fee -= amount;
            }
            Reason::ProviderCollateral => {
                self.total_provider_locked_collateral -= amount;
            }
        };

        self.locked_table = locked_table.root();
        Ok(())
    }

    /// move funds from locked in client to available in provider
    fn transfer_balance<BS: Blockstore>(
        &mut self,
        store: &BS,
        from_addr: &Address,
        to_addr: &Address,
        amount: &TokenAmount,
    ) -> Result<(), ActorError> {
        if amount.is_negative() {
            return Err(actor_error!(illegal_state, "transfer negative amount: {}", amount));
        }

        let mut escrow_table = BalanceTable::from_root(store, &self.escrow_table, "escrow table")?;

        // Subtract from locked and escrow tables
        escrow_table.must_subtract(from_addr, amount)?;
        self.unlock_balance(store, from_addr, amount, Reason::ClientStorageFee)
            .context("unlocking client balance")?;

        // Add subtracted amount to the recipient
        escrow_table.add_create(to_addr, amount)?;
        self.escrow_table = escrow_table.root();
        Ok(())
    }

    fn slash_balance<BS: Blockstore>(
        &mut self,
        store: &BS,
        addr: &Address,
        amount: &TokenAmount,
        lock_reason: Reason,
    ) -> Result<(), ActorError> {
        if amount.is_negative() {
            return Err(actor_error!(illegal_state, "negative amount to slash: {}", amount));
        }

        let mut escrow_table = BalanceTable::from_root(store, &self.escrow_table, "escrow table")?;

        // Subtract from locked and escrow tables
        escrow_table.must_subtract(addr, amount)?;
        self.escrow_table = escrow_table.root();
        self.unlock_balance(store, addr, amount, lock_reason)
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Deal state operations
    ////////////////////////////////////////////////////////////////////////////////

    /// Settles a deal as of `epoch`: pays the provider for elapsed epochs and cleans up
    /// deals that timed out, were slashed or have expired.
    pub fn update_pending_deal_state<BS: Blockstore>(
        &mut self,
        store: &BS,
        deal_id: DealID,
        deal: &DealProposal,
        epoch: ChainEpoch,
        update_interval: ChainEpoch,
    ) -> Result<DealSettlement, ActorError> {
        // the deal hasn't started yet
        if deal.start_epoch > epoch {
            return Ok(DealSettlement::NotDue);
        }

        let mut state = match self.find_deal_state(store, deal_id)? {
            Some(state) => state,
            // the provider may still activate the deal during its start epoch
            None if epoch == deal.start_epoch => return Ok(DealSettlement::NotDue),
            None => {
                let slashed = self.process_deal_init_timed_out(store, deal)?;
                self.remove_deal(store, deal_id, deal)?;
                debug!("deal {} timed out before activation, slashed {}", deal_id, slashed);
                return Ok(DealSettlement::Removed { slashed });
            }
        };

        // already settled up to this epoch, possibly ahead of cron by a withdrawal
        if state.last_updated_epoch >= epoch {
            return Ok(DealSettlement::NotDue);
        }

        // a termination stamped after the settlement epoch takes effect later
        let slashed_by_epoch = state.is_slashed() && state.slash_epoch <= epoch;
        let payment_end_epoch = if slashed_by_epoch {
            if state.slash_epoch > deal.end_epoch {
                return Err(actor_error!(
                    illegal_state,
                    "deal {} slash epoch {} after deal end {}",
                    deal_id,
                    state.slash_epoch,
                    deal.end_epoch
                ));
            }
            state.slash_epoch
        } else {
            min(deal.end_epoch, epoch)
        };
        let payment_start_epoch = max(deal.start_epoch, state.last_updated_epoch);

        let num_epochs_elapsed = max(0, payment_end_epoch - payment_start_epoch);
        let elapsed_payment = &deal.storage_price_per_epoch * num_epochs_elapsed;
        if elapsed_payment.is_positive() {
            self.transfer_balance(store, &deal.client, &deal.provider, &elapsed_payment)?;
        }

        if slashed_by_epoch {
            // unlock client collateral and locked storage fee
            let payment_remaining = deal_get_payment_remaining(deal, state.slash_epoch)?;
            self.unlock_balance(store, &deal.client, &payment_remaining, Reason::ClientStorageFee)
                .context("unlocking client storage fee")?;
            self.unlock_balance(
                store,
                &deal.client,
                &deal.client_collateral,
                Reason::ClientCollateral,
            )
            .context("unlocking client collateral")?;

            // slash provider collateral
            let slashed = deal.provider_collateral.clone();
            self.slash_balance(store, &deal.provider, &slashed, Reason::ProviderCollateral)
                .context("slashing balance")?;

            self.remove_deal(store, deal_id, deal)?;
            debug!("deal {} terminated at {}, slashed {}", deal_id, state.slash_epoch, slashed);
            return Ok(DealSettlement::Removed { slashed });
        }

        if epoch >= deal.end_epoch {
            self.process_deal_expired(store, deal, &state)?;
            self.remove_deal(store, deal_id, deal)?;
            debug!("deal {} expired at {}", deal_id, deal.end_epoch);
            return Ok(DealSettlement::Removed { slashed: TokenAmount::zero() });
        }

        state.last_updated_epoch = epoch;
        self.put_deal_state(store, deal_id, state)?;

        // We're explicitly not inspecting the end epoch and may process a deal's expiration late,
        // in order to prevent an outsider from loading a cron tick by activating too many deals
        // with the same end epoch.
        Ok(DealSettlement::Continue(epoch + update_interval))
    }

    /// Deal start deadline elapsed without appearing in a proven sector.
    /// Slash a portion of provider's collateral, and unlock remaining collaterals
    /// for both provider and client.
    pub fn process_deal_init_timed_out<BS: Blockstore>(
        &mut self,
        store: &BS,
        deal: &DealProposal,
    ) -> Result<TokenAmount, ActorError> {
        self.unlock_balance(
            store,
            &deal.client,
            &deal.total_storage_fee(),
            Reason::ClientStorageFee,
        )
        .context("unlocking client storage fee")?;

        self.unlock_balance(store, &deal.client, &deal.client_collateral, Reason::ClientCollateral)
            .context("unlocking client collateral")?;

        let amount_slashed =
            collateral_penalty_for_deal_activation_missed(deal.provider_collateral.clone());
        let amount_remaining = deal.provider_balance_requirement() - &amount_slashed;

        self.slash_balance(store, &deal.provider, &amount_slashed, Reason::ProviderCollateral)
            .context("slashing balance")?;

        self.unlock_balance(store, &deal.provider, &amount_remaining, Reason::ProviderCollateral)
            .context("unlocking deal provider balance")?;

        Ok(amount_slashed)
    }

    /// Normal expiration. Unlock collaterals for both miner and client.
    fn process_deal_expired<BS: Blockstore>(
        &mut self,
        store: &BS,
        deal: &DealProposal,
        state: &DealState,
    ) -> Result<(), ActorError> {
        if state.sector_start_epoch == EPOCH_UNDEFINED {
            return Err(actor_error!(illegal_state, "start sector epoch undefined"));
        }

        self.unlock_balance(
            store,
            &deal.provider,
            &deal.provider_collateral,
            Reason::ProviderCollateral,
        )
        .context("unlocking deal provider balance")?;

        self.unlock_balance(store, &deal.client, &deal.client_collateral, Reason::ClientCollateral)
            .context("unlocking deal client balance")?;

        Ok(())
    }
}

/// Storage fee still owed for the epochs after a termination.
pub fn deal_get_payment_remaining(
    deal: &DealProposal,
    mut slash_epoch: ChainEpoch,
) -> Result<TokenAmount, ActorError> {
    if slash_epoch > deal.end_epoch {
        return Err(actor_error!(
            illegal_state,
            "deal slash epoch {} after end epoch {}",
            slash_epoch,
            deal.end_epoch
        ));
    }

    // Payments are always for start -> end epoch irrespective of when the deal is slashed.
    slash_epoch = max(slash_epoch, deal.start_epoch);

    let duration_remaining = deal.end_epoch - slash_epoch;
    if duration_remaining < 0 {
        return Err(actor_error!(
            illegal_state,
            "deal remaining duration negative: {}",
            duration_remaining
        ));
    }

    Ok(&deal.storage_price_per_epoch * duration_remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_actors_runtime::test_blockstores::MemoryBlockstore;
    use fc_actors_runtime::test_utils::make_piece_cid;
    use fvm_shared::piece::PaddedPieceSize;

    const CLIENT: Address = Address::new_id(101);
    const PROVIDER: Address = Address::new_id(102);
    const INTERVAL: ChainEpoch = 100;

    fn proposal(start_epoch: ChainEpoch, end_epoch: ChainEpoch) -> DealProposal {
        DealProposal {
            piece_cid: make_piece_cid(b"piece"),
            piece_size: PaddedPieceSize(2048),
            verified_deal: false,
            client: CLIENT,
            provider: PROVIDER,
            label: "label".to_string(),
            start_epoch,
            end_epoch,
            storage_price_per_epoch: TokenAmount::from_atto(10),
            provider_collateral: TokenAmount::from_atto(500),
            client_collateral: TokenAmount::from_atto(300),
        }
    }

    /// Funds both parties, publishes the deal and returns its id.
    fn publish(st: &mut State, store: &MemoryBlockstore, deal: &DealProposal) -> DealID {
        st.add_balance_to_escrow_table(store, &CLIENT, &deal.client_balance_requirement())
            .unwrap();
        st.add_balance_to_escrow_table(store, &PROVIDER, &deal.provider_collateral).unwrap();
        st.lock_client_and_provider_balances(store, deal).unwrap();
        let id = st.generate_storage_deal_id();
        st.put_deal_proposal(store, id, deal, deal.cid().unwrap()).unwrap();
        id
    }

    #[test]
    fn settlement_is_idempotent_within_an_epoch() {
        let store = MemoryBlockstore::new();
        let mut st = State::new(&store).unwrap();
        let deal = proposal(10, 1000);
        let id = publish(&mut st, &store, &deal);
        st.put_deal_state(&store, id, DealState::activated_at(5)).unwrap();

        let first = st.update_pending_deal_state(&store, id, &deal, 50, INTERVAL).unwrap();
        assert_eq!(DealSettlement::Continue(150), first);
        let after_first = st.clone();
        // collateral of 500 plus 40 epochs at 10
        assert_eq!(TokenAmount::from_atto(900), st.get_escrow_balance(&store, &PROVIDER).unwrap());

        let second = st.update_pending_deal_state(&store, id, &deal, 50, INTERVAL).unwrap();
        assert_eq!(DealSettlement::NotDue, second);
        assert_eq!(after_first, st);
    }

    #[test]
    fn unactivated_deal_times_out_after_start() {
        let store = MemoryBlockstore::new();
        let mut st = State::new(&store).unwrap();
        let deal = proposal(10, 1000);
        let id = publish(&mut st, &store, &deal);

        assert_eq!(
            DealSettlement::NotDue,
            st.update_pending_deal_state(&store, id, &deal, 10, INTERVAL).unwrap()
        );
        let res = st.update_pending_deal_state(&store, id, &deal, 11, INTERVAL).unwrap();
        assert_eq!(DealSettlement::Removed { slashed: deal.provider_collateral.clone() }, res);

        assert!(st.find_proposal(&store, id).unwrap().is_none());
        assert!(st.deals_for_party(&store, &CLIENT).unwrap().is_empty());
        assert!(!st.has_pending_proposal(&store, &deal.cid().unwrap()).unwrap());
        assert_eq!(TokenAmount::zero(), st.get_locked_balance(&store, &CLIENT).unwrap());
        assert_eq!(TokenAmount::zero(), st.get_locked_balance(&store, &PROVIDER).unwrap());
        assert_eq!(TokenAmount::zero(), st.get_escrow_balance(&store, &PROVIDER).unwrap());
        assert_eq!(TokenAmount::zero(), st.total_locked());
    }

    #[test]
    fn provider_without_escrow_entry_times_out_cleanly() {
        let store = MemoryBlockstore::new();
        let mut st = State::new(&store).unwrap();
        let mut deal = proposal(10, 1000);
        deal.provider_collateral = TokenAmount::zero();
        st.add_balance_to_escrow_table(&store, &CLIENT, &deal.client_balance_requirement())
            .unwrap();
        st.lock_client_and_provider_balances(&store, &deal).unwrap();
        let id = st.generate_storage_deal_id();
        st.put_deal_proposal(&store, id, &deal, deal.cid().unwrap()).unwrap();

        let res = st.update_pending_deal_state(&store, id, &deal, 11, INTERVAL).unwrap();
        assert_eq!(DealSettlement::Removed { slashed: TokenAmount::zero() }, res);
        assert!(st.find_proposal(&store, id).unwrap().is_none());
        assert_eq!(TokenAmount::zero(), st.get_escrow_balance(&store, &PROVIDER).unwrap());
        assert_eq!(
            deal.client_balance_requirement(),
            st.get_escrow_balance(&store, &CLIENT).unwrap()
        );
        assert_eq!(TokenAmount::zero(), st.total_locked());
    }

    #[test]
    fn slashed_deal_pays_until_termination() {
        let store = MemoryBlockstore::new();
        let mut st = State::new(&store).unwrap();
        let deal = proposal(10, 1000);
        let id = publish(&mut st, &store, &deal);
        let mut state = DealState::activated_at(5);
        state.slash_epoch = 60;
        st.put_deal_state(&store, id, state).unwrap();

        let res = st.update_pending_deal_state(&store, id, &deal, 70, INTERVAL).unwrap();
        assert_eq!(DealSettlement::Removed { slashed: deal.provider_collateral.clone() }, res);

        // 50 epochs at 10 each, the rest of the fee and the collateral go back to the client
        assert_eq!(TokenAmount::from_atto(500), st.get_escrow_balance(&store, &PROVIDER).unwrap());
        let client_escrow = deal.client_balance_requirement() - TokenAmount::from_atto(500);
        assert_eq!(client_escrow, st.get_escrow_balance(&store, &CLIENT).unwrap());
        assert_eq!(TokenAmount::zero(), st.get_locked_balance(&store, &CLIENT).unwrap());
        assert_eq!(TokenAmount::zero(), st.total_locked());
    }

    #[test]
    fn expired_deal_unlocks_collateral() {
        let store = MemoryBlockstore::new();
        let mut st = State::new(&store).unwrap();
        let deal = proposal(10, 210);
        let id = publish(&mut st, &store, &deal);
        st.put_deal_state(&store, id, DealState::activated_at(5)).unwrap();

        let res = st.update_pending_deal_state(&store, id, &deal, 500, INTERVAL).unwrap();
        assert_eq!(DealSettlement::Removed { slashed: TokenAmount::zero() }, res);
        assert_eq!(
            &deal.provider_collateral + deal.total_storage_fee(),
            st.get_escrow_balance(&store, &PROVIDER).unwrap()
        );
        assert_eq!(deal.client_collateral, st.get_escrow_balance(&store, &CLIENT).unwrap());
        assert_eq!(TokenAmount::zero(), st.total_locked());
    }

    #[test]
    fn lock_requires_escrow() {
        let store = MemoryBlockstore::new();
        let mut st = State::new(&store).unwrap();
        let deal = proposal(10, 1000);
        st.add_balance_to_escrow_table(&store, &CLIENT, &TokenAmount::from_atto(1)).unwrap();
        let err = st.lock_client_and_provider_balances(&store, &deal).unwrap_err();
        assert_eq!(fvm_shared::error::ExitCode::USR_INSUFFICIENT_FUNDS, err.exit_code());
    }
}
