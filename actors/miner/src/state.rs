// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cmp;
use std::collections::BTreeMap;

use cid::Cid;
use fc_actors_runtime::runtime::Policy;
use fc_actors_runtime::{
    actor_error, ActorContext, ActorError, AsActorError, Config, Map, DEFAULT_HAMT_CONFIG,
};
use fvm_ipld_bitfield::BitField;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::{strict_bytes, BytesDe, CborStore};
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::sector::{RegisteredPoStProof, RegisteredSealProof, SectorNumber, SectorSize};
use multihash::Code;
use num_traits::Zero;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    Deadline, Deadlines, PowerPair, SectorOnChainInfo, SectorPreCommitOnChainInfo, Sectors,
    VestSpec, VestingFunds, SECTORS_CONFIG,
};

pub const PRECOMMIT_CONFIG: Config = DEFAULT_HAMT_CONFIG;

pub type PreCommitMap<BS> = Map<BS, SectorNumber, SectorPreCommitOnChainInfo>;

/// Static information about a miner.
#[derive(Debug, PartialEq, Eq, Clone, Serialize_tuple, Deserialize_tuple)]
pub struct MinerInfo {
    /// Account that owns this miner. Income and returned collateral are paid to this address.
    pub owner: Address,
    /// Worker account for this miner. Signs blocks and commitments.
    pub worker: Address,
    /// Additional addresses permitted to submit messages on the worker's behalf.
    pub control_addresses: Vec<Address>,
    /// Libp2p identity that should be used when connecting to this miner
    #[serde(with = "strict_bytes")]
    pub peer_id: Vec<u8>,
    /// Vector of byte arrays representing Libp2p multi-addresses used for establishing a connection with this miner.
    pub multi_address: Vec<BytesDe>,
    /// The proof type used for Window PoSt for this miner.
    pub window_post_proof_type: RegisteredPoStProof,
    /// The proof type used for sealing sectors.
    pub seal_proof_type: RegisteredSealProof,
    /// Amount of space in each sector committed to the network by this miner.
    pub sector_size: SectorSize,
    /// The number of sectors in each Window PoSt partition (proof).
    pub window_post_partition_sectors: u64,
}

impl MinerInfo {
    pub fn new(
        owner: Address,
        worker: Address,
        control_addresses: Vec<Address>,
        peer_id: Vec<u8>,
        multi_address: Vec<BytesDe>,
        seal_proof_type: RegisteredSealProof,
    ) -> Result<Self, ActorError> {
        let sector_size = seal_proof_type
            .sector_size()
            .map_err(|e| actor_error!(illegal_argument; "invalid sector size: {}", e))?;
        let window_post_proof_type = seal_proof_type
            .registered_window_post_proof()
            .map_err(|e| actor_error!(illegal_argument; "invalid window post proof: {}", e))?;
        let window_post_partition_sectors = seal_proof_type
            .window_post_partitions_sector()
            .map_err(|e| actor_error!(illegal_argument; "invalid partition sectors: {}", e))?;

        Ok(Self {
            owner,
            worker,
            control_addresses,
            peer_id,
            multi_address,
            window_post_proof_type,
            seal_proof_type,
            sector_size,
            window_post_partition_sectors,
        })
    }
}

/// Balance of a miner actor should be greater than or equal to
/// the sum of PreCommitDeposits and LockedFunds.
/// It is possible for balance to fall below the sum of PCD, LF and
/// InitialPledgeRequirements, and this is a bad state (IP Debt)
/// that limits a miner actor's behavior (i.e. no balance withdrawals)
/// Excess balance as computed by st.GetAvailableBalance will be
/// withdrawable or usable for pre-commit deposit or pledge lock-up.
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct State {
    /// Contains static info about this miner
    pub info: Cid,

    /// Total funds locked as pre_commit_deposit
    pub pre_commit_deposits: TokenAmount,

    /// Total rewards and added funds locked in vesting table
    pub locked_funds: TokenAmount,

    /// VestingFunds (Vesting Funds schedule for the miner).
    pub vesting_funds: Cid,

    /// Absolute value of debt this miner owes from unpaid fees.
    pub fee_debt: TokenAmount,

    /// Sum of initial pledge requirements of all active sectors.
    pub initial_pledge: TokenAmount,

    /// Sectors that have been pre-committed but not yet proven.
    /// Map, HAMT<SectorNumber, SectorPreCommitOnChainInfo>
    pub pre_committed_sectors: Cid,

    /// Allocated sector IDs. Sector IDs can never be reused once allocated.
    pub allocated_sectors: Cid, // BitField

    /// Information for all proven and not-yet-garbage-collected sectors.
    /// Map, HAMT<SectorNumber, SectorOnChainInfo>
    pub sectors: Cid,

    /// The first epoch in this miner's current proving period. Deadlines are computed from it
    /// on demand, so it never advances.
    pub proving_period_start: ChainEpoch,

    /// Roots of the deadlines of the proving period.
    pub deadlines: Cid,
}

fn put<BS: Blockstore, T: Serialize>(store: &BS, obj: &T, what: &str) -> Result<Cid, ActorError> {
    store
        .put_cbor(obj, Code::Blake2b256)
        .with_context_code(ExitCode::USR_ILLEGAL_STATE, || format!("failed to store {}", what))
}

fn get<BS: Blockstore, T: DeserializeOwned>(
    store: &BS,
    root: &Cid,
    what: &str,
) -> Result<T, ActorError> {
    store
        .get_cbor(root)
        .with_context_code(ExitCode::USR_ILLEGAL_STATE, || format!("failed to load {}", what))?
        .with_context_code(ExitCode::USR_ILLEGAL_STATE, || format!("{} not found", what))
}

impl State {
    pub fn new<BS: Blockstore>(
        policy: &Policy,
        store: &BS,
        info: &MinerInfo,
        period_start: ChainEpoch,
    ) -> Result<Self, ActorError> {
        let empty_precommits = PreCommitMap::flush_empty(store, PRECOMMIT_CONFIG)
            .context("failed to construct empty precommit map")?;
        let empty_sectors = Map::<_, SectorNumber, SectorOnChainInfo>::flush_empty(
            store,
            SECTORS_CONFIG,
        )
        .context("failed to construct empty sectors map")?;
        let empty_bitfield = put(store, &BitField::new(), "empty bitfield")?;
        let empty_deadline = put(store, &Deadline::new(store)?, "empty deadline")?;
        let empty_deadlines =
            put(store, &Deadlines::new(policy, empty_deadline), "empty deadlines")?;
        let empty_vesting = put(store, &VestingFunds::new(), "empty vesting funds")?;

        Ok(Self {
            info: put(store, info, "miner info")?,
            pre_commit_deposits: TokenAmount::zero(),
            locked_funds: TokenAmount::zero(),
            vesting_funds: empty_vesting,
            fee_debt: TokenAmount::zero(),
            initial_pledge: TokenAmount::zero(),
            pre_committed_sectors: empty_precommits,
            allocated_sectors: empty_bitfield,
            sectors: empty_sectors,
            proving_period_start: period_start,
            deadlines: empty_deadlines,
        })
    }

    pub fn get_info<BS: Blockstore>(&self, store: &BS) -> Result<MinerInfo, ActorError> {
        get(store, &self.info, "miner info")
    }

    pub fn save_info<BS: Blockstore>(
        &mut self,
        store: &BS,
        info: &MinerInfo,
    ) -> Result<(), ActorError> {
        self.info = put(store, info, "miner info")?;
        Ok(())
    }

    /// Marks a sector number as allocated, failing if it already was.
    pub fn allocate_sector_number<BS: Blockstore>(
        &mut self,
        store: &BS,
        sector_number: SectorNumber,
    ) -> Result<(), ActorError> {
        let mut allocated: BitField = get(store, &self.allocated_sectors, "allocated sectors")?;
        if allocated.get(sector_number) {
            return Err(actor_error!(
                illegal_argument;
                "sector number {} has already been allocated", sector_number
            ));
        }
        allocated.set(sector_number);
        self.allocated_sectors = put(store, &allocated, "allocated sectors")?;
        Ok(())
    }

    pub fn load_precommits<BS: Blockstore>(
        &self,
        store: BS,
    ) -> Result<PreCommitMap<BS>, ActorError> {
        PreCommitMap::load(store, &self.pre_committed_sectors, PRECOMMIT_CONFIG, "precommits")
    }

    pub fn put_precommitted_sector<BS: Blockstore>(
        &mut self,
        store: &BS,
        info: SectorPreCommitOnChainInfo,
    ) -> Result<(), ActorError> {
        let mut precommits = self.load_precommits(store)?;
        let number = info.info.sector_number;
        if !precommits.set_if_absent(&number, info)? {
            return Err(actor_error!(illegal_argument; "sector {} already pre-committed", number));
        }
        self.pre_committed_sectors = precommits.flush()?;
        Ok(())
    }

    pub fn get_precommitted_sector<BS: Blockstore>(
        &self,
        store: &BS,
        sector_number: SectorNumber,
    ) -> Result<Option<SectorPreCommitOnChainInfo>, ActorError> {
        Ok(self.load_precommits(store)?.try_get(&sector_number)?.cloned())
    }

    pub fn delete_precommitted_sectors<BS: Blockstore>(
        &mut self,
        store: &BS,
        sector_numbers: &[SectorNumber],
    ) -> Result<(), ActorError> {
        let mut precommits = self.load_precommits(store)?;
        for number in sector_numbers {
            precommits.remove(number)?;
        }
        self.pre_committed_sectors = precommits.flush()?;
        Ok(())
    }

    pub fn load_sectors<BS: Blockstore>(&self, store: BS) -> Result<Sectors<BS>, ActorError> {
        Sectors::load(store, &self.sectors)
    }

    pub fn get_sector<BS: Blockstore>(
        &self,
        store: &BS,
        sector_number: SectorNumber,
    ) -> Result<Option<SectorOnChainInfo>, ActorError> {
        self.load_sectors(store)?.get(sector_number)
    }

    pub fn load_deadlines<BS: Blockstore>(&self, store: &BS) -> Result<Deadlines, ActorError> {
        get(store, &self.deadlines, "deadlines")
    }

    pub fn save_deadlines<BS: Blockstore>(
        &mut self,
        store: &BS,
        deadlines: &Deadlines,
    ) -> Result<(), ActorError> {
        self.deadlines = put(store, deadlines, "deadlines")?;
        Ok(())
    }

    /// Assigns each sector to the deadline with the fewest live sectors (lowest index on ties)
    /// and stores them. Returns the power of the new sectors.
    pub fn assign_sectors_to_deadlines<BS: Blockstore>(
        &mut self,
        store: &BS,
        partition_size: u64,
        sector_size: SectorSize,
        mut sectors: Vec<SectorOnChainInfo>,
    ) -> Result<PowerPair, ActorError> {
        let mut deadlines = self.load_deadlines(store)?;
        let mut loaded = Vec::with_capacity(deadlines.due.len());
        deadlines.for_each(store, |_, dl| {
            loaded.push(dl);
            Ok(())
        })?;

        sectors.sort_by_key(|s| s.sector_number);
        let mut load: Vec<u64> = loaded.iter().map(|dl| dl.live_sectors).collect();
        let mut by_deadline: BTreeMap<usize, Vec<SectorOnChainInfo>> = BTreeMap::new();
        for sector in sectors {
            let idx = load
                .iter()
                .enumerate()
                .min_by_key(|(i, count)| (**count, *i))
                .map(|(i, _)| i)
                .context_code(ExitCode::USR_ILLEGAL_STATE, "miner has no deadlines")?;
            load[idx] += 1;
            by_deadline.entry(idx).or_default().push(sector);
        }

        let mut new_power = PowerPair::zero();
        for (idx, dl_sectors) in by_deadline {
            let deadline = &mut loaded[idx];
            let (power, _) =
                deadline.add_sectors(store, partition_size, sector_size, &dl_sectors)?;
            new_power += &power;
            deadlines.update_deadline(store, idx as u64, deadline)?;
        }
        self.save_deadlines(store, &deadlines)?;
        Ok(new_power)
    }

    /// Locates the deadline and partition holding a sector.
    pub fn find_sector<BS: Blockstore>(
        &self,
        store: &BS,
        sector_number: SectorNumber,
    ) -> Result<(u64, u64), ActorError> {
        let deadlines = self.load_deadlines(store)?;
        for dl_idx in 0..deadlines.due.len() as u64 {
            let deadline = deadlines.load_deadline(store, dl_idx)?;
            let partitions = deadline.load_partitions(store)?;
            let mut found = None;
            partitions.for_each(|part_idx, partition| {
                if found.is_none() && partition.sectors.get(sector_number) {
                    found = Some(part_idx);
                }
                Ok(())
            })?;
            if let Some(part_idx) = found {
                return Ok((dl_idx, part_idx));
            }
        }
        Err(actor_error!(not_found; "sector {} not due at any deadline", sector_number))
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Funds
    ////////////////////////////////////////////////////////////////////////////////

    pub fn add_pre_commit_deposit(&mut self, amount: &TokenAmount) -> Result<(), ActorError> {
        let new_total = &self.pre_commit_deposits + amount;
        if new_total.is_negative() {
            return Err(actor_error!(
                illegal_state;
                "negative pre-commit deposit {} after adding {}", new_total, amount
            ));
        }
        self.pre_commit_deposits = new_total;
        Ok(())
    }

    pub fn add_initial_pledge(&mut self, amount: &TokenAmount) -> Result<(), ActorError> {
        let new_total = &self.initial_pledge + amount;
        if new_total.is_negative() {
            return Err(actor_error!(
                illegal_state;
                "negative initial pledge requirement {} after adding {}", new_total, amount
            ));
        }
        self.initial_pledge = new_total;
        Ok(())
    }

    pub fn load_vesting_funds<BS: Blockstore>(
        &self,
        store: &BS,
    ) -> Result<VestingFunds, ActorError> {
        get(store, &self.vesting_funds, "vesting funds")
    }

    pub fn save_vesting_funds<BS: Blockstore>(
        &mut self,
        store: &BS,
        funds: &VestingFunds,
    ) -> Result<(), ActorError> {
        self.vesting_funds = put(store, funds, "vesting funds")?;
        Ok(())
    }

    /// Adds funds to the vesting table and returns the amount that had already vested.
    pub fn add_locked_funds<BS: Blockstore>(
        &mut self,
        store: &BS,
        current_epoch: ChainEpoch,
        vesting_sum: &TokenAmount,
        spec: &VestSpec,
    ) -> Result<TokenAmount, ActorError> {
        if vesting_sum.is_negative() {
            return Err(actor_error!(illegal_state; "negative amount to lock {}", vesting_sum));
        }
        let mut vesting_funds = self.load_vesting_funds(store)?;

        let amount_unlocked = vesting_funds.unlock_vested_funds(current_epoch);
        self.locked_funds -= &amount_unlocked;
        if self.locked_funds.is_negative() {
            return Err(actor_error!(
                illegal_state;
                "negative locked funds {} after unlocking {}", self.locked_funds, amount_unlocked
            ));
        }

        vesting_funds.add_locked_funds(
            current_epoch,
            vesting_sum,
            self.proving_period_start,
            spec,
        );
        self.locked_funds += vesting_sum;
        self.save_vesting_funds(store, &vesting_funds)?;
        Ok(amount_unlocked)
    }

    /// Unlocks all vesting funds that have vested before the provided epoch.
    pub fn unlock_vested_funds<BS: Blockstore>(
        &mut self,
        store: &BS,
        current_epoch: ChainEpoch,
    ) -> Result<TokenAmount, ActorError> {
        let mut vesting_funds = self.load_vesting_funds(store)?;
        let amount_unlocked = vesting_funds.unlock_vested_funds(current_epoch);
        self.locked_funds -= &amount_unlocked;
        if self.locked_funds.is_negative() {
            return Err(actor_error!(
                illegal_state;
                "vesting cause locked funds to become negative: {}", self.locked_funds
            ));
        }
        self.save_vesting_funds(store, &vesting_funds)?;
        Ok(amount_unlocked)
    }

    /// Unlocks an amount of funds that have *not yet vested*, if possible.
    /// The soonest-vesting entries are unlocked first.
    /// Returns the amount actually unlocked.
    pub fn unlock_unvested_funds<BS: Blockstore>(
        &mut self,
        store: &BS,
        current_epoch: ChainEpoch,
        target: &TokenAmount,
    ) -> Result<TokenAmount, ActorError> {
        if target.is_zero() || self.locked_funds.is_zero() {
            return Ok(TokenAmount::zero());
        }
        let mut vesting_funds = self.load_vesting_funds(store)?;
        let amount_unlocked = vesting_funds.unlock_unvested_funds(current_epoch, target);
        self.locked_funds -= &amount_unlocked;
        if self.locked_funds.is_negative() {
            return Err(actor_error!(
                illegal_state;
                "unlocked more funds than were locked: {}", self.locked_funds
            ));
        }
        self.save_vesting_funds(store, &vesting_funds)?;
        Ok(amount_unlocked)
    }

    /// Balance not committed to deposits, pledge or vesting.
    pub fn get_unlocked_balance(
        &self,
        actor_balance: &TokenAmount,
    ) -> Result<TokenAmount, ActorError> {
        let unlocked_balance =
            actor_balance - &self.locked_funds - &self.pre_commit_deposits - &self.initial_pledge;
        if unlocked_balance.is_negative() {
            return Err(actor_error!(illegal_state; "negative unlocked balance {}", unlocked_balance));
        }
        Ok(unlocked_balance)
    }

    /// Unlocked balance less fee debt. May be negative.
    pub fn get_available_balance(
        &self,
        actor_balance: &TokenAmount,
    ) -> Result<TokenAmount, ActorError> {
        Ok(self.get_unlocked_balance(actor_balance)? - &self.fee_debt)
    }

    pub fn apply_penalty(&mut self, penalty: &TokenAmount) -> Result<(), ActorError> {
        if penalty.is_negative() {
            return Err(actor_error!(illegal_state; "applying negative penalty {}", penalty));
        }
        self.fee_debt += penalty;
        Ok(())
    }

    /// Draws down the fee debt, first from unvested funds and then from the unlocked balance.
    /// Returns the amounts taken from each, which the caller must burn.
    pub fn repay_partial_debt_in_priority_order<BS: Blockstore>(
        &mut self,
        store: &BS,
        current_epoch: ChainEpoch,
        curr_balance: &TokenAmount,
    ) -> Result<(TokenAmount, TokenAmount), ActorError> {
        let fee_debt = self.fee_debt.clone();
        let from_vesting = self.unlock_unvested_funds(store, current_epoch, &fee_debt)?;
        if from_vesting > self.fee_debt {
            return Err(actor_error!(illegal_state; "unlocked more vesting funds than required for debt"));
        }
        self.fee_debt -= &from_vesting;

        let unlocked_balance = self.get_unlocked_balance(curr_balance)?;
        let from_balance = cmp::min(&unlocked_balance, &self.fee_debt).clone();
        self.fee_debt -= &from_balance;

        Ok((from_vesting, from_balance))
    }

    /// Repays the whole fee debt from the unlocked balance, failing if it is not covered.
    pub fn repay_debts(&mut self, curr_balance: &TokenAmount) -> Result<TokenAmount, ActorError> {
        let unlocked_balance = self.get_unlocked_balance(curr_balance)?;
        if unlocked_balance < self.fee_debt {
            return Err(actor_error!(
                insufficient_funds;
                "unlocked balance {} can not repay fee debt ({})", unlocked_balance, self.fee_debt
            ));
        }
        Ok(std::mem::take(&mut self.fee_debt))
    }

    pub fn check_balance_invariants(&self, balance: &TokenAmount) -> Result<(), ActorError> {
        if self.pre_commit_deposits.is_negative() {
            return Err(actor_error!(illegal_state; "pre-commit deposit is negative: {}", self.pre_commit_deposits));
        }
        if self.locked_funds.is_negative() {
            return Err(actor_error!(illegal_state; "locked funds is negative: {}", self.locked_funds));
        }
        if self.initial_pledge.is_negative() {
            return Err(actor_error!(illegal_state; "initial pledge is negative: {}", self.initial_pledge));
        }
        if self.fee_debt.is_negative() {
            return Err(actor_error!(illegal_state; "fee debt is negative: {}", self.fee_debt));
        }
        let min_balance = &self.pre_commit_deposits + &self.locked_funds + &self.initial_pledge;
        if balance < &min_balance {
            return Err(actor_error!(illegal_state; "balance {} below required {}", balance, min_balance));
        }
        Ok(())
    }
}
