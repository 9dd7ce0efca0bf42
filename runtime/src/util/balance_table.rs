// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;

use crate::{actor_error, ActorError, Map, BALANCE_TABLE_HAMT_CONFIG};

/// Balance table which handles getting and updating token balances specifically.
/// Every mutation is flushed immediately and the resulting root is available from [`Self::root`].
pub struct BalanceTable<BS: Blockstore> {
    map: Map<BS, Address, TokenAmount>,
    root: Cid,
}

impl<BS> BalanceTable<BS>
where
    BS: Blockstore,
{
    /// Initializes a new empty balance table and writes it to the store.
    pub fn new(bs: BS, name: &'static str) -> Result<Self, ActorError> {
        let mut map = Map::empty(bs, BALANCE_TABLE_HAMT_CONFIG, name);
        let root = map.flush()?;
        Ok(Self { map, root })
    }

    /// Initializes a balance table from a root Cid
    pub fn from_root(bs: BS, cid: &Cid, name: &'static str) -> Result<Self, ActorError> {
        Ok(Self { map: Map::load(bs, cid, BALANCE_TABLE_HAMT_CONFIG, name)?, root: *cid })
    }

    /// Root of the table as of the last mutation.
    pub fn root(&self) -> Cid {
        self.root
    }

    /// Gets the balance for an address, failing with `USR_NOT_FOUND` if it has no entry.
    pub fn get(&self, key: &Address) -> Result<TokenAmount, ActorError> {
        self.map.get(key).cloned()
    }

    /// Gets the balance for an address, if it has an entry.
    pub fn try_get(&self, key: &Address) -> Result<Option<TokenAmount>, ActorError> {
        Ok(self.map.try_get(key)?.cloned())
    }

    /// Gets the balance for an address, treating a missing entry as zero.
    pub fn get_or_zero(&self, key: &Address) -> Result<TokenAmount, ActorError> {
        Ok(self.try_get(key)?.unwrap_or_default())
    }

    pub fn contains(&self, key: &Address) -> Result<bool, ActorError> {
        self.map.contains_key(key)
    }

    /// Overwrites the balance for an address and returns the new root.
    pub fn set(&mut self, key: &Address, value: TokenAmount) -> Result<Cid, ActorError> {
        if value.is_negative() {
            return Err(actor_error!(
                illegal_state,
                "balance for {} cannot be set negative: {}",
                key,
                value
            ));
        }
        self.map.set(key, value)?;
        self.root = self.map.flush()?;
        Ok(self.root)
    }

    /// Adds token amount to a previously initialized entry.
    pub fn add(&mut self, key: &Address, value: &TokenAmount) -> Result<(), ActorError> {
        let prev = self.get(key)?;
        self.write_sum(key, prev, value)
    }

    /// Adds token amount to an entry, creating it at zero first if needed.
    pub fn add_create(&mut self, key: &Address, value: &TokenAmount) -> Result<(), ActorError> {
        let prev = self.get_or_zero(key)?;
        self.write_sum(key, prev, value)
    }

    fn write_sum(
        &mut self,
        key: &Address,
        prev: TokenAmount,
        value: &TokenAmount,
    ) -> Result<(), ActorError> {
        let sum = &prev + value;
        if sum.is_negative() {
            return Err(actor_error!(
                illegal_state,
                "new balance in table cannot be negative: {}",
                sum
            ));
        }
        self.set(key, sum)?;
        Ok(())
    }

    /// Subtracts up to the specified amount from a balance, without reducing the balance
    /// below some minimum.
    /// Returns the amount subtracted (always positive or zero).
    pub fn subtract_with_minimum(
        &mut self,
        key: &Address,
        req: &TokenAmount,
        floor: &TokenAmount,
    ) -> Result<TokenAmount, ActorError> {
        let prev = self.get(key)?;
        let available = std::cmp::max(TokenAmount::zero(), &prev - floor);
        let sub: TokenAmount = std::cmp::min(&available, req).clone();

        if sub.is_positive() {
            self.set(key, prev - &sub)?;
        }

        Ok(sub)
    }

    /// Subtracts value from a balance, and errors if full amount was not subtracted.
    /// A missing entry holds zero, so subtracting zero from it is a no-op.
    pub fn must_subtract(&mut self, key: &Address, req: &TokenAmount) -> Result<(), ActorError> {
        if req.is_zero() {
            return Ok(());
        }
        let prev = self.get_or_zero(key)?;

        if req > &prev {
            return Err(actor_error!(
                illegal_state,
                "couldn't subtract {} from balance {} of {}",
                req,
                prev,
                key
            ));
        }
        self.set(key, prev - req)?;

        Ok(())
    }

    /// Removes an entry, returning its final balance.
    pub fn remove(&mut self, key: &Address) -> Result<TokenAmount, ActorError> {
        let old = self.map.remove(key)?;
        self.root = self.map.flush()?;
        Ok(old)
    }

    /// Returns total balance held by this balance table
    pub fn total(&self) -> Result<TokenAmount, ActorError> {
        let mut total = TokenAmount::zero();
        self.map.for_each(|_, v| {
            total += v;
            Ok(())
        })?;
        Ok(total)
    }
}
