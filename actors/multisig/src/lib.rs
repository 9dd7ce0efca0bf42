// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeSet;

use fc_actors_runtime::runtime::{ActorCode, Primitives, Runtime, Type};
use fc_actors_runtime::{
    actor_dispatch, actor_error, resolve_to_actor_id, ActorContext, ActorError, AsActorError,
    INIT_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::{RawBytes, DAG_CBOR};
use fvm_shared::address::Address;
use fvm_shared::error::ExitCode;
use fvm_shared::METHOD_CONSTRUCTOR;
use num_derive::FromPrimitive;

pub use self::state::*;
pub use self::types::*;

mod state;
pub mod testing;
mod types;

/// Multisig actor methods available
#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    Propose = 2,
    Approve = 3,
    Cancel = 4,
    AddSigner = 5,
    RemoveSigner = 6,
    SwapSigner = 7,
    ChangeNumApprovalsThreshold = 8,
    LockBalance = 9,
}

/// Callers allowed to propose, approve and cancel.
const SIGNABLE_TYPES: &[Type] = &[Type::Account, Type::Multisig];

/// Multisig Actor
pub struct Actor;

impl Actor {
    /// Constructor for Multisig actor
    pub fn constructor(rt: &impl Runtime, params: ConstructorParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&INIT_ACTOR_ADDR))?;

        if params.signers.is_empty() {
            return Err(actor_error!(illegal_argument; "must have at least one signer"));
        }
        let max_signers = rt.policy().max_multisig_signers;
        if params.signers.len() > max_signers {
            return Err(actor_error!(
                illegal_argument,
                "cannot add more than {} signers",
                max_signers
            ));
        }

        // Resolve signer addresses and do not allow duplicate signers.
        let mut resolved_signers = Vec::with_capacity(params.signers.len());
        let mut dedup_signers = BTreeSet::new();
        for signer in &params.signers {
            let resolved = resolve_to_actor_id(rt, signer)?;
            if !dedup_signers.insert(resolved) {
                return Err(
                    actor_error!(illegal_argument; "duplicate signer not allowed: {}", signer),
                );
            }
            resolved_signers.push(Address::new_id(resolved));
        }

        if params.num_approvals_threshold > resolved_signers.len() as u64 {
            return Err(
                actor_error!(illegal_argument; "must not require more approvals than signers"),
            );
        }
        if params.num_approvals_threshold < 1 {
            return Err(actor_error!(illegal_argument; "must require at least one approval"));
        }
        if params.unlock_duration < 0 {
            return Err(actor_error!(illegal_argument; "negative unlock duration disallowed"));
        }

        let mut st = State::new(rt.store(), resolved_signers, params.num_approvals_threshold)
            .context("failed to construct multisig state")?;
        if params.unlock_duration != 0 {
            st.set_locked(
                params.start_epoch,
                params.unlock_duration,
                rt.message().value_received(),
            );
        }
        rt.create(&st)?;
        Ok(())
    }

    /// Proposes a transaction and approves it on behalf of the proposer.
    pub fn propose(rt: &impl Runtime, params: ProposeParams) -> Result<ProposeReturn, ActorError> {
        rt.validate_immediate_caller_type(SIGNABLE_TYPES)?;
        let proposer: Address = rt.message().caller();

        if params.value.is_negative() {
            return Err(actor_error!(
                illegal_argument,
                "proposed value must be non-negative, was {}",
                params.value
            ));
        }

        let (txn_id, txn) = rt.transaction(|st: &mut State, rt| {
            if !st.is_signer(&proposer) {
                return Err(actor_error!(forbidden, "{} is not a signer", proposer));
            }

            let mut ptx = st.load_pending_txs(rt.store())?;
            let t_id = st.next_tx_id;
            st.next_tx_id.0 += 1;

            let txn = Transaction {
                to: params.to,
                value: params.value,
                method: params.method,
                params: params.params,
                approved: Vec::new(),
            };
            ptx.set(&t_id, txn.clone()).context("failed to put transaction for propose")?;
            st.pending_txs = ptx.flush()?;
            Ok((t_id, txn))
        })?;
        log::debug!("{} proposed transaction {} to {}", proposer, txn_id, txn.to);

        let (applied, ret, code) = Self::approve_transaction(rt, txn_id, txn)?;
        Ok(ProposeReturn { txn_id, applied, code, ret })
    }

    /// Adds the caller's approval to a pending transaction, executing it at the threshold.
    pub fn approve(rt: &impl Runtime, params: TxnIDParams) -> Result<ApproveReturn, ActorError> {
        rt.validate_immediate_caller_type(SIGNABLE_TYPES)?;
        let approver: Address = rt.message().caller();

        let id = params.id;
        let (st, txn) = rt.transaction(|st: &mut State, rt| {
            if !st.is_signer(&approver) {
                return Err(actor_error!(forbidden; "{} is not a signer", approver));
            }
            let ptx = st.load_pending_txs(rt.store())?;
            let txn = get_transaction(rt, &ptx, id, &params.proposal_hash)?.clone();
            Ok((st.clone(), txn))
        })?;

        // The threshold may have been lowered since the last approval.
        let (applied, ret, code) = execute_transaction_if_approved(rt, &st, id, &txn)?;
        if applied {
            return Ok(ApproveReturn { applied, code, ret });
        }
        let (applied, ret, code) = Self::approve_transaction(rt, id, txn)?;
        Ok(ApproveReturn { applied, code, ret })
    }

    /// Cancels a pending transaction. Only the proposer may cancel.
    pub fn cancel(rt: &impl Runtime, params: TxnIDParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_type(SIGNABLE_TYPES)?;
        let caller_addr: Address = rt.message().caller();

        rt.transaction(|st: &mut State, rt| {
            if !st.is_signer(&caller_addr) {
                return Err(actor_error!(forbidden; "{} is not a signer", caller_addr));
            }

            let mut ptx = st.load_pending_txs(rt.store())?;
            let txn = ptx
                .try_get(&params.id)?
                .ok_or_else(|| {
                    actor_error!(not_found, "no such transaction {} to cancel", params.id)
                })?
                .clone();

            if txn.approved.first() != Some(&caller_addr) {
                return Err(actor_error!(forbidden; "cannot cancel another signer's transaction"));
            }

            if !params.proposal_hash.is_empty() {
                let calculated_hash = compute_proposal_hash(&txn, rt)
                    .with_context(|| format!("failed to compute proposal hash for {}", params.id))?;
                if params.proposal_hash != calculated_hash {
                    return Err(actor_error!(
                        illegal_argument,
                        "hash does not match proposal params"
                    ));
                }
            }

            ptx.remove(&params.id)?;
            st.pending_txs = ptx.flush()?;
            Ok(())
        })
    }

    /// Adds a signer, optionally raising the threshold. Must be proposed through the multisig.
    pub fn add_signer(rt: &impl Runtime, params: AddSignerParams) -> Result<(), ActorError> {
        let receiver = rt.message().receiver();
        rt.validate_immediate_caller_is(std::iter::once(&receiver))?;
        let resolved_new_signer = Address::new_id(resolve_to_actor_id(rt, &params.signer)?);
        let max_signers = rt.policy().max_multisig_signers;

        rt.transaction(|st: &mut State, _| {
            if st.signers.len() >= max_signers {
                return Err(actor_error!(
                    forbidden,
                    "cannot add more than {} signers",
                    max_signers
                ));
            }
            if st.is_signer(&resolved_new_signer) {
                return Err(actor_error!(forbidden, "{} is already a signer", resolved_new_signer));
            }

            st.signers.push(resolved_new_signer);
            if params.increase {
                st.num_approvals_threshold += 1;
            }
            Ok(())
        })
    }

    /// Removes a signer and its approvals, optionally lowering the threshold.
    pub fn remove_signer(rt: &impl Runtime, params: RemoveSignerParams) -> Result<(), ActorError> {
        let receiver = rt.message().receiver();
        rt.validate_immediate_caller_is(std::iter::once(&receiver))?;
        let resolved_old_signer = Address::new_id(resolve_to_actor_id(rt, &params.signer)?);

        rt.transaction(|st: &mut State, rt| {
            if !st.is_signer(&resolved_old_signer) {
                return Err(actor_error!(forbidden, "{} is not a signer", resolved_old_signer));
            }
            if st.signers.len() == 1 {
                return Err(actor_error!(forbidden; "cannot remove only signer"));
            }

            let remaining = st.signers.len() as u64 - 1;
            if !params.decrease && remaining < st.num_approvals_threshold {
                return Err(actor_error!(
                    illegal_argument,
                    "can't reduce signers to {} below threshold {} with decrease=false",
                    remaining,
                    st.num_approvals_threshold
                ));
            }
            if params.decrease {
                if st.num_approvals_threshold < 2 {
                    return Err(actor_error!(
                        illegal_argument,
                        "can't decrease approvals from {} to {}",
                        st.num_approvals_threshold,
                        st.num_approvals_threshold - 1
                    ));
                }
                st.num_approvals_threshold -= 1;
            }

            st.purge_approvals(rt.store(), &resolved_old_signer)
                .context("failed to purge approvals of removed signer")?;
            st.signers.retain(|s| s != &resolved_old_signer);
            Ok(())
        })
    }

    /// Replaces one signer with another, keeping the threshold.
    pub fn swap_signer(rt: &impl Runtime, params: SwapSignerParams) -> Result<(), ActorError> {
        let receiver = rt.message().receiver();
        rt.validate_immediate_caller_is(std::iter::once(&receiver))?;
        let from_resolved = Address::new_id(resolve_to_actor_id(rt, &params.from)?);
        let to_resolved = Address::new_id(resolve_to_actor_id(rt, &params.to)?);

        rt.transaction(|st: &mut State, rt| {
            if !st.is_signer(&from_resolved) {
                return Err(actor_error!(forbidden; "{} is not a signer", from_resolved));
            }
            if st.is_signer(&to_resolved) {
                return Err(actor_error!(illegal_argument; "{} is already a signer", to_resolved));
            }

            // Order of the remaining signers is preserved.
            st.signers.retain(|s| s != &from_resolved);
            st.signers.push(to_resolved);

            st.purge_approvals(rt.store(), &from_resolved)
                .context("failed to purge approvals of swapped signer")?;
            Ok(())
        })
    }

    pub fn change_num_approvals_threshold(
        rt: &impl Runtime,
        params: ChangeNumApprovalsThresholdParams,
    ) -> Result<(), ActorError> {
        let receiver = rt.message().receiver();
        rt.validate_immediate_caller_is(std::iter::once(&receiver))?;

        rt.transaction(|st: &mut State, _| {
            if params.new_threshold == 0 || params.new_threshold > st.signers.len() as u64 {
                return Err(actor_error!(illegal_argument; "new threshold value not supported"));
            }
            st.num_approvals_threshold = params.new_threshold;
            Ok(())
        })
    }

    /// Locks an amount of the balance under a vesting schedule. Allowed only once, and only
    /// on a multisig constructed without one.
    pub fn lock_balance(rt: &impl Runtime, params: LockBalanceParams) -> Result<(), ActorError> {
        let receiver = rt.message().receiver();
        rt.validate_immediate_caller_is(std::iter::once(&receiver))?;

        if params.unlock_duration <= 0 {
            return Err(actor_error!(illegal_argument, "unlock duration must be positive"));
        }
        if params.amount.is_negative() {
            return Err(actor_error!(illegal_argument, "amount to lock must be positive"));
        }

        rt.transaction(|st: &mut State, _| {
            if st.unlock_duration != 0 {
                return Err(actor_error!(forbidden, "modification of unlock disallowed"));
            }
            st.set_locked(params.start_epoch, params.unlock_duration, params.amount);
            Ok(())
        })
    }

    fn approve_transaction(
        rt: &impl Runtime,
        txn_id: TxnID,
        mut txn: Transaction,
    ) -> Result<(bool, RawBytes, ExitCode), ActorError> {
        let caller = rt.message().caller();
        if txn.approved.contains(&caller) {
            return Err(actor_error!(forbidden, "{} already approved this message", caller));
        }

        let st = rt.transaction(|st: &mut State, rt| {
            let mut ptx = st.load_pending_txs(rt.store())?;
            txn.approved.push(caller);
            ptx.set(&txn_id, txn.clone())
                .with_context(|| format!("failed to put transaction {} for approval", txn_id))?;
            st.pending_txs = ptx.flush()?;
            Ok(st.clone())
        })?;

        execute_transaction_if_approved(rt, &st, txn_id, &txn)
    }
}

fn execute_transaction_if_approved(
    rt: &impl Runtime,
    st: &State,
    txn_id: TxnID,
    txn: &Transaction,
) -> Result<(bool, RawBytes, ExitCode), ActorError> {
    if (txn.approved.len() as u64) < st.num_approvals_threshold {
        return Ok((false, RawBytes::default(), ExitCode::OK));
    }

    st.check_available(rt.current_balance(), &txn.value, rt.curr_epoch())?;

    let res = rt.send(&txn.to, txn.method, params_block(&txn.params), txn.value.clone())?;
    let code = res.exit_code;
    let out = res.return_data.map(|blk| RawBytes::from(blk.data)).unwrap_or_default();
    if code.is_success() {
        log::info!("executed transaction {} to {} method {}", txn_id, txn.to, txn.method);
    } else {
        log::warn!(
            "transaction {} to {} method {} exited with {:?}",
            txn_id,
            txn.to,
            txn.method,
            code
        );
    }

    rt.transaction(|st: &mut State, rt| {
        let mut ptx = st.load_pending_txs(rt.store())?;
        // A re-entrant call may have removed the transaction already.
        ptx.try_remove(&txn_id).context("failed to delete transaction for cleanup")?;
        st.pending_txs = ptx.flush()?;
        Ok(())
    })?;

    Ok((true, out, code))
}

fn get_transaction<'m, BS: fvm_ipld_blockstore::Blockstore>(
    rt: &impl Runtime,
    ptx: &'m PendingTxnMap<BS>,
    txn_id: TxnID,
    proposal_hash: &[u8],
) -> Result<&'m Transaction, ActorError> {
    let txn = ptx
        .try_get(&txn_id)?
        .ok_or_else(|| actor_error!(not_found, "no such transaction {} for approval", txn_id))?;

    if !proposal_hash.is_empty() {
        let calculated_hash = compute_proposal_hash(txn, rt)
            .with_context(|| format!("failed to compute proposal hash for {}", txn_id))?;
        if proposal_hash != calculated_hash {
            return Err(actor_error!(
                illegal_argument,
                "hash does not match proposal params (ensure requester is an ID address)"
            ));
        }
    }
    Ok(txn)
}

fn params_block(params: &RawBytes) -> Option<IpldBlock> {
    if params.is_empty() {
        None
    } else {
        Some(IpldBlock { codec: DAG_CBOR, data: params.to_vec() })
    }
}

/// Computes a digest of a proposed transaction. This digest is used to confirm identity
/// of the transaction associated with an ID, which might change under chain re-orgs.
pub fn compute_proposal_hash(
    txn: &Transaction,
    sys: &dyn Primitives,
) -> Result<[u8; 32], ActorError> {
    let proposal_hash = ProposalHashData {
        requester: txn.approved.first(),
        to: &txn.to,
        value: &txn.value,
        method: &txn.method,
        params: &txn.params,
    };
    let data = fvm_ipld_encoding::to_vec(&proposal_hash)
        .context_code(ExitCode::USR_SERIALIZATION, "failed to serialize proposal hash data")?;
    Ok(sys.hash_blake2b(&data))
}

impl ActorCode for Actor {
    type Methods = Method;
    actor_dispatch! {
        Constructor => constructor,
        Propose => propose,
        Approve => approve,
        Cancel => cancel,
        AddSigner => add_signer,
        RemoveSigner => remove_signer,
        SwapSigner => swap_signer,
        ChangeNumApprovalsThreshold => change_num_approvals_threshold,
        LockBalance => lock_balance,
    }
}
