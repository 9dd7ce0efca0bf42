// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Identifies the builtin actor types for usage with the
/// actor::resolve_builtin_actor_type syscall.
/// Note that there is no mapping for the burnt funds actor, which is an account.
#[derive(
    PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Debug, Serialize_repr, Deserialize_repr,
)]
#[repr(i32)]
pub enum Type {
    System = 1,
    Init = 2,
    Cron = 3,
    Account = 4,
    Power = 5,
    Miner = 6,
    Market = 7,
    PaymentChannel = 8,
    Multisig = 9,
    Reward = 10,
    VerifiedRegistry = 11,
}

impl Type {
    pub const ALL: [Type; 11] = [
        Type::System,
        Type::Init,
        Type::Cron,
        Type::Account,
        Type::Power,
        Type::Miner,
        Type::Market,
        Type::PaymentChannel,
        Type::Multisig,
        Type::Reward,
        Type::VerifiedRegistry,
    ];

    /// Name segment used in the code ID of this actor type.
    pub fn name(&self) -> &'static str {
        match *self {
            Type::System => "system",
            Type::Init => "init",
            Type::Cron => "cron",
            Type::Account => "account",
            Type::Power => "storagepower",
            Type::Miner => "storageminer",
            Type::Market => "storagemarket",
            Type::PaymentChannel => "paymentchannel",
            Type::Multisig => "multisig",
            Type::Reward => "reward",
            Type::VerifiedRegistry => "verifiedregistry",
        }
    }

    /// Actors that exist once per network at a fixed ID.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            Type::System
                | Type::Init
                | Type::Reward
                | Type::Cron
                | Type::Power
                | Type::Market
                | Type::VerifiedRegistry
        )
    }

    /// Actors that can be the principal of a signed message.
    pub fn is_principal(&self) -> bool {
        matches!(self, Type::Account | Type::Multisig)
    }
}
