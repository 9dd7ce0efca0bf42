// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashMap;
use std::fmt;

use cid::Cid;
use fvm_ipld_encoding::IPLD_RAW;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::version::NetworkVersion;
use multihash::{Code, MultihashDigest};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::builtins::Type;

/// Generation of the built-in actor code. Each generation is selected by a range of
/// network versions and has its own set of code IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorVersion {
    V0,
    V2,
    V3,
}

impl ActorVersion {
    pub const ALL: [ActorVersion; 3] = [ActorVersion::V0, ActorVersion::V2, ActorVersion::V3];

    pub fn for_network(nv: NetworkVersion) -> Self {
        match u32::from(nv) {
            0..=3 => ActorVersion::V0,
            4..=9 => ActorVersion::V2,
            _ => ActorVersion::V3,
        }
    }

    /// Number used in this generation's code ID names.
    fn code_generation(&self) -> u8 {
        match self {
            ActorVersion::V0 => 1,
            ActorVersion::V2 => 2,
            ActorVersion::V3 => 3,
        }
    }
}

impl fmt::Display for ActorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorVersion::V0 => write!(f, "v0"),
            ActorVersion::V2 => write!(f, "v2"),
            ActorVersion::V3 => write!(f, "v3"),
        }
    }
}

/// Epoch heights at which each network upgrade takes effect. Entry `i` is the last epoch
/// before network version `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeSchedule {
    pub heights: Vec<ChainEpoch>,
}

impl Default for UpgradeSchedule {
    /// Mainnet heights for network versions 1 through 11.
    fn default() -> Self {
        UpgradeSchedule {
            heights: vec![
                41280, 51000, 94000, 138720, 140760, 170000, 265200, 272400, 336458, 550321,
                665280,
            ],
        }
    }
}

impl UpgradeSchedule {
    /// A schedule that runs at `nv` from genesis onwards.
    pub fn fixed(nv: NetworkVersion) -> Self {
        UpgradeSchedule { heights: vec![-1; u32::from(nv) as usize] }
    }

    pub fn network_version(&self, epoch: ChainEpoch) -> NetworkVersion {
        let passed = self.heights.iter().take_while(|h| epoch > **h).count();
        NetworkVersion::new(passed as u32)
    }
}

/// Code IDs and type predicates for one actor generation.
/// Predicates accept only code IDs of their own generation.
#[derive(Debug)]
pub struct BuiltinActors {
    version: ActorVersion,
    codes: HashMap<Type, Cid>,
    types: HashMap<Cid, Type>,
}

fn make_builtin(version: ActorVersion, typ: Type) -> Cid {
    let name = format!("fil/{}/{}", version.code_generation(), typ.name());
    Cid::new_v1(IPLD_RAW, Code::Identity.digest(name.as_bytes()))
}

impl BuiltinActors {
    fn build(version: ActorVersion) -> Self {
        let codes: HashMap<Type, Cid> =
            Type::ALL.iter().map(|t| (*t, make_builtin(version, *t))).collect();
        let types = codes.iter().map(|(t, c)| (*c, *t)).collect();
        BuiltinActors { version, codes, types }
    }

    pub fn for_version(version: ActorVersion) -> &'static BuiltinActors {
        static V0: Lazy<BuiltinActors> = Lazy::new(|| BuiltinActors::build(ActorVersion::V0));
        static V2: Lazy<BuiltinActors> = Lazy::new(|| BuiltinActors::build(ActorVersion::V2));
        static V3: Lazy<BuiltinActors> = Lazy::new(|| BuiltinActors::build(ActorVersion::V3));
        match version {
            ActorVersion::V0 => &V0,
            ActorVersion::V2 => &V2,
            ActorVersion::V3 => &V3,
        }
    }

    pub fn version(&self) -> ActorVersion {
        self.version
    }

    pub fn code_id(&self, typ: Type) -> Cid {
        // Every type is populated by build().
        self.codes.get(&typ).copied().unwrap_or_else(|| make_builtin(self.version, typ))
    }

    pub fn resolve(&self, code: &Cid) -> Option<Type> {
        self.types.get(code).copied()
    }

    pub fn is_builtin_actor(&self, code: &Cid) -> bool {
        self.types.contains_key(code)
    }

    pub fn is_account_actor(&self, code: &Cid) -> bool {
        self.resolve(code) == Some(Type::Account)
    }

    pub fn is_storage_miner_actor(&self, code: &Cid) -> bool {
        self.resolve(code) == Some(Type::Miner)
    }

    pub fn is_singleton_actor(&self, code: &Cid) -> bool {
        self.resolve(code).map_or(false, |t| t.is_singleton())
    }

    /// Account and multisig actors may act as principals.
    pub fn is_signable_actor(&self, code: &Cid) -> bool {
        self.resolve(code).map_or(false, |t| t.is_principal())
    }

    pub fn system_code_id(&self) -> Cid {
        self.code_id(Type::System)
    }

    pub fn init_code_id(&self) -> Cid {
        self.code_id(Type::Init)
    }

    pub fn cron_code_id(&self) -> Cid {
        self.code_id(Type::Cron)
    }

    pub fn account_code_id(&self) -> Cid {
        self.code_id(Type::Account)
    }

    pub fn storage_power_code_id(&self) -> Cid {
        self.code_id(Type::Power)
    }

    pub fn storage_miner_code_id(&self) -> Cid {
        self.code_id(Type::Miner)
    }

    pub fn storage_market_code_id(&self) -> Cid {
        self.code_id(Type::Market)
    }

    pub fn payment_channel_code_id(&self) -> Cid {
        self.code_id(Type::PaymentChannel)
    }

    pub fn multisig_code_id(&self) -> Cid {
        self.code_id(Type::Multisig)
    }

    pub fn reward_code_id(&self) -> Cid {
        self.code_id(Type::Reward)
    }

    pub fn verified_registry_code_id(&self) -> Cid {
        self.code_id(Type::VerifiedRegistry)
    }
}

/// Resolves a code ID of any generation to its generation and type.
pub fn resolve_builtin(code: &Cid) -> Option<(ActorVersion, Type)> {
    ActorVersion::ALL
        .iter()
        .find_map(|v| BuiltinActors::for_version(*v).resolve(code).map(|t| (*v, t)))
}
