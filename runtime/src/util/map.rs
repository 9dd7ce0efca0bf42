// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{ActorError, AsActorError, Hasher};
use anyhow::anyhow;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_hamt as hamt;
use fvm_shared::address::Address;
use fvm_shared::error::ExitCode;
use integer_encoding::VarInt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;

pub type Config = hamt::Config;

/// A typed view over a HAMT of `K -> V`.
///
/// Error mapping:
/// - a key missing from a strict accessor (`get`, `remove`) is `USR_NOT_FOUND`;
/// - a node or value that does not decode is `USR_SERIALIZATION`;
/// - any other store or structural failure is `USR_ILLEGAL_STATE`.
///
/// `name` only decorates error messages and is never persisted.
pub struct Map<BS, K, V>
where
    BS: Blockstore,
    K: MapKey,
    V: DeserializeOwned + Serialize,
{
    hamt: hamt::Hamt<BS, V, hamt::BytesKey, Hasher>,
    name: &'static str,
    key_type: PhantomData<K>,
}

/// Keys that can be stored in a [`Map`] by their byte encoding.
pub trait MapKey: Sized + Debug {
    fn from_bytes(b: &[u8]) -> Result<Self, String>;
    fn to_bytes(&self) -> Result<Vec<u8>, String>;
}

fn classify(e: hamt::Error, what: String) -> ActorError {
    let e = match e {
        hamt::Error::Dynamic(e) => e,
        other => return ActorError::illegal_state(format!("{}: {}", what, other)),
    };
    // Errors raised inside for_each callbacks come back untouched.
    match e.downcast::<ActorError>() {
        Ok(inner) => inner,
        Err(e) if e.is::<fvm_ipld_encoding::Error>() => {
            ActorError::serialization(format!("{}: {}", what, e))
        }
        Err(e) => ActorError::illegal_state(format!("{}: {}", what, e)),
    }
}

fn encode_key<K: MapKey>(key: &K) -> Result<hamt::BytesKey, ActorError> {
    key.to_bytes()
        .map(hamt::BytesKey)
        .with_context_code(ExitCode::USR_ASSERTION_FAILED, || format!("invalid key {:?}", key))
}

impl<BS, K, V> Map<BS, K, V>
where
    BS: Blockstore,
    K: MapKey,
    V: DeserializeOwned + Serialize,
{
    pub fn empty(store: BS, config: Config, name: &'static str) -> Self {
        Self { hamt: hamt::Hamt::new_with_config(store, config), name, key_type: PhantomData }
    }

    /// Writes an empty map and returns its root.
    pub fn flush_empty(store: BS, config: Config) -> Result<Cid, ActorError> {
        Self::empty(store, config, "empty").flush()
    }

    /// Opens the map rooted at `root`. The config must match the one the map was written with.
    pub fn load(
        store: BS,
        root: &Cid,
        config: Config,
        name: &'static str,
    ) -> Result<Self, ActorError> {
        match hamt::Hamt::load_with_config(root, store, config) {
            Ok(hamt) => Ok(Self { hamt, name, key_type: PhantomData }),
            Err(e) => Err(classify(e, format!("failed to load map {} at {}", name, root))),
        }
    }

    /// Writes pending changes, returning the new root. An unchanged map keeps its root.
    pub fn flush(&mut self) -> Result<Cid, ActorError> {
        let name = self.name;
        self.hamt.flush().map_err(|e| classify(e, format!("failed to flush map {}", name)))
    }

    pub fn store(&self) -> &BS {
        self.hamt.store()
    }

    pub fn is_empty(&self) -> bool {
        self.hamt.is_empty()
    }

    fn failed(&self, op: &str, key: &K) -> impl FnOnce(hamt::Error) -> ActorError {
        let what = format!("failed to {} {:?} in map {}", op, key, self.name);
        move |e| classify(e, what)
    }

    fn missing(&self, key: &K) -> String {
        format!("{:?} not found in map {}", key, self.name)
    }

    /// The value under `key`, or `USR_NOT_FOUND`.
    pub fn get(&self, key: &K) -> Result<&V, ActorError> {
        let found = self.try_get(key)?;
        found.with_context_code(ExitCode::USR_NOT_FOUND, || self.missing(key))
    }

    pub fn try_get(&self, key: &K) -> Result<Option<&V>, ActorError> {
        let k = encode_key(key)?;
        self.hamt.get(&k).map_err(self.failed("get", key))
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, ActorError> {
        let k = encode_key(key)?;
        self.hamt.contains_key(&k).map_err(self.failed("look up", key))
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn set(&mut self, key: &K, value: V) -> Result<Option<V>, ActorError>
    where
        V: PartialEq,
    {
        let k = encode_key(key)?;
        let on_err = self.failed("set", key);
        self.hamt.set(k, value).map_err(on_err)
    }

    /// Stores `value` only when `key` is vacant. Returns whether it was stored.
    pub fn set_if_absent(&mut self, key: &K, value: V) -> Result<bool, ActorError>
    where
        V: PartialEq,
    {
        let k = encode_key(key)?;
        let on_err = self.failed("set", key);
        self.hamt.set_if_absent(k, value).map_err(on_err)
    }

    /// Removes and returns the value under `key`, or `USR_NOT_FOUND`.
    pub fn remove(&mut self, key: &K) -> Result<V, ActorError> {
        let missing = self.missing(key);
        self.try_remove(key)?.context_code(ExitCode::USR_NOT_FOUND, missing)
    }

    pub fn try_remove(&mut self, key: &K) -> Result<Option<V>, ActorError> {
        let k = encode_key(key)?;
        let on_err = self.failed("delete", key);
        let removed = self.hamt.delete(&k).map_err(on_err)?;
        Ok(removed.map(|(_, v)| v))
    }

    /// Visits every entry in HAMT order. An `ActorError` returned by `f` stops
    /// the walk and is returned as is.
    pub fn for_each<F>(&self, mut f: F) -> Result<(), ActorError>
    where
        F: FnMut(K, &V) -> Result<(), ActorError>,
    {
        let name = self.name;
        self.hamt
            .for_each(|k, v| {
                let key = K::from_bytes(k)
                    .with_context_code(ExitCode::USR_ILLEGAL_STATE, || {
                        format!("undecodable key {:?}", k)
                    })?;
                f(key, v).map_err(|e| anyhow!(e))
            })
            .map_err(|e| classify(e, format!("failed to iterate map {}", name)))
    }

    pub fn collect_keys(&self) -> Result<Vec<K>, ActorError> {
        let mut keys = Vec::new();
        self.for_each(|k, _| {
            keys.push(k);
            Ok(())
        })?;
        Ok(keys)
    }
}

impl MapKey for Vec<u8> {
    fn from_bytes(b: &[u8]) -> Result<Self, String> {
        Ok(b.to_vec())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        Ok(self.clone())
    }
}

macro_rules! varint_key {
    ($($t:ty),*) => {$(
        impl MapKey for $t {
            fn from_bytes(b: &[u8]) -> Result<Self, String> {
                match VarInt::decode_var(b) {
                    Some((v, n)) if n == b.len() => Ok(v),
                    Some(_) => Err(format!("trailing bytes after varint {:?}", b)),
                    None => Err(format!("bad varint {:?}", b)),
                }
            }

            fn to_bytes(&self) -> Result<Vec<u8>, String> {
                Ok(self.encode_var_vec())
            }
        }
    )*};
}

varint_key!(u64, i64);

impl MapKey for Address {
    fn from_bytes(b: &[u8]) -> Result<Self, String> {
        Address::from_bytes(b).map_err(|e| e.to_string())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        Ok(Address::to_bytes(*self))
    }
}

impl MapKey for Cid {
    fn from_bytes(b: &[u8]) -> Result<Self, String> {
        Cid::try_from(b).map_err(|e| e.to_string())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        Ok(Cid::to_bytes(self))
    }
}
