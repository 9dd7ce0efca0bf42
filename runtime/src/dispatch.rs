// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Method-number dispatch for builtin actors.
//!
//! Each actor lists its methods once:
//!
//! ```ignore
//! impl ActorCode for Actor {
//!     type Methods = Method;
//!     actor_dispatch! {
//!         Constructor => constructor,
//!         AddBalance => add_balance,
//!     }
//! }
//! ```
//!
//! A handler takes either just the runtime or the runtime plus one decoded
//! parameter. A `()` return value is sent back as an empty block.

use std::marker::PhantomData;

use castaway::cast;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use serde::{Deserialize, Serialize};

use crate::ActorError;

#[macro_export]
macro_rules! actor_dispatch {
    ($($method:ident => $func:ident,)*) => {
        fn invoke_method<RT>(
            rt: &RT,
            method: fvm_shared::MethodNum,
            args: Option<fvm_ipld_encoding::ipld_block::IpldBlock>,
        ) -> Result<Option<fvm_ipld_encoding::ipld_block::IpldBlock>, $crate::ActorError>
        where
            RT: $crate::runtime::Runtime,
        {
            match <Self::Methods as num_traits::FromPrimitive>::from_u64(method) {
                $(Some(Self::Methods::$method) => $crate::dispatch(rt, Self::$func, &args),)*
                None => Err($crate::actor_error!(unhandled_message; "invalid method: {}", method)),
            }
        }
    };
}

/// Adapts a handler of a given arity to the untyped method interface.
pub trait Handler<'de, RT> {
    fn handle(
        self,
        rt: &RT,
        args: &'de Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError>;
}

/// A handler tagged with its parameter tuple, so both arities get an impl.
pub struct Typed<F, P> {
    func: F,
    _params: PhantomData<fn(P)>,
}

#[doc(hidden)]
pub fn dispatch<'de, F, P, RT>(
    rt: &RT,
    func: F,
    args: &'de Option<IpldBlock>,
) -> Result<Option<IpldBlock>, ActorError>
where
    Typed<F, P>: Handler<'de, RT>,
{
    Typed { func, _params: PhantomData }.handle(rt, args)
}

// Undecodable parameters are the sender's fault.
fn decode<'de, A: Deserialize<'de>>(block: &'de IpldBlock) -> Result<A, ActorError> {
    block
        .deserialize()
        .map_err(|e| ActorError::illegal_argument(format!("failed to decode parameters: {}", e)))
}

fn encode<T: Serialize>(ret: T) -> Result<Option<IpldBlock>, ActorError> {
    if cast!(&ret, &()).is_ok() {
        return Ok(None);
    }
    Ok(IpldBlock::serialize_cbor(&ret)?)
}

impl<'de, F, R, RT> Handler<'de, RT> for Typed<F, ()>
where
    F: FnOnce(&RT) -> Result<R, ActorError>,
    R: Serialize,
{
    fn handle(
        self,
        rt: &RT,
        args: &'de Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError> {
        if args.is_some() {
            return Err(ActorError::illegal_argument("method takes no parameters".into()));
        }
        encode((self.func)(rt)?)
    }
}

impl<'de, F, A, R, RT> Handler<'de, RT> for Typed<F, (A,)>
where
    F: FnOnce(&RT, A) -> Result<R, ActorError>,
    A: Deserialize<'de>,
    R: Serialize,
{
    fn handle(
        self,
        rt: &RT,
        args: &'de Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError> {
        let block = args
            .as_ref()
            .ok_or_else(|| ActorError::illegal_argument("method requires parameters".into()))?;
        encode((self.func)(rt, decode(block)?)?)
    }
}
