// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::Display;

use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::error::ExitCode;
use fvm_shared::Response;
use thiserror::Error;

/// Abort raised by an actor method. The VM turns it into the receipt's exit
/// code and rolls back the invocation's state changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ActorError(exit_code: {exit_code:?}, msg: {msg})")]
pub struct ActorError {
    exit_code: ExitCode,
    msg: String,
    /// Return data carried alongside the abort, usually empty.
    data: RawBytes,
}

macro_rules! exit_code_constructors {
    ($($name:ident => $code:ident,)*) => {
        impl ActorError {
            $(
                pub fn $name(msg: String) -> Self {
                    Self::unchecked(ExitCode::$code, msg)
                }
            )*
        }
    };
}

exit_code_constructors! {
    illegal_argument => USR_ILLEGAL_ARGUMENT,
    not_found => USR_NOT_FOUND,
    forbidden => USR_FORBIDDEN,
    insufficient_funds => USR_INSUFFICIENT_FUNDS,
    illegal_state => USR_ILLEGAL_STATE,
    serialization => USR_SERIALIZATION,
    unhandled_message => USR_UNHANDLED_MESSAGE,
    assertion_failed => USR_ASSERTION_FAILED,
}

impl ActorError {
    /// Builds an error with any exit code, system codes included.
    pub fn unchecked(exit_code: ExitCode, msg: String) -> Self {
        Self { exit_code, msg, data: RawBytes::default() }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// Moves the attached return data out, leaving it empty.
    pub fn take_data(&mut self) -> RawBytes {
        std::mem::take(&mut self.data)
    }

    /// Prepends `context` to the message.
    pub fn wrap(mut self, context: impl AsRef<str>) -> Self {
        self.msg = format!("{}: {}", context.as_ref(), self.msg);
        self
    }
}

impl From<fvm_ipld_encoding::Error> for ActorError {
    fn from(e: fvm_ipld_encoding::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

/// A send the VM refused to perform, so no callee ran. Sends from inside a
/// state transaction are the typical case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("send failed: {0}")]
pub struct SendError(pub String);

impl From<SendError> for ActorError {
    fn from(e: SendError) -> Self {
        Self::assertion_failed(e.0)
    }
}

/// Unwraps a send outcome. A callee abort is re-raised with the callee's exit
/// code and return data.
pub fn extract_send_result(
    res: Result<Response, SendError>,
) -> Result<Option<IpldBlock>, ActorError> {
    let resp = res?;
    if resp.exit_code.is_success() {
        return Ok(resp.return_data);
    }
    let mut err =
        ActorError::unchecked(resp.exit_code, format!("send aborted with code {}", resp.exit_code));
    if let Some(block) = resp.return_data {
        err.data = RawBytes::new(block.data);
    }
    Err(err)
}

/// Decodes a send's return block, which must be present.
pub fn deserialize_block<T: serde::de::DeserializeOwned>(
    ret: Option<IpldBlock>,
) -> Result<T, ActorError> {
    ret.context_code(ExitCode::USR_ASSERTION_FAILED, "return expected")?
        .deserialize()
        .exit_code(ExitCode::USR_SERIALIZATION)
}

/// `actor_error!(not_found; "no deal {}", id)` builds an [`ActorError`] through
/// the constructor of the same name. A comma may replace the semicolon.
#[macro_export]
macro_rules! actor_error {
    ( $code:ident; $msg:expr ) => { $crate::ActorError::$code($msg.to_string()) };
    ( $code:ident; $msg:literal $(, $ex:expr)+ ) => {
        $crate::ActorError::$code(format!($msg, $($ex,)*))
    };
    ( $code:ident, $msg:expr ) => { $crate::actor_error!($code; $msg) };
    ( $code:ident, $msg:literal $(, $ex:expr)+ ) => {
        $crate::actor_error!($code; $msg $(, $ex)*)
    };
}

/// Message context for results that already carry an [`ActorError`].
pub trait ActorContext<T> {
    fn context<C: Display + 'static>(self, context: C) -> Result<T, ActorError>;

    fn with_context<C: Display + 'static, F: FnOnce() -> C>(self, f: F) -> Result<T, ActorError>;
}

impl<T> ActorContext<T> for Result<T, ActorError> {
    fn context<C: Display + 'static>(self, context: C) -> Result<T, ActorError> {
        self.map_err(|e| e.wrap(context.to_string()))
    }

    fn with_context<C: Display + 'static, F: FnOnce() -> C>(self, f: F) -> Result<T, ActorError> {
        self.map_err(|e| e.wrap(f().to_string()))
    }
}

/// Turns foreign errors and missing values into an [`ActorError`] with a
/// chosen exit code.
pub trait AsActorError<T>: Sized {
    fn with_context_code<C, F>(self, code: ExitCode, f: F) -> Result<T, ActorError>
    where
        C: Display + 'static,
        F: FnOnce() -> C;

    fn exit_code(self, code: ExitCode) -> Result<T, ActorError>;

    fn context_code<C>(self, code: ExitCode, context: C) -> Result<T, ActorError>
    where
        C: Display + 'static,
    {
        self.with_context_code(code, || context)
    }
}

// E stays Display rather than std::error::Error so anyhow errors convert too.
impl<T, E: Display> AsActorError<T> for Result<T, E> {
    fn with_context_code<C, F>(self, code: ExitCode, f: F) -> Result<T, ActorError>
    where
        C: Display + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| ActorError::unchecked(code, format!("{}: {}", f(), e)))
    }

    fn exit_code(self, code: ExitCode) -> Result<T, ActorError> {
        self.map_err(|e| ActorError::unchecked(code, e.to_string()))
    }
}

impl<T> AsActorError<T> for Option<T> {
    fn with_context_code<C, F>(self, code: ExitCode, f: F) -> Result<T, ActorError>
    where
        C: Display + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| ActorError::unchecked(code, f().to_string()))
    }

    fn exit_code(self, code: ExitCode) -> Result<T, ActorError> {
        self.ok_or_else(|| ActorError::unchecked(code, "None".to_string()))
    }
}
