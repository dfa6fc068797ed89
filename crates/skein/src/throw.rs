//! The throw protocol (`SPEC_FULL.md` §4.9): labelled out-of-band returns
//! used for `PARSE`'s `accept`/`reject`/`return` and for function `return`.
//!
//! Grounded on `exception_private.rs`'s three-variant `RunError` (a small
//! closed enum rather than a `thiserror` tree) and on the general idea of
//! reifying a longjmp-style control transfer as a Rust value instead of
//! unwinding the native stack. Unlike the source dialect's thread-global
//! "throwing value" slot compared by identity, sentinel labels here are a
//! closed enum compared structurally — there is no interned
//! "identity-equal value" concept to reuse once labels are a Rust type.

use crate::{error::RunError, symbol::Symbol, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowLabel {
    /// Terminates the nearest enclosing `PARSE` iteration successfully.
    ParseAccept,
    /// Terminates the nearest enclosing `PARSE` iteration as a failure.
    ParseReject,
    /// Returns a value from the outermost `PARSE` call itself.
    ParseReturn,
    /// Returns a value from the nearest enclosing function body.
    FunctionReturn,
    /// A user-named throw/catch pair.
    Named(Symbol),
}

/// An in-flight throw: a label plus the value it carries. Propagated as the
/// `Err` arm of evaluation internally (see `eval.rs`), then either caught by
/// a matching frame or converted to a [`crate::error::RunError`] if it
/// escapes the outermost frame uncaught (§7 "Propagation").
#[derive(Debug, Clone)]
pub struct Throw {
    pub label: ThrowLabel,
    pub value: Value,
}

impl Throw {
    #[must_use]
    pub fn new(label: ThrowLabel, value: Value) -> Self {
        Self { label, value }
    }

    /// `catch_thrown`: matches `self` against `label`, returning its value if
    /// they match so the caller can "clear the throw flag" by simply
    /// consuming this `Throw`.
    #[must_use]
    pub fn catch(self, label: ThrowLabel) -> Result<Value, Self> {
        if self.label == label { Ok(self.value) } else { Err(self) }
    }
}

/// The two ways a nested evaluation can fail to simply return a value (§7
/// "Propagation"): a structural error that unwinds every intervening frame
/// immediately, or a flow-control throw that some enclosing frame (a
/// function body awaiting `return`, a `PARSE` iteration awaiting
/// `accept`/`reject`) may catch instead of propagating further. `eval.rs` and
/// `parse.rs` share this as their error type precisely because `PARSE` is
/// "a recursive sub-evaluator that shares the main evaluator's frame
/// mechanics and throw-propagation" (§1 item 3).
#[derive(Debug, Clone)]
pub enum Signal {
    Error(RunError),
    Throw(Throw),
}

impl From<RunError> for Signal {
    fn from(err: RunError) -> Self {
        Self::Error(err)
    }
}

impl From<Throw> for Signal {
    fn from(throw: Throw) -> Self {
        Self::Throw(throw)
    }
}

impl From<crate::resource::ResourceError> for Signal {
    fn from(err: crate::resource::ResourceError) -> Self {
        Self::Error(RunError::from(err))
    }
}

/// Crate-wide result alias for evaluation, mirroring [`crate::error::Result`]
/// but carrying [`Signal`] instead of bare [`RunError`] since evaluation can
/// also escape via a throw.
pub type EvalResult<T> = std::result::Result<T, Signal>;
