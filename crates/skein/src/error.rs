//! Error taxonomy for the evaluator, binder, and `PARSE` dialect.
//!
//! Grounded on `exception_private.rs`'s closed `RunError` enum (three variants,
//! `strum`-derived `Display`, no `thiserror`) and `resource.rs`'s hand-written
//! `Display`/`std::error::Error` impl for `ResourceError`. This codebase never
//! reaches for a `thiserror`-per-variant derive tree even though other crates in
//! the retrieval pack do; a small closed enum plus `strum::Display` is the idiom
//! actually used here, so it is what this crate uses too.

use std::fmt;

use strum::Display as StrumDisplay;

use crate::symbol::Symbol;

/// Crate-wide result alias, mirroring `RunResult<T>` in the teacher's exception module.
pub type Result<T> = std::result::Result<T, RunError>;

/// One row of the error-kind table (see `SPEC_FULL.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    NotBound,
    NoRelative,
    VarlessWord,
    LockedWord,
    LockedSeries,
    DupVars,
    ParseRule,
    ParseEnd,
    ParseCommand,
    ParseVariable,
    ParseSeries,
    SizeLimit,
    BadMake,
    BadPathSelect,
    BadPathSet,
    /// The minimal scanner (`scan.rs`) hit malformed literal syntax. Not in
    /// the original table since the loader is external to the core (§6);
    /// this crate's reference scanner needs *some* error kind to raise.
    ScanError,
    /// A native arithmetic operation hit an undefined result (division by
    /// zero). Not in the original table since arithmetic natives are part of
    /// the standard library this crate doesn't carry, but the minimal native
    /// registry (`eval.rs`) needs some error kind for it.
    MathError,
    /// Recursion depth exceeded; not in the original table but required once
    /// a resource tracker actually enforces `§5`'s frame-stack contract.
    StackOverflow,
    /// An interpreter-internal invariant was violated (e.g. a bind-table
    /// entry was non-zero on entry to a public binding operation). Never
    /// expected to surface from well-formed input; kept distinct from the
    /// user-facing kinds above so tests can assert it never appears.
    Internal,
}

/// A raised error: its kind, an optional offending symbol (for word-related
/// kinds, which is the common case and is `Copy`), and a human-readable detail
/// string built at the raise site. Unlike a `Value` snapshot, this avoids
/// needing `RunError` to understand heap refcounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub kind: ErrorKind,
    pub symbol: Option<Symbol>,
    pub detail: String,
}

impl RunError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, symbol: None, detail: detail.into() }
    }

    pub fn with_symbol(kind: ErrorKind, symbol: Symbol, detail: impl Into<String>) -> Self {
        Self { kind, symbol: Some(symbol), detail: detail.into() }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for RunError {}
