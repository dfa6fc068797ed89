#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked at call sites")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional in the series manager")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors the source dialect's fixnum semantics")]
#![expect(clippy::too_many_arguments, reason = "evaluator/parse entry points mirror the source dialect's wide call sites")]
#![expect(clippy::unused_self, reason = "trait method shapes stay consistent across implementors")]

// first, since later modules borrow its ResourceTracker checkpoint at every growth
mod resource;

mod series;

mod bind;
mod collect;
mod context;
mod error;
mod eval;
mod frame;
mod interpreter;
mod io;
mod lookup;
mod mold;
mod parse;
mod scan;
mod symbol;
mod throw;
mod value;

pub use crate::{
    bind::{bind_relative_deep, bind_values_core, rebind_values_deep, unbind_values_core, BindFlags},
    collect::{collect_context, CollectFlags, Collector},
    context::{Context, ContextFlags, ContextId, ContextStore, Dispatch, FunctionId, KeyList, NativeOp},
    error::{ErrorKind, Result, RunError},
    eval::Evaluator,
    frame::{Frame, FrameId, FrameMode},
    interpreter::Interpreter,
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    lookup::{read_slot, resolve_var, write_slot, VarSlot},
    mold::mold,
    parse::{parse, ParseOutcome},
    resource::{DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker},
    scan::scan,
    series::{Series, SeriesId, SeriesManager},
    symbol::{Symbol, SymbolTable, SYM_0, SYM_SELF},
    throw::{EvalResult, Signal, Throw, ThrowLabel},
    value::{Binding, Value, ValueKind},
};
