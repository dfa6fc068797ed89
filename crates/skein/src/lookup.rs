//! Variable lookup (`SPEC_FULL.md` §4.5): resolving a bound word to its live
//! storage cell.
//!
//! Grounded on `namespace.rs`'s index-based scope access — no raw pointers,
//! per the same reasoning documented there. `resolve_var` returns a
//! [`VarSlot`] descriptor (which arena, which index) instead of a pointer;
//! `eval.rs` and `bind.rs` read or write through it via the owning
//! [`crate::series::SeriesManager`]/frame stack, so there is never a live
//! borrow that outlives the lookup itself.

use crate::{
    bind::not_bound_error,
    context::{ContextId, ContextStore},
    error::{ErrorKind, Result, RunError},
    frame::{Frame, FrameMode},
    resource::ResourceTracker,
    series::SeriesManager,
    symbol::SymbolTable,
    value::{Binding, Value},
};

/// Where a resolved word's live storage cell lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSlot {
    Context { context: ContextId, index: usize },
    FrameArgs { frame: usize, index: usize },
}

/// `get_var` (§4.5). `frames` is the live frame stack, topmost last, exactly
/// as `Evaluator` keeps it. `for_write` additionally checks the `locked-word`
/// precondition for specific bindings.
pub fn resolve_var<R: ResourceTracker>(
    word: &Value,
    frames: &[Frame],
    series: &SeriesManager<R>,
    store: &ContextStore,
    symbols: &SymbolTable,
    for_write: bool,
) -> Result<VarSlot> {
    let Some((symbol, _, binding)) = word.as_word() else {
        return Err(RunError::internal("resolve_var called on a non-word cell"));
    };
    match binding {
        Binding::Unbound => Err(not_bound_error(symbols, symbol)),
        Binding::Specific { context, index } => {
            if for_write {
                let record = store.get(context);
                if let Value::Typeset { flags, .. } = series.array(record.keylist)[index as usize]
                    && flags.contains(crate::value::TypesetFlags::LOCKED)
                {
                    return Err(RunError::with_symbol(ErrorKind::LockedWord, symbol, symbols.text(symbol).to_owned()));
                }
            }
            Ok(VarSlot::Context { context, index: index as usize })
        }
        Binding::Relative { function, index } => {
            for (frame_index, frame) in frames.iter().enumerate().rev() {
                if let FrameMode::FunctionBody { function: frame_function } = frame.mode
                    && frame_function == function
                {
                    if (index as usize) >= frame.args.len() {
                        return Err(RunError::with_symbol(
                            ErrorKind::VarlessWord,
                            symbol,
                            symbols.text(symbol).to_owned(),
                        ));
                    }
                    return Ok(VarSlot::FrameArgs { frame: frame_index, index: index as usize });
                }
            }
            Err(RunError::with_symbol(ErrorKind::NoRelative, symbol, symbols.text(symbol).to_owned()))
        }
    }
}

/// Reads the value currently stored at `slot`.
#[must_use]
pub fn read_slot<R: ResourceTracker>(slot: VarSlot, frames: &[Frame], series: &SeriesManager<R>, store: &ContextStore) -> Value {
    match slot {
        VarSlot::Context { context, index } => series.array(store.get(context).varlist)[index],
        VarSlot::FrameArgs { frame, index } => frames[frame].args[index],
    }
}

/// Writes `value` into the storage cell named by `slot`.
pub fn write_slot<R: ResourceTracker>(
    slot: VarSlot,
    value: Value,
    frames: &mut [Frame],
    series: &mut SeriesManager<R>,
    store: &ContextStore,
) {
    match slot {
        VarSlot::Context { context, index } => series.array_mut(store.get(context).varlist)[index] = value,
        VarSlot::FrameArgs { frame, index } => frames[frame].args[index] = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::ContextKind,
        resource::NoLimitTracker,
        series::SeriesManager,
        symbol::SymbolTable,
        value::ValueKind,
    };

    #[test]
    fn unbound_word_fails_not_bound() {
        let series = SeriesManager::new(NoLimitTracker);
        let store = ContextStore::new();
        let symbols = SymbolTable::new();
        let word = Value::Word { symbol: crate::symbol::SYM_SELF, kind: ValueKind::Word, binding: Binding::Unbound };
        let err = resolve_var(&word, &[], &series, &store, &symbols, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotBound);
    }

    #[test]
    fn specific_binding_resolves_to_context_slot() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut store = ContextStore::new();
        let symbols = SymbolTable::new();
        let ctx = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        let word = Value::Word { symbol: crate::symbol::SYM_SELF, kind: ValueKind::Word, binding: Binding::Specific { context: ctx, index: 0 } };
        let slot = resolve_var(&word, &[], &series, &store, &symbols, false).unwrap();
        assert_eq!(slot, VarSlot::Context { context: ctx, index: 0 });
    }

    #[test]
    fn relative_binding_without_matching_frame_fails_no_relative() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut store = ContextStore::new();
        let symbols = SymbolTable::new();
        let paramlist = series.make_array(1).unwrap();
        let body = series.make_array(0).unwrap();
        let function = store.new_function(paramlist, crate::context::Dispatch::Body(body));
        let word = Value::Word { symbol: crate::symbol::SYM_SELF, kind: ValueKind::Word, binding: Binding::Relative { function, index: 1 } };
        let err = resolve_var(&word, &[], &series, &store, &symbols, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoRelative);
    }
}
