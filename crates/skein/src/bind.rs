//! The binding engine (`SPEC_FULL.md` §4.4): rewriting word cells to
//! specific or relative bindings, and the inverse/rebind operations.
//!
//! Grounded on `namespace.rs` for the general shape (index-based scope
//! resolution, no pointer identity) and on `collect.rs`'s `Collector` for the
//! bind-table scratch it reuses here — binding and collecting share the same
//! "populate a symbol→index table, walk cells, drain the table" shape (§3.6),
//! so they share the same scratch type instead of each inventing their own.

use crate::{
    collect::Collector,
    context::{ContextId, ContextStore, FunctionId},
    error::{ErrorKind, Result, RunError},
    resource::ResourceTracker,
    series::{SeriesId, SeriesManager},
    symbol::{Symbol, SymbolTable},
    value::{Binding, Value},
};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindFlags: u8 {
        /// Recurse into nested `Block`/`Group` cells.
        const DEEP     = 1 << 0;
        /// Extend the context with new keys for words not already present.
        const ADD_NEW  = 1 << 1;
        /// Only rebind `SET-WORD` cells, leaving other word kinds alone.
        const SET_WORDS_ONLY = 1 << 2;
    }
}

fn populate_from_context<R: ResourceTracker>(
    collector: &mut Collector,
    series: &SeriesManager<R>,
    symbols: &SymbolTable,
    store: &ContextStore,
    ctx: ContextId,
) {
    let record = store.get(ctx);
    for (i, key) in series.array(record.keylist).iter().enumerate().skip(1) {
        if let Value::Typeset { symbol, flags, .. } = key {
            if flags.contains(crate::value::TypesetFlags::UNBINDABLE) {
                continue;
            }
            collector.bind_table_mut().insert(symbols.canon(*symbol), i as i64);
        }
    }
}

/// `bind_values_core` (§4.4): rewrite eligible word cells in `array` (and,
/// with [`BindFlags::DEEP`], in every nested block/group) to specific
/// bindings against `ctx`.
pub fn bind_values_core<R: ResourceTracker>(
    collector: &mut Collector,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    array: SeriesId,
    ctx: ContextId,
    flags: BindFlags,
) -> Result<()> {
    assert!(collector.is_drained(), "bind_values_core called with undrained bind-table (invariant 1)");
    populate_from_context(collector, series, symbols, store, ctx);
    let result = bind_array_recursive(collector, series, store, symbols, array, ctx, flags);
    collector.drain();
    result
}

fn bind_array_recursive<R: ResourceTracker>(
    collector: &mut Collector,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    array: SeriesId,
    ctx: ContextId,
    flags: BindFlags,
) -> Result<()> {
    let len = series.len(array);
    let mut children = Vec::new();
    for i in 0..len {
        let mut cell = series.array(array)[i];
        if let Some((symbol, kind, _)) = cell.as_word() {
            let eligible = !flags.contains(BindFlags::SET_WORDS_ONLY) || kind == crate::value::ValueKind::SetWord;
            if eligible {
                let canon = symbols.canon(symbol);
                if let Some(&index) = collector.bind_table().get(&canon) {
                    cell.set_binding(Binding::Specific { context: ctx, index: index as u32 });
                } else if flags.contains(BindFlags::ADD_NEW) {
                    let index = store.append(series, ctx, symbol, Value::Blank)?;
                    collector.bind_table_mut().insert(canon, index as i64);
                    cell.set_binding(Binding::Specific { context: ctx, index: index as u32 });
                }
            }
        }
        series.array_mut(array)[i] = cell;
        if flags.contains(BindFlags::DEEP)
            && let Some(child) = cell.child_series()
            && matches!(cell, Value::Block(_) | Value::Group(_) | Value::Path { .. })
        {
            children.push(child);
        }
    }
    for child in children {
        bind_array_recursive(collector, series, store, symbols, child, ctx, flags)?;
    }
    Ok(())
}

/// `unbind_values_core` (§4.4): clear specific bindings whose context is
/// `ctx` (or any binding at all, if `ctx` is `None`).
pub fn unbind_values_core<R: ResourceTracker>(
    series: &mut SeriesManager<R>,
    array: SeriesId,
    ctx: Option<ContextId>,
    deep: bool,
) {
    let len = series.len(array);
    let mut children = Vec::new();
    for i in 0..len {
        let mut cell = series.array(array)[i];
        if let Some((_, _, binding)) = cell.as_word() {
            let should_clear = match (binding, ctx) {
                (Binding::Specific { context, .. }, Some(target)) => context == target,
                (Binding::Specific { .. }, None) => true,
                (Binding::Relative { .. }, None) => true,
                _ => false,
            };
            if should_clear {
                cell.set_binding(Binding::Unbound);
                series.array_mut(array)[i] = cell;
            }
        }
        if deep
            && let Some(child) = cell.child_series()
            && matches!(cell, Value::Block(_) | Value::Group(_) | Value::Path { .. })
        {
            children.push(child);
        }
    }
    for child in children {
        unbind_values_core(series, child, ctx, deep);
    }
}

/// `bind_relative_deep` (§4.4): bind words in `body` relatively to
/// `function`'s paramlist, for use as a function's executable body.
pub fn bind_relative_deep<R: ResourceTracker>(
    collector: &mut Collector,
    series: &mut SeriesManager<R>,
    store: &ContextStore,
    symbols: &mut SymbolTable,
    body: SeriesId,
    function: FunctionId,
) -> Result<()> {
    assert!(collector.is_drained(), "bind_relative_deep called with undrained bind-table");
    let (paramlist, _) = store.function(function);
    for (i, key) in series.array(paramlist).iter().enumerate().skip(1) {
        if let Value::Typeset { symbol, .. } = key {
            collector.bind_table_mut().insert(symbols.canon(*symbol), i as i64);
        }
    }
    bind_relative_recursive(collector, series, symbols, body, function);
    collector.drain();
    Ok(())
}

fn bind_relative_recursive<R: ResourceTracker>(
    collector: &Collector,
    series: &mut SeriesManager<R>,
    symbols: &SymbolTable,
    array: SeriesId,
    function: FunctionId,
) {
    let len = series.len(array);
    let mut children = Vec::new();
    for i in 0..len {
        let mut cell = series.array(array)[i];
        if let Some((symbol, _, _)) = cell.as_word() {
            let canon = symbols.canon(symbol);
            if let Some(&index) = collector.bind_table().get(&canon) {
                cell.set_binding(Binding::Relative { function, index: index as u32 });
            }
        }
        series.array_mut(array)[i] = cell;
        if let Some(child) = cell.child_series()
            && matches!(cell, Value::Block(_) | Value::Group(_) | Value::Path { .. })
        {
            children.push(child);
        }
    }
    for child in children {
        bind_relative_recursive(collector, series, symbols, child, function);
    }
}

/// `rebind_values_deep` (§4.4): rewrite any word specifically bound to
/// `src_ctx` so it is instead bound to `dst_ctx`, optionally remapping the
/// index through `remap` (used when the copy's key-list reordered slots).
pub fn rebind_values_deep<R: ResourceTracker>(
    series: &mut SeriesManager<R>,
    array: SeriesId,
    src_ctx: ContextId,
    dst_ctx: ContextId,
    remap: Option<&dyn Fn(u32) -> u32>,
) {
    let len = series.len(array);
    let mut children = Vec::new();
    for i in 0..len {
        let mut cell = series.array(array)[i];
        if let Some((_, _, Binding::Specific { context, index })) = cell.as_word()
            && context == src_ctx
        {
            let new_index = remap.map_or(index, |f| f(index));
            cell.set_binding(Binding::Specific { context: dst_ctx, index: new_index });
            series.array_mut(array)[i] = cell;
        }
        if let Some(child) = cell.child_series()
            && matches!(cell, Value::Block(_) | Value::Group(_) | Value::Path { .. })
        {
            children.push(child);
        }
    }
    for child in children {
        rebind_values_deep(series, child, src_ctx, dst_ctx, remap);
    }
}

/// Raised by `lookup.rs` when a word carries no binding at all.
pub fn not_bound_error(symbols: &SymbolTable, symbol: Symbol) -> RunError {
    RunError::with_symbol(ErrorKind::NotBound, symbol, symbols.text(symbol).to_owned())
}
