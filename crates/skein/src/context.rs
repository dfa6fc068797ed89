//! Contexts and key-lists (`SPEC_FULL.md` §3.4, §3.5, §4.2, §4.7).
//!
//! Grounded on `namespace.rs`'s `Namespace`/`Namespaces`: an index-based,
//! not pointer-based, representation (the teacher's own comment on why it
//! avoids raw pointers applies here too), a small `Id` newtype, and an
//! explicit store the interpreter owns rather than `Rc<RefCell<_>>` handles
//! scattered through values. Unlike `Namespace` (a flat `Vec<Value>` with no
//! key-list, since Python scopes are resolved by the compiler ahead of time),
//! a context here pairs that var-list with a key-list series, because words
//! in this dialect carry their own runtime binding (§4.4) instead of being
//! pre-resolved to slot indices by a separate compile pass.

use ahash::AHashMap;

use crate::{
    error::{Result, RunError},
    resource::ResourceTracker,
    series::SeriesId,
    symbol::{Symbol, SymbolTable, SYM_0, SYM_SELF},
    value::{ContextKind, TypesetFlags, Value},
};

/// Index into the context arena (§3.4). Arena-and-index, matching
/// `NamespaceId`: contexts may reference each other cyclically (a parent
/// pointer, a method closing over its defining object) and indices make that
/// unremarkable, unlike pointer identity under a moving/compacting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

/// Index into the function arena (§3.5). A function's paramlist is
/// structurally a key-list; relative word bindings (§4.4) target
/// `(FunctionId, index)` directly rather than a full context, since a
/// function has no var-list of its own until a frame is pushed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

/// A key-list series: an array of `Value::Typeset` cells, slot 0 always the
/// root key (`SYM_0`). Plain alias, not a newtype, since every operation that
/// needs "this is specifically a key-list" already has a [`SeriesId`] in hand
/// from a [`ContextRecord`] or [`FunctionRecord`].
pub type KeyList = SeriesId;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContextFlags: u8 {
        /// Context carries a hidden `SELF` key (§3.4).
        const SELFISH = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy)]
struct ContextRecord {
    varlist: SeriesId,
    keylist: KeyList,
    kind: ContextKind,
    flags: ContextFlags,
}

/// A function value's "dispatcher class" (§3.3, §3.5): either an
/// interpreted body (an array bound relatively against the function's
/// paramlist, run by `eval.rs` in `FrameMode::FunctionBody`) or a builtin
/// implemented directly in Rust, tagged by [`NativeOp`] so that `context.rs`
/// never has to depend on `eval.rs`'s evaluator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Body(SeriesId),
    Native(NativeOp),
}

/// Builtin operations `eval.rs` knows how to perform directly, without an
/// interpreted body. Kept as a closed tag rather than a function pointer so
/// [`FunctionRecord`] stays `Copy` and free of lifetime/generic parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter)]
pub enum NativeOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Not,
    Print,
    MakeObject,
    /// Builds a user-defined `Dispatch::Body` function from a spec block of
    /// parameter words and a body block (§3.5, §4.4's `bind_relative_deep`).
    Function,
    Parse,
    /// Throws `parse-return`'s value out to the nearest `PARSE` call (§4.8.5).
    /// Not part of the original arithmetic/comparison set; `return` is bound
    /// into `parse.rs`'s scratch evaluation context so a bare `(return expr)`
    /// group inside a rule block behaves like the dialect's `RETURN (expr)`
    /// command without `parse.rs` needing its own keyword for it.
    Return,
}

#[derive(Debug, Clone, Copy)]
struct FunctionRecord {
    paramlist: KeyList,
    dispatch: Dispatch,
}

/// `only_words` argument to [`ContextStore::resolve`] (§4.7): restricts which
/// keys participate in the merge beyond the plain "present in target"/`all`/
/// `expand` rules.
#[derive(Debug, Clone)]
pub enum OnlyWords {
    /// No restriction.
    Any,
    /// Only touch target keys at or above this 0-based varlist index.
    IndexFloor(usize),
    /// Only touch source keys whose symbol (canon-compared) appears here.
    Named(Vec<Symbol>),
}

/// Read-only snapshot of a context's shape, returned by [`ContextStore::get`].
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub varlist: SeriesId,
    pub keylist: KeyList,
    pub kind: ContextKind,
    pub flags: ContextFlags,
}

/// Owns every context and function record. Like [`crate::series::SeriesManager`]
/// this is an append-only arena: the lightweight `(varlist, keylist)` /
/// `(paramlist, body)` pairs are cheap enough that only their backing series
/// need to participate in the mark-and-sweep collector (`Interpreter`'s GC
/// root walk follows `Value::Context`/`Value::Function` cells into here to
/// find those series, per `series.rs`'s `child_context` hook).
#[derive(Debug, Default)]
pub struct ContextStore {
    contexts: Vec<ContextRecord>,
    functions: Vec<FunctionRecord>,
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_context(&mut self, record: ContextRecord) -> ContextId {
        let id = ContextId(u32::try_from(self.contexts.len()).expect("context arena exceeded u32::MAX entries"));
        self.contexts.push(record);
        id
    }

    #[must_use]
    pub fn get(&self, id: ContextId) -> Context {
        let record = &self.contexts[id.0 as usize];
        Context { varlist: record.varlist, keylist: record.keylist, kind: record.kind, flags: record.flags }
    }

    #[must_use]
    pub fn function(&self, id: FunctionId) -> (KeyList, Dispatch) {
        let record = &self.functions[id.0 as usize];
        (record.paramlist, record.dispatch)
    }

    pub fn new_function(&mut self, paramlist: KeyList, dispatch: Dispatch) -> FunctionId {
        let id = FunctionId(u32::try_from(self.functions.len()).expect("function arena exceeded u32::MAX entries"));
        self.functions.push(FunctionRecord { paramlist, dispatch });
        id
    }

    /// Builds a fresh context whose var-list and key-list already contain
    /// `SELF` at slot 1 (when `selfish`) with no further keys. Collection of
    /// additional keys is performed separately by `collect.rs`'s
    /// `collect_context`, which can target either a brand-new context
    /// (created here) or an existing one.
    pub fn new_context<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        kind: ContextKind,
        selfish: bool,
    ) -> Result<ContextId> {
        let varlist = series.make_array(if selfish { 2 } else { 1 }).map_err(RunError::from)?;
        let keylist = series.make_array(if selfish { 2 } else { 1 }).map_err(RunError::from)?;
        // slot 0: root key / self-referring varlist cell, filled in below once we know the id.
        series.array_push(keylist, root_key()).map_err(RunError::from)?;
        series.array_push(varlist, Value::Blank).map_err(RunError::from)?;
        if selfish {
            series
                .array_push(keylist, Value::Typeset { symbol: SYM_SELF, mask: u64::MAX, flags: TypesetFlags::HIDDEN })
                .map_err(RunError::from)?;
            series.array_push(varlist, Value::Blank).map_err(RunError::from)?;
        }
        series.manage(varlist);
        series.manage(keylist);
        let flags = if selfish { ContextFlags::SELFISH } else { ContextFlags::empty() };
        let id = self.push_context(ContextRecord { varlist, keylist, kind, flags });
        let self_cell = Value::Context { kind, id };
        series.array_mut(varlist)[0] = self_cell;
        if selfish {
            series.array_mut(varlist)[1] = self_cell;
        }
        Ok(id)
    }

    /// Builds a context around a key-list already produced by
    /// `collect.rs`'s `collect_context` (§4.3 step 6: "allocate a var-list
    /// matching the final key-list's length"). When `parent` is given, a key
    /// shared with the parent's own key-list carries its value across by
    /// symbol lookup rather than by raw index — `collect_context`'s `ENSURE_SELF`
    /// step can shift every subsequent slot by one relative to a non-selfish
    /// parent's var-list, so index alignment can't be assumed. Slots with no
    /// symbol match in `parent` (including every slot when `parent` is
    /// `None`) start out `Blank`.
    pub fn context_from_collected_keylist<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        symbols: &SymbolTable,
        kind: ContextKind,
        keylist: KeyList,
        parent: Option<ContextId>,
    ) -> Result<ContextId> {
        let len = series.len(keylist);
        let mut values = vec![Value::Blank; len];
        if let Some(parent) = parent {
            let parent_record = self.contexts[parent.0 as usize];
            if parent_record.keylist == keylist {
                series.set_keylist_shared(keylist, true);
            }
            let keys: Vec<Value> = series.array(keylist).to_vec();
            for (i, key) in keys.iter().enumerate() {
                if let Value::Typeset { symbol, .. } = key
                    && let Some((p_index, _)) = find_key_index(series, symbols, parent_record.keylist, *symbol)
                {
                    values[i] = series.array(parent_record.varlist)[p_index];
                }
            }
        }
        let new_varlist = series.make_array(len).map_err(RunError::from)?;
        series.array_extend(new_varlist, values).map_err(RunError::from)?;
        series.manage(new_varlist);

        let selfish = find_self_index(series.array(keylist)).is_some();
        let flags = if selfish { ContextFlags::SELFISH } else { ContextFlags::empty() };
        let id = self.push_context(ContextRecord { varlist: new_varlist, keylist, kind, flags });
        let self_cell = Value::Context { kind, id };
        series.array_mut(new_varlist)[0] = self_cell;
        if let Some(self_index) = find_self_index(series.array(keylist)) {
            series.array_mut(new_varlist)[self_index] = self_cell;
        }
        Ok(id)
    }

    /// `copy_shallow` (§4.7): duplicate varlist cells. Shares the key-list
    /// when `extra == 0`, else deep-copies it with `extra` spare slots.
    pub fn copy_shallow<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        src: ContextId,
        extra: usize,
    ) -> Result<ContextId> {
        let record = self.contexts[src.0 as usize];
        let new_varlist = series.copy_array_shallow(record.varlist, extra).map_err(RunError::from)?;
        let new_keylist = if extra == 0 {
            series.set_keylist_shared(record.keylist, true);
            record.keylist
        } else {
            series.copy_array_shallow(record.keylist, extra).map_err(RunError::from)?
        };
        series.manage(new_varlist);
        series.manage(new_keylist);
        let id = self.push_context(ContextRecord { varlist: new_varlist, keylist: new_keylist, kind: record.kind, flags: record.flags });
        let self_cell = Value::Context { kind: record.kind, id };
        series.array_mut(new_varlist)[0] = self_cell;
        if record.flags.contains(ContextFlags::SELFISH)
            && let Some(self_index) = find_self_index(series.array(new_keylist))
        {
            series.array_mut(new_varlist)[self_index] = self_cell;
        }
        Ok(id)
    }

    /// `expand_context` (§4.2): grow the var-list in place; copy-on-write the
    /// key-list if it is shared.
    pub fn expand<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        ctx: ContextId,
        extra: usize,
    ) -> Result<()> {
        let record = self.contexts[ctx.0 as usize];
        series.array_extend(record.varlist, std::iter::repeat_n(Value::Blank, extra)).map_err(RunError::from)?;
        if series.is_keylist_shared(record.keylist) {
            let new_keylist = series.copy_array_shallow(record.keylist, extra).map_err(RunError::from)?;
            series.manage(new_keylist);
            series.set_keylist_shared(record.keylist, false); // the copy we took is now independent of the original sharer
            self.contexts[ctx.0 as usize].keylist = new_keylist;
        } else {
            series.array_extend(record.keylist, std::iter::repeat_n(root_key(), extra)).map_err(RunError::from)?;
        }
        Ok(())
    }

    /// Appends one key+value pair, expanding by one slot first. Returns the
    /// 1-based index of the new slot.
    pub fn append<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        ctx: ContextId,
        symbol: Symbol,
        value: Value,
    ) -> Result<usize> {
        self.expand(series, ctx, 1)?;
        let record = self.contexts[ctx.0 as usize];
        let index = series.len(record.varlist) - 1;
        series.array_mut(record.varlist)[index] = value;
        series.array_mut(record.keylist)[index] =
            Value::Typeset { symbol, mask: crate::value::TYPESET_ALL_BUT_VOID, flags: TypesetFlags::empty() };
        Ok(index)
    }

    /// `resolve` (§4.7): for each key in `source` present in `target` (or, if
    /// `expand`, absent and appended), copy the value across unless the
    /// target key is locked or (without `all`) already set to a non-blank
    /// value. `only_words` narrows the candidate keys further, per
    /// [`OnlyWords`].
    pub fn resolve<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        symbols: &SymbolTable,
        target: ContextId,
        source: ContextId,
        only_words: &OnlyWords,
        all: bool,
        expand: bool,
    ) -> Result<()> {
        let source_record = self.contexts[source.0 as usize];
        let pairs: Vec<(Symbol, Value, TypesetFlags)> = series
            .array(source_record.keylist)
            .iter()
            .zip(series.array(source_record.varlist).iter())
            .skip(1)
            .filter_map(|(key, val)| match key {
                Value::Typeset { symbol, flags, .. } => Some((*symbol, *val, *flags)),
                _ => None,
            })
            .collect();

        for (symbol, value, src_flags) in pairs {
            if src_flags.contains(TypesetFlags::HIDDEN) {
                continue;
            }
            if let OnlyWords::Named(allowed) = only_words
                && !allowed.iter().any(|&w| symbols.canon_eq(w, symbol))
            {
                continue;
            }
            let target_record = self.contexts[target.0 as usize];
            let found = find_key_index(series, symbols, target_record.keylist, symbol);
            match found {
                Some((index, flags)) => {
                    if let OnlyWords::IndexFloor(floor) = only_words
                        && index < *floor
                    {
                        continue;
                    }
                    if flags.contains(TypesetFlags::LOCKED) {
                        continue;
                    }
                    let current_is_blank = matches!(series.array(target_record.varlist)[index], Value::Blank);
                    if all || current_is_blank {
                        series.array_mut(target_record.varlist)[index] = value;
                    }
                }
                None if expand => {
                    self.append(series, target, symbol, value)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// `merge_selfish` (§4.7): collect `a`'s keys then `b`'s — a symbol seen
    /// in both keeps its slot from `a` but takes `b`'s flags/value, matching
    /// `collect.rs`'s "last spec wins" treatment of a repeated set-word
    /// rather than erroring on the duplicate. Builds a fresh selfish context
    /// holding the merged values, deep-copies clonable ones so the merge
    /// doesn't alias either source's series, and rebinds every word
    /// specifically bound to `a` or `b` onto the merged context.
    pub fn merge_selfish<R: ResourceTracker>(
        &mut self,
        series: &mut crate::series::SeriesManager<R>,
        symbols: &SymbolTable,
        a: ContextId,
        b: ContextId,
    ) -> Result<ContextId> {
        let record_a = self.contexts[a.0 as usize];
        let record_b = self.contexts[b.0 as usize];

        let collect_keys = |series: &crate::series::SeriesManager<R>, record: ContextRecord| -> Vec<(Symbol, TypesetFlags, Value)> {
            series
                .array(record.keylist)
                .iter()
                .zip(series.array(record.varlist).iter())
                .skip(1)
                .filter_map(|(key, val)| match key {
                    Value::Typeset { symbol, flags, .. } if *symbol != SYM_SELF => Some((*symbol, *flags, *val)),
                    _ => None,
                })
                .collect()
        };
        let a_keys = collect_keys(series, record_a);
        let b_keys = collect_keys(series, record_b);

        let mut order: Vec<Symbol> = Vec::new();
        let mut by_canon: AHashMap<Symbol, (TypesetFlags, Value)> = AHashMap::new();
        for &(symbol, flags, value) in &a_keys {
            let canon = symbols.canon(symbol);
            if by_canon.insert(canon, (flags, value)).is_none() {
                order.push(symbol);
            }
        }
        for &(symbol, flags, value) in &b_keys {
            let canon = symbols.canon(symbol);
            by_canon.insert(canon, (flags, value));
            if !order.iter().any(|&s| symbols.canon_eq(s, symbol)) {
                order.push(symbol);
            }
        }

        let new_ctx = self.new_context(series, record_b.kind, true)?;
        let mut new_index_of: AHashMap<Symbol, usize> = AHashMap::new();
        for symbol in order {
            let canon = symbols.canon(symbol);
            let (flags, value) = by_canon[&canon];
            let cloned = clone_if_clonable(series, value)?;
            let index = self.append(series, new_ctx, symbol, cloned)?;
            if !flags.is_empty() {
                let record = self.contexts[new_ctx.0 as usize];
                series.array_mut(record.keylist)[index] = Value::Typeset { symbol, mask: crate::value::TYPESET_ALL_BUT_VOID, flags };
            }
            new_index_of.insert(canon, index);
        }

        let remap_table = |keylist: KeyList, series: &crate::series::SeriesManager<R>| -> Vec<u32> {
            series
                .array(keylist)
                .iter()
                .map(|key| match key {
                    Value::Typeset { symbol, .. } => {
                        let canon = symbols.canon(*symbol);
                        new_index_of.get(&canon).map_or(0, |&index| u32::try_from(index).expect("context index fits u32"))
                    }
                    _ => 0,
                })
                .collect()
        };
        let remap_a = remap_table(record_a.keylist, series);
        let remap_b = remap_table(record_b.keylist, series);

        let record_new = self.contexts[new_ctx.0 as usize];
        crate::bind::rebind_values_deep(series, record_new.varlist, a, new_ctx, Some(&|i: u32| {
            remap_a.get(i as usize).copied().unwrap_or(i)
        }));
        crate::bind::rebind_values_deep(series, record_new.varlist, b, new_ctx, Some(&|i: u32| {
            remap_b.get(i as usize).copied().unwrap_or(i)
        }));

        Ok(new_ctx)
    }
}

/// The merge's "deep-copy values marked clonable" step (§4.7): series-backed
/// kinds get their own top-level series rather than aliasing the source's,
/// matching `copy_shallow`'s duplicate-the-cells treatment per value instead
/// of a fully recursive deep copy (nested aliasing within a single value is
/// the dialect's own `COPY/DEEP`'s job, not the merge's).
fn clone_if_clonable<R: ResourceTracker>(series: &mut crate::series::SeriesManager<R>, value: Value) -> Result<Value> {
    Ok(match value {
        Value::Block(pos) => {
            let copy = series.copy_array_shallow(pos.series, 0).map_err(RunError::from)?;
            series.manage(copy);
            Value::Block(crate::value::SeriesPos { series: copy, ..pos })
        }
        Value::Group(pos) => {
            let copy = series.copy_array_shallow(pos.series, 0).map_err(RunError::from)?;
            series.manage(copy);
            Value::Group(crate::value::SeriesPos { series: copy, ..pos })
        }
        Value::String(pos) => {
            let bytes = series.bytes(pos.series).to_vec();
            let copy = series.make_bytes(bytes.len()).map_err(RunError::from)?;
            series.bytes_mut(copy).extend_from_slice(&bytes);
            series.manage(copy);
            Value::String(crate::value::SeriesPos { series: copy, ..pos })
        }
        Value::Binary(pos) => {
            let bytes = series.bytes(pos.series).to_vec();
            let copy = series.make_bytes(bytes.len()).map_err(RunError::from)?;
            series.bytes_mut(copy).extend_from_slice(&bytes);
            series.manage(copy);
            Value::Binary(crate::value::SeriesPos { series: copy, ..pos })
        }
        other => other,
    })
}

fn root_key() -> Value {
    Value::Typeset { symbol: SYM_0, mask: 0, flags: TypesetFlags::empty() }
}

fn find_self_index(keylist: &[Value]) -> Option<usize> {
    keylist.iter().position(|v| matches!(v, Value::Typeset { symbol, .. } if *symbol == SYM_SELF))
}

fn find_key_index<R: ResourceTracker>(
    series: &crate::series::SeriesManager<R>,
    symbols: &SymbolTable,
    keylist: KeyList,
    symbol: Symbol,
) -> Option<(usize, TypesetFlags)> {
    series.array(keylist).iter().enumerate().find_map(|(i, v)| match v {
        Value::Typeset { symbol: key_symbol, flags, .. } if symbols.canon_eq(*key_symbol, symbol) => Some((i, *flags)),
        _ => None,
    })
}

/// Used by the binder (`bind.rs`) and lookup (`lookup.rs`) to map a symbol to
/// its slot index in a key-list without duplicating the scan logic above.
pub fn find_word_in_context<R: ResourceTracker>(
    series: &crate::series::SeriesManager<R>,
    symbols: &SymbolTable,
    keylist: KeyList,
    symbol: Symbol,
) -> Option<usize> {
    find_key_index(series, symbols, keylist, symbol).map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resource::NoLimitTracker, series::SeriesManager};

    fn harness() -> (SeriesManager<NoLimitTracker>, SymbolTable, ContextStore) {
        (SeriesManager::new(NoLimitTracker), SymbolTable::new(), ContextStore::new())
    }

    #[test]
    fn new_selfish_context_has_self_pointing_at_itself() {
        let (mut series, _symbols, mut store) = harness();
        let id = store.new_context(&mut series, ContextKind::Object, true).unwrap();
        let ctx = store.get(id);
        assert!(matches!(series.array(ctx.varlist)[0], Value::Context { id: self_id, .. } if self_id == id));
        assert!(matches!(series.array(ctx.varlist)[1], Value::Context { id: self_id, .. } if self_id == id));
    }

    #[test]
    fn append_grows_both_lists_in_lockstep() {
        let (mut series, _symbols, mut store) = harness();
        let id = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        let mut symbols = SymbolTable::new();
        let sym_a = symbols.intern("a");
        store.append(&mut series, id, sym_a, Value::Integer(10)).unwrap();
        let ctx = store.get(id);
        assert_eq!(series.len(ctx.varlist), series.len(ctx.keylist));
        assert_eq!(series.array(ctx.varlist)[1], Value::Integer(10));
    }

    #[test]
    fn copy_shallow_shares_keylist_when_no_extra_slots() {
        let (mut series, _symbols, mut store) = harness();
        let id = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        let copy_id = store.copy_shallow(&mut series, id, 0).unwrap();
        assert_eq!(store.get(id).keylist, store.get(copy_id).keylist);
    }

    #[test]
    fn resolve_only_copies_blank_targets_unless_all() {
        let (mut series, mut symbols, mut store) = harness();
        let sym_x = symbols.intern("x");
        let target = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        store.append(&mut series, target, sym_x, Value::Blank).unwrap();
        let source = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        store.append(&mut series, source, sym_x, Value::Integer(5)).unwrap();

        store.resolve(&mut series, &symbols, target, source, &OnlyWords::Any, false, false).unwrap();
        assert_eq!(series.array(store.get(target).varlist)[1], Value::Integer(5));
    }

    #[test]
    fn resolve_named_only_words_skips_unlisted_symbols() {
        let (mut series, mut symbols, mut store) = harness();
        let sym_x = symbols.intern("x");
        let sym_y = symbols.intern("y");
        let target = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        store.append(&mut series, target, sym_x, Value::Blank).unwrap();
        store.append(&mut series, target, sym_y, Value::Blank).unwrap();
        let source = store.new_context(&mut series, ContextKind::Object, false).unwrap();
        store.append(&mut series, source, sym_x, Value::Integer(1)).unwrap();
        store.append(&mut series, source, sym_y, Value::Integer(2)).unwrap();

        store.resolve(&mut series, &symbols, target, source, &OnlyWords::Named(vec![sym_y]), true, false).unwrap();
        let ctx = store.get(target);
        assert_eq!(series.array(ctx.varlist)[1], Value::Blank);
        assert_eq!(series.array(ctx.varlist)[2], Value::Integer(2));
    }

    #[test]
    fn merge_selfish_lets_b_overwrite_a_and_adds_bs_new_keys() {
        let (mut series, mut symbols, mut store) = harness();
        let sym_x = symbols.intern("x");
        let sym_y = symbols.intern("y");
        let a = store.new_context(&mut series, ContextKind::Object, true).unwrap();
        store.append(&mut series, a, sym_x, Value::Integer(1)).unwrap();
        let b = store.new_context(&mut series, ContextKind::Object, true).unwrap();
        store.append(&mut series, b, sym_x, Value::Integer(2)).unwrap();
        store.append(&mut series, b, sym_y, Value::Integer(3)).unwrap();

        let merged = store.merge_selfish(&mut series, &symbols, a, b).unwrap();
        let ctx = store.get(merged);
        assert!(ctx.flags.contains(ContextFlags::SELFISH));
        let x_index = find_word_in_context(&series, &symbols, ctx.keylist, sym_x).unwrap();
        let y_index = find_word_in_context(&series, &symbols, ctx.keylist, sym_y).unwrap();
        assert_eq!(series.array(ctx.varlist)[x_index], Value::Integer(2));
        assert_eq!(series.array(ctx.varlist)[y_index], Value::Integer(3));
    }

    #[test]
    fn merge_selfish_deep_copies_clonable_values() {
        let (mut series, mut symbols, mut store) = harness();
        let sym_blk = symbols.intern("blk");
        let inner = series.make_array(0).unwrap();
        series.array_extend(inner, [Value::Integer(1)]).unwrap();
        series.manage(inner);
        let a = store.new_context(&mut series, ContextKind::Object, true).unwrap();
        store.append(&mut series, a, sym_blk, Value::Block(crate::value::SeriesPos { series: inner, index: 0 })).unwrap();
        let b = store.new_context(&mut series, ContextKind::Object, true).unwrap();

        let merged = store.merge_selfish(&mut series, &symbols, a, b).unwrap();
        let ctx = store.get(merged);
        let index = find_word_in_context(&series, &symbols, ctx.keylist, sym_blk).unwrap();
        let Value::Block(pos) = series.array(ctx.varlist)[index] else { panic!("expected a block") };
        assert_ne!(pos.series, inner, "merge must not alias the source's block series");

        series.array_mut(inner)[0] = Value::Integer(99);
        assert_eq!(series.array(pos.series), &[Value::Integer(1)]);
    }

    #[test]
    fn merge_selfish_rebinds_words_from_either_source_onto_the_merged_context() {
        let (mut series, mut symbols, mut store) = harness();
        let sym_x = symbols.intern("x");
        let a = store.new_context(&mut series, ContextKind::Object, true).unwrap();
        let x_index_in_a = store.append(&mut series, a, sym_x, Value::Integer(7)).unwrap();
        let b = store.new_context(&mut series, ContextKind::Object, true).unwrap();

        let body = series.make_array(0).unwrap();
        let word_to_a = Value::Word {
            symbol: sym_x,
            kind: crate::value::ValueKind::Word,
            binding: crate::value::Binding::Specific { context: a, index: u32::try_from(x_index_in_a).unwrap() },
        };
        series.array_extend(body, [word_to_a]).unwrap();
        series.manage(body);
        let sym_grabbed = symbols.intern("grabbed");
        store.append(&mut series, a, sym_grabbed, Value::Block(crate::value::SeriesPos { series: body, index: 0 })).unwrap();

        let merged = store.merge_selfish(&mut series, &symbols, a, b).unwrap();
        let ctx = store.get(merged);
        let grabbed_index = find_word_in_context(&series, &symbols, ctx.keylist, sym_grabbed).unwrap();
        let Value::Block(grabbed_pos) = series.array(ctx.varlist)[grabbed_index] else { panic!("expected a block") };
        let rebound = series.array(grabbed_pos.series)[0];
        assert!(matches!(rebound.binding(), Some(crate::value::Binding::Specific { context, .. }) if context == merged));
    }
}
