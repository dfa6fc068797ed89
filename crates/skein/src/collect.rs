//! Key-list collection (`SPEC_FULL.md` §3.6, §4.3): scanning a cell range for
//! words and building (or extending) a key-list from them.
//!
//! There is no single teacher file this grounds on one-to-one — the closest
//! analog is `namespace.rs`'s `Namespaces::new_namespace`, whose doc comment
//! about checking recursion depth *before* memory so a fail-fast path doesn't
//! waste a partially-built scope is the same fail-fast discipline applied
//! here to the bind-table. The scratch state itself (`BUF_COLLECT`, the
//! bind-table) is reframed per `SPEC_FULL.md` §3.6 as a `Collector` value
//! owned by the interpreter rather than a process-wide global, draining
//! itself on every exit path including early returns on error.

use ahash::AHashMap;

use crate::{
    context::{find_word_in_context, KeyList},
    error::{ErrorKind, Result, RunError},
    resource::ResourceTracker,
    series::SeriesManager,
    symbol::{Symbol, SymbolTable, SYM_0, SYM_SELF},
    value::{TypesetFlags, Value, TYPESET_ALL_BUT_VOID},
};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CollectFlags: u8 {
        /// Collect every word cell, not just `SET-WORD`s (used for function
        /// paramlists and `PARSE`'s `COPY`/`SET` target scanning).
        const ANY_WORD   = 1 << 0;
        /// Duplicate symbols are an error instead of being silently reused.
        const NO_DUP     = 1 << 1;
        /// Recurse into nested blocks.
        const DEEP       = 1 << 2;
        /// Ensure a hidden `SELF` key exists at the front of the result.
        const ENSURE_SELF = 1 << 3;
    }
}

/// Owns the bind-table and `BUF_COLLECT` scratch buffers (§3.6). A `&mut
/// Collector` is threaded through one collect/bind operation at a time;
/// [`Collector::drain`] restores both to empty on every exit path, matching
/// the bind-table-cleanliness invariant (§8 invariant 1).
#[derive(Debug, Default)]
pub struct Collector {
    bind_table: AHashMap<Symbol, i64>,
    buf: Vec<(Symbol, TypesetFlags)>,
}

impl Collector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.bind_table.is_empty() && self.buf.is_empty()
    }

    /// Restores the bind-table and `BUF_COLLECT` to empty. Called on every
    /// exit path of every public collect/bind operation (§8 invariant 1),
    /// including error returns.
    pub fn drain(&mut self) {
        self.bind_table.clear();
        self.buf.clear();
    }

    /// Shared bind-table access for `bind.rs`, which populates this same
    /// scratch table from a context's key-list instead of from `BUF_COLLECT`.
    pub(crate) fn bind_table(&self) -> &AHashMap<Symbol, i64> {
        &self.bind_table
    }

    pub(crate) fn bind_table_mut(&mut self) -> &mut AHashMap<Symbol, i64> {
        &mut self.bind_table
    }
}

/// Builds (or extends) a key-list from the words in `input`, implementing the
/// eight-step algorithm of §4.3. `prior` is the key-list to extend, if any.
/// Returns the final key-list series — `prior` itself, unchanged, when
/// nothing new was collected (step 7's no-allocation fast path).
pub fn collect_context<R: ResourceTracker>(
    collector: &mut Collector,
    series: &mut SeriesManager<R>,
    symbols: &mut SymbolTable,
    input: &[Value],
    prior: Option<KeyList>,
    flags: CollectFlags,
) -> Result<KeyList> {
    assert!(collector.is_drained(), "Collector::collect_context called with undrained scratch state (invariant 1)");

    let result = collect_context_inner(collector, series, symbols, input, prior, flags);
    collector.drain();
    result
}

fn collect_context_inner<R: ResourceTracker>(
    collector: &mut Collector,
    series: &mut SeriesManager<R>,
    symbols: &mut SymbolTable,
    input: &[Value],
    prior: Option<KeyList>,
    flags: CollectFlags,
) -> Result<KeyList> {
    // Step 2: root key at slot 0.
    collector.buf.push((SYM_0, TypesetFlags::empty()));

    // Step 3: ensure SELF, unless prior already carries it.
    let prior_has_self = prior.is_some_and(|p| find_word_in_context(series, symbols, p, SYM_SELF).is_some());
    if flags.contains(CollectFlags::ENSURE_SELF) && !prior_has_self {
        collector.buf.push((SYM_SELF, TypesetFlags::HIDDEN));
        collector.bind_table.insert(symbols.canon(SYM_SELF), (collector.buf.len() - 1) as i64);
    }

    // Step 4: bulk-copy prior's keys, no duplicate check.
    let prior_len = prior.map_or(0, |p| series.len(p));
    if let Some(prior) = prior {
        for cell in &series.array(prior)[1..] {
            let Value::Typeset { symbol, flags: key_flags, .. } = cell else {
                return Err(RunError::internal("prior key-list slot is not a typeset"));
            };
            collector.buf.push((*symbol, *key_flags));
            collector.bind_table.insert(symbols.canon(*symbol), (collector.buf.len() - 1) as i64);
        }
    }

    // Step 5: walk input, collecting eligible new words.
    walk_collect(collector, series, symbols, input, flags)?;

    // Step 7: decide whether a new key-list is needed. Nothing new was
    // collected iff `buf` ended up exactly as long as `prior` itself: the
    // root slot step 2 pushes plus the `prior_len - 1` real keys step 4
    // bulk-copied account for the whole of `prior_len`, with no further
    // growth from steps 3 or 5.
    let unchanged = prior.is_some() && collector.buf.len() == prior_len;
    if let (true, Some(prior)) = (unchanged, prior) {
        return Ok(prior);
    }

    let new_keylist = series.make_array(collector.buf.len()).map_err(RunError::from)?;
    let cells: Vec<Value> = collector
        .buf
        .iter()
        .map(|(symbol, key_flags)| Value::Typeset { symbol: *symbol, mask: TYPESET_ALL_BUT_VOID, flags: *key_flags })
        .collect();
    series.array_extend(new_keylist, cells).map_err(RunError::from)?;
    series.manage(new_keylist);
    Ok(new_keylist)
}

fn walk_collect<R: ResourceTracker>(
    collector: &mut Collector,
    series: &SeriesManager<R>,
    symbols: &mut SymbolTable,
    input: &[Value],
    flags: CollectFlags,
) -> Result<()> {
    for cell in input {
        let eligible = if flags.contains(CollectFlags::ANY_WORD) { cell.is_any_word() } else { cell.is_set_word() };
        if eligible {
            let (symbol, ..) = cell.as_word().expect("eligible cell is a word");
            let canon = symbols.canon(symbol);
            if collector.bind_table.contains_key(&canon) {
                if flags.contains(CollectFlags::NO_DUP) {
                    return Err(RunError::with_symbol(ErrorKind::DupVars, symbol, symbols.text(symbol).to_owned()));
                }
                continue;
            }
            collector.buf.push((symbol, TypesetFlags::empty()));
            collector.bind_table.insert(canon, (collector.buf.len() - 1) as i64);
        } else if flags.contains(CollectFlags::DEEP)
            && let Value::Block(pos) = cell
        {
            let nested: Vec<Value> = series.array(pos.series).to_vec();
            walk_collect(collector, series, symbols, &nested, flags)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resource::NoLimitTracker, value::ValueKind};

    fn make_set_word(symbols: &mut SymbolTable, text: &str) -> Value {
        Value::Word { symbol: symbols.intern(text), kind: ValueKind::SetWord, binding: crate::value::Binding::Unbound }
    }

    #[test]
    fn collects_set_words_in_order() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut symbols = SymbolTable::new();
        let mut collector = Collector::new();
        let input = vec![make_set_word(&mut symbols, "a"), Value::Integer(1), make_set_word(&mut symbols, "b"), Value::Integer(2)];
        let keylist =
            collect_context(&mut collector, &mut series, &mut symbols, &input, None, CollectFlags::empty()).unwrap();
        assert_eq!(series.len(keylist), 3); // root + a + b
        assert!(collector.is_drained());
    }

    #[test]
    fn no_dup_flag_rejects_repeated_word() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut symbols = SymbolTable::new();
        let mut collector = Collector::new();
        let input = vec![make_set_word(&mut symbols, "a"), make_set_word(&mut symbols, "a")];
        let err = collect_context(&mut collector, &mut series, &mut symbols, &input, None, CollectFlags::NO_DUP)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DupVars);
        assert!(collector.is_drained());
    }

    #[test]
    fn reuses_prior_keylist_when_nothing_new_collected() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut symbols = SymbolTable::new();
        let mut collector = Collector::new();
        let input = vec![make_set_word(&mut symbols, "a")];
        let prior =
            collect_context(&mut collector, &mut series, &mut symbols, &input, None, CollectFlags::empty()).unwrap();
        let same = collect_context(&mut collector, &mut series, &mut symbols, &input, Some(prior), CollectFlags::empty())
            .unwrap();
        assert_eq!(prior, same);
    }

    #[test]
    fn adding_exactly_one_new_key_still_builds_a_fresh_keylist() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut symbols = SymbolTable::new();
        let mut collector = Collector::new();
        let input_a = vec![make_set_word(&mut symbols, "a")];
        let prior =
            collect_context(&mut collector, &mut series, &mut symbols, &input_a, None, CollectFlags::empty()).unwrap();
        let input_ab = vec![make_set_word(&mut symbols, "a"), make_set_word(&mut symbols, "b")];
        let grown =
            collect_context(&mut collector, &mut series, &mut symbols, &input_ab, Some(prior), CollectFlags::empty())
                .unwrap();
        assert_ne!(prior, grown);
        assert_eq!(series.len(grown), 3); // root + a + b
    }

    #[test]
    fn deep_flag_recurses_into_nested_blocks() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let mut symbols = SymbolTable::new();
        let mut collector = Collector::new();
        let nested = series.make_array(0).unwrap();
        let nested_word = make_set_word(&mut symbols, "inner");
        series.array_extend(nested, [nested_word]).unwrap();
        let outer_word = make_set_word(&mut symbols, "outer");
        let sym_inner = symbols.intern("inner");
        let input = vec![outer_word, Value::Block(crate::value::SeriesPos { series: nested, index: 0 })];

        let keylist =
            collect_context(&mut collector, &mut series, &mut symbols, &input, None, CollectFlags::DEEP).unwrap();
        assert_eq!(series.len(keylist), 3); // root + outer + inner
        assert!(find_word_in_context(&series, &symbols, keylist, sym_inner).is_some());
    }
}
