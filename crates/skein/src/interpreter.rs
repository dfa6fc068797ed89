//! The top-level session (`SPEC_FULL.md` §2, §5): bundles every arena this
//! crate defines plus the evaluator, registers the native vocabulary into a
//! session context, and owns the garbage-collection root walk.
//!
//! Grounded on `run.rs`'s `Runner`: a single public struct that is "the
//! primary interface" for running code, hiding the arena/namespace/heap
//! plumbing its `Executor` threads through. Unlike `Runner`, which re-parses
//! a fixed program once and runs it, `Interpreter` is built for a REPL-style
//! usage where more source text is scanned, bound, and evaluated against the
//! same live session context across many calls (`skein-repl`'s loop, one
//! `eval_str` per line).
use std::collections::HashSet;

use crate::{
    bind::{bind_values_core, BindFlags},
    collect::Collector,
    context::{ContextId, ContextStore, FunctionId, NativeOp},
    error::Result,
    eval::{new_native, Evaluator},
    frame::FrameMode,
    io::PrintWriter,
    resource::{NoLimitTracker, ResourceTracker},
    scan::scan,
    series::{SeriesId, SeriesManager},
    symbol::SymbolTable,
    throw::{EvalResult, Signal},
    value::{ContextKind, Value, ValueKind},
};

/// One row of the built-in vocabulary registered into every fresh session
/// (§4.6's native set). Textual names are this crate's own choice — the
/// comparison operators keep their symbolic spelling (`<`, `<=`, ...) since
/// `scan.rs`'s word lexer accepts them unchanged and a prefix-call dialect
/// reads more naturally as `< a b` than `lt a b`; see `DESIGN.md`.
const NATIVES: &[(&str, NativeOp, usize)] = &[
    ("add", NativeOp::Add, 2),
    ("subtract", NativeOp::Subtract, 2),
    ("multiply", NativeOp::Multiply, 2),
    ("divide", NativeOp::Divide, 2),
    ("<", NativeOp::Lt, 2),
    ("<=", NativeOp::Lte, 2),
    (">", NativeOp::Gt, 2),
    (">=", NativeOp::Gte, 2),
    ("=", NativeOp::Eq, 2),
    ("not", NativeOp::Not, 1),
    ("print", NativeOp::Print, 1),
    ("make", NativeOp::MakeObject, 2),
    ("func", NativeOp::Function, 2),
    ("parse", NativeOp::Parse, 2),
    ("return", NativeOp::Return, 1),
];

/// Datatype words bound to `Typeset` values in every fresh session, so
/// `PARSE`'s datatype/typeset operand matching (§4.8.2) has something to
/// dereference — `scan.rs` lexes `integer!` as a plain unbound word like any
/// other identifier; it is this table, not the scanner, that gives it
/// datatype-equality meaning (e.g. `copy pair [integer! string!]`, §8
/// scenario 4).
const DATATYPES: &[(&str, ValueKind)] = &[
    ("block!", ValueKind::Block),
    ("string!", ValueKind::String),
    ("integer!", ValueKind::Integer),
    ("word!", ValueKind::Word),
    ("decimal!", ValueKind::Decimal),
    ("char!", ValueKind::Char),
    ("logic!", ValueKind::Logic),
];

/// Bundles every arena and the frame-stack evaluator behind one handle.
/// Generic over [`ResourceTracker`] exactly like [`SeriesManager`] so a
/// sandboxed embedding can swap in a [`crate::LimitedTracker`] without this
/// struct's shape changing.
#[derive(Debug)]
pub struct Interpreter<R: ResourceTracker = NoLimitTracker> {
    series: SeriesManager<R>,
    store: ContextStore,
    symbols: SymbolTable,
    collector: Collector,
    evaluator: Evaluator,
    session: ContextId,
}

impl Interpreter<NoLimitTracker> {
    /// A session with no resource limits, for the REPL and for tests.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tracker(NoLimitTracker).expect("NoLimitTracker never rejects an allocation")
    }
}

impl Default for Interpreter<NoLimitTracker> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ResourceTracker> Interpreter<R> {
    /// Builds a session under `tracker`, with a fresh, non-selfish session
    /// context populated with the native vocabulary (§4.6).
    pub fn with_tracker(tracker: R) -> Result<Self> {
        let mut series = SeriesManager::new(tracker);
        let mut store = ContextStore::new();
        let mut symbols = SymbolTable::new();
        let session = store.new_context(&mut series, ContextKind::Object, false)?;

        for &(name, op, arity) in NATIVES {
            let function = new_native(&mut series, &mut store, op, arity)?;
            let symbol = symbols.intern(name);
            store.append(&mut series, session, symbol, Value::Function(function))?;
        }

        for &(name, kind) in DATATYPES {
            let symbol = symbols.intern(name);
            let mask = 1u64 << (kind as u64);
            let typeset = Value::Typeset { symbol, mask, flags: crate::value::TypesetFlags::empty() };
            store.append(&mut series, session, symbol, typeset)?;
        }

        Ok(Self { series, store, symbols, collector: Collector::new(), evaluator: Evaluator::new(), session })
    }

    #[must_use]
    pub fn session(&self) -> ContextId {
        self.session
    }

    #[must_use]
    pub fn series(&self) -> &SeriesManager<R> {
        &self.series
    }

    /// Mutable counterpart of [`Self::series`], for callers driving the
    /// lower-level arenas directly (e.g. property tests exercising
    /// `bind.rs`/`context.rs` round-trips against a live session).
    pub fn series_mut(&mut self) -> &mut SeriesManager<R> {
        &mut self.series
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Mutable counterpart of [`Self::store`]; see [`Self::series_mut`].
    pub fn store_mut(&mut self) -> &mut ContextStore {
        &mut self.store
    }

    /// Binds `array` against the session context (§4.4), for callers that
    /// hold a series built outside of [`Self::eval_str`] (e.g. a shallow
    /// copy taken to compare against the original after a bind/unbind
    /// round-trip).
    pub fn bind_against_session(&mut self, array: SeriesId, flags: BindFlags) -> Result<()> {
        bind_values_core(&mut self.collector, &mut self.series, &mut self.store, &mut self.symbols, array, self.session, flags)
    }

    #[must_use]
    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Scans `text`, binds its top-level words into the session context
    /// (growing the session with any word new to it, the same as a top-level
    /// REPL line in the source dialect declares a global the first time it is
    /// set), and evaluates it to completion.
    ///
    /// Deliberately *not* `BindFlags::DEEP`: a literal block nested in the
    /// input (e.g. `make`'s spec block) is inert data until the native that
    /// receives it binds it against whatever context it actually belongs to
    /// (`make_object`'s own `bind_values_core` call does exactly this). Binding
    /// it here too would leak its set-words into the session as a side effect
    /// of merely mentioning the block. One consequence: a top-level `GROUP`
    /// cell's words are not pre-bound, so `(x: 1)` used directly at this
    /// entry point is not yet supported — see `DESIGN.md`.
    pub fn eval_str(&mut self, writer: &mut impl PrintWriter, text: &str) -> EvalResult<Value> {
        let source = scan(&mut self.series, &mut self.symbols, text).map_err(Signal::from)?;
        bind_values_core(
            &mut self.collector,
            &mut self.series,
            &mut self.store,
            &mut self.symbols,
            source,
            self.session,
            BindFlags::ADD_NEW,
        )
        .map_err(Signal::from)?;
        self.evaluator.eval_block(&mut self.series, &mut self.store, &mut self.symbols, &mut self.collector, writer, source, self.session)
    }

    #[must_use]
    pub fn mold(&self, value: &Value) -> String {
        crate::mold::mold(&self.series, &self.symbols, value)
    }

    /// Runs the mark-and-sweep collector (§5: "the GC runs between
    /// evaluations") over every series reachable from the session context,
    /// any function bodies it can reach, and the (ordinarily empty, between
    /// top-level calls) live frame stack.
    pub fn collect_garbage(&mut self) {
        let roots = self.gather_roots();
        self.series.collect_garbage(roots);
    }

    /// Computes the full GC root set by walking outward from the session
    /// context through every `Context`/`Function` cell it can reach —
    /// `series.rs`'s own mark phase only follows a cell's `child_series`
    /// (arrays, strings, bitsets), so this crosses into `ContextStore` by
    /// hand before handing the final series set to
    /// [`SeriesManager::collect_garbage`] (per `context.rs`'s doc note on
    /// `ContextStore`).
    fn gather_roots(&self) -> Vec<SeriesId> {
        let mut series_seen: HashSet<SeriesId> = HashSet::new();
        let mut ctx_seen: HashSet<ContextId> = HashSet::new();
        let mut fn_seen: HashSet<FunctionId> = HashSet::new();

        let mut series_queue: Vec<SeriesId> = Vec::new();
        let mut ctx_queue: Vec<ContextId> = vec![self.session];
        let mut fn_queue: Vec<FunctionId> = Vec::new();

        for frame in self.evaluator.frames() {
            series_queue.push(frame.source);
            queue_value(&frame.output, &mut series_queue, &mut ctx_queue, &mut fn_queue);
            queue_value(&frame.spare, &mut series_queue, &mut ctx_queue, &mut fn_queue);
            for arg in &frame.args {
                queue_value(arg, &mut series_queue, &mut ctx_queue, &mut fn_queue);
            }
            if let FrameMode::Parse { input, .. } = frame.mode {
                series_queue.push(input);
            }
        }

        loop {
            let mut progressed = false;

            while let Some(ctx) = ctx_queue.pop() {
                if !ctx_seen.insert(ctx) {
                    continue;
                }
                progressed = true;
                let record = self.store.get(ctx);
                series_queue.push(record.varlist);
                series_queue.push(record.keylist);
            }

            while let Some(function) = fn_queue.pop() {
                if !fn_seen.insert(function) {
                    continue;
                }
                progressed = true;
                let (paramlist, dispatch) = self.store.function(function);
                series_queue.push(paramlist);
                if let crate::context::Dispatch::Body(body) = dispatch {
                    series_queue.push(body);
                }
            }

            while let Some(id) = series_queue.pop() {
                if !series_seen.insert(id) {
                    continue;
                }
                progressed = true;
                if self.series.is_array(id) {
                    for cell in self.series.array(id) {
                        queue_value(cell, &mut series_queue, &mut ctx_queue, &mut fn_queue);
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        series_seen.into_iter().collect()
    }
}

fn queue_value(value: &Value, series_queue: &mut Vec<SeriesId>, ctx_queue: &mut Vec<ContextId>, fn_queue: &mut Vec<FunctionId>) {
    if let Some(child) = value.child_series() {
        series_queue.push(child);
    }
    if let Some(ctx) = value.child_context() {
        ctx_queue.push(ctx);
    }
    if let Value::Function(function) = value {
        fn_queue.push(*function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_round_trips_through_eval_str() {
        let mut interp = Interpreter::new();
        let mut writer = crate::io::NoPrint;
        let result = interp.eval_str(&mut writer, "add 2 3").unwrap();
        assert_eq!(result, Value::Integer(5));
    }

    #[test]
    fn set_word_persists_across_eval_str_calls() {
        let mut interp = Interpreter::new();
        let mut writer = crate::io::NoPrint;
        interp.eval_str(&mut writer, "x: 10").unwrap();
        let result = interp.eval_str(&mut writer, "add x 5").unwrap();
        assert_eq!(result, Value::Integer(15));
    }

    #[test]
    fn make_object_scenario() {
        let mut interp = Interpreter::new();
        let mut writer = crate::io::NoPrint;
        let result = interp.eval_str(&mut writer, "make _ [a: 10 b: 20]").unwrap();
        let Value::Context { id, .. } = result else { panic!("expected a context") };
        let record = interp.store().get(id);
        assert_eq!(interp.series().len(record.varlist), 4); // root self-cell, hidden SELF key, a, b
    }

    #[test]
    fn user_function_return_escapes_only_to_its_own_call_frame() {
        let mut interp = Interpreter::new();
        let mut writer = crate::io::NoPrint;
        interp.eval_str(&mut writer, "double: func [n] [return add n n]").unwrap();
        let result = interp.eval_str(&mut writer, "add 1 double 3").unwrap();
        assert_eq!(result, Value::Integer(7));
    }

    #[test]
    fn garbage_collection_keeps_session_reachable_values() {
        let mut interp = Interpreter::new();
        let mut writer = crate::io::NoPrint;
        interp.eval_str(&mut writer, "x: make _ [a: 1]").unwrap();
        interp.collect_garbage();
        let result = interp.eval_str(&mut writer, "x").unwrap();
        assert!(matches!(result, Value::Context { .. }));
    }
}
