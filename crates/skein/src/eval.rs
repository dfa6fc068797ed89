//! The main evaluator (`SPEC_FULL.md` §4.6): walks an array frame by frame,
//! dispatching on cell kind, pushing frames for function calls and `GROUP`
//! evaluation.
//!
//! Grounded on `namespace.rs`'s discipline of threading stack state through
//! an owned struct rather than a global (`FS_TOP` becomes `Evaluator::frames`,
//! §3.7), and on the teacher's habit of a recursive tree-walking interpreter
//! (no bytecode compile pass) for the actual dispatch loop — §9 notes this is
//! the straightforward, not-required-to-avoid translation, so that is the one
//! this crate takes. Every public entry point threads the same wide parameter
//! list (`series`, `store`, `symbols`, `collector`, plus a writer where output
//! is possible) that every other module in this crate already uses instead of
//! bundling them into `self`; `Evaluator` itself owns only the frame stack.

use crate::{
    context::{ContextId, ContextStore, Dispatch, FunctionId, NativeOp},
    error::{ErrorKind, RunError},
    frame::{Frame, FrameMode},
    io::PrintWriter,
    lookup::{read_slot, resolve_var, write_slot},
    resource::ResourceTracker,
    series::{SeriesId, SeriesManager},
    symbol::SymbolTable,
    throw::{EvalResult, Signal, ThrowLabel},
    value::{Binding, SeriesPos, Value, ValueKind},
};

/// Owns the frame stack (§3.7's `FS_TOP`, reframed as a field rather than a
/// global). Stateless beyond that: every method takes the series/context/
/// symbol state it needs explicitly, matching `bind.rs`/`lookup.rs`'s shape.
#[derive(Debug, Default)]
pub struct Evaluator {
    frames: Vec<Frame>,
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Exposed for `parse.rs`'s `word:`/`:word` position markers, which need
    /// to write through [`crate::lookup::write_slot`] the same way a `SET-WORD`
    /// does in ordinary evaluation.
    pub(crate) fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Exposed for `parse.rs`, which pushes its own `FrameMode::Parse` frames
    /// to share this evaluator's recursion-depth gate and GC root walk
    /// instead of tracking sub-parse depth separately.
    pub(crate) fn push_frame<R: ResourceTracker>(&mut self, series: &mut SeriesManager<R>, frame: Frame) -> EvalResult<()> {
        self.frames.push(frame);
        series.check_recursion_depth(self.frames.len())?;
        Ok(())
    }

    /// Counterpart to [`Self::push_frame`] for callers (`parse.rs`) that push
    /// frames outside the `eval_block`/`call_function` pairing above.
    ///
    /// # Panics
    /// Panics if the frame stack is empty.
    pub(crate) fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("Evaluator::pop_frame called with an empty frame stack")
    }

    /// Runs the already-pushed top frame to completion (its cursor reaches
    /// the end of its source array), returning its final output cell. Leaves
    /// the frame on the stack either way; callers pop it themselves so a
    /// thrown signal still sees a consistent stack depth at the point of
    /// catching (§4.9).
    fn run_top_frame<R: ResourceTracker, W: PrintWriter>(
        &mut self,
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        collector: &mut crate::collect::Collector,
        writer: &mut W,
        ctx: ContextId,
    ) -> EvalResult<Value> {
        loop {
            let idx = self.frames.len() - 1;
            let source = self.frames[idx].source;
            let cursor = self.frames[idx].cursor;
            if cursor >= series.len(source) {
                break;
            }
            let value = self.eval_step(series, store, symbols, collector, writer, ctx)?;
            self.frames[idx].output = value;
        }
        Ok(self.frames[self.frames.len() - 1].output)
    }

    /// `do` over a plain expression sequence (a top-level program, a `GROUP`'s
    /// body, the REPL's per-line input): pushes an `Evaluating` frame, runs it
    /// to completion, returns the value of the last expression.
    ///
    /// `ctx` is the context any literal block this sequence evaluates should
    /// bind fresh capture words against if it needs to (currently only
    /// `parse.rs`'s `SET`/`COPY` targets, §4.8.4) — ordinarily the session,
    /// or the new context `make_object` just built for its own spec block.
    pub fn eval_block<R: ResourceTracker, W: PrintWriter>(
        &mut self,
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        collector: &mut crate::collect::Collector,
        writer: &mut W,
        source: SeriesId,
        ctx: ContextId,
    ) -> EvalResult<Value> {
        self.push_frame(series, Frame::new(source, FrameMode::Evaluating))?;
        let result = self.run_top_frame(series, store, symbols, collector, writer, ctx);
        self.frames.pop();
        result
    }

    /// Evaluates exactly one expression starting at the current frame's
    /// cursor, advancing it past whatever it consumed (one cell for a
    /// self-evaluating value, a whole call's worth of argument expressions
    /// for a function invocation).
    fn eval_step<R: ResourceTracker, W: PrintWriter>(
        &mut self,
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        collector: &mut crate::collect::Collector,
        writer: &mut W,
        ctx: ContextId,
    ) -> EvalResult<Value> {
        let idx = self.frames.len() - 1;
        let source = self.frames[idx].source;
        let cursor = self.frames[idx].cursor;
        let cell = series.array(source)[cursor];
        self.frames[idx].cursor += 1;

        match cell {
            Value::Word { kind: ValueKind::Word, .. } => {
                let slot = resolve_var(&cell, &self.frames, series, store, symbols, false)?;
                let value = read_slot(slot, &self.frames, series, store);
                if let Value::Function(function) = value {
                    self.call_function(series, store, symbols, collector, writer, function, ctx)
                } else {
                    Ok(value)
                }
            }
            Value::Word { kind: ValueKind::SetWord, .. } => {
                let slot = resolve_var(&cell, &self.frames, series, store, symbols, true)?;
                let value = self.eval_step(series, store, symbols, collector, writer, ctx)?;
                write_slot(slot, value, &mut self.frames, series, store);
                Ok(value)
            }
            Value::Word { kind: ValueKind::GetWord, .. } => {
                let slot = resolve_var(&cell, &self.frames, series, store, symbols, false)?;
                Ok(read_slot(slot, &self.frames, series, store))
            }
            Value::Word { symbol, kind: ValueKind::LitWord, binding } => {
                Ok(Value::Word { symbol, kind: ValueKind::Word, binding })
            }
            Value::Group(pos) => self.eval_block(series, store, symbols, collector, writer, pos.series, ctx),
            Value::Path { pos, .. } => self.eval_path(series, store, symbols, pos),
            _ => Ok(cell),
        }
    }

    /// Minimal `PATH` evaluation (§3.3): the first segment resolves as an
    /// ordinary word (without invoking a function value, since path
    /// navigation selects rather than calls); each further segment must name
    /// a key in the context the previous segment produced.
    fn eval_path<R: ResourceTracker>(
        &mut self,
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        pos: SeriesPos,
    ) -> EvalResult<Value> {
        let segments: Vec<Value> = series.array(pos.series).to_vec();
        let Some(first) = segments.first() else {
            return Err(RunError::new(ErrorKind::BadPathSelect, "empty path").into());
        };
        let mut current = if first.as_word().is_some() {
            let slot = resolve_var(first, &self.frames, series, store, symbols, false)?;
            read_slot(slot, &self.frames, series, store)
        } else {
            *first
        };
        for segment in &segments[1..] {
            let Some((seg_symbol, _, _)) = segment.as_word() else {
                return Err(RunError::new(ErrorKind::BadPathSelect, "path segment is not a word").into());
            };
            let Value::Context { id, .. } = current else {
                return Err(RunError::with_symbol(
                    ErrorKind::BadPathSelect,
                    seg_symbol,
                    format!("cannot select '{}' from a non-context value", symbols.text(seg_symbol)),
                )
                .into());
            };
            let record = store.get(id);
            let index = crate::context::find_word_in_context(series, symbols, record.keylist, seg_symbol)
                .ok_or_else(|| RunError::with_symbol(ErrorKind::BadPathSelect, seg_symbol, symbols.text(seg_symbol).to_owned()))?;
            current = series.array(record.varlist)[index];
        }
        Ok(current)
    }

    /// Gathers a function's arguments by evaluating the next expression per
    /// paramlist slot from the *calling* frame, then dispatches (§4.6 item 2
    /// "pushes a new frame in function-body mode with argument cells
    /// populated... one per paramlist slot, evaluated left to right").
    fn call_function<R: ResourceTracker, W: PrintWriter>(
        &mut self,
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        collector: &mut crate::collect::Collector,
        writer: &mut W,
        function: FunctionId,
        ctx: ContextId,
    ) -> EvalResult<Value> {
        let (paramlist, dispatch) = store.function(function);
        let slot_count = series.len(paramlist);
        let arity = slot_count - 1;

        match dispatch {
            Dispatch::Native(op) => {
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.eval_step(series, store, symbols, collector, writer, ctx)?);
                }
                self.call_native(op, &args, series, store, symbols, collector, writer, ctx)
            }
            Dispatch::Body(body) => {
                let mut args = vec![Value::Blank; slot_count];
                for slot in args.iter_mut().take(slot_count).skip(1) {
                    *slot = self.eval_step(series, store, symbols, collector, writer, ctx)?;
                }
                let mut frame = Frame::with_args(body, FrameMode::FunctionBody { function }, slot_count);
                frame.args = args;
                self.push_frame(series, frame)?;
                let result = self.run_top_frame(series, store, symbols, collector, writer, ctx);
                self.frames.pop();
                match result {
                    Err(Signal::Throw(throw)) => match throw.catch(ThrowLabel::FunctionReturn) {
                        Ok(value) => Ok(value),
                        Err(throw) => Err(Signal::Throw(throw)),
                    },
                    other => other,
                }
            }
        }
    }

    /// Dispatches one [`NativeOp`]. `MakeObject` and `Parse` need the live
    /// frame stack (the former to evaluate its spec block, the latter to run
    /// `(group)` rules and `IF` conditions) so they go through `self` rather
    /// than a free function; the rest are pure value-in, value-out arithmetic
    /// and comparisons.
    fn call_native<R: ResourceTracker, W: PrintWriter>(
        &mut self,
        op: NativeOp,
        args: &[Value],
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        collector: &mut crate::collect::Collector,
        writer: &mut W,
        ctx: ContextId,
    ) -> EvalResult<Value> {
        match op {
            NativeOp::Add => numeric_binary(args, |a, b| a + b, |a, b| a + b),
            NativeOp::Subtract => numeric_binary(args, |a, b| a - b, |a, b| a - b),
            NativeOp::Multiply => numeric_binary(args, |a, b| a * b, |a, b| a * b),
            NativeOp::Divide => divide(args),
            NativeOp::Lt => Ok(Value::Logic(as_f64(&args[0])? < as_f64(&args[1])?)),
            NativeOp::Lte => Ok(Value::Logic(as_f64(&args[0])? <= as_f64(&args[1])?)),
            NativeOp::Gt => Ok(Value::Logic(as_f64(&args[0])? > as_f64(&args[1])?)),
            NativeOp::Gte => Ok(Value::Logic(as_f64(&args[0])? >= as_f64(&args[1])?)),
            NativeOp::Eq => Ok(Value::Logic(args[0] == args[1])),
            NativeOp::Not => Ok(Value::Logic(!args[0].is_truthy())),
            NativeOp::Print => {
                let text = crate::mold::mold(series, symbols, &args[0]);
                writer.stdout_write(std::borrow::Cow::Owned(text));
                writer.stdout_push('\n');
                Ok(Value::Void)
            }
            NativeOp::MakeObject => self.make_object(args, series, store, symbols, collector),
            NativeOp::Function => make_function(args, series, store, symbols, collector),
            NativeOp::Parse => crate::parse::parse(self, series, store, symbols, collector, writer, args[0], args[1], ctx),
            NativeOp::Return => Err(crate::throw::Throw::new(ThrowLabel::FunctionReturn, args[0]).into()),
        }
    }

    /// `make parent spec` (§8 scenarios 1 and 2): `parent` is `Blank` or a
    /// `Context` to inherit from; `spec` is a block of set-word initializers
    /// evaluated against the new, selfish context. This crate's `make` drops
    /// the source dialect's leading datatype tag (`make object! [...]`) since
    /// bit-exact surface syntax is an explicit non-goal; see `DESIGN.md`.
    fn make_object<R: ResourceTracker>(
        &mut self,
        args: &[Value],
        series: &mut SeriesManager<R>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        collector: &mut crate::collect::Collector,
    ) -> EvalResult<Value> {
        let Value::Block(spec_pos) = args[1] else {
            return Err(RunError::new(ErrorKind::BadMake, "make's second argument must be a block").into());
        };
        let parent = match args[0] {
            Value::Blank => None,
            Value::Context { id, .. } => Some(id),
            _ => return Err(RunError::new(ErrorKind::BadMake, "make's first argument must be a context or blank").into()),
        };

        // §4.3's collect_context, not a bare ADD_NEW bind: MAKE OBJECT! only
        // turns a spec block's own top-level SET-WORDs into fields (a bare
        // word referencing an outer global, e.g. `print` in `[print x]`, must
        // stay an outer reference, not become a new blank field on the object).
        let prior_keylist = parent.map(|id| store.get(id).keylist);
        let spec_cells: Vec<Value> = series.array(spec_pos.series).to_vec();
        let keylist = crate::collect::collect_context(
            collector,
            series,
            symbols,
            &spec_cells,
            prior_keylist,
            crate::collect::CollectFlags::ENSURE_SELF,
        )?;
        let new_ctx =
            store.context_from_collected_keylist(series, symbols, crate::value::ContextKind::Object, keylist, parent)?;

        crate::bind::bind_values_core(collector, series, store, symbols, spec_pos.series, new_ctx, crate::bind::BindFlags::empty())?;

        let mut sink = crate::io::NoPrint;
        self.eval_block(series, store, symbols, collector, &mut sink, spec_pos.series, new_ctx)
            .map_err(|_| RunError::new(ErrorKind::BadMake, "error evaluating object spec"))?;

        Ok(Value::Context { kind: crate::value::ContextKind::Object, id: new_ctx })
    }
}

/// Creates a native function value: a locked paramlist of `arity` throwaway
/// typeset slots (native bodies never look their arguments up by word, only
/// by position, so the slots' symbols are never read) plus a
/// `Dispatch::Native` record. Used by `Interpreter::new` to populate the
/// session context's built-in words.
pub fn new_native<R: ResourceTracker>(
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    op: NativeOp,
    arity: usize,
) -> crate::error::Result<FunctionId> {
    let paramlist = series.make_array(arity + 1).map_err(RunError::from)?;
    let slots = vec![Value::Typeset { symbol: crate::symbol::SYM_0, mask: 0, flags: crate::value::TypesetFlags::empty() }; arity + 1];
    series.array_extend(paramlist, slots).map_err(RunError::from)?;
    series.manage(paramlist);
    series.lock(paramlist);
    Ok(store.new_function(paramlist, Dispatch::Native(op)))
}

/// `func spec body` (§3.5, §4.4): the only way user code reaches a
/// `Dispatch::Body` function. `spec`'s words become the paramlist (via
/// `collect.rs`'s `collect_context`, same as a paramlist is just a key-list
/// with no var-list of its own); `body` is bound relatively against that
/// paramlist so its argument words resolve through the calling frame's
/// `args` instead of any context's var-list (§4.5).
fn make_function<R: ResourceTracker>(
    args: &[Value],
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    collector: &mut crate::collect::Collector,
) -> EvalResult<Value> {
    let Value::Block(spec_pos) = args[0] else {
        return Err(RunError::new(ErrorKind::BadMake, "func's first argument must be a block").into());
    };
    let Value::Block(body_pos) = args[1] else {
        return Err(RunError::new(ErrorKind::BadMake, "func's second argument must be a block").into());
    };

    let spec_cells: Vec<Value> = series.array(spec_pos.series).to_vec();
    let paramlist = crate::collect::collect_context(
        collector,
        series,
        symbols,
        &spec_cells,
        None,
        crate::collect::CollectFlags::ANY_WORD | crate::collect::CollectFlags::NO_DUP,
    )?;
    series.lock(paramlist);

    let function = store.new_function(paramlist, Dispatch::Body(body_pos.series));
    crate::bind::bind_relative_deep(collector, series, store, symbols, body_pos.series, function)?;

    Ok(Value::Function(function))
}

fn as_f64(value: &Value) -> EvalResult<f64> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Decimal(d) => Ok(*d),
        _ => Err(RunError::new(ErrorKind::BadMake, "expected a number").into()),
    }
}

fn numeric_binary(args: &[Value], int_op: fn(i64, i64) -> i64, dec_op: fn(f64, f64) -> f64) -> EvalResult<Value> {
    match (&args[0], &args[1]) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(int_op(*a, *b))),
        _ => Ok(Value::Decimal(dec_op(as_f64(&args[0])?, as_f64(&args[1])?))),
    }
}

fn divide(args: &[Value]) -> EvalResult<Value> {
    match (&args[0], &args[1]) {
        (Value::Integer(_), Value::Integer(0)) => Err(RunError::new(ErrorKind::MathError, "division by zero").into()),
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a / b)),
        _ => {
            let divisor = as_f64(&args[1])?;
            if divisor == 0.0 {
                return Err(RunError::new(ErrorKind::MathError, "division by zero").into());
            }
            Ok(Value::Decimal(as_f64(&args[0])? / divisor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collect::Collector, context::ContextStore, resource::NoLimitTracker, series::SeriesManager, symbol::SymbolTable,
    };

    fn harness() -> (SeriesManager<NoLimitTracker>, ContextStore, SymbolTable, Collector) {
        (SeriesManager::new(NoLimitTracker), ContextStore::new(), SymbolTable::new(), Collector::new())
    }

    fn register(
        series: &mut SeriesManager<NoLimitTracker>,
        store: &mut ContextStore,
        symbols: &mut SymbolTable,
        session: crate::context::ContextId,
        name: &str,
        op: NativeOp,
        arity: usize,
    ) {
        let paramlist = series.make_array(arity + 1).unwrap();
        let slots = vec![
            Value::Typeset { symbol: crate::symbol::SYM_0, mask: 0, flags: crate::value::TypesetFlags::empty() };
            arity + 1
        ];
        series.array_extend(paramlist, slots).unwrap();
        series.manage(paramlist);
        let function = store.new_function(paramlist, Dispatch::Native(op));
        let symbol = symbols.intern(name);
        store.append(series, session, symbol, Value::Function(function)).unwrap();
    }

    #[test]
    fn evaluates_scalar_literal() {
        let (mut series, mut store, mut symbols, mut collector) = harness();
        let mut writer = crate::io::NoPrint;
        let session = store.new_context(&mut series, crate::value::ContextKind::Object, false).unwrap();
        let source = series.make_array(1).unwrap();
        series.array_extend(source, [Value::Integer(42)]).unwrap();
        series.manage(source);
        let mut evaluator = Evaluator::new();
        let result = evaluator
            .eval_block(&mut series, &mut store, &mut symbols, &mut collector, &mut writer, source, session)
            .unwrap();
        assert_eq!(result, Value::Integer(42));
    }

    #[test]
    fn calls_a_native_add_function() {
        let (mut series, mut store, mut symbols, mut collector) = harness();
        let mut writer = crate::io::NoPrint;
        let session = store.new_context(&mut series, crate::value::ContextKind::Object, false).unwrap();
        register(&mut series, &mut store, &mut symbols, session, "add", NativeOp::Add, 2);

        let source = series.make_array(3).unwrap();
        let add_symbol = symbols.intern("add");
        let add_word = Value::Word { symbol: add_symbol, kind: ValueKind::Word, binding: Binding::Unbound };
        series.array_extend(source, [add_word, Value::Integer(2), Value::Integer(3)]).unwrap();
        series.manage(source);
        crate::bind::bind_values_core(
            &mut collector,
            &mut series,
            &mut store,
            &mut symbols,
            source,
            session,
            crate::bind::BindFlags::empty(),
        )
        .unwrap();

        let mut evaluator = Evaluator::new();
        let result = evaluator
            .eval_block(&mut series, &mut store, &mut symbols, &mut collector, &mut writer, source, session)
            .unwrap();
        assert_eq!(result, Value::Integer(5));
    }

    #[test]
    fn set_word_stores_and_yields_the_value() {
        let (mut series, mut store, mut symbols, mut collector) = harness();
        let mut writer = crate::io::NoPrint;
        let session = store.new_context(&mut series, crate::value::ContextKind::Object, false).unwrap();
        let a = symbols.intern("a");
        store.append(&mut series, session, a, Value::Blank).unwrap();

        let source = series.make_array(2).unwrap();
        let set_a = Value::Word { symbol: a, kind: ValueKind::SetWord, binding: Binding::Unbound };
        series.array_extend(source, [set_a, Value::Integer(9)]).unwrap();
        series.manage(source);
        crate::bind::bind_values_core(
            &mut collector,
            &mut series,
            &mut store,
            &mut symbols,
            source,
            session,
            crate::bind::BindFlags::empty(),
        )
        .unwrap();

        let mut evaluator = Evaluator::new();
        let result = evaluator
            .eval_block(&mut series, &mut store, &mut symbols, &mut collector, &mut writer, source, session)
            .unwrap();
        assert_eq!(result, Value::Integer(9));
        let record = store.get(session);
        assert_eq!(series.array(record.varlist)[1], Value::Integer(9));
    }

    #[test]
    fn word_with_no_binding_fails_not_bound() {
        let (mut series, mut store, mut symbols, mut collector) = harness();
        let mut writer = crate::io::NoPrint;
        let session = store.new_context(&mut series, crate::value::ContextKind::Object, false).unwrap();
        let source = series.make_array(1).unwrap();
        let word = Value::Word { symbol: crate::symbol::SYM_SELF, kind: ValueKind::Word, binding: Binding::Unbound };
        series.array_extend(source, [word]).unwrap();
        series.manage(source);
        let mut evaluator = Evaluator::new();
        let err = evaluator
            .eval_block(&mut series, &mut store, &mut symbols, &mut collector, &mut writer, source, session)
            .unwrap_err();
        match err {
            Signal::Error(e) => assert_eq!(e.kind, ErrorKind::NotBound),
            Signal::Throw(_) => panic!("expected a structural error"),
        }
    }
}
