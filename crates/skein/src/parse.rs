//! The `PARSE` dialect (`SPEC_FULL.md` §4.8): a backtracking rule matcher
//! sharing the evaluator's frame stack and throw protocol instead of being a
//! separate recursive-descent engine bolted on the side.
//!
//! There is no single teacher file this is grounded on — `eval.rs`'s frame
//! stack and `FrameMode::Parse` are grounded on the teacher's general
//! discipline of threading interpreter state through owned structs rather
//! than globals (see `eval.rs`'s own module doc), and this module reuses
//! that machinery directly: every sub-rule (a bracketed alternative, an
//! `INTO` target, a `SOME`/`ANY` body) pushes its own `FrameMode::Parse`
//! frame via `Evaluator::push_frame`/`pop_frame`, so a pathologically
//! recursive rule set hits the same recursion ceiling a pathologically
//! recursive function call would. `ACCEPT`/`REJECT`/`RETURN` reuse
//! `throw.rs`'s `Signal`/`Throw`/`ThrowLabel` exactly as a function `return`
//! does; this is the crate's one dialect-specific evaluator, not a
//! standalone interpreter.
//!
//! # Known, carried-forward limitations (`SPEC_FULL.md` §9)
//! - `DO` only evaluates a single input cell, not a compound expression —
//!   the same brokenness `thru do integer!` has in the original dialect this
//!   is distilled from is reproduced here rather than silently fixed.
//! - String/binary positions are raw byte offsets, not UTF-8 codepoint
//!   indices; `SKIP` and `TO`/`THRU` scanning decode one `char` at a time but
//!   never re-normalize an offset that lands mid-codepoint.
//! - `WHILE`'s zero-advance-allowed looping is capped at
//!   [`WHILE_SAFETY_CAP`] iterations rather than truly unbounded, so a
//!   pathological rule set fails loudly instead of hanging the host process.
//! - `LIT-PATH` rule cells are matched structurally rather than dereferenced,
//!   the same way a `LIT-WORD` rule cell is a literal match rather than a
//!   variable lookup; bare `PATH` cells *are* dereferenced (see
//!   `deref_path`), same as a bare word.
//! - `INSERT`/`CHANGE` always splice the evaluated value as a single element
//!   (array input) or its raw bytes (text input); there is no `ONLY`
//!   refinement to choose block-content-splice instead.

use crate::{
    bind::{bind_values_core, BindFlags},
    collect::Collector,
    context::{ContextId, ContextStore},
    error::{ErrorKind, Result as CoreResult, RunError},
    eval::Evaluator,
    frame::{Frame, FrameMode},
    io::PrintWriter,
    lookup::{read_slot, resolve_var, write_slot},
    resource::ResourceTracker,
    series::{SeriesId, SeriesManager},
    symbol::{self, SymbolTable},
    throw::{EvalResult, Signal, Throw, ThrowLabel},
    value::{Binding, SeriesPos, TypesetFlags, Value, ValueKind},
};

/// A sub-parse's final state, returned by the recursive engine before the
/// public [`parse`] entry point converts it to a dialect-level [`Value`].
/// Exposed so an embedder driving `PARSE` directly (rather than through the
/// `parse` native) can tell a full match from a match that stopped short of
/// the input's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The rule set ran out of rules (or hit `THEN`/a forward `|`) with the
    /// input position at the given offset.
    Matched(usize),
    /// No alternative in the rule set matched and there was nothing left to
    /// fall back to.
    Failed,
}

/// Safety valve for `WHILE`'s "loop even on a zero-advance match" semantics
/// (§4.8.3): a rule set that never advances the input would otherwise spin
/// forever. Not part of the dialect as specified; see the module doc.
const WHILE_SAFETY_CAP: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Array,
    Text,
}

#[derive(Debug, Clone, Copy)]
struct InputRef {
    series: SeriesId,
    kind: InputKind,
    /// Only meaningful for `InputKind::Text`: whether `COPY`'s output should
    /// come back as `Value::Binary` instead of `Value::String`.
    binary: bool,
}

/// One value PARSE is to splice/compare, either read verbatim from the rule
/// stream or produced by evaluating a `GROUP` (`INSERT`/`CHANGE`/`QUOTE`'s
/// operand grammar, §4.8.3).
#[derive(Debug, Clone, Copy)]
enum ValueOperand {
    Group(SeriesId),
    Literal(Value),
}

/// The decoded shape of one rule-stream term, separated from how many times
/// it is applied (that's [`MatchSpec::Repeat`]) so `ANY`/`SOME`/`WHILE`/`OPT`
/// and a bare integer prefix can all share one looping implementation.
enum MatchSpec {
    Skip,
    EndOfInput,
    ScanTo { thru: bool, needle: Box<MatchSpec> },
    QuoteValue(Value),
    SubRule(SeriesId),
    Code(SeriesId),
    IfCond(SeriesId),
    Literal(Value),
    Seek(Value),
    SavePos(Value),
    Into(Box<MatchSpec>),
    Do(Box<MatchSpec>),
    AcceptNow,
    RejectNow,
    AlwaysFail,
    CommitNow,
    DebugMark,
    Repeat { inner: Box<MatchSpec>, min: usize, max: usize, allow_zero_advance: bool },
    SetCapture { target: Value, inner: Box<MatchSpec> },
    CopyCapture { target: Value, inner: Box<MatchSpec> },
    Invert(Box<MatchSpec>),
    Lookahead(Box<MatchSpec>),
    RemoveMatch(Box<MatchSpec>),
    ReturnMatch(Box<MatchSpec>),
    ReturnValue(SeriesId),
    InsertValue(ValueOperand),
    ChangeMatch { inner: Box<MatchSpec>, value: ValueOperand },
}

enum SpecResult {
    Matched(usize),
    /// `THEN`/a forward `|`: succeed right now and stop consuming the rest
    /// of the enclosing rule block, same effect as running off the end.
    Commit(usize),
    NoMatch,
}

/// The `parse` native's entry point (`NativeOp::Parse`, §4.8.1). `input` must
/// be a block/group (array match) or a string/binary (text match); `rules`
/// must be a block. Returns `Logic(true)` iff the rule set ran to completion
/// with the input position at the series' end, `Logic(false)` on any local
/// failure or an escaped `reject`, or whatever value a `return`/escaped
/// `accept` carries.
///
/// `ctx` is the context the calling expression is itself evaluating against
/// (ordinarily the session). The rule block arrives as inert literal data
/// the same way `make`'s spec block does — `Interpreter::eval_str` only
/// binds the top level of freshly-scanned source, so a `SET`/`COPY` capture
/// target or a datatype word (`integer!`) nested inside `rules` has no
/// binding yet. `make_object` handles this by binding its spec block against
/// the context it just built before evaluating it; there is no new context
/// here, so this binds `rules` against `ctx` instead, the same way the
/// top-level REPL line itself was bound.
pub fn parse<R: ResourceTracker, W: PrintWriter>(
    evaluator: &mut Evaluator,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    collector: &mut Collector,
    writer: &mut W,
    input: Value,
    rules: Value,
    ctx: ContextId,
) -> EvalResult<Value> {
    let Value::Block(rules_pos) = rules else {
        return Err(RunError::new(ErrorKind::ParseRule, "parse's second argument must be a block of rules").into());
    };
    bind_values_core(collector, series, store, symbols, rules_pos.series, ctx, BindFlags::DEEP | BindFlags::ADD_NEW)
        .map_err(Signal::from)?;
    let (input_ref, start_pos) = value_to_input(input).map_err(Signal::from)?;
    let total_len = series.len(input_ref.series);

    match run_rules(evaluator, series, store, symbols, collector, writer, rules_pos.series, input_ref, start_pos, ctx) {
        Ok(ParseOutcome::Matched(pos)) => Ok(Value::Logic(pos == total_len)),
        Ok(ParseOutcome::Failed) => Ok(Value::Logic(false)),
        Err(Signal::Throw(throw)) => match throw.catch(ThrowLabel::ParseReturn) {
            Ok(value) => Ok(value),
            Err(throw) => match throw.catch(ThrowLabel::ParseAccept) {
                // `MatchSpec::Repeat` catches ACCEPT/REJECT for its own loop
                // first (§4.8.5); this only sees one when it is used outside
                // any enclosing iteration (e.g. `parse input [(code) accept]`
                // at the top level), so converting it to an outright
                // successful parse is the fallback, not the primary case.
                Ok(_) => Ok(Value::Logic(true)),
                Err(throw) => match throw.catch(ThrowLabel::ParseReject) {
                    Ok(_) => Ok(Value::Logic(false)),
                    Err(throw) => Err(Signal::Throw(throw)),
                },
            },
        },
        Err(err @ Signal::Error(_)) => Err(err),
    }
}

fn value_to_input(value: Value) -> CoreResult<(InputRef, usize)> {
    match value {
        Value::Block(pos) | Value::Group(pos) => {
            Ok((InputRef { series: pos.series, kind: InputKind::Array, binary: false }, pos.index as usize))
        }
        Value::String(pos) => Ok((InputRef { series: pos.series, kind: InputKind::Text, binary: false }, pos.index as usize)),
        Value::Binary(pos) => Ok((InputRef { series: pos.series, kind: InputKind::Text, binary: true }, pos.index as usize)),
        _ => Err(RunError::new(ErrorKind::ParseSeries, "parse input must be a block, group, string, or binary")),
    }
}

/// Runs `rule_array` against `input` starting at `start_pos`, pushing its own
/// `FrameMode::Parse` frame and locking `rule_array` for the duration
/// (§4.8.7) unless it was already locked by an enclosing call to the same
/// series (a rule block that recurses into itself).
fn run_rules<R: ResourceTracker, W: PrintWriter>(
    evaluator: &mut Evaluator,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    collector: &mut Collector,
    writer: &mut W,
    rule_array: SeriesId,
    mut input: InputRef,
    start_pos: usize,
    ctx: ContextId,
) -> EvalResult<ParseOutcome> {
    let already_locked = series.is_locked(rule_array);
    series.lock(rule_array);
    evaluator.push_frame(series, Frame::new(rule_array, FrameMode::Parse { input: input.series, input_index: start_pos }))?;

    let result = run_rules_body(evaluator, series, store, symbols, collector, writer, rule_array, &mut input, start_pos, ctx);

    evaluator.pop_frame();
    if !already_locked {
        series.unlock(rule_array);
    }
    result
}

fn run_rules_body<R: ResourceTracker, W: PrintWriter>(
    evaluator: &mut Evaluator,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    collector: &mut Collector,
    writer: &mut W,
    rule_array: SeriesId,
    input: &mut InputRef,
    start_pos: usize,
    ctx: ContextId,
) -> EvalResult<ParseOutcome> {
    let frame_index = evaluator.frames().len() - 1;
    let alt_start = start_pos;
    let mut pos = start_pos;

    loop {
        let len = series.len(rule_array);
        let cursor = evaluator.frames()[frame_index].cursor;
        if cursor >= len {
            return Ok(ParseOutcome::Matched(pos));
        }
        if is_bar(symbols, series.array(rule_array)[cursor]) {
            return Ok(ParseOutcome::Matched(pos));
        }

        let mut next_cursor = cursor;
        let term = read_term(evaluator, series, store, symbols, rule_array, &mut next_cursor)?;
        evaluator.frames_mut()[frame_index].cursor = next_cursor;

        if let MatchSpec::Seek(value) = term {
            let (new_input, new_pos) = reseek(value).map_err(Signal::from)?;
            *input = new_input;
            pos = new_pos;
            evaluator.frames_mut()[frame_index].mode = FrameMode::Parse { input: input.series, input_index: pos };
            continue;
        }

        match eval_spec(&term, evaluator, series, store, symbols, collector, writer, *input, pos, ctx)? {
            SpecResult::Matched(new_pos) => {
                pos = new_pos;
                evaluator.frames_mut()[frame_index].mode = FrameMode::Parse { input: input.series, input_index: pos };
            }
            SpecResult::Commit(new_pos) => return Ok(ParseOutcome::Matched(new_pos)),
            SpecResult::NoMatch => match find_next_bar(series, symbols, rule_array, evaluator.frames()[frame_index].cursor) {
                Some(bar_index) => {
                    evaluator.frames_mut()[frame_index].cursor = bar_index + 1;
                    pos = alt_start;
                    evaluator.frames_mut()[frame_index].mode = FrameMode::Parse { input: input.series, input_index: pos };
                }
                None => return Ok(ParseOutcome::Failed),
            },
        }
    }
}

fn reseek(value: Value) -> CoreResult<(InputRef, usize)> {
    value_to_input(value)
}

fn is_bar(symbols: &SymbolTable, cell: Value) -> bool {
    matches!(cell.as_word(), Some((sym, ValueKind::Word, _)) if symbols.canon_eq(sym, symbol::SYM_BAR))
}

fn word_is(symbols: &SymbolTable, cell: Value, target: crate::symbol::Symbol) -> bool {
    matches!(cell.as_word(), Some((sym, ValueKind::Word, _)) if symbols.canon_eq(sym, target))
}

/// First top-level `|` at or after `from`, within `rule_array` itself (a
/// nested block's own `|`s live in a different series and are never visible
/// here — §4.8.6's "resume within the current alternation" falls out of that
/// for free).
fn find_next_bar<R: ResourceTracker>(series: &SeriesManager<R>, symbols: &SymbolTable, rule_array: SeriesId, from: usize) -> Option<usize> {
    let array = series.array(rule_array);
    (from..array.len()).find(|&i| is_bar(symbols, array[i]))
}

fn next_cell<R: ResourceTracker>(series: &SeriesManager<R>, rule_array: SeriesId, cursor: &mut usize) -> CoreResult<Value> {
    let array = series.array(rule_array);
    if *cursor >= array.len() {
        return Err(RunError::new(ErrorKind::ParseEnd, "rule stream ended where an operand was required"));
    }
    let cell = array[*cursor];
    *cursor += 1;
    Ok(cell)
}

/// Reads one full rule-stream term starting at `*cursor`: modifier prefixes
/// (`SET`/`COPY`/`NOT`/`AND`/`AHEAD`/`REMOVE`/`RETURN`), then a quantifier
/// (`ANY`/`SOME`/`WHILE`/`OPT`/a bare integer), then the base term
/// ([`read_base`]). Advances `*cursor` past everything it consumed.
fn read_term<R: ResourceTracker>(
    evaluator: &Evaluator,
    series: &SeriesManager<R>,
    store: &ContextStore,
    symbols: &SymbolTable,
    rule_array: SeriesId,
    cursor: &mut usize,
) -> EvalResult<MatchSpec> {
    let cell = next_cell(series, rule_array, cursor).map_err(Signal::from)?;

    if word_is(symbols, cell, symbol::SYM_SET) {
        let target = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
        if !target.is_any_word() {
            return Err(RunError::new(ErrorKind::ParseVariable, "SET's target is not a word").into());
        }
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::SetCapture { target, inner: Box::new(inner) });
    }
    if word_is(symbols, cell, symbol::SYM_COPY) {
        let target = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
        if !target.is_any_word() {
            return Err(RunError::new(ErrorKind::ParseVariable, "COPY's target is not a word").into());
        }
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::CopyCapture { target, inner: Box::new(inner) });
    }
    if word_is(symbols, cell, symbol::SYM_NOT) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Invert(Box::new(inner)));
    }
    if word_is(symbols, cell, symbol::SYM_AND) || word_is(symbols, cell, symbol::SYM_AHEAD) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Lookahead(Box::new(inner)));
    }
    if word_is(symbols, cell, symbol::SYM_REMOVE) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::RemoveMatch(Box::new(inner)));
    }
    if word_is(symbols, cell, symbol::SYM_RETURN) {
        let peek = *cursor;
        let operand = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
        if let Value::Group(pos) = operand {
            return Ok(MatchSpec::ReturnValue(pos.series));
        }
        *cursor = peek;
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::ReturnMatch(Box::new(inner)));
    }
    if word_is(symbols, cell, symbol::SYM_INSERT) {
        let value = read_value_operand(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::InsertValue(value));
    }
    if word_is(symbols, cell, symbol::SYM_CHANGE) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        let value = read_value_operand(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::ChangeMatch { inner: Box::new(inner), value });
    }
    if word_is(symbols, cell, symbol::SYM_ANY) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Repeat { inner: Box::new(inner), min: 0, max: usize::MAX, allow_zero_advance: false });
    }
    if word_is(symbols, cell, symbol::SYM_SOME) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Repeat { inner: Box::new(inner), min: 1, max: usize::MAX, allow_zero_advance: false });
    }
    if word_is(symbols, cell, symbol::SYM_WHILE) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Repeat { inner: Box::new(inner), min: 0, max: usize::MAX, allow_zero_advance: true });
    }
    if word_is(symbols, cell, symbol::SYM_OPT) {
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Repeat { inner: Box::new(inner), min: 0, max: 1, allow_zero_advance: true });
    }
    if let Value::Integer(n) = cell {
        let count = usize::try_from(n).map_err(|_| RunError::new(ErrorKind::ParseRule, "negative quantifier"))?;
        let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
        return Ok(MatchSpec::Repeat { inner: Box::new(inner), min: count, max: count, allow_zero_advance: true });
    }

    read_base(evaluator, series, store, symbols, rule_array, cursor, cell)
}

/// Reads the non-modifier, non-quantifier core of a term: `cell` is the
/// already-consumed lead cell.
fn read_base<R: ResourceTracker>(
    evaluator: &Evaluator,
    series: &SeriesManager<R>,
    store: &ContextStore,
    symbols: &SymbolTable,
    rule_array: SeriesId,
    cursor: &mut usize,
    cell: Value,
) -> EvalResult<MatchSpec> {
    match cell {
        Value::Word { kind: ValueKind::Word, .. } => {
            let (sym, ..) = cell.as_word().expect("just matched Word");
            if symbols.canon_eq(sym, symbol::SYM_SKIP) {
                return Ok(MatchSpec::Skip);
            }
            if symbols.canon_eq(sym, symbol::SYM_END) {
                return Ok(MatchSpec::EndOfInput);
            }
            if symbols.canon_eq(sym, symbol::SYM_TO) || symbols.canon_eq(sym, symbol::SYM_THRU) {
                let thru = symbols.canon_eq(sym, symbol::SYM_THRU);
                let needle = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
                return Ok(MatchSpec::ScanTo { thru, needle: Box::new(needle) });
            }
            if symbols.canon_eq(sym, symbol::SYM_QUOTE) {
                let operand = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
                let value = deref_if_word(evaluator, series, store, symbols, operand)?;
                return Ok(MatchSpec::QuoteValue(value));
            }
            if symbols.canon_eq(sym, symbol::SYM_IF) {
                let operand = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
                let Value::Group(pos) = operand else {
                    return Err(RunError::new(ErrorKind::ParseRule, "IF requires a group operand").into());
                };
                return Ok(MatchSpec::IfCond(pos.series));
            }
            if symbols.canon_eq(sym, symbol::SYM_INTO) {
                let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
                return Ok(MatchSpec::Into(Box::new(inner)));
            }
            if symbols.canon_eq(sym, symbol::SYM_DO) {
                let inner = read_term(evaluator, series, store, symbols, rule_array, cursor)?;
                return Ok(MatchSpec::Do(Box::new(inner)));
            }
            if symbols.canon_eq(sym, symbol::SYM_LIMIT) {
                let _operand = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
                return Err(RunError::new(ErrorKind::ParseRule, "LIMIT is reserved and not implemented").into());
            }
            if symbols.canon_eq(sym, symbol::SYM_ACCEPT) || symbols.canon_eq(sym, symbol::SYM_BREAK) {
                return Ok(MatchSpec::AcceptNow);
            }
            if symbols.canon_eq(sym, symbol::SYM_REJECT) {
                return Ok(MatchSpec::RejectNow);
            }
            if symbols.canon_eq(sym, symbol::SYM_FAIL) {
                return Ok(MatchSpec::AlwaysFail);
            }
            if symbols.canon_eq(sym, symbol::SYM_THEN) {
                return Ok(MatchSpec::CommitNow);
            }
            if symbols.canon_eq(sym, symbol::SYM_QUESTION) {
                return Ok(MatchSpec::DebugMark);
            }

            // Not a reserved command: dereference. A bound block becomes a
            // sub-rule; anything else is a literal match value (§4.8.2).
            let slot = resolve_var(&cell, evaluator.frames(), series, store, symbols, false).map_err(Signal::from)?;
            let value = read_slot(slot, evaluator.frames(), series, store);
            Ok(match value {
                Value::Block(pos) => MatchSpec::SubRule(pos.series),
                other => MatchSpec::Literal(other),
            })
        }
        Value::Word { kind: ValueKind::GetWord, .. } => {
            let slot = resolve_var(&cell, evaluator.frames(), series, store, symbols, false).map_err(Signal::from)?;
            Ok(MatchSpec::Seek(read_slot(slot, evaluator.frames(), series, store)))
        }
        Value::Word { kind: ValueKind::SetWord, .. } => Ok(MatchSpec::SavePos(cell)),
        Value::Word { symbol: sym, kind: ValueKind::LitWord, .. } => {
            Ok(MatchSpec::Literal(Value::Word { symbol: sym, kind: ValueKind::Word, binding: Binding::Unbound }))
        }
        Value::Path { pos, kind: ValueKind::Path } => {
            let value = deref_path(evaluator, series, store, symbols, pos).map_err(Signal::from)?;
            Ok(match value {
                Value::Block(pos) => MatchSpec::SubRule(pos.series),
                other => MatchSpec::Literal(other),
            })
        }
        Value::Block(pos) => Ok(MatchSpec::SubRule(pos.series)),
        Value::Group(pos) => Ok(MatchSpec::Code(pos.series)),
        other => Ok(MatchSpec::Literal(other)),
    }
}

/// Dereferences a bare `PATH` rule cell the same way `eval.rs`'s `eval_path`
/// dereferences a `PATH` expression: look up the first segment's word, then
/// select each further segment out of the context that yields.
fn deref_path<R: ResourceTracker>(
    evaluator: &Evaluator,
    series: &SeriesManager<R>,
    store: &ContextStore,
    symbols: &SymbolTable,
    pos: SeriesPos,
) -> CoreResult<Value> {
    let segments: Vec<Value> = series.array(pos.series).to_vec();
    let Some(first) = segments.first() else {
        return Err(RunError::new(ErrorKind::BadPathSelect, "empty path"));
    };
    let mut current = if first.as_word().is_some() {
        let slot = resolve_var(first, evaluator.frames(), series, store, symbols, false)?;
        read_slot(slot, evaluator.frames(), series, store)
    } else {
        *first
    };
    for segment in &segments[1..] {
        let Some((seg_symbol, _, _)) = segment.as_word() else {
            return Err(RunError::new(ErrorKind::BadPathSelect, "path segment is not a word"));
        };
        let Value::Context { id, .. } = current else {
            return Err(RunError::with_symbol(
                ErrorKind::BadPathSelect,
                seg_symbol,
                format!("cannot select '{}' from a non-context value", symbols.text(seg_symbol)),
            ));
        };
        let record = store.get(id);
        let index = crate::context::find_word_in_context(series, symbols, record.keylist, seg_symbol)
            .ok_or_else(|| RunError::with_symbol(ErrorKind::BadPathSelect, seg_symbol, symbols.text(seg_symbol).to_owned()))?;
        current = series.array(record.varlist)[index];
    }
    Ok(current)
}

fn deref_if_word<R: ResourceTracker>(
    evaluator: &Evaluator,
    series: &SeriesManager<R>,
    store: &ContextStore,
    symbols: &SymbolTable,
    cell: Value,
) -> EvalResult<Value> {
    match cell {
        Value::Word { kind: ValueKind::Word | ValueKind::GetWord, .. } => {
            let slot = resolve_var(&cell, evaluator.frames(), series, store, symbols, false).map_err(Signal::from)?;
            Ok(read_slot(slot, evaluator.frames(), series, store))
        }
        other => Ok(other),
    }
}

fn read_value_operand<R: ResourceTracker>(
    evaluator: &Evaluator,
    series: &SeriesManager<R>,
    store: &ContextStore,
    symbols: &SymbolTable,
    rule_array: SeriesId,
    cursor: &mut usize,
) -> EvalResult<ValueOperand> {
    let cell = next_cell(series, rule_array, cursor).map_err(Signal::from)?;
    if let Value::Group(pos) = cell {
        return Ok(ValueOperand::Group(pos.series));
    }
    Ok(ValueOperand::Literal(deref_if_word(evaluator, series, store, symbols, cell)?))
}

fn eval_value_operand<R: ResourceTracker, W: PrintWriter>(
    operand: ValueOperand,
    evaluator: &mut Evaluator,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    collector: &mut Collector,
    writer: &mut W,
    ctx: ContextId,
) -> EvalResult<Value> {
    match operand {
        ValueOperand::Group(id) => evaluator.eval_block(series, store, symbols, collector, writer, id, ctx),
        ValueOperand::Literal(value) => Ok(value),
    }
}

fn decode_char_at(bytes: &[u8], pos: usize) -> Option<(char, usize)> {
    if pos >= bytes.len() {
        return None;
    }
    let tail = &bytes[pos..];
    std::str::from_utf8(tail).ok().and_then(|s| s.chars().next()).map(|c| (c, c.len_utf8()))
}

fn bitset_contains(bits: &[u8], code: u32) -> bool {
    let index = (code / 8) as usize;
    let bit = (code % 8) as u8;
    bits.get(index).is_some_and(|b| b & (1 << bit) != 0)
}

/// Converts `span` ([pos, end)) of `input` into a freshly allocated,
/// dialect-level value for `COPY` (§4.8.4): a `Block` for an array input, a
/// `String`/`Binary` for a text input depending on which one the original
/// `parse` call was handed.
fn copy_span<R: ResourceTracker>(series: &mut SeriesManager<R>, input: InputRef, start: usize, end: usize) -> CoreResult<Value> {
    match input.kind {
        InputKind::Array => {
            let cells = series.array(input.series)[start..end].to_vec();
            let id = series.make_array(cells.len()).map_err(RunError::from)?;
            series.array_extend(id, cells).map_err(RunError::from)?;
            series.manage(id);
            Ok(Value::Block(SeriesPos { series: id, index: 0 }))
        }
        InputKind::Text => {
            let bytes = series.bytes(input.series)[start..end].to_vec();
            let id = series.make_bytes(bytes.len()).map_err(RunError::from)?;
            series.bytes_mut(id).extend_from_slice(&bytes);
            series.manage(id);
            Ok(if input.binary { Value::Binary(SeriesPos { series: id, index: 0 }) } else { Value::String(SeriesPos { series: id, index: 0 }) })
        }
    }
}

fn match_literal<R: ResourceTracker>(v: &Value, input: InputRef, pos: usize, series: &SeriesManager<R>, symbols: &SymbolTable) -> CoreResult<Option<usize>> {
    let len = series.len(input.series);
    match input.kind {
        InputKind::Array => {
            if pos >= len {
                return Ok(None);
            }
            let elem = series.array(input.series)[pos];
            let matched = match v {
                Value::Typeset { mask, .. } => (1u64 << (elem.kind() as u64)) & mask != 0,
                Value::Word { symbol: want, kind: ValueKind::Word, .. } => {
                    matches!(elem.as_word(), Some((got, ValueKind::Word, _)) if symbols.canon_eq(got, *want))
                }
                other => elem == *other,
            };
            Ok(if matched { Some(pos + 1) } else { None })
        }
        InputKind::Text => match v {
            Value::Char(c) => match decode_char_at(series.bytes(input.series), pos) {
                Some((got, width)) if got == *c => Ok(Some(pos + width)),
                _ => Ok(None),
            },
            Value::Integer(n) => {
                if pos < len && i64::from(series.bytes(input.series)[pos]) == *n {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
            Value::String(needle_pos) | Value::Binary(needle_pos) => {
                let needle = series.bytes(needle_pos.series).to_vec();
                let hay = series.bytes(input.series);
                if pos <= hay.len() && hay[pos..].starts_with(needle.as_slice()) {
                    Ok(Some(pos + needle.len()))
                } else {
                    Ok(None)
                }
            }
            Value::Bitset(bits_id) => {
                let Some((ch, width)) = decode_char_at(series.bytes(input.series), pos) else { return Ok(None) };
                if bitset_contains(series.bytes(*bits_id), ch as u32) {
                    Ok(Some(pos + width))
                } else {
                    Ok(None)
                }
            }
            _ => Err(RunError::new(ErrorKind::ParseRule, "this value kind cannot match against a text input")),
        },
    }
}

/// Attempts one application of `spec` at `pos`. Recurses for the wrapping
/// combinators (`Repeat`, `Invert`, `Lookahead`, `RemoveMatch`, the capture
/// modifiers, `ReturnMatch`, `ChangeMatch`); everything else is a leaf.
#[expect(clippy::too_many_lines, reason = "one dispatch per PARSE command, matching eval.rs's own call_native match")]
fn eval_spec<R: ResourceTracker, W: PrintWriter>(
    spec: &MatchSpec,
    evaluator: &mut Evaluator,
    series: &mut SeriesManager<R>,
    store: &mut ContextStore,
    symbols: &mut SymbolTable,
    collector: &mut Collector,
    writer: &mut W,
    input: InputRef,
    pos: usize,
    ctx: ContextId,
) -> EvalResult<SpecResult> {
    match spec {
        MatchSpec::Skip => {
            let len = series.len(input.series);
            if pos >= len {
                return Ok(SpecResult::NoMatch);
            }
            let new_pos = match input.kind {
                InputKind::Array => pos + 1,
                InputKind::Text => match decode_char_at(series.bytes(input.series), pos) {
                    Some((_, width)) => pos + width,
                    None => pos + 1,
                },
            };
            Ok(SpecResult::Matched(new_pos))
        }
        MatchSpec::EndOfInput => {
            if pos == series.len(input.series) {
                Ok(SpecResult::Matched(pos))
            } else {
                Ok(SpecResult::NoMatch)
            }
        }
        MatchSpec::ScanTo { thru, needle } => {
            let len = series.len(input.series);
            let mut p = pos;
            loop {
                if p > len {
                    return Ok(SpecResult::NoMatch);
                }
                match eval_spec(needle, evaluator, series, store, symbols, collector, writer, input, p, ctx)? {
                    SpecResult::Matched(end) | SpecResult::Commit(end) => {
                        return Ok(SpecResult::Matched(if *thru { end } else { p }));
                    }
                    SpecResult::NoMatch => {
                        if p >= len {
                            return Ok(SpecResult::NoMatch);
                        }
                        p = match input.kind {
                            InputKind::Array => p + 1,
                            InputKind::Text => decode_char_at(series.bytes(input.series), p).map_or(p + 1, |(_, w)| p + w),
                        };
                    }
                }
            }
        }
        MatchSpec::QuoteValue(value) => {
            if input.kind != InputKind::Array {
                return Err(RunError::new(ErrorKind::ParseRule, "QUOTE requires an array input").into());
            }
            if pos < series.len(input.series) && series.array(input.series)[pos] == *value {
                Ok(SpecResult::Matched(pos + 1))
            } else {
                Ok(SpecResult::NoMatch)
            }
        }
        MatchSpec::SubRule(id) => match run_rules(evaluator, series, store, symbols, collector, writer, *id, input, pos, ctx)? {
            ParseOutcome::Matched(p) => Ok(SpecResult::Matched(p)),
            ParseOutcome::Failed => Ok(SpecResult::NoMatch),
        },
        MatchSpec::Code(id) => {
            evaluator.eval_block(series, store, symbols, collector, writer, *id, ctx)?;
            Ok(SpecResult::Matched(pos))
        }
        MatchSpec::IfCond(id) => {
            let result = evaluator.eval_block(series, store, symbols, collector, writer, *id, ctx)?;
            Ok(if result.is_truthy() { SpecResult::Matched(pos) } else { SpecResult::NoMatch })
        }
        MatchSpec::Literal(value) => match match_literal(value, input, pos, series, symbols).map_err(Signal::from)? {
            Some(new_pos) => Ok(SpecResult::Matched(new_pos)),
            None => Ok(SpecResult::NoMatch),
        },
        MatchSpec::Seek(_) => {
            // Handled by `run_rules_body` before `eval_spec` is reached at the
            // top level; a `Seek` nested inside another combinator (e.g.
            // `some :target`) has no sensible "repeat this reposition" reading,
            // so it is simply not produced there by `read_term`.
            Err(RunError::new(ErrorKind::ParseRule, "SEEK is only valid as a standalone rule step").into())
        }
        MatchSpec::SavePos(target) => {
            let slot = resolve_var(target, evaluator.frames(), series, store, symbols, true).map_err(Signal::from)?;
            write_slot(slot, Value::Integer(pos as i64), evaluator.frames_mut(), series, store);
            Ok(SpecResult::Matched(pos))
        }
        MatchSpec::Into(inner) => {
            if input.kind != InputKind::Array || pos >= series.len(input.series) {
                return Ok(SpecResult::NoMatch);
            }
            let element = series.array(input.series)[pos];
            let Ok((nested_input, nested_start)) = value_to_input(element) else {
                return Ok(SpecResult::NoMatch);
            };
            let MatchSpec::SubRule(rule_series) = inner.as_ref() else {
                return Err(RunError::new(ErrorKind::ParseRule, "INTO requires a rule block").into());
            };
            let nested_len = series.len(nested_input.series);
            match run_rules(evaluator, series, store, symbols, collector, writer, *rule_series, nested_input, nested_start, ctx)? {
                ParseOutcome::Matched(end) if end == nested_len => Ok(SpecResult::Matched(pos + 1)),
                _ => Ok(SpecResult::NoMatch),
            }
        }
        MatchSpec::Do(inner) => {
            if input.kind != InputKind::Array || pos >= series.len(input.series) {
                return Ok(SpecResult::NoMatch);
            }
            // Documented limitation (module doc): only ever evaluates the
            // single next cell, not a full compound expression.
            let cell = series.array(input.series)[pos];
            let temp = series.make_array(1).map_err(RunError::from).map_err(Signal::from)?;
            series.array_push(temp, cell).map_err(RunError::from).map_err(Signal::from)?;
            series.manage(temp);
            let value = evaluator.eval_block(series, store, symbols, collector, writer, temp, ctx)?;
            let probe = series.make_array(1).map_err(RunError::from).map_err(Signal::from)?;
            series.array_push(probe, value).map_err(RunError::from).map_err(Signal::from)?;
            series.manage(probe);
            let probe_input = InputRef { series: probe, kind: InputKind::Array, binary: false };
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, probe_input, 0, ctx)? {
                SpecResult::Matched(1) | SpecResult::Commit(1) => Ok(SpecResult::Matched(pos + 1)),
                _ => Ok(SpecResult::NoMatch),
            }
        }
        MatchSpec::AcceptNow => Err(Throw::new(ThrowLabel::ParseAccept, Value::Integer(pos as i64)).into()),
        MatchSpec::RejectNow => Err(Throw::new(ThrowLabel::ParseReject, Value::Blank).into()),
        MatchSpec::AlwaysFail => Ok(SpecResult::NoMatch),
        MatchSpec::CommitNow => Ok(SpecResult::Commit(pos)),
        MatchSpec::DebugMark => {
            writer.stdout_write(std::borrow::Cow::Owned(format!("** parse position: {pos}")));
            writer.stdout_push('\n');
            Ok(SpecResult::Matched(pos))
        }
        MatchSpec::Repeat { inner, min, max, allow_zero_advance } => {
            let mut cur = pos;
            let mut count = 0usize;
            let mut committed = None;
            let mut accepted = None;
            let mut rejected = false;
            loop {
                if count >= *max {
                    break;
                }
                // ACCEPT/REJECT thrown by `inner` belong to this loop first
                // (§4.8.5): the nearest enclosing iteration stops the loop
                // as matched/no-match rather than letting the throw escape
                // to `parse()`'s top-level catch, so whatever follows the
                // loop in the enclosing rule stream still runs.
                let step = match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, cur, ctx) {
                    Ok(step) => step,
                    Err(Signal::Throw(throw)) => match throw.catch(ThrowLabel::ParseAccept) {
                        Ok(_) => {
                            accepted = Some(cur);
                            break;
                        }
                        Err(throw) => match throw.catch(ThrowLabel::ParseReject) {
                            Ok(_) => {
                                rejected = true;
                                break;
                            }
                            Err(throw) => return Err(Signal::Throw(throw)),
                        },
                    },
                    Err(err @ Signal::Error(_)) => return Err(err),
                };
                match step {
                    SpecResult::Matched(new_pos) => {
                        let advanced = new_pos != cur;
                        if !advanced && !*allow_zero_advance {
                            break;
                        }
                        cur = new_pos;
                        count += 1;
                        if !advanced && count > WHILE_SAFETY_CAP {
                            break;
                        }
                    }
                    SpecResult::Commit(new_pos) => {
                        cur = new_pos;
                        count += 1;
                        committed = Some(cur);
                        break;
                    }
                    SpecResult::NoMatch => break,
                }
            }
            if let Some(p) = accepted {
                return Ok(SpecResult::Matched(p));
            }
            if rejected {
                return Ok(SpecResult::NoMatch);
            }
            if let Some(p) = committed {
                return Ok(SpecResult::Commit(p));
            }
            if count >= *min { Ok(SpecResult::Matched(cur)) } else { Ok(SpecResult::NoMatch) }
        }
        MatchSpec::SetCapture { target, inner } => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::NoMatch),
                result @ (SpecResult::Matched(new_pos) | SpecResult::Commit(new_pos)) => {
                    let captured = if new_pos > pos {
                        match input.kind {
                            InputKind::Array => series.array(input.series)[pos],
                            InputKind::Text => {
                                decode_char_at(series.bytes(input.series), pos).map_or(Value::Blank, |(c, _)| Value::Char(c))
                            }
                        }
                    } else {
                        Value::Blank
                    };
                    let slot = resolve_var(target, evaluator.frames(), series, store, symbols, true).map_err(Signal::from)?;
                    write_slot(slot, captured, evaluator.frames_mut(), series, store);
                    Ok(result)
                }
            }
        }
        MatchSpec::CopyCapture { target, inner } => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::NoMatch),
                result @ (SpecResult::Matched(new_pos) | SpecResult::Commit(new_pos)) => {
                    let captured = copy_span(series, input, pos, new_pos).map_err(Signal::from)?;
                    let slot = resolve_var(target, evaluator.frames(), series, store, symbols, true).map_err(Signal::from)?;
                    write_slot(slot, captured, evaluator.frames_mut(), series, store);
                    Ok(result)
                }
            }
        }
        MatchSpec::Invert(inner) => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::Matched(pos)),
                SpecResult::Matched(_) | SpecResult::Commit(_) => Ok(SpecResult::NoMatch),
            }
        }
        MatchSpec::Lookahead(inner) => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::NoMatch),
                SpecResult::Matched(_) | SpecResult::Commit(_) => Ok(SpecResult::Matched(pos)),
            }
        }
        MatchSpec::RemoveMatch(inner) => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::NoMatch),
                SpecResult::Matched(new_pos) | SpecResult::Commit(new_pos) => {
                    if new_pos > pos {
                        match input.kind {
                            InputKind::Array => series.array_splice(input.series, pos, new_pos - pos, Vec::new()),
                            InputKind::Text => series.bytes_splice(input.series, pos, new_pos - pos, Vec::new()),
                        }
                        .map_err(RunError::from)
                        .map_err(Signal::from)?;
                    }
                    Ok(SpecResult::Matched(pos))
                }
            }
        }
        MatchSpec::ReturnMatch(inner) => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::NoMatch),
                SpecResult::Matched(new_pos) | SpecResult::Commit(new_pos) => {
                    let captured = copy_span(series, input, pos, new_pos).map_err(Signal::from)?;
                    Err(Throw::new(ThrowLabel::ParseReturn, captured).into())
                }
            }
        }
        MatchSpec::ReturnValue(id) => {
            let value = evaluator.eval_block(series, store, symbols, collector, writer, *id, ctx)?;
            Err(Throw::new(ThrowLabel::ParseReturn, value).into())
        }
        MatchSpec::InsertValue(operand) => {
            let value = eval_value_operand(*operand, evaluator, series, store, symbols, collector, writer, ctx)?;
            let new_pos = splice_insert(series, input, pos, value).map_err(Signal::from)?;
            Ok(SpecResult::Matched(new_pos))
        }
        MatchSpec::ChangeMatch { inner, value } => {
            match eval_spec(inner, evaluator, series, store, symbols, collector, writer, input, pos, ctx)? {
                SpecResult::NoMatch => Ok(SpecResult::NoMatch),
                SpecResult::Matched(new_pos) | SpecResult::Commit(new_pos) => {
                    let replacement = eval_value_operand(*value, evaluator, series, store, symbols, collector, writer, ctx)?;
                    let count = new_pos - pos;
                    let final_pos = splice_change(series, input, pos, count, replacement).map_err(Signal::from)?;
                    Ok(SpecResult::Matched(final_pos))
                }
            }
        }
    }
}

/// Splices `value` into `input` at `pos` with nothing removed, returning the
/// position just past the inserted content (§4.8.3's `INSERT`).
fn splice_insert<R: ResourceTracker>(series: &mut SeriesManager<R>, input: InputRef, pos: usize, value: Value) -> CoreResult<usize> {
    splice_replace(series, input, pos, 0, value)
}

/// Splices `value` into `input` over `[pos, pos+count)`, returning the
/// position just past the replacement content (§4.8.3's `CHANGE`).
fn splice_change<R: ResourceTracker>(series: &mut SeriesManager<R>, input: InputRef, pos: usize, count: usize, value: Value) -> CoreResult<usize> {
    splice_replace(series, input, pos, count, value)
}

fn splice_replace<R: ResourceTracker>(series: &mut SeriesManager<R>, input: InputRef, pos: usize, count: usize, value: Value) -> CoreResult<usize> {
    match input.kind {
        InputKind::Array => {
            series.array_splice(input.series, pos, count, vec![value]).map_err(RunError::from)?;
            Ok(pos + 1)
        }
        InputKind::Text => {
            let bytes = match value {
                Value::Char(c) => c.to_string().into_bytes(),
                Value::String(p) | Value::Binary(p) => series.bytes(p.series).to_vec(),
                Value::Integer(n) => vec![u8::try_from(n).unwrap_or(0)],
                _ => return Err(RunError::new(ErrorKind::ParseRule, "cannot splice this value kind into a text series")),
            };
            let len = bytes.len();
            series.bytes_splice(input.series, pos, count, bytes).map_err(RunError::from)?;
            Ok(pos + len)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{interpreter::Interpreter, io::NoPrint, value::Value};

    #[test]
    fn straight_iteration_over_text_matches_to_end() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp.eval_str(&mut writer, r#"parse "aaabbb" [some "a" some "b" end]"#).unwrap();
        assert_eq!(result, Value::Logic(true));
    }

    #[test]
    fn straight_iteration_fails_when_input_remains() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp.eval_str(&mut writer, r#"parse "aaabbc" [some "a" some "b" end]"#).unwrap();
        assert_eq!(result, Value::Logic(false));
    }

    /// Exercises both fixes threaded through `parse`'s entry point: the
    /// datatype words `integer!`/`string!` resolving as typeset matchers, and
    /// `pair` (a word that appears only inside the rule block, never bound
    /// by `Interpreter::eval_str`'s top-level, non-deep bind pass) resolving
    /// as a `COPY` capture target.
    #[test]
    fn copy_capture_with_datatype_subrule_matches_and_binds() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp
            .eval_str(&mut writer, r#"parse [1 "x" 2 "y"] [some [copy pair [integer! string!]]]"#)
            .unwrap();
        assert_eq!(result, Value::Logic(true));

        let pair = interp.eval_str(&mut writer, "pair").unwrap();
        let Value::Block(pos) = pair else { panic!("expected pair to hold a captured block") };
        assert_eq!(interp.series().len(pos.series), 2);
    }

    #[test]
    fn return_from_group_escapes_parse_with_its_value() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp.eval_str(&mut writer, r#"parse "1020" [(return 42) not-seen]"#).unwrap();
        assert_eq!(result, Value::Integer(42));
    }

    #[test]
    fn reject_inside_nested_alternation_fails_the_whole_parse() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp.eval_str(&mut writer, r#"parse "abc" [some [["a" | "b" | reject] skip]]"#).unwrap();
        assert_eq!(result, Value::Logic(false));
    }

    #[test]
    fn accept_escaping_every_frame_is_treated_as_success() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp.eval_str(&mut writer, r#"parse "ab" [some ["a" | "b" | accept]]"#).unwrap();
        assert_eq!(result, Value::Logic(true));
    }

    #[test]
    fn accept_inside_a_loop_still_lets_rules_after_the_loop_run() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        // `accept` here only breaks the `some` loop; the trailing `end` must
        // still be checked against whatever position the loop stopped at.
        let matched = interp.eval_str(&mut writer, r#"parse "ab" [some ["a" | "b" | accept] end]"#).unwrap();
        assert_eq!(matched, Value::Logic(true));

        let unmatched = interp.eval_str(&mut writer, r#"parse "abc" [some ["a" | "b" | accept] end]"#).unwrap();
        assert_eq!(unmatched, Value::Logic(false));
    }

    #[test]
    fn bare_path_rule_cell_dereferences_through_a_context() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        interp.eval_str(&mut writer, r#"obj: make _ [needle: "a"]"#).unwrap();
        let result = interp.eval_str(&mut writer, r#"parse "a" [obj/needle]"#).unwrap();
        assert_eq!(result, Value::Logic(true));
    }

    #[test]
    fn into_descends_into_a_nested_block() {
        let mut interp = Interpreter::new();
        let mut writer = NoPrint;
        let result = interp.eval_str(&mut writer, r#"parse [[1 2] 3] [into [integer! integer!] integer!]"#).unwrap();
        assert_eq!(result, Value::Logic(true));
    }
}

