//! The mold (printer) implementation (`SPEC_FULL.md` §6 "Printer interface",
//! ambient component table in §2).
//!
//! There is no single teacher file this descends from line-for-line — the
//! teacher's own printer lives in an external crate (`ruff_python_ast`'s
//! unparsing), not hand-written source here. This instead follows the shape
//! `scan.rs` establishes for the other half of the loader/printer pair: a
//! small recursive function over [`crate::value::Value`] driven by its
//! `kind()`, reading through the same [`crate::series::SeriesManager`] +
//! [`crate::symbol::SymbolTable`] pair every other module threads. Good
//! enough to render REPL results and error messages (§6); not a
//! round-trip-exact re-scanner.

use std::fmt::Write as _;

use crate::{resource::ResourceTracker, series::SeriesManager, symbol::SymbolTable, value::Value, value::ValueKind};

/// Renders `value` as its literal surface form. Nested blocks/groups/paths
/// recurse through the same series manager; words are rendered with their
/// kind's prefix/suffix marker (`:get`, `'lit`, `/refinement`, `set:`).
#[must_use]
pub fn mold<R: ResourceTracker>(series: &SeriesManager<R>, symbols: &SymbolTable, value: &Value) -> String {
    let mut out = String::new();
    mold_into(&mut out, series, symbols, value);
    out
}

fn mold_into<R: ResourceTracker>(out: &mut String, series: &SeriesManager<R>, symbols: &SymbolTable, value: &Value) {
    match value {
        Value::End => out.push_str("#[end]"),
        Value::Void => {}
        Value::Blank => out.push('_'),
        Value::Logic(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Decimal(d) => {
            let _ = write!(out, "{d}");
        }
        Value::Char(c) => {
            let _ = write!(out, "#\"{c}\"");
        }
        Value::Word { symbol, kind, .. } => mold_word(out, symbols, *symbol, *kind),
        Value::Block(pos) => mold_sequence(out, series, symbols, pos.series, '[', ']'),
        Value::Group(pos) => mold_sequence(out, series, symbols, pos.series, '(', ')'),
        Value::Path { pos, .. } => {
            let cells = series.array(pos.series);
            for (i, cell) in cells.iter().enumerate() {
                if i > 0 {
                    out.push('/');
                }
                mold_into(out, series, symbols, cell);
            }
        }
        Value::String(pos) => {
            out.push('"');
            out.push_str(std::str::from_utf8(series.bytes(pos.series)).unwrap_or("<invalid utf-8>"));
            out.push('"');
        }
        Value::Binary(pos) => {
            let _ = write!(out, "#{{{}}}", hex(series.bytes(pos.series)));
        }
        Value::Bitset(_) => out.push_str("#[bitset]"),
        Value::Typeset { symbol, .. } => {
            let _ = write!(out, "#[typeset {}]", symbols.text(*symbol));
        }
        Value::Function(_) => out.push_str("#[function]"),
        Value::Context { kind, .. } => {
            let tag = match kind {
                crate::value::ContextKind::Object => "object",
                crate::value::ContextKind::Module => "module",
                crate::value::ContextKind::Port => "port",
                crate::value::ContextKind::Error => "error",
            };
            let _ = write!(out, "#[{tag}]");
        }
    }
}

fn mold_sequence<R: ResourceTracker>(
    out: &mut String,
    series: &SeriesManager<R>,
    symbols: &SymbolTable,
    id: crate::series::SeriesId,
    open: char,
    close: char,
) {
    out.push(open);
    for (i, cell) in series.array(id).iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        mold_into(out, series, symbols, cell);
    }
    out.push(close);
}

fn mold_word(out: &mut String, symbols: &SymbolTable, symbol: crate::symbol::Symbol, kind: ValueKind) {
    let text = symbols.text(symbol);
    match kind {
        ValueKind::GetWord => {
            out.push(':');
            out.push_str(text);
        }
        ValueKind::LitWord => {
            out.push('\'');
            out.push_str(text);
        }
        ValueKind::Refinement => {
            out.push('/');
            out.push_str(text);
        }
        ValueKind::SetWord => {
            out.push_str(text);
            out.push(':');
        }
        _ => out.push_str(text),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resource::NoLimitTracker, value::Binding};

    #[test]
    fn molds_scalars() {
        let series = SeriesManager::new(NoLimitTracker);
        let symbols = SymbolTable::new();
        assert_eq!(mold(&series, &symbols, &Value::Integer(42)), "42");
        assert_eq!(mold(&series, &symbols, &Value::Logic(true)), "true");
        assert_eq!(mold(&series, &symbols, &Value::Blank), "_");
    }

    #[test]
    fn molds_word_kinds_with_markers() {
        let series = SeriesManager::new(NoLimitTracker);
        let mut symbols = SymbolTable::new();
        let symbol = symbols.intern("foo");
        let get = Value::Word { symbol, kind: ValueKind::GetWord, binding: Binding::Unbound };
        let set = Value::Word { symbol, kind: ValueKind::SetWord, binding: Binding::Unbound };
        let lit = Value::Word { symbol, kind: ValueKind::LitWord, binding: Binding::Unbound };
        assert_eq!(mold(&series, &symbols, &get), ":foo");
        assert_eq!(mold(&series, &symbols, &set), "foo:");
        assert_eq!(mold(&series, &symbols, &lit), "'foo");
    }

    #[test]
    fn molds_nested_block() {
        let mut series = SeriesManager::new(NoLimitTracker);
        let symbols = SymbolTable::new();
        let inner = series.make_array(2).unwrap();
        series.array_extend(inner, [Value::Integer(1), Value::Integer(2)]).unwrap();
        series.manage(inner);
        let outer = series.make_array(1).unwrap();
        series.array_extend(outer, [Value::Block(crate::value::SeriesPos { series: inner, index: 0 })]).unwrap();
        series.manage(outer);
        let block = Value::Block(crate::value::SeriesPos { series: outer, index: 0 });
        assert_eq!(mold(&series, &symbols, &block), "[[1 2]]");
    }
}
