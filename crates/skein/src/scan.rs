//! The minimal scanner (`SPEC_FULL.md` §2 "Minimal scanner/builder", §6
//! "Loader/scanner implementation").
//!
//! Grounded on the loader interface contract in §6: "a function that, given
//! a byte source, yields an array series of unbound value cells. The core
//! does not prescribe the lexical grammar." There is no single teacher file
//! this mirrors one-to-one (the teacher's lexer is the external
//! `ruff_python_parser` crate, not hand-written source in this codebase) —
//! this instead reads like the hand-rolled recursive-descent readers found
//! across the retrieval pack's `other_examples/`, sized to exactly the
//! surface syntax §6 calls out: blocks, groups, strings, integers, decimals,
//! char literals, words and their set-/get-/lit-/refinement variants, and
//! `;`-comments. Every word produced is unbound (`Binding::Unbound`); binding
//! them against a context is `bind.rs`'s job, not the scanner's.
//!
//! Scanning is two passes: [`lex`] walks the raw text into a tree of
//! [`RawCell`]s using only `&str` (no arena access needed yet), then
//! [`materialize`] walks that tree interning words/strings and allocating one
//! managed array series per nested block/group.

use crate::{
    error::{ErrorKind, Result, RunError},
    resource::ResourceTracker,
    series::{SeriesId, SeriesManager},
    symbol::SymbolTable,
    value::{Binding, SeriesPos, Value, ValueKind},
};

/// Scans `text` into a freshly allocated, managed array series holding the
/// top-level sequence of unbound value cells (the loader interface's output,
/// §6). Nested `[...]`/`(...)` become their own managed array series.
pub fn scan<R: ResourceTracker>(series: &mut SeriesManager<R>, symbols: &mut SymbolTable, text: &str) -> Result<SeriesId> {
    let mut lexer = Lexer { chars: text.char_indices().peekable() };
    let raw = lexer.lex_sequence(None)?;
    materialize(series, symbols, raw)
}

/// Raw cell, pre-series-allocation: nested blocks/groups carry their content
/// as plain `Vec`s until [`materialize`] has a `SeriesManager` to hand.
enum RawCell {
    Scalar(Value),
    Str(String),
    Word(String, ValueKind),
    Block(Vec<RawCell>),
    Group(Vec<RawCell>),
    /// A `/`-separated path (`obj/a`, `:obj/a`, `'obj/a`, `obj/a:`): each
    /// segment lexes as a plain word's text; `kind` records which of
    /// `Path`/`GetPath`/`LitPath`/`SetPath` the leading `:`/`'`/trailing `:`
    /// marked it as.
    Path(Vec<String>, ValueKind),
}

fn materialize<R: ResourceTracker>(
    series: &mut SeriesManager<R>,
    symbols: &mut SymbolTable,
    cells: Vec<RawCell>,
) -> Result<SeriesId> {
    let values = materialize_cells(series, symbols, cells)?;
    let id = series.make_array(values.len()).map_err(RunError::from)?;
    series.array_extend(id, values).map_err(RunError::from)?;
    series.manage(id);
    Ok(id)
}

fn materialize_cells<R: ResourceTracker>(
    series: &mut SeriesManager<R>,
    symbols: &mut SymbolTable,
    cells: Vec<RawCell>,
) -> Result<Vec<Value>> {
    cells
        .into_iter()
        .map(|cell| materialize_one(series, symbols, cell))
        .collect()
}

fn materialize_one<R: ResourceTracker>(series: &mut SeriesManager<R>, symbols: &mut SymbolTable, cell: RawCell) -> Result<Value> {
    Ok(match cell {
        RawCell::Scalar(value) => value,
        RawCell::Str(text) => {
            let id = series.make_bytes(text.len()).map_err(RunError::from)?;
            series.bytes_mut(id).extend_from_slice(text.as_bytes());
            series.manage(id);
            Value::String(SeriesPos { series: id, index: 0 })
        }
        RawCell::Word(text, kind) => {
            let symbol = symbols.intern(&text);
            Value::Word { symbol, kind, binding: Binding::Unbound }
        }
        RawCell::Block(inner) => {
            let values = materialize_cells(series, symbols, inner)?;
            let id = series.make_array(values.len()).map_err(RunError::from)?;
            series.array_extend(id, values).map_err(RunError::from)?;
            series.manage(id);
            Value::Block(SeriesPos { series: id, index: 0 })
        }
        RawCell::Group(inner) => {
            let values = materialize_cells(series, symbols, inner)?;
            let id = series.make_array(values.len()).map_err(RunError::from)?;
            series.array_extend(id, values).map_err(RunError::from)?;
            series.manage(id);
            Value::Group(SeriesPos { series: id, index: 0 })
        }
        RawCell::Path(segments, kind) => {
            let values: Vec<Value> = segments
                .into_iter()
                .map(|text| {
                    let symbol = symbols.intern(&text);
                    Value::Word { symbol, kind: ValueKind::Word, binding: Binding::Unbound }
                })
                .collect();
            let id = series.make_array(values.len()).map_err(RunError::from)?;
            series.array_extend(id, values).map_err(RunError::from)?;
            series.manage(id);
            Value::Path { pos: SeriesPos { series: id, index: 0 }, kind }
        }
    })
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.next_char();
                }
                Some(';') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.next_char();
                    }
                }
                _ => break,
            }
        }
    }

    /// Lexes a sequence of cells until `closer` (for nested blocks/groups) or
    /// end-of-input (top level).
    fn lex_sequence(&mut self, closer: Option<char>) -> Result<Vec<RawCell>> {
        let mut cells = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match (self.peek_char(), closer) {
                (None, None) => break,
                (None, Some(c)) => return Err(scan_error(format!("unterminated block, expected '{c}'"))),
                (Some(c), Some(expected)) if c == expected => {
                    self.next_char();
                    break;
                }
                _ => cells.push(self.lex_one()?),
            }
        }
        Ok(cells)
    }

    fn lex_one(&mut self) -> Result<RawCell> {
        let c = self.peek_char().expect("lex_one called at end of input");
        match c {
            '[' => {
                self.next_char();
                Ok(RawCell::Block(self.lex_sequence(Some(']'))?))
            }
            '(' => {
                self.next_char();
                Ok(RawCell::Group(self.lex_sequence(Some(')'))?))
            }
            '"' => Ok(RawCell::Str(self.lex_string()?)),
            '#' => self.lex_char_literal(),
            ':' => {
                self.next_char();
                let word = self.lex_word_text()?;
                self.lex_path_tail(word, ValueKind::GetWord, ValueKind::GetPath)
            }
            '\'' => {
                self.next_char();
                let word = self.lex_word_text()?;
                self.lex_path_tail(word, ValueKind::LitWord, ValueKind::LitPath)
            }
            '/' => {
                self.next_char();
                let word = self.lex_word_text()?;
                Ok(RawCell::Word(word, ValueKind::Refinement))
            }
            c if c == '-' || c == '+' || c.is_ascii_digit() => self.lex_number_or_word(),
            _ => self.lex_word_or_set_word(),
        }
    }

    fn lex_string(&mut self) -> Result<String> {
        self.next_char(); // opening quote
        let mut out = String::new();
        loop {
            match self.next_char() {
                None => return Err(scan_error("unterminated string")),
                Some('"') => break,
                Some('\\') => match self.next_char() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => out.push(other),
                    None => return Err(scan_error("unterminated escape in string")),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    /// `#"x"` char literals.
    fn lex_char_literal(&mut self) -> Result<RawCell> {
        self.next_char(); // '#'
        if self.peek_char() != Some('"') {
            return Err(scan_error("expected '\"' after '#' in char literal"));
        }
        let text = self.lex_string()?;
        let mut chars = text.chars();
        let ch = chars.next().ok_or_else(|| scan_error("empty char literal"))?;
        if chars.next().is_some() {
            return Err(scan_error("char literal must contain exactly one character"));
        }
        Ok(RawCell::Scalar(Value::Char(ch)))
    }

    fn is_word_char(c: char) -> bool {
        !c.is_whitespace() && !matches!(c, '[' | ']' | '(' | ')' | '"' | ';' | ':' | '/')
    }

    /// After lexing `first`'s word text, checks for a `/`-separated path
    /// continuation. With none, returns a plain `RawCell::Word` of
    /// `bare_kind`; with one or more `/segment`s, collects them all into a
    /// `RawCell::Path` of `path_kind`.
    fn lex_path_tail(&mut self, first: String, bare_kind: ValueKind, path_kind: ValueKind) -> Result<RawCell> {
        if self.peek_char() != Some('/') {
            return Ok(RawCell::Word(first, bare_kind));
        }
        let mut segments = vec![first];
        while self.peek_char() == Some('/') {
            self.next_char();
            segments.push(self.lex_word_text()?);
        }
        Ok(RawCell::Path(segments, path_kind))
    }

    fn lex_word_text(&mut self) -> Result<String> {
        let mut word = String::new();
        while let Some(c) = self.peek_char() {
            if Self::is_word_char(c) {
                word.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        if word.is_empty() {
            return Err(scan_error("expected a word"));
        }
        Ok(word)
    }

    fn lex_word_or_set_word(&mut self) -> Result<RawCell> {
        let word = self.lex_word_text()?;
        if self.peek_char() == Some('/') {
            let mut segments = vec![word];
            while self.peek_char() == Some('/') {
                self.next_char();
                segments.push(self.lex_word_text()?);
            }
            let kind = if self.peek_char() == Some(':') {
                self.next_char();
                ValueKind::SetPath
            } else {
                ValueKind::Path
            };
            return Ok(RawCell::Path(segments, kind));
        }
        if self.peek_char() == Some(':') {
            self.next_char();
            Ok(RawCell::Word(word, ValueKind::SetWord))
        } else if word == "_" {
            // Bare underscore is the blank literal, not a word (§3.3's
            // BLANK datatype needs *some* surface spelling and this is the
            // source dialect's own).
            Ok(RawCell::Scalar(Value::Blank))
        } else {
            Ok(RawCell::Word(word, ValueKind::Word))
        }
    }

    /// Disambiguates `10`, `-3.5`, and a symbol-ish word that merely starts
    /// with a digit/sign (e.g. bare `-` or `+` used as an operator word)
    /// from a genuine number literal.
    fn lex_number_or_word(&mut self) -> Result<RawCell> {
        let start = self.chars.clone();
        let mut text = String::new();
        if matches!(self.peek_char(), Some('-') | Some('+')) {
            text.push(self.next_char().expect("peeked"));
        }
        let mut saw_digit = false;
        let mut saw_dot = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                saw_digit = true;
                text.push(c);
                self.next_char();
            } else if c == '.' && !saw_dot {
                saw_dot = true;
                text.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        if !saw_digit || self.peek_char().is_some_and(Self::is_word_char) {
            // Not a clean number (e.g. "-foo" or "1x2"): rewind and lex as a word.
            self.chars = start;
            return self.lex_word_or_set_word();
        }
        if saw_dot {
            let value: f64 = text.parse().map_err(|_| scan_error(format!("malformed decimal '{text}'")))?;
            Ok(RawCell::Scalar(Value::Decimal(value)))
        } else {
            let value: i64 = text.parse().map_err(|_| scan_error(format!("malformed integer '{text}'")))?;
            Ok(RawCell::Scalar(Value::Integer(value)))
        }
    }
}

fn scan_error(detail: impl Into<String>) -> RunError {
    RunError::new(ErrorKind::ScanError, detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resource::NoLimitTracker, value::ValueKind};

    fn harness() -> (SeriesManager<NoLimitTracker>, SymbolTable) {
        (SeriesManager::new(NoLimitTracker), SymbolTable::new())
    }

    #[test]
    fn scans_a_flat_block_of_scalars() {
        let (mut series, mut symbols) = harness();
        let id = scan(&mut series, &mut symbols, "1 2.5 \"hi\"").unwrap();
        assert_eq!(series.len(id), 3);
        assert_eq!(series.array(id)[0], Value::Integer(1));
        assert_eq!(series.array(id)[1], Value::Decimal(2.5));
        assert!(matches!(series.array(id)[2], Value::String(_)));
    }

    #[test]
    fn scans_nested_block_and_word_kinds() {
        let (mut series, mut symbols) = harness();
        let id = scan(&mut series, &mut symbols, "a: [:b 'c /d]").unwrap();
        assert_eq!(series.len(id), 2);
        let (symbol, kind, binding) = series.array(id)[0].as_word().unwrap();
        assert_eq!(kind, ValueKind::SetWord);
        assert_eq!(binding, Binding::Unbound);
        assert_eq!(symbols.text(symbol), "a");
        let Value::Block(pos) = series.array(id)[1] else { panic!("expected a block") };
        let inner = series.array(pos.series);
        assert_eq!(inner.len(), 3);
        assert_eq!(inner[0].as_word().unwrap().1, ValueKind::GetWord);
        assert_eq!(inner[1].as_word().unwrap().1, ValueKind::LitWord);
        assert_eq!(inner[2].as_word().unwrap().1, ValueKind::Refinement);
    }

    #[test]
    fn scans_multi_segment_paths_and_their_prefixed_variants() {
        let (mut series, mut symbols) = harness();
        let id = scan(&mut series, &mut symbols, "obj/a :obj/a 'obj/a obj/a: obj/a/b").unwrap();
        assert_eq!(series.len(id), 5);

        let check = |value: Value, expected_kind: ValueKind, expected_segments: &[&str]| {
            let Value::Path { pos, kind } = value else { panic!("expected a path") };
            assert_eq!(kind, expected_kind);
            let segments = series.array(pos.series);
            assert_eq!(segments.len(), expected_segments.len());
            for (segment, &expected) in segments.iter().zip(expected_segments) {
                let (symbol, kind, binding) = segment.as_word().unwrap();
                assert_eq!(kind, ValueKind::Word);
                assert_eq!(binding, Binding::Unbound);
                assert_eq!(symbols.text(symbol), expected);
            }
        };

        check(series.array(id)[0], ValueKind::Path, &["obj", "a"]);
        check(series.array(id)[1], ValueKind::GetPath, &["obj", "a"]);
        check(series.array(id)[2], ValueKind::LitPath, &["obj", "a"]);
        check(series.array(id)[3], ValueKind::SetPath, &["obj", "a"]);
        check(series.array(id)[4], ValueKind::Path, &["obj", "a", "b"]);
    }

    #[test]
    fn comments_are_skipped() {
        let (mut series, mut symbols) = harness();
        let id = scan(&mut series, &mut symbols, "1 ; a comment\n2").unwrap();
        assert_eq!(series.array(id), &[Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn negative_integer_vs_operator_word() {
        let (mut series, mut symbols) = harness();
        let id = scan(&mut series, &mut symbols, "-5 - 5").unwrap();
        assert_eq!(series.array(id)[0], Value::Integer(-5));
        assert_eq!(series.array(id)[1].as_word().unwrap().1, ValueKind::Word);
        assert_eq!(series.array(id)[2], Value::Integer(5));
    }

    #[test]
    fn bare_underscore_scans_as_blank() {
        let (mut series, mut symbols) = harness();
        let id = scan(&mut series, &mut symbols, "_").unwrap();
        assert_eq!(series.array(id), &[Value::Blank]);
    }

    #[test]
    fn unterminated_block_is_a_scan_error() {
        let (mut series, mut symbols) = harness();
        let err = scan(&mut series, &mut symbols, "[1 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ScanError);
    }
}
