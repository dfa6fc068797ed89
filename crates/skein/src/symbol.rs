//! The symbol table (`SPEC_FULL.md` §3.1).
//!
//! Grounded on `intern.rs`'s `StringId`: a small `Copy` index newtype, a
//! `LazyLock`-built table of compile-time-known strings, and an `AHashMap`
//! for everything interned at runtime. Unlike `StringId`, a `Symbol` here is
//! never freed once interned and canon-folding is part of the table itself
//! (case folding is meaningful for *words*, not for arbitrary string literals,
//! which is what the original interner was built for).

use std::sync::LazyLock;

use ahash::AHashMap;

/// Index into the symbol table. `0` is the reserved "no symbol" / root-key
/// sentinel ([`SYM_0`]); real symbols start at `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("symbol table exceeded u32::MAX entries"))
    }
}

/// Reserved "no symbol" sentinel: the root key of every key-list (§3.4) and
/// the value a bind-table slot holds for "unbound".
pub const SYM_0: Symbol = Symbol(0);

/// Well-known symbols fixed at table-construction time, comparable to the
/// teacher's `StaticStrings` enum but sized to this dialect's needs rather
/// than a Python stdlib method-name vocabulary.
macro_rules! well_known_symbols {
    ($($const_name:ident => $text:literal),+ $(,)?) => {
        well_known_symbols!(@count 0usize; $($const_name => $text),+);

        static WELL_KNOWN: LazyLock<Vec<&'static str>> = LazyLock::new(|| vec![$($text),+]);
    };
    (@count $n:expr; $const_name:ident => $text:literal $(, $rest_name:ident => $rest_text:literal)*) => {
        #[doc = concat!("Well-known symbol for `", $text, "`.")]
        pub const $const_name: Symbol = Symbol(1 + $n as u32);
        well_known_symbols!(@count $n + 1usize; $($rest_name => $rest_text),*);
    };
    (@count $n:expr;) => {};
}

well_known_symbols! {
    SYM_SELF => "self",
    SYM_TRUE => "true",
    SYM_FALSE => "false",
    SYM_NONE => "none",
    SYM_BLOCK_TYPE => "block!",
    SYM_STRING_TYPE => "string!",
    SYM_INTEGER_TYPE => "integer!",
    SYM_WORD_TYPE => "word!",
    SYM_PARSE => "parse",
    SYM_PARSE_ACCEPT => "parse-accept",
    SYM_PARSE_REJECT => "parse-reject",
    SYM_RETURN => "return",
    // PARSE dialect rule vocabulary (§4.8.2). Interned up front so `parse.rs`
    // can compare a rule cell's symbol against a constant instead of calling
    // `SymbolTable::intern` (and risking it mint a *new* symbol) on every step.
    SYM_SKIP => "skip",
    SYM_END => "end",
    SYM_TO => "to",
    SYM_THRU => "thru",
    SYM_QUOTE => "quote",
    SYM_ANY => "any",
    SYM_SOME => "some",
    SYM_WHILE => "while",
    SYM_OPT => "opt",
    SYM_COPY => "copy",
    SYM_SET => "set",
    SYM_NOT => "not",
    SYM_AND => "and",
    SYM_AHEAD => "ahead",
    SYM_THEN => "then",
    SYM_REMOVE => "remove",
    SYM_INSERT => "insert",
    SYM_CHANGE => "change",
    SYM_ACCEPT => "accept",
    SYM_BREAK => "break",
    SYM_REJECT => "reject",
    SYM_FAIL => "fail",
    SYM_IF => "if",
    SYM_INTO => "into",
    SYM_DO => "do",
    SYM_LIMIT => "limit",
    SYM_BAR => "|",
    SYM_QUESTION => "?",
}

/// Process-wide append-only interner mapping canonical text to [`Symbol`]s.
///
/// Case-folding: every symbol has a *canon* form (`canon_of`); two words with
/// the same canon form are the "same symbol family" for binding purposes even
/// though distinct-case spellings intern to distinct `Symbol`s (so that molding
/// a word back out preserves the spelling it was scanned with).
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<Box<str>>,
    by_text: AHashMap<Box<str>, Symbol>,
    canon_of: Vec<Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self { names: Vec::new(), by_text: AHashMap::new(), canon_of: Vec::new() };
        // SYM_0 occupies index 0 with empty text; never looked up by text.
        table.names.push(String::new().into_boxed_str());
        table.canon_of.push(SYM_0);
        for &text in WELL_KNOWN.iter() {
            table.intern(text);
        }
        table
    }

    /// Interns `text`, returning an existing symbol if already known.
    pub fn intern(&mut self, text: &str) -> Symbol {
        if let Some(&sym) = self.by_text.get(text) {
            return sym;
        }
        let sym = Symbol::from_index(self.names.len());
        self.names.push(text.into());
        self.by_text.insert(text.into(), sym);

        let folded = text.to_lowercase();
        let canon = if folded == text { sym } else { self.intern(&folded) };
        self.canon_of.push(canon);
        sym
    }

    #[must_use]
    pub fn text(&self, sym: Symbol) -> &str {
        &self.names[sym.index()]
    }

    /// Canonical (case-folded) representative of `sym`'s symbol family, used
    /// by the bind-table and by collect (§4.3) for duplicate detection.
    #[must_use]
    pub fn canon(&self, sym: Symbol) -> Symbol {
        self.canon_of[sym.index()]
    }

    #[must_use]
    pub fn canon_eq(&self, a: Symbol, b: Symbol) -> bool {
        self.canon(a) == self.canon(b)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false // SYM_0 is always present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("foo");
        let b = table.intern("foo");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_case_interns_distinct_but_canon_equal() {
        let mut table = SymbolTable::new();
        let lower = table.intern("foo");
        let upper = table.intern("FOO");
        assert_ne!(lower, upper);
        assert!(table.canon_eq(lower, upper));
    }

    #[test]
    fn well_known_symbols_resolve_to_their_text() {
        let table = SymbolTable::new();
        assert_eq!(table.text(SYM_SELF), "self");
        assert_eq!(table.text(SYM_PARSE), "parse");
    }

    #[test]
    fn sym_0_has_no_text_and_is_its_own_canon() {
        let table = SymbolTable::new();
        assert_eq!(table.text(SYM_0), "");
        assert_eq!(table.canon(SYM_0), SYM_0);
    }
}
