//! Property tests for the round-trip and invariant claims in
//! `SPEC_FULL.md` §8 ("Testable properties"), exercised with `quickcheck`
//! the way the teacher reaches for it in its own `tests/` directory rather
//! than hand-enumerating cases.
//!
//! Two properties are checked here that the crate's own `#[cfg(test)]`
//! modules don't already cover end-to-end:
//! - `unbind(bind(block, ctx), ctx) == block` structurally (modulo binding
//!   bits) for a block containing only words whose canon symbols land in
//!   `ctx` (§8 "Round-trips").
//! - `copy(c)` has the same slot count, the same slot symbols, and the same
//!   slot values as `c` (§8 "Round-trips").

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use skein::{unbind_values_core, BindFlags, Interpreter, SeriesManager, SymbolTable, Value};

/// A small, fixed vocabulary of word spellings, small enough that
/// `quickcheck`'s shrinker actually exercises repeats and that collect's
/// dedup path gets hit.
const WORD_POOL: &[&str] = &["a", "b", "c", "x", "y"];

/// A block made of a handful of plain words, generated as indices into
/// [`WORD_POOL`] (`u8`, not `&'static str`, so the derived-style `Vec<u8>`
/// shrinker quickcheck ships can narrow a failing case on its own).
#[derive(Debug, Clone)]
struct WordBlock {
    indices: Vec<u8>,
}

impl Arbitrary for WordBlock {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 6;
        let indices = (0..len).map(|_| u8::arbitrary(g) % WORD_POOL.len() as u8).collect();
        Self { indices }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.indices.shrink().map(|indices| Self { indices }))
    }
}

impl WordBlock {
    fn names(&self) -> Vec<&'static str> {
        self.indices.iter().map(|&i| WORD_POOL[i as usize % WORD_POOL.len()]).collect()
    }

    fn source(&self) -> String {
        format!("[{}]", self.names().join(" "))
    }
}

/// Structural equality ignoring a word cell's binding, the "modulo binding
/// bits" qualifier §8's round-trip property names explicitly.
fn cells_equal_modulo_binding(series: &SeriesManager<skein::NoLimitTracker>, a: skein::SeriesId, b: skein::SeriesId) -> bool {
    if series.len(a) != series.len(b) {
        return false;
    }
    series.array(a).iter().zip(series.array(b).iter()).all(|(x, y)| match (x, y) {
        (Value::Word { symbol: sx, kind: kx, .. }, Value::Word { symbol: sy, kind: ky, .. }) => sx == sy && kx == ky,
        _ => x == y,
    })
}

#[quickcheck]
fn unbind_after_bind_restores_the_original_block(block: WordBlock) -> bool {
    let mut interp = Interpreter::new();
    let mut writer = skein::NoPrint;
    // Build a context whose keys are exactly the words this block will use,
    // so every word is eligible to be bound (no ADD_NEW needed, matching the
    // round-trip claim's "whose canon symbols are in ctx" precondition).
    for name in block.names() {
        interp.eval_str(&mut writer, &format!("{name}: 0")).unwrap();
    }

    let Value::Block(before_pos) = interp.eval_str(&mut writer, &block.source()).unwrap() else {
        panic!("block literal did not scan to a Block value");
    };
    let original = before_pos.series;

    // A second, independent copy to bind/unbind in place, so `original`
    // stays untouched as the comparison baseline.
    let copy = interp.series_mut().copy_array_shallow(original, 0).unwrap();
    interp.series_mut().manage(copy);

    interp.bind_against_session(copy, BindFlags::DEEP).unwrap();
    unbind_values_core(interp.series_mut(), copy, Some(interp.session()), true);

    cells_equal_modulo_binding(interp.series(), original, copy)
}

#[quickcheck]
fn context_copy_preserves_slot_count_and_values(block: WordBlock) -> bool {
    let mut interp = Interpreter::new();
    let mut writer = skein::NoPrint;
    let spec = format!("[{}]", block.names().iter().enumerate().map(|(i, n)| format!("{n}: {i}")).collect::<Vec<_>>().join(" "));
    let Value::Context { id: original, .. } = interp.eval_str(&mut writer, &format!("make _ {spec}")).unwrap() else {
        panic!("make object! did not return a context");
    };

    let copy = interp.store_mut().copy_shallow(interp.series_mut(), original, 0).unwrap();

    let orig_record = interp.store().get(original);
    let copy_record = interp.store().get(copy);
    let same_len = interp.series().len(orig_record.varlist) == interp.series().len(copy_record.varlist);
    // Slots 0 (the self-referring root cell) and 1 (the hidden `SELF` key,
    // §3.4) necessarily differ after a copy — they're fixed up to point at
    // the *new* context, per `context.rs`'s `copy_shallow` doc comment. The
    // round-trip claim ("each slot-value structurally equal") is about the
    // user-visible keys that follow.
    let same_values = interp.series().array(orig_record.varlist)[2..] == interp.series().array(copy_record.varlist)[2..];
    same_len && same_values
}

#[test]
fn bind_table_is_drained_after_many_interleaved_binds() {
    // `bind_values_core`/`collect_context` assert the bind-table is drained
    // on entry (§8 invariant 1); running a long interleaved sequence without
    // panicking is itself the property under test.
    let mut interp = Interpreter::new();
    let mut writer = skein::NoPrint;
    for i in 0..64 {
        let src = format!("make _ [k{i}: {i} nested: [inner{i}: {i}]]");
        interp.eval_str(&mut writer, &src).unwrap();
    }
}

#[test]
fn symbol_table_canon_is_reflexive_and_case_insensitive() {
    let mut symbols = SymbolTable::new();
    let lower = symbols.intern("foo-bar");
    let upper = symbols.intern("FOO-BAR");
    let mixed = symbols.intern("Foo-Bar");
    assert!(symbols.canon_eq(lower, upper));
    assert!(symbols.canon_eq(lower, mixed));
    assert!(symbols.canon_eq(lower, lower));
}

#[quickcheck]
fn array_stays_terminated_after_random_extends(lengths: Vec<u8>) -> bool {
    let mut series = SeriesManager::new(skein::NoLimitTracker);
    let id = series.make_array(0).unwrap();
    let mut expected_len = 0usize;
    for &n in lengths.iter().take(32) {
        let n = (n % 8) as usize;
        series.array_extend(id, std::iter::repeat_n(Value::Integer(1), n)).unwrap();
        expected_len += n;
        if series.len(id) != expected_len {
            return false;
        }
    }
    true
}
