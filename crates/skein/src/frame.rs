//! The evaluator frame (`SPEC_FULL.md` §3.7, §4.6).
//!
//! Grounded on the stack-frame shape described in `bytecode/vm/mod.rs`'s
//! module doc ("each frame owns its instruction pointer") and on
//! `namespace.rs`'s `Namespaces` for the "own struct, not a global, holding
//! the stack" discipline `FS_TOP` is reframed into here (§3.7's note that
//! `FS_TOP` is an explicit `Vec<Frame>` field on the interpreter rather than
//! a global).

use crate::{context::FunctionId, series::SeriesId, value::Value};

/// Index of a frame within [`crate::eval::Evaluator`]'s frame stack. Only
/// ever compared to the stack's current length; never dereferenced once the
/// frame it named has been popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameId(pub usize);

/// What a frame is doing, used by [`crate::lookup`]'s relative-binding walk
/// to find "the topmost frame executing exactly this function" (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Pushed but not yet evaluating (its source/cursor are set, nothing has
    /// run yet); relative lookups must skip these (§4.5).
    Pending,
    /// Evaluating a plain expression sequence (top level, a `GROUP`, a
    /// function's argument-gathering).
    Evaluating,
    /// Executing a function's body; `function` is the target relative
    /// lookups match against.
    FunctionBody { function: FunctionId },
    /// A `PARSE` sub-rule (§4.8); `input` tracks the series being matched
    /// against, separate from `source` (the rule block being interpreted).
    Parse { input: SeriesId, input_index: usize },
}

/// One stack frame (§3.7).
#[derive(Debug, Clone)]
pub struct Frame {
    /// The array being walked: the expression stream for `Evaluating`, the
    /// function body for `FunctionBody`, the rule block for `Parse`.
    pub source: SeriesId,
    /// Cursor into `source`; equal to the source's length means `END`.
    pub cursor: usize,
    pub output: Value,
    pub spare: Value,
    /// Argument cells, populated left to right as a function call's
    /// arguments are evaluated; indexed the same way the paramlist is
    /// (1-based key-list convention, slot 0 unused) so a `Relative` binding's
    /// index can index directly into it.
    pub args: Vec<Value>,
    pub mode: FrameMode,
}

impl Frame {
    #[must_use]
    pub fn new(source: SeriesId, mode: FrameMode) -> Self {
        Self { source, cursor: 0, output: Value::Void, spare: Value::Void, args: Vec::new(), mode }
    }

    #[must_use]
    pub fn with_args(source: SeriesId, mode: FrameMode, arg_count: usize) -> Self {
        let mut frame = Self::new(source, mode);
        frame.args = vec![Value::Blank; arg_count];
        frame
    }

    #[must_use]
    pub fn at_end(&self, source_len: usize) -> bool {
        self.cursor >= source_len
    }
}
