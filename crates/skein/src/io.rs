//! Print output sink (`SPEC_FULL.md` §6 "I/O device interface" is explicitly
//! out of core scope, but `print` needs *somewhere* to write).
//!
//! Grounded on `io.rs`'s `PrintWriter` trait: one method per output primitive
//! (`stdout_write` for the formatted argument, `stdout_push` for the
//! separating space/trailing newline) so a host can capture or suppress
//! output without the evaluator knowing which. `StdPrint`/`CollectStringPrint`/
//! `NoPrint` mirror the teacher's three implementors one-for-one; this crate
//! skips the teacher's thread-local redirect stack (`contextlib.redirect_stdout`
//! has no counterpart in this dialect's minimal native set) and writes
//! directly rather than buffering, since there is no Python-style stdout/stderr
//! interleaving contract to preserve here.

use std::borrow::Cow;

/// Sink for the `print` native's output. One call per printed argument plus
/// one per separator/terminator character, mirroring the call shape
/// `eval.rs`'s `NativeOp::Print` handler drives.
pub trait PrintWriter {
    fn stdout_write(&mut self, output: Cow<'_, str>);
    fn stdout_push(&mut self, end: char);
}

/// Writes directly to the process's stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        print!("{output}");
    }

    fn stdout_push(&mut self, end: char) {
        print!("{end}");
    }
}

/// Collects all output into an owned string; useful for tests and embedding.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        self.0.push_str(&output);
    }

    fn stdout_push(&mut self, end: char) {
        self.0.push(end);
    }
}

/// Discards everything written to it.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) {}

    fn stdout_push(&mut self, _end: char) {}
}
