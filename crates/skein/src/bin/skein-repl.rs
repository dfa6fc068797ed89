//! Interactive REPL harness (`SPEC_FULL.md` §2 "CLI/REPL harness"): reads a
//! line (or a file given as the first argument), scans it, binds it against
//! a session context, evaluates it, and molds the result.
//!
//! Grounded on `ouros-repl.rs`: a `>>> `/`... ` multi-line prompt loop with a
//! heuristic "does this need another line" check. Unlike that binary, there
//! is no yield/resume protocol to drive here — `Interpreter::eval_str` always
//! runs an expression to completion or to a `Signal`, so the loop is a plain
//! read/eval/print with no `Progress` enum to match on.

use std::{
    io::{self, Write},
    process::ExitCode,
};

use skein::{Interpreter, StdPrint};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if let Some(path) = args.get(1) {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                eprintln!("error reading {path}: {err}");
                return ExitCode::FAILURE;
            }
        };
        let mut interp = Interpreter::new();
        let mut writer = StdPrint;
        match interp.eval_str(&mut writer, &source) {
            Ok(value) => {
                println!("{}", interp.mold(&value));
                ExitCode::SUCCESS
            }
            Err(signal) => {
                eprintln!("{}", describe_signal(&interp, signal));
                ExitCode::FAILURE
            }
        }
    } else {
        run_interactive()
    }
}

fn run_interactive() -> ExitCode {
    let mut interp = Interpreter::new();
    let mut writer = StdPrint;
    let mut source = String::new();

    loop {
        let prompt = if source.is_empty() { ">>> " } else { "... " };
        let Some(line) = read_line(prompt) else {
            println!();
            break;
        };

        if source.is_empty() && line.trim().is_empty() {
            continue;
        }

        if !source.is_empty() {
            source.push('\n');
        }
        source.push_str(&line);

        if needs_more_input(&source) {
            continue;
        }

        match interp.eval_str(&mut writer, &source) {
            Ok(value) => println!("{}", interp.mold(&value)),
            Err(signal) => eprintln!("{}", describe_signal(&interp, signal)),
        }
        source.clear();
    }

    ExitCode::SUCCESS
}

/// Renders a [`skein::Signal`] the way the REPL should report it: a raised
/// `RunError` prints via its own `Display`, but an uncaught flow-control
/// throw (accept/reject/return escaping every frame) has no `RunError` to
/// lean on, so it is molded like any other value with its label named.
fn describe_signal<R: skein::ResourceTracker>(interp: &Interpreter<R>, signal: skein::Signal) -> String {
    match signal {
        skein::Signal::Error(err) => err.to_string(),
        skein::Signal::Throw(throw) => {
            format!("uncaught throw {:?}: {}", throw.label, interp.mold(&throw.value))
        }
    }
}

/// Heuristic multiline detector for interactive input: unterminated bracket
/// nesting or a trailing `\` continues the current snippet.
fn needs_more_input(source: &str) -> bool {
    let trimmed = source.trim_end();
    if trimmed.ends_with('\\') {
        return true;
    }

    let mut balance = 0i32;
    for ch in trimmed.chars() {
        match ch {
            '[' | '(' => balance += 1,
            ']' | ')' => balance -= 1,
            _ => {}
        }
    }
    balance > 0
}

/// Reads one line from stdin after printing a prompt. Returns `None` on EOF.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    if io::stdout().flush().is_err() {
        return None;
    }
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}
