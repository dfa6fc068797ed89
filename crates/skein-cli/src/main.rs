//! Thin CLI harness (`SPEC_FULL.md` §2 "CLI/REPL harness"): reads a source
//! file, scans/binds/evaluates it against a fresh session, and molds the
//! result — the non-interactive sibling of `skein-repl` (`crates/skein`'s own
//! `src/bin`), grounded on `ouros-cli/src/main.rs`'s file-reading and timing
//! shape. Unlike that binary, there is no type-checking pass and no external
//! function dispatch loop to drive: this core has neither.

use std::{env, fs, process::ExitCode, time::Instant};

use skein::{Interpreter, Signal, StdPrint};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.skein" };
    let code = match read_file(file_path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut interp = Interpreter::new();
    let mut writer = StdPrint;
    let start = Instant::now();
    match interp.eval_str(&mut writer, &code) {
        Ok(value) => {
            let elapsed = start.elapsed();
            eprintln!("success after: {elapsed:?}");
            println!("{}", interp.mold(&value));
            ExitCode::SUCCESS
        }
        Err(signal) => {
            let elapsed = start.elapsed();
            let message = match signal {
                Signal::Error(err) => err.to_string(),
                Signal::Throw(throw) => format!("uncaught throw {:?}: {}", throw.label, interp.mold(&throw.value)),
            };
            eprintln!("error after: {elapsed:?}\n{message}");
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => return Err(format!("reading {file_path}: {err}")),
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
