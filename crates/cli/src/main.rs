//! `corvid`: REPL and file-runner driver for the Corvid language
//! (spec.md §6).
//!
//! No argument starts a line-at-a-time REPL; one argument runs a
//! script file once. Exit codes follow spec.md §6 exactly: 0 on
//! success, 65 on a compile error, 70 on a runtime error, 74 on an
//! I/O error.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use corvid_core::GcConfig;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

#[derive(Parser)]
#[command(name = "corvid")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Corvid: a small bytecode-compiled scripting language", long_about = None)]
struct Args {
    /// Source file to run. Omit to start the REPL.
    script: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let args = Args::parse();
    let exit_code = match args.script {
        Some(path) => run_file(&path),
        None => run_repl(),
    };
    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("corvid=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn new_vm() -> corvid_vm::Vm {
    let mut vm = corvid_vm::Vm::new(GcConfig::default());
    vm.define_native("clock", 0, corvid_vm::native::clock);
    vm
}

fn run_file(path: &PathBuf) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            return EX_IOERR;
        }
    };

    let mut vm = new_vm();
    let function = match corvid_compiler::compile(&source, vm.heap_mut()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return EX_DATAERR;
        }
    };

    match vm.interpret(function) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            EX_SOFTWARE
        }
    }
}

fn run_repl() -> i32 {
    info!("Starting Corvid REPL");
    let mut vm = new_vm();
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error starting REPL: {e}");
            return EX_IOERR;
        }
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                match corvid_compiler::compile(&line, vm.heap_mut()) {
                    Ok(function) => {
                        if let Err(e) = vm.interpret(function) {
                            eprintln!("{e}");
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Readline error: {e}");
                break;
            }
        }
    }
    0
}
