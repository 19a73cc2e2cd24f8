// lute - A small scripting language with a bytecode compiler and VM
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use lute_vm::{InterpretError, Vm};

// BSD sysexits, so scripts can tell failure modes apart.
const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Lute v0.1.0");
        return;
    }

    match args.len() {
        1 => run_repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: lute [script]");
            process::exit(EX_USAGE);
        }
    }
}

/// Interpret a source file, mapping the outcome to an exit code.
fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            process::exit(EX_IOERR);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => {}
        Err(e @ InterpretError::Compile(_)) => {
            eprintln!("{}", e);
            process::exit(EX_DATAERR);
        }
        Err(e @ InterpretError::Runtime(_)) => {
            eprintln!("{}", e);
            process::exit(EX_SOFTWARE);
        }
    }
}

/// Run the interactive line reader. Errors print and do not end the
/// session; globals persist from line to line.
fn run_repl() {
    println!("Lute v0.1.0");

    let mut vm = Vm::new();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = vm.interpret(line) {
                    eprintln!("{}", e);
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}
