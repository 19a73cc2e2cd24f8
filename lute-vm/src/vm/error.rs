// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime and interpreter errors.

use std::fmt;
use std::rc::Rc;

use crate::compiler::CompileError;
use crate::value::LuteString;

/// One line of a runtime stack trace, innermost call first.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    /// Source line of the instruction that was executing.
    pub line: u32,
    /// The frame's function name, `None` for the top-level script.
    pub function: Option<Rc<LuteString>>,
}

/// A runtime error: the formatted message plus the call stack at the point
/// of failure. The VM resets its stacks when producing one.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(message: String, trace: Vec<TraceFrame>) -> Self {
        Self { message, trace }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for frame in &self.trace {
            write!(f, "\n[line {}] in ", frame.line)?;
            match &frame.function {
                Some(name) => write!(f, "{}()", name.text)?,
                None => write!(f, "script")?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// Why `interpret` failed.
#[derive(Debug)]
pub enum InterpretError {
    /// The source did not compile; all accumulated diagnostics.
    Compile(Vec<CompileError>),
    /// Execution failed.
    Runtime(RuntimeError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretError::Compile(errors) => {
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
            InterpretError::Runtime(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for InterpretError {}
