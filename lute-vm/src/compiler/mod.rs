// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Single-pass bytecode compiler.
//!
//! A Pratt-style precedence parser drives the scanner directly and emits
//! bytecode as it goes; variable scope (local, upvalue, global) is resolved
//! while parsing, with no separate AST or analysis pass.

pub mod codegen;
pub mod scope;

pub use codegen::{compile, CompileError};
