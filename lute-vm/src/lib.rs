// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Lute.
//!
//! Source code is compiled in a single pass to chunks of typed bytecode,
//! then executed by a stack-based VM. Closures capture variables through
//! shared upvalue cells that live on the stack while they can and move to
//! the heap when their frame unwinds.

pub mod chunk;
pub mod compiler;
pub mod natives;
pub mod opcode;
pub mod table;
pub mod value;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::{compile, CompileError};
pub use opcode::OpCode;
pub use table::{Strings, Table};
pub use value::{Closure, Function, LuteString, NativeFn, Upvalue, Value};
pub use vm::{InterpretError, RuntimeError, Vm};
