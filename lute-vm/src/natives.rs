// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Built-in native functions exposed to Lute programs.
//!
//! Natives receive their argument window on the operand stack and return a
//! single value; they must not hold on to the slice past their return. By
//! convention a native signals failure by returning nil.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::Value;

/// `clock()`: seconds since the Unix epoch, as a float.
///
/// Nondecreasing within a process for any sane host clock; the epoch itself
/// is unspecified as far as the language is concerned.
pub fn clock(_args: &[Value]) -> Value {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Value::Number(elapsed.as_secs_f64())
}
