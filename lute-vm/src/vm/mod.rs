// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing Lute bytecode.

pub mod error;
pub mod frame;
pub mod stack;

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::compiler::compile;
use crate::natives;
use crate::opcode::OpCode;
use crate::table::{Strings, Table};
use crate::value::{Closure, LuteString, NativeFn, NativeFunction, Upvalue, Value};

pub use error::{InterpretError, RuntimeError, TraceFrame};
pub use frame::CallFrame;
pub use stack::ValueStack;

/// Maximum call depth.
pub const FRAMES_MAX: usize = 64;

/// Maximum operand stack height: one full window per frame.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// The Lute virtual machine.
///
/// A `Vm` is an ordinary value: create one per interpretation session, drop
/// it to release all heap state. Two `Vm`s share nothing, in particular not
/// their intern tables.
pub struct Vm {
    /// Operand stack.
    stack: ValueStack,

    /// Call frame stack.
    frames: Vec<CallFrame>,

    /// Global variables.
    globals: Table,

    /// The canonical allocation for every string the session has seen.
    strings: Strings,

    /// Capture cells still aliasing live stack slots, sorted by slot.
    open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl Vm {
    /// Create a VM with the built-in natives registered.
    pub fn new() -> Self {
        let mut vm = Self {
            stack: ValueStack::new(),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            strings: Strings::new(),
            open_upvalues: Vec::new(),
        };
        vm.define_native("clock", natives::clock);
        vm
    }

    /// Register a host function as a global.
    pub fn define_native(&mut self, name: &str, function: NativeFunction) {
        let name = self.strings.intern(name);
        let native = Value::Native(Rc::new(NativeFn {
            name: Rc::clone(&name),
            function,
        }));
        self.globals.set(name, native);
    }

    /// Compile and run a source string, printing to stdout.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.interpret_with(source, &mut out)
    }

    /// Compile and run a source string, printing to `out`.
    pub fn interpret_with<W: Write>(
        &mut self,
        source: &str,
        out: &mut W,
    ) -> Result<(), InterpretError> {
        let function = compile(source, &mut self.strings).map_err(InterpretError::Compile)?;

        let closure = Rc::new(Closure {
            function,
            upvalues: Vec::new(),
        });
        self.stack.push(Value::Closure(Rc::clone(&closure)));
        self.call_closure(closure, 0)
            .map_err(InterpretError::Runtime)?;

        self.run(out).map_err(InterpretError::Runtime)
    }

    // =========================================================================
    // Dispatch loop
    // =========================================================================

    fn run<W: Write>(&mut self, out: &mut W) -> Result<(), RuntimeError> {
        loop {
            match self.read_op()? {
                OpCode::Constant(idx) => {
                    let value = self.read_constant(idx)?;
                    self.stack.push(value);
                }
                OpCode::Nil => self.stack.push(Value::Nil),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::GetLocal(slot) => {
                    let index = self.frame().base + slot as usize;
                    let value = self.stack_at(index)?;
                    self.stack.push(value);
                }
                OpCode::SetLocal(slot) => {
                    let value = self.peek(0)?;
                    let index = self.frame().base + slot as usize;
                    self.stack_set(index, value)?;
                }
                OpCode::GetGlobal(idx) => {
                    let name = self.read_string_constant(idx)?;
                    match self.globals.get(&name) {
                        Some(value) => self.stack.push(value),
                        None => {
                            return Err(self
                                .runtime_error(format!("Undefined variable '{}'.", name.text)));
                        }
                    }
                }
                OpCode::DefineGlobal(idx) => {
                    let name = self.read_string_constant(idx)?;
                    let value = self.peek(0)?;
                    self.globals.set(name, value);
                    self.pop()?;
                }
                OpCode::SetGlobal(idx) => {
                    let name = self.read_string_constant(idx)?;
                    let value = self.peek(0)?;
                    // A fresh insertion means the global never existed; undo
                    // it and report, assignment must not create.
                    if self.globals.set(Rc::clone(&name), value) {
                        self.globals.delete(&name);
                        return Err(
                            self.runtime_error(format!("Undefined variable '{}'.", name.text))
                        );
                    }
                }
                OpCode::GetUpvalue(slot) => {
                    let cell = self.read_upvalue(slot)?;
                    let value = match &*cell.borrow() {
                        Upvalue::Open(index) => self.stack_at(*index)?,
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.stack.push(value);
                }
                OpCode::SetUpvalue(slot) => {
                    let cell = self.read_upvalue(slot)?;
                    let value = self.peek(0)?;
                    let open_slot = cell.borrow().open_slot();
                    match open_slot {
                        Some(index) => self.stack_set(index, value)?,
                        None => *cell.borrow_mut() = Upvalue::Closed(value),
                    }
                }

                OpCode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    match (a, b) {
                        (Value::Number(a), Value::Number(b)) => {
                            self.stack.push(Value::Number(a + b));
                        }
                        (Value::Str(a), Value::Str(b)) => {
                            let value = self.concatenate(&a, &b);
                            self.stack.push(value);
                        }
                        _ => {
                            return Err(self
                                .runtime_error("Operands must be two numbers or two strings."));
                        }
                    }
                }
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop()?;
                    self.stack.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => match self.peek(0)? {
                    Value::Number(n) => {
                        self.pop()?;
                        self.stack.push(Value::Number(-n));
                    }
                    _ => return Err(self.runtime_error("Operand must be a number.")),
                },

                OpCode::Print => {
                    let value = self.pop()?;
                    if writeln!(out, "{}", value).is_err() {
                        return Err(self.runtime_error("Could not write to output."));
                    }
                }
                OpCode::Jump(offset) => {
                    self.frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse(offset) => {
                    if self.peek(0)?.is_falsey() {
                        self.frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop(offset) => {
                    self.frame_mut().ip -= offset as usize;
                }

                OpCode::Call(arg_count) => {
                    let callee = self.peek(arg_count as usize)?;
                    self.call_value(callee, arg_count as usize)?;
                }
                OpCode::Closure(idx) => {
                    let function = match self.read_constant(idx)? {
                        Value::Function(function) => function,
                        _ => {
                            return Err(self.runtime_error(
                                "Internal error: closure constant is not a function.",
                            ));
                        }
                    };

                    let count = function.upvalue_count as usize;
                    let mut upvalues = Vec::with_capacity(count);
                    for _ in 0..count {
                        match self.read_op()? {
                            OpCode::CaptureLocal(slot) => {
                                let index = self.frame().base + slot as usize;
                                upvalues.push(self.capture_upvalue(index));
                            }
                            OpCode::CaptureUpvalue(index) => {
                                upvalues.push(self.read_upvalue(index)?);
                            }
                            other => {
                                return Err(self.runtime_error(format!(
                                    "Internal error: expected capture instruction, got {:?}.",
                                    other
                                )));
                            }
                        }
                    }

                    self.stack
                        .push(Value::Closure(Rc::new(Closure { function, upvalues })));
                }
                OpCode::CaptureLocal(_) | OpCode::CaptureUpvalue(_) => {
                    return Err(self.runtime_error(
                        "Internal error: capture instruction outside closure context.",
                    ));
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop()?;
                }

                OpCode::Return => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().expect("no active call frame");
                    self.close_upvalues(frame.base);

                    if self.frames.is_empty() {
                        // Pop the script closure; execution is complete.
                        self.pop()?;
                        return Ok(());
                    }

                    self.stack.truncate(frame.base);
                    self.stack.push(result);
                }
            }
        }
    }

    // =========================================================================
    // Call mechanics
    // =========================================================================

    fn call_value(&mut self, callee: Value, arg_count: usize) -> Result<(), RuntimeError> {
        match callee {
            Value::Closure(closure) => self.call_closure(closure, arg_count),
            Value::Native(native) => {
                // Natives run inline on the caller's stack window.
                let start = self.stack.len() - arg_count;
                let result = (native.function)(self.stack.slice_from(start));
                self.stack.truncate(start - 1);
                self.stack.push(result);
                Ok(())
            }
            _ => Err(self.runtime_error("Can only call functions and classes.")),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, arg_count: usize) -> Result<(), RuntimeError> {
        let arity = closure.function.arity as usize;
        if arg_count != arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {}.",
                arity, arg_count
            )));
        }

        if self.frames.len() == FRAMES_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }

        let base = self.stack.len() - arg_count - 1;
        self.frames.push(CallFrame::new(closure, base));
        Ok(())
    }

    // =========================================================================
    // Upvalue lifecycle
    // =========================================================================

    /// Find or create the open upvalue cell for a stack slot.
    ///
    /// The open list stays sorted by slot with at most one cell per slot, so
    /// every closure capturing a variable shares the same cell.
    fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        let mut insert_at = self.open_upvalues.len();
        for i in (0..self.open_upvalues.len()).rev() {
            match self.open_upvalues[i].borrow().open_slot() {
                Some(open) if open == slot => return Rc::clone(&self.open_upvalues[i]),
                Some(open) if open < slot => break,
                _ => insert_at = i,
            }
        }

        let upvalue = Rc::new(RefCell::new(Upvalue::Open(slot)));
        self.open_upvalues.insert(insert_at, Rc::clone(&upvalue));
        upvalue
    }

    /// Close every open upvalue at or above `from_slot`: copy the stack
    /// value into the cell and drop the cell from the open list. Closures
    /// still holding the cell keep seeing the shared, final value.
    fn close_upvalues(&mut self, from_slot: usize) {
        loop {
            let slot = match self.open_upvalues.last() {
                Some(cell) => match cell.borrow().open_slot() {
                    Some(slot) if slot >= from_slot => slot,
                    _ => break,
                },
                None => break,
            };

            let value = self
                .stack
                .get(slot)
                .cloned()
                .expect("open upvalue aliases a live stack slot");
            let cell = self.open_upvalues.pop().expect("open upvalue list is non-empty");
            *cell.borrow_mut() = Upvalue::Closed(value);
        }
    }

    // =========================================================================
    // Frame and stack plumbing
    // =========================================================================

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active call frame")
    }

    fn read_op(&mut self) -> Result<OpCode, RuntimeError> {
        let frame = self.frame_mut();
        let op = frame.closure.function.chunk.code.get(frame.ip).copied();
        if let Some(op) = op {
            frame.ip += 1;
            return Ok(op);
        }
        Err(self.runtime_error("Internal error: instruction pointer out of bounds."))
    }

    fn read_constant(&mut self, idx: u8) -> Result<Value, RuntimeError> {
        if let Some(value) = self.frame().closure.function.chunk.constants.get(idx as usize) {
            return Ok(value.clone());
        }
        Err(self.runtime_error("Internal error: constant index out of bounds."))
    }

    fn read_string_constant(&mut self, idx: u8) -> Result<Rc<LuteString>, RuntimeError> {
        match self.read_constant(idx)? {
            Value::Str(name) => Ok(name),
            _ => Err(self.runtime_error("Internal error: global name constant is not a string.")),
        }
    }

    fn read_upvalue(&mut self, slot: u8) -> Result<Rc<RefCell<Upvalue>>, RuntimeError> {
        if let Some(cell) = self.frame().closure.upvalues.get(slot as usize) {
            return Ok(Rc::clone(cell));
        }
        Err(self.runtime_error("Internal error: upvalue index out of bounds."))
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if let Some(value) = self.stack.pop() {
            return Ok(value);
        }
        Err(self.runtime_error("Internal error: operand stack underflow."))
    }

    fn peek(&mut self, distance: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.stack.peek(distance) {
            return Ok(value.clone());
        }
        Err(self.runtime_error("Internal error: operand stack underflow."))
    }

    fn stack_at(&mut self, index: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.stack.get(index) {
            return Ok(value.clone());
        }
        Err(self.runtime_error("Internal error: stack slot out of bounds."))
    }

    fn stack_set(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        if self.stack.set(index, value) {
            return Ok(());
        }
        Err(self.runtime_error("Internal error: stack slot out of bounds."))
    }

    fn binary_number_op(&mut self, op: fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.push(op(a, b));
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.")),
        }
    }

    /// Concatenate two strings, interning the result.
    fn concatenate(&mut self, a: &LuteString, b: &LuteString) -> Value {
        let mut text = String::with_capacity(a.text.len() + b.text.len());
        text.push_str(&a.text);
        text.push_str(&b.text);
        Value::Str(self.strings.intern(&text))
    }

    /// Build a runtime error carrying the current stack trace, then reset
    /// the VM so the session can keep going (the REPL relies on this).
    fn runtime_error(&mut self, message: impl Into<String>) -> RuntimeError {
        let mut trace = Vec::new();
        for frame in self.frames.iter().rev() {
            let function = &frame.closure.function;
            trace.push(TraceFrame {
                line: function.chunk.line(frame.ip.saturating_sub(1)).unwrap_or(0),
                function: function.name.clone(),
            });
        }

        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();

        RuntimeError::new(message.into(), trace)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
