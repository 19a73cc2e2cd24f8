// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Per-function compilation contexts: locals, upvalues and scope depth.

use std::rc::Rc;

use crate::chunk::Chunk;
use crate::value::{Function, LuteString};

/// Maximum number of locals in one function; slots fit a byte.
pub const LOCALS_MAX: usize = 256;

/// Maximum number of captured variables in one function.
pub const UPVALUES_MAX: usize = 256;

/// What kind of function a context is compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// The top-level script.
    Script,
    /// A `fun` declaration.
    Function,
}

/// A local variable during compilation.
#[derive(Debug, Clone)]
pub struct Local<'src> {
    pub name: &'src str,
    /// Scope depth, or -1 while the initializer is still being compiled.
    pub depth: i32,
    /// Whether some nested closure captures this slot.
    pub is_captured: bool,
}

/// Information about a captured variable (upvalue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueInfo {
    /// Slot in the enclosing function's locals (`is_local`) or index into
    /// its upvalues (`!is_local`).
    pub index: u8,
    pub is_local: bool,
}

/// Outcome of looking a name up among a context's locals.
#[derive(Debug, Clone, Copy)]
pub enum LocalResolution {
    Found(u8),
    /// The name matched a local whose initializer is still being compiled.
    FoundUninitialized(u8),
    NotFound,
}

/// The compilation context for one function.
///
/// Contexts nest through `enclosing`, mirroring the lexical nesting of
/// `fun` declarations; resolving a free variable walks outward through the
/// chain, recording an upvalue at every level it crosses.
#[derive(Debug)]
pub struct FunctionScope<'src> {
    pub name: Option<Rc<LuteString>>,
    pub kind: FunctionKind,
    pub arity: u8,
    pub chunk: Chunk,
    pub locals: Vec<Local<'src>>,
    pub upvalues: Vec<UpvalueInfo>,
    pub scope_depth: i32,
    pub enclosing: Option<Box<FunctionScope<'src>>>,
}

impl<'src> FunctionScope<'src> {
    /// Create a context. Local slot 0 is reserved for the callee itself.
    pub fn new(name: Option<Rc<LuteString>>, kind: FunctionKind) -> Self {
        Self {
            name,
            kind,
            arity: 0,
            chunk: Chunk::new(),
            locals: vec![Local {
                name: "",
                depth: 0,
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
            enclosing: None,
        }
    }

    /// Resolve a name among this context's locals, innermost first.
    pub fn resolve_local(&self, name: &str) -> LocalResolution {
        for (slot, local) in self.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    return LocalResolution::FoundUninitialized(slot as u8);
                }
                return LocalResolution::Found(slot as u8);
            }
        }
        LocalResolution::NotFound
    }

    /// Resolve a name as a capture from an enclosing context.
    ///
    /// On success the captured local is flagged and an upvalue is recorded at
    /// every context between the local's owner and this one.
    pub fn resolve_upvalue(&mut self, name: &str) -> Result<Option<u8>, &'static str> {
        let Some(enclosing) = self.enclosing.as_mut() else {
            return Ok(None);
        };

        match enclosing.resolve_local(name) {
            LocalResolution::Found(slot) => {
                enclosing.locals[slot as usize].is_captured = true;
                return self.add_upvalue(slot, true).map(Some);
            }
            LocalResolution::FoundUninitialized(_) => {
                return Err("Can't read local variable in its own initializer.");
            }
            LocalResolution::NotFound => {}
        }

        if let Some(enclosing) = self.enclosing.as_mut() {
            if let Some(index) = enclosing.resolve_upvalue(name)? {
                return self.add_upvalue(index, false).map(Some);
            }
        }

        Ok(None)
    }

    /// Record a capture, deduplicating on `(index, is_local)`.
    fn add_upvalue(&mut self, index: u8, is_local: bool) -> Result<u8, &'static str> {
        for (i, upvalue) in self.upvalues.iter().enumerate() {
            if upvalue.index == index && upvalue.is_local == is_local {
                return Ok(i as u8);
            }
        }

        if self.upvalues.len() >= UPVALUES_MAX {
            return Err("Too many closure variables in function.");
        }
        self.upvalues.push(UpvalueInfo { index, is_local });
        Ok((self.upvalues.len() - 1) as u8)
    }

    /// Record a new local, uninitialized until `mark_initialized`.
    pub fn add_local(&mut self, name: &'src str) -> Result<(), &'static str> {
        if self.locals.len() >= LOCALS_MAX {
            return Err("Too many local variables in function.");
        }
        self.locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
        Ok(())
    }

    /// Whether `name` is already declared in the current innermost scope.
    pub fn is_declared_in_scope(&self, name: &str) -> bool {
        for local in self.locals.iter().rev() {
            if local.depth != -1 && local.depth < self.scope_depth {
                break;
            }
            if local.name == name {
                return true;
            }
        }
        false
    }

    /// Mark the most recent local as initialized at the current depth.
    pub fn mark_initialized(&mut self) {
        if self.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    /// Finish compilation, producing the function and its capture list.
    pub fn finish(self) -> (Function, Vec<UpvalueInfo>) {
        let function = Function {
            name: self.name,
            arity: self.arity,
            upvalue_count: self.upvalues.len() as u16,
            chunk: self.chunk,
        };
        (function, self.upvalues)
    }
}
