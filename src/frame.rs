//! Environment frames: symbol-to-value bindings with parent delegation.
//!
//! A frame chain realizes lexical scope. Lookup walks from the innermost
//! frame outward; `define` always writes the innermost frame, shadowing any
//! outer binding of the same name. Frames are shared through [`FrameRef`]
//! handles, so a procedure capturing a frame sees definitions added to it
//! after capture.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::Value;

/// A single scope: its own bindings plus an optional parent scope
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<FrameRef>,
}

/// Shared handle to a frame
///
/// Cloning is cheap and every clone aliases the same frame, so a `define`
/// through one handle is visible through all of them.
#[derive(Clone)]
pub struct FrameRef(Rc<RefCell<Frame>>);

impl FrameRef {
    /// Create a frame with no parent
    pub fn new_global() -> Self {
        FrameRef(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: None,
        })))
    }

    /// Create an empty frame whose parent is this one
    pub fn new_child(&self) -> Self {
        FrameRef(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Bind `name` in this frame, inserting or overwriting
    /// Parent frames are never modified.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look `name` up through the frame chain, innermost first
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let mut frame = self.clone();
        loop {
            let parent = {
                let borrowed = frame.0.borrow();
                if let Some(value) = borrowed.bindings.get(name) {
                    return Ok(value.clone());
                }
                borrowed.parent.clone()
            };
            match parent {
                Some(next) => frame = next,
                None => return Err(Error::UnboundIdentifier(name.to_owned())),
            }
        }
    }

    /// Build the frame for a procedure call: a child of this frame with each
    /// formal parameter bound to its argument.
    ///
    /// `formals` may be a proper list of symbols, a dotted list whose tail
    /// symbol collects any extra arguments as a list, or a single bare symbol
    /// taking the whole argument list. The argument count is checked before
    /// any binding happens, so a failed call never leaves a partial frame.
    pub fn make_child_frame(&self, formals: &Value, args: Value) -> Result<FrameRef, Error> {
        // First pass: collect parameter names, without binding anything
        let mut names: Vec<&str> = Vec::new();
        let mut rest_name: Option<&str> = None;
        let mut cursor = formals;
        loop {
            match cursor {
                Value::Nil => break,
                Value::Symbol(name) => {
                    rest_name = Some(name);
                    break;
                }
                Value::Pair(pair) => {
                    match &pair.first {
                        Value::Symbol(name) => names.push(name),
                        other => {
                            return Err(Error::TypeError(format!(
                                "invalid formal parameter: {other}"
                            )));
                        }
                    }
                    cursor = &pair.rest;
                }
                other => return Err(Error::TypeError(format!("invalid formals: {other}"))),
            }
        }

        let supplied = args.len()?;
        if rest_name.is_some() {
            if supplied < names.len() {
                return Err(Error::arity_mismatch_at_least(names.len(), supplied));
            }
        } else if supplied != names.len() {
            return Err(Error::arity_mismatch(names.len(), supplied));
        }

        // Second pass: bind. The count is already checked, so this cannot
        // fail partway through.
        let child = self.new_child();
        let mut remaining = &args;
        for name in &names {
            match remaining {
                Value::Pair(pair) => {
                    child.define((*name).to_owned(), pair.first.clone());
                    remaining = &pair.rest;
                }
                _ => return Err(Error::arity_mismatch(names.len(), supplied)),
            }
        }
        if let Some(rest) = rest_name {
            child.define(rest.to_owned(), remaining.clone());
        }
        Ok(child)
    }

    /// Snapshot of this frame's own bindings, sorted by name
    /// Parent frames are not included.
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: Vec<(String, Value)> = self
            .0
            .borrow()
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }
}

impl fmt::Debug for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Frames can contain procedures that point back at this frame, so
        // only a summary is printed
        let frame = self.0.borrow();
        let chained = if frame.parent.is_some() {
            ", chained"
        } else {
            ""
        };
        write!(f, "#<frame ({} bindings{chained})>", frame.bindings.len())
    }
}
