//! This module defines the core value types for the interpreter. The main
//! enum, [`Value`], covers all Scheme data types: numbers, symbols, strings,
//! booleans, pairs, and the three procedure kinds. Lists are built from
//! reference-counted cons cells, so `cdr` and closure capture share structure
//! instead of copying. Ergonomic helper functions such as [`val`], [`sym`],
//! and [`nil`] are provided for convenient construction in tests, and
//! conversion traits build proper lists from Rust vectors, arrays, and slices.

use std::rc::Rc;

use crate::Error;
use crate::builtinops::BuiltinOp;
use crate::frame::FrameRef;

/// Type alias for number values in the interpreter
pub(crate) type NumberType = i64;

/// Allowed non-alphanumeric characters in Scheme symbol names
/// Most represent mathematical symbols or predicates ("?"), "$" supported for host identifiers
#[cfg(feature = "reader")]
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
/// Note: This function is tested as part of the reader tests in reader.rs
#[cfg(feature = "reader")]
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false, // name is empty
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            // Check all characters are valid
            // The first character is checked here again, but it's a cheap operation.
            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// A cons cell.
///
/// `rest` is another pair or [`Value::Nil`] for proper lists, and may be any
/// other value for improper (dotted) lists.
#[derive(PartialEq)]
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

// Dropping a pair would otherwise recurse down the rest chain, one native
// frame per cell, which overflows the stack on lists with millions of cells.
// The chain is unwound iteratively instead, stopping at any cell that
// another list still shares.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut rest = std::mem::replace(&mut self.rest, Value::Nil);
        while let Value::Pair(pair) = rest {
            match Rc::try_unwrap(pair) {
                Ok(mut cell) => rest = std::mem::replace(&mut cell.rest, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// A user-defined procedure with lexical scope: calling it extends the frame
/// it was created in, regardless of where the call happens.
pub struct LambdaProcedure {
    /// Formal parameters: a proper list of symbols, a dotted list whose tail
    /// symbol collects extra arguments, or a single bare symbol taking all
    pub formals: Value,
    /// Non-empty proper list of body expressions
    pub body: Value,
    /// The frame the procedure was created in
    pub env: FrameRef,
}

/// A user-defined procedure with dynamic scope: it captures no frame, and
/// calling it extends whatever frame the *call* is evaluated in.
pub struct MuProcedure {
    pub formals: Value,
    pub body: Value,
}

/// The three kinds of callable values
#[derive(Clone)]
pub enum Procedure {
    /// Host-implemented operation from the builtin registry
    Builtin(&'static BuiltinOp),
    /// Lexically scoped closure
    Lambda(Rc<LambdaProcedure>),
    /// Dynamically scoped procedure
    Mu(Rc<MuProcedure>),
}

/// Core value type in the interpreter
///
/// To build values in tests, use the ergonomic helper functions:
/// - `val(42)` for atoms, `sym("name")` for symbols, `nil()` for the empty list
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Numbers (integers only)
    Number(NumberType),
    /// Symbols (identifiers)
    Symbol(String),
    /// String literals
    String(String),
    /// Boolean values
    Bool(bool),
    /// The empty list
    Nil,
    /// A cons cell, shared by reference count
    Pair(Rc<Pair>),
    /// Callable values
    Procedure(Procedure),
    /// Unspecified values (e.g. the result of a one-armed `if` that misses)
    /// These values never equal themselves or any other value
    Unspecified,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Nil => write!(f, "Nil"),
            // The written form is far easier to read than nested cells
            Value::Pair(_) => write!(f, "Pair({self})"),
            Value::Procedure(Procedure::Builtin(op)) => write!(f, "Builtin({})", op.name),
            Value::Procedure(Procedure::Lambda(lambda)) => {
                // The captured frame is skipped: frames can reach this value again
                write!(f, "Lambda(formals={}, body={})", lambda.formals, lambda.body)
            }
            Value::Procedure(Procedure::Mu(mu)) => {
                write!(f, "Mu(formals={}, body={})", mu.formals, mu.body)
            }
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(n as i64)
            }
        }
    };
}

// Generate From implementations for all integer types
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType); // Special case - no casting
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(|x| x.into()))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(|x| x.into()))
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(|x| x.into()))
    }
}

///   Helper function for creating symbols - works great in mixed lists!
///   Accepts both &str and String
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
/// Accepts any type that can be converted to Value
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists (nil) - follows Lisp/Scheme conventions
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Nil
}

/// Write the elements of a list, one leading space before each
fn write_spaced_elements(f: &mut std::fmt::Formatter<'_>, list: &Value) -> std::fmt::Result {
    let mut cursor = list;
    while let Value::Pair(pair) = cursor {
        write!(f, " {}", pair.first)?;
        cursor = &pair.rest;
    }
    Ok(())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Nil => write!(f, "()"),
            Value::Pair(pair) => {
                write!(f, "({}", pair.first)?;
                let mut rest = &pair.rest;
                loop {
                    match rest {
                        Value::Nil => break,
                        Value::Pair(next) => {
                            write!(f, " {}", next.first)?;
                            rest = &next.rest;
                        }
                        // Improper tail, written in dotted notation
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Procedure(Procedure::Builtin(op)) => write!(f, "#<builtin:{}>", op.name),
            Value::Procedure(Procedure::Lambda(lambda)) => {
                write!(f, "(lambda {}", lambda.formals)?;
                write_spaced_elements(f, &lambda.body)?;
                write!(f, ")")
            }
            Value::Procedure(Procedure::Mu(mu)) => {
                write!(f, "(mu {}", mu.formals)?;
                write_spaced_elements(f, &mu.body)?;
                write!(f, ")")
            }
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl Value {
    /// Construct a single cons cell
    pub fn cons(first: Value, rest: Value) -> Value {
        Value::Pair(Rc::new(Pair { first, rest }))
    }

    /// Construct a proper list, ending in the empty list
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |rest, first| Value::cons(first, rest))
    }

    /// Check if a value is the empty list
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Check if a value is a well-formed (proper) list: a chain of pairs
    /// ending in the empty list. The empty list itself qualifies.
    pub fn is_list(&self) -> bool {
        let mut cursor = self;
        loop {
            match cursor {
                Value::Nil => return true,
                Value::Pair(pair) => cursor = &pair.rest,
                _ => return false,
            }
        }
    }

    /// Count the elements of a proper list
    pub fn len(&self) -> Result<usize, Error> {
        let mut count = 0;
        let mut cursor = self;
        loop {
            match cursor {
                Value::Nil => return Ok(count),
                Value::Pair(pair) => {
                    count += 1;
                    cursor = &pair.rest;
                }
                _ => return Err(Error::ImproperList(self.to_string())),
            }
        }
    }

    /// Collect the elements of a proper list into a vector
    pub fn elements(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Value::Nil => return Ok(items),
                Value::Pair(pair) => {
                    items.push(pair.first.clone());
                    cursor = &pair.rest;
                }
                _ => return Err(Error::ImproperList(self.to_string())),
            }
        }
    }

    /// Apply `f` to each element of a proper list, front to back, producing
    /// a new proper list of the results. Stops at the first error.
    pub fn map(&self, mut f: impl FnMut(&Value) -> Result<Value, Error>) -> Result<Value, Error> {
        let mut mapped = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Value::Nil => return Ok(Value::list(mapped)),
                Value::Pair(pair) => {
                    mapped.push(f(&pair.first)?);
                    cursor = &pair.rest;
                }
                _ => return Err(Error::ImproperList(self.to_string())),
            }
        }
    }

    /// Every value except `#f` counts as true in conditionals
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Extract a number, or report what was found instead
    pub(crate) fn as_number(&self) -> Result<NumberType, Error> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(Error::TypeError(format!("expected a number, got {other}"))),
        }
    }

    /// Extract a symbol's name
    pub(crate) fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => match (a, b) {
                // Builtins compare by registry name, not function pointer
                (Procedure::Builtin(x), Procedure::Builtin(y)) => x == y,
                // User procedures compare by identity
                (Procedure::Lambda(x), Procedure::Lambda(y)) => Rc::ptr_eq(x, y),
                (Procedure::Mu(x), Procedure::Mu(y)) => Rc::ptr_eq(x, y),
                _ => false,
            },
            (Value::Unspecified, _) | (_, Value::Unspecified) => false, // Unspecified never equals anything
            _ => false, // Different variants are never equal
        }
    }
}
