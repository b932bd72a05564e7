//! Builtin procedure registry.
//!
//! Every host-implemented procedure callable from Scheme lives in the
//! [`BUILTINS`] table. Entries are bound into the global frame at startup by
//! [`crate::evaluator::create_global_frame`] and are ordinary values from
//! there on: they can be passed around, rebound and compared like anything
//! else.
//!
//! ## Functions vs Special Forms
//!
//! Everything here is a function: arguments arrive already evaluated.
//! Constructs that control evaluation of their operands (`if`, `define`,
//! `and`, ...) are special forms and live in [`crate::forms`].
//!
//! ## Error Handling
//!
//! This implementation enforces stricter error handling than standard Scheme:
//!
//! - **Type Safety**: Operations reject incorrect types (e.g., `(+ 1 "x")` errors)
//! - **No Coercion**: Numbers don't become strings and booleans don't become numbers
//! - **Overflow Detection**: Arithmetic operations detect and report overflow
//! - **Arity Checking**: Argument counts are validated before the implementation runs
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** following the `fn(&[Value]) -> Result<Value, Error>`
//!    signature, or the [`BuiltinFn::WithEnv`] signature if it needs the calling frame
//! 2. **Add to BUILTINS** with its name and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator;
use crate::frame::FrameRef;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

/// Expected number of arguments for a builtin procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// At least this many arguments
    AtLeast(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check an argument count against this arity
    pub fn validate(self, name: &str, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(expected) if got != expected => Err(Error::ArityMismatch {
                procedure: Some(name.to_owned()),
                expected,
                at_least: false,
                got,
            }),
            Arity::AtLeast(minimum) if got < minimum => Err(Error::ArityMismatch {
                procedure: Some(name.to_owned()),
                expected: minimum,
                at_least: true,
                got,
            }),
            _ => Ok(()),
        }
    }
}

/// Host implementation of a builtin procedure
#[derive(Clone, Copy)]
pub enum BuiltinFn {
    /// Function over evaluated arguments
    Simple(fn(&[Value]) -> Result<Value, Error>),
    /// Function that also receives the calling frame and the current
    /// evaluation depth (`eval` and `apply` re-enter the evaluator)
    WithEnv(fn(&[Value], &FrameRef, usize) -> Result<Value, Error>),
}

/// Definition of a builtin procedure
pub struct BuiltinOp {
    /// The identifier this procedure is bound to in the global frame
    pub name: &'static str,
    /// Expected number of arguments, checked before the implementation runs
    pub arity: Arity,
    /// The implementation
    pub func: BuiltinFn,
}

impl BuiltinOp {
    const fn new(name: &'static str, arity: Arity, func: BuiltinFn) -> Self {
        BuiltinOp { name, arity, func }
    }
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Compare operations by name, which uniquely identifies them
        self.name == other.name
    }
}

//
// Builtin Function Implementations
//

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            // Chain comparisons: all adjacent pairs must satisfy the operator
            for (left, right) in args.iter().zip(args.iter().skip(1)) {
                if !(left.as_number()? $op right.as_number()?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
    };
}

numeric_comparison!(builtin_num_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

// Macro to generate single-argument type predicates
macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            match args {
                [value] => Ok(Value::Bool(matches!(value, $pattern))),
                _ => Err(Error::arity_mismatch(1, args.len())),
            }
        }
    };
}

type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_symbol, Value::Symbol(_));
type_predicate!(builtin_is_string, Value::String(_));
type_predicate!(builtin_is_boolean, Value::Bool(_));
type_predicate!(builtin_is_null, Value::Nil);
type_predicate!(builtin_is_pair, Value::Pair(_));
type_predicate!(builtin_is_procedure, Value::Procedure(_));

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: NumberType = 0;
    for arg in args {
        sum = sum
            .checked_add(arg.as_number()?)
            .ok_or_else(|| Error::EvalError("Integer overflow in addition".into()))?;
    }
    Ok(Value::Number(sum))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let mut iter = args.iter();
    let first = match iter.next() {
        Some(value) => value.as_number()?,
        None => return Err(Error::arity_mismatch_at_least(1, 0)),
    };

    if args.len() == 1 {
        return first
            .checked_neg()
            .map(Value::Number)
            .ok_or_else(|| Error::EvalError("Integer overflow in negation".into()));
    }

    let mut result = first;
    for value in iter {
        result = result
            .checked_sub(value.as_number()?)
            .ok_or_else(|| Error::EvalError("Integer overflow in subtraction".into()))?;
    }
    Ok(Value::Number(result))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: NumberType = 1;
    for arg in args {
        product = product
            .checked_mul(arg.as_number()?)
            .ok_or_else(|| Error::EvalError("Integer overflow in multiplication".into()))?;
    }
    Ok(Value::Number(product))
}

fn checked_quotient(dividend: NumberType, divisor: NumberType) -> Result<NumberType, Error> {
    if divisor == 0 {
        return Err(Error::EvalError("division by zero".into()));
    }
    dividend
        .checked_div(divisor)
        .ok_or_else(|| Error::EvalError("Integer overflow in division".into()))
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let mut iter = args.iter();
    let mut result = match iter.next() {
        Some(value) => value.as_number()?,
        None => return Err(Error::arity_mismatch_at_least(2, 0)),
    };
    for value in iter {
        result = checked_quotient(result, value.as_number()?)?;
    }
    Ok(Value::Number(result))
}

fn builtin_quotient(args: &[Value]) -> Result<Value, Error> {
    match args {
        [dividend, divisor] => Ok(Value::Number(checked_quotient(
            dividend.as_number()?,
            divisor.as_number()?,
        )?)),
        _ => Err(Error::arity_mismatch(2, args.len())),
    }
}

fn builtin_remainder(args: &[Value]) -> Result<Value, Error> {
    match args {
        [dividend, divisor] => {
            let divisor = divisor.as_number()?;
            if divisor == 0 {
                return Err(Error::EvalError("division by zero".into()));
            }
            let remainder = dividend
                .as_number()?
                .checked_rem(divisor)
                .ok_or_else(|| Error::EvalError("Integer overflow in remainder".into()))?;
            Ok(Value::Number(remainder))
        }
        _ => Err(Error::arity_mismatch(2, args.len())),
    }
}

// Macro to generate max/min over one or more numbers
macro_rules! numeric_extremum {
    ($name:ident, $method:ident) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let mut iter = args.iter();
            let mut result = match iter.next() {
                Some(value) => value.as_number()?,
                None => return Err(Error::arity_mismatch_at_least(1, 0)),
            };
            for value in iter {
                result = result.$method(value.as_number()?);
            }
            Ok(Value::Number(result))
        }
    };
}

numeric_extremum!(builtin_max, max);
numeric_extremum!(builtin_min, min);

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    match args {
        // Same truthiness as if: everything except #f counts as true
        [value] => Ok(Value::Bool(!value.is_true())),
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    match args {
        // Structural equality for all types; mismatched types are just unequal
        [left, right] => Ok(Value::Bool(left == right)),
        _ => Err(Error::arity_mismatch(2, args.len())),
    }
}

fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    match args {
        // Pairs compare by cell identity, atoms by value
        [Value::Pair(left), Value::Pair(right)] => Ok(Value::Bool(Rc::ptr_eq(left, right))),
        [left, right] => Ok(Value::Bool(left == right)),
        _ => Err(Error::arity_mismatch(2, args.len())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [first, rest] => Ok(Value::cons(first.clone(), rest.clone())),
        _ => Err(Error::arity_mismatch(2, args.len())),
    }
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Pair(pair)] => Ok(pair.first.clone()),
        [other] => Err(Error::TypeError(format!("expected a pair, got {other}"))),
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Pair(pair)] => Ok(pair.rest.clone()),
        [other] => Err(Error::TypeError(format!("expected a pair, got {other}"))),
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(args.to_vec().into())
}

fn builtin_is_list(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(value.is_list())),
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_length(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => {
            let length = NumberType::try_from(value.len()?)
                .map_err(|_| Error::EvalError("list length exceeds number range".into()))?;
            Ok(Value::Number(length))
        }
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_append(args: &[Value]) -> Result<Value, Error> {
    let mut items = Vec::new();
    for list in args {
        items.extend(list.elements()?);
    }
    Ok(items.into())
}

fn builtin_string_append(args: &[Value]) -> Result<Value, Error> {
    let mut result = String::new();
    for value in args {
        match value {
            Value::String(text) => result.push_str(text),
            other => return Err(Error::TypeError(format!("expected a string, got {other}"))),
        }
    }
    Ok(Value::String(result))
}

fn builtin_error(args: &[Value]) -> Result<Value, Error> {
    let parts: Vec<String> = args
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            _ => format!("{value}"),
        })
        .collect();

    let message = if parts.is_empty() {
        "Error".to_owned()
    } else {
        parts.join(" ")
    };

    Err(Error::EvalError(message))
}

fn builtin_display(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => {
            // Strings display without their quotes
            if let Value::String(text) = value {
                print!("{text}");
            } else {
                print!("{value}");
            }
            Ok(Value::Unspecified)
        }
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_newline(args: &[Value]) -> Result<Value, Error> {
    match args {
        [] => {
            println!();
            Ok(Value::Unspecified)
        }
        _ => Err(Error::arity_mismatch(0, args.len())),
    }
}

fn builtin_eval(args: &[Value], env: &FrameRef, depth: usize) -> Result<Value, Error> {
    match args {
        // Re-enters the evaluator one level deeper, so runaway
        // eval-of-eval chains hit the depth guard instead of the
        // native stack
        [expr] => evaluator::eval_at(expr.clone(), env.clone(), depth + 1),
        _ => Err(Error::arity_mismatch(1, args.len())),
    }
}

fn builtin_apply(args: &[Value], env: &FrameRef, depth: usize) -> Result<Value, Error> {
    match args {
        [procedure, arg_list] => {
            evaluator::apply_at(procedure.clone(), arg_list.clone(), env, depth + 1)
        }
        _ => Err(Error::arity_mismatch(2, args.len())),
    }
}

/// Global registry of all builtin procedures, bound into every global frame.
///
/// The table is a plain static: fn pointers are const-constructible, so no
/// initialization step is needed before the first lookup.
static BUILTINS: &[BuiltinOp] = &[
    // Arithmetic operations
    BuiltinOp::new("*", Arity::Any, BuiltinFn::Simple(builtin_mul)),
    BuiltinOp::new("+", Arity::Any, BuiltinFn::Simple(builtin_add)),
    BuiltinOp::new("-", Arity::AtLeast(1), BuiltinFn::Simple(builtin_sub)),
    BuiltinOp::new("/", Arity::AtLeast(2), BuiltinFn::Simple(builtin_div)),
    BuiltinOp::new("quotient", Arity::Exact(2), BuiltinFn::Simple(builtin_quotient)),
    BuiltinOp::new("remainder", Arity::Exact(2), BuiltinFn::Simple(builtin_remainder)),
    BuiltinOp::new("max", Arity::AtLeast(1), BuiltinFn::Simple(builtin_max)),
    BuiltinOp::new("min", Arity::AtLeast(1), BuiltinFn::Simple(builtin_min)),
    // Comparison operations
    BuiltinOp::new("<", Arity::AtLeast(2), BuiltinFn::Simple(builtin_lt)),
    BuiltinOp::new("<=", Arity::AtLeast(2), BuiltinFn::Simple(builtin_le)),
    BuiltinOp::new("=", Arity::AtLeast(2), BuiltinFn::Simple(builtin_num_eq)),
    BuiltinOp::new(">", Arity::AtLeast(2), BuiltinFn::Simple(builtin_gt)),
    BuiltinOp::new(">=", Arity::AtLeast(2), BuiltinFn::Simple(builtin_ge)),
    // Equality and logic
    BuiltinOp::new("eq?", Arity::Exact(2), BuiltinFn::Simple(builtin_eq)),
    BuiltinOp::new("equal?", Arity::Exact(2), BuiltinFn::Simple(builtin_equal)),
    BuiltinOp::new("not", Arity::Exact(1), BuiltinFn::Simple(builtin_not)),
    // List operations
    BuiltinOp::new("append", Arity::Any, BuiltinFn::Simple(builtin_append)),
    BuiltinOp::new("car", Arity::Exact(1), BuiltinFn::Simple(builtin_car)),
    BuiltinOp::new("cdr", Arity::Exact(1), BuiltinFn::Simple(builtin_cdr)),
    BuiltinOp::new("cons", Arity::Exact(2), BuiltinFn::Simple(builtin_cons)),
    BuiltinOp::new("length", Arity::Exact(1), BuiltinFn::Simple(builtin_length)),
    BuiltinOp::new("list", Arity::Any, BuiltinFn::Simple(builtin_list)),
    // Type predicates
    BuiltinOp::new("boolean?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_boolean)),
    BuiltinOp::new("list?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_list)),
    BuiltinOp::new("null?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_null)),
    BuiltinOp::new("number?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_number)),
    BuiltinOp::new("pair?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_pair)),
    BuiltinOp::new("procedure?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_procedure)),
    BuiltinOp::new("string?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_string)),
    BuiltinOp::new("symbol?", Arity::Exact(1), BuiltinFn::Simple(builtin_is_symbol)),
    // String operations
    BuiltinOp::new("string-append", Arity::Any, BuiltinFn::Simple(builtin_string_append)),
    // Output
    BuiltinOp::new("display", Arity::Exact(1), BuiltinFn::Simple(builtin_display)),
    BuiltinOp::new("newline", Arity::Exact(0), BuiltinFn::Simple(builtin_newline)),
    // Error handling
    BuiltinOp::new("error", Arity::Any, BuiltinFn::Simple(builtin_error)),
    // Metacircular escape hatches
    BuiltinOp::new("apply", Arity::Exact(2), BuiltinFn::WithEnv(builtin_apply)),
    BuiltinOp::new("eval", Arity::Exact(1), BuiltinFn::WithEnv(builtin_eval)),
];

/// Lazy static map from name to BuiltinOp (private - use find_builtin)
static BUILTINS_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTINS.iter().map(|op| (op.name, op)).collect());

/// Get all builtin procedures, in registry order
pub fn all_builtins() -> &'static [BuiltinOp] {
    BUILTINS
}

/// Find a builtin procedure by name
pub fn find_builtin(name: &str) -> Option<&'static BuiltinOp> {
    BUILTINS_BY_NAME.get(name).copied()
}
