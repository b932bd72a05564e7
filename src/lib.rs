//! A small Scheme interpreter built around explicit environment frames and a
//! trampolined evaluator that runs tail calls in constant native stack.
//!
//! The language is a classic Scheme subset: integers, booleans, strings,
//! symbols, and pairs, with lexically scoped `lambda` closures, dynamically
//! scoped `mu` procedures, and a library of builtin operations.
//!
//! ```scheme
//! (define (factorial n acc)
//!   (if (= n 0) acc (factorial (- n 1) (* n acc))))
//! (factorial 20 1)
//! ```
//!
//! The loop above runs in bounded native stack no matter how far it counts:
//! expressions in tail position are handed back to the evaluator's driver
//! loop as unevaluated expression/frame pairs instead of recursing natively.
//!
//! ## Modules
//!
//! - `ast`: the `Value` tree and procedure representations
//! - `frame`: shared environment frames with parent delegation
//! - `evaluator`: trampolined evaluation and procedure application
//! - `forms`: special form dispatch (`define`, `if`, `lambda`, `mu`, ...)
//! - `builtinops`: the builtin procedure registry
//! - `reader`: s-expression parsing from text (`reader` feature, on by default)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
pub const MAX_PARSE_DEPTH: usize = 32;

/// Maximum depth of nested non-tail evaluation
/// Calls in tail position are bounced through the evaluator's driver loop and
/// never count against this limit, so only runaway non-tail recursion hits it
/// Each guard level spans several native frames (more when eval or apply
/// re-enters the evaluator), so the limit must stay small enough that the
/// guard trips before the native stack runs out
pub const MAX_EVAL_DEPTH: usize = 64;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Valid Scheme syntax that is intentionally not supported in this implementation
    Unsupported,
    /// Implementation-imposed limit exceeded (depth, integer overflow, etc.)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Show some context before the error, not just what follows it
        let context_start = error_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        // Add ellipsis if we truncated
        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        // Replace newlines with visible markers for better error display
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The reader could not turn the input into an expression
    Parse(ParseError),
    /// A symbol had no binding anywhere in the frame chain
    UnboundIdentifier(String),
    /// A procedure was applied to the wrong number of arguments
    ArityMismatch {
        /// Name of the procedure, when known at the point of failure
        procedure: Option<String>,
        /// The exact count, or the minimum when `at_least` is set
        expected: usize,
        at_least: bool,
        got: usize,
    },
    /// A combination to evaluate was not a well-formed list
    MalformedExpression(String),
    /// The operator of a call evaluated to something that is not a procedure
    InvalidProcedure(String),
    /// A proper list was required but the value's chain does not end in `()`
    ImproperList(String),
    /// A value of the wrong kind reached an operation
    TypeError(String),
    /// Any other runtime failure: overflow, bad form syntax, raised errors
    EvalError(String),
}

impl Error {
    /// Create an ArityMismatch against an exact parameter count
    pub fn arity_mismatch(expected: usize, got: usize) -> Self {
        Error::ArityMismatch {
            procedure: None,
            expected,
            at_least: false,
            got,
        }
    }

    /// Create an ArityMismatch against a minimum parameter count
    pub fn arity_mismatch_at_least(expected: usize, got: usize) -> Self {
        Error::ArityMismatch {
            procedure: None,
            expected,
            at_least: true,
            got,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundIdentifier(name) => write!(f, "unknown identifier: {name}"),
            Error::ArityMismatch {
                procedure,
                expected,
                at_least,
                got,
            } => {
                write!(f, "incorrect number of arguments to ")?;
                match procedure {
                    Some(name) => write!(f, "{name}")?,
                    None => write!(f, "function call")?,
                }
                let qualifier = if *at_least { "at least " } else { "" };
                write!(f, ": expected {qualifier}{expected}, got {got}")
            }
            Error::MalformedExpression(expression) => write!(f, "malformed list: {expression}"),
            Error::InvalidProcedure(value) => write!(f, "cannot call: {value}"),
            Error::ImproperList(value) => write!(f, "improper list: {value}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod forms;
pub mod frame;

#[cfg(feature = "reader")]
pub mod reader;
