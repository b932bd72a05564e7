//! Special forms.
//!
//! A combination whose head is one of the symbols registered here is handled
//! by the matching handler instead of the ordinary operator/operand pipeline.
//! Recognition happens on the symbol itself, before any environment lookup,
//! so special forms cannot be shadowed by bindings. Handlers receive their
//! operands unevaluated and decide themselves what to evaluate, which is what
//! lets `if`, `and`, `or` and friends short-circuit and keep their final
//! expression in tail position.

use crate::Error;
use crate::ast::{LambdaProcedure, MuProcedure, Procedure, Value};
use crate::evaluator::{self, Partial};
use crate::frame::FrameRef;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::LazyLock;

/// Handler for one special form: receives the unevaluated operand list
pub(crate) type FormHandler =
    fn(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error>;

/// A special form recognized by its head symbol
pub(crate) struct SpecialForm {
    pub(crate) name: &'static str,
    pub(crate) handler: FormHandler,
}

static SPECIAL_FORMS: &[SpecialForm] = &[
    SpecialForm {
        name: "and",
        handler: do_and,
    },
    SpecialForm {
        name: "begin",
        handler: do_begin,
    },
    SpecialForm {
        name: "cond",
        handler: do_cond,
    },
    SpecialForm {
        name: "define",
        handler: do_define,
    },
    SpecialForm {
        name: "if",
        handler: do_if,
    },
    SpecialForm {
        name: "lambda",
        handler: do_lambda,
    },
    SpecialForm {
        name: "let",
        handler: do_let,
    },
    SpecialForm {
        name: "mu",
        handler: do_mu,
    },
    SpecialForm {
        name: "or",
        handler: do_or,
    },
    SpecialForm {
        name: "quote",
        handler: do_quote,
    },
];

static FORMS_BY_NAME: LazyLock<HashMap<&'static str, &'static SpecialForm>> =
    LazyLock::new(|| SPECIAL_FORMS.iter().map(|form| (form.name, form)).collect());

/// Look up a special form by its head symbol
pub(crate) fn find_form(name: &str) -> Option<&'static SpecialForm> {
    FORMS_BY_NAME.get(name).copied()
}

/// Error for a special form given the wrong number of operands
fn operand_count_error(form: &str, expected: &str, got: usize) -> Error {
    Error::EvalError(format!("{form}: expected {expected} operands, got {got}"))
}

/// `(quote datum)` returns the datum unevaluated
fn do_quote(operands: Value, _env: &FrameRef, _depth: usize) -> Result<Partial, Error> {
    match &*operands.elements()? {
        [datum] => Ok(Partial::Value(datum.clone())),
        items => Err(operand_count_error("quote", "1", items.len())),
    }
}

/// `(define name expr)` or `(define (name . formals) body...)`.
///
/// Binds in the current frame and returns the bound symbol. The shorthand
/// builds a lambda closing over the current frame.
fn do_define(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let items = operands.elements()?;
    match &*items {
        [Value::Symbol(name), value_expr] => {
            let value = evaluator::eval_at(value_expr.clone(), env.clone(), depth + 1)?;
            env.define(name.clone(), value);
            Ok(Partial::Value(Value::Symbol(name.clone())))
        }
        [Value::Pair(target), body @ ..] if !body.is_empty() => {
            let Value::Symbol(name) = &target.first else {
                return Err(Error::TypeError(format!("cannot define {}", target.first)));
            };
            validate_formals(&target.rest)?;
            let procedure = Value::Procedure(Procedure::Lambda(Rc::new(LambdaProcedure {
                formals: target.rest.clone(),
                body: body.to_vec().into(),
                env: env.clone(),
            })));
            env.define(name.clone(), procedure);
            Ok(Partial::Value(Value::Symbol(name.clone())))
        }
        [Value::Symbol(_), ..] => Err(operand_count_error("define", "2", items.len())),
        [Value::Pair(_)] => Err(operand_count_error("define", "at least 2", items.len())),
        [other, ..] => Err(Error::TypeError(format!("cannot define {other}"))),
        [] => Err(operand_count_error("define", "2", 0)),
    }
}

/// `(if predicate consequent)` or `(if predicate consequent alternative)`.
///
/// Only the chosen branch is evaluated, in tail position. Any value other
/// than `#f` counts as true. A one-armed `if` whose predicate is false
/// yields the unspecified value.
fn do_if(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    match &*operands.elements()? {
        [predicate, consequent] => {
            if evaluator::eval_at(predicate.clone(), env.clone(), depth + 1)?.is_true() {
                evaluator::eval_tail(consequent.clone(), env, depth)
            } else {
                Ok(Partial::Value(Value::Unspecified))
            }
        }
        [predicate, consequent, alternative] => {
            let predicate_value = evaluator::eval_at(predicate.clone(), env.clone(), depth + 1)?;
            let branch = if predicate_value.is_true() {
                consequent
            } else {
                alternative
            };
            evaluator::eval_tail(branch.clone(), env, depth)
        }
        items => Err(operand_count_error("if", "2 or 3", items.len())),
    }
}

/// `(lambda formals body...)` builds a closure over the current frame
fn do_lambda(operands: Value, env: &FrameRef, _depth: usize) -> Result<Partial, Error> {
    let (formals, body) = split_formals_and_body("lambda", &operands)?;
    Ok(Partial::Value(Value::Procedure(Procedure::Lambda(
        Rc::new(LambdaProcedure {
            formals,
            body,
            env: env.clone(),
        }),
    ))))
}

/// `(mu formals body...)` builds a procedure with no captured frame; its
/// body will resolve free identifiers in the frame of whoever calls it
fn do_mu(operands: Value, _env: &FrameRef, _depth: usize) -> Result<Partial, Error> {
    let (formals, body) = split_formals_and_body("mu", &operands)?;
    Ok(Partial::Value(Value::Procedure(Procedure::Mu(Rc::new(
        MuProcedure { formals, body },
    )))))
}

/// Shared syntax checking for lambda and mu: a formal parameter list
/// followed by a non-empty body
fn split_formals_and_body(form: &str, operands: &Value) -> Result<(Value, Value), Error> {
    let Value::Pair(pair) = operands else {
        return Err(operand_count_error(form, "at least 2", 0));
    };
    if pair.rest.is_nil() {
        return Err(operand_count_error(form, "at least 2", 1));
    }
    validate_formals(&pair.first)?;
    Ok((pair.first.clone(), pair.rest.clone()))
}

/// Check the formal parameters of lambda and mu: a proper or dotted list
/// of distinct symbols, or a single symbol taking the whole argument list
fn validate_formals(formals: &Value) -> Result<(), Error> {
    let mut seen = HashSet::new();
    let mut check = |name: &str| {
        if seen.insert(name.to_owned()) {
            Ok(())
        } else {
            Err(Error::EvalError(format!(
                "duplicate formal parameter: {name}"
            )))
        }
    };
    let mut cursor = formals;
    loop {
        match cursor {
            Value::Nil => return Ok(()),
            Value::Symbol(name) => return check(name),
            Value::Pair(pair) => {
                match &pair.first {
                    Value::Symbol(name) => check(name)?,
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
}

/// `(begin expr...)` evaluates in order, returning the last expression's
/// value; the last expression is in tail position
fn do_begin(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    evaluator::eval_sequence(&operands, env, depth)
}

/// `(and expr...)` returns the first false value, or the last value.
/// `(and)` is `#t`. Evaluation stops at the first false value.
fn do_and(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let mut cursor = &operands;
    loop {
        match cursor {
            Value::Nil => return Ok(Partial::Value(Value::Bool(true))),
            Value::Pair(pair) => {
                if pair.rest.is_nil() {
                    return evaluator::eval_tail(pair.first.clone(), env, depth);
                }
                let value = evaluator::eval_at(pair.first.clone(), env.clone(), depth + 1)?;
                if !value.is_true() {
                    return Ok(Partial::Value(value));
                }
                cursor = &pair.rest;
            }
            other => return Err(Error::MalformedExpression(other.to_string())),
        }
    }
}

/// `(or expr...)` returns the first true value, or the last value.
/// `(or)` is `#f`. Evaluation stops at the first true value.
fn do_or(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let mut cursor = &operands;
    loop {
        match cursor {
            Value::Nil => return Ok(Partial::Value(Value::Bool(false))),
            Value::Pair(pair) => {
                if pair.rest.is_nil() {
                    return evaluator::eval_tail(pair.first.clone(), env, depth);
                }
                let value = evaluator::eval_at(pair.first.clone(), env.clone(), depth + 1)?;
                if value.is_true() {
                    return Ok(Partial::Value(value));
                }
                cursor = &pair.rest;
            }
            other => return Err(Error::MalformedExpression(other.to_string())),
        }
    }
}

/// `(cond (test body...) ... (else body...))`.
///
/// Clauses are tried in order. A matching clause with no body yields the
/// test value itself. `else` always matches and must be the last clause.
/// With no matching clause the result is unspecified.
fn do_cond(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let clauses = operands.elements()?;
    for (index, clause) in clauses.iter().enumerate() {
        let Value::Pair(clause_pair) = clause else {
            return Err(Error::EvalError(format!("cond: malformed clause: {clause}")));
        };
        if matches!(&clause_pair.first, Value::Symbol(name) if name == "else") {
            if index + 1 != clauses.len() {
                return Err(Error::EvalError("cond: else clause must be last".to_owned()));
            }
            if clause_pair.rest.is_nil() {
                return Err(Error::EvalError(
                    "cond: else clause requires a body".to_owned(),
                ));
            }
            return evaluator::eval_sequence(&clause_pair.rest, env, depth);
        }
        let test = evaluator::eval_at(clause_pair.first.clone(), env.clone(), depth + 1)?;
        if test.is_true() {
            if clause_pair.rest.is_nil() {
                return Ok(Partial::Value(test));
            }
            return evaluator::eval_sequence(&clause_pair.rest, env, depth);
        }
    }
    Ok(Partial::Value(Value::Unspecified))
}

/// `(let ((name expr)...) body...)`.
///
/// Binding expressions are evaluated in the enclosing frame, then the body
/// runs in a fresh child frame holding the bindings.
fn do_let(operands: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let Value::Pair(pair) = &operands else {
        return Err(operand_count_error("let", "at least 2", 0));
    };
    if pair.rest.is_nil() {
        return Err(operand_count_error("let", "at least 2", 1));
    }

    let bindings = pair
        .first
        .elements()
        .map_err(|_| Error::EvalError(format!("let: malformed bindings: {}", pair.first)))?;
    let mut names = Vec::with_capacity(bindings.len());
    let mut values = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        match &*binding.elements().unwrap_or_default() {
            [name @ Value::Symbol(_), expr] => {
                names.push(name.clone());
                values.push(evaluator::eval_at(expr.clone(), env.clone(), depth + 1)?);
            }
            _ => {
                return Err(Error::EvalError(format!("let: malformed binding: {binding}")));
            }
        }
    }

    let child = env.make_child_frame(&Value::from(names), Value::from(values))?;
    evaluator::eval_sequence(&pair.rest, &child, depth)
}
