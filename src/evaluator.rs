//! Core expression evaluation.
//!
//! Evaluation is trampolined: [`eval_step`] performs one step and returns
//! either a finished value or an unevaluated tail expression, and the driver
//! loop in [`eval_at`] keeps stepping until a value appears. A procedure call
//! in tail position therefore returns to the loop instead of recursing
//! natively, so iterative Scheme programs written as tail recursion run in
//! constant native stack. Only non-tail recursion consumes depth, and it is
//! cut off at [`MAX_EVAL_DEPTH`].

use crate::ast::{Pair, Procedure, Value};
use crate::builtinops::{self, BuiltinFn};
use crate::forms;
use crate::frame::FrameRef;
use crate::{Error, MAX_EVAL_DEPTH};

/// Intermediate result of one evaluation step.
///
/// `Unevaluated` carries a tail-position expression and the frame to run it
/// in back to the driver loop. It never escapes the evaluator: by the time a
/// caller sees a result, every pending tail expression has been run.
pub(crate) enum Partial {
    Value(Value),
    Unevaluated(Value, FrameRef),
}

/// Evaluate an expression in the given frame (public API)
pub fn eval(expr: &Value, env: &FrameRef) -> Result<Value, Error> {
    eval_at(expr.clone(), env.clone(), 0)
}

/// Apply a procedure to a list of already-evaluated arguments, running any
/// deferred tail work to completion
pub fn apply(procedure: &Value, args: &Value, env: &FrameRef) -> Result<Value, Error> {
    apply_at(procedure.clone(), args.clone(), env, 0)
}

/// Depth-aware application used by the `apply` builtin as well as [`apply`]
pub(crate) fn apply_at(
    procedure: Value,
    args: Value,
    env: &FrameRef,
    depth: usize,
) -> Result<Value, Error> {
    match apply_procedure(procedure, args, env, depth)? {
        Partial::Value(value) => Ok(value),
        Partial::Unevaluated(expr, frame) => eval_at(expr, frame, depth),
    }
}

/// Drive one expression to a final value.
///
/// The loop runs at a fixed depth: every bounce replaces the current
/// expression and frame instead of growing the native stack, which is what
/// makes unbounded tail recursion safe.
pub(crate) fn eval_at(expr: Value, env: FrameRef, depth: usize) -> Result<Value, Error> {
    let mut current = Partial::Unevaluated(expr, env);
    loop {
        match current {
            Partial::Value(value) => return Ok(value),
            Partial::Unevaluated(next_expr, next_env) => {
                current = eval_step(next_expr, &next_env, depth)?;
            }
        }
    }
}

/// Perform a single evaluation step
fn eval_step(expr: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }

    let Value::Pair(pair) = &expr else {
        return match expr {
            // Variable lookup
            Value::Symbol(name) => Ok(Partial::Value(env.lookup(&name)?)),
            // Everything else is self-evaluating, including the empty list
            other => Ok(Partial::Value(other)),
        };
    };

    // A combination must be a proper list before anything in it runs
    if !expr.is_list() {
        return Err(Error::MalformedExpression(expr.to_string()));
    }

    // Special forms are recognized by their head symbol before any lookup
    // happens, so they cannot be shadowed by bindings
    let outcome = if let Value::Symbol(name) = &pair.first
        && let Some(form) = forms::find_form(name)
    {
        (form.handler)(pair.rest.clone(), env, depth)
    } else {
        eval_combination(pair, env, depth)
    };
    outcome.map_err(|err| add_context(err, &expr))
}

/// Evaluate a procedure call: operator first, then operands left to right.
/// Whether the operator is callable is the applier's concern, so every
/// operand runs (and keeps its side effects) even when the call then fails.
fn eval_combination(pair: &Pair, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let operator = eval_at(pair.first.clone(), env.clone(), depth + 1)?;

    let operands = pair
        .rest
        .map(|operand| eval_at(operand.clone(), env.clone(), depth + 1))?;

    apply_procedure(operator, operands, env, depth)
}

/// Evaluate an expression in tail position.
///
/// Combinations become `Unevaluated` tokens for the driver loop; symbols and
/// literals are resolved immediately since no call can follow from them.
pub(crate) fn eval_tail(expr: Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    if matches!(expr, Value::Pair(_)) {
        Ok(Partial::Unevaluated(expr, env.clone()))
    } else {
        eval_step(expr, env, depth)
    }
}

/// Evaluate a sequence of body expressions in order.
///
/// Results of all but the last expression are discarded; the last runs in
/// tail position. An empty sequence yields the unspecified value.
pub(crate) fn eval_sequence(body: &Value, env: &FrameRef, depth: usize) -> Result<Partial, Error> {
    let mut cursor = body;
    loop {
        match cursor {
            Value::Nil => return Ok(Partial::Value(Value::Unspecified)),
            Value::Pair(pair) => {
                if pair.rest.is_nil() {
                    return eval_tail(pair.first.clone(), env, depth);
                }
                eval_at(pair.first.clone(), env.clone(), depth + 1)?;
                cursor = &pair.rest;
            }
            other => return Err(Error::MalformedExpression(other.to_string())),
        }
    }
}

/// Apply a procedure to an argument list.
///
/// Builtins are checked against their registered arity and run on the host
/// side. User procedures get a fresh call frame: a child of the captured
/// frame for lambdas, a child of the *calling* frame for mus. Their bodies
/// are handed back in tail position.
fn apply_procedure(
    procedure: Value,
    args: Value,
    env: &FrameRef,
    depth: usize,
) -> Result<Partial, Error> {
    match procedure {
        Value::Procedure(Procedure::Builtin(op)) => {
            let argv = args.elements()?;
            op.arity.validate(op.name, argv.len())?;
            let result = match op.func {
                BuiltinFn::Simple(func) => func(&argv)?,
                BuiltinFn::WithEnv(func) => func(&argv, env, depth)?,
            };
            Ok(Partial::Value(result))
        }
        Value::Procedure(Procedure::Lambda(lambda)) => {
            let call_frame = lambda.env.make_child_frame(&lambda.formals, args)?;
            eval_sequence(&lambda.body, &call_frame, depth)
        }
        Value::Procedure(Procedure::Mu(mu)) => {
            let call_frame = env.make_child_frame(&mu.formals, args)?;
            eval_sequence(&mu.body, &call_frame, depth)
        }
        other => Err(Error::InvalidProcedure(other.to_string())),
    }
}

/// Helper function to add expression context to errors
/// Only the innermost expression is recorded, so a deep call chain does not
/// stack hundreds of context lines.
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::EvalError(msg) if !msg.contains("\n  Context: ") => {
            Error::EvalError(format!("{msg}\n  Context: while evaluating: {expr}"))
        }
        Error::TypeError(msg) if !msg.contains("\n  Context: ") => {
            Error::TypeError(format!("{msg}\n  Context: while evaluating: {expr}"))
        }
        // Parse, unbound, arity, and shape errors already carry their own context
        other => other,
    }
}

/// Create a global frame with every registered builtin procedure bound
pub fn create_global_frame() -> FrameRef {
    let global = FrameRef::new_global();
    for op in builtinops::all_builtins() {
        global.define(op.name, Value::Procedure(Procedure::Builtin(op)));
    }
    global
}


#[cfg(all(test, feature = "reader"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;
    use crate::ast::{NumberType, nil, sym, val};
    use crate::builtinops::{Arity, BuiltinOp};
    use crate::reader;
    use std::cell::RefCell;

    fn run(env: &FrameRef, source: &str) -> Value {
        let expr = reader::parse(source).unwrap();
        eval(&expr, env).unwrap()
    }

    fn run_err(env: &FrameRef, source: &str) -> Error {
        let expr = reader::parse(source).unwrap();
        eval(&expr, env).unwrap_err()
    }

    #[test]
    fn test_tail_recursion_runs_in_constant_stack() {
        let env = create_global_frame();
        run(&env, "(define (countdown n) (if (= n 0) 0 (countdown (- n 1))))");
        // A million bounces through the driver loop, no native recursion
        assert_eq!(run(&env, "(countdown 1000000)"), val(0));
    }

    #[test]
    fn test_mutual_tail_recursion_runs_in_constant_stack() {
        let env = create_global_frame();
        // even? calls odd? before odd? exists: the body only needs the
        // binding at call time, because the definition frame is shared
        run(&env, "(define (even? n) (if (= n 0) #t (odd? (- n 1))))");
        run(&env, "(define (odd? n) (if (= n 0) #f (even? (- n 1))))");
        assert_eq!(run(&env, "(even? 100001)"), val(false));
        assert_eq!(run(&env, "(odd? 100001)"), val(true));
    }

    #[test]
    fn test_non_tail_recursion_hits_the_depth_guard() {
        let env = create_global_frame();
        run(&env, "(define (sum n) (if (= n 0) 0 (+ n (sum (- n 1)))))");
        // Shallow calls fit comfortably under the limit
        assert_eq!(run(&env, "(sum 50)"), val(1275));
        // The recursive call sits under +, so every level consumes depth
        let err = run_err(&env, "(sum 2000)");
        assert!(err.to_string().contains("depth limit exceeded"));
    }

    #[test]
    fn test_deep_tail_loop_inside_non_tail_context() {
        let env = create_global_frame();
        run(&env, "(define (spin n) (if (= n 0) 7 (spin (- n 1))))");
        // The long tail loop runs nested under +, still without piling up
        // native frames or consuming depth per bounce
        assert_eq!(run(&env, "(+ 1 (spin 100000))"), val(8));
    }

    #[test]
    fn test_runaway_eval_chain_hits_the_depth_guard() {
        let env = create_global_frame();
        // Each round trips through the eval builtin, which re-enters the
        // evaluator one level deeper rather than growing the native stack
        run(&env, "(define (loop) (eval '(loop)))");
        let err = run_err(&env, "(loop)");
        assert!(err.to_string().contains("depth limit exceeded"));
    }

    #[test]
    fn test_mu_sees_the_callers_frame() {
        let env = create_global_frame();
        run(&env, "(define f (mu () x))");
        run(&env, "(define (g) (define x 42) (f))");
        assert_eq!(run(&env, "(g)"), val(42));

        // The same shape with lambda resolves x lexically and misses
        run(&env, "(define lexical (lambda () x))");
        run(&env, "(define (h) (define x 42) (lexical))");
        let err = run_err(&env, "(h)");
        assert!(err.to_string().contains("unknown identifier: x"));
    }

    #[test]
    fn test_closures_see_later_defines_in_captured_frame() {
        let env = create_global_frame();
        run(&env, "(define y 100)");
        run(&env, "(define g (lambda () y))");
        run(&env, "(define y 200)");
        // The closure holds the frame itself, not a copy of it
        assert_eq!(run(&env, "(g)"), val(200));
    }

    #[test]
    fn test_operands_run_before_a_bad_operator_is_rejected() {
        let env = create_global_frame();
        let err = run_err(&env, "((+ 1 2) (define tally 5))");
        assert!(err.to_string().contains("cannot call: 3"));
        // The operand already ran, so its define stuck
        assert_eq!(env.lookup("tally").unwrap(), val(5));
    }

    #[test]
    fn test_operand_errors_outrank_a_bad_operator() {
        let env = create_global_frame();
        // The operand fails first, so its error surfaces instead of the
        // complaint about 1 not being callable
        let err = run_err(&env, "(1 (error \"boom\"))");
        let message = err.to_string();
        assert!(message.contains("boom"));
        assert!(!message.contains("cannot call"));
    }

    thread_local! {
        static CALL_LOG: RefCell<Vec<NumberType>> = const { RefCell::new(Vec::new()) };
    }

    fn record_call(args: &[Value]) -> Result<Value, Error> {
        match args {
            [Value::Number(n)] => {
                CALL_LOG.with(|log| log.borrow_mut().push(*n));
                Ok(Value::Number(*n))
            }
            _ => Err(Error::TypeError("record expects one number".to_owned())),
        }
    }

    static RECORD_OP: BuiltinOp = BuiltinOp {
        name: "record",
        arity: Arity::Exact(1),
        func: BuiltinFn::Simple(record_call),
    };

    #[test]
    fn test_operands_evaluate_left_to_right_exactly_once() {
        let env = create_global_frame();
        env.define("record", Value::Procedure(Procedure::Builtin(&RECORD_OP)));
        CALL_LOG.with(|log| log.borrow_mut().clear());

        let result = run(&env, "(list (record 1) (record 2) (record 3))");
        assert_eq!(result, val([1, 2, 3]));
        assert_eq!(CALL_LOG.with(|log| log.borrow().clone()), vec![1, 2, 3]);
    }

    #[test]
    fn test_error_context_names_the_innermost_expression() {
        let env = create_global_frame();
        let err = run_err(&env, "(+ 1 (error \"boom\"))");
        let message = err.to_string();
        assert!(message.contains("boom"));
        assert!(message.contains("while evaluating: (error \"boom\")"));
        // One context line only, not one per enclosing call
        assert_eq!(message.matches("Context:").count(), 1);
    }

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        Defines(&'static str),       // Evaluation should succeed, returning this symbol
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        Error,                       // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(val(value))
    }

    /// Run tests in isolated environments with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let env = create_global_frame();

            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &env, &test_id);
            }
        }
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(input: &str, expected: &TestResult, env: &FrameRef, test_id: &str) {
        let expr = match reader::parse(input) {
            Ok(expr) => expr,
            Err(parse_err) => {
                panic!("{test_id}: unexpected parse error for '{input}': {parse_err:?}");
            }
        };

        match (eval(&expr, env), expected) {
            (Ok(actual), EvalResult(expected_val)) => {
                // Special handling for Unspecified values - they should match type but not equality
                match (&actual, expected_val) {
                    (Value::Unspecified, Value::Unspecified) => {} // Both unspecified - OK
                    _ => {
                        assert!(
                            !(actual != *expected_val),
                            "{test_id}: expected {expected_val:?}, got {actual:?}"
                        );
                    }
                }
            }
            (Ok(actual), Defines(name)) => {
                assert!(
                    actual == Value::Symbol((*name).to_owned()),
                    "{test_id}: expected define to return symbol {name}, got {actual:?}"
                );
            }
            (Err(_), Error) => {} // Expected generic error
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), Error) => {
                panic!("{test_id}: expected error, got {actual:?}");
            }
            (Ok(actual), SpecificError(expected_text)) => {
                panic!("{test_id}: expected error containing '{expected_text}', got {actual:?}");
            }
            (Err(err), EvalResult(expected_val)) => {
                panic!("{test_id}: expected {expected_val:?}, got error {err:?}");
            }
            (Err(err), Defines(name)) => {
                panic!("{test_id}: expected symbol {name}, got error {err:?}");
            }
        }
    }

    /// Simplified test runner with specific error message support
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let env = create_global_frame();
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &env, &test_id);
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_comprehensive_operations_data_driven() {
        let test_cases = vec![
            // === SELF-EVALUATING FORMS ===
            // Numbers
            ("42", success(42)),
            ("-271", success(-271)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            // Booleans
            ("#t", success(true)),
            ("#f", success(false)),
            // Strings
            ("\"hello\"", success("hello")),
            ("\"hello world\"", success("hello world")),
            ("\"\"", success("")),
            ("\"with\\\"quotes\"", success("with\"quotes")),
            // The empty list evaluates to itself
            ("()", success(nil())),
            // === ARITHMETIC OPERATIONS ===
            // Addition (zero arguments gives the identity)
            ("(+ 1 2 3)", success(6)),
            ("(+ 42)", success(42)),
            ("(+ -5 10)", success(5)),
            ("(+)", success(0)),
            // Subtraction (requires at least 1 argument)
            ("(- 10 3 2)", success(5)),
            ("(- 10)", success(-10)), // Unary negation
            ("(- -5)", success(5)),
            ("(- 100 50 25)", success(25)),
            ("(-)", SpecificError("incorrect number of arguments to -")),
            // Multiplication (zero arguments gives the identity)
            ("(* 2 3 4)", success(24)),
            ("(* 0 100)", success(0)),
            ("(* -2 3)", success(-6)),
            ("(*)", success(1)),
            // Division (truncating), quotient and remainder
            ("(/ 7 2)", success(3)),
            ("(/ -7 2)", success(-3)),
            ("(/ 100 5 2)", success(10)),
            ("(/ 1 0)", SpecificError("division by zero")),
            ("(quotient 7 2)", success(3)),
            ("(quotient -7 2)", success(-3)),
            ("(quotient 1 0)", SpecificError("division by zero")),
            ("(remainder 7 2)", success(1)),
            ("(remainder -7 2)", success(-1)),
            ("(remainder 7 -2)", success(1)),
            ("(remainder 1 0)", SpecificError("division by zero")),
            // Mixed operations with nested expressions
            ("(+ (* 2 3) (- 8 2))", success(12)),
            ("(* (+ 1 2) (- 5 2))", success(9)),
            // Arithmetic overflow errors
            ("(+ 9223372036854775807 1)", Error), // i64::MAX + 1
            ("(- -9223372036854775808)", Error),  // -(i64::MIN)
            ("(- -9223372036854775808 1)", Error), // i64::MIN - 1
            ("(* 4611686018427387904 2)", Error), // (i64::MAX/2 + 1) * 2
            ("(/ -9223372036854775808 -1)", Error), // i64::MIN / -1
            // === EQUALITY AND COMPARISON OPERATIONS ===
            // Numeric equality (only accepts numbers, chains over all arguments)
            ("(= 5 5)", success(true)),
            ("(= 5 6)", success(false)),
            ("(= 5 5 5)", success(true)),
            ("(= 5 5 6)", success(false)),
            ("(= \"hello\" \"hello\")", Error),
            ("(= #t #t)", Error),
            ("(= 5)", SpecificError("incorrect number of arguments to =")),
            // General equality with equal? (structural, works for all types)
            ("(equal? 5 5)", success(true)),
            ("(equal? 5 6)", success(false)),
            ("(equal? \"hello\" \"hello\")", success(true)),
            ("(equal? #t #f)", success(false)),
            ("(equal? '(1 2) '(1 2))", success(true)),
            ("(equal? '(1 2) '(1 3))", success(false)),
            ("(equal? '() '())", success(true)),
            // Identity with eq? (pairs compare by cell, atoms by value)
            ("(eq? 'a 'a)", success(true)),
            ("(eq? 5 5)", success(true)),
            ("(eq? '(1 2) '(1 2))", success(false)),
            // Numeric comparison operators, including chains
            ("(< 3 5)", success(true)),
            ("(< 5 3)", success(false)),
            ("(< 1 2 3)", success(true)),
            ("(< 1 3 2)", success(false)),
            ("(> 5 3)", success(true)),
            ("(> 3 5)", success(false)),
            ("(> 5 3 1)", success(true)),
            ("(<= 5 5)", success(true)),
            ("(<= 1 1 2)", success(true)),
            ("(<= 2 1)", success(false)),
            ("(>= 5 5)", success(true)),
            ("(>= 3 5)", success(false)),
            ("(< 1 \"two\")", Error),
            // === QUOTE OPERATIONS ===
            // Longhand quote syntax
            ("(quote hello)", success(sym("hello"))),
            ("(quote (1 2 3))", success([1, 2, 3])),
            ("(quote (+ 1 2))", success(vec![sym("+"), val(1), val(2)])),
            ("(quote ())", success(nil())),
            // Shorthand quote syntax
            ("'hello", success(sym("hello"))),
            ("'(1 2 3)", success([1, 2, 3])),
            ("'()", success(nil())),
            ("'42", success(42)),
            ("'#t", success(true)),
            // Nested quotes
            ("'(quote x)", success(vec![sym("quote"), sym("x")])),
            ("''x", success(vec![sym("quote"), sym("x")])),
            // Quote arity is syntax, not procedure arity
            ("(quote)", SpecificError("quote")),
            ("(quote a b)", SpecificError("quote")),
            // === DYNAMIC FUNCTION CALLS IN OPERATOR POSITION ===
            ("((if #t + *) 2 3)", success(5)), // + was chosen, 2 + 3 = 5
            ("((if #f + *) 2 3)", success(6)), // * was chosen, 2 * 3 = 6
            ("((lambda (x) (* x x)) 4)", success(16)),
            // === LIST OPERATIONS ===
            ("(car (list 1 2 3))", success(1)),
            ("(car '(a))", success(sym("a"))),
            ("(cdr (list 1 2 3))", success([2, 3])),
            ("(cdr '(a))", success(nil())),
            ("(car '())", Error),
            ("(cdr 5)", Error),
            ("(car \"not-a-list\")", Error),
            // Construction, including improper pairs
            ("(cons 1 (list 2 3))", success([1, 2, 3])),
            ("(cons 1 2)", EvalResult(Value::cons(val(1), val(2)))),
            ("(car (cons 1 2))", success(1)),
            ("(cdr (cons 1 2))", success(2)),
            ("(list)", success(nil())),
            ("(list 1 2 3 4)", success([1, 2, 3, 4])),
            ("(cons 1 '())", success([1])),
            // length requires a proper list
            ("(length '(1 2 3))", success(3)),
            ("(length '())", success(0)),
            ("(length (cons 1 2))", SpecificError("improper list")),
            ("(length 5)", SpecificError("improper list")),
            // append splices proper lists
            ("(append)", success(nil())),
            ("(append '(1 2) '(3) '())", success([1, 2, 3])),
            ("(append '() '())", success(nil())),
            ("(append '(1) (cons 2 3))", SpecificError("improper list")),
            // === TYPE PREDICATES ===
            ("(null? '())", success(true)),
            ("(null? (list))", success(true)),
            ("(null? 42)", success(false)),
            ("(null? (cons 1 2))", success(false)),
            ("(pair? (cons 1 2))", success(true)),
            ("(pair? '(1 2))", success(true)),
            ("(pair? '())", success(false)),
            ("(list? '(1 2))", success(true)),
            ("(list? '())", success(true)),
            ("(list? (cons 1 2))", success(false)),
            ("(list? 5)", success(false)),
            ("(number? 5)", success(true)),
            ("(number? \"5\")", success(false)),
            ("(symbol? 'x)", success(true)),
            ("(symbol? \"x\")", success(false)),
            ("(string? \"x\")", success(true)),
            ("(string? 'x)", success(false)),
            ("(boolean? #f)", success(true)),
            ("(boolean? 0)", success(false)),
            ("(procedure? car)", success(true)),
            ("(procedure? (lambda (x) x))", success(true)),
            ("(procedure? (mu (x) x))", success(true)),
            ("(procedure? 'car)", success(false)),
            // === CONDITIONAL OPERATIONS ===
            ("(if #t 1 2)", success(1)),
            ("(if #f 1 2)", success(2)),
            ("(if (> 5 3) \"greater\" \"lesser\")", success("greater")),
            // Everything except #f is true
            ("(if 0 1 2)", success(1)),
            ("(if '() 1 2)", success(1)),
            ("(if \"\" 1 2)", success(1)),
            // One-armed if
            ("(if #t 1)", success(1)),
            ("(if #f 1)", EvalResult(Value::Unspecified)),
            ("(if)", SpecificError("if")),
            ("(if 1 2 3 4)", SpecificError("if")),
            // === BOOLEAN LOGIC OPERATIONS ===
            // and returns the first false value or the last value
            ("(and)", success(true)),
            ("(and 1 2 3)", success(3)),
            ("(and #t #t)", success(true)),
            ("(and #f #t)", success(false)),
            ("(and 1 #f 3)", success(false)),
            // Short-circuit: the rest never runs
            ("(and #f (error \"never\"))", success(false)),
            ("(and #f undefined-var)", success(false)),
            // or returns the first true value
            ("(or)", success(false)),
            ("(or #f 7 (error \"never\"))", success(7)),
            ("(or #f #f)", success(false)),
            ("(or #t undefined-var)", success(true)),
            ("(or 'a 'b)", success(sym("a"))),
            // not uses the same truthiness as if
            ("(not #t)", success(false)),
            ("(not #f)", success(true)),
            ("(not 0)", success(false)),
            ("(not '())", success(false)),
            ("(not \"hello\")", success(false)),
            // Complex boolean expressions
            ("(and (or #f #t) (not #f))", success(true)),
            ("(and (> 5 3) (< 2 4))", success(true)),
            ("(or (= 1 2) (= 2 2))", success(true)),
            // === COND ===
            ("(cond (#t 1))", success(1)),
            ("(cond (#f 1) (#t 2))", success(2)),
            ("(cond (#f 1) (else 42))", success(42)),
            ("(cond ((= 1 2) 'a) ((= 1 1) 'b) (else 'c))", success(sym("b"))),
            // A clause with no body yields its test value
            ("(cond (#f 1) (7))", success(7)),
            // No clause matches
            ("(cond (#f 1))", EvalResult(Value::Unspecified)),
            // Multi-expression clause bodies run in order
            ("(cond (#t 1 2 3))", success(3)),
            ("(cond (else 1) (#t 2))", SpecificError("else clause must be last")),
            ("(cond (else))", SpecificError("else")),
            ("(cond 5)", SpecificError("cond")),
            // === BEGIN ===
            ("(begin 1 2 3)", success(3)),
            ("(begin)", EvalResult(Value::Unspecified)),
            ("(begin (define inner 5) inner)", success(5)),
            // === LET ===
            ("(let ((x 5)) x)", success(5)),
            ("(let ((x 5) (y 7)) (+ x y))", success(12)),
            ("(let ((x 5)) (define y 6) (+ x y))", success(11)),
            // Binding expressions see the outer frame, not each other
            ("(let ((x 5) (y (+ x 1))) y)", SpecificError("unknown identifier: x")),
            ("(let (5) 1)", SpecificError("let")),
            ("(let ((x)) 1)", SpecificError("let")),
            ("(let ((x 1)))", SpecificError("let")),
            // === LAMBDA AND MU SYNTAX ===
            ("((lambda () 42))", success(42)),
            ("((lambda args args) 1 2)", success([1, 2])),
            ("((lambda args args))", success(nil())),
            ("((lambda (a . rest) rest) 1 2 3)", success([2, 3])),
            ("((lambda (a . rest) rest) 1)", success(nil())),
            ("((lambda (a . rest) a) 1 2)", success(1)),
            ("((mu (x) (* x 2)) 21)", success(42)),
            ("(lambda (x x) x)", SpecificError("duplicate formal parameter")),
            ("(lambda (a b a) a)", SpecificError("duplicate formal parameter")),
            ("(lambda (1 2) 3)", Error),
            ("(lambda \"not-a-list\" 42)", Error),
            // A procedure body cannot be empty
            ("(lambda (x))", SpecificError("lambda")),
            ("(mu (x))", SpecificError("mu")),
            // Arity mismatches on user procedures
            ("((lambda (x) x))", SpecificError("incorrect number of arguments")),
            ("((lambda (x) x) 1 2)", SpecificError("incorrect number of arguments")),
            ("((lambda (a . rest) a))", SpecificError("at least 1")),
            // === DEFINE SYNTAX ERRORS ===
            ("(define 123 42)", Error),
            ("(define \"not-symbol\" 42)", Error),
            ("(define x)", SpecificError("define")),
            ("(define x 1 2)", SpecificError("define")),
            ("(define (f x))", SpecificError("define")),
            ("(define ((f)) 1)", Error),
            // === STRING OPERATIONS ===
            ("(string-append)", success("")),
            ("(string-append \"hello\")", success("hello")),
            (
                "(string-append \"hello\" \" \" \"world\")",
                success("hello world"),
            ),
            ("(string-append 42)", Error),
            ("(string-append \"hello\" 123)", Error),
            // === MATH OPERATIONS - MAX/MIN ===
            ("(max 5)", success(5)),
            ("(max 1 2 3)", success(3)),
            ("(max -5 -1 -10)", success(-1)),
            ("(min 5)", success(5)),
            ("(min 3 1 2)", success(1)),
            ("(min -5 -1 -10)", success(-10)),
            ("(max \"hello\")", Error),
            ("(min 1 #t)", Error),
            // === ERROR FUNCTION OPERATIONS ===
            (
                "(error \"Something went wrong\")",
                SpecificError("Something went wrong"),
            ),
            ("(error 'oops)", SpecificError("oops")),
            ("(error 42)", SpecificError("42")),
            (
                "(error \"Error:\" 42 \"occurred\")",
                SpecificError("Error: 42 occurred"),
            ),
            ("(error)", SpecificError("Error")),
            // === EVAL AND APPLY ===
            ("(eval '(+ 1 2))", success(3)),
            ("(eval (cons '+ '(1 2)))", success(3)),
            ("(eval 5)", success(5)),
            ("(eval ''x)", success(sym("x"))),
            ("(apply + '(1 2 3))", success(6)),
            ("(apply + (list 1 2))", success(3)),
            ("(apply car '((1 2)))", success(1)),
            ("(apply (lambda (a b) (* a b)) '(6 7))", success(42)),
            ("(apply + 1)", SpecificError("improper list")),
            ("(apply 1 '(2))", SpecificError("cannot call")),
            // === OUTPUT ===
            ("(display \"hi\")", EvalResult(Value::Unspecified)),
            ("(newline)", EvalResult(Value::Unspecified)),
            // === ERROR PROPAGATION AND HANDLING ===
            (
                "undefined-var",
                SpecificError("unknown identifier: undefined-var"),
            ),
            // Unsupported special forms appear as unbound identifiers
            ("(set! x 42)", SpecificError("unknown identifier: set!")),
            ("(+ 1 \"hello\")", SpecificError("expected a number")),
            ("(+ 1 (car \"not-a-list\"))", Error),
            ("(1 2 3)", SpecificError("cannot call: 1")),
            ("(+ 1 . 2)", SpecificError("malformed list")),
        ];

        run_comprehensive_tests(test_cases);

        // === ENVIRONMENT-SENSITIVE TESTS ===
        // Tests that require shared state between expressions in the same environment
        let environment_test_cases = vec![
            // === DEFINE AND LOOKUP ===
            TestEnvironment(vec![
                ("(define x 42)", Defines("x")),
                ("x", success(42)),
                ("y", Error),
            ]),
            // === DEFINE AND VARIABLES ===
            TestEnvironment(vec![
                ("(define x 42)", Defines("x")),
                ("(+ x 8)", success(50)),
                ("(define x 100)", Defines("x")),
                ("x", success(100)),
            ]),
            // === DEFINE RETURNS THE BOUND SYMBOL ===
            TestEnvironment(vec![
                ("(equal? (define w 2) 'w)", success(true)),
                ("w", success(2)),
            ]),
            // === FUNCTION DEFINITION SHORTHAND ===
            TestEnvironment(vec![
                ("(define (square x) (* x x))", Defines("square")),
                ("(square 5)", success(25)),
                // Multi-expression bodies run in order, last one wins
                ("(define (two) 1 2)", Defines("two")),
                ("(two)", success(2)),
                // Variadic shorthand with a dotted tail
                ("(define (prefix a . rest) (cons a rest))", Defines("prefix")),
                ("(prefix 1 2 3)", success([1, 2, 3])),
            ]),
            // === BUILTIN FUNCTIONS VIA DYNAMIC SYMBOL LOOKUP ===
            TestEnvironment(vec![
                ("(define my-add +)", Defines("my-add")),
                ("(my-add 10 20)", success(30)),
                ("(define my-eq equal?)", Defines("my-eq")),
                ("(my-eq 5 5)", success(true)),
            ]),
            // === RECURSION ===
            // The defining frame is shared with the closure, so a function
            // can call itself by name
            TestEnvironment(vec![
                (
                    "(define factorial (lambda (n) (if (= n 0) 1 (* n (factorial (- n 1))))))",
                    Defines("factorial"),
                ),
                ("(factorial 5)", success(120)),
            ]),
            TestEnvironment(vec![
                (
                    "(define (countdown n) (if (<= n 0) (list) (cons n (countdown (- n 1)))))",
                    Defines("countdown"),
                ),
                ("(countdown 3)", success([3, 2, 1])),
            ]),
            // === HIGHER ORDER FUNCTIONS ===
            TestEnvironment(vec![
                ("(define twice (lambda (f x) (f (f x))))", Defines("twice")),
                ("(define inc (lambda (x) (+ x 1)))", Defines("inc")),
                ("(twice inc 5)", success(7)),
                ("((lambda (op a b) (op a b)) * 3 4)", success(12)),
            ]),
            // === LEXICAL SCOPING ===
            TestEnvironment(vec![
                ("(define x 10)", Defines("x")),
                (
                    "(define make-adder (lambda (n) (lambda (x) (+ x n))))",
                    Defines("make-adder"),
                ),
                ("(define add5 (make-adder 5))", Defines("add5")),
                ("(add5 3)", success(8)),
                // Parameter shadowing
                ("(define f (lambda (x) (lambda (x) (* x 2))))", Defines("f")),
                ("(define g (f 10))", Defines("g")),
                ("(g 3)", success(6)),
            ]),
            // === ENVIRONMENT SCOPING EDGE CASES ===
            TestEnvironment(vec![
                ("(define x 1)", Defines("x")),
                ("(define f (lambda (x) (+ x 10)))", Defines("f")),
                ("(f 5)", success(15)), // uses parameter x=5, not global x=1
                ("x", success(1)),      // global x unchanged
                ("(f x)", success(11)), // uses global x=1 as argument
            ]),
            // === LET SHADOWING ===
            TestEnvironment(vec![
                ("(define x 1)", Defines("x")),
                ("(let ((x 2)) x)", success(2)),
                ("x", success(1)),
                // let bindings live in a child frame; define inside let
                // does not leak out
                ("(let ((y 5)) (define z 6) (+ y z))", success(11)),
                ("z", Error),
            ]),
            // === COMPLEX EXPRESSIONS ===
            TestEnvironment(vec![(
                "(((lambda (x) (lambda (y) (+ x y))) 10) 5)",
                success(15),
            )]),
            TestEnvironment(vec![
                (
                    "(define make-pair (lambda (a b) (list a b)))",
                    Defines("make-pair"),
                ),
                (
                    "(define get-second (lambda (pair) (car (cdr pair))))",
                    Defines("get-second"),
                ),
                ("(define my-pair (make-pair 42 \"hello\"))", Defines("my-pair")),
                ("(get-second my-pair)", success("hello")),
            ]),
        ];

        run_tests_in_environment(environment_test_cases);
    }

    #[test]
    fn test_procedure_display_forms() {
        let env = create_global_frame();
        assert_eq!(run(&env, "car").to_string(), "#<builtin:car>");
        assert_eq!(
            run(&env, "(lambda (x y) (+ x y))").to_string(),
            "(lambda (x y) (+ x y))"
        );
        assert_eq!(run(&env, "(mu args args)").to_string(), "(mu args args)");
        assert_eq!(
            run(&env, "(lambda (a . rest) a 'done)").to_string(),
            "(lambda (a . rest) a (quote done))"
        );
    }
}
