use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tailscheme::Error;
use tailscheme::ParseErrorKind;
use tailscheme::ast::{Procedure, Value};
use tailscheme::builtinops::{Arity, BuiltinFn, BuiltinOp};
use tailscheme::evaluator;
use tailscheme::frame::FrameRef;
use tailscheme::reader;

fn main() {
    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Interactive helper bound in the global frame alongside the standard set
static HELP_OP: BuiltinOp = BuiltinOp {
    name: "help",
    arity: Arity::Exact(0),
    func: BuiltinFn::Simple(builtin_help),
};

fn builtin_help(_args: &[Value]) -> Result<Value, Error> {
    print_help();
    Ok(Value::Unspecified)
}

fn run_repl() {
    println!("TailScheme Interpreter");
    println!("A small Scheme with lexical closures, mu procedures, and proper tail calls.");
    println!("Enter expressions like: (+ 1 2) or (define (double n) (* n 2))");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let env = evaluator::create_global_frame();
    env.define("help", Value::Procedure(Procedure::Builtin(&HELP_OP)));

    // Lines accumulate here until they form complete expressions
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            "tailscheme> "
        } else {
            "       ...> "
        };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if buffer.is_empty() {
                    if trimmed.is_empty() {
                        continue;
                    }

                    // Handle special commands
                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(trimmed);
                }

                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                // An unfinished expression keeps the buffer and reads more lines
                let expressions = match reader::parse_many(&buffer) {
                    Ok(expressions) => expressions,
                    Err(Error::Parse(parse_error))
                        if parse_error.kind == ParseErrorKind::Incomplete =>
                    {
                        continue;
                    }
                    Err(error) => {
                        println!("Error: {error}");
                        buffer.clear();
                        continue;
                    }
                };
                buffer.clear();

                for expression in expressions {
                    match evaluator::eval(&expression, &env) {
                        Ok(result) => {
                            // Don't print Unspecified values (e.g., from display)
                            if !matches!(result, Value::Unspecified) {
                                println!("{result}");
                            }
                        }
                        Err(error) => {
                            println!("Error: {error}");
                            break;
                        }
                    }
                }
            }

            Err(ReadlineError::Interrupted) => {
                if buffer.is_empty() {
                    println!("Goodbye!");
                    break;
                }
                // Ctrl+C abandons the expression in progress
                buffer.clear();
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("TailScheme REPL commands:");
    println!("  :help  - Show this help message (also available as (help))");
    println!("  :env   - Show global environment bindings");
    println!("  :quit  - Exit the interpreter");
    println!("  :exit  - Exit the interpreter");
    println!("  Ctrl+C - Cancel the expression in progress, or exit");
    println!("  Ctrl+D - Exit the interpreter");
    println!();
    println!("Values:");
    println!("  Numbers: 42, -5, #x1A");
    println!("  Booleans: #t, #f");
    println!("  Strings: \"hello\"");
    println!("  Pairs and lists: (1 2 3), (1 . 2), '()");
    println!();
    println!("Special forms:");
    println!("  (define x 10)            (define (double n) (* n 2))");
    println!("  (lambda (n) (* n n))     (mu (n) (* n scale))");
    println!("  (if test then else)      (cond ((= x 1) 'one) (else 'other))");
    println!("  (and ...) (or ...)       (let ((a 1) (b 2)) (+ a b))");
    println!("  (begin e1 e2)            (quote x) or 'x");
    println!();
    println!("Calls in tail position run in constant stack space:");
    println!("  (define (countdown n) (if (= n 0) 'done (countdown (- n 1))))");
    println!("  (countdown 1000000)");
    println!();
}

fn print_environment(env: &FrameRef) {
    let bindings = env.local_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Global bindings ({} total):", bindings.len());
    println!();

    // Separate built-in procedures from user definitions
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Procedure(Procedure::Builtin(_)) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User definitions ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
