//! Reader: turns Scheme source text into [`Value`] expression trees.
//!
//! The grammar is small: decimal and `#x` hexadecimal numbers, `#t`/`#f`
//! booleans, strings with the usual escapes, symbols, proper and dotted
//! lists, and `'expr` as sugar for `(quote expr)`. A `;` starts a comment
//! running to the end of the line.
//!
//! The reader does not evaluate anything. `(+ 1 2)` comes back as a plain
//! three-element list; special forms and procedure calls only gain meaning
//! in [`crate::evaluator`].
//!
//! # Error reporting
//!
//! Failures carry a [`ParseErrorKind`] so callers can react to the shape of
//! the problem, not just the message. Interactive callers watch for
//! [`ParseErrorKind::Incomplete`] to keep reading lines until the expression
//! closes; [`parse`] reports leftover text as
//! [`ParseErrorKind::TrailingContent`], while [`parse_many`] keeps reading
//! expressions until the source is exhausted.

use nom::{
    IResult, Parser, branch::alt, bytes::complete::take_while1, character::complete::char,
    combinator::cut, error::ErrorKind, sequence::preceded,
};

use crate::ast::{NumberType, SYMBOL_SPECIAL_CHARS, Value, is_valid_symbol};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Parse a single complete expression from `source`.
///
/// Anything other than whitespace or comments after the expression is an
/// error. Use [`parse_many`] for sources holding several expressions.
pub fn parse(source: &str) -> Result<Value, Error> {
    let (rest, expression) = match parse_expr(source, 0) {
        Ok(parsed) => parsed,
        Err(error) => return Err(Error::Parse(classify_failure(source, error))),
    };

    let rest = after_ws(rest);
    if rest.is_empty() {
        return Ok(expression);
    }

    let offset = source.len().saturating_sub(rest.len());
    Err(Error::Parse(ParseError::with_context_and_found(
        ParseErrorKind::TrailingContent,
        format!("Unexpected remaining input: '{rest}'"),
        source,
        offset,
        Some(leading_token(rest)),
    )))
}

/// Parse every expression in `source`, for program files and multi-form
/// input. An empty or comment-only source yields an empty vector.
pub fn parse_many(source: &str) -> Result<Vec<Value>, Error> {
    let mut expressions = Vec::new();
    let mut rest = after_ws(source);

    while !rest.is_empty() {
        match parse_expr(rest, 0) {
            Ok((remaining, expression)) => {
                expressions.push(expression);
                rest = after_ws(remaining);
            }
            Err(error) => return Err(Error::Parse(classify_failure(source, error))),
        }
    }

    Ok(expressions)
}

/// Translate a nom error into a [`ParseError`].
///
/// The residual input in the nom error marks where parsing stopped; the
/// error code and the text sitting at that position decide the kind.
fn classify_failure(source: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    let (position, code) = match &error {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, Some(e.code)),
        nom::Err::Incomplete(_) => ("", None),
    };

    if code == Some(ErrorKind::TooLarge) {
        return ParseError::from_message(
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        );
    }

    let rest = after_ws(position);
    if rest.is_empty() {
        return ParseError::from_message(ParseErrorKind::Incomplete, "Unexpected end of input");
    }

    let offset = source.len().saturating_sub(rest.len());
    let token = leading_token(rest);

    match code {
        Some(ErrorKind::Digit) => ParseError::with_context_and_found(
            ParseErrorKind::ImplementationLimit,
            format!("Number literal out of range: {token}"),
            source,
            offset,
            Some(token),
        ),
        Some(ErrorKind::HexDigit) => ParseError::with_context_and_found(
            ParseErrorKind::InvalidSyntax,
            format!("Invalid hexadecimal literal: {token}"),
            source,
            offset,
            Some(token),
        ),
        _ if rest.starts_with("#\\") => ParseError::with_context_and_found(
            ParseErrorKind::Unsupported,
            "Character literals are not supported",
            source,
            offset,
            Some(rest.chars().take(3).collect()),
        ),
        _ if rest.starts_with(',') || rest.starts_with('`') => ParseError::with_context_and_found(
            ParseErrorKind::Unsupported,
            "Quasiquotation is not supported",
            source,
            offset,
            Some(rest.chars().take(1).collect()),
        ),
        _ => {
            let near: String = rest.chars().take(10).collect();
            ParseError::with_context_and_found(
                ParseErrorKind::InvalidSyntax,
                format!("Invalid syntax near '{near}'"),
                source,
                offset,
                Some(token),
            )
        }
    }
}

/// Skip whitespace and `;` line comments
fn after_ws(input: &str) -> &str {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        let Some(comment) = trimmed.strip_prefix(';') else {
            return trimmed;
        };
        rest = match comment.find('\n') {
            Some(line_end) => &comment[line_end + 1..],
            None => "",
        };
    }
}

/// nom adapter for [`after_ws`], run ahead of every token
fn skip_ws(input: &str) -> IResult<&str, ()> {
    Ok((after_ws(input), ()))
}

/// The leading run of atom characters, or the single leading character
fn leading_token(input: &str) -> String {
    let token: String = input.chars().take_while(|&c| is_atom_char(c)).collect();
    if token.is_empty() {
        input.chars().take(1).collect()
    } else {
        token
    }
}

/// Parse one expression at the given nesting depth
fn parse_expr(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        // Failure: alt must not backtrack over the depth report
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }

    preceded(
        skip_ws,
        alt((
            |input| parse_quoted(input, depth),
            |input| parse_list(input, depth),
            parse_string,
            parse_atom,
        )),
    )
    .parse(input)
}

/// `'expr` is sugar for `(quote expr)`
fn parse_quoted(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    // cut: alt must not backtrack once the quote mark is consumed, or a
    // truncated input stops reading as incomplete
    let (input, quoted) = cut(|input| parse_expr(input, depth + 1)).parse(input)?;
    let expression = Value::list([Value::Symbol("quote".to_owned()), quoted]);
    Ok((input, expression))
}

/// Parse a parenthesized list: proper `(a b c)` or dotted `(a b . c)`.
///
/// A `.` only reads as a pair separator when followed by a delimiter, so
/// `(a . b)` is a pair while `(a .b)` stays a syntax error.
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (mut rest, _) = char('(').parse(input)?;
    let mut elements = Vec::new();

    loop {
        rest = after_ws(rest);

        if let Some(after_close) = rest.strip_prefix(')') {
            return Ok((after_close, Value::from(elements)));
        }

        if let Some(after_dot) = rest.strip_prefix('.')
            && after_dot.chars().next().is_none_or(is_delimiter)
        {
            if elements.is_empty() {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    rest,
                    ErrorKind::Tag,
                )));
            }
            return parse_dotted_tail(after_dot, depth, elements);
        }

        // cut: inside an open list only an element or `)` can follow, so a
        // miss here (end of input included) must not backtrack
        let (remaining, element) = cut(|input| parse_expr(input, depth + 1)).parse(rest)?;
        elements.push(element);
        rest = remaining;
    }
}

/// After the `.` in a list: exactly one expression, then the closing paren
fn parse_dotted_tail(input: &str, depth: usize, elements: Vec<Value>) -> IResult<&str, Value> {
    // cut: the tail expression is committed once the dot is read
    let (rest, tail) = cut(|input| parse_expr(input, depth + 1)).parse(input)?;

    let rest = after_ws(rest);
    let Some(after_close) = rest.strip_prefix(')') else {
        return Err(nom::Err::Failure(nom::error::Error::new(
            rest,
            ErrorKind::Char,
        )));
    };

    let list = elements
        .into_iter()
        .rev()
        .fold(tail, |so_far, element| Value::cons(element, so_far));
    Ok((after_close, list))
}

/// Parse a double-quoted string with `\n`, `\t`, `\r`, `\\` and `\"` escapes
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (remaining, _) = char('"').parse(input)?;
    let mut result = String::new();
    let mut chars = remaining.char_indices();

    loop {
        match chars.next() {
            Some((index, '"')) => {
                return Ok((&remaining[index + 1..], Value::String(result)));
            }
            Some((index, '\\')) => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, 'r')) => result.push('\r'),
                Some((_, '\\')) => result.push('\\'),
                Some((_, '"')) => result.push('"'),
                _ => {
                    // Unknown escape, reported at the backslash
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        &remaining[index..],
                        ErrorKind::Char,
                    )));
                }
            },
            Some((_, ch)) => result.push(ch),
            None => {
                // Input ended inside the string
                return Err(nom::Err::Failure(nom::error::Error::new(
                    "",
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// Parse an unquoted token: number, boolean, hexadecimal literal, or symbol
fn parse_atom(input: &str) -> IResult<&str, Value> {
    let (rest, token) = take_while1(is_atom_char).parse(input)?;
    match classify_atom(token) {
        Ok(value) => Ok((rest, value)),
        // Failure: the token cannot read as anything else
        Err(code) => Err(nom::Err::Failure(nom::error::Error::new(input, code))),
    }
}

/// Characters that may appear inside an atom token
fn is_atom_char(c: char) -> bool {
    c.is_alphanumeric() || c == '#' || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Characters that end an atom, and that make a `.` read as a pair separator
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\'' | ';')
}

/// Decide what a complete token denotes.
///
/// The error code names what went wrong so [`classify_failure`] can build a
/// precise message: `Digit` for a number out of range, `HexDigit` for a bad
/// hexadecimal literal, `Alpha` for an invalid symbol.
fn classify_atom(token: &str) -> Result<Value, ErrorKind> {
    match token {
        "#t" => return Ok(Value::Bool(true)),
        "#f" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if let Some(hex_digits) = token.strip_prefix("#x").or_else(|| token.strip_prefix("#X")) {
        return match NumberType::from_str_radix(hex_digits, 16) {
            Ok(number) => Ok(Value::Number(number)),
            Err(_) => Err(ErrorKind::HexDigit),
        };
    }

    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return match token.parse::<NumberType>() {
            Ok(number) => Ok(Value::Number(number)),
            // The digits were fine, the magnitude was not
            Err(_) => Err(ErrorKind::Digit),
        };
    }

    if is_valid_symbol(token) {
        return Ok(Value::Symbol(token.to_owned()));
    }

    Err(ErrorKind::Alpha)
}
