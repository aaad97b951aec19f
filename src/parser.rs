//! Chain parser using nom.
//!
//! # Syntax Overview
//!
//! ```text
//! append_col(x=3, name='total') >> head(2) >> select(id, total)
//! ─────┬──── ─────────┬─────── ─┬ ───┬───
//!      │              │         │    │
//!      │              │         │    └── Positional argument
//!      │              │         └── Pipe (threads the value into the next verb)
//!      │              └── Named arguments
//!      └── Verb
//! ```
//!
//! Literals: integers, floats, `'single'` or `"double"` quoted strings,
//! `true`, `false`, `null`, lists `[1, 2]`, and bare identifiers (read as
//! strings). A bare identifier in step position is a verb without arguments.
//!
//! Inside quotes a backslash escapes `\\`, `'`, `"`, `n` and `t`.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, opt, recognize, value},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};
use serde_json::Value;

use crate::args::Args;
use crate::ast::*;
use crate::error::{PipeError, PipeResult};

enum Arg {
    Positional(Value),
    Named(String, Value),
}

/// Parse a complete chain expression.
pub fn parse(input: &str) -> PipeResult<Chain> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PipeError::parse(0, "Empty chain"));
    }

    match parse_chain(input) {
        Ok(("", chain)) => Ok(chain),
        Ok((remaining, _)) => Err(PipeError::parse(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = input.len() - e.input.len();
            let near: String = e.input.chars().take(12).collect();
            let message = if e.code == nom::error::ErrorKind::Verify {
                "Positional argument follows named argument".to_string()
            } else if near.is_empty() {
                "Unexpected end of input".to_string()
            } else {
                format!("Unexpected input near '{}'", near)
            };
            Err(PipeError::parse(position, message))
        }
        Err(nom::Err::Incomplete(_)) => Err(PipeError::parse(input.len(), "Incomplete input")),
    }
}

/// Parse `step (>> step)*`.
fn parse_chain(input: &str) -> IResult<&str, Chain> {
    let (mut input, first) = parse_step(input)?;
    let mut steps = vec![first];

    loop {
        let (rest, _) = multispace0(input)?;
        let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>(">>")(rest) else {
            break;
        };
        let (rest, _) = multispace0(rest)?;
        let (rest, step) = parse_step(rest)?;
        steps.push(step);
        input = rest;
    }

    Ok((input, Chain { steps }))
}

/// Parse one step: a verb call or a literal.
fn parse_step(input: &str) -> IResult<&str, Step> {
    alt((parse_verb_step, map(parse_literal, Step::Literal)))(input)
}

fn parse_verb_step(input: &str) -> IResult<&str, Step> {
    let (rest, name) = parse_identifier(input)?;
    if let Some(value) = keyword(name) {
        return Ok((rest, Step::Literal(value)));
    }

    let (rest, _) = multispace0(rest)?;
    let (rest, args) = opt(parse_arg_list)(rest)?;
    let args = match args {
        Some(args) => collect_args(args)?,
        None => Args::new(),
    };

    Ok((
        rest,
        Step::Verb(VerbCall {
            name: name.to_string(),
            args,
        }),
    ))
}

/// Fold parsed arguments, rejecting a positional after a named one.
///
/// Each argument comes with the input it was parsed from, so an error
/// points at the offending argument.
fn collect_args(parsed: Vec<(&str, Arg)>) -> Result<Args, nom::Err<nom::error::Error<&str>>> {
    let mut args = Args::new();
    let mut seen_named = false;
    for (at, arg) in parsed {
        match arg {
            Arg::Positional(_) if seen_named => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    at,
                    nom::error::ErrorKind::Verify,
                )));
            }
            Arg::Positional(value) => args = args.arg(value),
            Arg::Named(name, value) => {
                seen_named = true;
                args = args.kwarg(name, value);
            }
        }
    }
    Ok(args)
}

/// Parse `( arg, arg, ... )`.
fn parse_arg_list(input: &str) -> IResult<&str, Vec<(&str, Arg)>> {
    delimited(
        pair(char('('), multispace0),
        separated_list0(delimited(multispace0, char(','), multispace0), parse_placed_arg),
        pair(multispace0, char(')')),
    )(input)
}

/// Parse an argument, keeping the input it starts at.
fn parse_placed_arg(input: &str) -> IResult<&str, (&str, Arg)> {
    let (rest, arg) = parse_arg(input)?;
    Ok((rest, (input, arg)))
}

/// Parse `name = literal` or `literal`.
fn parse_arg(input: &str) -> IResult<&str, Arg> {
    alt((
        map(
            separated_pair(
                parse_identifier,
                delimited(multispace0, char('='), multispace0),
                parse_literal,
            ),
            |(name, value)| Arg::Named(name.to_string(), value),
        ),
        map(parse_literal, Arg::Positional),
    ))(input)
}

/// Parse an identifier (verb or argument name).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn keyword(word: &str) -> Option<Value> {
    match word {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        _ => None,
    }
}

/// Parse a literal value.
fn parse_literal(input: &str) -> IResult<&str, Value> {
    alt((
        parse_number,
        parse_quoted_string,
        parse_list,
        // Bare identifier: keyword or string
        map(parse_identifier, |s| {
            keyword(s).unwrap_or_else(|| Value::String(s.to_string()))
        }),
    ))(input)
}

/// Parse a number (integer or float).
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (input, num_str) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)?;

    let value = match num_str.parse::<i64>() {
        Ok(i) if !num_str.contains('.') => Value::from(i),
        _ => Value::from(num_str.parse::<f64>().unwrap_or(f64::NAN)),
    };
    Ok((input, value))
}

/// Parse a single- or double-quoted string, with backslash escapes.
fn parse_quoted_string(input: &str) -> IResult<&str, Value> {
    let single = delimited(char('\''), quoted_body("\\'"), char('\''));
    let double = delimited(char('"'), quoted_body("\\\""), char('"'));
    map(alt((single, double)), Value::String)(input)
}

/// The body of a quoted string up to (not including) an unescaped quote.
/// `stop` holds the backslash and the closing quote.
fn quoted_body<'a>(stop: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    map(
        opt(escaped_transform(
            is_not(stop),
            '\\',
            alt((
                value("\\", char('\\')),
                value("'", char('\'')),
                value("\"", char('"')),
                value("\n", char('n')),
                value("\t", char('t')),
            )),
        )),
        Option::unwrap_or_default,
    )
}

/// Parse a list `[literal, ...]`.
fn parse_list(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            pair(char('['), multispace0),
            separated_list0(delimited(multispace0, char(','), multispace0), parse_literal),
            preceded(multispace0, char(']')),
        ),
        Value::Array,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn verb(name: &str, args: Args) -> Step {
        Step::Verb(VerbCall {
            name: name.to_string(),
            args,
        })
    }

    #[test]
    fn test_single_verb() {
        let chain = parse("append_col(x=3)").unwrap();
        assert_eq!(chain.steps, vec![verb("append_col", args![x = 3])]);
    }

    #[test]
    fn test_bare_verb() {
        let chain = parse("count").unwrap();
        assert_eq!(chain.steps, vec![verb("count", Args::new())]);
        let chain = parse("count()").unwrap();
        assert_eq!(chain.steps, vec![verb("count", Args::new())]);
    }

    #[test]
    fn test_multi_step_chain() {
        let chain = parse("  append_col(x=3, name='total') >>head(2)>> select(id, \"total\")  ").unwrap();
        assert_eq!(
            chain.steps,
            vec![
                verb("append_col", args![x = 3, name = "total"]),
                verb("head", args![2]),
                verb("select", args!["id", "total"]),
            ]
        );
    }

    #[test]
    fn test_literal_values() {
        let chain = parse("f(-2, 1.5, true, null, [1, 'a'], y = false)").unwrap();
        let Step::Verb(call) = &chain.steps[0] else {
            panic!("expected a verb step");
        };
        assert_eq!(
            call.args.positional(),
            &[json!(-2), json!(1.5), json!(true), json!(null), json!([1, "a"])]
        );
        assert_eq!(call.args.named().get("y"), Some(&json!(false)));
    }

    #[test]
    fn test_literal_step() {
        let chain = parse("head(1) >> 3 >> true").unwrap();
        assert_eq!(chain.steps[1], Step::Literal(json!(3)));
        assert_eq!(chain.steps[2], Step::Literal(json!(true)));
    }

    #[test]
    fn test_positional_after_named_is_rejected() {
        let err = parse("head(n=2, 3)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at position 10: Positional argument follows named argument"
        );
    }

    #[test]
    fn test_errors_report_position() {
        let err = parse("head(2) >> ").unwrap_err();
        assert!(matches!(err, PipeError::Parse { .. }));

        let err = parse("head(2) junk").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at position 7: Unexpected trailing content: ' junk'"
        );

        let err = parse("   ").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 0: Empty chain");
    }

    #[test]
    fn test_display_is_canonical() {
        let chain = parse("append_col( x = 3 ) >> select(a,'b') >> count").unwrap();
        assert_eq!(chain.to_string(), "append_col(x=3) >> select('a', 'b') >> count()");
        assert_eq!(parse(&chain.to_string()).unwrap(), chain);
    }

    #[test]
    fn test_quoted_string_escapes() {
        let chain = parse(r#"f('it\'s', "say \"hi\"", 'a\\b\n', '', "")"#).unwrap();
        let Step::Verb(call) = &chain.steps[0] else {
            panic!("expected a verb step");
        };
        assert_eq!(
            call.args.positional(),
            &[json!("it's"), json!("say \"hi\""), json!("a\\b\n"), json!(""), json!("")]
        );
    }

    #[test]
    fn test_quotes_survive_display() {
        for text in [
            r#"append_col(name="it's")"#,
            r#"f(['a"b'])"#,
            r#"f(["it's", 'back\\slash', [1, 'x']], y='a\'b"c')"#,
        ] {
            let chain = parse(text).unwrap();
            assert_eq!(parse(&chain.to_string()).unwrap(), chain, "{}", chain);
        }
        assert_eq!(
            parse(r#"append_col(name="it's")"#).unwrap().to_string(),
            r"append_col(name='it\'s')"
        );
    }
}
