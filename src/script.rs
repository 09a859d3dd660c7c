//! Script compiler: channel DSL text -> executable [`Program`].
//!
//! A script is a semicolon-separated sequence of opcode invocations:
//!
//! ```text
//! mod(1/4); set(1); exp(12); mul(.8);
//! mod(1/4); sin((B.L*180)+55, 1.29); mul(A.L);
//! ```
//!
//! Arguments are arithmetic expressions over float literals, `+ - * /`,
//! unary minus, parentheses, and channel-register references (`A.L`, `B.R`).
//! Channel letters resolve to ordinals at compile time; whether the channel
//! exists is checked when the program runs, so a script may reference a
//! channel that is appended later.

use nom::{
    branch::alt,
    character::complete::{alpha1, char, multispace0, satisfy},
    combinator::{all_consuming, map, opt},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

/// Output lane of a channel-register reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Left,
    Right,
}

/// Argument expression, evaluated against the generator context each step.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Another channel's register, resolved letter -> ordinal at compile time.
    Register { channel: usize, lane: Lane },
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

/// One lowered opcode invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Set the fold period for the remainder of the current step.
    Mod(Expr),
    /// Write `sin(bt * freq * 2pi + phase)` to both lanes.
    Sin { freq: Expr, phase: Expr },
    /// Write a constant to both lanes.
    Set(Expr),
    /// Multiply both lanes.
    Mul(Expr),
    /// Exponential decay keyed to bar time.
    Exp(Expr),
    /// Raise both lanes to a power.
    Pow(Expr),
}

/// A compiled script: the opcode sequence run once per step.
///
/// Independent of buffer size; stale only when the script text changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub ops: Vec<Op>,
}

/// Script text rejected by the compiler. Compilation never mutates channel
/// state, so a rejected edit leaves the previous script in effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error at offset {offset} near `{fragment}`")]
    Syntax { offset: usize, fragment: String },
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    #[error("`{opcode}` expects {expected} argument(s), got {got}")]
    WrongArity {
        opcode: &'static str,
        expected: &'static str,
        got: usize,
    },
}

/// Compile script text into a [`Program`].
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let calls = match parse_script(source) {
        Ok((_, calls)) => calls,
        Err(err) => return Err(syntax_error(source, err)),
    };
    let mut ops = Vec::with_capacity(calls.len());
    for (name, args) in calls {
        ops.push(lower_call(name, args)?);
    }
    Ok(Program { ops })
}

fn lower_call(name: &str, mut args: Vec<Expr>) -> Result<Op, CompileError> {
    match name {
        "mod" => Ok(Op::Mod(single_arg("mod", args)?)),
        "set" => Ok(Op::Set(single_arg("set", args)?)),
        "mul" => Ok(Op::Mul(single_arg("mul", args)?)),
        "exp" => Ok(Op::Exp(single_arg("exp", args)?)),
        "pow" => Ok(Op::Pow(single_arg("pow", args)?)),
        "sin" => {
            if args.is_empty() || args.len() > 2 {
                return Err(CompileError::WrongArity {
                    opcode: "sin",
                    expected: "1 or 2",
                    got: args.len(),
                });
            }
            let freq = args.remove(0);
            let phase = if args.is_empty() {
                Expr::Number(0.0)
            } else {
                args.remove(0)
            };
            Ok(Op::Sin { freq, phase })
        }
        other => Err(CompileError::UnknownOpcode(other.to_string())),
    }
}

fn single_arg(opcode: &'static str, mut args: Vec<Expr>) -> Result<Expr, CompileError> {
    if args.len() != 1 {
        return Err(CompileError::WrongArity {
            opcode,
            expected: "1",
            got: args.len(),
        });
    }
    Ok(args.remove(0))
}

fn syntax_error(source: &str, err: nom::Err<nom::error::Error<&str>>) -> CompileError {
    let rest = match &err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
        nom::Err::Incomplete(_) => "",
    };
    CompileError::Syntax {
        offset: source.len() - rest.len(),
        fragment: rest.chars().take(16).collect(),
    }
}

// ---- grammar ----

type Call<'a> = (&'a str, Vec<Expr>);

/// Surrounding-whitespace wrapper.
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Whole script: calls separated by `;`, optional trailing `;`. The empty
/// script is valid and compiles to the empty (silent) program.
fn parse_script(input: &str) -> IResult<&str, Vec<Call<'_>>> {
    all_consuming(delimited(
        multispace0,
        terminated(
            separated_list0(ws(char(';')), parse_call),
            opt(ws(char(';'))),
        ),
        multispace0,
    ))(input)
}

fn parse_call(input: &str) -> IResult<&str, Call<'_>> {
    pair(
        alpha1,
        delimited(
            preceded(multispace0, char('(')),
            separated_list0(char(','), parse_expr),
            char(')'),
        ),
    )(input)
}

/// Additive level: `term (('+' | '-') term)*`, left-associative.
fn parse_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_term(input)?;
    let (input, rest) = many0(pair(alt((char('+'), char('-'))), parse_term))(input)?;
    Ok((input, fold_binary(first, rest)))
}

/// Multiplicative level: `factor (('*' | '/') factor)*`.
fn parse_term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_factor(input)?;
    let (input, rest) = many0(pair(alt((char('*'), char('/'))), parse_factor))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn fold_binary(first: Expr, rest: Vec<(char, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
        match op {
            '+' => Expr::Add(lhs, rhs),
            '-' => Expr::Sub(lhs, rhs),
            '*' => Expr::Mul(lhs, rhs),
            _ => Expr::Div(lhs, rhs),
        }
    })
}

fn parse_factor(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), parse_expr, char(')')),
        parse_register,
        map(preceded(char('-'), parse_factor), |inner| {
            Expr::Neg(Box::new(inner))
        }),
        map(double, Expr::Number),
    )))(input)
}

/// `A.L` / `A.R`: uppercase channel letter, dot, lane letter.
fn parse_register(input: &str) -> IResult<&str, Expr> {
    map(
        tuple((
            satisfy(|c: char| c.is_ascii_uppercase()),
            char('.'),
            alt((char('L'), char('R'))),
        )),
        |(letter, _, lane)| Expr::Register {
            channel: (letter as u8 - b'A') as usize,
            lane: if lane == 'L' { Lane::Left } else { Lane::Right },
        },
    )(input)
}
