//! Parsing of SAT / MaxSAT solver output
//!
//! Solvers following the competition format print:
//!
//! ```text
//! c comment
//! s SATISFIABLE | UNSATISFIABLE | OPTIMUM FOUND | UNKNOWN
//! v 1 -2 3 0
//! o 4
//! ```
//!
//! MaxSAT solvers may also print the model as a single bit string
//! (`v 0110`), one character per variable.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::separated_list1,
    sequence::{pair, preceded, terminated},
    IResult,
};

use crate::error::{UelError, UelResult};
use crate::sat::formula::{Model, SatResult, Var};

/// Status reported on the `s` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Satisfiable,
    Unsatisfiable,
    Optimum,
    Unknown,
}

/// One meaningful output line
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputLine<'a> {
    Status(SolverStatus),
    Values(Vec<&'a str>),
    Cost(u64),
}

fn status(input: &str) -> IResult<&str, SolverStatus> {
    preceded(
        pair(char('s'), space1),
        alt((
            value(SolverStatus::Unsatisfiable, tag("UNSATISFIABLE")),
            value(SolverStatus::Satisfiable, tag("SATISFIABLE")),
            value(SolverStatus::Optimum, tag("OPTIMUM FOUND")),
            value(SolverStatus::Unknown, tag("UNKNOWN")),
        )),
    )(input)
}

fn signed(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1))(input)
}

fn values(input: &str) -> IResult<&str, Vec<&str>> {
    preceded(pair(char('v'), space1), separated_list1(space1, signed))(input)
}

fn cost(input: &str) -> IResult<&str, u64> {
    preceded(pair(char('o'), space1), map_res(digit1, str::parse))(input)
}

fn output_line(input: &str) -> IResult<&str, OutputLine<'_>> {
    all_consuming(terminated(
        alt((
            map(status, OutputLine::Status),
            map(cost, OutputLine::Cost),
            map(values, OutputLine::Values),
        )),
        space0,
    ))(input)
}

/// Build a model from the collected `v` tokens
///
/// A single unterminated token of several `0`/`1` characters is a bit
/// string; anything else is a list of signed literals.
fn model_from_tokens(tokens: &[&str]) -> UelResult<Model> {
    if let [bits] = tokens {
        if bits.len() > 1 && bits.chars().all(|c| c == '0' || c == '1') {
            let mut model = Model::new();
            for (i, bit) in bits.chars().enumerate() {
                model.assign(i as Var + 1, bit == '1');
            }
            return Ok(model);
        }
    }
    let literals = tokens
        .iter()
        .map(|t| {
            t.parse::<i64>()
                .map_err(|_| UelError::solver_output(format!("invalid literal {}", t)))
        })
        .collect::<UelResult<Vec<_>>>()?;
    Model::from_dimacs(literals)
}

/// Turn solver stdout into a result
///
/// Comment lines and unrecognised lines are ignored; a missing status line
/// or a satisfiable status without a model is an error.
pub fn parse_solver_output<S: AsRef<str>>(lines: &[S]) -> UelResult<SatResult> {
    let mut status_seen = None;
    let mut tokens: Vec<&str> = Vec::new();
    let mut best_cost = None;

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        match output_line(line) {
            Ok((_, OutputLine::Status(s))) => status_seen = Some(s),
            Ok((_, OutputLine::Values(v))) => tokens.extend(v),
            Ok((_, OutputLine::Cost(c))) => best_cost = Some(c),
            Err(_) => {}
        }
    }

    let Some(status) = status_seen else {
        return Err(UelError::solver_output("solver printed no status line"));
    };
    match status {
        SolverStatus::Unsatisfiable => Ok(SatResult::Unsat),
        SolverStatus::Unknown => Ok(SatResult::Unknown("solver reported UNKNOWN".to_string())),
        SolverStatus::Satisfiable | SolverStatus::Optimum => {
            if tokens.is_empty() {
                return Err(UelError::solver_output("satisfiable result without a model"));
            }
            let mut model = model_from_tokens(&tokens)?;
            model.cost = best_cost;
            Ok(SatResult::Sat(model))
        }
    }
}
