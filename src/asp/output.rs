//! clingo JSON output (`--outf=2`)
//!
//! ```json
//! {
//!   "Solver": "clingo version 5.6.2",
//!   "Call": [{ "Witnesses": [{ "Value": ["relsubs(x2,a1)"] }] }],
//!   "Result": "SATISFIABLE",
//!   "Time": { "Total": 0.002 }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, space0},
    combinator::{all_consuming, map, map_res},
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};
use serde::Deserialize;

use crate::atoms::{Atom, AtomId, AtomStore};
use crate::error::{UelError, UelResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClingoOutput {
    #[serde(default)]
    pub solver: Option<String>,
    pub result: String,
    #[serde(default)]
    pub call: Vec<ClingoCall>,
    #[serde(default)]
    pub time: Option<ClingoTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClingoCall {
    #[serde(default)]
    pub witnesses: Vec<Witness>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Witness {
    #[serde(default)]
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClingoTime {
    #[serde(default)]
    pub total: f64,
}

impl ClingoOutput {
    pub fn parse(text: &str) -> UelResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| UelError::solver_output(format!("invalid clingo output: {}", e)))
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.result == "UNSATISFIABLE"
    }

    pub fn witnesses(&self) -> &[Witness] {
        self.call.first().map_or(&[][..], |c| c.witnesses.as_slice())
    }
}

/// A parsed ground term of the encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Constant(AtomId),
    Variable(AtomId),
    Exists { role: usize, filler: AtomId },
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse)(input)
}

/// `a<N>` or `x<N>`
fn name(input: &str) -> IResult<&str, Term> {
    map(pair(one_of("ax"), number), |(prefix, id)| match prefix {
        'x' => Term::Variable(id),
        _ => Term::Constant(id),
    })(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(space0, char(','), space0)(input)
}

fn exists(input: &str) -> IResult<&str, Term> {
    map(
        preceded(
            tag("exists("),
            tuple((preceded(char('r'), number), comma, name, char(')'))),
        ),
        |(role, _, filler, _)| Term::Exists { role, filler: term_id(filler) },
    )(input)
}

fn term(input: &str) -> IResult<&str, Term> {
    alt((exists, name))(input)
}

/// `relsubs(x<N>,<term>)`
fn relsubs(input: &str) -> IResult<&str, (AtomId, Term)> {
    all_consuming(delimited(
        tag("relsubs("),
        separated_pair(preceded(char('x'), number), comma, term),
        char(')'),
    ))(input)
}

fn term_id(term: Term) -> AtomId {
    match term {
        Term::Constant(id) | Term::Variable(id) => id,
        // only names are fillers
        Term::Exists { filler, .. } => filler,
    }
}

/// Resolve a term against the store
pub fn resolve_term(store: &AtomStore, term: Term) -> UelResult<AtomId> {
    let id = match term {
        Term::Constant(id) | Term::Variable(id) => {
            if !store.contains(id) {
                return Err(UelError::malformed_encoding(format!("unknown atom id {}", id)));
            }
            id
        }
        Term::Exists { role, filler } => store
            .id_of(&Atom::exists(role, filler))
            .ok_or_else(|| {
                UelError::malformed_encoding(format!("unknown atom exists(r{},{})", role, filler))
            })?,
    };
    Ok(id)
}

/// Parse one `relsubs` value
pub fn parse_relsubs(value: &str) -> UelResult<(AtomId, Term)> {
    relsubs(value.trim())
        .map(|(_, parsed)| parsed)
        .map_err(|_| UelError::solver_output(format!("unexpected witness atom {}", value)))
}

/// Collect the subsumers of every variable mentioned by a witness
pub fn witness_assignment(
    store: &AtomStore,
    witness: &Witness,
) -> UelResult<BTreeMap<AtomId, BTreeSet<AtomId>>> {
    let mut assignment: BTreeMap<AtomId, BTreeSet<AtomId>> = BTreeMap::new();
    for value in &witness.value {
        let (var, term) = parse_relsubs(value)?;
        if !store.is_variable(var) {
            return Err(UelError::malformed_encoding(format!(
                "witness assigns the non-variable x{}",
                var
            )));
        }
        assignment.entry(var).or_default().insert(resolve_term(store, term)?);
    }
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const OUTPUT: &str = r#"{
      "Solver": "clingo version 5.6.2",
      "Input": ["-"],
      "Call": [{ "Witnesses": [
        { "Value": ["relsubs(x2,a1)"] },
        { "Value": ["relsubs(x2,a1)", "relsubs(x2,exists(r0,a1))"] }
      ]}],
      "Result": "SATISFIABLE",
      "Models": { "Number": 2, "More": "no" },
      "Time": { "Total": 0.004, "Solve": 0.0 }
    }"#;

    #[test]
    fn test_parse_json() {
        let output = ClingoOutput::parse(OUTPUT).unwrap();
        assert_eq!(output.result, "SATISFIABLE");
        assert_eq!(output.witnesses().len(), 2);
        assert!(output.solver.unwrap().starts_with("clingo"));
    }

    #[test]
    fn test_parse_terms() {
        assert_eq!(parse_relsubs("relsubs(x2,a1)").unwrap(), (2, Term::Constant(1)));
        assert_eq!(
            parse_relsubs("relsubs(x2,exists(r0,x4))").unwrap(),
            (2, Term::Exists { role: 0, filler: 4 })
        );
        let err = parse_relsubs("subs(x2,a1)").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedSolverOutput);
    }

    #[test]
    fn test_witness_assignment() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let ra = store.existential("r", a).unwrap();

        let output = ClingoOutput::parse(OUTPUT).unwrap();
        let assignment = witness_assignment(&store, &output.witnesses()[1]).unwrap();
        assert_eq!(assignment[&x], BTreeSet::from([a, ra]));

        let unknown = Witness { value: vec!["relsubs(x2,exists(r5,a1))".into()] };
        let err = witness_assignment(&store, &unknown).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedEncoding);
    }
}
