//! Evaluation names and their canonical order.
//!
//! The evaluation of member `P` at opening point `j` is stored under
//! `P` (j = 0), `Pw` (j = 1) or `Pw{j}` (j ≥ 2). The ordered list walks `f`
//! by index, then each `f_i`'s opening points, then its members in slot
//! order. It feeds the `alpha` transcript and the calldata layout, so prover
//! and verifier must build it identically.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use crate::{composed::ComposedPolynomial, error::ProtocolError, poly::Polynomial, F};

/// Named member polynomials supplied by the caller.
pub type PolynomialMap = BTreeMap<String, Polynomial>;

/// Named evaluations shipped in a proof.
pub type Evaluations = BTreeMap<String, F>;

/// Suffix for opening point `j`.
pub fn eval_suffix(j: usize) -> String {
    match j {
        0 => String::new(),
        1 => "w".to_string(),
        _ => format!("w{}", j),
    }
}

pub fn eval_name(pol: &str, j: usize) -> String {
    format!("{}{}", pol, eval_suffix(j))
}

/// Evaluate every member of every `f_i` at each of its opening values.
pub fn calculate_evaluations(
    f: &[ComposedPolynomial],
    polynomials: &PolynomialMap,
    opening_values: &[F],
) -> Result<Evaluations, ProtocolError> {
    let mut evaluations = Evaluations::new();
    for fi in f {
        for &j in &fi.opening_points {
            let z = opening_values
                .get(j)
                .copied()
                .ok_or(ProtocolError::MissingRoot { width: 1, point: j })?;
            for name in &fi.pols {
                let p = polynomials
                    .get(name)
                    .ok_or_else(|| ProtocolError::MissingPolynomial(name.clone()))?;
                evaluations.insert(eval_name(name, j), p.evaluate(z));
            }
        }
    }
    Ok(evaluations)
}

/// Names in canonical order.
pub fn ordered_eval_names(f: &[ComposedPolynomial]) -> Vec<String> {
    f.iter()
        .flat_map(|fi| {
            fi.opening_points
                .iter()
                .flat_map(move |&j| fi.pols.iter().map(move |p| eval_name(p, j)))
        })
        .collect()
}

/// `(name, value)` in canonical order. Fails on the first missing name.
pub fn ordered_evals(
    f: &[ComposedPolynomial],
    evaluations: &Evaluations,
) -> Result<Vec<(String, F)>, ProtocolError> {
    ordered_eval_names(f)
        .into_iter()
        .map(|name| match evaluations.get(&name) {
            Some(v) => Ok((name, *v)),
            None => Err(ProtocolError::MissingEvaluation(name)),
        })
        .collect()
}

/// Values that enter the `alpha` transcript.
pub fn committed_evals<'a>(
    ordered: &'a [(String, F)],
    non_committed: &'a [String],
) -> impl Iterator<Item = &'a F> + 'a {
    ordered
        .iter()
        .filter(move |(name, _)| !non_committed.contains(name))
        .map(|(_, v)| v)
}

/// Member evaluations of one `f_i`, one vector per opening point.
pub fn fi_evals(fi: &ComposedPolynomial, evaluations: &Evaluations) -> Result<Vec<Vec<F>>, ProtocolError> {
    fi.opening_points
        .iter()
        .map(|&j| {
            fi.pols
                .iter()
                .map(|p| {
                    let name = eval_name(p, j);
                    evaluations.get(&name).copied().ok_or(ProtocolError::MissingEvaluation(name))
                })
                .collect()
        })
        .collect()
}
