//! Opening verifier.
//!
//! Replays the challenges from the commitments and evaluations only, then
//! checks
//!
//! ```text
//! e(F - E - J + y·[W'], G₂) == e([W'], [τ]G₂)
//!   F = [f_0] + Σ_{i≥1} q_i [f_i]
//!   E = (r_0(y) + Σ_{i≥1} q_i r_i(y))·G₁
//!   J = q_0 [W]
//!   q_0 = Z_0(y),  q_i = alpha^i · Z_0(y) / Z_i(y)
//! ```
//!
//! `r_i(y)` uses closed-form Lagrange bases when `f_i` has one or two opening
//! points; with three or more it interpolates, which is the only
//! interpolation done at verify time. Every inverse comes from the batched
//! `inv` shipped in the proof.
//!
//! Commitments of fully preprocessed `f_i` are taken from the verifying key
//! when it pins them; a proof carrying a different one is rejected. With a
//! chained seed those commitments never enter the transcript, so the key must
//! pin them.
//!
//! A proof that fails any check yields `Ok(false)`. Errors are reserved for
//! malformed input (missing commitments or evaluations).

use std::collections::BTreeMap;

use ark_bn254::{G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, One, Zero};
use tracing::{info, warn};

use crate::{
    composed::ComposedPolynomial,
    error::{ensure_degree, ConfigError, ProtocolError},
    evals::{committed_evals, fi_evals, ordered_evals},
    inverse::{Denominators, Inverses},
    pcs::{pairing_check, Commitment},
    poly::Polynomial,
    prover::OpeningProof,
    roots::{calculate_roots, FiRoots},
    setup::VerifyingKey,
    transcript::{compute_alpha, compute_xi_seed, compute_y, OpenOptions, XiSeed},
    F,
};

/// `f_i(s) = Σ_j p_j(s^n)·s^j` from the member evaluations at `s^n`.
fn composed_value(evals: &[F], s: F) -> F {
    evals.iter().rev().fold(F::zero(), |acc, e| acc * s + e)
}

/// `r_i(y)` for one `f_i`. `evals[k]` are the member evaluations at the
/// `k`-th opening point and `inv_den` the inverted Lagrange denominators of
/// the signature.
fn evaluate_ri(
    fi: &ComposedPolynomial,
    evals: &[Vec<F>],
    roots: &FiRoots,
    y: F,
    opening_values: &[F],
    inv_den: &[F],
) -> Result<F, ProtocolError> {
    let n = fi.width();
    let missing = || ProtocolError::ZeroDenominator(format!("Lagrange basis of f{}", fi.index));

    match roots.sets.as_slice() {
        [_] if n == 1 => Ok(evals[0][0]),
        [set] => {
            if inv_den.len() != n {
                return Err(missing());
            }
            let num = y.pow([n as u64]) - opening_values[fi.opening_points[0]];
            Ok(set
                .iter()
                .zip(inv_den)
                .fold(F::zero(), |acc, (s, inv)| acc + composed_value(&evals[0], *s) * num * inv))
        }
        [s0, s1] if n == 1 => {
            if inv_den.len() != 2 {
                return Err(missing());
            }
            let l0 = (y - s1[0]) * inv_den[0];
            let l1 = (y - s0[0]) * inv_den[1];
            Ok(evals[0][0] * l0 + evals[1][0] * l1)
        }
        [s0, s1] => {
            if inv_den.len() != 2 * n {
                return Err(missing());
            }
            let xi0 = opening_values[fi.opening_points[0]];
            let xi1 = opening_values[fi.opening_points[1]];
            let yn = y.pow([n as u64]);
            let num = yn * yn - (xi0 + xi1) * yn + xi0 * xi1;
            let mut acc = F::zero();
            for (a, set) in [s0, s1].into_iter().enumerate() {
                for (l, s) in set.iter().enumerate() {
                    acc += composed_value(&evals[a], *s) * num * inv_den[a * n + l];
                }
            }
            Ok(acc)
        }
        sets => {
            let points = roots.flat();
            let values: Vec<F> = sets
                .iter()
                .zip(evals)
                .flat_map(|(set, e)| set.iter().map(move |s| composed_value(e, *s)))
                .collect();
            let ri = Polynomial::lagrange_interpolation(&points, &values)?;
            ensure_degree("r", ri.degree(), points.len() - 1)?;
            Ok(ri.evaluate(y))
        }
    }
}

/// The commitment of every `f_i`, preferring the key's pinned copies.
/// `None` when the proof disagrees with a pinned commitment.
fn resolve_commitments(
    vk: &VerifyingKey,
    proof: &OpeningProof,
    options: &OpenOptions,
) -> Result<Option<BTreeMap<usize, Commitment>>, ProtocolError> {
    let mut out = BTreeMap::new();
    for fi in &vk.f {
        let sent = proof.commits.f.get(&fi.index);
        let c = match vk.preprocessed.get(&fi.index) {
            Some(pinned) if fi.is_preprocessed() => {
                if sent.map_or(false, |c| c != pinned) {
                    warn!(f = fi.index, "preprocessed commitment differs from the verifying key");
                    return Ok(None);
                }
                *pinned
            }
            _ if fi.is_preprocessed() && matches!(options.xi_seed, XiSeed::Chained(_)) => {
                return Err(ProtocolError::MissingCommitment(format!("f{} in the verifying key", fi.index)));
            }
            _ => *sent.ok_or_else(|| ProtocolError::MissingCommitment(format!("f{}", fi.index)))?,
        };
        out.insert(fi.index, c);
    }
    Ok(Some(out))
}

/// `[1, alpha·q0/Z_1(y), alpha²·q0/Z_2(y), ...]` with `q0 = Z_0(y)`.
fn quotients(
    f: &[ComposedPolynomial],
    q0: F,
    alpha: F,
    inverses: &Inverses<'_>,
) -> Result<Vec<F>, ProtocolError> {
    let mut out = vec![F::one()];
    let mut challenge = alpha;
    for fi in f.iter().skip(1) {
        out.push(challenge * q0 * inverses.zerofier(&fi.signature())?);
        challenge *= alpha;
    }
    Ok(out)
}

/// Check an opening proof against the verifying key.
///
/// `options` must match the ones given to [`crate::prover::open`].
pub fn verify_openings(
    vk: &VerifyingKey,
    proof: &OpeningProof,
    options: &OpenOptions,
) -> Result<bool, ProtocolError> {
    let f = &vk.f;
    if f.is_empty() {
        return Err(ConfigError::TooFewComposed(0).into());
    }
    info!(n_f = f.len(), "verifying openings");

    let Some(commits) = resolve_commitments(vk, proof, options)? else {
        return Ok(false);
    };

    let xi_seed = compute_xi_seed(f, &commits, &options.xi_seed)?;
    if xi_seed != proof.xi_seed {
        warn!("xiSeed mismatch");
        return Ok(false);
    }
    let ordered = ordered_evals(f, &proof.evaluations)?;
    let alpha = compute_alpha(xi_seed, committed_evals(&ordered, &options.non_committed));

    let challenge_xi = xi_seed.pow([vk.roots.power_w() as u64]);
    let opening_values = vk.roots.opening_values(challenge_xi, vk.n_opening_points);
    let roots = calculate_roots(f, &vk.roots, xi_seed)?;
    let y = compute_y(alpha, &proof.commits.w);

    let denominators = Denominators::collect(f, &roots, y, &opening_values)?;
    let Some(inverses) = denominators.invert(proof.inv) else {
        warn!("batched inverse does not match the denominators");
        return Ok(false);
    };

    let r = f
        .iter()
        .zip(&roots)
        .map(|(fi, ri)| {
            let evals = fi_evals(fi, &proof.evaluations)?;
            evaluate_ri(fi, &evals, ri, y, &opening_values, inverses.lagrange(&fi.signature())?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("computing quotients");
    let q0 = roots[0].vanishing_at(y);
    let quotients = quotients(f, q0, alpha, &inverses)?;

    let big_f = commits
        .values()
        .zip(&quotients)
        .fold(G1Projective::zero(), |acc, (c, q)| acc + c.0 * *q);
    let e: F = r.iter().zip(&quotients).map(|(ri, q)| *ri * q).sum();
    let big_e = G1Affine::generator() * e;
    let big_j = proof.commits.w.0 * q0;
    let lhs = big_f - big_e - big_j + proof.commits.wp.0 * y;

    let ok = pairing_check(lhs.into_affine(), proof.commits.wp.0, vk.x2);
    if ok {
        info!("openings verified");
    } else {
        warn!("invalid openings");
    }
    Ok(ok)
}
