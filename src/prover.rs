//! Opening prover.
//!
//! Given the aggregated `f_i` and their member polynomials, `open` produces
//! `[W]₁`, `[W']₁`, every member evaluation and the batched inverse:
//!
//! ```text
//! xiSeed ─► roots S_i, opening values, evaluations
//!        ─► alpha ─► r_i = interpolation of f_i over S_i
//!                 ─► W  = Σ alpha^i (f_i - r_i) / Z_i
//!                 ─► y  ─► L  = Σ alpha^i ∏_{j≠i} Z_j(y) (f_i - r_i(y)) - Z_T(y) W
//!                       ─► W' = L / (Z_{T\0}(y) (X - y))
//! ```
//!
//! Every intermediate polynomial is checked against its degree bound and
//! the division by `X - y` must be exact.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use ark_ff::{Field, One, Zero};
use rayon::prelude::*;
use tracing::info;

use crate::{
    commit::CommittedPolynomials,
    composed::ComposedPolynomial,
    error::{ensure_degree, ProtocolError},
    evals::{calculate_evaluations, committed_evals, ordered_evals, Evaluations, PolynomialMap},
    inverse::Denominators,
    pcs::Commitment,
    poly::Polynomial,
    roots::{calculate_roots, FiRoots},
    setup::ProvingKey,
    transcript::{compute_alpha, compute_xi_seed, compute_y, OpenOptions},
    F,
};

/// Commitments carried by a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofCommitments {
    /// Aggregated `f_i` commitments by index, preprocessed ones included.
    pub f: BTreeMap<usize, Commitment>,
    pub w: Commitment,
    pub wp: Commitment,
}

/// Output of [`open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningProof {
    pub commits: ProofCommitments,
    /// Member evaluations keyed by [`crate::evals::eval_name`].
    pub evaluations: Evaluations,
    /// Batched inverse of every denominator the verifier needs.
    pub inv: F,
    pub xi_seed: F,
}

fn polynomial_of(pols: &BTreeMap<usize, Polynomial>, index: usize) -> Result<&Polynomial, ProtocolError> {
    pols.get(&index).ok_or_else(|| ProtocolError::MissingPolynomial(format!("f{}", index)))
}

/// `r_i`: the interpolation of `f_i` over its full root set.
pub(crate) fn compute_ri(fi: &Polynomial, roots: &FiRoots) -> Result<Polynomial, ProtocolError> {
    let points = roots.flat();
    let values: Vec<F> = points.iter().map(|s| fi.evaluate(*s)).collect();
    let ri = Polynomial::lagrange_interpolation(&points, &values)?;
    ensure_degree("r", ri.degree(), points.len() - 1)?;
    Ok(ri)
}

/// `W = Σ alpha^i (f_i - r_i) / Z_i`, dividing coset by coset.
pub(crate) fn compute_w(
    f: &[ComposedPolynomial],
    fpols: &[&Polynomial],
    r: &[Polynomial],
    alpha: F,
    opening_values: &[F],
) -> Result<Polynomial, ProtocolError> {
    info!("computing W");
    let mut w = Polynomial::zero();
    let mut challenge = F::one();
    for ((fi, pol), ri) in f.iter().zip(fpols).zip(r) {
        let mut q = (*pol).clone();
        q -= ri;
        for &j in &fi.opening_points {
            q = q.div_by_zerofier(fi.width(), opening_values[j])?;
        }
        q *= challenge;
        w += &q;
        challenge *= alpha;
    }

    let bound = f.iter().map(|fi| fi.degree.saturating_sub(fi.n_roots())).max().unwrap_or(0);
    ensure_degree("W", w.degree(), bound)?;
    Ok(w)
}

/// `W' = L / (Z_{T\0}(y) (X - y))`.
pub(crate) fn compute_wp(
    f: &[ComposedPolynomial],
    fpols: &[&Polynomial],
    r: &[Polynomial],
    roots: &[FiRoots],
    w: &Polynomial,
    alpha: F,
    y: F,
) -> Result<Polynomial, ProtocolError> {
    info!("computing W'");
    let zy: Vec<F> = roots.iter().map(|s| s.vanishing_at(y)).collect();
    let zt_y: F = zy.iter().product();

    let mut l = Polynomial::zero();
    let mut challenge = F::one();
    for (i, (pol, ri)) in fpols.iter().zip(r).enumerate() {
        let scale = zy
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .fold(challenge, |acc, (_, z)| acc * z);
        let mut li = (*pol).clone();
        li.sub_scalar(ri.evaluate(y));
        li *= scale;
        l += &li;
        challenge *= alpha;
    }
    let mut zw = w.clone();
    zw *= zt_y;
    l -= &zw;

    let max_degree = f.iter().map(|fi| fi.degree).max().unwrap_or(0);
    ensure_degree("L", l.degree(), max_degree)?;

    let z_rest: F = zy.iter().skip(1).product();
    let z_rest_inv = z_rest
        .inverse()
        .ok_or_else(|| ProtocolError::ZeroDenominator("Z_{T\\0}(y)".into()))?;
    l *= z_rest_inv;

    let (wp, rem) = l.div_by_linear(y);
    if !rem.is_zero() {
        return Err(ProtocolError::NonZeroRemainder("L / (X - y)".into()));
    }
    ensure_degree("W'", wp.degree(), max_degree.saturating_sub(1))?;
    Ok(wp)
}

/// Open every member polynomial at its opening points.
///
/// `polynomials` holds the member polynomials by name and `committed` the
/// stage pieces returned by [`crate::commit::commit`] for every stage.
pub fn open(
    pk: &ProvingKey,
    polynomials: &PolynomialMap,
    committed: &CommittedPolynomials,
    options: &OpenOptions,
) -> Result<OpeningProof, ProtocolError> {
    let vk = &pk.vk;
    let f = pk.f();
    info!(n_f = f.len(), "opening polynomials");

    let fpol_map = committed.aggregate_polynomials(f)?;
    let fcommits = committed.aggregate_commitments(f)?;
    let fpols = f
        .iter()
        .map(|fi| polynomial_of(&fpol_map, fi.index))
        .collect::<Result<Vec<_>, _>>()?;
    for (fi, pol) in f.iter().zip(&fpols) {
        ensure_degree(&format!("f{}", fi.index), pol.degree(), fi.degree)?;
    }

    let xi_seed = compute_xi_seed(f, &fcommits, &options.xi_seed)?;
    let challenge_xi = xi_seed.pow([vk.roots.power_w() as u64]);
    let opening_values = vk.roots.opening_values(challenge_xi, vk.n_opening_points);
    let roots = calculate_roots(f, &vk.roots, xi_seed)?;

    info!("computing evaluations");
    let evaluations = calculate_evaluations(f, polynomials, &opening_values)?;
    let ordered = ordered_evals(f, &evaluations)?;
    let alpha = compute_alpha(xi_seed, committed_evals(&ordered, &options.non_committed));

    info!("computing r polynomials");
    let r = fpols
        .par_iter()
        .zip(&roots)
        .map(|(pol, ri)| compute_ri(pol, ri))
        .collect::<Result<Vec<_>, _>>()?;

    let w = compute_w(f, &fpols, &r, alpha, &opening_values)?;
    let w_commit = pk.srs().commit(&w)?;
    let y = compute_y(alpha, &w_commit);

    let wp = compute_wp(f, &fpols, &r, &roots, &w, alpha, y)?;
    let wp_commit = pk.srs().commit(&wp)?;

    info!("computing batched inverse");
    let inv = Denominators::collect(f, &roots, y, &opening_values)?.batched_inverse()?;

    Ok(OpeningProof {
        commits: ProofCommitments { f: fcommits, w: w_commit, wp: wp_commit },
        evaluations,
        inv,
        xi_seed,
    })
}
