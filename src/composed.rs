//! Composed polynomials `f_i`: several named polynomials interleaved into one.
//!
//! Coefficient `i` of the member in slot `k` (out of `n` slots) lands at index
//! `i*n + k`. One commitment to the interleaved polynomial therefore binds all
//! members, and evaluating it on the `n` roots of `X^n = z` recovers every
//! member's value at `z`.
//!
//! ## Invariants
//! - `degree == max_k (deg_k * n + k)` over the members.
//! - All members share the same `opening_points`.
//! - `stages` is ordered by stage and lists every member exactly once.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::{poly::Polynomial, F};

use ark_ff::Zero;

/// Member reference inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolRef {
    pub name: String,
    pub degree: usize,
}

/// Members of an `f_i` that become available at one protocol stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePols {
    pub stage: u32,
    pub pols: Vec<PolRef>,
}

/// Roots of an `f_i` depend only on its width and opening points, so the
/// pair identifies every value derived from the roots.
pub type Signature = (usize, Vec<usize>);

/// Definition of one composed polynomial, fixed at setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedPolynomial {
    pub index: usize,
    /// Member names in slot order.
    pub pols: Vec<String>,
    /// Indices into the global opening-point list.
    pub opening_points: Vec<usize>,
    pub degree: usize,
    pub stages: Vec<StagePols>,
}

impl ComposedPolynomial {
    /// Number of interleaved slots (`n`).
    pub fn width(&self) -> usize {
        self.pols.len()
    }

    /// Size of the full root set: `n` roots per opening point.
    pub fn n_roots(&self) -> usize {
        self.width() * self.opening_points.len()
    }

    /// Slot of a member, if present.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.pols.iter().position(|p| p == name)
    }

    pub fn stage(&self, stage: u32) -> Option<&StagePols> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Only stage-0 members: the commitment is fixed by the setup and does
    /// not travel in the proof.
    pub fn is_preprocessed(&self) -> bool {
        self.stages.len() == 1 && self.stages[0].stage == 0
    }

    pub fn signature(&self) -> Signature {
        (self.width(), self.opening_points.clone())
    }
}

/// Degree of the interleaving of polynomials with the given degrees, in slot
/// order: `max_j (deg_j * n + j)`.
pub fn composed_degree(degrees: &[usize]) -> usize {
    let n = degrees.len();
    degrees
        .iter()
        .enumerate()
        .map(|(j, d)| d * n + j)
        .max()
        .unwrap_or(0)
}

/// Accumulates members slot by slot.
///
/// Slots may be filled in any order and across several builders; since the
/// interleave is linear, summing two builds with disjoint slots equals one
/// build holding both.
#[derive(Debug, Clone)]
pub struct ComposedBuilder {
    width: usize,
    coeffs: Vec<F>,
}

impl ComposedBuilder {
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "composed polynomial needs at least one slot");
        Self { width, coeffs: Vec::new() }
    }

    /// Place `pol` into `slot`. Adds onto whatever the slot already holds.
    pub fn add_polynomial(&mut self, slot: usize, pol: &Polynomial) -> &mut Self {
        assert!(slot < self.width, "slot {} out of range for width {}", slot, self.width);
        if pol.is_zero() {
            return self;
        }
        let needed = (pol.len() - 1) * self.width + slot + 1;
        if self.coeffs.len() < needed {
            self.coeffs.resize(needed, F::zero());
        }
        for (i, c) in pol.iter().enumerate() {
            self.coeffs[i * self.width + slot] += c;
        }
        self
    }

    pub fn build(self) -> Polynomial {
        Polynomial::from_coeffs(self.coeffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn random_poly(rng: &mut StdRng, degree: usize) -> Polynomial {
        Polynomial::from_coeffs((0..=degree).map(|_| F::rand(rng)).collect())
    }

    #[test]
    fn interleave_positions() {
        let a = Polynomial::from_coeffs(vec![F::from(1u64), F::from(2u64)]);
        let b = Polynomial::from_coeffs(vec![F::from(3u64), F::from(4u64), F::from(5u64)]);
        let mut builder = ComposedBuilder::new(3);
        builder.add_polynomial(0, &a).add_polynomial(2, &b);
        let f = builder.build();

        let expect: Vec<F> = [1u64, 0, 3, 2, 0, 4, 0, 0, 5].iter().map(|v| F::from(*v)).collect();
        assert_eq!(f.coeffs(), &expect[..]);
        assert_eq!(f.degree(), composed_degree(&[1, 0, 2]));
    }

    #[test]
    fn composed_degree_respects_slot_offset() {
        assert_eq!(composed_degree(&[7, 7, 7]), 7 * 3 + 2);
        assert_eq!(composed_degree(&[9, 3]), 18);
        assert_eq!(composed_degree(&[4]), 4);
    }

    #[test]
    fn built_degree_within_declared_bound() {
        let mut rng = StdRng::seed_from_u64(11);
        let degrees = [12usize, 9, 9, 3];
        let mut builder = ComposedBuilder::new(degrees.len());
        for (slot, d) in degrees.iter().enumerate() {
            builder.add_polynomial(slot, &random_poly(&mut rng, *d));
        }
        assert!(builder.build().degree() <= composed_degree(&degrees));
    }

    #[test]
    fn partial_builds_sum_to_full_build() {
        let mut rng = StdRng::seed_from_u64(12);
        let p: Vec<Polynomial> = (0..4).map(|_| random_poly(&mut rng, 6)).collect();

        let mut full = ComposedBuilder::new(4);
        let mut first = ComposedBuilder::new(4);
        let mut second = ComposedBuilder::new(4);
        for (slot, pol) in p.iter().enumerate() {
            full.add_polynomial(slot, pol);
            if slot % 2 == 0 {
                first.add_polynomial(slot, pol);
            } else {
                second.add_polynomial(slot, pol);
            }
        }
        let mut sum = first.build();
        sum += &second.build();
        assert_eq!(sum, full.build());
    }

    #[test]
    fn evaluation_on_coset_recovers_members() {
        // f(s) = Σ_j p_j(s^n) s^j for every s.
        let mut rng = StdRng::seed_from_u64(13);
        let p: Vec<Polynomial> = (0..3).map(|_| random_poly(&mut rng, 5)).collect();
        let mut builder = ComposedBuilder::new(3);
        for (slot, pol) in p.iter().enumerate() {
            builder.add_polynomial(slot, pol);
        }
        let f = builder.build();
        let s = F::rand(&mut rng);
        let z = s * s * s;
        let expect = p[0].evaluate(z) + p[1].evaluate(z) * s + p[2].evaluate(z) * s * s;
        assert_eq!(f.evaluate(s), expect);
    }
}
