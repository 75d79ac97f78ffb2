//! Batched modular inverse (Montgomery's trick).
//!
//! The verifier has to invert a handful of field elements: `Z_i(y)` for every
//! `i ≥ 1` and the Lagrange denominators of every `r_i(y)`. The prover
//! multiplies them all, inverts the product once and ships that single value
//! as `inv`. The verifier rebuilds the same list, checks `Π · inv == 1` and
//! recovers each individual inverse from prefix products.
//!
//! Both quantities depend only on an `f_i`'s [`Signature`], so each signature
//! contributes once, in this order:
//!
//! 1. `Z_i(y)` for `i = 1..m`, deduplicated by signature;
//! 2. Lagrange denominators for `i = 0..m`, deduplicated by signature:
//!    - one opening point, `n > 1`: `n·S_0^(n-2)·S_{(n-1)l mod n}·(y - S_l)`,
//!      which equals `n·S_l^(n-1)·(y - S_l)` since the roots are geometric;
//!    - one opening point, `n = 1`: nothing;
//!    - two opening points, `n = 1`: `s_0 - s_1`, `s_1 - s_0`;
//!    - two opening points, `n > 1`: per set `a` (other set `b`) and root `l`,
//!      `n·S_0^(n-2)·(xi_a - xi_b)·S_{(n-1)l mod n}·(y - S_l)`;
//!    - three or more: `∏_{b≠a} (s_a - s_b)` for every root `s_a`.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::ops::Range;

use ark_ff::{Field, One, Zero};

use crate::{
    composed::{ComposedPolynomial, Signature},
    error::ProtocolError,
    roots::FiRoots,
    F,
};

/// Ordered denominator list plus where each signature's entries live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denominators {
    terms: Vec<F>,
    zerofiers: BTreeMap<Signature, usize>,
    lagrange: BTreeMap<Signature, Range<usize>>,
}

/// `n·S_l^(n-1)` through the geometric-sequence shortcut.
fn geometric_scale(set: &[F], l: usize) -> F {
    let n = set.len();
    F::from(n as u64) * set[0].pow([(n - 2) as u64]) * set[((n - 1) * l) % n]
}

fn push_lagrange(terms: &mut Vec<F>, roots: &FiRoots, y: F, opening_values: &[F], points: &[usize]) {
    match roots.sets.as_slice() {
        [set] => {
            if set.len() > 1 {
                for (l, s) in set.iter().enumerate() {
                    terms.push(geometric_scale(set, l) * (y - s));
                }
            }
        }
        [s0, s1] if s0.len() == 1 => {
            terms.push(s0[0] - s1[0]);
            terms.push(s1[0] - s0[0]);
        }
        [s0, s1] => {
            let xi = [opening_values[points[0]], opening_values[points[1]]];
            for (a, set) in [s0, s1].into_iter().enumerate() {
                let diff = xi[a] - xi[1 - a];
                for (l, s) in set.iter().enumerate() {
                    terms.push(geometric_scale(set, l) * diff * (y - s));
                }
            }
        }
        _ => {
            let flat = roots.flat();
            for (a, sa) in flat.iter().enumerate() {
                let den = flat
                    .iter()
                    .enumerate()
                    .filter(|(b, _)| *b != a)
                    .fold(F::one(), |acc, (_, sb)| acc * (*sa - sb));
                terms.push(den);
            }
        }
    }
}

impl Denominators {
    /// Build the list for challenge `y`. `roots[i]` belongs to `f[i]` and
    /// `opening_values[j]` is the opening value of point `j`.
    pub fn collect(
        f: &[ComposedPolynomial],
        roots: &[FiRoots],
        y: F,
        opening_values: &[F],
    ) -> Result<Self, ProtocolError> {
        if let Some(j) = f.iter().flat_map(|fi| fi.opening_points.iter()).find(|j| **j >= opening_values.len()) {
            return Err(ProtocolError::MissingRoot { width: 1, point: *j });
        }

        let mut terms = Vec::new();
        let mut zerofiers = BTreeMap::new();
        for (fi, r) in f.iter().zip(roots).skip(1) {
            zerofiers.entry(fi.signature()).or_insert_with(|| {
                terms.push(r.vanishing_at(y));
                terms.len() - 1
            });
        }

        let mut lagrange = BTreeMap::new();
        for (fi, r) in f.iter().zip(roots) {
            let sig = fi.signature();
            if lagrange.contains_key(&sig) {
                continue;
            }
            let start = terms.len();
            push_lagrange(&mut terms, r, y, opening_values, &fi.opening_points);
            lagrange.insert(sig, start..terms.len());
        }

        Ok(Self { terms, zerofiers, lagrange })
    }

    pub fn terms(&self) -> &[F] {
        &self.terms
    }

    pub fn product(&self) -> F {
        self.terms.iter().product()
    }

    /// Inverse of the product; the value shipped as `inv`.
    pub fn batched_inverse(&self) -> Result<F, ProtocolError> {
        self.product()
            .inverse()
            .ok_or_else(|| ProtocolError::ZeroDenominator("batched inverse".into()))
    }

    /// Individual inverses from the shipped `inv`, or `None` when
    /// `Π · inv != 1`.
    pub fn invert(&self, inv: F) -> Option<Inverses<'_>> {
        let values = recover_inverses(&self.terms, inv)?;
        Some(Inverses { layout: self, values })
    }
}

/// Inverted denominators addressed by signature.
#[derive(Debug, Clone)]
pub struct Inverses<'a> {
    layout: &'a Denominators,
    values: Vec<F>,
}

impl Inverses<'_> {
    /// `1 / Z(y)` for a signature of some `f_i` with `i ≥ 1`.
    pub fn zerofier(&self, sig: &Signature) -> Result<F, ProtocolError> {
        self.layout
            .zerofiers
            .get(sig)
            .map(|k| self.values[*k])
            .ok_or_else(|| ProtocolError::ZeroDenominator(format!("Z(y) of width {} at {:?}", sig.0, sig.1)))
    }

    /// Inverted Lagrange denominators of a signature, in collection order.
    pub fn lagrange(&self, sig: &Signature) -> Result<&[F], ProtocolError> {
        self.layout
            .lagrange
            .get(sig)
            .map(|r| &self.values[r.clone()])
            .ok_or_else(|| ProtocolError::ZeroDenominator(format!("Lagrange basis of width {} at {:?}", sig.0, sig.1)))
    }
}

/// Montgomery's trick: individual inverses of `terms` given
/// `inv = 1 / ∏ terms`. `None` if `inv` is not that inverse.
pub fn recover_inverses(terms: &[F], inv: F) -> Option<Vec<F>> {
    // prefix[k] = terms[0] · ... · terms[k-1]
    let mut prefix = Vec::with_capacity(terms.len() + 1);
    let mut acc = F::one();
    for t in terms {
        prefix.push(acc);
        acc *= t;
    }
    if (acc * inv) != F::one() || inv.is_zero() {
        return None;
    }

    let mut out = vec![F::zero(); terms.len()];
    let mut acc = inv;
    for k in (0..terms.len()).rev() {
        out[k] = acc * prefix[k];
        acc *= terms[k];
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composed::StagePols;
    use crate::roots::{calculate_roots, RootsOfUnityTable};
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn fi(index: usize, width: usize, opening_points: Vec<usize>) -> ComposedPolynomial {
        ComposedPolynomial {
            index,
            pols: (0..width).map(|k| format!("P{}_{}", index, k)).collect(),
            opening_points,
            degree: 0,
            stages: vec![StagePols { stage: 1, pols: vec![] }],
        }
    }

    fn fixture(f: &[ComposedPolynomial], seed: u64) -> (Vec<FiRoots>, F, Vec<F>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let table = RootsOfUnityTable::build(4, f).unwrap();
        let xi_seed = F::rand(&mut rng);
        let roots = calculate_roots(f, &table, xi_seed).unwrap();
        let n_points = f.iter().flat_map(|fi| fi.opening_points.iter()).max().unwrap() + 1;
        let opening = table.opening_values(xi_seed.pow([table.power_w() as u64]), n_points);
        (roots, F::rand(&mut rng), opening)
    }

    #[test]
    fn recovered_inverses_match_direct_inversion() {
        let f = vec![
            fi(0, 4, vec![0]),
            fi(1, 3, vec![0, 1]),
            fi(2, 1, vec![0, 1]),
            fi(3, 2, vec![0, 1, 2]),
            fi(4, 3, vec![0, 1]),
            fi(5, 1, vec![0]),
        ];
        let (roots, y, opening) = fixture(&f, 41);
        let den = Denominators::collect(&f, &roots, y, &opening).unwrap();

        // Z(y): four distinct signatures among i >= 1 (f4 repeats f1).
        // Lagrange: 4 + 6 + 2 + 6, f4 deduplicated, f5 has none.
        assert_eq!(den.terms().len(), 4 + 4 + 6 + 2 + 6);

        let inv = den.batched_inverse().unwrap();
        let inverses = den.invert(inv).unwrap();
        for (t, i) in den.terms().iter().zip(&inverses.values) {
            assert_eq!(*i, t.inverse().unwrap());
        }
        assert_eq!(inverses.zerofier(&f[4].signature()).unwrap(), roots[1].vanishing_at(y).inverse().unwrap());
        assert!(inverses.zerofier(&f[0].signature()).is_err());
        assert_eq!(inverses.lagrange(&f[5].signature()).unwrap().len(), 0);
    }

    #[test]
    fn geometric_denominator_equals_derivative_form() {
        let f = vec![fi(0, 4, vec![0]), fi(1, 3, vec![0, 1])];
        let (roots, y, opening) = fixture(&f, 42);
        let den = Denominators::collect(&f, &roots, y, &opening).unwrap();
        let lag = den.lagrange[&f[0].signature()].clone();
        for (l, s) in roots[0].sets[0].iter().enumerate() {
            let expected = F::from(4u64) * s.pow([3]) * (y - s);
            assert_eq!(den.terms()[lag.start + l], expected);
        }
    }

    #[test]
    fn wrong_inverse_is_rejected() {
        let terms = vec![F::from(3u64), F::from(5u64), F::from(7u64)];
        let inv = F::from(105u64).inverse().unwrap();
        assert!(recover_inverses(&terms, inv).is_some());
        assert!(recover_inverses(&terms, inv + F::one()).is_none());
        assert!(recover_inverses(&terms, F::zero()).is_none());
        assert_eq!(recover_inverses(&[], F::one()), Some(vec![]));
    }

    #[test]
    fn zero_product_is_an_error() {
        let f = vec![fi(0, 2, vec![0]), fi(1, 2, vec![0])];
        let (roots, _, opening) = fixture(&f, 43);
        // y on a root makes Z_1(y) vanish.
        let y = roots[1].sets[0][0];
        let den = Denominators::collect(&f, &roots, y, &opening).unwrap();
        assert!(matches!(den.batched_inverse(), Err(ProtocolError::ZeroDenominator(_))));
    }
}
