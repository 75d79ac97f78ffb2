//! Roots of unity and the evaluation roots of every composed polynomial.
//!
//! All roots are powers of the fixed multiplicative generator `g = F::GENERATOR`:
//!
//! - `w_k = g^((p-1)/k)` is a primitive `k`-th root of unity, defined when
//!   `k | p-1`.
//! - `ω = g^((p-1)/2^power)` shifts opening point `j` to `xi·ω^j`.
//! - `w_{k,j} = (g^((p-1)/(2^power·k)))^j` is a `k`-th root of `ω^j`; it moves
//!   the roots of opening point `0` onto those of opening point `j`.
//!
//! For an `f_i` of width `k` and seed `xiSeed`, the roots at opening point `j`
//! are `S_l = w_{k,j} · xiSeed^(powerW/k) · w_k^l`, `l = 0..k`, and
//! `S_l^k = xiSeed^powerW · ω^j`, the opening value of point `j`.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use ark_ff::{FftField, Field, One, PrimeField};

use crate::{
    composed::ComposedPolynomial,
    error::{ConfigError, ProtocolError},
    F,
};

/// `p - 1` as little-endian limbs.
fn group_order() -> [u64; 4] {
    let mut m = F::MODULUS.0;
    // MODULUS is odd, no borrow.
    m[0] -= 1;
    m
}

/// `(p-1)/k` when `k` divides `p-1`.
fn exact_cofactor(k: u64) -> Option<[u64; 4]> {
    if k == 0 {
        return None;
    }
    let limbs = group_order();
    let mut quot = [0u64; 4];
    let mut rem: u128 = 0;
    for i in (0..4).rev() {
        let cur = (rem << 64) | limbs[i] as u128;
        quot[i] = (cur / k as u128) as u64;
        rem = cur % k as u128;
    }
    (rem == 0).then_some(quot)
}

/// Whether `k` divides the order of the multiplicative group.
pub fn divides_group_order(k: usize) -> bool {
    exact_cofactor(k as u64).is_some()
}

/// Primitive `k`-th root of unity.
pub fn compute_wi(k: usize) -> Result<F, ConfigError> {
    let e = exact_cofactor(k as u64).ok_or(ConfigError::NotDivisor(k as u64))?;
    Ok(F::GENERATOR.pow(e))
}

/// `(g^((p-1)/(2^power·k)))^j`.
pub fn compute_root_wi(k: usize, j: usize, power: u32) -> Result<F, ConfigError> {
    let order = (k as u64)
        .checked_shl(power)
        .filter(|o| o >> power == k as u64)
        .ok_or(ConfigError::NotDivisor(u64::MAX))?;
    let e = exact_cofactor(order).ok_or(ConfigError::NotDivisor(order))?;
    Ok(F::GENERATOR.pow(e).pow([j as u64]))
}

pub fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

pub fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Every root of unity the protocol needs for a fixed set of composed
/// polynomials, keyed by width `k` and opening-point index `j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootsOfUnityTable {
    power: u32,
    omega: F,
    power_w: usize,
    w: BTreeMap<usize, F>,
    shifts: BTreeMap<(usize, usize), F>,
}

impl RootsOfUnityTable {
    /// Compute `w_k` for every width and `w_{k,j}` for every non-zero opening
    /// point used with that width.
    pub fn build(power: u32, f: &[ComposedPolynomial]) -> Result<Self, ConfigError> {
        let mut usage: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for fi in f {
            let points = usage.entry(fi.width()).or_default();
            for &j in &fi.opening_points {
                if !points.contains(&j) {
                    points.push(j);
                }
            }
        }

        let power_w = usage.keys().fold(1, |acc, k| lcm(acc, *k));
        let omega = compute_root_wi(1, 1, power)?;

        let mut w = BTreeMap::new();
        let mut shifts = BTreeMap::new();
        for (&k, points) in &usage {
            w.insert(k, compute_wi(k)?);
            for &j in points.iter().filter(|j| **j != 0) {
                shifts.insert((k, j), compute_root_wi(k, j, power)?);
            }
        }

        Ok(Self { power, omega, power_w, w, shifts })
    }

    pub fn power(&self) -> u32 {
        self.power
    }

    /// Order-`2^power` shift between consecutive opening points.
    pub fn omega(&self) -> F {
        self.omega
    }

    /// `lcm` of every composed width.
    pub fn power_w(&self) -> usize {
        self.power_w
    }

    pub fn w(&self, k: usize) -> Result<F, ProtocolError> {
        self.w.get(&k).copied().ok_or(ProtocolError::MissingRoot { width: k, point: 0 })
    }

    /// Coset shift `w_{k,j}`; `1` for opening point 0.
    pub fn shift(&self, k: usize, j: usize) -> Result<F, ProtocolError> {
        if j == 0 {
            return Ok(F::one());
        }
        self.shifts.get(&(k, j)).copied().ok_or(ProtocolError::MissingRoot { width: k, point: j })
    }

    /// `[xi, xi·ω, xi·ω^2, ...]`, one value per opening point.
    pub fn opening_values(&self, challenge_xi: F, n_points: usize) -> Vec<F> {
        let mut out = Vec::with_capacity(n_points);
        let mut cur = challenge_xi;
        for _ in 0..n_points {
            out.push(cur);
            cur *= self.omega;
        }
        out
    }
}

/// Evaluation roots of one `f_i`: one coset of size `width` per opening point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiRoots {
    pub sets: Vec<Vec<F>>,
}

impl FiRoots {
    /// All roots, opening point by opening point.
    pub fn flat(&self) -> Vec<F> {
        self.sets.iter().flatten().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Z_i(y) = ∏ (y - s)` over all roots.
    pub fn vanishing_at(&self, y: F) -> F {
        self.sets.iter().flatten().fold(F::one(), |acc, s| acc * (y - s))
    }
}

/// Roots of every `f_i` for the given seed, in the order of `f`.
pub fn calculate_roots(
    f: &[ComposedPolynomial],
    table: &RootsOfUnityTable,
    xi_seed: F,
) -> Result<Vec<FiRoots>, ProtocolError> {
    f.iter()
        .map(|fi| {
            let k = fi.width();
            let wk = table.w(k)?;
            let base = xi_seed.pow([(table.power_w() / k) as u64]);
            let sets = fi
                .opening_points
                .iter()
                .map(|&j| {
                    let mut cur = table.shift(k, j)? * base;
                    let mut set = Vec::with_capacity(k);
                    for _ in 0..k {
                        set.push(cur);
                        cur *= wk;
                    }
                    Ok(set)
                })
                .collect::<Result<Vec<_>, ProtocolError>>()?;
            Ok(FiRoots { sets })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composed::StagePols;
    use ark_ff::{UniformRand, Zero};
    use rand::{rngs::StdRng, SeedableRng};

    fn fi(index: usize, width: usize, opening_points: Vec<usize>) -> ComposedPolynomial {
        ComposedPolynomial {
            index,
            pols: (0..width).map(|i| format!("P{}_{}", index, i)).collect(),
            opening_points,
            degree: 0,
            stages: vec![StagePols { stage: 1, pols: vec![] }],
        }
    }

    fn prime_factors(mut n: usize) -> Vec<usize> {
        let mut out = vec![];
        let mut p = 2;
        while p * p <= n {
            if n % p == 0 {
                out.push(p);
                while n % p == 0 {
                    n /= p;
                }
            }
            p += 1;
        }
        if n > 1 {
            out.push(n);
        }
        out
    }

    #[test]
    fn wi_is_primitive() {
        for k in [1usize, 2, 3, 4, 6, 8, 9, 12, 13, 16, 18, 26, 29] {
            let w = compute_wi(k).unwrap();
            assert_eq!(w.pow([k as u64]), F::one(), "k={}", k);
            for p in prime_factors(k) {
                assert_ne!(w.pow([(k / p) as u64]), F::one(), "k={} p={}", k, p);
            }
        }
    }

    #[test]
    fn rejects_non_divisors() {
        for k in [5usize, 7, 10, 11, 15] {
            assert!(!divides_group_order(k));
            assert!(matches!(compute_wi(k), Err(ConfigError::NotDivisor(_))));
        }
        // 2^28 · 2 no longer divides p-1.
        assert!(compute_root_wi(2, 1, 28).is_err());
    }

    #[test]
    fn root_shift_is_kth_root_of_omega_power() {
        let power = 5;
        let omega = compute_root_wi(1, 1, power).unwrap();
        assert_eq!(omega.pow([1u64 << power]), F::one());
        assert_ne!(omega.pow([1u64 << (power - 1)]), F::one());
        for k in [1usize, 2, 3, 4, 9] {
            for j in 1..4usize {
                let s = compute_root_wi(k, j, power).unwrap();
                assert_eq!(s.pow([k as u64]), omega.pow([j as u64]));
            }
        }
    }

    #[test]
    fn lcm_and_gcd() {
        assert_eq!(lcm(4, 6), 12);
        assert_eq!(lcm(1, 9), 9);
        assert_eq!(gcd(12, 18), 6);
        assert_eq!([2usize, 3, 4].iter().fold(1, |a, b| lcm(a, *b)), 12);
    }

    #[test]
    fn roots_raise_to_opening_values() {
        let mut rng = StdRng::seed_from_u64(21);
        let f = vec![fi(0, 4, vec![0]), fi(1, 3, vec![0, 1]), fi(2, 1, vec![0, 1, 2])];
        let table = RootsOfUnityTable::build(4, &f).unwrap();
        assert_eq!(table.power_w(), 12);

        let xi_seed = F::rand(&mut rng);
        let xi = xi_seed.pow([table.power_w() as u64]);
        let opening = table.opening_values(xi, 3);
        let roots = calculate_roots(&f, &table, xi_seed).unwrap();

        for (fi, r) in f.iter().zip(&roots) {
            assert_eq!(r.len(), fi.n_roots());
            for (set, &j) in r.sets.iter().zip(&fi.opening_points) {
                assert_eq!(set.len(), fi.width());
                for s in set {
                    assert_eq!(s.pow([fi.width() as u64]), opening[j]);
                }
            }
            let flat = r.flat();
            for (a, x) in flat.iter().enumerate() {
                for y in &flat[a + 1..] {
                    assert_ne!(x, y);
                }
            }
            assert!(r.vanishing_at(flat[0]).is_zero());
        }
    }

    #[test]
    fn missing_table_entries_are_reported() {
        let f = vec![fi(0, 2, vec![0])];
        let table = RootsOfUnityTable::build(3, &f).unwrap();
        assert!(table.shift(2, 0).is_ok());
        assert!(matches!(table.shift(2, 1), Err(ProtocolError::MissingRoot { width: 2, point: 1 })));
        assert!(matches!(table.w(3), Err(ProtocolError::MissingRoot { .. })));
    }
}
