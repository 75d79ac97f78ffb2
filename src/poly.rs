//! Dense univariate polynomials over the scalar field.
//!
//! Coefficients are stored low→high in a `Vec<F>` with trailing zeros
//! trimmed, so `coeffs.len() == degree + 1` for every non-zero polynomial and
//! the zero polynomial is the empty vector.
//!
//! ## Degree convention
//!
//! [`Polynomial::degree`] returns the index of the highest non-zero
//! coefficient and `0` for the zero polynomial. The zero polynomial therefore
//! satisfies every `degree <= bound` check, which is exactly what the opening
//! protocol needs (a vanishing contribution never tightens a bound). Use
//! [`Polynomial::is_zero`] when the distinction matters.

#![allow(missing_docs)]

use core::ops::{AddAssign, Deref, MulAssign, SubAssign};

use ark_ff::{batch_inversion, Field, One, Zero};

use crate::{error::ProtocolError, F};

/// Polynomial in coefficient form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polynomial {
    coeffs: Vec<F>,
}

impl Deref for Polynomial {
    type Target = [F];

    fn deref(&self) -> &[F] {
        &self.coeffs
    }
}

impl Polynomial {
    /// The zero polynomial.
    pub const fn zero() -> Self {
        Self { coeffs: Vec::new() }
    }

    /// Build from low→high coefficients. Trailing zeros are dropped.
    pub fn from_coeffs(coeffs: Vec<F>) -> Self {
        let mut p = Self { coeffs };
        p.truncate_leading_zeros();
        p
    }

    /// The monic linear polynomial `X - root`.
    pub fn linear(root: F) -> Self {
        Self::from_coeffs(vec![-root, F::one()])
    }

    /// Coefficients, low→high, without trailing zeros.
    pub fn coeffs(&self) -> &[F] {
        &self.coeffs
    }

    /// Coefficient of `X^i` (zero past the end).
    pub fn coeff(&self, i: usize) -> F {
        self.coeffs.get(i).copied().unwrap_or_else(F::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Highest index with a non-zero coefficient; `0` for the zero polynomial.
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    fn truncate_leading_zeros(&mut self) {
        while self.coeffs.last().map_or(false, |c| c.is_zero()) {
            self.coeffs.pop();
        }
    }

    /// Horner evaluation.
    pub fn evaluate(&self, x: F) -> F {
        self.coeffs.iter().rev().fold(F::zero(), |acc, c| acc * x + c)
    }

    /// Subtract a constant.
    pub fn sub_scalar(&mut self, s: F) {
        if self.coeffs.is_empty() {
            self.coeffs.push(-s);
        } else {
            self.coeffs[0] -= s;
        }
        self.truncate_leading_zeros();
    }

    /// Exact division by the binomial `X^n - beta`.
    ///
    /// When `beta = c^n`, `X^n - beta` vanishes on the whole coset
    /// `{c·w^l}` of the order-`n` subgroup. A non-zero remainder means the
    /// dividend does not vanish on that coset and is reported as
    /// [`ProtocolError::NonZeroRemainder`].
    pub fn div_by_zerofier(&self, n: usize, beta: F) -> Result<Polynomial, ProtocolError> {
        if n == 0 {
            return Err(ProtocolError::ZeroDenominator("X^0 - beta".into()));
        }
        let mut rem = self.coeffs.clone();
        if rem.len() <= n {
            return match self.is_zero() {
                true => Ok(Polynomial::zero()),
                false => Err(ProtocolError::NonZeroRemainder(format!("X^{} - beta", n))),
            };
        }

        let mut quot = vec![F::zero(); rem.len() - n];
        for i in (n..rem.len()).rev() {
            let c = rem[i];
            if c.is_zero() {
                continue;
            }
            quot[i - n] = c;
            rem[i - n] += beta * c;
            rem[i] = F::zero();
        }

        if rem[..n].iter().any(|c| !c.is_zero()) {
            return Err(ProtocolError::NonZeroRemainder(format!("X^{} - beta", n)));
        }
        Ok(Polynomial::from_coeffs(quot))
    }

    /// Synthetic division by `X - y`. Returns `(quotient, remainder)`; the
    /// remainder equals `self(y)`.
    pub fn div_by_linear(&self, y: F) -> (Polynomial, F) {
        let n = self.coeffs.len();
        if n == 0 {
            return (Polynomial::zero(), F::zero());
        }
        let mut quot = vec![F::zero(); n - 1];
        let mut carry = F::zero();
        for i in (1..n).rev() {
            carry = self.coeffs[i] + y * carry;
            quot[i - 1] = carry;
        }
        let rem = self.coeffs[0] + y * carry;
        (Polynomial::from_coeffs(quot), rem)
    }

    /// Long division by an arbitrary non-zero polynomial.
    /// Returns `(quotient, remainder)` with `deg(remainder) < deg(divisor)`.
    pub fn div_by(&self, divisor: &Polynomial) -> Result<(Polynomial, Polynomial), ProtocolError> {
        if divisor.is_zero() {
            return Err(ProtocolError::ZeroDenominator("polynomial long division".into()));
        }
        let d = divisor.degree();
        if self.is_zero() || self.degree() < d {
            return Ok((Polynomial::zero(), self.clone()));
        }
        let lead_inv = divisor.coeffs[d]
            .inverse()
            .ok_or_else(|| ProtocolError::ZeroDenominator("divisor leading coefficient".into()))?;

        let mut rem = self.coeffs.clone();
        let mut quot = vec![F::zero(); rem.len() - d];
        for i in (d..rem.len()).rev() {
            let c = rem[i] * lead_inv;
            if c.is_zero() {
                continue;
            }
            quot[i - d] = c;
            for (j, dc) in divisor.coeffs.iter().enumerate() {
                rem[i - d + j] -= c * dc;
            }
        }
        rem.truncate(d);
        Ok((Polynomial::from_coeffs(quot), Polynomial::from_coeffs(rem)))
    }

    /// `∏ (X - r)` over an arbitrary list of roots (repetitions allowed).
    pub fn zerofier(roots: &[F]) -> Polynomial {
        let mut coeffs = Vec::with_capacity(roots.len() + 1);
        coeffs.push(F::one());
        for r in roots {
            coeffs.push(F::zero());
            for i in (1..coeffs.len()).rev() {
                coeffs[i] = coeffs[i - 1] - *r * coeffs[i];
            }
            coeffs[0] = -(*r * coeffs[0]);
        }
        Polynomial::from_coeffs(coeffs)
    }

    /// Lagrange interpolation through `(points[i], values[i])`.
    ///
    /// Quadratic in the number of points; only used for the small root sets
    /// of the remainder polynomials. Repeated points are rejected.
    pub fn lagrange_interpolation(points: &[F], values: &[F]) -> Result<Polynomial, ProtocolError> {
        assert_eq!(points.len(), values.len(), "interpolation points/values length mismatch");
        if points.is_empty() {
            return Ok(Polynomial::zero());
        }

        let mut dens: Vec<F> = points
            .iter()
            .enumerate()
            .map(|(i, xi)| {
                points
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(F::one(), |acc, (_, xj)| acc * (*xi - xj))
            })
            .collect();
        if dens.iter().any(|d| d.is_zero()) {
            return Err(ProtocolError::ZeroDenominator("interpolation over repeated points".into()));
        }
        batch_inversion(&mut dens);

        let z = Polynomial::zerofier(points);
        let mut acc = vec![F::zero(); points.len()];
        for ((xi, vi), inv_den) in points.iter().zip(values).zip(&dens) {
            let scale = *vi * inv_den;
            if scale.is_zero() {
                continue;
            }
            let (basis, _) = z.div_by_linear(*xi);
            for (a, b) in acc.iter_mut().zip(basis.coeffs.iter()) {
                *a += scale * b;
            }
        }
        Ok(Polynomial::from_coeffs(acc))
    }
}

impl AddAssign<&Polynomial> for Polynomial {
    fn add_assign(&mut self, other: &Polynomial) {
        if self.coeffs.len() < other.coeffs.len() {
            self.coeffs.resize(other.coeffs.len(), F::zero());
        }
        for (a, b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a += b;
        }
        self.truncate_leading_zeros();
    }
}

impl SubAssign<&Polynomial> for Polynomial {
    fn sub_assign(&mut self, other: &Polynomial) {
        if self.coeffs.len() < other.coeffs.len() {
            self.coeffs.resize(other.coeffs.len(), F::zero());
        }
        for (a, b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a -= b;
        }
        self.truncate_leading_zeros();
    }
}

impl MulAssign<F> for Polynomial {
    fn mul_assign(&mut self, s: F) {
        if s.is_zero() {
            self.coeffs.clear();
            return;
        }
        for c in self.coeffs.iter_mut() {
            *c *= s;
        }
    }
}

/// Coefficient-wise sum of several polynomials.
pub fn sum_polynomials<'a>(pols: impl IntoIterator<Item = &'a Polynomial>) -> Polynomial {
    let mut acc = Polynomial::zero();
    for p in pols {
        acc += p;
    }
    acc
}
