//! Polynomial Commitment Scheme (PCS): KZG on BN254
//!
//! The SRS is an explicit, read-only value ([`Srs`]): the prover borrows it
//! for every MSM (possibly from several rayon workers at once) and the
//! verifying key keeps only `[τ]G₂`.
//!
//! ## Notes
//! - Commitments are `Σ c_i·[τ^i]G₁` over the trimmed coefficient vector,
//!   computed with arkworks' variable-base MSM.
//! - The opening check used by the verifier is the single pairing equation
//!   `e(A, G₂) = e(W', [τ]G₂)`, evaluated as one multi-Miller loop with a
//!   negated left input.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_bn254::{Bn254, Fq, G1Affine, G1Projective, G2Affine};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{BigInteger, One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use blake3::Hasher;

use crate::poly::Polynomial;

/// PCS commitment newtype (wrap **G1Affine** directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Commitment(pub G1Affine);

impl Commitment {
    /// Commitment to the zero polynomial.
    pub fn identity() -> Self {
        Commitment(G1Affine::zero())
    }
}

/// Sum of commitments (the commitment of the sum of the polynomials).
pub fn sum_commitments<'a>(commits: impl IntoIterator<Item = &'a Commitment>) -> Commitment {
    let acc = commits
        .into_iter()
        .fold(G1Projective::zero(), |acc, c| acc + c.0.into_group());
    Commitment(acc.into_affine())
}

#[derive(Debug, thiserror::Error)]
pub enum PcsError {
    #[error("empty SRS provided")]
    EmptySrs,
    #[error("polynomial of degree {degree} exceeds SRS max degree {limit}")]
    DegreeOverflow { degree: usize, limit: usize },
    #[error("MSM length mismatch ({0})")]
    Msm(usize),
}

// ===========================================================================
// SRS: G1 powers of τ and the single G2 element [τ]G2
// ===========================================================================

/// Powers `[τ^i]G₁` for `i = 0..=max_degree` and `[τ]G₂`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Srs {
    g1_powers: Vec<G1Affine>,
    tau_g2: G2Affine,
}

impl Srs {
    pub fn new(g1_powers: Vec<G1Affine>, tau_g2: G2Affine) -> Result<Self, PcsError> {
        if g1_powers.is_empty() {
            return Err(PcsError::EmptySrs);
        }
        Ok(Self { g1_powers, tau_g2 })
    }

    /// Highest committable degree.
    pub fn max_degree(&self) -> usize {
        self.g1_powers.len() - 1
    }

    pub fn g1_powers(&self) -> &[G1Affine] {
        &self.g1_powers
    }

    pub fn tau_g2(&self) -> G2Affine {
        self.tau_g2
    }

    /// KZG commitment of `pol`.
    pub fn commit(&self, pol: &Polynomial) -> Result<Commitment, PcsError> {
        let coeffs = pol.coeffs();
        if coeffs.is_empty() {
            return Ok(Commitment::identity());
        }
        if coeffs.len() > self.g1_powers.len() {
            return Err(PcsError::DegreeOverflow { degree: pol.degree(), limit: self.max_degree() });
        }
        let acc = G1Projective::msm(&self.g1_powers[..coeffs.len()], coeffs).map_err(PcsError::Msm)?;
        Ok(Commitment(acc.into_affine()))
    }

    /// Digest of the G1 powers (audit trail).
    pub fn g1_digest(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(8 + 64 * self.g1_powers.len());
        bytes.extend_from_slice(&(self.g1_powers.len() as u64).to_be_bytes());
        for p in &self.g1_powers {
            bytes.extend_from_slice(&g1_to_bytes(p));
        }
        hash_bytes(&[&bytes])
    }

    /// Digest of `[τ]G₂`.
    pub fn g2_digest(&self) -> [u8; 32] {
        hash_bytes(&[&g2_to_bytes(&self.tau_g2)])
    }
}

// ----------------------- encodings and digests -----------------------

fn fq_to_be(x: &Fq) -> Vec<u8> {
    x.into_bigint().to_bytes_be()
}

/// Uncompressed big-endian `x || y` (64 bytes); zeros for the identity.
pub fn g1_to_bytes(p: &G1Affine) -> [u8; 64] {
    let mut out = [0u8; 64];
    if let Some((x, y)) = p.xy() {
        out[..32].copy_from_slice(&fq_to_be(x));
        out[32..].copy_from_slice(&fq_to_be(y));
    }
    out
}

/// Uncompressed big-endian `x.c0 || x.c1 || y.c0 || y.c1`.
fn g2_to_bytes(p: &G2Affine) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    if let Some((x, y)) = p.xy() {
        for c in [&x.c0, &x.c1, &y.c0, &y.c1] {
            out.extend_from_slice(&fq_to_be(c));
        }
    }
    out
}

fn hash_bytes(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Hasher::new();
    h.update(b"SHPLONK.SRS.v1");
    for p in parts {
        h.update(&((*p).len() as u64).to_be_bytes());
        h.update(p);
    }
    *h.finalize().as_bytes()
}

// ===========================================================================
// Pairing check
// ===========================================================================

/// `e(lhs, G₂) == e(wp, [τ]G₂)`, as `e(-lhs, G₂) · e(wp, [τ]G₂) == 1`.
pub fn pairing_check(lhs: G1Affine, wp: G1Affine, tau_g2: G2Affine) -> bool {
    let g2_gen = G2Affine::generator();
    let minus_lhs = (-lhs.into_group()).into_affine();

    let a: Vec<<Bn254 as Pairing>::G1Prepared> = vec![
        <Bn254 as Pairing>::G1Prepared::from(minus_lhs),
        <Bn254 as Pairing>::G1Prepared::from(wp),
    ];
    let b: Vec<<Bn254 as Pairing>::G2Prepared> = vec![
        <Bn254 as Pairing>::G2Prepared::from(g2_gen),
        <Bn254 as Pairing>::G2Prepared::from(tau_g2),
    ];

    let mlo = <Bn254 as Pairing>::multi_miller_loop(a, b);
    match <Bn254 as Pairing>::final_exponentiation(mlo) {
        Some(fe) => fe.0.is_one(),
        None => false,
    }
}

#[cfg(test)]
pub(crate) fn test_srs() -> &'static Srs {
    use std::sync::OnceLock;
    static SRS: OnceLock<Srs> = OnceLock::new();
    SRS.get_or_init(|| {
        let (g1, g2) = crate::srs_setup::generate_dev_srs(512);
        Srs::new(g1, g2).unwrap()
    })
}
