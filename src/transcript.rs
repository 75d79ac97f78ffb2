//! Fiat–Shamir transcript (Keccak256, EVM byte layout)
//!
//! The byte schedule matches what an on-chain verifier hashes with
//! `keccak256(abi.encodePacked(...))`, so there are no labels or length
//! prefixes in the buffer:
//!
//! - scalars: 32-byte big-endian canonical form;
//! - G1 points: uncompressed big-endian `x || y` (64 bytes, identity = zeros).
//!
//! A challenge is `keccak256(buffer)` reduced modulo `r`. Every protocol
//! challenge is taken from a **fresh** transcript:
//!
//! | challenge | absorbed, in order                                   |
//! |-----------|------------------------------------------------------|
//! | `xiSeed`  | `f_i` commitments in index order (see [`XiSeed`])    |
//! | `alpha`   | committed ordered evaluations, then `xiSeed`         |
//! | `y`       | `alpha`, then `[W]₁`                                 |
//!
//! ```
//! use shplonk::transcript::Transcript;
//! use shplonk::F;
//!
//! let mut t1 = Transcript::new();
//! t1.absorb_scalar(&F::from(7u64));
//! let mut t2 = Transcript::new();
//! t2.absorb_scalar(&F::from(7u64));
//! assert_eq!(t1.challenge(), t2.challenge());
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::BTreeMap;

use ark_ff::{BigInteger, PrimeField};
use sha3::{Digest, Keccak256};

use crate::{
    composed::ComposedPolynomial,
    error::ProtocolError,
    pcs::{self, Commitment},
    F,
};

/// Byte buffer hashed once per challenge.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    buffer: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a field element as 32 big-endian bytes.
    pub fn absorb_scalar(&mut self, f: &F) {
        self.buffer.extend_from_slice(&scalar_to_bytes(f));
    }

    /// Absorb a commitment as uncompressed big-endian `x || y`.
    pub fn absorb_commitment(&mut self, c: &Commitment) {
        self.buffer.extend_from_slice(&pcs::g1_to_bytes(&c.0));
    }

    /// `keccak256(buffer) mod r`. The buffer is left untouched.
    pub fn challenge(&self) -> F {
        let digest = Keccak256::digest(&self.buffer);
        F::from_be_bytes_mod_order(&digest)
    }
}

/// 32-byte big-endian encoding of a scalar.
pub fn scalar_to_bytes(f: &F) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&f.into_bigint().to_bytes_be());
    out
}

// ---------------------------------------------------------------------------
// Protocol challenges
// ---------------------------------------------------------------------------

/// Source of the first challenge `xiSeed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XiSeed {
    /// Hash every `f_i` commitment in index order.
    #[default]
    Transcript,
    /// Caller-supplied seed, used verbatim. No commitment is absorbed, so
    /// the caller must derive the seed from every `f_i` commitment.
    External(F),
    /// Layered proofs: absorb the previous round's challenge, then the
    /// commitments of every `f_i` that is not fully preprocessed. The
    /// preprocessed ones must be pinned in the verifying key
    /// (see [`crate::setup::preprocess`]).
    Chained(F),
}

impl XiSeed {
    /// Extra calldata word carried by non-transcript seeds.
    pub fn calldata_word(&self) -> Option<F> {
        match self {
            XiSeed::Transcript => None,
            XiSeed::External(s) | XiSeed::Chained(s) => Some(*s),
        }
    }
}

/// Options shared by `open`, `verify_openings` and the calldata export.
/// Prover and verifier must be called with identical options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub xi_seed: XiSeed,
    /// Evaluation names kept out of the `alpha` transcript (they are passed
    /// to the verifier as public inputs instead).
    pub non_committed: Vec<String>,
}

fn commitment_of<'a>(
    commits: &'a BTreeMap<usize, Commitment>,
    index: usize,
) -> Result<&'a Commitment, ProtocolError> {
    commits.get(&index).ok_or_else(|| ProtocolError::MissingCommitment(format!("f{}", index)))
}

/// `xiSeed` for the given layout and aggregated commitments.
pub fn compute_xi_seed(
    f: &[ComposedPolynomial],
    commits: &BTreeMap<usize, Commitment>,
    source: &XiSeed,
) -> Result<F, ProtocolError> {
    let mut t = Transcript::new();
    match source {
        XiSeed::External(seed) => return Ok(*seed),
        XiSeed::Transcript => {
            for fi in f {
                t.absorb_commitment(commitment_of(commits, fi.index)?);
            }
        }
        XiSeed::Chained(previous) => {
            t.absorb_scalar(previous);
            for fi in f.iter().filter(|fi| !fi.is_preprocessed()) {
                t.absorb_commitment(commitment_of(commits, fi.index)?);
            }
        }
    }
    let xi_seed = t.challenge();
    tracing::debug!(?xi_seed, "challenge xiSeed");
    Ok(xi_seed)
}

/// `alpha = H(evals..., xiSeed)`.
pub fn compute_alpha<'a>(xi_seed: F, committed_evals: impl IntoIterator<Item = &'a F>) -> F {
    let mut t = Transcript::new();
    for e in committed_evals {
        t.absorb_scalar(e);
    }
    t.absorb_scalar(&xi_seed);
    let alpha = t.challenge();
    tracing::debug!(?alpha, "challenge alpha");
    alpha
}

/// `y = H(alpha, [W]₁)`.
pub fn compute_y(alpha: F, w: &Commitment) -> F {
    let mut t = Transcript::new();
    t.absorb_scalar(&alpha);
    t.absorb_commitment(w);
    let y = t.challenge();
    tracing::debug!(?y, "challenge y");
    y
}
