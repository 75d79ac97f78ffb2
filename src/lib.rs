//! Crate root: public surface, core aliases, and protocol-wide invariants
//!
//! `shplonk` batches openings of many committed polynomials, at several
//! opening points, into two G1 elements and one pairing check. Named
//! polynomials are interleaved into a few *composed* polynomials `f_i`; each
//! `f_i` is opened on the roots of `X^n = z` for each of its opening points
//! `z`, which recovers every member's value at `z`.
//!
//! ## Pipeline
//!
//! ```text
//! Config ─► setup ─► preprocess (stage 0) ─► commit (stage ≥ 1) ─► open ─► verify_openings
//!                                                                   └──► export_calldata
//! ```
//!
//! ## Invariants
//!
//! - **Field & Curve.** The scalar field is `ark_bn254::Fr` (`F` in this
//!   crate); commitments are KZG on BN254 (`G1 = ark_bn254::G1Affine`). All
//!   arithmetic is provided by Arkworks; we **forbid unsafe** throughout the
//!   crate.
//!
//! - **Composition.** Member `k` of an `f_i` of width `n` occupies
//!   coefficients `k, k+n, k+2n, ...`, so `deg f_i = max_k (deg_k·n + k)`.
//!   Every width divides `r - 1`.
//!
//! - **Roots.** For seed `xiSeed` and `powerW = lcm(widths)`, the opening
//!   value of point `j` is `xiSeed^powerW · ω^j` with `ω` of order `2^power`.
//!
//! - **Fiat–Shamir.** Keccak256 over the EVM byte layout; every challenge is
//!   taken from a fresh transcript in the fixed order `xiSeed, alpha, y`.
//!
//! - **Ordering.** Evaluations are ordered by `f` index, then opening point,
//!   then slot. Prover, verifier and calldata share this order.
//!
//! Every violated degree bound, missing input or inconsistent configuration is
//! a precise error; a proof that does not verify is `Ok(false)`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

/// Dense polynomials over `F` (arithmetic, division, interpolation).
pub mod poly;
/// Composed polynomials and the interleaving builder.
pub mod composed;
/// Configuration (`power`, `polDefs`, `extraMuls`, `openBy`).
pub mod config;
/// Partitioning named polynomials into composed polynomials.
pub mod partition;
/// Roots of unity and per-`f_i` evaluation roots.
pub mod roots;
/// Polynomial commitment scheme (KZG) and the pairing check.
pub mod pcs;
/// SRS setup and management (trusted ceremony integration)
pub mod srs_setup;
/// Proving and verifying keys.
pub mod setup;
/// Per-stage commitments and their aggregation.
pub mod commit;
/// Fiat–Shamir transcript (Keccak256) and challenge derivation.
pub mod transcript;
/// Evaluation names and canonical ordering.
pub mod evals;
/// Batched modular inverse.
pub mod inverse;
/// Opening prover (`W`, `W'`).
pub mod prover;
/// Opening verifier.
pub mod verifier;
/// Calldata export for an on-chain verifier.
pub mod calldata;
/// Error categories.
pub mod error;

// ============================================================================
// Canonical aliases and root-level re-exports (centralization)
// ============================================================================

/// Scalar field used across the crate (BN254).
pub type F = ark_bn254::Fr;

/// G1 affine group element used for commitments.
pub type G1 = ark_bn254::G1Affine;

/// G2 affine group element (`[τ]G₂`).
pub type G2 = ark_bn254::G2Affine;

pub use crate::calldata::{export_calldata, Calldata};
pub use crate::commit::{commit, CommittedPolynomials, StageCommitment};
pub use crate::composed::ComposedPolynomial;
pub use crate::config::{Config, ExtraMuls, PartitionMode, PolDef};
pub use crate::error::{ConfigError, ProtocolError};
pub use crate::evals::{Evaluations, PolynomialMap};
pub use crate::pcs::{Commitment, Srs};
pub use crate::poly::Polynomial;
pub use crate::prover::{open, OpeningProof, ProofCommitments};
pub use crate::setup::{preprocess, setup, setup_from_files, setup_from_ptau, ProvingKey, VerifyingKey};
pub use crate::transcript::{OpenOptions, XiSeed};
pub use crate::verifier::verify_openings;
