//! Error categories shared by setup, commit, open and verify.
//!
//! Configuration problems ([`ConfigError`]) are reported before any
//! cryptographic work starts. Everything that goes wrong afterwards is a
//! [`ProtocolError`]. A proof that simply does not verify is *not* an error:
//! `verify_openings` returns `Ok(false)` for that.

#![allow(missing_docs)]

use crate::{pcs::PcsError, srs_setup::SrsSetupError};

/// Invalid or infeasible configuration. Always names the offending group.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid openBy `{0}` (expected `stage` or `openingPoints`)")]
    InvalidOpenBy(String),

    #[error("no polynomial definitions provided")]
    Empty,

    #[error("polynomial `{name}` appears twice in {group}")]
    DuplicatePolynomial { group: String, name: String },

    #[error("polynomial `{name}` is declared with different degree or stage across opening points")]
    InconsistentPolynomial { name: String },

    #[error("stage {stage}: polynomial `{name}` is not opened at every opening point of the stage")]
    InconsistentStageCoverage { stage: u32, name: String },

    #[error("extraMuls has {got} entries but there are {expected} groups")]
    ExtraMulsLength { expected: usize, got: usize },

    #[error("{group}: cannot split {available} polynomials into {pieces} pieces")]
    TooManyPieces { group: String, pieces: usize, available: usize },

    #[error("{group}: no combination of {pieces} valid root-of-unity orders sums to {total}")]
    NoValidSplit { group: String, pieces: usize, total: usize },

    #[error("extraMuls budget {budget} exceeds the maximum usable {max}")]
    BudgetTooLarge { budget: usize, max: usize },

    #[error("{group}: partition search space too large")]
    SearchTooLarge { group: String },

    #[error("at least two composed polynomials are required, got {0}")]
    TooFewComposed(usize),

    #[error("power {power} exceeds the two-adicity {max} of the scalar field")]
    PowerTooLarge { power: u32, max: u32 },

    #[error("{0} does not divide the multiplicative group order")]
    NotDivisor(u64),

    #[error("config json: {0}")]
    Json(String),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while running setup, commit, open or verify.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("degree bound violated for {what}: degree {degree} > bound {bound}")]
    DegreeBound { what: String, degree: usize, bound: usize },

    #[error("non-zero remainder dividing {0}")]
    NonZeroRemainder(String),

    #[error("missing polynomial `{0}`")]
    MissingPolynomial(String),

    #[error("missing commitment `{0}`")]
    MissingCommitment(String),

    #[error("missing evaluation `{0}`")]
    MissingEvaluation(String),

    #[error("no root of unity stored for width {width}, opening point {point}")]
    MissingRoot { width: usize, point: usize },

    #[error("zero denominator in {0}")]
    ZeroDenominator(String),

    #[error(transparent)]
    Srs(#[from] SrsSetupError),

    #[error(transparent)]
    Pcs(#[from] PcsError),
}

impl ProtocolError {
    pub(crate) fn degree(what: impl Into<String>, degree: usize, bound: usize) -> Self {
        ProtocolError::DegreeBound { what: what.into(), degree, bound }
    }
}

/// Fail with [`ProtocolError::DegreeBound`] when `degree > bound`.
pub(crate) fn ensure_degree(what: &str, degree: usize, bound: usize) -> Result<(), ProtocolError> {
    if degree > bound {
        return Err(ProtocolError::degree(what, degree, bound));
    }
    Ok(())
}
