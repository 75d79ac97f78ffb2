//! Per-stage commitments.
//!
//! At stage `s`, every `f_i` with members due at `s` is built over those
//! slots only and committed. Pieces are keyed `f{index}_{stage}`; since both
//! the interleave and the commitment are linear, summing an `f_i`'s pieces
//! over all of its stages gives the full polynomial and its commitment.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;

use crate::{
    composed::{ComposedBuilder, ComposedPolynomial},
    error::{ensure_degree, ProtocolError},
    evals::PolynomialMap,
    pcs::{sum_commitments, Commitment},
    poly::{sum_polynomials, Polynomial},
    setup::ProvingKey,
};

/// One stage's contribution to one `f_i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommitment {
    pub index: usize,
    pub stage: u32,
    pub pol: Polynomial,
    /// `None` when committed without MSM.
    pub commit: Option<Commitment>,
}

impl StageCommitment {
    pub fn key(&self) -> String {
        piece_key(self.index, self.stage)
    }
}

fn piece_key(index: usize, stage: u32) -> String {
    format!("f{}_{}", index, stage)
}

/// Build (and with `with_msm`, commit) every `f_i` piece due at `stage`.
///
/// Each member must be present in `polynomials` and respect its declared
/// degree.
pub fn commit(
    stage: u32,
    pk: &ProvingKey,
    polynomials: &PolynomialMap,
    with_msm: bool,
) -> Result<Vec<StageCommitment>, ProtocolError> {
    info!(stage, "committing polynomials");

    let mut pieces = Vec::new();
    for fi in pk.f() {
        let Some(due) = fi.stage(stage) else { continue };
        let mut builder = ComposedBuilder::new(fi.width());
        for member in &due.pols {
            let p = polynomials
                .get(&member.name)
                .ok_or_else(|| ProtocolError::MissingPolynomial(member.name.clone()))?;
            ensure_degree(&member.name, p.degree(), member.degree)?;
            let slot = fi
                .slot_of(&member.name)
                .ok_or_else(|| ProtocolError::MissingPolynomial(member.name.clone()))?;
            builder.add_polynomial(slot, p);
        }
        let pol = builder.build();
        ensure_degree(&piece_key(fi.index, stage), pol.degree(), fi.degree)?;
        pieces.push(StageCommitment { index: fi.index, stage, pol, commit: None });
    }

    if with_msm {
        let srs = pk.srs();
        let commits = pieces
            .par_iter()
            .map(|p| srs.commit(&p.pol))
            .collect::<Result<Vec<_>, _>>()?;
        for (p, c) in pieces.iter_mut().zip(commits) {
            p.commit = Some(c);
        }
    }
    Ok(pieces)
}

/// Stage pieces collected across rounds, keyed `f{index}_{stage}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommittedPolynomials {
    pieces: BTreeMap<String, StageCommitment>,
}

impl CommittedPolynomials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, piece: StageCommitment) {
        self.pieces.insert(piece.key(), piece);
    }

    pub fn get(&self, key: &str) -> Option<&StageCommitment> {
        self.pieces.get(key)
    }

    fn stage_pieces<'a>(
        &'a self,
        fi: &'a ComposedPolynomial,
    ) -> impl Iterator<Item = Result<&'a StageCommitment, ProtocolError>> + 'a {
        fi.stages.iter().map(move |s| {
            let key = piece_key(fi.index, s.stage);
            self.pieces.get(&key).ok_or(ProtocolError::MissingCommitment(key))
        })
    }

    /// Full `f_i` polynomials: the sum of all stage pieces.
    pub fn aggregate_polynomials(
        &self,
        f: &[ComposedPolynomial],
    ) -> Result<BTreeMap<usize, Polynomial>, ProtocolError> {
        f.iter()
            .map(|fi| {
                let pieces = self.stage_pieces(fi).collect::<Result<Vec<_>, _>>()?;
                Ok((fi.index, sum_polynomials(pieces.iter().map(|p| &p.pol))))
            })
            .collect()
    }

    /// Full `f_i` commitments: the sum of all stage commitments.
    pub fn aggregate_commitments(
        &self,
        f: &[ComposedPolynomial],
    ) -> Result<BTreeMap<usize, Commitment>, ProtocolError> {
        f.iter()
            .map(|fi| {
                let commits = self
                    .stage_pieces(fi)
                    .map(|p| {
                        let p = p?;
                        p.commit.as_ref().ok_or_else(|| ProtocolError::MissingCommitment(p.key()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((fi.index, sum_commitments(commits)))
            })
            .collect()
    }
}

impl Extend<StageCommitment> for CommittedPolynomials {
    fn extend<T: IntoIterator<Item = StageCommitment>>(&mut self, iter: T) {
        for piece in iter {
            self.insert(piece);
        }
    }
}

impl FromIterator<StageCommitment> for CommittedPolynomials {
    fn from_iter<T: IntoIterator<Item = StageCommitment>>(iter: T) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ExtraMuls, PartitionMode, PolDef};
    use crate::pcs::test_srs;
    use crate::setup::setup;
    use crate::F;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn random_poly(rng: &mut StdRng, degree: usize) -> Polynomial {
        Polynomial::from_coeffs((0..=degree).map(|_| F::rand(rng)).collect())
    }

    /// Opening-point mode: S is isolated from A and B, which span two stages.
    fn key() -> ProvingKey {
        let cfg = Config {
            power: 3,
            pol_defs: vec![vec![
                PolDef::new("A", 1, 6),
                PolDef::new("B", 2, 6),
                PolDef::new("S", 0, 9),
            ]],
            extra_muls: ExtraMuls::Total(1),
            open_by: PartitionMode::ByOpeningPoint,
        };
        setup(&cfg, test_srs()).unwrap()
    }

    fn polys(pk: &ProvingKey, rng: &mut StdRng) -> PolynomialMap {
        pk.f()
            .iter()
            .flat_map(|fi| fi.stages.iter().flat_map(|s| s.pols.iter()))
            .map(|p| (p.name.clone(), random_poly(rng, p.degree)))
            .collect()
    }

    #[test]
    fn stage_pieces_sum_to_full_commitment() {
        let pk = key();
        let mut rng = StdRng::seed_from_u64(51);
        let pols = polys(&pk, &mut rng);

        let mut committed = CommittedPolynomials::new();
        for stage in 0..=2 {
            committed.extend(commit(stage, &pk, &pols, true).unwrap());
        }
        let full = committed.aggregate_polynomials(pk.f()).unwrap();
        let commits = committed.aggregate_commitments(pk.f()).unwrap();

        for fi in pk.f() {
            let mut builder = ComposedBuilder::new(fi.width());
            for (slot, name) in fi.pols.iter().enumerate() {
                builder.add_polynomial(slot, &pols[name]);
            }
            let expected = builder.build();
            assert!(expected.degree() <= fi.degree);
            assert_eq!(full[&fi.index], expected);
            assert_eq!(commits[&fi.index], pk.srs().commit(&expected).unwrap());
        }
    }

    #[test]
    fn missing_and_oversized_polynomials_fail() {
        let pk = key();
        let mut rng = StdRng::seed_from_u64(52);
        let mut pols = polys(&pk, &mut rng);

        pols.insert("A".into(), random_poly(&mut rng, 7));
        assert!(matches!(commit(1, &pk, &pols, false), Err(ProtocolError::DegreeBound { what, .. }) if what == "A"));

        pols.remove("A");
        assert!(matches!(commit(1, &pk, &pols, false), Err(ProtocolError::MissingPolynomial(n)) if n == "A"));
    }

    #[test]
    fn aggregation_needs_every_stage() {
        let pk = key();
        let mut rng = StdRng::seed_from_u64(53);
        let pols = polys(&pk, &mut rng);

        let committed: CommittedPolynomials = commit(1, &pk, &pols, false).unwrap().into_iter().collect();
        assert!(matches!(committed.aggregate_polynomials(pk.f()), Err(ProtocolError::MissingCommitment(_))));

        let mut committed = committed;
        for stage in [0, 2] {
            committed.extend(commit(stage, &pk, &pols, false).unwrap());
        }
        assert!(committed.aggregate_polynomials(pk.f()).is_ok());
        // Pieces built without MSM carry no commitment.
        assert!(matches!(committed.aggregate_commitments(pk.f()), Err(ProtocolError::MissingCommitment(_))));
    }
}
