//! Key generation: layout, roots of unity and the SRS slice.
//!
//! Single pass, no retries:
//!
//! 1. partition the configuration into composed polynomials `f`;
//! 2. reject layouts with fewer than two `f_i`;
//! 3. compute `powerW` and every `w_k` / `w_{k,j}` ([`RootsOfUnityTable`]);
//! 4. take `max_i f_i.degree + 1` G1 powers from the SRS and keep `[τ]G₂`.
//!
//! [`preprocess`] then commits the stage-0 polynomials and pins the
//! commitments of fully preprocessed `f_i` into the verifying key. After that
//! both keys are immutable and can be shared across threads.

#![allow(missing_docs)]

use std::{collections::BTreeMap, path::Path};

use ark_bn254::G2Affine;
use tracing::info;

use crate::{
    commit::{commit, StageCommitment},
    composed::ComposedPolynomial,
    config::Config,
    error::{ConfigError, ProtocolError},
    evals::PolynomialMap,
    partition::partition,
    pcs::{Commitment, Srs},
    roots::RootsOfUnityTable,
    srs_setup::{
        load_and_validate_g1_srs, load_and_validate_g2_srs, read_ptau, validate_g1_pairing, SrsSetupError,
    },
};

/// Everything the verifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    pub power: u32,
    /// Composed polynomials, sorted by index (`f[i].index == i`).
    pub f: Vec<ComposedPolynomial>,
    pub roots: RootsOfUnityTable,
    /// Length of the opening-value list (`max opening index + 1`).
    pub n_opening_points: usize,
    /// `[τ]G₂`.
    pub x2: G2Affine,
    /// Commitments of the fully preprocessed `f_i`, by index. The verifier
    /// uses these instead of the proof's copies.
    pub preprocessed: BTreeMap<usize, Commitment>,
}

impl VerifyingKey {
    /// Largest declared composed degree.
    pub fn max_degree(&self) -> usize {
        self.f.iter().map(|fi| fi.degree).max().unwrap_or(0)
    }

    /// The `f` layout as pretty JSON.
    pub fn layout_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&self.f).map_err(|e| ConfigError::Json(e.to_string()))
    }
}

/// Verifying key plus the G1 powers used for commitments.
#[derive(Debug, Clone)]
pub struct ProvingKey {
    pub vk: VerifyingKey,
    srs: Srs,
}

impl ProvingKey {
    pub fn srs(&self) -> &Srs {
        &self.srs
    }

    pub fn f(&self) -> &[ComposedPolynomial] {
        &self.vk.f
    }
}

/// Layout and roots only; no SRS involved.
pub fn layout(config: &Config) -> Result<(Vec<ComposedPolynomial>, RootsOfUnityTable), ConfigError> {
    let mut f = partition(config)?;
    if f.len() < 2 {
        return Err(ConfigError::TooFewComposed(f.len()));
    }
    f.sort_by_key(|fi| fi.index);
    let roots = RootsOfUnityTable::build(config.power, &f)?;
    Ok((f, roots))
}

/// Build the keys from a configuration and an SRS holding at least
/// `max_i f_i.degree + 1` G1 powers.
pub fn setup(config: &Config, srs: &Srs) -> Result<ProvingKey, ProtocolError> {
    let (f, roots) = layout(config)?;
    setup_with_layout(config, f, roots, srs)
}

/// G1 powers a layout needs: `max_i f_i.degree + 1`.
pub fn needed_powers(f: &[ComposedPolynomial]) -> usize {
    f.iter().map(|fi| fi.degree).max().unwrap_or(0) + 1
}

/// [`setup`] for a layout already computed with [`layout`].
pub fn setup_with_layout(
    config: &Config,
    f: Vec<ComposedPolynomial>,
    roots: RootsOfUnityTable,
    srs: &Srs,
) -> Result<ProvingKey, ProtocolError> {
    let n_opening_points = f
        .iter()
        .flat_map(|fi| fi.opening_points.iter())
        .max()
        .map_or(0, |j| j + 1);
    let vk = VerifyingKey {
        power: config.power,
        f,
        roots,
        n_opening_points,
        x2: srs.tau_g2(),
        preprocessed: BTreeMap::new(),
    };

    let needed = needed_powers(&vk.f);
    if srs.g1_powers().len() < needed {
        return Err(SrsSetupError::Validation(format!(
            "SRS holds {} G1 powers, layout needs {}",
            srs.g1_powers().len(),
            needed
        ))
        .into());
    }
    let srs = Srs::new(srs.g1_powers()[..needed].to_vec(), srs.tau_g2())?;

    info!(
        n_f = vk.f.len(),
        max_degree = vk.max_degree(),
        power_w = vk.roots.power_w(),
        g1_digest = %hex::encode(srs.g1_digest()),
        g2_digest = %hex::encode(srs.g2_digest()),
        "setup complete"
    );
    Ok(ProvingKey { vk, srs })
}

/// [`setup`] with the SRS read from a snarkjs `.ptau` file.
pub fn setup_from_ptau(config: &Config, path: impl AsRef<Path>) -> Result<ProvingKey, ProtocolError> {
    let (f, roots) = layout(config)?;
    let (g1, tau_g2) = read_ptau(path, needed_powers(&f))?;
    validate_g1_pairing(&g1, tau_g2)?;
    setup_with_layout(config, f, roots, &Srs::new(g1, tau_g2)?)
}

/// [`setup`] with the SRS read from arkworks-compressed G1 and G2 files
/// (see [`crate::srs_setup::save_g1_srs`]).
pub fn setup_from_files(
    config: &Config,
    g1_path: impl AsRef<Path>,
    g2_path: impl AsRef<Path>,
) -> Result<ProvingKey, ProtocolError> {
    let (f, roots) = layout(config)?;
    let g1 = load_and_validate_g1_srs(g1_path, needed_powers(&f))?;
    let tau_g2 = load_and_validate_g2_srs(g2_path)?;
    validate_g1_pairing(&g1, tau_g2)?;
    setup_with_layout(config, f, roots, &Srs::new(g1, tau_g2)?)
}

/// Commit stage 0 and pin the commitment of every fully preprocessed `f_i`
/// into `pk.vk`.
///
/// Returns the stage-0 pieces so the caller can reuse them when opening.
pub fn preprocess(
    pk: &mut ProvingKey,
    polynomials: &PolynomialMap,
) -> Result<Vec<StageCommitment>, ProtocolError> {
    let pieces = commit(0, pk, polynomials, true)?;
    let mut pinned = BTreeMap::new();
    for piece in &pieces {
        if !pk.vk.f.iter().any(|fi| fi.index == piece.index && fi.is_preprocessed()) {
            continue;
        }
        let c = piece.commit.ok_or_else(|| ProtocolError::MissingCommitment(piece.key()))?;
        pinned.insert(piece.index, c);
    }
    info!(n_preprocessed = pinned.len(), "preprocessed commitments pinned");
    pk.vk.preprocessed = pinned;
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtraMuls, PartitionMode, PolDef};
    use crate::pcs::test_srs;

    fn config() -> Config {
        Config {
            power: 4,
            pol_defs: vec![vec![PolDef::new("A", 1, 7), PolDef::new("B", 1, 7), PolDef::new("C", 2, 5)]],
            extra_muls: ExtraMuls::PerGroup(vec![0, 0]),
            open_by: PartitionMode::ByStage,
        }
    }

    #[test]
    fn keys_cover_layout() {
        let pk = setup(&config(), test_srs()).unwrap();
        assert_eq!(pk.f().len(), 2);
        assert_eq!(pk.vk.n_opening_points, 1);
        assert_eq!(pk.srs().max_degree(), pk.vk.max_degree());
        assert_eq!(pk.vk.x2, test_srs().tau_g2());
        for (i, fi) in pk.f().iter().enumerate() {
            assert_eq!(fi.index, i);
            assert!(pk.vk.roots.w(fi.width()).is_ok());
        }
        assert!(pk.vk.layout_json().unwrap().contains("\"openingPoints\""));
    }

    #[test]
    fn single_composed_polynomial_is_rejected() {
        let mut cfg = config();
        cfg.pol_defs = vec![vec![PolDef::new("A", 1, 7)]];
        cfg.extra_muls = ExtraMuls::Total(0);
        assert!(matches!(
            setup(&cfg, test_srs()),
            Err(ProtocolError::Config(ConfigError::TooFewComposed(1)))
        ));
    }

    #[test]
    fn small_srs_is_rejected() {
        let srs = test_srs();
        let small = Srs::new(srs.g1_powers()[..8].to_vec(), srs.tau_g2()).unwrap();
        assert!(matches!(setup(&config(), &small), Err(ProtocolError::Srs(SrsSetupError::Validation(_)))));
    }

    #[test]
    fn preprocess_pins_stage_zero_only_composed_polynomials() {
        use crate::poly::Polynomial;
        use crate::F;

        let cfg = Config {
            power: 4,
            pol_defs: vec![vec![PolDef::new("S", 0, 3), PolDef::new("A", 1, 5), PolDef::new("B", 1, 5)]],
            extra_muls: ExtraMuls::PerGroup(vec![1]),
            open_by: PartitionMode::ByOpeningPoint,
        };
        let mut pk = setup(&cfg, test_srs()).unwrap();
        assert!(pk.vk.preprocessed.is_empty());

        let pols: PolynomialMap = [("S", 3u64), ("A", 5), ("B", 5)]
            .iter()
            .map(|(n, d)| (n.to_string(), Polynomial::from_coeffs((1..=*d + 1).map(F::from).collect())))
            .collect();
        let pieces = preprocess(&mut pk, &pols).unwrap();

        let s = pk.f().iter().find(|fi| fi.pols == vec!["S".to_string()]).unwrap();
        assert!(s.is_preprocessed());
        assert_eq!(pk.vk.preprocessed.keys().copied().collect::<Vec<_>>(), vec![s.index]);
        let piece = pieces.iter().find(|p| p.index == s.index).unwrap();
        assert_eq!(pk.vk.preprocessed[&s.index], pk.srs().commit(&piece.pol).unwrap());
    }

    #[test]
    fn keys_from_arkworks_files() {
        use crate::srs_setup::{save_g1_srs, save_g2_srs};
        use ark_ec::AffineRepr;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let (g1_path, g2_path) = (dir.path().join("g1.bin"), dir.path().join("g2.bin"));
        let srs = test_srs();
        save_g1_srs(&g1_path, &srs.g1_powers()[..64]).unwrap();
        save_g2_srs(&g2_path, srs.tau_g2()).unwrap();

        let pk = setup_from_files(&config(), &g1_path, &g2_path).unwrap();
        assert_eq!(pk.srs().g1_powers(), &srs.g1_powers()[..pk.vk.max_degree() + 1]);

        // G2 from a different τ fails the pairing check.
        save_g2_srs(&g2_path, G2Affine::generator()).unwrap();
        assert!(matches!(
            setup_from_files(&config(), &g1_path, &g2_path),
            Err(ProtocolError::Srs(SrsSetupError::PairingCheck(_)))
        ));
    }
}
