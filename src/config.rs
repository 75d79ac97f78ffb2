//! User configuration: which polynomials exist, where they are opened and how
//! much verifier work may be spent on extra scalar multiplications.
//!
//! JSON shape (camelCase):
//!
//! ```json
//! {
//!   "power": 5,
//!   "polDefs": [
//!     [{"name": "QL", "stage": 0, "degree": 32}, {"name": "A", "stage": 1, "degree": 33}],
//!     [{"name": "Z", "stage": 2, "degree": 34}]
//!   ],
//!   "extraMuls": [1, 0],
//!   "openBy": "openingPoints"
//! }
//! ```
//!
//! `polDefs[j]` lists the polynomials opened at opening point `j`, i.e. at
//! `xi·ω^j` with `ω` the `2^power`-th root of unity.

#![allow(missing_docs)]

use std::{path::Path, str::FromStr};

use ark_ff::FftField;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, F};

/// One named polynomial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolDef {
    pub name: String,
    pub stage: u32,
    pub degree: usize,
}

impl PolDef {
    pub fn new(name: impl Into<String>, stage: u32, degree: usize) -> Self {
        Self { name: name.into(), stage, degree }
    }
}

/// How polynomials are grouped before splitting into composed polynomials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionMode {
    /// One group per stage; a group is opened at every point its stage uses.
    #[serde(rename = "stage")]
    ByStage,
    /// One group per opening point.
    #[serde(rename = "openingPoints")]
    ByOpeningPoint,
}

impl FromStr for PartitionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stage" => Ok(PartitionMode::ByStage),
            "openingPoints" => Ok(PartitionMode::ByOpeningPoint),
            other => Err(ConfigError::InvalidOpenBy(other.to_string())),
        }
    }
}

/// Extra composed polynomials (one extra G1 scalar multiplication each for
/// the verifier) beyond one per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraMuls {
    /// Distributed over the groups by the partitioner.
    Total(usize),
    /// Exactly one entry per group.
    PerGroup(Vec<usize>),
}

impl Default for ExtraMuls {
    fn default() -> Self {
        ExtraMuls::Total(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// log2 of the order of the opening-point shift `ω`.
    pub power: u32,
    pub pol_defs: Vec<Vec<PolDef>>,
    #[serde(default)]
    pub extra_muls: ExtraMuls,
    pub open_by: PartitionMode,
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_json::from_str(s).map_err(|e| ConfigError::Json(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Shape checks that do not need the partitioner.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pol_defs.is_empty() || self.pol_defs.iter().all(|g| g.is_empty()) {
            return Err(ConfigError::Empty);
        }
        if self.power > F::TWO_ADICITY {
            return Err(ConfigError::PowerTooLarge { power: self.power, max: F::TWO_ADICITY });
        }
        Ok(())
    }

    /// Number of opening points (`polDefs.len()`).
    pub fn n_opening_points(&self) -> usize {
        self.pol_defs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_json() {
        let cfg = Config::from_json_str(
            r#"{
                "power": 4,
                "polDefs": [[{"name": "A", "stage": 1, "degree": 7}], [{"name": "B", "stage": 2, "degree": 3}]],
                "extraMuls": [0, 1],
                "openBy": "openingPoints"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.power, 4);
        assert_eq!(cfg.open_by, PartitionMode::ByOpeningPoint);
        assert_eq!(cfg.extra_muls, ExtraMuls::PerGroup(vec![0, 1]));
        assert_eq!(cfg.pol_defs[1][0], PolDef::new("B", 2, 3));
        assert_eq!(cfg.n_opening_points(), 2);
    }

    #[test]
    fn total_extra_muls_and_default() {
        let cfg = Config::from_json_str(
            r#"{"power": 3, "polDefs": [[{"name": "A", "stage": 1, "degree": 7}]], "extraMuls": 2, "openBy": "stage"}"#,
        )
        .unwrap();
        assert_eq!(cfg.extra_muls, ExtraMuls::Total(2));

        let cfg = Config::from_json_str(
            r#"{"power": 3, "polDefs": [[{"name": "A", "stage": 1, "degree": 7}]], "openBy": "stage"}"#,
        )
        .unwrap();
        assert_eq!(cfg.extra_muls, ExtraMuls::Total(0));
    }

    #[test]
    fn rejects_unknown_open_by() {
        let err = Config::from_json_str(
            r#"{"power": 3, "polDefs": [[{"name": "A", "stage": 1, "degree": 7}]], "openBy": "rows"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(matches!("rows".parse::<PartitionMode>(), Err(ConfigError::InvalidOpenBy(_))));
        assert_eq!("stage".parse::<PartitionMode>().unwrap(), PartitionMode::ByStage);
    }

    #[test]
    fn rejects_power_beyond_two_adicity() {
        let cfg = Config {
            power: 29,
            pol_defs: vec![vec![PolDef::new("A", 0, 1)]],
            extra_muls: ExtraMuls::Total(0),
            open_by: PartitionMode::ByStage,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::PowerTooLarge { .. })));
    }

    #[test]
    fn reads_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"power": 2, "polDefs": [[{{"name": "A", "stage": 0, "degree": 3}}]], "openBy": "stage"}}"#
        )
        .unwrap();
        let cfg = Config::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.pol_defs[0][0].name, "A");
    }
}
