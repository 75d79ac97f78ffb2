//! Packing named polynomials into composed polynomials.
//!
//! Polynomials are first grouped (per stage or per opening point, see
//! [`PartitionMode`]). Each group is then split into `1 + extraMuls` pieces.
//! A piece of `n` polynomials becomes one composed polynomial evaluated on
//! cosets of the order-`n` subgroup, so `n` must divide `p - 1`.
//!
//! Within a group, members are sorted by descending degree (stable) and
//! pieces are contiguous slices of that order. For a tuple of piece sizes
//! the cost is `max over pieces of calculate_degree(piece)`; the search
//! enumerates every non-decreasing tuple of valid sizes summing to the group
//! size and keeps the first tuple of minimum cost.
//!
//! ## Search bound
//! The number of candidate tuples is at most `C(d + n - 1, n)` for `d` valid
//! sizes and `n` pieces. Groups have a few dozen members and `n` is a
//! handful, which keeps this in the thousands; anything above
//! [`MAX_SEARCH_CANDIDATES`] is refused up front.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    composed::{composed_degree, ComposedPolynomial, PolRef, StagePols},
    config::{Config, ExtraMuls, PartitionMode, PolDef},
    error::ConfigError,
    roots::divides_group_order,
};

/// Upper bound on candidate size tuples (or budget distributions) examined
/// for one search.
pub const MAX_SEARCH_CANDIDATES: usize = 1 << 16;

/// Polynomials that end up in the same family of composed polynomials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Human-readable identifier used in errors ("stage 2", "opening point 1").
    pub label: String,
    /// Members sorted by descending degree.
    pub pols: Vec<PolDef>,
    pub opening_points: Vec<usize>,
    /// Split stage-0 members away from the others when there is room.
    pub isolate_stage0: bool,
}

/// A chosen split of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub pieces: Vec<Vec<PolDef>>,
    /// `max` of the piece degrees.
    pub degree: usize,
    /// Sum of the piece degrees, used to break ties between budgets.
    pub total_degree: usize,
}

impl Split {
    fn from_pieces(pieces: Vec<Vec<PolDef>>) -> Self {
        let degrees: Vec<usize> = pieces.iter().map(|p| calculate_degree(p)).collect();
        Split {
            degree: degrees.iter().copied().max().unwrap_or(0),
            total_degree: degrees.iter().sum(),
            pieces,
        }
    }

    fn sizes(&self) -> Vec<usize> {
        self.pieces.iter().map(|p| p.len()).collect()
    }
}

/// Degree of the composed polynomial built from `piece` in slot order.
pub fn calculate_degree(piece: &[PolDef]) -> usize {
    let degrees: Vec<usize> = piece.iter().map(|p| p.degree).collect();
    composed_degree(&degrees)
}

/// Piece sizes `1..=n` that divide `p - 1`.
pub fn valid_piece_sizes(n: usize) -> Vec<usize> {
    (1..=n).filter(|k| divides_group_order(*k)).collect()
}

fn binomial(n: usize, k: usize) -> usize {
    let k = k.min(n.saturating_sub(k));
    (0..k).fold(1usize, |acc, i| acc.saturating_mul(n - i) / (i + 1))
}

/// Every non-decreasing tuple of `pieces` values from `sizes` summing to
/// `total`.
pub fn size_combinations(total: usize, pieces: usize, sizes: &[usize]) -> Vec<Vec<usize>> {
    fn extend(total: usize, pieces: usize, sizes: &[usize], prefix: Vec<usize>, sum: usize) -> Vec<Vec<usize>> {
        if prefix.len() == pieces {
            return if sum == total { vec![prefix] } else { Vec::new() };
        }
        let last = prefix.last().copied().unwrap_or(0);
        let placed = prefix.len() + 1;
        sizes
            .iter()
            .copied()
            .filter(|s| *s >= last)
            .filter(|s| sum + s <= total && total - (sum + s) >= pieces - placed)
            .flat_map(|s| {
                let mut next = prefix.clone();
                next.push(s);
                extend(total, pieces, sizes, next, sum + s)
            })
            .collect()
    }

    if pieces == 0 {
        return Vec::new();
    }
    extend(total, pieces, sizes, Vec::new(), 0)
}

/// Slice `pols` contiguously into pieces of the given sizes.
fn slice_by(pols: &[PolDef], sizes: &[usize]) -> Vec<Vec<PolDef>> {
    let mut out = Vec::with_capacity(sizes.len());
    let mut at = 0;
    for &s in sizes {
        out.push(pols[at..at + s].to_vec());
        at += s;
    }
    out
}

/// Minimum-degree split of `pols` (already degree-sorted) into `pieces`
/// pieces. `Ok(None)` when no tuple of valid sizes fits.
pub fn best_split(label: &str, pols: &[PolDef], pieces: usize) -> Result<Option<Split>, ConfigError> {
    if pieces == 0 || pieces > pols.len() {
        return Ok(None);
    }
    let sizes = valid_piece_sizes(pols.len());
    if binomial(sizes.len() + pieces - 1, pieces) > MAX_SEARCH_CANDIDATES {
        return Err(ConfigError::SearchTooLarge { group: label.to_string() });
    }

    let mut best: Option<Split> = None;
    for combo in size_combinations(pols.len(), pieces, &sizes) {
        let split = Split::from_pieces(slice_by(pols, &combo));
        if best.as_ref().map_or(true, |b| split.degree < b.degree) {
            best = Some(split);
        }
    }
    Ok(best)
}

/// Split stage-0 members and the rest separately, sharing `pieces` between
/// them (each side gets at least one).
fn best_isolated_split(
    label: &str,
    stage0: &[PolDef],
    others: &[PolDef],
    pieces: usize,
) -> Result<Option<Split>, ConfigError> {
    let mut best: Option<Split> = None;
    for i in 0..pieces.saturating_sub(1) {
        let a = best_split(label, stage0, i + 1)?;
        let b = best_split(label, others, pieces - 1 - i)?;
        if let (Some(a), Some(b)) = (a, b) {
            let mut all = a.pieces;
            all.extend(b.pieces);
            let split = Split::from_pieces(all);
            if best.as_ref().map_or(true, |cur| split.degree < cur.degree) {
                best = Some(split);
            }
        }
    }
    Ok(best)
}

impl Group {
    /// Best split of this group into `pieces` pieces.
    pub fn split(&self, pieces: usize) -> Result<Option<Split>, ConfigError> {
        if self.isolate_stage0 && pieces > 1 {
            let (stage0, others): (Vec<PolDef>, Vec<PolDef>) =
                self.pols.iter().cloned().partition(|p| p.stage == 0);
            if !stage0.is_empty() && !others.is_empty() {
                return best_isolated_split(&self.label, &stage0, &others, pieces);
            }
        }
        best_split(&self.label, &self.pols, pieces)
    }

    fn split_or_err(&self, pieces: usize) -> Result<Split, ConfigError> {
        if pieces > self.pols.len() {
            return Err(ConfigError::TooManyPieces {
                group: self.label.clone(),
                pieces,
                available: self.pols.len(),
            });
        }
        self.split(pieces)?.ok_or_else(|| ConfigError::NoValidSplit {
            group: self.label.clone(),
            pieces,
            total: self.pols.len(),
        })
    }
}

fn sort_by_degree(pols: &mut [PolDef]) {
    pols.sort_by(|a, b| b.degree.cmp(&a.degree));
}

/// Reject duplicates inside one opening point and conflicting declarations
/// of the same name across opening points.
fn check_definitions(pol_defs: &[Vec<PolDef>]) -> Result<(), ConfigError> {
    let mut seen: BTreeMap<&str, &PolDef> = BTreeMap::new();
    for (j, defs) in pol_defs.iter().enumerate() {
        let mut local = BTreeSet::new();
        for def in defs {
            if !local.insert(def.name.as_str()) {
                return Err(ConfigError::DuplicatePolynomial {
                    group: format!("opening point {}", j),
                    name: def.name.clone(),
                });
            }
            match seen.get(def.name.as_str()) {
                Some(prev) if prev.degree != def.degree || prev.stage != def.stage => {
                    return Err(ConfigError::InconsistentPolynomial { name: def.name.clone() });
                }
                Some(_) => {}
                None => {
                    seen.insert(def.name.as_str(), def);
                }
            }
        }
    }
    Ok(())
}

/// One group per opening point.
pub fn groups_by_opening_point(pol_defs: &[Vec<PolDef>]) -> Result<Vec<Group>, ConfigError> {
    check_definitions(pol_defs)?;
    Ok(pol_defs
        .iter()
        .enumerate()
        .map(|(j, defs)| {
            let mut pols = defs.clone();
            sort_by_degree(&mut pols);
            Group {
                label: format!("opening point {}", j),
                pols,
                opening_points: vec![j],
                isolate_stage0: true,
            }
        })
        .collect())
}

/// One group per stage, opened at every opening point that stage appears in.
/// Every member of a stage must be listed at each of those opening points.
pub fn groups_by_stage(pol_defs: &[Vec<PolDef>]) -> Result<Vec<Group>, ConfigError> {
    check_definitions(pol_defs)?;
    let stages: BTreeSet<u32> = pol_defs.iter().flatten().map(|p| p.stage).collect();

    let mut groups = Vec::with_capacity(stages.len());
    for stage in stages {
        let mut pols: Vec<PolDef> = Vec::new();
        let mut opening_points = Vec::new();
        for (j, defs) in pol_defs.iter().enumerate() {
            let mut present = false;
            for def in defs.iter().filter(|p| p.stage == stage) {
                present = true;
                if !pols.iter().any(|p| p.name == def.name) {
                    pols.push(def.clone());
                }
            }
            if present {
                opening_points.push(j);
            }
        }

        for p in &pols {
            let covered = opening_points
                .iter()
                .all(|&j| pol_defs[j].iter().any(|d| d.name == p.name));
            if !covered {
                return Err(ConfigError::InconsistentStageCoverage { stage, name: p.name.clone() });
            }
        }

        sort_by_degree(&mut pols);
        groups.push(Group {
            label: format!("stage {}", stage),
            pols,
            opening_points,
            isolate_stage0: false,
        });
    }
    Ok(groups)
}

/// Every way to hand out exactly `budget` extra pieces, group `g` taking at
/// most `caps[g]`.
fn distributions(budget: usize, caps: &[usize]) -> Vec<Vec<usize>> {
    fn extend(budget: usize, caps: &[usize], prefix: Vec<usize>) -> Vec<Vec<usize>> {
        let g = prefix.len();
        if g == caps.len() {
            return if budget == 0 { vec![prefix] } else { Vec::new() };
        }
        let rest: usize = caps[g + 1..].iter().sum();
        let lo = budget.saturating_sub(rest);
        let hi = budget.min(caps[g]);
        (lo..=hi)
            .flat_map(|e| {
                let mut next = prefix.clone();
                next.push(e);
                extend(budget - e, caps, next)
            })
            .collect()
    }
    extend(budget, caps, Vec::new())
}

/// Choose a split for every group according to the extra-multiplication
/// budget.
pub fn allocate(groups: &[Group], extra_muls: &ExtraMuls) -> Result<Vec<Split>, ConfigError> {
    match extra_muls {
        ExtraMuls::PerGroup(v) => {
            if v.len() != groups.len() {
                return Err(ConfigError::ExtraMulsLength { expected: groups.len(), got: v.len() });
            }
            groups.iter().zip(v).map(|(g, e)| g.split_or_err(1 + e)).collect()
        }
        ExtraMuls::Total(_) if groups.is_empty() => Ok(Vec::new()),
        ExtraMuls::Total(budget) => {
            for g in groups {
                if g.pols.is_empty() {
                    return Err(ConfigError::TooManyPieces { group: g.label.clone(), pieces: 1, available: 0 });
                }
            }
            let caps: Vec<usize> = groups.iter().map(|g| g.pols.len() - 1).collect();
            let max: usize = caps.iter().sum();
            if *budget > max {
                return Err(ConfigError::BudgetTooLarge { budget: *budget, max });
            }
            if binomial(budget + groups.len() - 1, groups.len() - 1) > MAX_SEARCH_CANDIDATES {
                return Err(ConfigError::SearchTooLarge { group: "extraMuls distribution".into() });
            }

            // table[g][e]: best split of group g with e extra pieces
            let table = groups
                .iter()
                .zip(&caps)
                .map(|(g, cap)| {
                    (0..=(*cap).min(*budget))
                        .map(|e| g.split(1 + e))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut best: Option<((usize, usize), Vec<usize>)> = None;
            for dist in distributions(*budget, &caps) {
                let chosen: Option<Vec<&Split>> =
                    dist.iter().enumerate().map(|(g, e)| table[g][*e].as_ref()).collect();
                let Some(chosen) = chosen else { continue };
                let key = (
                    chosen.iter().map(|s| s.degree).max().unwrap_or(0),
                    chosen.iter().map(|s| s.total_degree).sum::<usize>(),
                );
                if best.as_ref().map_or(true, |(k, _)| key < *k) {
                    best = Some((key, dist));
                }
            }

            let (_, dist) = best.ok_or_else(|| ConfigError::NoValidSplit {
                group: "every extraMuls distribution".into(),
                pieces: groups.len() + budget,
                total: groups.iter().map(|g| g.pols.len()).sum(),
            })?;
            debug!(?dist, "extra multiplications distributed");
            Ok(dist
                .iter()
                .enumerate()
                .filter_map(|(g, e)| table[g][*e].clone())
                .collect())
        }
    }
}

/// Turn a piece into its composed-polynomial definition.
fn compose(index: usize, piece: &[PolDef], opening_points: &[usize]) -> ComposedPolynomial {
    let stages: BTreeSet<u32> = piece.iter().map(|p| p.stage).collect();
    ComposedPolynomial {
        index,
        pols: piece.iter().map(|p| p.name.clone()).collect(),
        opening_points: opening_points.to_vec(),
        degree: calculate_degree(piece),
        stages: stages
            .into_iter()
            .map(|stage| StagePols {
                stage,
                pols: piece
                    .iter()
                    .filter(|p| p.stage == stage)
                    .map(|p| PolRef { name: p.name.clone(), degree: p.degree })
                    .collect(),
            })
            .collect(),
    }
}

/// Compute the composed polynomials for a configuration, indexed in group
/// order then piece order.
pub fn partition(config: &Config) -> Result<Vec<ComposedPolynomial>, ConfigError> {
    config.validate()?;
    let groups = match config.open_by {
        PartitionMode::ByStage => groups_by_stage(&config.pol_defs)?,
        PartitionMode::ByOpeningPoint => groups_by_opening_point(&config.pol_defs)?,
    };
    let splits = allocate(&groups, &config.extra_muls)?;

    let mut f = Vec::new();
    for (group, split) in groups.iter().zip(&splits) {
        debug!(group = %group.label, sizes = ?split.sizes(), degree = split.degree, "group split");
        for piece in &split.pieces {
            f.push(compose(f.len(), piece, &group.opening_points));
        }
    }
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(entries: &[(&str, u32, usize)]) -> Vec<PolDef> {
        entries.iter().map(|(n, s, d)| PolDef::new(*n, *s, *d)).collect()
    }

    fn cfg(pol_defs: Vec<Vec<PolDef>>, extra_muls: ExtraMuls, open_by: PartitionMode) -> Config {
        Config { power: 4, pol_defs, extra_muls, open_by }
    }

    #[test]
    fn piece_sizes_divide_group_order() {
        assert_eq!(valid_piece_sizes(30), vec![1, 2, 3, 4, 6, 8, 9, 12, 13, 16, 18, 24, 26, 29]);
    }

    #[test]
    fn size_combinations_are_sorted_and_exact() {
        let sizes = valid_piece_sizes(10);
        let combos = size_combinations(10, 3, &sizes);
        assert!(!combos.is_empty());
        for c in &combos {
            assert_eq!(c.len(), 3);
            assert_eq!(c.iter().sum::<usize>(), 10);
            assert!(c.windows(2).all(|w| w[0] <= w[1]));
            assert!(c.iter().all(|s| divides_group_order(*s)));
        }
        assert!(combos.contains(&vec![2, 4, 4]));
        assert!(combos.contains(&vec![1, 1, 8]));

        assert_eq!(size_combinations(5, 2, &valid_piece_sizes(5)), vec![vec![1, 4], vec![2, 3]]);
        assert!(size_combinations(5, 1, &valid_piece_sizes(5)).is_empty());
        assert!(size_combinations(3, 0, &valid_piece_sizes(3)).is_empty());
    }

    #[test]
    fn best_split_is_minimal_over_all_combinations() {
        let mut pols = defs(&[
            ("A", 1, 40),
            ("B", 1, 33),
            ("C", 1, 33),
            ("D", 1, 20),
            ("E", 1, 17),
            ("F", 1, 9),
            ("G", 1, 3),
        ]);
        sort_by_degree(&mut pols);
        for pieces in 1..=4 {
            let Some(best) = best_split("g", &pols, pieces).unwrap() else {
                continue;
            };
            assert_eq!(best.pieces.iter().map(|p| p.len()).sum::<usize>(), pols.len());
            for combo in size_combinations(pols.len(), pieces, &valid_piece_sizes(pols.len())) {
                let other = Split::from_pieces(slice_by(&pols, &combo));
                assert!(best.degree <= other.degree, "pieces={} combo={:?}", pieces, combo);
            }
        }
        // 7 polynomials cannot form a single piece.
        assert!(best_split("g", &pols, 1).unwrap().is_none());
    }

    #[test]
    fn by_opening_point_partition() {
        let config = cfg(
            vec![
                defs(&[("A", 1, 8), ("B", 1, 8), ("C", 2, 9), ("D", 2, 4)]),
                defs(&[("C", 2, 9)]),
            ],
            ExtraMuls::PerGroup(vec![1, 0]),
            PartitionMode::ByOpeningPoint,
        );
        let f = partition(&config).unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f.iter().map(|fi| fi.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(f[0].opening_points, vec![0]);
        assert_eq!(f[1].opening_points, vec![0]);
        assert_eq!(f[2].opening_points, vec![1]);
        assert_eq!(f[2].pols, vec!["C".to_string()]);
        for fi in &f {
            assert!(divides_group_order(fi.width()));
            let members: usize = fi.stages.iter().map(|s| s.pols.len()).sum();
            assert_eq!(members, fi.width());
            assert!(fi.stages.windows(2).all(|w| w[0].stage < w[1].stage));
        }
        let widths: usize = f[..2].iter().map(|fi| fi.width()).sum();
        assert_eq!(widths, 4);
    }

    #[test]
    fn by_stage_groups_share_opening_points() {
        let config = cfg(
            vec![
                defs(&[("A", 1, 7), ("B", 1, 7), ("Z", 2, 8), ("T", 2, 6)]),
                defs(&[("Z", 2, 8), ("T", 2, 6)]),
            ],
            ExtraMuls::PerGroup(vec![0, 0]),
            PartitionMode::ByStage,
        );
        let f = partition(&config).unwrap();
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].pols, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(f[0].opening_points, vec![0]);
        assert_eq!(f[1].pols, vec!["Z".to_string(), "T".to_string()]);
        assert_eq!(f[1].opening_points, vec![0, 1]);
        assert_eq!(f[1].degree, 8 * 2);
        assert_eq!(f[1].stages, vec![StagePols {
            stage: 2,
            pols: vec![PolRef { name: "Z".into(), degree: 8 }, PolRef { name: "T".into(), degree: 6 }],
        }]);
    }

    #[test]
    fn by_stage_requires_full_coverage() {
        let err = groups_by_stage(&[defs(&[("Z", 2, 8), ("T", 2, 6)]), defs(&[("Z", 2, 8)])]).unwrap_err();
        assert!(matches!(err, ConfigError::InconsistentStageCoverage { stage: 2, ref name } if name == "T"));
    }

    #[test]
    fn rejects_duplicates_and_conflicts() {
        let err = groups_by_opening_point(&[defs(&[("A", 1, 8), ("A", 1, 8)])]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePolynomial { .. }));

        let err = groups_by_opening_point(&[defs(&[("A", 1, 8)]), defs(&[("A", 1, 9)])]).unwrap_err();
        assert!(matches!(err, ConfigError::InconsistentPolynomial { .. }));
    }

    #[test]
    fn stage0_members_are_isolated_when_split() {
        let groups = groups_by_opening_point(&[defs(&[
            ("QL", 0, 32),
            ("A", 1, 33),
            ("QR", 0, 32),
            ("B", 1, 33),
            ("C", 1, 33),
        ])])
        .unwrap();
        let split = groups[0].split(2).unwrap().unwrap();
        assert_eq!(split.pieces.len(), 2);
        assert!(split.pieces[0].iter().all(|p| p.stage == 0));
        assert!(split.pieces[1].iter().all(|p| p.stage != 0));
        assert_eq!(split.sizes(), vec![2, 3]);

        // A single piece keeps everything together; 5 is not a valid size.
        assert!(groups[0].split(1).unwrap().is_none());
    }

    #[test]
    fn total_budget_goes_where_it_lowers_the_degree() {
        let config = cfg(
            vec![
                defs(&[("A", 1, 10), ("B", 1, 10), ("C", 1, 10), ("D", 1, 10)]),
                defs(&[("E", 2, 10), ("G", 2, 10)]),
            ],
            ExtraMuls::Total(1),
            PartitionMode::ByOpeningPoint,
        );
        let f = partition(&config).unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f[0].width(), 2);
        assert_eq!(f[1].width(), 2);
        assert_eq!(f[2].width(), 2);
        assert_eq!(f.iter().map(|fi| fi.degree).max(), Some(21));
    }

    #[test]
    fn budget_errors() {
        let pol_defs = vec![defs(&[("A", 1, 10), ("B", 1, 10)]), defs(&[("E", 2, 10)])];

        let err = partition(&cfg(pol_defs.clone(), ExtraMuls::Total(2), PartitionMode::ByOpeningPoint)).unwrap_err();
        assert!(matches!(err, ConfigError::BudgetTooLarge { budget: 2, max: 1 }));

        let err =
            partition(&cfg(pol_defs.clone(), ExtraMuls::PerGroup(vec![0]), PartitionMode::ByOpeningPoint)).unwrap_err();
        assert!(matches!(err, ConfigError::ExtraMulsLength { expected: 2, got: 1 }));

        let err = partition(&cfg(pol_defs, ExtraMuls::PerGroup(vec![0, 1]), PartitionMode::ByOpeningPoint))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooManyPieces { pieces: 2, available: 1, .. }));
    }

    #[test]
    fn infeasible_group_is_named() {
        let five = defs(&[("A", 1, 3), ("B", 1, 3), ("C", 1, 3), ("D", 1, 3), ("E", 1, 3)]);
        let err =
            partition(&cfg(vec![five, defs(&[("F", 2, 3)])], ExtraMuls::PerGroup(vec![0, 0]), PartitionMode::ByOpeningPoint))
                .unwrap_err();
        match err {
            ConfigError::NoValidSplit { group, pieces, total } => {
                assert_eq!(group, "opening point 0");
                assert_eq!((pieces, total), (1, 5));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
