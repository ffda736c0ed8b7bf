use std::collections::BTreeMap;

use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::chemistry::transformations::{RtDirection, Transformation};
use crate::data::adjacency::{AdjacencyMatrix, Layer, MatrixKind, LABEL_DELIMITER};
use crate::data::feature::{validate_features, Feature};
use crate::error::NetworkError;

/// One matched cell produced by the pairwise scan: column index, joined
/// transformation labels and the signed observed mass difference.
struct MatchedCell {
    col: usize,
    labels: String,
    observed: f64,
}

fn validate_transformations(transformations: &[Transformation]) -> Result<(), NetworkError> {
    if transformations.is_empty() {
        return Err(NetworkError::InvalidInput("transformation catalog is empty".to_string()));
    }
    for transformation in transformations {
        if !transformation.mass.is_finite() || transformation.mass <= 0.0 {
            return Err(NetworkError::InvalidInput(format!(
                "transformation {} has non-finite or non-positive mass: {}",
                transformation.group, transformation.mass
            )));
        }
    }
    Ok(())
}

/// Tests whether the declared direction admits an edge from the row feature
/// to a column feature whose mass is larger (`observed > 0`) or smaller.
fn direction_admits(direction: RtDirection, observed: f64) -> bool {
    match direction {
        RtDirection::Increase => observed > 0.0,
        RtDirection::Decrease => observed < 0.0,
        RtDirection::Unconstrained => true,
    }
}

/// Scans one row of the pairwise matrix for transformation matches.
///
/// The tolerance window for a pair is `max(mz_i, mz_j) * tolerance_ppm / 1e6`,
/// the larger mass of the pair is the ppm reference.
fn scan_row(
    row: usize,
    features: &[Feature],
    transformations: &[Transformation],
    tolerance_ppm: f64,
    directed: bool,
) -> Vec<MatchedCell> {
    let mut cells = Vec::new();
    let mz_row = features[row].mz;

    for (col, partner) in features.iter().enumerate() {
        if col == row {
            continue;
        }
        let observed = partner.mz - mz_row;
        let tolerance = mz_row.max(partner.mz) * tolerance_ppm / 1e6;

        let mut labels: Vec<&str> = Vec::new();
        for transformation in transformations {
            if (observed.abs() - transformation.mass).abs() > tolerance {
                continue;
            }
            if directed && !direction_admits(transformation.direction, observed) {
                continue;
            }
            labels.push(transformation.group.as_str());
        }

        if !labels.is_empty() {
            let mut joined = String::new();
            for (k, label) in labels.iter().enumerate() {
                if k > 0 {
                    joined.push(LABEL_DELIMITER);
                }
                joined.push_str(label);
            }
            cells.push(MatchedCell { col, labels: joined, observed });
        }
    }
    cells
}

/// Builds a structural adjacency matrix connecting features whose pairwise
/// mass difference matches a transformation's mass delta within a ppm
/// tolerance.
///
/// For every pair (i, j) the observed difference is `mz[j] - mz[i]` and the
/// tolerance window is `max(mz[i], mz[j]) * tolerance_ppm / 1e6`. A pair
/// matches a transformation t when `||observed| - t.mass| <= tolerance`.
/// When several transformations match the same pair, all group labels are
/// kept on the cell, joined by `/`.
///
/// With `directed = false` both cells (i, j) and (j, i) of a matched pair are
/// set and the declared transformation directions are ignored. With
/// `directed = true` a cell is set only when the sign of the observed
/// difference agrees with the transformation's direction, `Increase` pointing
/// from the lighter to the heavier partner.
///
/// Output layers: `binary` (1 where any transformation matched),
/// `transformation` (joined group labels, empty where unmatched) and
/// `mass_difference` (signed observed difference, NaN where unmatched).
/// The pairwise scan is parallelized over rows; every pair's outcome is
/// independent, so the result does not depend on work partitioning.
///
/// # Arguments
///
/// * `features` - ordered feature set, unique identifiers, finite positive m/z
/// * `transformations` - non-empty transformation catalog
/// * `tolerance_ppm` - positive matching tolerance in parts per million
/// * `directed` - whether to respect transformation directions
///
/// # Examples
///
/// ```
/// use massnet::algorithm::structural::structural_adjacency;
/// use massnet::chemistry::transformations::Transformation;
/// use massnet::data::feature::Feature;
///
/// let features = vec![Feature::new("F1", 100.0), Feature::new("F2", 115.9949)];
/// let catalog = vec![Transformation::new("Hydroxylation (-H)", "O", 15.9949146221)];
///
/// let adjacency = structural_adjacency(&features, &catalog, 10.0, false).unwrap();
/// let binary = adjacency.binary().unwrap();
/// assert_eq!(binary[(0, 1)], 1.0);
/// assert_eq!(binary[(1, 0)], 1.0);
/// ```
pub fn structural_adjacency(
    features: &[Feature],
    transformations: &[Transformation],
    tolerance_ppm: f64,
    directed: bool,
) -> Result<AdjacencyMatrix, NetworkError> {
    validate_features(features)?;
    validate_transformations(transformations)?;
    if !tolerance_ppm.is_finite() || tolerance_ppm <= 0.0 {
        return Err(NetworkError::InvalidInput(format!(
            "tolerance must be a positive ppm value, got {}",
            tolerance_ppm
        )));
    }

    let n = features.len();
    debug!(
        "structural adjacency: {} features, {} transformations, {} ppm, directed: {}",
        n,
        transformations.len(),
        tolerance_ppm,
        directed
    );

    let rows: Vec<Vec<MatchedCell>> = (0..n)
        .into_par_iter()
        .map(|row| scan_row(row, features, transformations, tolerance_ppm, directed))
        .collect();

    let mut binary = DMatrix::zeros(n, n);
    let mut labels = DMatrix::from_element(n, n, String::new());
    let mut mass_difference = DMatrix::from_element(n, n, f64::NAN);
    let mut matched_cells = 0usize;
    for (row, cells) in rows.into_iter().enumerate() {
        for cell in cells {
            binary[(row, cell.col)] = 1.0;
            labels[(row, cell.col)] = cell.labels;
            mass_difference[(row, cell.col)] = cell.observed;
            matched_cells += 1;
        }
    }
    debug!("structural adjacency: {} matched cells", matched_cells);

    let ids = features.iter().map(|feature| feature.id.clone()).collect();
    let mut layers = BTreeMap::new();
    layers.insert("binary".to_string(), Layer::Numeric(binary));
    layers.insert("transformation".to_string(), Layer::Label(labels));
    layers.insert("mass_difference".to_string(), Layer::Numeric(mass_difference));

    AdjacencyMatrix::new(ids, layers, MatrixKind::Structural, directed, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::transformations::default_transformations;

    const HYDROXYLATION: f64 = 15.9949146221;
    const MALONYL: f64 = 86.0003939305;

    #[test]
    fn test_single_transformation_match() {
        let features = vec![Feature::new("F1", 100.0), Feature::new("F2", 115.9949)];
        let catalog = vec![Transformation::new("Hydroxylation (-H)", "O", HYDROXYLATION)];

        let adjacency = structural_adjacency(&features, &catalog, 10.0, false).unwrap();
        let binary = adjacency.binary().unwrap();
        let labels = adjacency.label_layer("transformation").unwrap();
        let diff = adjacency.numeric_layer("mass_difference").unwrap();

        assert_eq!(binary[(0, 1)], 1.0);
        assert_eq!(labels[(0, 1)], "Hydroxylation (-H)");
        assert!((diff[(0, 1)] - 15.9949).abs() < 1e-6);
        assert!((diff[(1, 0)] + 15.9949).abs() < 1e-6);
    }

    #[test]
    fn test_tight_tolerance_rejects_offset_mass() {
        // Observed difference off by 0.01, far outside 1 ppm of ~116.
        let features = vec![Feature::new("F1", 100.0), Feature::new("F2", 116.0049)];
        let catalog = vec![Transformation::new("Hydroxylation (-H)", "O", HYDROXYLATION)];

        let adjacency = structural_adjacency(&features, &catalog, 1.0, false).unwrap();
        let binary = adjacency.binary().unwrap();
        assert_eq!(binary[(0, 1)], 0.0);
        assert_eq!(binary[(1, 0)], 0.0);
    }

    #[test]
    fn test_matches_brute_force_reference() {
        let features = vec![
            Feature::new("F1", 100.0),
            Feature::new("F2", 115.9949),
            Feature::new("F3", 201.9953),
            Feature::new("F4", 250.1),
        ];
        let catalog = default_transformations();
        let tolerance_ppm = 10.0;

        let adjacency = structural_adjacency(&features, &catalog, tolerance_ppm, false).unwrap();
        let binary = adjacency.binary().unwrap();

        for i in 0..features.len() {
            for j in 0..features.len() {
                if i == j {
                    assert_eq!(binary[(i, j)], 0.0);
                    continue;
                }
                let observed = (features[j].mz - features[i].mz).abs();
                let tolerance =
                    features[i].mz.max(features[j].mz) * tolerance_ppm / 1e6;
                let expected = catalog
                    .iter()
                    .any(|t| (observed - t.mass).abs() <= tolerance);
                assert_eq!(binary[(i, j)] == 1.0, expected, "cell ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_undirected_symmetry_of_labels() {
        let features = vec![
            Feature::new("F1", 100.0),
            Feature::new("F2", 115.9949),
            Feature::new("F3", 201.9953),
        ];
        let catalog = default_transformations();

        let adjacency = structural_adjacency(&features, &catalog, 10.0, false).unwrap();
        let binary = adjacency.binary().unwrap();
        let labels = adjacency.label_layer("transformation").unwrap();

        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(binary[(i, j)], binary[(j, i)]);
                assert_eq!(labels[(i, j)], labels[(j, i)]);
            }
        }
    }

    #[test]
    fn test_multiple_matches_keep_all_labels() {
        let features = vec![Feature::new("F1", 100.0), Feature::new("F2", 115.9949)];
        let catalog = vec![
            Transformation::new("Hydroxylation (-H)", "O", HYDROXYLATION),
            Transformation::new("Oxidation", "O", HYDROXYLATION),
        ];

        let adjacency = structural_adjacency(&features, &catalog, 10.0, false).unwrap();
        let labels = adjacency.label_layer("transformation").unwrap();
        assert_eq!(labels[(0, 1)], "Hydroxylation (-H)/Oxidation");
    }

    #[test]
    fn test_directed_polarity() {
        let features = vec![Feature::new("F1", 100.0), Feature::new("F2", 115.9949)];
        let forward = Transformation::new("Hydroxylation (-H)", "O", HYDROXYLATION)
            .with_direction(RtDirection::Increase);
        let reverse = Transformation::new("Dehydroxylation", "O", HYDROXYLATION)
            .with_direction(RtDirection::Decrease);

        let adjacency =
            structural_adjacency(&features, &[forward, reverse], 10.0, true).unwrap();
        let binary = adjacency.binary().unwrap();
        let labels = adjacency.label_layer("transformation").unwrap();

        // F2 is heavier: the increase edge points F1 -> F2, the decrease
        // edge F2 -> F1.
        assert_eq!(binary[(0, 1)], 1.0);
        assert_eq!(binary[(1, 0)], 1.0);
        assert_eq!(labels[(0, 1)], "Hydroxylation (-H)");
        assert_eq!(labels[(1, 0)], "Dehydroxylation");
        assert!(adjacency.directed());
    }

    #[test]
    fn test_chain_summary() {
        let features = vec![
            Feature::new("F1", 100.0),
            Feature::new("F2", 100.0 + HYDROXYLATION),
            Feature::new("F3", 100.0 + HYDROXYLATION + MALONYL),
        ];
        let catalog = default_transformations();

        let adjacency = structural_adjacency(&features, &catalog, 5.0, false).unwrap();
        let summary = adjacency.transformation_summary().unwrap();

        assert_eq!(summary.get("Hydroxylation (-H)"), Some(&1));
        assert_eq!(summary.get("Malonyl group (-H2O)"), Some(&1));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let catalog = vec![Transformation::new("Hydroxylation (-H)", "O", HYDROXYLATION)];
        let good = vec![Feature::new("F1", 100.0), Feature::new("F2", 115.9949)];

        let duplicate = vec![Feature::new("F1", 100.0), Feature::new("F1", 115.9949)];
        assert!(matches!(
            structural_adjacency(&duplicate, &catalog, 10.0, false),
            Err(NetworkError::InvalidInput(_))
        ));

        let non_finite = vec![Feature::new("F1", f64::NAN), Feature::new("F2", 115.9949)];
        assert!(matches!(
            structural_adjacency(&non_finite, &catalog, 10.0, false),
            Err(NetworkError::InvalidInput(_))
        ));

        assert!(matches!(
            structural_adjacency(&good, &catalog, 0.0, false),
            Err(NetworkError::InvalidInput(_))
        ));

        assert!(matches!(
            structural_adjacency(&good, &[], 10.0, false),
            Err(NetworkError::InvalidInput(_))
        ));
    }
}
