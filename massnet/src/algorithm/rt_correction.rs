use std::collections::HashMap;

use log::debug;

use crate::chemistry::transformations::{RtDirection, Transformation};
use crate::data::adjacency::{AdjacencyMatrix, Layer, MatrixKind, LABEL_DELIMITER};
use crate::data::feature::Feature;
use crate::error::NetworkError;

/// Decides whether one matched label survives the retention-time check for a
/// cell with the given observed mass difference and retention-time difference.
///
/// The declared direction is oriented by the mass difference: for a cell
/// whose column feature is the heavier partner, `Increase` expects the
/// retention-time difference to be positive; for the reverse orientation the
/// expectation flips. A zero retention-time difference fails a constrained
/// direction.
fn label_survives(direction: RtDirection, observed_mass_diff: f64, rt_diff: f64) -> bool {
    let expect_positive = match direction {
        RtDirection::Increase => observed_mass_diff > 0.0,
        RtDirection::Decrease => observed_mass_diff < 0.0,
        RtDirection::Unconstrained => return true,
    };
    if expect_positive {
        rt_diff > 0.0
    } else {
        rt_diff < 0.0
    }
}

/// Post-filters a structural adjacency matrix using the expected
/// retention-time direction of each matched transformation.
///
/// For every cell with `binary = 1` the matched labels are re-checked: when
/// both endpoints carry a retention time and a label's transformation
/// declares a constrained direction, the sign of `rt[j] - rt[i]` must agree
/// with that direction oriented by the cell's observed mass difference. A
/// cell survives when any of its labels passes or is unconstrained. Cells
/// where either endpoint lacks a retention time are kept, missing data never
/// eliminates a structurally valid edge.
///
/// Returns a fresh object with all layers copied and a rewritten `binary`
/// layer, `rt_corrected = true`; the input object is untouched. The filter is
/// monotonic, it never adds an edge. Applying it to an already corrected
/// matrix fails with `PreconditionViolation`, which prevents silent double
/// filtering.
///
/// # Arguments
///
/// * `adjacency` - an uncorrected structural adjacency matrix
/// * `features` - the feature set the matrix was built from, same order
/// * `transformations` - catalog holding the declared directions
///
/// # Examples
///
/// ```
/// use massnet::algorithm::rt_correction::rt_correction;
/// use massnet::algorithm::structural::structural_adjacency;
/// use massnet::chemistry::transformations::{RtDirection, Transformation};
/// use massnet::data::feature::Feature;
///
/// let features = vec![
///     Feature::new("F1", 100.0).with_rt(60.0),
///     Feature::new("F2", 115.9949).with_rt(45.0),
/// ];
/// // Hydroxylation makes the metabolite more polar, it elutes earlier on
/// // reversed phase: heavier partner expected at lower retention time.
/// let catalog = vec![
///     Transformation::new("Hydroxylation (-H)", "O", 15.9949146221)
///         .with_direction(RtDirection::Decrease),
/// ];
///
/// let raw = structural_adjacency(&features, &catalog, 10.0, false).unwrap();
/// let corrected = rt_correction(&raw, &features, &catalog).unwrap();
/// assert!(corrected.rt_corrected());
/// assert_eq!(corrected.binary().unwrap()[(0, 1)], 1.0);
/// ```
pub fn rt_correction(
    adjacency: &AdjacencyMatrix,
    features: &[Feature],
    transformations: &[Transformation],
) -> Result<AdjacencyMatrix, NetworkError> {
    if adjacency.kind() != MatrixKind::Structural {
        return Err(NetworkError::PreconditionViolation(format!(
            "retention-time correction requires a structural matrix, got {}",
            adjacency.kind()
        )));
    }
    if adjacency.rt_corrected() {
        return Err(NetworkError::PreconditionViolation(
            "matrix is already retention-time corrected".to_string(),
        ));
    }
    if features.len() != adjacency.n()
        || features
            .iter()
            .zip(adjacency.ids())
            .any(|(feature, id)| feature.id != *id)
    {
        return Err(NetworkError::DimensionMismatch(
            "feature identifiers do not match the matrix ordering".to_string(),
        ));
    }

    let directions: HashMap<&str, RtDirection> = transformations
        .iter()
        .map(|t| (t.group.as_str(), t.direction))
        .collect();

    let labels = adjacency.label_layer("transformation")?;
    let mass_difference = adjacency.numeric_layer("mass_difference")?;
    let mut binary = adjacency.binary()?.clone();
    let n = adjacency.n();

    let mut removed = 0usize;
    for i in 0..n {
        for j in 0..n {
            if i == j || binary[(i, j)] == 0.0 {
                continue;
            }
            let (rt_i, rt_j) = match (features[i].rt, features[j].rt) {
                (Some(a), Some(b)) => (a, b),
                // Missing retention time cannot falsify the edge, keep it.
                _ => continue,
            };
            let rt_diff = rt_j - rt_i;
            let observed = mass_difference[(i, j)];

            let keep = labels[(i, j)].split(LABEL_DELIMITER).any(|group| {
                match directions.get(group) {
                    Some(direction) => label_survives(*direction, observed, rt_diff),
                    // Label without a catalog entry cannot be checked, keep it.
                    None => true,
                }
            });
            if !keep {
                binary[(i, j)] = 0.0;
                removed += 1;
            }
        }
    }
    debug!("retention-time correction removed {} cells", removed);

    let mut layers = adjacency.layers().clone();
    layers.insert("binary".to_string(), Layer::Numeric(binary));
    AdjacencyMatrix::new(
        adjacency.ids().to_vec(),
        layers,
        MatrixKind::Structural,
        adjacency.directed(),
        true,
    )
}
