use std::cmp::Ordering;
use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::data::adjacency::{AdjacencyMatrix, Layer, MatrixKind};
use crate::data::feature::{validate_features, Feature};
use crate::error::NetworkError;

/// Correlation model used for the statistical adjacency layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationModel {
    Pearson,
    Spearman,
}

impl CorrelationModel {
    pub fn coefficient_layer(&self) -> &'static str {
        match self {
            CorrelationModel::Pearson => "pearson_coef",
            CorrelationModel::Spearman => "spearman_coef",
        }
    }

    pub fn pvalue_layer(&self) -> &'static str {
        match self {
            CorrelationModel::Pearson => "pearson_pvalue",
            CorrelationModel::Spearman => "spearman_pvalue",
        }
    }
}

/// Comparison operator of one predicate clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            CmpOp::Gt => value > threshold,
            CmpOp::Ge => value >= threshold,
            CmpOp::Lt => value < threshold,
            CmpOp::Le => value <= threshold,
        }
    }
}

/// One clause of a threshold predicate: compares a named numeric layer
/// (optionally its absolute value) against a threshold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredicateClause {
    pub layer: String,
    pub op: CmpOp,
    pub threshold: f64,
    pub absolute: bool,
}

impl PredicateClause {
    pub fn new(layer: impl Into<String>, op: CmpOp, threshold: f64) -> Self {
        PredicateClause { layer: layer.into(), op, threshold, absolute: false }
    }

    /// Compare `abs(layer)` instead of the raw value.
    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }
}

/// A conjunction of clauses evaluated per cell, the structured equivalent of
/// a filter expression like `abs(pearson_coef) > 0.6 & pearson_pvalue < 0.05`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdPredicate {
    pub clauses: Vec<PredicateClause>,
}

impl ThresholdPredicate {
    pub fn new(clauses: Vec<PredicateClause>) -> Self {
        ThresholdPredicate { clauses }
    }
}

/// Pearson product-moment correlation of two equal-length vectors.
/// Returns NaN when either vector has zero variance.
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let m = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / m;
    let mean_y = y.iter().sum::<f64>() / m;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    covariance / (var_x * var_y).sqrt()
}

/// Fractional ranks with average ranks for ties, as used by the Spearman
/// model.
fn ranks(values: &[f64]) -> Vec<f64> {
    let m = values.len();
    let order: Vec<usize> = (0..m)
        .sorted_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal))
        .collect();

    let mut ranked = vec![0.0; m];
    let mut start = 0;
    while start < m {
        let mut end = start + 1;
        while end < m && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let average = (start + end - 1) as f64 / 2.0 + 1.0;
        for &index in &order[start..end] {
            ranked[index] = average;
        }
        start = end;
    }
    ranked
}

/// Two-sided p-value of a correlation coefficient under the t-distribution
/// with `samples - 2` degrees of freedom.
fn correlation_pvalue(coefficient: f64, samples: usize) -> f64 {
    if !coefficient.is_finite() {
        return f64::NAN;
    }
    let denominator = 1.0 - coefficient * coefficient;
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    let freedom = (samples - 2) as f64;
    let t = coefficient.abs() * (freedom / denominator).sqrt();
    match StudentsT::new(0.0, 1.0, freedom) {
        Ok(distribution) => 2.0 * (1.0 - distribution.cdf(t)),
        Err(_) => f64::NAN,
    }
}

/// Builds a statistical adjacency matrix from pairwise correlation of the
/// feature intensity vectors.
///
/// For each requested model a coefficient layer and a two-sided p-value
/// layer are produced (`pearson_coef` / `pearson_pvalue`,
/// `spearman_coef` / `spearman_pvalue`), with p-values taken from the
/// Student's t distribution. The returned object carries an all-zero
/// `binary` layer; connectivity is established afterwards with
/// [`apply_threshold`]. `kind = statistical`, undirected.
///
/// Requires every feature to carry the same number of intensities, at least
/// three samples, and a non-empty model list; fails with `InvalidInput`
/// otherwise.
///
/// # Examples
///
/// ```
/// use massnet::algorithm::statistical::{statistical_adjacency, CorrelationModel};
/// use massnet::data::feature::Feature;
///
/// let features = vec![
///     Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0, 4.0]),
///     Feature::new("F2", 116.0).with_intensities(vec![2.0, 4.0, 6.0, 8.0]),
/// ];
/// let adjacency =
///     statistical_adjacency(&features, &[CorrelationModel::Pearson]).unwrap();
/// let coef = adjacency.numeric_layer("pearson_coef").unwrap();
/// assert!((coef[(0, 1)] - 1.0).abs() < 1e-12);
/// ```
pub fn statistical_adjacency(
    features: &[Feature],
    models: &[CorrelationModel],
) -> Result<AdjacencyMatrix, NetworkError> {
    validate_features(features)?;
    if models.is_empty() {
        return Err(NetworkError::InvalidInput("no correlation models requested".to_string()));
    }
    let samples = features[0].intensities.len();
    if samples < 3 {
        return Err(NetworkError::InvalidInput(format!(
            "correlation requires at least 3 samples, got {}",
            samples
        )));
    }
    if features.iter().any(|f| f.intensities.len() != samples) {
        return Err(NetworkError::InvalidInput(
            "features carry intensity vectors of different lengths".to_string(),
        ));
    }

    let n = features.len();
    debug!("statistical adjacency: {} features, {} samples, {} models", n, samples, models.len());

    let mut layers = BTreeMap::new();
    for model in models.iter().unique() {
        let series: Vec<Vec<f64>> = match model {
            CorrelationModel::Pearson => {
                features.iter().map(|f| f.intensities.clone()).collect()
            }
            CorrelationModel::Spearman => {
                features.iter().map(|f| ranks(&f.intensities)).collect()
            }
        };

        let rows: Vec<Vec<(f64, f64)>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            return (0.0, f64::NAN);
                        }
                        let coefficient = pearson(&series[i], &series[j]);
                        (coefficient, correlation_pvalue(coefficient, samples))
                    })
                    .collect()
            })
            .collect();

        let mut coefficients = DMatrix::zeros(n, n);
        let mut pvalues = DMatrix::from_element(n, n, f64::NAN);
        for (i, row) in rows.into_iter().enumerate() {
            for (j, (coefficient, pvalue)) in row.into_iter().enumerate() {
                coefficients[(i, j)] = coefficient;
                pvalues[(i, j)] = pvalue;
            }
        }
        layers.insert(model.coefficient_layer().to_string(), Layer::Numeric(coefficients));
        layers.insert(model.pvalue_layer().to_string(), Layer::Numeric(pvalues));
    }
    layers.insert("binary".to_string(), Layer::Numeric(DMatrix::zeros(n, n)));

    let ids = features.iter().map(|feature| feature.id.clone()).collect();
    AdjacencyMatrix::new(ids, layers, MatrixKind::Statistical, false, false)
}

/// Sets the `binary` layer of a statistical adjacency matrix from a
/// structured threshold predicate: a cell becomes 1 exactly where every
/// clause holds. Cells with NaN in a referenced layer never pass, and the
/// diagonal stays 0.
///
/// Returns a fresh object; the input is untouched. Fails with
/// `PreconditionViolation` on a non-statistical input and with
/// `InvalidInput` on an empty predicate or an unknown layer name.
///
/// # Examples
///
/// ```
/// use massnet::algorithm::statistical::{
///     apply_threshold, statistical_adjacency, CmpOp, CorrelationModel,
///     PredicateClause, ThresholdPredicate,
/// };
/// use massnet::data::feature::Feature;
///
/// let features = vec![
///     Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
///     Feature::new("F2", 116.0).with_intensities(vec![2.0, 4.0, 6.0, 8.0, 10.0]),
/// ];
/// let raw = statistical_adjacency(&features, &[CorrelationModel::Pearson]).unwrap();
///
/// // abs(pearson_coef) > 0.6 & pearson_pvalue < 0.05
/// let predicate = ThresholdPredicate::new(vec![
///     PredicateClause::new("pearson_coef", CmpOp::Gt, 0.6).absolute(),
///     PredicateClause::new("pearson_pvalue", CmpOp::Lt, 0.05),
/// ]);
/// let thresholded = apply_threshold(&raw, &predicate).unwrap();
/// assert_eq!(thresholded.binary().unwrap()[(0, 1)], 1.0);
/// ```
pub fn apply_threshold(
    adjacency: &AdjacencyMatrix,
    predicate: &ThresholdPredicate,
) -> Result<AdjacencyMatrix, NetworkError> {
    if adjacency.kind() != MatrixKind::Statistical {
        return Err(NetworkError::PreconditionViolation(format!(
            "threshold predicates apply to statistical matrices, got {}",
            adjacency.kind()
        )));
    }
    if predicate.clauses.is_empty() {
        return Err(NetworkError::InvalidInput("threshold predicate has no clauses".to_string()));
    }
    let referenced: Vec<&DMatrix<f64>> = predicate
        .clauses
        .iter()
        .map(|clause| adjacency.numeric_layer(&clause.layer))
        .collect::<Result<_, _>>()?;

    let n = adjacency.n();
    let mut binary = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let passes = predicate.clauses.iter().zip(referenced.iter()).all(|(clause, layer)| {
                let mut value = layer[(i, j)];
                if clause.absolute {
                    value = value.abs();
                }
                clause.op.holds(value, clause.threshold)
            });
            if passes {
                binary[(i, j)] = 1.0;
            }
        }
    }

    let mut layers = adjacency.layers().clone();
    layers.insert("binary".to_string(), Layer::Numeric(binary));
    AdjacencyMatrix::new(
        adjacency.ids().to_vec(),
        layers,
        MatrixKind::Statistical,
        adjacency.directed(),
        adjacency.rt_corrected(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlated_features() -> Vec<Feature> {
        vec![
            Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            Feature::new("F2", 116.0).with_intensities(vec![2.0, 4.0, 6.0, 8.0, 10.0]),
            Feature::new("F3", 150.0).with_intensities(vec![5.0, 1.0, 4.0, 2.0, 3.0]),
        ]
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let adjacency =
            statistical_adjacency(&correlated_features(), &[CorrelationModel::Pearson]).unwrap();
        let coef = adjacency.numeric_layer("pearson_coef").unwrap();
        let pvalue = adjacency.numeric_layer("pearson_pvalue").unwrap();

        assert!((coef[(0, 1)] - 1.0).abs() < 1e-12);
        assert!(pvalue[(0, 1)] < 1e-6);
        assert!(coef[(0, 2)].abs() < 1.0);
        assert_eq!(coef[(0, 0)], 0.0);
        assert!(pvalue[(0, 0)].is_nan());
    }

    #[test]
    fn test_pearson_anticorrelation_sign() {
        let features = vec![
            Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0, 4.0]),
            Feature::new("F2", 116.0).with_intensities(vec![8.0, 6.0, 4.0, 2.0]),
        ];
        let adjacency =
            statistical_adjacency(&features, &[CorrelationModel::Pearson]).unwrap();
        let coef = adjacency.numeric_layer("pearson_coef").unwrap();
        assert!((coef[(0, 1)] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_monotonic_nonlinear() {
        let features = vec![
            Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            Feature::new("F2", 116.0).with_intensities(vec![1.0, 8.0, 27.0, 64.0, 125.0]),
        ];
        let adjacency =
            statistical_adjacency(&features, &[CorrelationModel::Spearman]).unwrap();
        let coef = adjacency.numeric_layer("spearman_coef").unwrap();
        assert!((coef[(0, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ranks_average_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 20.0, 30.0]), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_threshold_predicate_sets_binary() {
        let adjacency =
            statistical_adjacency(&correlated_features(), &[CorrelationModel::Pearson]).unwrap();
        let predicate = ThresholdPredicate::new(vec![
            PredicateClause::new("pearson_coef", CmpOp::Gt, 0.6).absolute(),
            PredicateClause::new("pearson_pvalue", CmpOp::Lt, 0.05),
        ]);
        let thresholded = apply_threshold(&adjacency, &predicate).unwrap();
        let binary = thresholded.binary().unwrap();

        assert_eq!(binary[(0, 1)], 1.0);
        assert_eq!(binary[(1, 0)], 1.0);
        assert_eq!(binary[(0, 2)], 0.0);
        // The unthresholded input keeps its all-zero binary layer.
        assert_eq!(adjacency.binary().unwrap()[(0, 1)], 0.0);
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let adjacency =
            statistical_adjacency(&correlated_features(), &[CorrelationModel::Pearson]).unwrap();
        let predicate = ThresholdPredicate::new(vec![PredicateClause::new(
            "spearman_coef",
            CmpOp::Gt,
            0.6,
        )]);
        assert!(matches!(
            apply_threshold(&adjacency, &predicate),
            Err(NetworkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_too_few_samples_rejected() {
        let features = vec![
            Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0]),
            Feature::new("F2", 116.0).with_intensities(vec![2.0, 4.0]),
        ];
        assert!(matches!(
            statistical_adjacency(&features, &[CorrelationModel::Pearson]),
            Err(NetworkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ragged_intensities_rejected() {
        let features = vec![
            Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0]),
            Feature::new("F2", 116.0).with_intensities(vec![2.0, 4.0]),
        ];
        assert!(matches!(
            statistical_adjacency(&features, &[CorrelationModel::Pearson]),
            Err(NetworkError::InvalidInput(_))
        ));
    }
}
