use std::collections::BTreeMap;

use log::debug;
use nalgebra::DMatrix;

use crate::data::adjacency::{AdjacencyMatrix, Layer, MatrixKind};
use crate::error::NetworkError;

/// Merges a structural and a statistical adjacency matrix into one combined
/// object.
///
/// The `combine_binary` layer is the logical OR of the two inputs'
/// connectivity layers: an edge present in either source survives. Every
/// layer of both inputs is preserved under a key prefixed with its source's
/// matrix kind (`structural_binary`, `statistical_pearson_coef`, ...) for
/// traceability, which also makes the operation commutative. Vertex sets are
/// not auto-aligned: the inputs must share the identical identifier ordering,
/// anything else fails with `DimensionMismatch`.
///
/// The combined object is directed when either input is, and carries the
/// structural input's `rt_corrected` flag.
///
/// # Examples
///
/// ```
/// use massnet::algorithm::combine::combine;
/// use massnet::algorithm::statistical::{
///     apply_threshold, statistical_adjacency, CmpOp, CorrelationModel,
///     PredicateClause, ThresholdPredicate,
/// };
/// use massnet::algorithm::structural::structural_adjacency;
/// use massnet::chemistry::transformations::Transformation;
/// use massnet::data::feature::Feature;
///
/// let features = vec![
///     Feature::new("F1", 100.0).with_intensities(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
///     Feature::new("F2", 115.9949).with_intensities(vec![2.0, 4.0, 6.0, 8.0, 10.0]),
/// ];
/// let catalog = vec![Transformation::new("Hydroxylation (-H)", "O", 15.9949146221)];
///
/// let structural = structural_adjacency(&features, &catalog, 10.0, false).unwrap();
/// let statistical = apply_threshold(
///     &statistical_adjacency(&features, &[CorrelationModel::Pearson]).unwrap(),
///     &ThresholdPredicate::new(vec![
///         PredicateClause::new("pearson_coef", CmpOp::Gt, 0.6).absolute(),
///         PredicateClause::new("pearson_pvalue", CmpOp::Lt, 0.05),
///     ]),
/// )
/// .unwrap();
///
/// let combined = combine(&structural, &statistical).unwrap();
/// assert_eq!(combined.binary().unwrap()[(0, 1)], 1.0);
/// assert!(combined.layer("structural_transformation").is_some());
/// assert!(combined.layer("statistical_pearson_coef").is_some());
/// ```
pub fn combine(
    structural: &AdjacencyMatrix,
    statistical: &AdjacencyMatrix,
) -> Result<AdjacencyMatrix, NetworkError> {
    if structural.ids() != statistical.ids() {
        return Err(NetworkError::DimensionMismatch(
            "inputs do not share the same feature identifier ordering".to_string(),
        ));
    }
    if structural.kind() == statistical.kind() {
        return Err(NetworkError::InvalidInput(format!(
            "inputs must be of distinct matrix kinds, both are {}",
            structural.kind()
        )));
    }

    let binary_a = structural.binary()?;
    let binary_b = statistical.binary()?;
    let n = structural.n();

    let mut combine_binary = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            if i != j && (binary_a[(i, j)] != 0.0 || binary_b[(i, j)] != 0.0) {
                combine_binary[(i, j)] = 1.0;
            }
        }
    }

    let mut layers = BTreeMap::new();
    for source in [structural, statistical] {
        let prefix = source.kind().as_str();
        for (name, layer) in source.layers() {
            layers.insert(format!("{}_{}", prefix, name), layer.clone());
        }
    }
    layers.insert("combine_binary".to_string(), Layer::Numeric(combine_binary));

    let rt_corrected = if structural.kind() == MatrixKind::Structural {
        structural.rt_corrected()
    } else {
        statistical.rt_corrected()
    };
    let combined = AdjacencyMatrix::new(
        structural.ids().to_vec(),
        layers,
        MatrixKind::Combined,
        structural.directed() || statistical.directed(),
        rt_corrected,
    )?;
    debug!("combined adjacency: {} edges", combined.edge_count()?);
    Ok(combined)
}
