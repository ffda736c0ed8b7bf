use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fmt::{Display, Formatter};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Delimiter joining multiple transformation labels assigned to one cell.
pub const LABEL_DELIMITER: char = '/';

/// Distinguishes how an adjacency matrix was built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixKind {
    Structural,
    Statistical,
    Combined,
}

impl MatrixKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixKind::Structural => "structural",
            MatrixKind::Statistical => "statistical",
            MatrixKind::Combined => "combined",
        }
    }
}

impl Display for MatrixKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One named layer of an adjacency matrix, either numeric (connectivity,
/// mass differences, correlation coefficients, p-values) or label-valued
/// (matched transformation groups).
#[derive(Clone, Debug)]
pub enum Layer {
    Numeric(DMatrix<f64>),
    Label(DMatrix<String>),
}

impl Layer {
    pub fn nrows(&self) -> usize {
        match self {
            Layer::Numeric(m) => m.nrows(),
            Layer::Label(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Layer::Numeric(m) => m.ncols(),
            Layer::Label(m) => m.ncols(),
        }
    }
}

/// The value of one layer at one cell, as carried into edge-list rows.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerValue {
    Numeric(f64),
    Label(String),
}

/// One row of the tabular edge-list representation: a non-zero cell of the
/// binary layer together with every layer's value at that cell.
#[derive(Clone, Debug)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub values: BTreeMap<String, LayerValue>,
}

/// A multi-layer square matrix over a fixed feature ordering, representing a
/// feature-association graph plus auxiliary per-edge attributes.
///
/// All layers share the same row/column ordering given by `ids`. Objects are
/// never mutated in place: refinement and combination each produce a new
/// object, preserving the original as an audit trail.
#[derive(Clone, Debug)]
pub struct AdjacencyMatrix {
    ids: Vec<String>,
    layers: BTreeMap<String, Layer>,
    kind: MatrixKind,
    directed: bool,
    rt_corrected: bool,
}

impl AdjacencyMatrix {
    /// Assembles an adjacency matrix from its layers, checking the container
    /// invariants: at least one layer, every layer square with dimensions
    /// equal to the number of identifiers, identifiers unique, and the binary
    /// layer (when present) restricted to {0, 1} with a zero diagonal.
    pub fn new(
        ids: Vec<String>,
        layers: BTreeMap<String, Layer>,
        kind: MatrixKind,
        directed: bool,
        rt_corrected: bool,
    ) -> Result<Self, NetworkError> {
        let n = ids.len();
        if n == 0 {
            return Err(NetworkError::InvalidInput("vertex set is empty".to_string()));
        }
        if layers.is_empty() {
            return Err(NetworkError::InvalidInput("no layers provided".to_string()));
        }
        let mut seen: HashSet<&str> = HashSet::with_capacity(n);
        for id in &ids {
            if !seen.insert(id.as_str()) {
                return Err(NetworkError::InvalidInput(format!(
                    "duplicate vertex identifier: {}",
                    id
                )));
            }
        }
        for (name, layer) in &layers {
            if layer.nrows() != n || layer.ncols() != n {
                return Err(NetworkError::DimensionMismatch(format!(
                    "layer {} is {}x{}, expected {}x{}",
                    name,
                    layer.nrows(),
                    layer.ncols(),
                    n,
                    n
                )));
            }
        }
        let object = AdjacencyMatrix { ids, layers, kind, directed, rt_corrected };
        if let Some(Layer::Numeric(binary)) = object.layers.get(object.binary_layer_name()) {
            for i in 0..n {
                for j in 0..n {
                    let value = binary[(i, j)];
                    if value != 0.0 && value != 1.0 {
                        return Err(NetworkError::InvalidInput(format!(
                            "binary layer entry at ({}, {}) is {}, expected 0 or 1",
                            i, j, value
                        )));
                    }
                    if i == j && value != 0.0 {
                        return Err(NetworkError::InvalidInput(format!(
                            "binary layer has a self-edge at {}",
                            object.ids[i]
                        )));
                    }
                }
            }
        }
        Ok(object)
    }

    pub fn n(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn kind(&self) -> MatrixKind {
        self.kind
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn rt_corrected(&self) -> bool {
        self.rt_corrected
    }

    /// The name of the connectivity layer for this matrix kind,
    /// `combine_binary` for combined matrices and `binary` otherwise.
    pub fn binary_layer_name(&self) -> &'static str {
        match self.kind {
            MatrixKind::Combined => "combine_binary",
            _ => "binary",
        }
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(|name| name.as_str())
    }

    pub fn layers(&self) -> &BTreeMap<String, Layer> {
        &self.layers
    }

    /// Returns the numeric layer with the given name, failing with
    /// `InvalidInput` if it is absent or label-valued.
    pub fn numeric_layer(&self, name: &str) -> Result<&DMatrix<f64>, NetworkError> {
        match self.layers.get(name) {
            Some(Layer::Numeric(matrix)) => Ok(matrix),
            Some(Layer::Label(_)) => Err(NetworkError::InvalidInput(format!(
                "layer {} is label-valued, expected numeric",
                name
            ))),
            None => Err(NetworkError::InvalidInput(format!("no layer named {}", name))),
        }
    }

    /// Returns the label layer with the given name, failing with
    /// `InvalidInput` if it is absent or numeric.
    pub fn label_layer(&self, name: &str) -> Result<&DMatrix<String>, NetworkError> {
        match self.layers.get(name) {
            Some(Layer::Label(matrix)) => Ok(matrix),
            Some(Layer::Numeric(_)) => Err(NetworkError::InvalidInput(format!(
                "layer {} is numeric, expected label-valued",
                name
            ))),
            None => Err(NetworkError::InvalidInput(format!("no layer named {}", name))),
        }
    }

    /// The connectivity layer of this matrix.
    pub fn binary(&self) -> Result<&DMatrix<f64>, NetworkError> {
        self.numeric_layer(self.binary_layer_name())
    }

    /// The row/column position of a feature identifier.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Reads one layer cell addressed by a source/target identifier pair.
    pub fn value_at(
        &self,
        layer: &str,
        source: &str,
        target: &str,
    ) -> Result<LayerValue, NetworkError> {
        let i = self.position_of(source).ok_or_else(|| {
            NetworkError::InvalidInput(format!("unknown feature identifier: {}", source))
        })?;
        let j = self.position_of(target).ok_or_else(|| {
            NetworkError::InvalidInput(format!("unknown feature identifier: {}", target))
        })?;
        match self.layers.get(layer) {
            Some(Layer::Numeric(m)) => Ok(LayerValue::Numeric(m[(i, j)])),
            Some(Layer::Label(m)) => Ok(LayerValue::Label(m[(i, j)].clone())),
            None => Err(NetworkError::InvalidInput(format!("no layer named {}", layer))),
        }
    }

    /// Counts the non-zero cells of the connectivity layer. For undirected
    /// matrices each unordered edge is counted once.
    pub fn edge_count(&self) -> Result<usize, NetworkError> {
        let binary = self.binary()?;
        let n = self.n();
        let mut count = 0;
        for i in 0..n {
            let start = if self.directed { 0 } else { i + 1 };
            for j in start..n {
                if i != j && binary[(i, j)] != 0.0 {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Converts the matrix to a tabular edge list: one record per non-zero
    /// cell of the connectivity layer, carrying every layer's value at that
    /// cell. Row order is deterministic, row-major over the matrix.
    pub fn to_edge_list(&self) -> Result<Vec<EdgeRecord>, NetworkError> {
        let binary = self.binary()?;
        let n = self.n();
        let mut records = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if i == j || binary[(i, j)] == 0.0 {
                    continue;
                }
                let mut values = BTreeMap::new();
                for (name, layer) in &self.layers {
                    let value = match layer {
                        Layer::Numeric(m) => LayerValue::Numeric(m[(i, j)]),
                        Layer::Label(m) => LayerValue::Label(m[(i, j)].clone()),
                    };
                    values.insert(name.clone(), value);
                }
                records.push(EdgeRecord {
                    source: self.ids[i].clone(),
                    target: self.ids[j].clone(),
                    values,
                });
            }
        }
        Ok(records)
    }

    /// Counts how many edges are attributable to each transformation group,
    /// used for distribution reporting. Cells with multiple assigned labels
    /// contribute to every group they name. For undirected matrices each
    /// unordered edge is counted once.
    pub fn transformation_summary(&self) -> Result<BTreeMap<String, usize>, NetworkError> {
        let label_name = self
            .layer_names()
            .find(|name| *name == "transformation" || name.ends_with("_transformation"))
            .map(|name| name.to_string())
            .ok_or_else(|| {
                NetworkError::InvalidInput("no transformation label layer".to_string())
            })?;
        let labels = self.label_layer(&label_name)?;
        let binary = self.binary()?;
        let n = self.n();

        let mut summary: BTreeMap<String, usize> = BTreeMap::new();
        for i in 0..n {
            let start = if self.directed { 0 } else { i + 1 };
            for j in start..n {
                if i == j || binary[(i, j)] == 0.0 {
                    continue;
                }
                for group in labels[(i, j)].split(LABEL_DELIMITER) {
                    if group.is_empty() {
                        continue;
                    }
                    *summary.entry(group.to_string()).or_insert(0) += 1;
                }
            }
        }
        Ok(summary)
    }
}

impl Display for AdjacencyMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let edges = self.edge_count().unwrap_or(0);
        write!(
            f,
            "AdjacencyMatrix(type: {}, vertices: {}, edges: {}, directed: {}, rt_corrected: {}, layers: [{}])",
            self.kind,
            self.n(),
            edges,
            self.directed,
            self.rt_corrected,
            self.layer_names().collect::<Vec<_>>().join(", ")
        )
    }
}
