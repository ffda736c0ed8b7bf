use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Represents one row of a metabolomics peak table: a detected chemical
/// entity characterized by its m/z value and, optionally, a retention time
/// and a vector of per-sample intensities.
///
/// The intensities are opaque to the structural network construction and are
/// only consumed by the statistical (correlation) adjacency builder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub mz: f64,
    pub rt: Option<f64>,
    pub intensities: Vec<f64>,
}

impl Feature {
    /// Creates a new `Feature` with no retention time and no intensities.
    ///
    /// # Arguments
    ///
    /// * `id` - unique feature identifier
    /// * `mz` - mass-to-charge value, used as the mass proxy
    ///
    /// # Examples
    ///
    /// ```
    /// use massnet::data::feature::Feature;
    ///
    /// let feature = Feature::new("F1", 100.0);
    /// assert_eq!(feature.id, "F1");
    /// assert_eq!(feature.mz, 100.0);
    /// assert!(feature.rt.is_none());
    /// ```
    pub fn new(id: impl Into<String>, mz: f64) -> Self {
        Feature { id: id.into(), mz, rt: None, intensities: Vec::new() }
    }

    /// Attaches a retention time in seconds.
    pub fn with_rt(mut self, rt: f64) -> Self {
        self.rt = Some(rt);
        self
    }

    /// Attaches per-sample intensities.
    pub fn with_intensities(mut self, intensities: Vec<f64>) -> Self {
        self.intensities = intensities;
        self
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.rt {
            Some(rt) => write!(f, "Feature(id: {}, mz: {}, rt: {})", self.id, self.mz, rt),
            None => write!(f, "Feature(id: {}, mz: {})", self.id, self.mz),
        }
    }
}

/// Checks the feature-set invariants shared by all network builders:
/// at least one feature, finite positive m/z values and unique identifiers.
///
/// # Examples
///
/// ```
/// use massnet::data::feature::{Feature, validate_features};
///
/// let features = vec![Feature::new("F1", 100.0), Feature::new("F2", 116.0)];
/// assert!(validate_features(&features).is_ok());
///
/// let duplicated = vec![Feature::new("F1", 100.0), Feature::new("F1", 116.0)];
/// assert!(validate_features(&duplicated).is_err());
/// ```
pub fn validate_features(features: &[Feature]) -> Result<(), NetworkError> {
    if features.is_empty() {
        return Err(NetworkError::InvalidInput("feature set is empty".to_string()));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(features.len());
    for feature in features {
        if !feature.mz.is_finite() || feature.mz <= 0.0 {
            return Err(NetworkError::InvalidInput(format!(
                "feature {} has non-finite or non-positive mz: {}",
                feature.id, feature.mz
            )));
        }
        if !seen.insert(feature.id.as_str()) {
            return Err(NetworkError::InvalidInput(format!(
                "duplicate feature identifier: {}",
                feature.id
            )));
        }
    }

    Ok(())
}
