use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Expected retention-time behaviour of a transformation, relative to the
/// lighter partner of a matched pair. The same field doubles as the polarity
/// used for directed matching: `Increase` declares the heavier partner as the
/// forward direction, `Decrease` the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RtDirection {
    Increase,
    Decrease,
    Unconstrained,
}

impl RtDirection {
    /// Parses the symbolic catalog notation `"+"`, `"-"` or `"unconstrained"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use massnet::chemistry::transformations::RtDirection;
    ///
    /// assert_eq!(RtDirection::from_symbol("+"), Some(RtDirection::Increase));
    /// assert_eq!(RtDirection::from_symbol("-"), Some(RtDirection::Decrease));
    /// assert_eq!(RtDirection::from_symbol("?"), None);
    /// ```
    pub fn from_symbol(symbol: &str) -> Option<RtDirection> {
        match symbol {
            "+" => Some(RtDirection::Increase),
            "-" => Some(RtDirection::Decrease),
            "unconstrained" => Some(RtDirection::Unconstrained),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RtDirection::Increase => "+",
            RtDirection::Decrease => "-",
            RtDirection::Unconstrained => "unconstrained",
        }
    }
}

impl Display for RtDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A named biochemical modification with a characteristic mass shift.
///
/// The `formula` is informational only, matching is done on the monoisotopic
/// `mass` delta, which is always a positive magnitude.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transformation {
    pub group: String,
    pub formula: String,
    pub mass: f64,
    pub direction: RtDirection,
}

impl Transformation {
    /// Creates a new `Transformation` with an unconstrained retention-time
    /// direction.
    ///
    /// # Arguments
    ///
    /// * `group` - transformation group label, e.g. "Hydroxylation (-H)"
    /// * `formula` - chemical formula of the modification, informational only
    /// * `mass` - monoisotopic mass delta, positive magnitude
    ///
    /// # Examples
    ///
    /// ```
    /// use massnet::chemistry::transformations::Transformation;
    ///
    /// let hydroxylation = Transformation::new("Hydroxylation (-H)", "O", 15.9949146221);
    /// assert_eq!(hydroxylation.mass, 15.9949146221);
    /// ```
    pub fn new(group: impl Into<String>, formula: impl Into<String>, mass: f64) -> Self {
        Transformation {
            group: group.into(),
            formula: formula.into(),
            mass,
            direction: RtDirection::Unconstrained,
        }
    }

    /// Declares an expected retention-time direction.
    pub fn with_direction(mut self, direction: RtDirection) -> Self {
        self.direction = direction;
        self
    }
}

impl Display for Transformation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Transformation(group: {}, formula: {}, mass: {}, direction: {})",
               self.group, self.formula, self.mass, self.direction)
    }
}

/// Built-in catalog of common biochemical mass-difference transformations
/// with exact monoisotopic mass deltas. All entries ship with an
/// unconstrained retention-time direction, callers declare directions via
/// [`Transformation::with_direction`] where chromatographic behaviour is
/// known for their setup.
///
/// # Examples
///
/// ```
/// use massnet::chemistry::transformations::default_transformations;
///
/// let catalog = default_transformations();
/// assert!(catalog.iter().any(|t| t.group == "Hydroxylation (-H)"));
/// assert!(catalog.iter().all(|t| t.mass > 0.0));
/// ```
pub fn default_transformations() -> Vec<Transformation> {
    vec![
        Transformation::new("Hydroxylation (-H)", "O", 15.9949146221),
        Transformation::new("Methylation (-H)", "CH2", 14.0156500642),
        Transformation::new("Ethylation (-H)", "C2H4", 28.0313001284),
        Transformation::new("Acetylation (-H)", "C2H2O", 42.0105646863),
        Transformation::new("Formylation (-H)", "CO", 27.9949146221),
        Transformation::new("Condensation/dehydration", "H2O", 18.0105646863),
        Transformation::new("Carboxylation (-H)", "CO2", 43.9898292442),
        Transformation::new("Phosphorylation (-H)", "HPO3", 79.9663304084),
        Transformation::new("Sulfation (-H)", "SO3", 79.9568145563),
        Transformation::new("Malonyl group (-H2O)", "C3H2O3", 86.0003939305),
        Transformation::new("Glycine (-H2O)", "C2H3NO", 57.0214637236),
        Transformation::new("Alanine (-H2O)", "C3H5NO", 71.0371137878),
        Transformation::new("Glucose (-H2O)", "C6H10O5", 162.0528234315),
        Transformation::new("Glucuronic acid (-H2O)", "C6H8O6", 176.0320879894),
        Transformation::new("Rhamnose (-H2O)", "C6H10O4", 146.0579088094),
        Transformation::new("Biotinyl (-H)", "C10H14N2O2S", 226.0775983736),
    ]
}
