/// Error raised when constructing a type from out-of-range values.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    /// Latitude outside [-90, 90] or not finite
    InvalidLatitude(f64),
    /// Longitude outside [-180, 180] or not finite
    InvalidLongitude(f64),
    /// Activation radius not strictly positive and finite
    InvalidRadius(f64),
    /// Marker identifier was empty
    EmptyId,
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLatitude(v) => write!(f, "Latitude out of range [-90.0, 90.0]: {}", v),
            Self::InvalidLongitude(v) => {
                write!(f, "Longitude out of range [-180.0, 180.0]: {}", v)
            }
            Self::InvalidRadius(v) => write!(f, "Radius must be positive and finite, got: {}", v),
            Self::EmptyId => write!(f, "Marker id must not be empty"),
        }
    }
}

impl std::error::Error for TypeError {}
