//! Centralized error handling for ClimNorm
//!
//! Every fallible operation in the crate returns [`Result`]. Validation errors
//! abort a run; data sparsity is never an error and is reported inside the
//! climatology table instead.

use std::fmt;

/// Main error type for ClimNorm operations
#[derive(Debug)]
pub enum ClimNormError {
    /// `start > end`, or a degenerate region
    InvalidRange { message: String },

    /// A selected band has no declared unit conversion
    UnsupportedBand { band: String },

    /// A selected band is absent from a snapshot
    BandNotFound { band: String, date: String },

    /// A band grid does not match its snapshot's extent
    ShapeMismatch {
        band: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Nominal scale must be a positive, finite number of metres
    InvalidScale { scale: f64 },

    /// Sampling lattice exceeds the pixel ceiling
    ComputationBudget { pixels: u64, max_pixels: u64 },

    /// Raster source has no dataset under this identifier
    DatasetNotFound { dataset: String },

    /// CF time units that could not be parsed
    InvalidTimeUnits { units: String },

    /// Table or raster export collaborator failed
    ExportFailure { target: String, message: String },

    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error
    Generic(String),
}

impl fmt::Display for ClimNormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClimNormError::InvalidRange { message } => write!(f, "Invalid range: {}", message),
            ClimNormError::UnsupportedBand { band } => {
                write!(f, "No unit conversion declared for band '{}'", band)
            }
            ClimNormError::BandNotFound { band, date } => {
                write!(f, "Band '{}' not found in snapshot dated {}", band, date)
            }
            ClimNormError::ShapeMismatch {
                band,
                expected,
                found,
            } => write!(
                f,
                "Band '{}' has shape {:?}, expected {:?} from the grid extent",
                band, found, expected
            ),
            ClimNormError::InvalidScale { scale } => {
                write!(f, "Scale must be a positive number of metres, got {}", scale)
            }
            ClimNormError::ComputationBudget { pixels, max_pixels } => write!(
                f,
                "Sampling needs {} pixels, exceeding the ceiling of {}",
                pixels, max_pixels
            ),
            ClimNormError::DatasetNotFound { dataset } => {
                write!(f, "Dataset '{}' not found in raster source", dataset)
            }
            ClimNormError::InvalidTimeUnits { units } => {
                write!(f, "Unsupported time units '{}'", units)
            }
            ClimNormError::ExportFailure { target, message } => {
                write!(f, "Export to '{}' failed: {}", target, message)
            }
            ClimNormError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            ClimNormError::IoError(e) => write!(f, "I/O error: {}", e),
            ClimNormError::ArrayError(e) => write!(f, "Array error: {}", e),
            ClimNormError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            ClimNormError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ClimNormError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClimNormError::NetCDFError(e) => Some(e),
            ClimNormError::IoError(e) => Some(e),
            ClimNormError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl ClimNormError {
    /// Wrap a collaborator failure, keeping its message verbatim
    pub fn export(target: impl Into<String>, error: impl fmt::Display) -> Self {
        ClimNormError::ExportFailure {
            target: target.into(),
            message: error.to_string(),
        }
    }

    /// True for the errors that reject a run before any reduction
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClimNormError::InvalidRange { .. }
                | ClimNormError::UnsupportedBand { .. }
                | ClimNormError::BandNotFound { .. }
                | ClimNormError::ShapeMismatch { .. }
                | ClimNormError::InvalidScale { .. }
        )
    }
}

impl From<netcdf::Error> for ClimNormError {
    fn from(error: netcdf::Error) -> Self {
        ClimNormError::NetCDFError(error)
    }
}

impl From<std::io::Error> for ClimNormError {
    fn from(error: std::io::Error) -> Self {
        ClimNormError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for ClimNormError {
    fn from(error: ndarray::ShapeError) -> Self {
        ClimNormError::ArrayError(error)
    }
}

impl From<serde_json::Error> for ClimNormError {
    fn from(error: serde_json::Error) -> Self {
        ClimNormError::Generic(format!("Invalid GeoJSON: {}", error))
    }
}

impl From<geojson::Error> for ClimNormError {
    fn from(error: geojson::Error) -> Self {
        ClimNormError::Generic(format!("Invalid GeoJSON: {}", error))
    }
}

/// Result type alias for ClimNorm operations
pub type Result<T> = std::result::Result<T, ClimNormError>;
