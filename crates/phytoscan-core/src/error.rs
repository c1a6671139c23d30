use std::error::Error;
use std::fmt;

/// Errors raised by the descriptor, encoder, trainer, model store and predictor.
#[derive(Debug)]
pub enum PhytoError {
    /// Unreadable or malformed image.
    Input(String),
    /// Too few classes, or no training record with a usable image.
    InsufficientData(String),
    /// Missing expected column, or a scaler/encoder asked to handle something it
    /// was not fitted on.
    Configuration(String),
    /// The fitted model bundle is absent, incomplete or mixed across runs.
    ModelNotLoaded(String),
    /// Filesystem failure while persisting artifacts.
    Io(String),
}

impl PhytoError {
    /// Stable name of the error kind, suitable for structured output.
    pub fn kind(&self) -> &'static str {
        match self {
            PhytoError::Input(_) => "InputError",
            PhytoError::InsufficientData(_) => "InsufficientDataError",
            PhytoError::Configuration(_) => "ConfigurationError",
            PhytoError::ModelNotLoaded(_) => "ModelNotLoadedError",
            PhytoError::Io(_) => "IoError",
        }
    }
}

impl fmt::Display for PhytoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PhytoError::Input(msg) => write!(f, "Invalid input image: {}", msg),
            PhytoError::InsufficientData(msg) => write!(f, "Insufficient training data: {}", msg),
            PhytoError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            PhytoError::ModelNotLoaded(msg) => write!(f, "Model not loaded: {}", msg),
            PhytoError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl Error for PhytoError {}

impl From<std::io::Error> for PhytoError {
    fn from(err: std::io::Error) -> Self {
        PhytoError::Io(err.to_string())
    }
}

impl From<image::ImageError> for PhytoError {
    fn from(err: image::ImageError) -> Self {
        PhytoError::Input(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PhytoError>;
