mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from leeway for tests
pub use leeway::{
    AnalysisConfig, AnalysisError, Analyzer, Calibration, Contour, Significance, ToothCandidate,
    ToothType, WidthMethod,
};
