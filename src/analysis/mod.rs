//! Geometry-level stages operating on extracted tooth candidates.

pub mod classifier;
pub mod clinical;
pub mod measurement;
pub mod pairing;
pub mod quality;

pub use classifier::{classify, classify_all};
pub use clinical::{assess, ClinicalAssessment, Significance};
pub use measurement::{measure_width, Calibration, WidthMeasurement, WidthMethod};
pub use pairing::{select_best, validate_pairs};
