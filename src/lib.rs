pub mod analysis;
pub mod annotate;
pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use analysis::{Calibration, ClinicalAssessment, Significance, WidthMeasurement, WidthMethod};
pub use batch::{BatchError, BatchItem, BatchOutcome, BatchReport, BatchRunner};
pub use config::{AnalysisConfig, ImageType, QualityMode};
pub use error::AnalysisError;
pub use models::{BoundingBox, ClassifiedTooth, Contour, ToothCandidate, ToothPair, ToothType};
pub use pipeline::{AnalysisResult, Analyzer, StageObserver, StageRecorder};
