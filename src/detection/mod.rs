//! Image-level stages: contrast enhancement and tooth region extraction.

pub mod contours;
pub mod preprocessing;
pub mod regions;

pub use contours::edge_map;
pub use preprocessing::enhance;
pub use regions::{extract_candidates, ArchWindow, Rejection};
