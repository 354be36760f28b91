//! Input records handed to the pipeline by the fetch layer.

pub mod paper;

pub use paper::Paper;
