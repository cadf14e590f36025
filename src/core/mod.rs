pub mod classifier;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod heatmap;

pub use classifier::{ClassifierConfig, DefectClassifier, RiskLevel, SizeCategory};
pub use error::AnalysisError;
pub use frame::{FrameDimensions, LumaFrame};
pub use geometry::{BoundingBox, Centroid, Contour, Point};
pub use heatmap::{Heatmap, StampMode};
