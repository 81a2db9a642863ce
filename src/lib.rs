//! sketch2stl - Turn 2D jewelry sketches into 3D-printable STL solids

pub mod config;
pub mod contour;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod pipeline;
pub mod raster;

pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineOutput, PipelineSummary};
