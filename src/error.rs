//! Error types for the sketch-to-solid pipeline.
//!
//! Only input and export problems surface to callers as hard errors. The
//! geometry, extrusion and repair errors below are recovered inside their
//! own components and exist so each stage can report why it gave up.

use std::path::PathBuf;
use thiserror::Error;

/// Hard failures at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported file format: {extension:?} ({})", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("could not decode image {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no valid polygon to extrude from {}", .0.display())]
    NothingToExport(PathBuf),
}

/// Why a curve could not become a valid polygon.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("ring has {0} distinct vertices, need at least 3")]
    TooFewVertices(usize),

    #[error("ring contains a non-finite coordinate at vertex {0}")]
    NonFinite(usize),

    #[error("ring has coincident consecutive vertices at {0}")]
    CoincidentVertices(usize),

    #[error("ring self-intersects between edges {0} and {1}")]
    SelfIntersection(usize, usize),

    #[error("ring encloses zero area")]
    ZeroArea,
}

/// Failure of a single extrusion strategy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtrudeError {
    #[error("thickness must be finite and positive, got {0}")]
    InvalidThickness(f64),

    #[error("footprint is unusable: {0}")]
    Footprint(#[from] GeometryError),

    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("box extents must be finite and positive, got {0:?}")]
    InvalidExtents([f64; 3]),
}

/// Failure of a single repair step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepairError {
    #[error("face {face} references vertex {index} but mesh has {count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: usize,
        count: usize,
    },

    #[error("boundary is non-manifold at vertex {0}")]
    NonManifoldBoundary(usize),

    #[error("could not triangulate hole with {0} vertices")]
    HoleFill(usize),

    #[error("vertex {0} has a non-finite coordinate")]
    NonFinite(usize),
}
