//! End-to-end sketch to solid conversion.
//!
//! Data flows strictly forward: mask -> contours -> curves -> polygons ->
//! mesh -> validated (and if needed repaired) mesh.

use std::path::Path;

use anyhow::{Context, Result};
use image::GrayImage;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::contour::{ContourExtractor, CurveRecord, RawContour, vectorize};
use crate::error::PipelineError;
use crate::geometry::{Polygon2D, build_polygons};
use crate::mesh::{Extrusion, ExtrusionStrategy, Mesh3D, ValidationReport, extrude_detailed};
use crate::mesh::{repair, validate, write_mesh_stl};
use crate::raster::{load_image, preprocess};

/// Every intermediate artifact of one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Contours after length filtering and refinement.
    pub contours: Vec<RawContour>,
    pub curves: Vec<CurveRecord>,
    pub polygons: Vec<Polygon2D>,
    /// Final mesh and the strategy that produced it, `None` when there was
    /// nothing to extrude.
    pub extrusion: Option<Extrusion>,
    pub report: ValidationReport,
    /// Whether the mesh went through repair after failing validation.
    pub repaired: bool,
    pub thickness: f64,
}

impl PipelineOutput {
    pub fn mesh(&self) -> Option<&Mesh3D> {
        self.extrusion.as_ref().map(|e| &e.mesh)
    }

    pub fn summary(&self) -> PipelineSummary {
        let mesh = self.mesh();
        PipelineSummary {
            contours: self.contours.len(),
            curves: self.curves.len(),
            polygons: self.polygons.len(),
            strategy: self.extrusion.as_ref().map(|e| e.strategy),
            footprint_area: self.extrusion.as_ref().map(|e| e.footprint_area),
            thickness: self.thickness,
            vertices: mesh.map_or(0, |m| m.vertex_count()),
            faces: mesh.map_or(0, |m| m.face_count()),
            dimensions: mesh.and_then(|m| m.dimensions()),
            repaired: self.repaired,
            is_valid: self.report.is_valid,
            issues: self.report.issues.clone(),
        }
    }
}

/// Serializable digest of a [`PipelineOutput`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub contours: usize,
    pub curves: usize,
    pub polygons: usize,
    pub strategy: Option<ExtrusionStrategy>,
    pub footprint_area: Option<f64>,
    pub thickness: f64,
    pub vertices: usize,
    pub faces: usize,
    pub dimensions: Option<[f64; 3]>,
    pub repaired: bool,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    extractor: ContourExtractor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            extractor: ContourExtractor::new(config.contour),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the geometry stages on an already binary mask.
    pub fn process(&self, mask: &GrayImage, thickness: f64) -> PipelineOutput {
        let detected = self.extractor.detect(mask);
        let contours = self.extractor.refine(&detected);
        let curves = vectorize(&contours);
        let polygons = build_polygons(&curves);
        info!(
            "{} contours -> {} curves -> {} polygons",
            contours.len(),
            curves.len(),
            polygons.len()
        );

        let mut extrusion = extrude_detailed(&polygons, thickness);
        let mut report = validate(extrusion.as_ref().map(|e| &e.mesh));
        let mut repaired = false;

        if let Some(ex) = extrusion.as_mut()
            && !report.is_valid
        {
            warn!("Validation failed, attempting repair: {}", report.summary());
            ex.mesh = repair(std::mem::take(&mut ex.mesh));
            report = validate(Some(&ex.mesh));
            repaired = true;
            info!("After repair: {}", report.summary());
        }

        PipelineOutput {
            contours,
            curves,
            polygons,
            extrusion,
            report,
            repaired,
            thickness,
        }
    }

    /// Load, binarize and process `input`, then export the mesh to `output`.
    ///
    /// Fails with [`PipelineError::NothingToExport`] when no mesh could be
    /// produced; nothing is written in that case.
    pub fn process_file(&self, input: &Path, output: &Path, thickness: f64) -> Result<PipelineOutput> {
        let image = load_image(input)?;
        let mask = preprocess(&image, &self.config.preprocess);
        let result = self.process(&mask, thickness);

        let Some(mesh) = result.mesh() else {
            return Err(PipelineError::NothingToExport(input.to_path_buf()).into());
        };
        let written = write_mesh_stl(output, mesh)
            .with_context(|| format!("Failed to export {}", output.display()))?;
        info!("Wrote {} triangles to {}", written, output.display());

        Ok(result)
    }
}
