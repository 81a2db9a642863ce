//! Image loading and binarization ahead of contour detection.

use std::path::Path;

use image::{DynamicImage, GrayImage};
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, open};
use tracing::debug;

use crate::config::PreprocessConfig;
use crate::error::PipelineError;

/// Raster formats accepted as sketch input.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load a sketch from disk.
pub fn load_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    if !is_supported(path) {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    }

    let image = image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Turn a sketch into a clean binary mask: foreground 255, background 0.
///
/// Grayscale, Gaussian blur, fixed threshold, then a morphological close
/// followed by an open to bridge pen gaps and drop specks. With `invert`
/// set, dark strokes on light paper become the foreground.
pub fn preprocess(image: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let gray = image.to_luma8();
    let blurred = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, config.blur_sigma)
    } else {
        gray
    };

    let kind = if config.invert {
        ThresholdType::BinaryInverted
    } else {
        ThresholdType::Binary
    };
    let binary = threshold(&blurred, config.threshold, kind);

    if config.morph_radius == 0 {
        return binary;
    }
    let closed = close(&binary, Norm::LInf, config.morph_radius);
    open(&closed, Norm::LInf, config.morph_radius)
}
