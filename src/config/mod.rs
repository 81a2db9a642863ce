use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fixed geometric thresholds used across the pipeline.
///
/// All lengths are in image units (pixels), which become millimetres once
/// the mesh is written to STL.
pub mod limits {
    /// A curve whose endpoints are closer than this is considered closed.
    /// Border following on a pixel grid leaves the last point within one or
    /// two pixels of the first, so 10 leaves room for approximation drift.
    pub const CLOSURE_TOLERANCE: f64 = 10.0;

    /// Smallest total surface area a mesh may have before it is reported
    /// as degenerate.
    pub const MIN_SURFACE_AREA: f64 = 1e-6;

    /// Smallest bounding box dimension that still slices into at least one
    /// printable layer.
    pub const MIN_FEATURE_SIZE: f64 = 0.1;

    /// Polygon area at or below which a ring is treated as degenerate.
    pub const MIN_POLYGON_AREA: f64 = 1e-9;

    /// Side length of the square placeholder emitted when every extrusion
    /// strategy failed.
    pub const PLACEHOLDER_SIZE: f64 = 30.0;

    /// Distance under which two mesh vertices are merged during repair.
    pub const MERGE_TOLERANCE: f64 = 1e-8;
}

/// Default extrusion thicknesses per jewelry type.
pub mod thickness {
    pub const DEFAULT: f64 = 2.0;
    pub const RING: f64 = 2.0;
    pub const PENDANT: f64 = 1.5;
    pub const EARRING: f64 = 1.0;
    pub const BRACELET: f64 = 3.0;
}

/// Jewelry category, inferred from a sketch's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JewelryKind {
    Ring,
    Pendant,
    Earring,
    Bracelet,
}

impl JewelryKind {
    /// Match the first known keyword contained in `name`, case-insensitively.
    ///
    /// "earring" is checked before "ring" since it contains it.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        [
            ("earring", Self::Earring),
            ("ring", Self::Ring),
            ("pendant", Self::Pendant),
            ("bracelet", Self::Bracelet),
        ]
        .into_iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, kind)| kind)
    }

    pub fn thickness(self) -> f64 {
        match self {
            Self::Ring => thickness::RING,
            Self::Pendant => thickness::PENDANT,
            Self::Earring => thickness::EARRING,
            Self::Bracelet => thickness::BRACELET,
        }
    }
}

/// Pick the thickness for an input file from its stem, falling back to
/// `default` when no keyword matches.
pub fn thickness_for_path(path: &Path, default: f64) -> f64 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(JewelryKind::from_name)
        .map(JewelryKind::thickness)
        .unwrap_or(default)
}

/// Tunables for contour detection and refinement.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ContourConfig {
    /// Contours with a closed perimeter at or below this are discarded.
    #[serde(default = "default_min_contour_length")]
    pub min_contour_length: f64,
    /// Douglas-Peucker tolerance as a fraction of each contour's perimeter.
    #[serde(default = "default_epsilon_factor")]
    pub epsilon_factor: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_contour_length: default_min_contour_length(),
            epsilon_factor: default_epsilon_factor(),
        }
    }
}

/// Tunables for turning a decoded image into a binary mask.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Radius of the square structuring element (2 gives a 5x5 kernel).
    #[serde(default = "default_morph_radius")]
    pub morph_radius: u8,
    /// Treat dark strokes on a light background as the shape.
    #[serde(default = "default_invert")]
    pub invert: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_sigma: default_blur_sigma(),
            threshold: default_threshold(),
            morph_radius: default_morph_radius(),
            invert: default_invert(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineConfig {
    pub contour: ContourConfig,
    pub preprocess: PreprocessConfig,
}

fn default_min_contour_length() -> f64 {
    50.0
}
fn default_epsilon_factor() -> f64 {
    0.01
}
fn default_blur_sigma() -> f32 {
    1.5
}
fn default_threshold() -> u8 {
    127
}
fn default_morph_radius() -> u8 {
    2
}
fn default_invert() -> bool {
    true
}
fn default_thickness() -> f64 {
    thickness::DEFAULT
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    #[serde(default)]
    pub contour: Option<ContourConfig>,
    #[serde(default)]
    pub preprocess: Option<PreprocessConfig>,
    #[serde(default)]
    pub verbose: bool,
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        for path in get_config_paths() {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            contour: self.contour.unwrap_or_default(),
            preprocess: self.preprocess.unwrap_or_default(),
        }
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("sketch2stl.toml"),
        PathBuf::from(".sketch2stl.toml"),
    ];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("sketch2stl").join("config.toml"));
        paths.push(config_dir.join("sketch2stl.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".sketch2stl.toml"));
    }

    paths
}
