pub mod polygon;
pub mod simplify;

pub use polygon::{Polygon2D, build_polygons};
