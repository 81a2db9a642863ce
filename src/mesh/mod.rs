pub mod builder;
pub mod extrusion;
pub mod repair;
pub mod stl;
pub mod triangulation;
pub mod validation;

pub use builder::{Mesh3D, Triangle};
pub use extrusion::{Extrusion, ExtrusionStrategy, extrude, extrude_detailed};
pub use repair::repair;
pub use stl::{write_mesh_stl, write_stl};
pub use triangulation::{EarcutTriangulator, TessTriangulator, Triangulator};
pub use validation::{ValidationReport, validate};
