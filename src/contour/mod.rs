pub mod extract;
pub mod vectorize;

pub use extract::{BorderKind, ContourExtractor, RawContour};
pub use vectorize::{CurveKind, CurveRecord, vectorize};
