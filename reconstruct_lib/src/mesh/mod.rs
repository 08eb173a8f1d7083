mod half_edge;

pub use half_edge::{FId, HalfEdgeMesh, HeId, VId};
