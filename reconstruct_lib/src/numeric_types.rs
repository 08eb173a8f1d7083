//! Scalar type abstraction used throughout the reconstruction pipeline.

use nalgebra::RealField;
use num::Float;

/// Bound satisfied by the scalar types this crate can reconstruct over (`f32`/`f64`).
///
/// This intentionally does not carry a companion integer-width parameter the way some
/// geometry crates do: every sample, vertex and mesh handle in this pipeline is addressed
/// by a plain `usize`/`u32`, so there is nothing here that needs to be generic over index width.
pub trait Real: RealField + Float + Copy + Send + Sync + 'static {
    /// A sentinel used internally to mark "no value" without resorting to `NaN`, which would
    /// break ordered comparisons used by the marching cubes sign tests.
    fn sentinel() -> Self {
        Self::max_value()
    }

    fn is_sentinel(self) -> bool {
        self == Self::sentinel()
    }
}

impl Real for f32 {}
impl Real for f64 {}
