// ----------------------------------------------------------------------------
use thiserror::Error;
// ----------------------------------------------------------------------------
/// Errors that prevent a landscape from being built. Everything that can go
/// wrong after construction (pool exhaustion, map borders) is handled by
/// degrading mesh quality instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LandscapeError {
    #[error("patch size {0} is not a power of two >= 4")]
    InvalidPatchSize(u32),

    #[error("map size {width}x{height} is not a multiple of patch size {patch_size}")]
    InvalidMapSize {
        width: u32,
        height: u32,
        patch_size: u32,
    },

    #[error("heightmap has {actual} samples, expected {expected}")]
    HeightMapMismatch { expected: usize, actual: usize },

    #[error("tri node pool of {0} nodes exceeds index range")]
    NodeIndexOverflow(usize),
}
// ----------------------------------------------------------------------------
