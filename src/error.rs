use thiserror::Error;

/// Validation errors surfaced by [`crate::slic::iterate`] before any kernel
/// runs. The kernels themselves cannot fail once entered; outputs are never
/// partially mutated on error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlicError {
    #[error("cluster count must be at least one")]
    ZeroClusters,

    #[error("cluster count {clusters} exceeds pixel count {pixels}")]
    TooManyClusters { clusters: u32, pixels: usize },

    #[error("quantize level {0} would overflow the 16-bit distance scale (maximum is 7)")]
    QuantizeLevelTooLarge(u8),

    #[error("iteration count must be at least one")]
    ZeroIterations,
}
