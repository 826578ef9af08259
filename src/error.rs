//! Error types surfaced by the fusion core's public API.

/// Failure modes a caller of [`crate::fusion::FusionCore`] can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FusionError {
    /// An operation was handed matrices whose runtime shapes don't agree.
    /// The const-generic `Matrix<R, C>` type makes this unreachable for the
    /// fixed state/observation dimensions this crate actually uses; the
    /// variant exists for API completeness and any future variable-shape use.
    DimensionMismatch,
    /// The innovation covariance `S = H*P*H^T + R` could not be inverted
    /// during a correction step.
    Singular,
}
