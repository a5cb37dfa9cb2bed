//! Default constants for shortlist configuration.
//!
//! All magic numbers are centralized here with documentation.

// =============================================================================
// Shortlist Shape Defaults
// =============================================================================

/// Minimum number of negative slots kept in a training shortlist
/// when positives have to be subsampled.
pub const DEFAULT_MIN_NNEG: usize = 100;

/// Extra labels appended by the hybrid and extended handlers.
pub const DEFAULT_CORRUPTION: usize = 200;

/// Extra draws on top of `corruption` for the hybrid sampler.
/// Sampling with replacement repeats labels, so the draw is oversized and
/// de-duplicated down to `corruption`.
pub const DEFAULT_SAMPLER_OVERSAMPLE: usize = 350;

// =============================================================================
// Similarity Placeholders
// =============================================================================

/// Similarity assigned to sampled labels, which have no real score.
pub const SAMPLED_SIM: f32 = 0.0;

/// Similarity assigned to externally injected labels.
pub const INJECTED_SIM: f32 = 0.0;

// =============================================================================
// Environment
// =============================================================================

/// Prefix of environment overrides, e.g. `SHORTLIST_SIZE_SHORTLIST=300`.
pub const ENV_PREFIX: &str = "SHORTLIST_";

/// Separator for nested keys, e.g. `SHORTLIST_SAMPLER__REPLACE=false`.
pub const ENV_NESTING: &str = "__";
