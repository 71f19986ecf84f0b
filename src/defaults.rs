//! Default values and fixed constants used across the evolution kernel.
//!
//! This module centralizes every magic number the kernel and config layer
//! need so they are defined once: the integration granularity, the galaxy
//! arena growth policy, and the default value for every tunable physics
//! parameter. Keeping these together avoids the two-steps-removed constant
//! drift that made the original engine's `SimState`/config split hard to
//! audit.

/// Number of sub-steps per snapshot-to-snapshot evolve call.
pub const STEPS: usize = 10;

/// Initial capacity of the transient per-FOF working galaxy array.
pub const INITIAL_FOF_GALAXIES: usize = 1000;

/// Minimum additive growth applied whenever an arena must reallocate.
pub const MIN_GALAXY_ARRAY_GROWTH: usize = 1000;

/// Geometric growth factor applied to an arena on reallocation.
pub const GALAXY_ARRAY_GROWTH_FACTOR: f64 = 1.5;

/// Hard upper bound on the number of galaxies any single arena may hold.
pub const MAX_GALAXY_ARRAY_SIZE: usize = 1_000_000_000;

/// Multiplier used to size the persistent per-tree arena from `TreeNHalos`.
pub const MAXGALFAC: usize = 1;

/// Small floor below which cold gas is treated as exhausted for metal
/// partitioning purposes.
pub const METALS_COLD_GAS_FLOOR: f64 = 1e-8;

/// Tolerance used by conservation and non-negativity checks.
pub const EPSILON: f64 = 1e-6;

/// High-water-mark growth, in bytes, that triggers an allocator log line.
pub const ALLOCATOR_LOG_THRESHOLD_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound on `Ntrees` accepted from a tree file before it is judged corrupt.
pub const MAX_NTREES: i32 = 1_000_000;

/// Upper bound on `totNHalos` accepted from a tree file before it is judged corrupt.
pub const MAX_TOT_NHALOS: i64 = 100_000_000;

/// Default numeric values for every physics/cosmology parameter in the
/// configuration surface. Centralized here so `config::Config::default()`
/// and the documentation stay in sync.
pub mod physics {
    pub const SFR_EFFICIENCY: f64 = 0.05;
    pub const FEEDBACK_REHEATING_EPSILON: f64 = 3.0;
    pub const FEEDBACK_EJECTION_EFFICIENCY: f64 = 0.3;
    pub const RADIO_MODE_EFFICIENCY: f64 = 0.08;
    pub const QUASAR_MODE_EFFICIENCY: f64 = 0.005;
    pub const BLACK_HOLE_GROWTH_RATE: f64 = 0.015;
    pub const YIELD: f64 = 0.025;
    pub const RECYCLE_FRACTION: f64 = 0.43;
    pub const FRAC_Z_LEAVE_DISK: f64 = 0.3;
    pub const RE_INCORPORATION_FACTOR: f64 = 0.15;
    pub const THRESH_MAJOR_MERGER: f64 = 0.3;
    pub const THRESHOLD_SAT_DISRUPTION: f64 = 1.0;
    pub const REIONIZATION_Z0: f64 = 8.0;
    pub const REIONIZATION_ZR: f64 = 7.0;
    pub const ENERGY_SN: f64 = 1.0e51;
    pub const ETA_SN: f64 = 5.0e-3;
}

pub mod cosmology {
    pub const OMEGA: f64 = 0.25;
    pub const OMEGA_LAMBDA: f64 = 0.75;
    pub const HUBBLE_H: f64 = 0.73;
    pub const PART_MASS: f64 = 0.0860657;
    pub const BOX_SIZE: f64 = 62.5;

    /// Cosmic baryon fraction (`Omega_b / Omega_m`) used by the infall and
    /// stripping recipes. Not exposed on the configuration surface — the
    /// spec names only `Omega`, `OmegaLambda`, `Hubble_h`, `PartMass`,
    /// `BoxSize` there — so it lives alongside the other leaf-physics
    /// defaults instead.
    pub const BARYON_FRACTION: f64 = 0.17;
}

/// Leaf-physics constants used only inside `physics::*` recipes, not
/// exposed on the configuration surface.
pub mod physics_internal {
    /// Linear fraction of a satellite's baryon excess stripped per call to
    /// `strip_from_satellite`.
    pub const STRIPPING_EFFICIENCY: f64 = 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_matches_spec() {
        assert_eq!(STEPS, 10);
    }

    #[test]
    fn growth_policy_constants_are_sane() {
        assert!(GALAXY_ARRAY_GROWTH_FACTOR > 1.0);
        assert!(MIN_GALAXY_ARRAY_GROWTH > 0);
        assert!(MAX_GALAXY_ARRAY_SIZE > INITIAL_FOF_GALAXIES);
    }

    #[test]
    fn tree_bounds_are_positive() {
        assert!(MAX_NTREES > 0);
        assert!(MAX_TOT_NHALOS > 0);
    }
}
