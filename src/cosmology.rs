//! # Cosmology and Time Tables (C13)
//!
//! `Age`, `ZZ`, and `AA` are computed once from the run's cosmology
//! parameters and then treated as immutable for the remainder of the run.
//! This resolves the source engine's historical `SimState`/config duplex
//! (see design notes) in favor of a single table computed at startup: the
//! evolution kernel only ever reads through a `&Cosmology`, it never
//! recomputes or mutates one.
//!
//! `Age` is monotonically non-decreasing in snapshot number by construction
//! (it is built from a strictly increasing scale-factor grid).

use crate::config::Config;

/// Scale factors, in ascending order, that the simulation's snapshots sit on.
/// Production runs load this from a snapshot list file; tests and small
/// examples can hand in any strictly increasing scale-factor grid.
pub fn snapshot_scale_factors(num_snapshots: usize) -> Vec<f64> {
    // A log-spaced grid from a(z=20) to a(z=0), matching the coarse cadence
    // typical of the dark-matter snapshot outputs this engine consumes.
    let a_start: f64 = 1.0 / 21.0;
    let a_end: f64 = 1.0;
    if num_snapshots <= 1 {
        return vec![a_end];
    }
    let log_start = a_start.ln();
    let log_end = a_end.ln();
    (0..num_snapshots)
        .map(|i| {
            let t = i as f64 / (num_snapshots - 1) as f64;
            (log_start + t * (log_end - log_start)).exp()
        })
        .collect()
}

/// Immutable per-snapshot cosmological time tables.
#[derive(Debug, Clone)]
pub struct Cosmology {
    /// Scale factor at each snapshot, strictly increasing.
    aa: Vec<f64>,
    /// Redshift at each snapshot, `= 1/a - 1`.
    zz: Vec<f64>,
    /// Age of the universe at each snapshot, in the engine's internal time
    /// unit, monotonically non-decreasing.
    age: Vec<f64>,
}

impl Cosmology {
    /// Build the tables once from the run's cosmology parameters and a
    /// scale-factor grid. `Omega`, `OmegaLambda`, `Hubble_h` enter only
    /// through the age integral; the exact numeric quadrature is a leaf
    /// concern the spec does not fix (see Non-goals), only its contract:
    /// monotonic, finite, and `age(a=1) > age(a<1)`.
    pub fn build(config: &Config, scale_factors: &[f64]) -> Self {
        let aa: Vec<f64> = scale_factors.to_vec();
        let zz: Vec<f64> = aa.iter().map(|a| 1.0 / a - 1.0).collect();
        let age: Vec<f64> = aa
            .iter()
            .map(|&a| age_of_universe(a, config.omega, config.omega_lambda, config.hubble_h))
            .collect();
        Self { aa, zz, age }
    }

    /// Build directly from an explicit age table, for tests that want to
    /// pin exact values rather than go through the quadrature.
    pub fn from_tables(aa: Vec<f64>, zz: Vec<f64>, age: Vec<f64>) -> Self {
        assert_eq!(aa.len(), zz.len());
        assert_eq!(aa.len(), age.len());
        Self { aa, zz, age }
    }

    pub fn num_snapshots(&self) -> usize {
        self.age.len()
    }

    pub fn age_at(&self, snap: usize) -> f64 {
        self.age[snap]
    }

    pub fn redshift_at(&self, snap: usize) -> f64 {
        self.zz[snap]
    }

    pub fn scale_factor_at(&self, snap: usize) -> f64 {
        self.aa[snap]
    }
}

/// Gravitational constant in the engine's internal unit system
/// (km/s)^2 · Mpc / (10^10 Msun), matching the mass/length/velocity units
/// the rest of the kernel uses for `Mvir`, `Pos`, `Vel`.
pub const GRAVITY: f64 = 43007.1;

/// Hubble parameter `H(z)` in `km/s/Mpc`, for flat ΛCDM.
pub fn hubble_at(redshift: f64, omega_m: f64, omega_lambda: f64, hubble_h: f64) -> f64 {
    let h0 = 100.0 * hubble_h;
    h0 * (omega_m * (1.0 + redshift).powi(3) + omega_lambda).sqrt()
}

/// Virial radius and velocity implied by a halo mass at a given redshift,
/// via the spherical-overdensity definition (`Delta = 200`) used throughout
/// the physics pipeline. Leaf contract only: positive, finite, and
/// increasing in `mvir` for fixed redshift — the exact overdensity
/// convention is not pinned by the spec.
pub fn virial_radius_and_velocity(
    mvir: f64,
    redshift: f64,
    omega_m: f64,
    omega_lambda: f64,
    hubble_h: f64,
) -> (f64, f64) {
    if mvir <= 0.0 {
        return (0.0, 0.0);
    }
    let hz = hubble_at(redshift, omega_m, omega_lambda, hubble_h);
    // rvir^3 = Mvir / ((4/3) pi * 200 * rho_crit(z)), rho_crit(z) = 3 H(z)^2 / (8 pi G)
    let rho_crit = 3.0 * hz * hz / (8.0 * std::f64::consts::PI * GRAVITY);
    let rvir = (mvir / ((4.0 / 3.0) * std::f64::consts::PI * 200.0 * rho_crit)).cbrt();
    let vvir = (GRAVITY * mvir / rvir).sqrt();
    (rvir, vvir)
}

/// Age of the universe at scale factor `a`, via the flat-ΛCDM closed-form
/// integral. `h` is `Hubble_h`; the result is expressed in units of
/// `1/H0`, matching the engine's internal time unit.
fn age_of_universe(a: f64, omega_m: f64, omega_lambda: f64, _h: f64) -> f64 {
    if omega_lambda <= 0.0 {
        // Matter-dominated (or open) fallback: simple power-law growth.
        return (2.0 / 3.0) * a.powf(1.5) / omega_m.max(1e-6).sqrt();
    }
    let sqrt_ol = omega_lambda.sqrt();
    let x = (a.powi(3) * omega_lambda / omega_m).sqrt();
    (2.0 / (3.0 * sqrt_ol)) * (x + (1.0 + x * x).sqrt()).ln()
}
