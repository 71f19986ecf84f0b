//! Hot-gas cooling recipe and the `CoolingTable` collaborator it reads
//! through.

use crate::config::Config;
use crate::galaxy::Galaxy;

/// A cooling-rate lookup, keyed by `log10(T_vir [K])` and
/// `log10(Z/Z_sun)`. Implementations are free to interpolate a tabulated
/// Sutherland & Dopita-style grid or return a fixed rate; the pipeline only
/// requires a non-negative result.
pub trait CoolingTable {
    fn cooling_rate(&self, log_temperature: f64, log_metallicity: f64) -> f64;
}

/// A cooling table that always returns a fixed rate of 1.0 — used in tests
/// and as a conservative stand-in before a real tabulated recipe is wired
/// in.
pub struct NullCoolingTable;

impl CoolingTable for NullCoolingTable {
    fn cooling_rate(&self, _log_temperature: f64, _log_metallicity: f64) -> f64 {
        1.0
    }
}

/// Virial temperature implied by `Vvir`, via `T = 35.9 * Vvir^2` (K, Vvir
/// in km/s) — the standard singular-isothermal-sphere relation.
fn virial_temperature(vvir: f64) -> f64 {
    (35.9 * vvir.max(1e-6).powi(2)).max(1.0)
}

/// Cooling flow rate for one galaxy over `dt`, clamped so it can never
/// remove more than the galaxy's current `HotGas`.
pub fn cooling_recipe(g: &Galaxy, dt: f64, table: &dyn CoolingTable, _config: &Config) -> f64 {
    if g.reservoirs.hot_gas <= 0.0 || dt <= 0.0 || g.vvir <= 0.0 {
        return 0.0;
    }
    let log_t = virial_temperature(g.vvir).log10();
    let log_z = if g.reservoirs.hot_gas > 0.0 {
        (g.reservoirs.metals_hot_gas / g.reservoirs.hot_gas).max(1e-10).log10()
    } else {
        -10.0
    };
    let lambda = table.cooling_rate(log_t, log_z).max(0.0);
    let dynamical_time = (g.rvir / g.vvir).max(1e-6);
    let fraction = (lambda * dt / dynamical_time).clamp(0.0, 1.0);
    g.reservoirs.hot_gas * fraction
}

/// Transfer `cooling_gas` (and its pro-rata metals) from hot to cold.
pub fn cool_gas_onto_galaxy(g: &mut Galaxy, cooling_gas: f64) {
    let cooling_gas = cooling_gas.min(g.reservoirs.hot_gas).max(0.0);
    if cooling_gas <= 0.0 || g.reservoirs.hot_gas <= 0.0 {
        return;
    }
    let metal_fraction = g.reservoirs.metals_hot_gas / g.reservoirs.hot_gas;
    let metals = metal_fraction * cooling_gas;
    g.reservoirs.hot_gas -= cooling_gas;
    g.reservoirs.metals_hot_gas -= metals;
    g.reservoirs.cold_gas += cooling_gas;
    g.reservoirs.metals_cold_gas += metals;
    g.cooling += cooling_gas;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn galaxy_with_hot_gas(hot: f64, vvir: f64, rvir: f64) -> Galaxy {
        Galaxy {
            vvir,
            rvir,
            reservoirs: crate::galaxy::Reservoirs {
                hot_gas: hot,
                ..Default::default()
            },
            ..Galaxy::default()
        }
    }

    #[test]
    fn cooling_never_exceeds_available_hot_gas() {
        let g = galaxy_with_hot_gas(10.0, 200.0, 0.1);
        let config = Config::default();
        let cooling = cooling_recipe(&g, 1e6, &NullCoolingTable, &config);
        assert!(cooling <= 10.0 + 1e-9);
        assert!(cooling >= 0.0);
    }

    #[test]
    fn cool_gas_onto_galaxy_moves_metals_pro_rata() {
        let mut g = galaxy_with_hot_gas(10.0, 200.0, 0.1);
        g.reservoirs.metals_hot_gas = 1.0;
        cool_gas_onto_galaxy(&mut g, 5.0);
        assert!((g.reservoirs.cold_gas - 5.0).abs() < 1e-9);
        assert!((g.reservoirs.metals_cold_gas - 0.5).abs() < 1e-9);
        assert!((g.reservoirs.hot_gas - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_hot_gas_yields_zero_cooling() {
        let g = galaxy_with_hot_gas(0.0, 200.0, 0.1);
        let config = Config::default();
        assert_eq!(cooling_recipe(&g, 1.0, &NullCoolingTable, &config), 0.0);
    }
}
