//! Reincorporation of previously ejected gas back onto the hot halo.

use crate::config::Config;
use crate::galaxy::Galaxy;

/// Move a fraction of `EjectedMass` back onto `HotGas`, on a timescale set
/// by `ReIncorporationFactor` and the central's own dynamical time.
pub fn reincorporate_gas(central: &mut Galaxy, dt: f64, config: &Config) {
    if central.reservoirs.ejected_mass <= 0.0 || dt <= 0.0 || central.vvir <= 0.0 {
        return;
    }
    let dynamical_time = (central.rvir / central.vvir).max(1e-6);
    let reincorporation_time = dynamical_time / config.re_incorporation_factor.max(1e-6);
    let fraction = (dt / reincorporation_time).clamp(0.0, 1.0);
    let amount = central.reservoirs.ejected_mass * fraction;
    let metal_fraction = central.reservoirs.metals_ejected_mass / central.reservoirs.ejected_mass;
    let metals = metal_fraction * amount;

    central.reservoirs.ejected_mass -= amount;
    central.reservoirs.metals_ejected_mass -= metals;
    central.reservoirs.hot_gas += amount;
    central.reservoirs.metals_hot_gas += metals;
}
