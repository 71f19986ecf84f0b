//! Cosmological infall recipe: how much baryonic gas a FOF group accretes
//! onto its central over one evolve call.

use crate::config::Config;
use crate::defaults::cosmology::BARYON_FRACTION;
use crate::galaxy::Galaxy;

/// Smooth reionization suppression of the baryon fraction, ramping from 1
/// (fully accreting) at `z <= zr` to 0 (fully suppressed) at `z >= z0`.
fn reionization_modifier(redshift: f64, z0: f64, zr: f64) -> f64 {
    if z0 <= zr {
        return 1.0;
    }
    if redshift <= zr {
        1.0
    } else if redshift >= z0 {
        0.0
    } else {
        (z0 - redshift) / (z0 - zr)
    }
}

/// Total baryonic mass the FOF group should accrete this evolve call, to be
/// divided by `STEPS` and applied once per substep. May be negative
/// (recapture of previously ejected gas); [`add_infall_to_hot`] handles
/// both signs.
pub fn infall_recipe(central: &Galaxy, _ngal: usize, redshift: f64, config: &Config) -> f64 {
    let modifier = if config.reionization_on {
        reionization_modifier(redshift, config.reionization_z0, config.reionization_zr)
    } else {
        1.0
    };
    let halo_mass = central.central_mvir.max(central.mvir);
    let target_baryons = BARYON_FRACTION * modifier * halo_mass;
    let current_baryons = central.reservoirs.cold_gas
        + central.reservoirs.hot_gas
        + central.reservoirs.stellar_mass
        + central.reservoirs.bulge_mass
        + central.reservoirs.ejected_mass
        + central.reservoirs.black_hole_mass
        + central.reservoirs.ics;
    target_baryons - current_baryons
}

/// Apply one substep's worth of infall to the central's hot-gas reservoir.
/// Positive infall is pure accretion; negative infall recaptures
/// previously ejected gas, never driving `EjectedMass` below zero.
pub fn add_infall_to_hot(central: &mut Galaxy, infall: f64) {
    if infall >= 0.0 {
        central.reservoirs.hot_gas += infall;
    } else {
        let take = infall.abs().min(central.reservoirs.ejected_mass);
        central.reservoirs.ejected_mass -= take;
        central.reservoirs.hot_gas += take;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infall_is_positive_for_an_empty_halo() {
        let g = Galaxy {
            mvir: 10.0,
            central_mvir: 10.0,
            ..Galaxy::default()
        };
        let config = Config::default();
        assert!(infall_recipe(&g, 1, 0.0, &config) > 0.0);
    }

    #[test]
    fn reionization_suppresses_infall_at_high_redshift() {
        let g = Galaxy {
            mvir: 1.0,
            central_mvir: 1.0,
            ..Galaxy::default()
        };
        let mut config = Config::default();
        config.reionization_on = true;
        config.reionization_z0 = 8.0;
        config.reionization_zr = 7.0;
        let low_z = infall_recipe(&g, 1, 0.0, &config);
        let high_z = infall_recipe(&g, 1, 20.0, &config);
        assert!(high_z < low_z);
    }

    #[test]
    fn add_infall_to_hot_recaptures_ejected_gas_on_negative_infall() {
        let mut g = Galaxy::default();
        g.reservoirs.ejected_mass = 5.0;
        add_infall_to_hot(&mut g, -3.0);
        assert!((g.reservoirs.ejected_mass - 2.0).abs() < 1e-9);
        assert!((g.reservoirs.hot_gas - 3.0).abs() < 1e-9);
    }

    #[test]
    fn add_infall_to_hot_never_drives_ejected_mass_negative() {
        let mut g = Galaxy::default();
        g.reservoirs.ejected_mass = 1.0;
        add_infall_to_hot(&mut g, -5.0);
        assert!(g.reservoirs.ejected_mass >= 0.0);
    }
}
