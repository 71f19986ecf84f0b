//! Star formation, supernova feedback, and their associated metal
//! bookkeeping — applied to one galaxy per substep.

use crate::arena::WorkingArena;
use crate::config::Config;
use crate::defaults::METALS_COLD_GAS_FLOOR;
use crate::halo::HaloStore;

use super::disk_instability::check_disk_instability;

/// Run the Kauffmann-threshold star-formation law for galaxy `p`, apply
/// supernova reheating/ejection (when `SupernovaRecipeOn`), distribute
/// newly produced metals, and — if enabled — check for disk instability.
#[allow(clippy::too_many_arguments)]
pub fn starformation_and_feedback(
    working: &mut WorkingArena,
    p: usize,
    central: usize,
    _time: f64,
    dt: f64,
    store: &HaloStore,
    fof_root: i32,
    config: &Config,
    substep: usize,
) {
    if dt <= 0.0 {
        return;
    }

    let (cold_gas, cold_metals, vvir, disk_scale_radius) = {
        let g = working.get(p);
        (
            g.reservoirs.cold_gas,
            g.reservoirs.metals_cold_gas,
            g.vvir,
            g.disk_scale_radius,
        )
    };
    if cold_gas <= 0.0 || vvir <= 0.0 || disk_scale_radius <= 0.0 {
        check_disk_instability(working, p, config);
        return;
    }

    let reff = 3.0 * disk_scale_radius;
    let tdyn = (reff / vvir).max(1e-6);
    let cold_crit = 0.19 * vvir * reff;
    let sfr = config.sfr_efficiency * (cold_gas - cold_crit).max(0.0) / tdyn;
    let mut stars = (sfr * dt).max(0.0);

    let mut reheated = if config.supernova_recipe_on {
        config.feedback_reheating_epsilon * stars
    } else {
        0.0
    };

    if stars + reheated > cold_gas {
        let scale = cold_gas / (stars + reheated).max(1e-30);
        stars *= scale;
        reheated *= scale;
    }

    let recycled = stars * config.recycle_fraction;
    let net_stellar_growth = stars - recycled;

    let central_vvir = working.get(central).vvir.max(1e-6);
    let ejected = if config.supernova_recipe_on {
        let energy_term =
            config.feedback_ejection_efficiency * config.eta_sn * config.energy_sn
                / (central_vvir * central_vvir);
        (energy_term - config.feedback_reheating_epsilon).max(0.0) * stars
    } else {
        0.0
    };
    let central_hot_available = working.get(central).reservoirs.hot_gas;
    let ejected = ejected.min(central_hot_available);

    let metals_yielded = config.yield_ * stars;
    let central_mvir = working.get(central).mvir.max(0.0);
    let leave_disk_fraction = if cold_gas > METALS_COLD_GAS_FLOOR {
        (config.frac_z_leave_disk * (-central_mvir / 30.0).exp()).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let metals_to_hot = metals_yielded * leave_disk_fraction;
    let metals_to_cold = metals_yielded - metals_to_hot;

    // Reheated gas carries its share of the disk's existing metals with it.
    let reheated_metallicity = if cold_gas > 0.0 { cold_metals / cold_gas } else { 0.0 };
    let reheated_metals = (reheated * reheated_metallicity).min(cold_metals);

    {
        let g = working.get_mut(p);
        g.reservoirs.cold_gas -= stars - recycled + reheated;
        g.reservoirs.stellar_mass += net_stellar_growth;
        g.reservoirs.metals_cold_gas =
            (g.reservoirs.metals_cold_gas + metals_to_cold - reheated_metals).max(0.0);
        g.sfr.disk[substep] += stars / dt;
        g.sfr.disk_cold_gas[substep] += cold_gas;
        g.sfr.disk_cold_gas_metals[substep] += g.reservoirs.metals_cold_gas;
    }

    if reheated > 0.0 || ejected > 0.0 || metals_to_hot > 0.0 {
        let c = working.get_mut(central);
        c.reservoirs.hot_gas = (c.reservoirs.hot_gas + reheated - ejected).max(0.0);
        c.reservoirs.ejected_mass += ejected;
        c.reservoirs.metals_hot_gas =
            (c.reservoirs.metals_hot_gas + metals_to_hot + reheated_metals).max(0.0);
        c.outflow_rate += ejected;
    }

    let _ = (store, fof_root);
    check_disk_instability(working, p, config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::WorkingArena;
    use crate::galaxy::Galaxy;
    use crate::halo::Halo;

    fn dummy_store() -> HaloStore {
        HaloStore::new(vec![Halo::default()])
    }

    #[test]
    fn scenario_two_simple_progenitor_recycling() {
        let mut working = WorkingArena::new(2);
        let mut g = Galaxy {
            vvir: 200.0,
            disk_scale_radius: 1e-6,
            ..Galaxy::default()
        };
        g.reservoirs.cold_gas = 0.1;
        g.central_gal = 0;
        let idx = working.push(g).unwrap();

        let mut config = Config::default();
        config.sfr_efficiency = 1.0;
        config.supernova_recipe_on = false;
        config.recycle_fraction = 0.43;
        config.yield_ = 0.0;
        config.frac_z_leave_disk = 0.0;

        let store = dummy_store();
        starformation_and_feedback(&mut working, idx, idx, 0.0, 1.0, &store, 0, &config, 0);

        let g = working.get(idx);
        assert!(g.reservoirs.stellar_mass > 0.0);
        let stars_over_point_five_seven = g.reservoirs.stellar_mass / 0.57;
        let expected_cold = 0.1 - 0.57 * stars_over_point_five_seven;
        assert!((g.reservoirs.cold_gas - expected_cold).abs() < 1e-9);
        assert!(g.reservoirs.metals_cold_gas >= 0.0);
    }

    #[test]
    fn zero_cold_gas_produces_no_star_formation() {
        let mut working = WorkingArena::new(2);
        let g = Galaxy {
            vvir: 200.0,
            disk_scale_radius: 0.01,
            ..Galaxy::default()
        };
        let idx = working.push(g).unwrap();
        let config = Config::default();
        let store = dummy_store();
        starformation_and_feedback(&mut working, idx, idx, 0.0, 1.0, &store, 0, &config, 0);
        assert_eq!(working.get(idx).reservoirs.stellar_mass, 0.0);
    }

    #[test]
    fn star_formation_never_drains_more_cold_gas_than_available() {
        let mut working = WorkingArena::new(2);
        let mut g = Galaxy {
            vvir: 500.0,
            disk_scale_radius: 0.001,
            ..Galaxy::default()
        };
        g.reservoirs.cold_gas = 0.01;
        let idx = working.push(g).unwrap();
        let mut config = Config::default();
        config.sfr_efficiency = 100.0;
        config.supernova_recipe_on = true;
        let store = dummy_store();
        starformation_and_feedback(&mut working, idx, idx, 0.0, 1.0, &store, 0, &config, 0);
        assert!(working.get(idx).reservoirs.cold_gas >= -1e-9);
    }

    /// Regression test for §8's reheat/eject conservation rule: with
    /// `SupernovaRecipeOn` on, `ColdGas + StellarMass + HotGas + EjectedMass`
    /// summed across the satellite doing the star formation and the central
    /// its reheated/ejected gas lands on must be unchanged by one call.
    #[test]
    fn reheat_eject_conservation() {
        let mut working = WorkingArena::new(2);

        let mut central = Galaxy {
            vvir: 200.0,
            ..Galaxy::default()
        };
        central.reservoirs.hot_gas = 10.0;
        let central_idx = working.push(central).unwrap();

        let mut satellite = Galaxy {
            vvir: 200.0,
            disk_scale_radius: 1e-6,
            central_gal: central_idx as i32,
            ..Galaxy::default()
        };
        satellite.reservoirs.cold_gas = 1.0;
        satellite.reservoirs.metals_cold_gas = 0.05;
        let satellite_idx = working.push(satellite).unwrap();

        let mut config = Config::default();
        config.sfr_efficiency = 1.0;
        config.supernova_recipe_on = true;
        config.recycle_fraction = 0.43;
        config.feedback_reheating_epsilon = 0.3;
        config.yield_ = 0.01;
        config.frac_z_leave_disk = 0.0;

        let total_before = working.get(satellite_idx).reservoirs.cold_gas
            + working.get(satellite_idx).reservoirs.stellar_mass
            + working.get(central_idx).reservoirs.hot_gas
            + working.get(central_idx).reservoirs.ejected_mass;

        let store = dummy_store();
        starformation_and_feedback(
            &mut working,
            satellite_idx,
            central_idx,
            0.0,
            1.0,
            &store,
            0,
            &config,
            0,
        );

        let total_after = working.get(satellite_idx).reservoirs.cold_gas
            + working.get(satellite_idx).reservoirs.stellar_mass
            + working.get(central_idx).reservoirs.hot_gas
            + working.get(central_idx).reservoirs.ejected_mass;

        // sanity check that the scenario actually exercised reheating
        assert!(working.get(satellite_idx).reservoirs.stellar_mass > 0.0);
        assert!((total_after - total_before).abs() < 1e-9);
    }
}
