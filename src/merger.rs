//! # Merger/Disruption Stage (C7)
//!
//! Runs once per substep, after star formation and feedback, over every
//! satellite (`Type ∈ {SatelliteWithSubhalo, Orphan}`) that has not already
//! merged. Decrements each satellite's merger timer, and on trigger either
//! disrupts it into its target's ICS reservoir or merges it, classifying
//! the event as major or minor by stellar mass ratio.

use crate::arena::WorkingArena;
use crate::config::Config;
use crate::defaults::STEPS;
use crate::error::Result;
use crate::galaxy::{Galaxy, GalaxyType, MergeType, Reservoirs};
use crate::halo::HaloStore;

/// Boosted-efficiency starburst consuming a merging satellite's cold gas;
/// returns the stellar mass formed (already credited to `target`).
fn collisional_starburst_recipe(target: &mut Galaxy, satellite_cold_gas: f64, config: &Config) -> f64 {
    if satellite_cold_gas <= 0.0 {
        return 0.0;
    }
    let stars = (satellite_cold_gas * config.sfr_efficiency * 2.0).min(satellite_cold_gas);
    let recycled = stars * config.recycle_fraction;
    let net = stars - recycled;
    target.reservoirs.stellar_mass += net;
    target.reservoirs.bulge_mass += net;
    stars
}

/// Grow the target's black hole in proportion to the merger mass ratio,
/// fueled by its own cold gas; returns the mass accreted.
fn grow_black_hole(target: &mut Galaxy, mass_ratio: f64, config: &Config) -> f64 {
    let available = target.reservoirs.cold_gas;
    let accreted = (config.black_hole_growth_rate * mass_ratio.min(1.0) * available).min(available);
    target.reservoirs.cold_gas -= accreted;
    target.reservoirs.black_hole_mass += accreted;
    target.quasar_mode_bh_accretion_mass += accreted;
    accreted
}

/// Quasar-mode wind proportional to the black hole growth that just
/// occurred, ejecting hot gas from the target.
fn quasar_mode_wind(target: &mut Galaxy, bh_growth: f64, config: &Config) {
    let wind = (config.quasar_mode_efficiency * bh_growth).min(target.reservoirs.hot_gas);
    target.reservoirs.hot_gas -= wind;
    target.reservoirs.ejected_mass += wind;
    target.outflow_rate += wind;
}

/// Apply the merger/disruption stage to one substep of one FOF group's
/// working slice.
#[allow(clippy::too_many_arguments)]
pub fn apply_merger_stage(
    _tree_index: usize,
    _fof_root: i32,
    central: usize,
    working: &mut WorkingArena,
    _store: &HaloStore,
    step_dt: f64,
    substep: usize,
    time: f64,
    config: &Config,
) -> Result<()> {
    let ngal = working.len();
    for p in 0..ngal {
        let galaxy_type = working.get(p).galaxy_type;
        if galaxy_type == GalaxyType::MergedInactive {
            continue;
        }
        if !matches!(galaxy_type, GalaxyType::SatelliteWithSubhalo | GalaxyType::Orphan) {
            continue;
        }

        working.get_mut(p).merge_time -= step_dt;

        let current_mvir = {
            let g = working.get(p);
            g.mvir - g.delta_mvir * (1.0 - (substep as f64 + 1.0) / STEPS as f64)
        };
        let galaxy_baryons = {
            let g = working.get(p);
            g.reservoirs.stellar_mass + g.reservoirs.cold_gas
        };

        let mut target = if galaxy_type == GalaxyType::SatelliteWithSubhalo {
            central
        } else {
            working.get(p).central_gal.max(0) as usize
        };
        if working.get(target).galaxy_type == GalaxyType::MergedInactive {
            target = working.get(target).central_gal.max(0) as usize;
        }

        working.get_mut(p).merge_into_id = ngal as i32 + target as i32;

        let triggers = galaxy_baryons <= 0.0
            || current_mvir / galaxy_baryons.max(1e-30) <= config.threshold_sat_disruption;
        if !triggers {
            continue;
        }

        let merge_time = working.get(p).merge_time;
        if merge_time > 0.0 {
            let sat = working.get(p).reservoirs;
            {
                let t = working.get_mut(target);
                t.reservoirs.ics += sat.stellar_mass + sat.bulge_mass;
                t.reservoirs.metals_ics += sat.metals_stellar_mass + sat.metals_bulge_mass;
                t.reservoirs.hot_gas += sat.hot_gas;
                t.reservoirs.metals_hot_gas += sat.metals_hot_gas;
                t.reservoirs.ejected_mass += sat.cold_gas;
                t.reservoirs.metals_ejected_mass += sat.metals_cold_gas;
            }
            let g = working.get_mut(p);
            g.merge_type = MergeType::DisruptToIcs;
            g.galaxy_type = GalaxyType::MergedInactive;
            g.reservoirs = Reservoirs::default();
        } else {
            let sat = working.get(p).reservoirs;
            let stellar_target = working.get(target).reservoirs.stellar_mass.max(1e-10);
            let ratio = sat.stellar_mass / stellar_target;
            let major = ratio >= config.thresh_major_merger;

            collisional_starburst_recipe(working.get_mut(target), sat.cold_gas, config);
            let bh_growth = grow_black_hole(working.get_mut(target), ratio, config);
            quasar_mode_wind(working.get_mut(target), bh_growth, config);

            {
                let t = working.get_mut(target);
                t.reservoirs.stellar_mass += sat.stellar_mass;
                t.reservoirs.metals_stellar_mass += sat.metals_stellar_mass;
                t.reservoirs.bulge_mass += sat.bulge_mass;
                t.reservoirs.metals_bulge_mass += sat.metals_bulge_mass;
                t.reservoirs.hot_gas += sat.hot_gas;
                t.reservoirs.metals_hot_gas += sat.metals_hot_gas;
                t.reservoirs.ejected_mass += sat.ejected_mass;
                t.reservoirs.metals_ejected_mass += sat.metals_ejected_mass;
                t.reservoirs.ics += sat.ics;
                t.reservoirs.metals_ics += sat.metals_ics;
                if major {
                    t.time_of_last_major_merger = time;
                } else {
                    t.time_of_last_minor_merger = time;
                }
            }

            let g = working.get_mut(p);
            g.reservoirs = Reservoirs::default();
            g.galaxy_type = GalaxyType::MergedInactive;
            g.merge_type = if major { MergeType::Major } else { MergeType::Minor };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::Halo;

    fn satellite(galaxy_type: GalaxyType, merge_time: f64, stellar: f64, cold: f64) -> Galaxy {
        let mut g = Galaxy {
            galaxy_type,
            central_gal: 0,
            merge_time,
            delta_mvir: 0.0,
            ..Galaxy::default()
        };
        g.reservoirs.stellar_mass = stellar;
        g.reservoirs.cold_gas = cold;
        g
    }

    fn central_galaxy(stellar: f64) -> Galaxy {
        let mut g = Galaxy {
            galaxy_type: GalaxyType::Central,
            central_gal: 0,
            merge_time: f64::INFINITY,
            ..Galaxy::default()
        };
        g.reservoirs.stellar_mass = stellar;
        g
    }

    #[test]
    fn forced_merger_retires_satellite_and_grows_central_stellar_mass() {
        let mut working = WorkingArena::new(4);
        let c = working.push(central_galaxy(1.0)).unwrap();
        let s = working.push(satellite(GalaxyType::SatelliteWithSubhalo, 0.0, 0.5, 0.1)).unwrap();
        let store = HaloStore::new(vec![Halo::default()]);
        let config = Config::default();

        let stellar_before = working.get(c).reservoirs.stellar_mass;
        apply_merger_stage(0, 0, c, &mut working, &store, 1.0, 0, 0.0, &config).unwrap();

        assert_eq!(working.get(s).merge_type.as_u8() > 0, true);
        assert_eq!(working.get(s).galaxy_type, GalaxyType::MergedInactive);
        assert!(working.get(c).reservoirs.stellar_mass >= stellar_before + 0.5);
    }

    #[test]
    fn disruption_moves_satellite_stellar_mass_into_ics() {
        let mut working = WorkingArena::new(4);
        let c = working.push(central_galaxy(10.0)).unwrap();
        let s = working.push(satellite(GalaxyType::SatelliteWithSubhalo, 5.0, 0.5, 0.1)).unwrap();
        let store = HaloStore::new(vec![Halo::default()]);
        let config = Config::default();

        let ics_before = working.get(c).reservoirs.ics;
        apply_merger_stage(0, 0, c, &mut working, &store, 0.01, 0, 0.0, &config).unwrap();

        assert_eq!(working.get(s).merge_type, MergeType::DisruptToIcs);
        assert_eq!(working.get(s).galaxy_type, GalaxyType::MergedInactive);
        assert!(working.get(c).reservoirs.ics >= ics_before + 0.5);
    }

    #[test]
    fn healthy_satellite_below_threshold_is_untouched() {
        let mut working = WorkingArena::new(4);
        let c = working.push(central_galaxy(1.0)).unwrap();
        let mut sat = satellite(GalaxyType::SatelliteWithSubhalo, 100.0, 5.0, 5.0);
        sat.delta_mvir = -1000.0;
        sat.mvir = 1000.0;
        let s = working.push(sat).unwrap();
        let store = HaloStore::new(vec![Halo::default()]);
        let config = Config::default();

        apply_merger_stage(0, 0, c, &mut working, &store, 0.001, 0, 0.0, &config).unwrap();
        assert_eq!(working.get(s).merge_type, MergeType::None);
    }
}
