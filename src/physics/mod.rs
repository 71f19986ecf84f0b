//! # Physics Pipeline (C6)
//!
//! Per-substep application of infall, cooling, star formation and
//! feedback, reincorporation, and satellite stripping, applied over one
//! FOF group's working galaxy slice in index order for `STEPS` sub-steps.
//! Leaf numeric recipes (`infall_recipe`, `cooling_recipe`, and the
//! cosmological lookups) sit behind the [`CoolingTable`] and
//! [`crate::cosmology::Cosmology`] collaborators; this module fixes only
//! their call contract (inputs, units, non-negativity of outputs), not the
//! interpolation scheme — consistent with the Non-goals around exact
//! physics constants.

mod cooling;
mod disk_instability;
mod infall;
mod reincorporation;
mod starformation_and_feedback;
mod stripping;

pub use cooling::{CoolingTable, NullCoolingTable};
pub use disk_instability::check_disk_instability;
pub use infall::infall_recipe;
pub use reincorporation::reincorporate_gas;
pub use starformation_and_feedback::starformation_and_feedback;
pub use stripping::strip_from_satellite;

use crate::arena::WorkingArena;
use crate::config::Config;
use crate::cosmology::Cosmology;
use crate::defaults::STEPS;
use crate::galaxy::MergeType;
use crate::halo::HaloStore;
use crate::merger::apply_merger_stage;

/// Drive the full sub-stepped evolution of one FOF group's working galaxy
/// slice: `STEPS` iterations of infall/cooling/star-formation/feedback
/// followed by the merger/disruption stage, per §4.6-4.7. `central` is the
/// index, within `working`'s current slice, of the galaxy with
/// `Type ∈ {0,1}` that every other galaxy in the slice defers to.
pub fn evolve_fof_group(
    tree_index: usize,
    fof_root: i32,
    central: usize,
    store: &HaloStore,
    working: &mut WorkingArena,
    config: &Config,
    cosmology: &Cosmology,
    cooling_table: &dyn CoolingTable,
) -> crate::error::Result<()> {
    let ngal = working.len();
    if ngal == 0 {
        return Ok(());
    }

    let central_snap = working.get(central).snap_num.max(0) as usize;
    let fof_snap = store.halo(fof_root).snap_num.max(0) as usize;
    let delta_t = cosmology.age_at(central_snap) - cosmology.age_at(fof_snap);
    let delta_t = delta_t.max(0.0);

    let redshift_at_fof_root = cosmology.redshift_at(fof_snap);
    let infalling_gas_total = infall_recipe(working.get(central), ngal, redshift_at_fof_root, config);

    for substep in 0..STEPS {
        let time = cosmology.age_at(central_snap) - (substep as f64 + 0.5) * delta_t / STEPS as f64;
        let step_dt = delta_t / STEPS as f64;
        let infall_this_step = infalling_gas_total / STEPS as f64;

        for p in 0..ngal {
            if working.get(p).galaxy_type == crate::galaxy::GalaxyType::MergedInactive {
                continue;
            }

            if p == central {
                let central_gal = working.get_mut(p);
                infall::add_infall_to_hot(central_gal, infall_this_step);
                if config.re_incorporation_factor > 0.0 {
                    reincorporate_gas(working.get_mut(p), step_dt, config);
                }
            } else if working.get(p).galaxy_type == crate::galaxy::GalaxyType::SatelliteWithSubhalo
                && working.get(p).reservoirs.hot_gas > 0.0
            {
                strip_from_satellite(working, p, central, store, fof_root, config);
            }

            let cooling_gas = cooling::cooling_recipe(working.get(p), step_dt, cooling_table, config);
            cooling::cool_gas_onto_galaxy(working.get_mut(p), cooling_gas);

            starformation_and_feedback(working, p, central, time, step_dt, store, fof_root, config, substep);
        }

        apply_merger_stage(
            tree_index, fof_root, central, working, store, step_dt, substep, time, config,
        )?;
    }

    for p in 0..ngal {
        let g = working.get_mut(p);
        if g.galaxy_type != crate::galaxy::GalaxyType::MergedInactive && delta_t > 0.0 {
            g.cooling /= delta_t;
            g.heating /= delta_t;
            g.outflow_rate /= delta_t;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::PersistentArena;
    use crate::galaxy::{Galaxy, GalaxyType};
    use crate::halo::Halo;
    use crate::join::join_halo;
    use crate::physics::cooling::NullCoolingTable;

    fn root_halo(mvir: f32, snap: i32) -> Halo {
        Halo {
            first_halo_in_fof_group: 0,
            first_progenitor: crate::halo::NONE,
            mvir,
            len: 100,
            snap_num: snap,
            ..Halo::default()
        }
    }

    #[test]
    fn evolve_with_all_zero_reservoirs_leaves_a_single_passthrough_central() {
        let mut halos = vec![root_halo(1.0, 0)];
        halos[0].vel_disp = 200.0;
        let store = HaloStore::new(halos);
        let mut persistent = PersistentArena::new(10);
        let mut working = WorkingArena::new(10);
        let config = Config::default();
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);

        join_halo(0, 0, &store, &mut persistent, &mut working, &config, &cosmology).unwrap();
        evolve_fof_group(0, 0, 0, &store, &mut working, &config, &cosmology, &NullCoolingTable)
            .unwrap();

        let g = working.get(0);
        assert_eq!(g.galaxy_type, GalaxyType::Central);
        assert_eq!(g.merge_type, MergeType::None);
        assert_eq!(g.reservoirs.cold_gas, 0.0);
        assert_eq!(g.reservoirs.stellar_mass, 0.0);
    }

    #[test]
    fn empty_slice_is_a_no_op() {
        let halos = vec![root_halo(1.0, 0)];
        let store = HaloStore::new(halos);
        let mut working = WorkingArena::new(10);
        let config = Config::default();
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);
        assert!(evolve_fof_group(0, 0, 0, &store, &mut working, &config, &cosmology, &NullCoolingTable).is_ok());
    }

    #[test]
    fn reservoirs_stay_physical_after_a_full_evolve() {
        let halos = vec![root_halo(5.0, 0)];
        let store = HaloStore::new(halos);
        let mut persistent = PersistentArena::new(10);
        let mut working = WorkingArena::new(10);
        let mut config = Config::default();
        config.sfr_efficiency = 1.0;
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);

        join_halo(0, 0, &store, &mut persistent, &mut working, &config, &cosmology).unwrap();
        working.get_mut(0).reservoirs.cold_gas = 0.1;
        working.get_mut(0).reservoirs.hot_gas = 5.0;
        evolve_fof_group(0, 0, 0, &store, &mut working, &config, &cosmology, &NullCoolingTable)
            .unwrap();

        assert!(working.get(0).reservoirs.is_physical(1e-6));
    }
}
