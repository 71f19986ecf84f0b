//! # Join Stage (C5)
//!
//! Builds one FOF sibling's contribution to the working galaxy array `Gal`
//! by inheriting every progenitor's surviving galaxies, retyping them
//! against the new halo, and — if nothing was inherited and the halo is
//! its own FOF root — minting a fresh central. Invoked once per FOF
//! sibling from [`crate::traversal`], in whatever order the traversal's
//! sibling chain walk visits them.

use crate::arena::{PersistentArena, WorkingArena};
use crate::config::Config;
use crate::cosmology::virial_radius_and_velocity;
use crate::cosmology::Cosmology;
use crate::error::{Error, Result};
use crate::galaxy::{Galaxy, GalaxyType, MergeType};
use crate::halo::{HaloStore, NONE};

/// Remembered pre-retype kinematics, used to decide infall snapshots once
/// a galaxy's type for this step is known.
struct Previous {
    mvir: f64,
    vvir: f64,
    vmax: f64,
}

/// Scan `H`'s progenitor chain for the one realizing the highest `Len`
/// among progenitors that actually contributed a galaxy; default to
/// `FirstProgenitor` (which may itself be `NONE`) when no progenitor has
/// any galaxies.
fn most_massive_occupied_progenitor(store: &HaloStore, halo: i32) -> i32 {
    let first_progenitor = store.halo(halo).first_progenitor;
    let mut chosen = NONE;
    let mut lenoccmax = -1;
    let mut p = first_progenitor;
    while p != NONE {
        let h = store.halo(p);
        if store.aux(p).n_galaxies > 0 && h.len > lenoccmax {
            lenoccmax = h.len;
            chosen = p;
        }
        p = h.next_progenitor;
    }
    if chosen == NONE {
        first_progenitor
    } else {
        chosen
    }
}

/// Rough dynamical-friction merging timescale: longer for a satellite that
/// is a small fraction of the central's mass, shorter otherwise. Leaf
/// contract only (positive, finite, decreasing in `mvir_sat/mvir_central`);
/// the spec does not fix the exact coefficient.
fn estimate_merging_time(central_mvir: f64, satellite_mvir: f64, dynamical_time: f64) -> f64 {
    if satellite_mvir <= 0.0 || central_mvir <= 0.0 {
        return 0.0;
    }
    let mass_ratio = (central_mvir / satellite_mvir).max(1.0);
    1.17 * dynamical_time * mass_ratio / mass_ratio.ln().max(1.0)
}

/// Disk scale radius from halo spin and virial radius, `R_d = (lambda / sqrt(2)) * Rvir`.
fn disk_scale_radius(spin: [f32; 3], rvir: f64) -> f64 {
    let spin_mag = ((spin[0] as f64).powi(2) + (spin[1] as f64).powi(2) + (spin[2] as f64).powi(2))
        .sqrt();
    (spin_mag / std::f64::consts::SQRT_2) * rvir
}

/// Join one FOF sibling `halo` into the working array, inheriting galaxies
/// from its progenitor chain (retyped per §4.5) and minting a fresh central
/// if nothing was inherited.
pub fn join_halo(
    tree_index: usize,
    halo: i32,
    store: &HaloStore,
    persistent: &mut PersistentArena,
    working: &mut WorkingArena,
    config: &Config,
    cosmology: &Cosmology,
) -> Result<()> {
    let is_fof_root = store.halo(halo).first_halo_in_fof_group == halo;
    let main_progenitor = most_massive_occupied_progenitor(store, halo);
    let redshift = cosmology.redshift_at(store.halo(halo).snap_num.max(0) as usize);
    let adopted_mass = store.halo(halo).adopted_mass();
    let (rvir, vvir) = virial_radius_and_velocity(
        adopted_mass,
        redshift,
        config.omega,
        config.omega_lambda,
        config.hubble_h,
    );

    let ngalstart = working.len();
    let mut contributed_any = false;

    let mut p = store.halo(halo).first_progenitor;
    while p != NONE {
        let aux = *store.aux(p);
        for i in 0..aux.n_galaxies {
            let source_index = (aux.first_galaxy + i) as usize;
            let mut g = persistent.get(source_index).clone();
            g.halo_nr = halo;
            g.d_t = -1.0;
            contributed_any = true;

            if g.galaxy_type == GalaxyType::MergedInactive {
                working.push(g)?;
                continue;
            }

            let previous = Previous {
                mvir: g.mvir,
                vvir: g.vvir,
                vmax: g.vmax,
            };
            let previous_type = g.galaxy_type;

            if p == main_progenitor {
                g.pos = store.halo(halo).pos;
                g.vel = store.halo(halo).vel;
                g.len = store.halo(halo).len;
                g.vmax = store.halo(halo).vmax as f64;
                g.most_bound_id = store.halo(halo).most_bound_id;
                g.delta_mvir = adopted_mass - g.mvir;
                if adopted_mass > g.mvir {
                    g.rvir = rvir;
                    g.vvir = vvir;
                }
                g.mvir = adopted_mass;
                g.reset_evolution_accumulators();

                if is_fof_root {
                    g.galaxy_type = GalaxyType::Central;
                    g.merge_type = MergeType::None;
                    g.merge_into_id = NONE;
                    g.merge_time = f64::INFINITY;
                    g.disk_scale_radius = disk_scale_radius(store.halo(halo).spin, rvir);
                } else {
                    g.galaxy_type = GalaxyType::SatelliteWithSubhalo;
                    if previous_type == GalaxyType::Central || !g.merge_time.is_finite() {
                        g.merge_time = estimate_merging_time(
                            store.halo(store.halo(halo).first_halo_in_fof_group).adopted_mass(),
                            adopted_mass,
                            (rvir / vvir.max(1e-6)).max(1e-6),
                        );
                        g.infall.mvir = previous.mvir;
                        g.infall.vvir = previous.vvir;
                        g.infall.vmax = previous.vmax;
                    }
                }
            } else {
                g.delta_mvir = -g.mvir;
                g.mvir = 0.0;
                g.galaxy_type = GalaxyType::Orphan;
                if previous_type == GalaxyType::Central || !g.merge_time.is_finite() {
                    g.merge_time = 0.0;
                    g.infall.mvir = previous.mvir;
                    g.infall.vvir = previous.vvir;
                    g.infall.vmax = previous.vmax;
                }
            }

            working.push(g)?;
        }
        p = store.halo(p).next_progenitor;
    }

    if !contributed_any && is_fof_root {
        let mut g = Galaxy {
            galaxy_nr: persistent.next_galaxy_nr(),
            galaxy_type: GalaxyType::Central,
            snap_num: store.halo(halo).snap_num,
            halo_nr: halo,
            pos: store.halo(halo).pos,
            vel: store.halo(halo).vel,
            len: store.halo(halo).len,
            most_bound_id: store.halo(halo).most_bound_id,
            mvir: adopted_mass,
            central_mvir: adopted_mass,
            rvir,
            vvir,
            vmax: store.halo(halo).vmax as f64,
            disk_scale_radius: disk_scale_radius(store.halo(halo).spin, rvir),
            merge_time: f64::INFINITY,
            ..Galaxy::default()
        };
        g.d_t = 0.0;
        let index = working.push(g)?;
        working.get_mut(index).central_gal = index as i32;
    }

    let ngal = working.len();
    let mut central_index: Option<usize> = None;
    for i in ngalstart..ngal {
        let g = working.get(i);
        if matches!(g.galaxy_type, GalaxyType::Central | GalaxyType::SatelliteWithSubhalo) {
            if central_index.is_some() {
                return Err(Error::invariant(
                    tree_index,
                    Some(halo),
                    None,
                    "more than one central/satellite-with-subhalo galaxy in one halo's contribution",
                ));
            }
            central_index = Some(i);
        }
    }
    if let Some(central) = central_index {
        for i in ngalstart..ngal {
            working.get_mut(i).central_gal = central as i32;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::Halo;

    fn root_halo(mvir: f32) -> Halo {
        Halo {
            first_halo_in_fof_group: 0,
            first_progenitor: NONE,
            mvir,
            len: 100,
            ..Halo::default()
        }
    }

    #[test]
    fn isolated_halo_with_no_progenitors_mints_one_fresh_central() {
        let store = HaloStore::new(vec![root_halo(1.0)]);
        let mut persistent = PersistentArena::new(10);
        let mut working = WorkingArena::new(10);
        let config = Config::default();
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);

        join_halo(0, 0, &store, &mut persistent, &mut working, &config, &cosmology).unwrap();

        assert_eq!(working.len(), 1);
        let g = working.get(0);
        assert_eq!(g.galaxy_type, GalaxyType::Central);
        assert_eq!(g.central_gal, 0);
        assert_eq!(g.merge_type, MergeType::None);
    }

    #[test]
    fn non_root_halo_with_no_progenitors_mints_nothing() {
        let mut halos = vec![root_halo(1.0), root_halo(1.0)];
        halos[1].first_halo_in_fof_group = 0;
        let store = HaloStore::new(halos);
        let mut persistent = PersistentArena::new(10);
        let mut working = WorkingArena::new(10);
        let config = Config::default();
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);

        join_halo(0, 1, &store, &mut persistent, &mut working, &config, &cosmology).unwrap();
        assert_eq!(working.len(), 0);
    }

    #[test]
    fn single_progenitor_galaxy_is_inherited_and_retyped_central() {
        let mut halos = vec![root_halo(1.0), root_halo(2.0)];
        halos[0].descendant = 1;
        halos[1].first_progenitor = 0;
        let mut store = HaloStore::new(halos);
        store.aux_mut(0).n_galaxies = 1;
        store.aux_mut(0).first_galaxy = 0;

        let mut persistent = PersistentArena::new(10);
        persistent.push(Galaxy {
            galaxy_type: GalaxyType::Central,
            mvir: 1.0,
            ..Galaxy::default()
        }).unwrap();

        let mut working = WorkingArena::new(10);
        let config = Config::default();
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);

        join_halo(0, 1, &store, &mut persistent, &mut working, &config, &cosmology).unwrap();

        assert_eq!(working.len(), 1);
        let g = working.get(0);
        assert_eq!(g.galaxy_type, GalaxyType::Central);
        assert!((g.mvir - 2.0).abs() < 1e-9);
        assert_eq!(g.halo_nr, 1);
    }

    #[test]
    fn already_merged_progenitor_galaxy_copies_through_as_inactive() {
        let mut halos = vec![root_halo(1.0), root_halo(2.0)];
        halos[0].descendant = 1;
        halos[1].first_progenitor = 0;
        let mut store = HaloStore::new(halos);
        store.aux_mut(0).n_galaxies = 1;
        store.aux_mut(0).first_galaxy = 0;

        let mut persistent = PersistentArena::new(10);
        persistent.push(Galaxy {
            galaxy_type: GalaxyType::MergedInactive,
            merge_type: MergeType::Minor,
            ..Galaxy::default()
        }).unwrap();

        let mut working = WorkingArena::new(10);
        let config = Config::default();
        let cosmology = Cosmology::from_tables(vec![1.0], vec![0.0], vec![1.0]);

        join_halo(0, 1, &store, &mut persistent, &mut working, &config, &cosmology).unwrap();

        assert_eq!(working.len(), 1);
        assert_eq!(working.get(0).galaxy_type, GalaxyType::MergedInactive);
    }
}
