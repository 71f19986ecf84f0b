//! Disk instability check: transfers unstable disk stellar mass to the
//! bulge without retiring the galaxy from further physics.

use crate::arena::WorkingArena;
use crate::config::Config;
use crate::galaxy::MergeType;

/// Toomre-style stability threshold: a disk is unstable when its stellar
/// mass exceeds `Vmax^2 * DiskScaleRadius / G` by more than this factor.
const STABILITY_THRESHOLD: f64 = 1.0;

/// If `DiskInstabilityOn`, move the unstable fraction of disk stars to the
/// bulge and stamp `mergeType = DiskInstability`. The galaxy stays active
/// — this never sets `Type = MergedInactive`.
pub fn check_disk_instability(working: &mut WorkingArena, p: usize, config: &Config) {
    if !config.disk_instability_on {
        return;
    }
    let g = working.get_mut(p);
    if g.disk_scale_radius <= 0.0 || g.vmax <= 0.0 {
        return;
    }
    let disk_mass = g.reservoirs.stellar_mass - g.reservoirs.bulge_mass;
    if disk_mass <= 0.0 {
        return;
    }
    let critical_mass = crate::cosmology::GRAVITY.recip()
        * (g.vmax as f64).powi(2)
        * g.disk_scale_radius
        * STABILITY_THRESHOLD;
    if disk_mass <= critical_mass {
        return;
    }
    let unstable = disk_mass - critical_mass;
    let metal_fraction = if g.reservoirs.stellar_mass > 0.0 {
        g.reservoirs.metals_stellar_mass / g.reservoirs.stellar_mass
    } else {
        0.0
    };
    g.reservoirs.bulge_mass += unstable;
    g.reservoirs.metals_bulge_mass += metal_fraction * unstable;
    g.merge_type = MergeType::DiskInstability;
}
