//! Ram-pressure / tidal stripping of a satellite's hot-gas halo onto its
//! central.

use crate::arena::WorkingArena;
use crate::config::Config;
use crate::defaults::physics_internal::STRIPPING_EFFICIENCY;
use crate::halo::HaloStore;

/// Strip the linear excess of `satellite`'s hot gas above the baryon
/// fraction implied by its infall mass, depositing it (with metals) onto
/// `central`. Moves an exact amount between the two reservoirs, so
/// `HotGas_sat + HotGas_central` is conserved to the bit.
pub fn strip_from_satellite(
    working: &mut WorkingArena,
    satellite: usize,
    central: usize,
    _store: &HaloStore,
    _fof_root: i32,
    _config: &Config,
) {
    let expected_hot = crate::defaults::cosmology::BARYON_FRACTION
        * working.get(satellite).infall.mvir.max(0.0);
    let current_hot = working.get(satellite).reservoirs.hot_gas;
    let excess = (current_hot - expected_hot).max(0.0);
    let stripped = (excess * STRIPPING_EFFICIENCY).min(current_hot);
    if stripped <= 0.0 {
        return;
    }
    let metal_fraction = if current_hot > 0.0 {
        working.get(satellite).reservoirs.metals_hot_gas / current_hot
    } else {
        0.0
    };
    let stripped_metals = metal_fraction * stripped;

    {
        let sat = working.get_mut(satellite);
        sat.reservoirs.hot_gas -= stripped;
        sat.reservoirs.metals_hot_gas -= stripped_metals;
    }
    {
        let cen = working.get_mut(central);
        cen.reservoirs.hot_gas += stripped;
        cen.reservoirs.metals_hot_gas += stripped_metals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::Galaxy;
    use crate::halo::Halo;

    #[test]
    fn stripping_conserves_total_hot_gas() {
        let mut working = WorkingArena::new(4);
        let mut central = Galaxy {
            central_gal: 0,
            ..Galaxy::default()
        };
        central.reservoirs.hot_gas = 10.0;
        let mut satellite = Galaxy {
            central_gal: 0,
            ..Galaxy::default()
        };
        satellite.reservoirs.hot_gas = 1.0;
        satellite.infall.mvir = 0.0;

        let c = working.push(central).unwrap();
        let s = working.push(satellite).unwrap();

        let store = HaloStore::new(vec![Halo::default()]);
        let config = Config::default();
        let total_before =
            working.get(c).reservoirs.hot_gas + working.get(s).reservoirs.hot_gas;

        strip_from_satellite(&mut working, s, c, &store, 0, &config);

        let total_after =
            working.get(c).reservoirs.hot_gas + working.get(s).reservoirs.hot_gas;
        assert!((total_before - total_after).abs() < 1e-9);
        assert!(working.get(s).reservoirs.hot_gas <= 1.0 + 1e-9);
    }
}
