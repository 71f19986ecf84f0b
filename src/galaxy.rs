//! # Galaxy Data Model
//!
//! `Galaxy` is shared by both the transient working array and the
//! persistent per-tree array; what differs between the two is only which
//! arena owns the slot ([`crate::arena`]). `Type` is re-derived nowhere
//! else: every stage that changes a galaxy's role writes `Type` directly.

use crate::defaults::STEPS;

/// A galaxy's role at a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalaxyType {
    /// Sits at the center of a FOF group's main halo.
    Central = 0,
    /// Still has its own distinct subhalo.
    SatelliteWithSubhalo = 1,
    /// Subhalo was stripped away or disrupted; tracked only by lineage.
    Orphan = 2,
    /// Merged, disrupted, or otherwise retired; excluded from physics.
    MergedInactive = 3,
}

impl GalaxyType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => GalaxyType::Central,
            1 => GalaxyType::SatelliteWithSubhalo,
            2 => GalaxyType::Orphan,
            _ => GalaxyType::MergedInactive,
        }
    }
}

/// Merger classification, stamped by the merger/disruption stage (C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeType {
    None = 0,
    Minor = 1,
    Major = 2,
    DiskInstability = 3,
    DisruptToIcs = 4,
}

impl MergeType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => MergeType::None,
            1 => MergeType::Minor,
            2 => MergeType::Major,
            3 => MergeType::DiskInstability,
            _ => MergeType::DisruptToIcs,
        }
    }
}

/// A galaxy's baryon and metal reservoirs. Split out from [`Galaxy`] so the
/// conservation invariants (§3 invariant 1) can be checked against one
/// small, easily-enumerable struct.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reservoirs {
    pub cold_gas: f64,
    pub stellar_mass: f64,
    pub bulge_mass: f64,
    pub hot_gas: f64,
    pub ejected_mass: f64,
    pub black_hole_mass: f64,
    pub ics: f64,

    pub metals_cold_gas: f64,
    pub metals_stellar_mass: f64,
    pub metals_bulge_mass: f64,
    pub metals_hot_gas: f64,
    pub metals_ejected_mass: f64,
    pub metals_ics: f64,
}

impl Reservoirs {
    /// True iff every gas/mass reservoir is non-negative and every metal
    /// reservoir is non-negative and does not exceed its host reservoir.
    pub fn is_physical(&self, epsilon: f64) -> bool {
        let non_negative = [
            self.cold_gas,
            self.stellar_mass,
            self.bulge_mass,
            self.hot_gas,
            self.ejected_mass,
            self.black_hole_mass,
            self.ics,
            self.metals_cold_gas,
            self.metals_stellar_mass,
            self.metals_bulge_mass,
            self.metals_hot_gas,
            self.metals_ejected_mass,
            self.metals_ics,
        ]
        .iter()
        .all(|&v| v >= -epsilon);

        non_negative
            && self.metals_cold_gas <= self.cold_gas + epsilon
            && self.metals_hot_gas <= self.hot_gas + epsilon
            && self.metals_ejected_mass <= self.ejected_mass + epsilon
            && self.metals_stellar_mass <= self.stellar_mass + epsilon
            && self.metals_bulge_mass <= self.bulge_mass + epsilon
    }
}

/// Per-substep star-formation-rate accumulators, reset at the start of each
/// `evolve` call and collapsed to scalars by the output stage.
#[derive(Debug, Clone, Copy)]
pub struct SfrHistory {
    pub disk: [f64; STEPS],
    pub bulge: [f64; STEPS],
    pub disk_cold_gas: [f64; STEPS],
    pub disk_cold_gas_metals: [f64; STEPS],
    pub bulge_cold_gas: [f64; STEPS],
    pub bulge_cold_gas_metals: [f64; STEPS],
}

impl Default for SfrHistory {
    fn default() -> Self {
        Self {
            disk: [0.0; STEPS],
            bulge: [0.0; STEPS],
            disk_cold_gas: [0.0; STEPS],
            disk_cold_gas_metals: [0.0; STEPS],
            bulge_cold_gas: [0.0; STEPS],
            bulge_cold_gas_metals: [0.0; STEPS],
        }
    }
}

/// Infall-time kinematic snapshot, taken the moment a galaxy stops being a
/// central (join stage, §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct InfallSnapshot {
    pub mvir: f64,
    pub vvir: f64,
    pub vmax: f64,
}

/// One galaxy, at one snapshot, in either the working array or the
/// persistent arena. Index-addressed throughout; never referenced by
/// pointer, so arena growth never invalidates a live handle.
#[derive(Debug, Clone)]
pub struct Galaxy {
    pub snap_num: i32,
    pub galaxy_type: GalaxyType,
    pub galaxy_nr: i64,
    pub central_gal: i32,
    pub halo_nr: i32,
    pub most_bound_id: i64,
    /// `GalaxyNr` of this slot's central, stamped by the output stage's
    /// compaction pass once both this galaxy and its central have a
    /// persistent-arena slot. `NONE` until then.
    pub central_galaxy_nr: i64,

    pub merge_type: MergeType,
    pub merge_into_id: i32,
    pub merge_into_snap_num: i32,
    pub d_t: f64,

    pub pos: [f32; 3],
    pub vel: [f32; 3],
    pub len: i32,
    pub mvir: f64,
    pub delta_mvir: f64,
    pub central_mvir: f64,
    pub rvir: f64,
    pub vvir: f64,
    pub vmax: f64,

    pub reservoirs: Reservoirs,
    pub sfr: SfrHistory,

    pub disk_scale_radius: f64,
    pub merge_time: f64,
    pub cooling: f64,
    pub heating: f64,
    pub r_heat: f64,
    pub quasar_mode_bh_accretion_mass: f64,
    pub time_of_last_major_merger: f64,
    pub time_of_last_minor_merger: f64,
    pub outflow_rate: f64,
    pub total_satellite_baryons: f64,

    pub infall: InfallSnapshot,
}

impl Default for Galaxy {
    fn default() -> Self {
        Self {
            snap_num: 0,
            galaxy_type: GalaxyType::Central,
            galaxy_nr: 0,
            central_gal: 0,
            halo_nr: crate::halo::NONE,
            most_bound_id: 0,
            central_galaxy_nr: crate::halo::NONE as i64,
            merge_type: MergeType::None,
            merge_into_id: crate::halo::NONE,
            merge_into_snap_num: crate::halo::NONE,
            d_t: 0.0,
            pos: [0.0; 3],
            vel: [0.0; 3],
            len: 0,
            mvir: 0.0,
            delta_mvir: 0.0,
            central_mvir: 0.0,
            rvir: 0.0,
            vvir: 0.0,
            vmax: 0.0,
            reservoirs: Reservoirs::default(),
            sfr: SfrHistory::default(),
            disk_scale_radius: 0.0,
            merge_time: f64::INFINITY,
            cooling: 0.0,
            heating: 0.0,
            r_heat: 0.0,
            quasar_mode_bh_accretion_mass: 0.0,
            time_of_last_major_merger: -1.0,
            time_of_last_minor_merger: -1.0,
            outflow_rate: 0.0,
            total_satellite_baryons: 0.0,
            infall: InfallSnapshot::default(),
        }
    }
}

impl Galaxy {
    /// Resets the per-substep SFR accumulators and per-evolve-call scalars
    /// that the join stage clears when a galaxy is freshly adopted from its
    /// most-massive-occupied progenitor.
    pub fn reset_evolution_accumulators(&mut self) {
        self.sfr = SfrHistory::default();
        self.cooling = 0.0;
        self.heating = 0.0;
        self.outflow_rate = 0.0;
    }

    /// A galaxy is active — still evolved and still persisted to the
    /// catalogue — unless it has actually merged or disrupted away.
    /// Disk instability stamps `merge_type` but leaves `galaxy_type`
    /// untouched, so it must not key off `merge_type` alone.
    pub fn is_active(&self) -> bool {
        self.galaxy_type != GalaxyType::MergedInactive
    }
}
