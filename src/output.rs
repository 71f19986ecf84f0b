//! # Output Stage (C8)
//!
//! Two responsibilities, run at the end of every FOF-group evaluation and
//! again at the end of every file:
//!
//! - [`finalize_fof_group`] converts a working slice's survivors into
//!   persistent-arena records, stamps the merge-link correction onto every
//!   galaxy that merged away this step, and accumulates `TotalSatelliteBaryons`
//!   at the central.
//! - [`SnapshotWriter`] collects [`GalaxyOutput`] records across every tree in
//!   a file for one target snapshot and flushes them to disk in the
//!   `{Ntrees}{TotGalaxiesThisFile}{TreeNgalsForThisSnap}{records}` layout.
//!
//! `GalaxyIndex`/`CentralGalaxyIndex` are a reversible packing of
//! `(file_nr, tree_index, GalaxyNr)` into a single `i64` — see
//! [`encode_galaxy_index`]/[`decode_galaxy_index`].

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::arena::{PersistentArena, WorkingArena};
use crate::defaults::STEPS;
use crate::error::{Error, Result};
use crate::galaxy::{Galaxy, GalaxyType, MergeType, SfrHistory};
use crate::halo::{HaloStore, NONE};

const GALAXY_NR_BITS: u32 = 40;
const TREE_INDEX_BITS: u32 = 16;
const FILE_NR_BITS: u32 = 8;
const GALAXY_NR_MASK: i64 = (1i64 << GALAXY_NR_BITS) - 1;
const TREE_INDEX_MASK: i64 = (1i64 << TREE_INDEX_BITS) - 1;

/// Pack `(file_nr, tree_index, galaxy_nr)` into a single collision-free
/// `i64`. Reversible by [`decode_galaxy_index`].
pub fn encode_galaxy_index(file_nr: u32, tree_index: usize, galaxy_nr: i64) -> Result<i64> {
    if !(0..=GALAXY_NR_MASK).contains(&galaxy_nr) {
        return Err(Error::resource(format!(
            "GalaxyNr {galaxy_nr} does not fit in {GALAXY_NR_BITS} bits"
        )));
    }
    if tree_index as i64 > TREE_INDEX_MASK {
        return Err(Error::resource(format!(
            "tree index {tree_index} does not fit in {TREE_INDEX_BITS} bits"
        )));
    }
    if file_nr >= (1u32 << FILE_NR_BITS) {
        return Err(Error::resource(format!(
            "file number {file_nr} does not fit in {FILE_NR_BITS} bits"
        )));
    }
    Ok(galaxy_nr
        | ((tree_index as i64) << GALAXY_NR_BITS)
        | ((file_nr as i64) << (GALAXY_NR_BITS + TREE_INDEX_BITS)))
}

/// Inverse of [`encode_galaxy_index`]: returns `(file_nr, tree_index, galaxy_nr)`.
pub fn decode_galaxy_index(index: i64) -> (u32, usize, i64) {
    let galaxy_nr = index & GALAXY_NR_MASK;
    let tree_index = ((index >> GALAXY_NR_BITS) & TREE_INDEX_MASK) as usize;
    let file_nr = (index >> (GALAXY_NR_BITS + TREE_INDEX_BITS)) as u32;
    (file_nr, tree_index, galaxy_nr)
}

fn collapse_sfr(sfr: &SfrHistory) -> (f32, f32, f32, f32) {
    let steps = STEPS as f64;
    let sfr_disk = sfr.disk.iter().sum::<f64>() / steps;
    let sfr_bulge = sfr.bulge.iter().sum::<f64>() / steps;
    let disk_cold: f64 = sfr.disk_cold_gas.iter().sum();
    let disk_cold_metals: f64 = sfr.disk_cold_gas_metals.iter().sum();
    let sfr_disk_z = if disk_cold > 0.0 { disk_cold_metals / disk_cold } else { 0.0 };
    let bulge_cold: f64 = sfr.bulge_cold_gas.iter().sum();
    let bulge_cold_metals: f64 = sfr.bulge_cold_gas_metals.iter().sum();
    let sfr_bulge_z = if bulge_cold > 0.0 { bulge_cold_metals / bulge_cold } else { 0.0 };
    (sfr_disk as f32, sfr_bulge as f32, sfr_disk_z as f32, sfr_bulge_z as f32)
}

/// One persisted galaxy catalogue row. Float fields are `f32` to match the
/// tree source's own on-disk precision; the per-substep SFR history
/// collapses to the four scalars named in the external-interface contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalaxyOutput {
    pub galaxy_index: i64,
    pub central_galaxy_index: i64,
    pub sage_tree_index: i32,
    pub sage_halo_index: i32,
    pub simulation_halo_index: i64,
    pub galaxy_type: i32,
    pub snap_num: i32,
    pub merge_type: i32,
    pub merge_into_id: i32,
    pub merge_into_snap_num: i32,

    pub pos: [f32; 3],
    pub vel: [f32; 3],
    pub len: i32,
    pub mvir: f32,
    pub central_mvir: f32,
    pub rvir: f32,
    pub vvir: f32,
    pub vmax: f32,

    pub cold_gas: f32,
    pub stellar_mass: f32,
    pub bulge_mass: f32,
    pub hot_gas: f32,
    pub ejected_mass: f32,
    pub black_hole_mass: f32,
    pub ics: f32,
    pub metals_cold_gas: f32,
    pub metals_stellar_mass: f32,
    pub metals_bulge_mass: f32,
    pub metals_hot_gas: f32,
    pub metals_ejected_mass: f32,
    pub metals_ics: f32,

    pub sfr_disk: f32,
    pub sfr_bulge: f32,
    pub sfr_disk_z: f32,
    pub sfr_bulge_z: f32,

    pub disk_scale_radius: f32,
    pub cooling: f32,
    pub heating: f32,
    pub quasar_mode_bh_accretion_mass: f32,
    pub time_of_last_major_merger: f32,
    pub time_of_last_minor_merger: f32,
    pub outflow_rate: f32,
    pub total_satellite_baryons: f32,

    pub infall_mvir: f32,
    pub infall_vvir: f32,
    pub infall_vmax: f32,
}

/// Flatten one persisted [`Galaxy`] into its output record. `file_nr` and
/// `tree_index` supply the provenance fields `GalaxyIndex` is packed from.
pub fn build_output_record(g: &Galaxy, file_nr: u32, tree_index: usize) -> Result<GalaxyOutput> {
    let (sfr_disk, sfr_bulge, sfr_disk_z, sfr_bulge_z) = collapse_sfr(&g.sfr);
    let galaxy_index = encode_galaxy_index(file_nr, tree_index, g.galaxy_nr)?;
    let central_galaxy_index = if g.central_galaxy_nr >= 0 {
        encode_galaxy_index(file_nr, tree_index, g.central_galaxy_nr)?
    } else {
        NONE as i64
    };
    Ok(GalaxyOutput {
        galaxy_index,
        central_galaxy_index,
        sage_tree_index: tree_index as i32,
        sage_halo_index: g.halo_nr,
        simulation_halo_index: g.most_bound_id,
        galaxy_type: g.galaxy_type.as_u8() as i32,
        snap_num: g.snap_num,
        merge_type: g.merge_type.as_u8() as i32,
        merge_into_id: g.merge_into_id,
        merge_into_snap_num: g.merge_into_snap_num,
        pos: g.pos,
        vel: g.vel,
        len: g.len,
        mvir: g.mvir as f32,
        central_mvir: g.central_mvir as f32,
        rvir: g.rvir as f32,
        vvir: g.vvir as f32,
        vmax: g.vmax as f32,
        cold_gas: g.reservoirs.cold_gas as f32,
        stellar_mass: g.reservoirs.stellar_mass as f32,
        bulge_mass: g.reservoirs.bulge_mass as f32,
        hot_gas: g.reservoirs.hot_gas as f32,
        ejected_mass: g.reservoirs.ejected_mass as f32,
        black_hole_mass: g.reservoirs.black_hole_mass as f32,
        ics: g.reservoirs.ics as f32,
        metals_cold_gas: g.reservoirs.metals_cold_gas as f32,
        metals_stellar_mass: g.reservoirs.metals_stellar_mass as f32,
        metals_bulge_mass: g.reservoirs.metals_bulge_mass as f32,
        metals_hot_gas: g.reservoirs.metals_hot_gas as f32,
        metals_ejected_mass: g.reservoirs.metals_ejected_mass as f32,
        metals_ics: g.reservoirs.metals_ics as f32,
        sfr_disk,
        sfr_bulge,
        sfr_disk_z,
        sfr_bulge_z,
        disk_scale_radius: g.disk_scale_radius as f32,
        cooling: g.cooling as f32,
        heating: g.heating as f32,
        quasar_mode_bh_accretion_mass: g.quasar_mode_bh_accretion_mass as f32,
        time_of_last_major_merger: g.time_of_last_major_merger as f32,
        time_of_last_minor_merger: g.time_of_last_minor_merger as f32,
        outflow_rate: g.outflow_rate as f32,
        total_satellite_baryons: g.total_satellite_baryons as f32,
        infall_mvir: g.infall.mvir as f32,
        infall_vvir: g.infall.vvir as f32,
        infall_vmax: g.infall.vmax as f32,
    })
}

fn write_record(w: &mut impl Write, r: &GalaxyOutput) -> Result<()> {
    w.write_i64::<LittleEndian>(r.galaxy_index)?;
    w.write_i64::<LittleEndian>(r.central_galaxy_index)?;
    w.write_i32::<LittleEndian>(r.sage_tree_index)?;
    w.write_i32::<LittleEndian>(r.sage_halo_index)?;
    w.write_i64::<LittleEndian>(r.simulation_halo_index)?;
    w.write_i32::<LittleEndian>(r.galaxy_type)?;
    w.write_i32::<LittleEndian>(r.snap_num)?;
    w.write_i32::<LittleEndian>(r.merge_type)?;
    w.write_i32::<LittleEndian>(r.merge_into_id)?;
    w.write_i32::<LittleEndian>(r.merge_into_snap_num)?;
    for v in r.pos {
        w.write_f32::<LittleEndian>(v)?;
    }
    for v in r.vel {
        w.write_f32::<LittleEndian>(v)?;
    }
    w.write_i32::<LittleEndian>(r.len)?;
    for v in [r.mvir, r.central_mvir, r.rvir, r.vvir, r.vmax] {
        w.write_f32::<LittleEndian>(v)?;
    }
    for v in [
        r.cold_gas,
        r.stellar_mass,
        r.bulge_mass,
        r.hot_gas,
        r.ejected_mass,
        r.black_hole_mass,
        r.ics,
        r.metals_cold_gas,
        r.metals_stellar_mass,
        r.metals_bulge_mass,
        r.metals_hot_gas,
        r.metals_ejected_mass,
        r.metals_ics,
        r.sfr_disk,
        r.sfr_bulge,
        r.sfr_disk_z,
        r.sfr_bulge_z,
        r.disk_scale_radius,
        r.cooling,
        r.heating,
        r.quasar_mode_bh_accretion_mass,
        r.time_of_last_major_merger,
        r.time_of_last_minor_merger,
        r.outflow_rate,
        r.total_satellite_baryons,
        r.infall_mvir,
        r.infall_vvir,
        r.infall_vmax,
    ] {
        w.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

fn read_record(r: &mut impl Read) -> Result<GalaxyOutput> {
    let galaxy_index = r.read_i64::<LittleEndian>()?;
    let central_galaxy_index = r.read_i64::<LittleEndian>()?;
    let sage_tree_index = r.read_i32::<LittleEndian>()?;
    let sage_halo_index = r.read_i32::<LittleEndian>()?;
    let simulation_halo_index = r.read_i64::<LittleEndian>()?;
    let galaxy_type = r.read_i32::<LittleEndian>()?;
    let snap_num = r.read_i32::<LittleEndian>()?;
    let merge_type = r.read_i32::<LittleEndian>()?;
    let merge_into_id = r.read_i32::<LittleEndian>()?;
    let merge_into_snap_num = r.read_i32::<LittleEndian>()?;
    let mut pos = [0.0f32; 3];
    for v in pos.iter_mut() {
        *v = r.read_f32::<LittleEndian>()?;
    }
    let mut vel = [0.0f32; 3];
    for v in vel.iter_mut() {
        *v = r.read_f32::<LittleEndian>()?;
    }
    let len = r.read_i32::<LittleEndian>()?;
    let mvir = r.read_f32::<LittleEndian>()?;
    let central_mvir = r.read_f32::<LittleEndian>()?;
    let rvir = r.read_f32::<LittleEndian>()?;
    let vvir = r.read_f32::<LittleEndian>()?;
    let vmax = r.read_f32::<LittleEndian>()?;
    let mut rest = [0.0f32; 28];
    for v in rest.iter_mut() {
        *v = r.read_f32::<LittleEndian>()?;
    }
    Ok(GalaxyOutput {
        galaxy_index,
        central_galaxy_index,
        sage_tree_index,
        sage_halo_index,
        simulation_halo_index,
        galaxy_type,
        snap_num,
        merge_type,
        merge_into_id,
        merge_into_snap_num,
        pos,
        vel,
        len,
        mvir,
        central_mvir,
        rvir,
        vvir,
        vmax,
        cold_gas: rest[0],
        stellar_mass: rest[1],
        bulge_mass: rest[2],
        hot_gas: rest[3],
        ejected_mass: rest[4],
        black_hole_mass: rest[5],
        ics: rest[6],
        metals_cold_gas: rest[7],
        metals_stellar_mass: rest[8],
        metals_bulge_mass: rest[9],
        metals_hot_gas: rest[10],
        metals_ejected_mass: rest[11],
        metals_ics: rest[12],
        sfr_disk: rest[13],
        sfr_bulge: rest[14],
        sfr_disk_z: rest[15],
        sfr_bulge_z: rest[16],
        disk_scale_radius: rest[17],
        cooling: rest[18],
        heating: rest[19],
        quasar_mode_bh_accretion_mass: rest[20],
        time_of_last_major_merger: rest[21],
        time_of_last_minor_merger: rest[22],
        outflow_rate: rest[23],
        total_satellite_baryons: rest[24],
        infall_mvir: rest[25],
        infall_vvir: rest[26],
        infall_vmax: rest[27],
    })
}

/// Convert one working slice's survivors into persistent-arena records,
/// correct merged galaxies' `mergeIntoID` to reference their target's
/// output slot, and update `HaloAux` bookkeeping for `fof_root`. See §4.8.
pub fn finalize_fof_group(
    fof_root: i32,
    working: &mut WorkingArena,
    persistent: &mut PersistentArena,
    store: &mut HaloStore,
) -> Result<()> {
    let ngal = working.len();
    if ngal == 0 {
        return Ok(());
    }

    let central_local = (0..ngal).find(|&p| {
        matches!(
            working.get(p).galaxy_type,
            GalaxyType::Central | GalaxyType::SatelliteWithSubhalo
        )
    });
    if let Some(c) = central_local {
        let mut total = 0.0;
        for p in 0..ngal {
            if p == c {
                continue;
            }
            let g = working.get(p);
            if g.galaxy_type != GalaxyType::MergedInactive {
                total += g.reservoirs.stellar_mass + g.reservoirs.cold_gas;
            }
        }
        working.get_mut(c).total_satellite_baryons = total;
    }

    let mut local_to_output: Vec<Option<usize>> = vec![None; ngal];
    let first_galaxy_slot = persistent.len();
    for p in 0..ngal {
        if working.get(p).galaxy_type != GalaxyType::MergedInactive {
            let idx = persistent.push(working.get(p).clone())?;
            local_to_output[p] = Some(idx);
        }
    }

    for p in 0..ngal {
        let central_local_of_p = working.get(p).central_gal.max(0) as usize;
        if let (Some(own_idx), Some(central_idx)) = (
            local_to_output[p],
            local_to_output.get(central_local_of_p).copied().flatten(),
        ) {
            let central_nr = persistent.get(central_idx).galaxy_nr;
            persistent.get_mut(own_idx).central_galaxy_nr = central_nr;
        }
    }

    for p in 0..ngal {
        let (galaxy_type, merge_type, merge_into_id_raw, galaxy_nr) = {
            let g = working.get(p);
            (g.galaxy_type, g.merge_type, g.merge_into_id, g.galaxy_nr)
        };
        // Only galaxies that actually merged away need their catalogue
        // record's merge-link corrected; disk-instability survivors keep
        // their own freshly-persisted record untouched.
        if galaxy_type != GalaxyType::MergedInactive {
            continue;
        }
        let target_local = (merge_into_id_raw - ngal as i32).max(0) as usize;
        let corrected_id = local_to_output
            .get(target_local)
            .copied()
            .flatten()
            .map(|idx| idx as i32)
            .unwrap_or(NONE);
        if let Some(slot) = persistent.find_latest_by_nr(galaxy_nr) {
            let rec = persistent.get_mut(slot);
            rec.merge_type = merge_type;
            rec.merge_into_id = corrected_id;
            rec.merge_into_snap_num = store.halo(fof_root).snap_num;
        }
    }

    store.aux_mut(fof_root).first_galaxy = first_galaxy_slot as i32;
    store.aux_mut(fof_root).n_galaxies = (persistent.len() - first_galaxy_slot) as i32;

    Ok(())
}

/// Accumulates every surviving galaxy at one target snapshot across every
/// tree in a file, in tree-processed order, ready to flush to disk.
pub struct SnapshotWriter {
    snapshot: usize,
    tree_counts: Vec<i32>,
    records: Vec<GalaxyOutput>,
}

impl SnapshotWriter {
    pub fn new(snapshot: usize, ntrees: usize) -> Self {
        Self {
            snapshot,
            tree_counts: vec![0; ntrees],
            records: Vec::new(),
        }
    }

    /// Scan one tree's persisted galaxies for ones at this writer's target
    /// snapshot and queue their output records.
    pub fn add_tree(&mut self, tree_index: usize, galaxies: &[Galaxy], file_nr: u32) -> Result<()> {
        let mut count = 0i32;
        for g in galaxies {
            if g.snap_num as usize != self.snapshot {
                continue;
            }
            self.records.push(build_output_record(g, file_nr, tree_index)?);
            count += 1;
        }
        self.tree_counts[tree_index] = count;
        Ok(())
    }

    pub fn total_galaxies(&self) -> usize {
        self.records.len()
    }

    /// Write the `{Ntrees}{TotGalaxiesThisFile}{TreeNgalsForThisSnap}{records}`
    /// layout to `path`, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file =
            File::create(path).map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;
        let mut w = BufWriter::new(file);
        w.write_i32::<LittleEndian>(self.tree_counts.len() as i32)?;
        w.write_i32::<LittleEndian>(self.records.len() as i32)?;
        for &c in &self.tree_counts {
            w.write_i32::<LittleEndian>(c)?;
        }
        for r in &self.records {
            write_record(&mut w, r)?;
        }
        w.flush()?;
        Ok(())
    }
}

/// Read back a galaxy output file written by [`SnapshotWriter::write_to`].
/// Returns `(tree_counts, records)`. Used by tests and the `info` command.
pub fn read_galaxy_file(path: &Path) -> Result<(Vec<i32>, Vec<GalaxyOutput>)> {
    let file =
        File::open(path).map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;
    let mut r = BufReader::new(file);
    let ntrees = r.read_i32::<LittleEndian>()?;
    let total = r.read_i32::<LittleEndian>()?;
    let mut tree_counts = Vec::with_capacity(ntrees as usize);
    for _ in 0..ntrees {
        tree_counts.push(r.read_i32::<LittleEndian>()?);
    }
    let mut records = Vec::with_capacity(total as usize);
    for _ in 0..total {
        records.push(read_record(&mut r)?);
    }
    Ok((tree_counts, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::Halo;

    #[test]
    fn galaxy_index_round_trips() {
        let encoded = encode_galaxy_index(7, 42, 123_456).unwrap();
        assert_eq!(decode_galaxy_index(encoded), (7, 42, 123_456));
    }

    #[test]
    fn galaxy_index_rejects_oversized_galaxy_nr() {
        assert!(encode_galaxy_index(0, 0, 1i64 << GALAXY_NR_BITS).is_err());
    }

    #[test]
    fn finalize_moves_survivors_into_persistent_arena_and_stamps_merge_link() {
        let mut working = WorkingArena::new(4);
        let mut central = Galaxy {
            galaxy_type: GalaxyType::Central,
            central_gal: 0,
            galaxy_nr: 0,
            ..Galaxy::default()
        };
        central.reservoirs.stellar_mass = 1.0;
        let c = working.push(central).unwrap();

        let mut satellite = Galaxy {
            galaxy_type: GalaxyType::MergedInactive,
            merge_type: MergeType::Minor,
            central_gal: 0,
            galaxy_nr: 1,
            merge_into_id: 2 + c as i32,
            ..Galaxy::default()
        };
        satellite.reservoirs.stellar_mass = 0.0;
        working.push(satellite).unwrap();

        let mut persistent = PersistentArena::new(10);
        let mut store = HaloStore::new(vec![Halo {
            snap_num: 3,
            ..Halo::default()
        }]);

        finalize_fof_group(0, &mut working, &mut persistent, &mut store).unwrap();

        assert_eq!(persistent.len(), 1);
        assert_eq!(store.aux(0).n_galaxies, 1);
        let survivor = persistent.get(0);
        assert_eq!(survivor.galaxy_nr, 0);

        let merged_slot = persistent.find_latest_by_nr(1);
        assert!(merged_slot.is_none(), "merged galaxy is not itself persisted");
    }

    #[test]
    fn snapshot_writer_round_trips_through_disk() {
        let mut writer = SnapshotWriter::new(5, 1);
        let mut g = Galaxy {
            snap_num: 5,
            galaxy_nr: 9,
            galaxy_type: GalaxyType::Central,
            ..Galaxy::default()
        };
        g.pos = [1.0, 2.0, 3.0];
        g.reservoirs.cold_gas = 0.5;
        writer.add_tree(0, &[g], 3).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("galsam_output_test_{:p}.bin", &dir));
        writer.write_to(&path).unwrap();

        let (tree_counts, records) = read_galaxy_file(&path).unwrap();
        assert_eq!(tree_counts, vec![1]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pos, [1.0, 2.0, 3.0]);
        assert!((records[0].cold_gas - 0.5).abs() < 1e-6);
        let (file_nr, tree_index, galaxy_nr) = decode_galaxy_index(records[0].galaxy_index);
        assert_eq!((file_nr, tree_index, galaxy_nr), (3, 0, 9));

        let _ = std::fs::remove_file(&path);
    }
}
