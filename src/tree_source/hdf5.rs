//! HDF5 tree-source backend (`feature = "hdf5-source"`).
//!
//! Reads the same logical tree table and halo arrays as
//! [`super::binary`], but from an HDF5 file: a header group carrying
//! `Ntrees`/`totNHalos`/`TreeNHalos`, and one `tree_NNN` group per tree
//! holding named per-halo scalar and 3-vector datasets.

use hdf5::File as Hdf5File;

use crate::error::{Error, Result};
use crate::halo::Halo;

use super::{TreeSource, TreeTable};

/// Reads a single HDF5 tree file.
pub struct Hdf5TreeSource {
    path: std::path::PathBuf,
    file: Option<Hdf5File>,
    halos_per_tree: Vec<i32>,
}

impl Hdf5TreeSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            halos_per_tree: Vec::new(),
        }
    }

    fn path_string(&self) -> String {
        self.path.display().to_string()
    }

    fn file(&self) -> Result<&Hdf5File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::io(self.path_string(), "tree source not open".to_string()))
    }
}

impl TreeSource for Hdf5TreeSource {
    fn open(&mut self) -> Result<TreeTable> {
        let file = Hdf5File::open(&self.path)
            .map_err(|e| Error::io(self.path_string(), e.to_string()))?;

        let ntrees: i64 = file
            .attr("Ntrees")
            .and_then(|a| a.read_scalar::<i64>())
            .map_err(|e| Error::format(self.path_string(), None, format!("missing Ntrees attribute: {e}")))?;
        let tot_n_halos: i64 = file
            .attr("totNHalos")
            .and_then(|a| a.read_scalar::<i64>())
            .map_err(|e| {
                Error::format(self.path_string(), None, format!("missing totNHalos attribute: {e}"))
            })?;

        if ntrees <= 0 || ntrees > crate::defaults::MAX_NTREES as i64 || tot_n_halos <= 0
            || tot_n_halos > crate::defaults::MAX_TOT_NHALOS
        {
            return Err(Error::format(
                self.path_string(),
                None,
                "Ntrees/totNHalos fail sanity bounds".to_string(),
            ));
        }
        let ntrees = ntrees as usize;
        let tot_n_halos = tot_n_halos as usize;

        let halos_per_tree: Vec<i32> = file
            .attr("TreeNHalos")
            .and_then(|a| a.read_raw::<i32>())
            .map_err(|e| {
                Error::format(self.path_string(), None, format!("missing TreeNHalos attribute: {e}"))
            })?;
        if halos_per_tree.len() != ntrees {
            return Err(Error::format(
                self.path_string(),
                None,
                format!(
                    "TreeNHalos has {} entries but Ntrees declares {ntrees}",
                    halos_per_tree.len()
                ),
            ));
        }
        let declared_total: i64 = halos_per_tree.iter().map(|&n| n as i64).sum();
        if declared_total != tot_n_halos as i64 {
            return Err(Error::format(
                self.path_string(),
                None,
                format!(
                    "sum of TreeNHalos ({declared_total}) does not match totNHalos ({tot_n_halos})"
                ),
            ));
        }

        self.halos_per_tree = halos_per_tree.clone();
        self.file = Some(file);

        Ok(TreeTable {
            ntrees,
            tot_n_halos,
            halos_per_tree,
        })
    }

    fn load_tree(&mut self, tree_index: usize) -> Result<Vec<Halo>> {
        let path = self.path_string();
        if tree_index >= self.halos_per_tree.len() {
            return Err(Error::format(path, Some(tree_index), "tree index out of range".to_string()));
        }
        let n = self.halos_per_tree[tree_index] as usize;
        let file = self.file()?;
        let group = file
            .group(&format!("tree_{tree_index:03}"))
            .map_err(|e| Error::format(path.clone(), Some(tree_index), format!("missing tree group: {e}")))?;

        let read_i32 = |name: &str| -> Result<Vec<i32>> {
            group
                .dataset(name)
                .and_then(|d| d.read_raw::<i32>())
                .map_err(|e| Error::format(path.clone(), Some(tree_index), format!("dataset {name}: {e}")))
        };
        let read_i64 = |name: &str| -> Result<Vec<i64>> {
            group
                .dataset(name)
                .and_then(|d| d.read_raw::<i64>())
                .map_err(|e| Error::format(path.clone(), Some(tree_index), format!("dataset {name}: {e}")))
        };
        let read_f32 = |name: &str| -> Result<Vec<f32>> {
            group
                .dataset(name)
                .and_then(|d| d.read_raw::<f32>())
                .map_err(|e| Error::format(path.clone(), Some(tree_index), format!("dataset {name}: {e}")))
        };
        let read_vec3 = |name: &str| -> Result<Vec<[f32; 3]>> {
            let flat: Vec<f32> = group
                .dataset(name)
                .and_then(|d| d.read_raw::<f32>())
                .map_err(|e| Error::format(path.clone(), Some(tree_index), format!("dataset {name}: {e}")))?;
            if flat.len() != n * 3 {
                return Err(Error::format(
                    path.clone(),
                    Some(tree_index),
                    format!("dataset {name} has {} entries, expected {}", flat.len(), n * 3),
                ));
            }
            Ok((0..n).map(|i| [flat[i * 3], flat[i * 3 + 1], flat[i * 3 + 2]]).collect())
        };

        let descendant = read_i32("Descendant")?;
        let first_progenitor = read_i32("FirstProgenitor")?;
        let next_progenitor = read_i32("NextProgenitor")?;
        let first_halo_in_fof_group = read_i32("FirstHaloInFOFgroup")?;
        let next_halo_in_fof_group = read_i32("NextHaloInFOFgroup")?;
        let len = read_i32("Len")?;
        let mvir = read_f32("Mvir")?;
        let m_mean200 = read_f32("M_mean200")?;
        let m_top_hat = read_f32("M_TopHat")?;
        let vel_disp = read_f32("VelDisp")?;
        let vmax = read_f32("Vmax")?;
        let sub_half_mass = read_f32("SubHalfMass")?;
        let pos = read_vec3("Pos")?;
        let vel = read_vec3("Vel")?;
        let spin = read_vec3("Spin")?;
        let most_bound_id = read_i64("MostBoundID")?;
        let snap_num = read_i32("SnapNum")?;
        let file_nr = read_i32("Filenr")?;
        let subhalo_index = read_i32("SubHaloIndex")?;

        let mut halos = Vec::with_capacity(n);
        for i in 0..n {
            halos.push(Halo {
                descendant: descendant[i],
                first_progenitor: first_progenitor[i],
                next_progenitor: next_progenitor[i],
                first_halo_in_fof_group: first_halo_in_fof_group[i],
                next_halo_in_fof_group: next_halo_in_fof_group[i],
                len: len[i],
                mvir: mvir[i],
                m_mean200: m_mean200[i],
                m_top_hat: m_top_hat[i],
                vel_disp: vel_disp[i],
                vmax: vmax[i],
                most_bound_id: most_bound_id[i],
                snap_num: snap_num[i],
                file_nr: file_nr[i],
                subhalo_index: subhalo_index[i],
                sub_half_mass: sub_half_mass[i],
                pos: pos[i],
                vel: vel[i],
                spin: spin[i],
            });
        }
        Ok(halos)
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}
