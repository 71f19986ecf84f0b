//! # Configuration Schema and Parsing
//!
//! This module defines `Config`, the single immutable parameter set a run is
//! driven by, and the logic for loading and validating it from a YAML
//! parameter file.
//!
//! ## Key Components
//!
//! - **`Config`**: every physics switch, physics constant, cosmology
//!   parameter, and path setting named in the external-interfaces contract.
//! - **`OutputSnapshots`**: the list of output snapshots, either an explicit
//!   set of indices or the literal `all`.
//! - **`Config::load`** / **`Config::parse`**: read a YAML file (or string)
//!   and validate it in one step. A `Config` that fails validation never
//!   reaches the evolution kernel — validation always happens before any
//!   tree file is opened.
//!
//! Every numeric default lives in [`crate::defaults`] so this module and the
//! documented parameter table never drift apart.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::defaults::{cosmology, physics};
use crate::error::{Error, Result};

/// Star-formation prescription selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SfPrescription {
    /// Kauffmann critical-surface-density threshold law.
    #[default]
    KauffmannThreshold,
}

/// AGN feedback recipe selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AgnRecipe {
    #[default]
    Off,
    RadioMode,
    RadioAndQuasarMode,
    Empirical,
}

/// The set of snapshots the output stage should emit a galaxy catalogue for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSnapshots {
    /// Emit every snapshot present in the simulation.
    All(AllMarker),
    /// Emit only the listed snapshot indices.
    List(Vec<usize>),
}

/// Serde helper so `outputs: all` deserializes without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllMarker {
    All,
}

impl Default for OutputSnapshots {
    fn default() -> Self {
        OutputSnapshots::All(AllMarker::All)
    }
}

impl OutputSnapshots {
    /// Resolve against the simulation's total snapshot count.
    pub fn resolve(&self, num_snapshots: usize) -> Vec<usize> {
        match self {
            OutputSnapshots::All(_) => (0..num_snapshots).collect(),
            OutputSnapshots::List(list) => {
                let mut out: Vec<usize> = list.iter().copied().collect();
                out.sort_unstable();
                out.dedup();
                out
            }
        }
    }
}

/// The complete, validated run configuration.
///
/// Constructed exclusively through [`Config::load`]/[`Config::parse`]; both
/// paths call [`Config::validate`] before returning so a `Config` value in
/// hand is always one the kernel may safely act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- paths ---
    pub simulation_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tree_name: String,
    pub tree_extension: String,
    pub file_name_galaxies: String,
    pub first_file: u32,
    pub last_file: u32,
    pub num_snapshots: usize,
    pub outputs: OutputSnapshots,

    // --- physics switches ---
    pub sf_prescription: SfPrescription,
    pub supernova_recipe_on: bool,
    pub agn_recipe_on: AgnRecipe,
    pub reionization_on: bool,
    pub disk_instability_on: bool,

    // --- physics constants ---
    pub sfr_efficiency: f64,
    pub feedback_reheating_epsilon: f64,
    pub feedback_ejection_efficiency: f64,
    pub radio_mode_efficiency: f64,
    pub quasar_mode_efficiency: f64,
    pub black_hole_growth_rate: f64,
    pub yield_: f64,
    pub recycle_fraction: f64,
    pub frac_z_leave_disk: f64,
    pub re_incorporation_factor: f64,
    pub thresh_major_merger: f64,
    pub threshold_sat_disruption: f64,
    pub reionization_z0: f64,
    pub reionization_zr: f64,
    pub energy_sn: f64,
    pub eta_sn: f64,

    // --- cosmology ---
    pub omega: f64,
    pub omega_lambda: f64,
    pub hubble_h: f64,
    pub part_mass: f64,
    pub box_size: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation_dir: PathBuf::from("."),
            output_dir: PathBuf::from("./output"),
            tree_name: "trees".to_string(),
            tree_extension: String::new(),
            file_name_galaxies: "model".to_string(),
            first_file: 0,
            last_file: 0,
            num_snapshots: 64,
            outputs: OutputSnapshots::default(),

            sf_prescription: SfPrescription::default(),
            supernova_recipe_on: true,
            agn_recipe_on: AgnRecipe::RadioAndQuasarMode,
            reionization_on: true,
            disk_instability_on: true,

            sfr_efficiency: physics::SFR_EFFICIENCY,
            feedback_reheating_epsilon: physics::FEEDBACK_REHEATING_EPSILON,
            feedback_ejection_efficiency: physics::FEEDBACK_EJECTION_EFFICIENCY,
            radio_mode_efficiency: physics::RADIO_MODE_EFFICIENCY,
            quasar_mode_efficiency: physics::QUASAR_MODE_EFFICIENCY,
            black_hole_growth_rate: physics::BLACK_HOLE_GROWTH_RATE,
            yield_: physics::YIELD,
            recycle_fraction: physics::RECYCLE_FRACTION,
            frac_z_leave_disk: physics::FRAC_Z_LEAVE_DISK,
            re_incorporation_factor: physics::RE_INCORPORATION_FACTOR,
            thresh_major_merger: physics::THRESH_MAJOR_MERGER,
            threshold_sat_disruption: physics::THRESHOLD_SAT_DISRUPTION,
            reionization_z0: physics::REIONIZATION_Z0,
            reionization_zr: physics::REIONIZATION_ZR,
            energy_sn: physics::ENERGY_SN,
            eta_sn: physics::ETA_SN,

            omega: cosmology::OMEGA,
            omega_lambda: cosmology::OMEGA_LAMBDA,
            hubble_h: cosmology::HUBBLE_H,
            part_mass: cosmology::PART_MASS,
            box_size: cosmology::BOX_SIZE,
        }
    }
}

impl Config {
    /// Load and validate a configuration from a YAML file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;
        Self::parse(&text)
    }

    /// Parse and validate a configuration from a YAML string.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every declared range and cross-field constraint.
    ///
    /// Called automatically by `load`/`parse`; also exposed directly so the
    /// `validate` CLI subcommand can check a file without constructing a
    /// fresh `Config` via a side channel.
    pub fn validate(&self) -> Result<()> {
        if self.last_file < self.first_file {
            return Err(Error::config(format!(
                "last_file ({}) must be >= first_file ({})",
                self.last_file, self.first_file
            )));
        }
        if self.tree_name.trim().is_empty() {
            return Err(Error::config("tree_name must not be empty"));
        }
        if self.num_snapshots == 0 {
            return Err(Error::config("num_snapshots must be at least 1"));
        }

        in_range("sfr_efficiency", self.sfr_efficiency, 0.0, f64::MAX)?;
        in_range(
            "feedback_reheating_epsilon",
            self.feedback_reheating_epsilon,
            0.0,
            f64::MAX,
        )?;
        in_range(
            "feedback_ejection_efficiency",
            self.feedback_ejection_efficiency,
            0.0,
            f64::MAX,
        )?;
        in_range(
            "radio_mode_efficiency",
            self.radio_mode_efficiency,
            0.0,
            1.0,
        )?;
        in_range(
            "quasar_mode_efficiency",
            self.quasar_mode_efficiency,
            0.0,
            1.0,
        )?;
        in_range(
            "black_hole_growth_rate",
            self.black_hole_growth_rate,
            0.0,
            1.0,
        )?;
        in_range("yield_", self.yield_, 0.0, 1.0)?;
        in_range("recycle_fraction", self.recycle_fraction, 0.0, 1.0)?;
        in_range("frac_z_leave_disk", self.frac_z_leave_disk, 0.0, 1.0)?;
        in_range(
            "re_incorporation_factor",
            self.re_incorporation_factor,
            0.0,
            f64::MAX,
        )?;
        in_range("thresh_major_merger", self.thresh_major_merger, 0.0, 1.0)?;
        in_range(
            "threshold_sat_disruption",
            self.threshold_sat_disruption,
            0.0,
            f64::MAX,
        )?;
        in_range("energy_sn", self.energy_sn, 0.0, f64::MAX)?;
        in_range("eta_sn", self.eta_sn, 0.0, f64::MAX)?;

        in_range("omega", self.omega, 0.0, 1.0)?;
        in_range("omega_lambda", self.omega_lambda, 0.0, 1.0)?;
        in_range("hubble_h", self.hubble_h, 0.0, 2.0)?;
        in_range("part_mass", self.part_mass, 0.0, f64::MAX)?;
        in_range("box_size", self.box_size, 0.0, f64::MAX)?;

        if let OutputSnapshots::List(list) = &self.outputs {
            if list.is_empty() {
                return Err(Error::config(
                    "outputs list must not be empty; use `all` to emit every snapshot",
                ));
            }
        }

        Ok(())
    }

    /// The half-open range of file numbers this run should process.
    pub fn file_numbers(&self) -> std::ops::RangeInclusive<u32> {
        self.first_file..=self.last_file
    }

    /// Path to the tree file for a given file number, per the external
    /// interface contract `{SimulationDir}/{TreeName}.{fileNr}{ext}`.
    pub fn tree_file_path(&self, file_nr: u32) -> PathBuf {
        self.simulation_dir.join(format!(
            "{}.{}{}",
            self.tree_name, file_nr, self.tree_extension
        ))
    }

    /// Path to the per-snapshot galaxy output file, per
    /// `{OutputDir}/{FileNameGalaxies}_z{z:1.3f}_{fileNr}`.
    pub fn galaxy_output_path(&self, redshift: f64, file_nr: u32) -> PathBuf {
        self.output_dir.join(format!(
            "{}_z{:.3}_{}",
            self.file_name_galaxies, redshift, file_nr
        ))
    }
}

fn in_range(name: &str, value: f64, lo: f64, hi: f64) -> Result<()> {
    if !value.is_finite() || value < lo || value > hi {
        return Err(Error::config(format!(
            "{name} = {value} is out of declared range [{lo}, {hi}]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn last_file_before_first_file_is_rejected() {
        let mut config = Config::default();
        config.first_file = 5;
        config.last_file = 2;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn out_of_range_physics_parameter_is_rejected() {
        let mut config = Config::default();
        config.recycle_fraction = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn empty_explicit_output_list_is_rejected() {
        let mut config = Config::default();
        config.outputs = OutputSnapshots::List(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_minimal_yaml_overrides_only_named_fields() {
        let yaml = "sfr_efficiency: 0.1\nlast_file: 3\n";
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.sfr_efficiency, 0.1);
        assert_eq!(config.last_file, 3);
        // untouched fields keep their documented defaults
        assert_eq!(config.recycle_fraction, physics::RECYCLE_FRACTION);
    }

    #[test]
    fn malformed_yaml_is_a_parse_error_not_a_panic() {
        let result = Config::parse("not: [valid");
        assert!(result.is_err());
    }

    #[test]
    fn output_snapshots_all_resolves_to_full_range() {
        let outputs = OutputSnapshots::All(AllMarker::All);
        assert_eq!(outputs.resolve(5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn output_snapshots_list_sorts_and_dedups() {
        let outputs = OutputSnapshots::List(vec![3, 1, 3, 2]);
        assert_eq!(outputs.resolve(10), vec![1, 2, 3]);
    }

    #[test]
    fn tree_file_path_matches_contract() {
        let mut config = Config::default();
        config.simulation_dir = PathBuf::from("/sims/box");
        config.tree_name = "trees".to_string();
        config.tree_extension = ".dat".to_string();
        assert_eq!(
            config.tree_file_path(63),
            PathBuf::from("/sims/box/trees.63.dat")
        );
    }

    #[test]
    fn galaxy_output_path_formats_redshift_to_three_decimals() {
        let mut config = Config::default();
        config.output_dir = PathBuf::from("/out");
        config.file_name_galaxies = "model".to_string();
        assert_eq!(
            config.galaxy_output_path(1.5, 7),
            PathBuf::from("/out/model_z1.500_7")
        );
    }
}
