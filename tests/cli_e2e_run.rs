//! End-to-end tests for the `galsam run` command.
//!
//! These tests invoke the actual `galsam` binary and validate its behavior
//! from a user's perspective: a configuration pointing at a tiny synthetic
//! tree file, run to completion, with a galaxy catalogue on disk afterward.

mod common;
use common::prelude::*;

use galsam::halo::Halo;
use galsam::tree_source::binary::write_legacy_file;

#[test]
fn run_help_lists_sequential_flag() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--sequential"));
}

#[test]
fn run_missing_config_fails() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .arg("run")
        .arg("--config")
        .arg("no-such-file.yaml")
        .assert()
        .failure();
}

#[test]
fn run_produces_a_galaxy_catalogue_for_one_isolated_halo() {
    let fixture = TestFixture::new();
    fixture.write_config(common::MINIMAL_CONFIG);

    std::fs::create_dir_all(fixture.sim_dir()).unwrap();
    let tree = Halo {
        first_halo_in_fof_group: 0,
        first_progenitor: galsam::halo::NONE,
        mvir: 2.0,
        len: 200,
        ..Halo::default()
    };
    write_legacy_file(&fixture.sim_dir().join("trees.0"), &[1], &[vec![tree]]).unwrap();

    fixture
        .command()
        .arg("run")
        .arg("--config")
        .arg(fixture.config_path())
        .arg("--sequential")
        .assert()
        .success()
        .stdout(predicate::str::contains("run complete"));

    let output_dir = fixture.path().join("output");
    let entries: Vec<_> = std::fs::read_dir(&output_dir)
        .expect("output dir should exist")
        .collect();
    assert_eq!(entries.len(), 1);
}
