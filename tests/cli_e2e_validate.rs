//! End-to-end tests for the `galsam validate` command.

mod common;
use common::prelude::*;

#[test]
fn validate_accepts_a_minimal_config() {
    let fixture = TestFixture::new();
    fixture.write_config(common::MINIMAL_CONFIG);

    fixture
        .command()
        .arg("validate")
        .arg(fixture.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn validate_rejects_an_inconsistent_config() {
    let fixture = TestFixture::new();
    fixture.write_config("first_file: 5\nlast_file: 2\n");

    fixture
        .command()
        .arg("validate")
        .arg(fixture.config_path())
        .assert()
        .failure();
}

#[test]
fn validate_rejects_malformed_yaml() {
    let fixture = TestFixture::new();
    fixture.write_config("not: [valid");

    fixture
        .command()
        .arg("validate")
        .arg(fixture.config_path())
        .assert()
        .failure();
}
