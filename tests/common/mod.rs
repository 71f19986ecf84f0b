//! Shared test utilities for end-to-end tests.
//!
//! Provides a small fixture for writing a temporary configuration (and,
//! optionally, a binary tree file) and invoking the `galsam` binary against
//! it.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub mod prelude {
    pub use assert_cmd::Command;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// A minimal, valid `galsam` configuration for a run against file 0 only.
pub const MINIMAL_CONFIG: &str = r#"
simulation_dir: sim
tree_name: trees
first_file: 0
last_file: 0
num_snapshots: 1
outputs: all
"#;

pub struct TestFixture {
    dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("galsam.yaml")
    }

    pub fn write_config(&self, content: &str) -> &Self {
        std::fs::write(self.config_path(), content).expect("failed to write config");
        self
    }

    pub fn sim_dir(&self) -> PathBuf {
        self.dir.path().join("sim")
    }

    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("galsam").expect("galsam binary not built");
        cmd.current_dir(self.path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
