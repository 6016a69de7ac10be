//! Environment overrides live in their own test binary so the variables do
//! not leak into the file-based config tests.

use std::env;
use std::fs;

use tempfile::TempDir;

use neurite::config::Settings;
use neurite::domain::{FlowMethod, StrahlerMethod};

#[test]
fn given_env_vars_when_load_then_they_override_local_config() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("neurite.toml");
    fs::write(
        &path,
        "[analysis]\nflow_method = \"sum\"\nstrahler_method = \"standard\"\n",
    )
    .unwrap();
    env::set_var("NEURITE__ANALYSIS__STRAHLER_METHOD", "greedy");
    env::set_var("NEURITE__BATCH__PARALLEL", "false");

    // Act
    let settings = Settings::load(Some(&path));
    env::remove_var("NEURITE__ANALYSIS__STRAHLER_METHOD");
    env::remove_var("NEURITE__BATCH__PARALLEL");
    let settings = settings.expect("load settings");

    // Assert
    assert_eq!(settings.strahler_method().unwrap(), StrahlerMethod::Greedy);
    assert_eq!(settings.flow_method().unwrap(), FlowMethod::Sum);
    assert!(!settings.batch.parallel);
}
