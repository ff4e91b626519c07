//! Command-line behavior of the geo-builder binary

mod common;

use common::*;
use std::process::{Command, Output};

fn geo_builder(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_geo-builder"))
        .args(args)
        .output()
        .expect("Failed to run geo-builder")
}

fn path_arg(path: &std::path::Path) -> &str {
    path.to_str().expect("temp path is not UTF-8")
}

#[test]
fn test_check_accepts_valid_config() {
    let fixture = Fixture::new();
    let output = geo_builder(&["check", path_arg(&fixture.config_path)]);
    assert!(
        output.status.success(),
        "check failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_check_rejects_config_without_keys() {
    let fixture = Fixture::new();
    let config = fixture.dir.path().join("nokeys.toml");
    std::fs::write(&config, format!("[client]\npath = '{}'\n", fixture.client.display()))
        .expect("Failed to write config");

    let output = geo_builder(&["check", path_arg(&config)]);
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("No decryption keys"),
        "unexpected error: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_build_command() {
    let fixture = Fixture::new();
    let output_dir = fixture.dir.path().join("cli-out");

    let output = geo_builder(&[
        "build",
        path_arg(&fixture.config_path),
        "--output",
        path_arg(&output_dir),
        "--level",
        DF1,
        "--threads",
        "1",
    ]);
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output_dir.join("geo.mesh").exists());
    assert!(output_dir.join(format!("{DF1}.geo")).exists());
    assert!(!output_dir.join(format!("{TEST_LEVEL}.geo")).exists());
}

#[test]
fn test_list_and_extract() {
    let fixture = Fixture::new();
    let pak = fixture.client.join("Objects/props/Mesh_Meshes_000.pak");
    let config = path_arg(&fixture.config_path);

    let output = geo_builder(&["list", path_arg(&pak), "--keys", "--config", config]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("key: test"), "{stdout}");
    assert!(stdout.contains("rock.cgf"), "{stdout}");
    assert!(stdout.contains("2 entries"), "{stdout}");

    let target = fixture.dir.path().join("rock.cgf");
    let output = geo_builder(&[
        "extract",
        path_arg(&pak),
        "rock.cgf",
        "--output",
        path_arg(&target),
        "--config",
        config,
    ]);
    assert!(output.status.success());
    assert_eq!(std::fs::read(&target).expect("Failed to read extracted file"), rock_cgf());
}

#[test]
fn test_inspect_shows_collision_slots() {
    let fixture = Fixture::new();
    let input = fixture.dir.path().join("door.cga");
    std::fs::write(&input, door_cga()).expect("Failed to write door.cga");

    let output = geo_builder(&["inspect", path_arg(&input), "--tick", "999999"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mat_default"), "{stdout}");
    assert!(stdout.contains("--- tick 999999 ---"), "{stdout}");
}
