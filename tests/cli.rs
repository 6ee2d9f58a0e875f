use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn docki() -> Command {
    let mut cmd = Command::cargo_bin("docki").unwrap();
    // Never pick up a real docker or tmux from the test environment
    cmd.env("PATH", "");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    docki()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("shell"))
        .stdout(predicate::str::contains("book"))
        .stdout(predicate::str::contains("remote"))
        .stdout(predicate::str::contains("env"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_init_creates_template() {
    let dir = tempfile::tempdir().unwrap();

    docki()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created docki.yaml"));

    let content = fs::read_to_string(dir.path().join("docki.yaml")).unwrap();
    assert!(content.contains("base_image: ubuntu:latest"));

    docki()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_init_prefers_requirements_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("requirements.txt"), "numpy\n").unwrap();

    docki().current_dir(dir.path()).arg("init").assert().success();

    let content = fs::read_to_string(dir.path().join("docki.yaml")).unwrap();
    assert!(content.contains("\npython_dep:\n    file: ./requirements.txt\n"));
}

#[test]
fn test_missing_fields_are_listed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docki.yaml"), "tag: proj\n").unwrap();

    docki()
        .current_dir(dir.path())
        .args(["shell", "ls"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing values in docki.yaml: base_image, system_dep"));
}

#[test]
fn test_missing_config_writes_template() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();

    docki()
        .current_dir(dir.path())
        .args(["py", "train.py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("A template was created"));

    assert!(dir.path().join("docki.yaml").is_file());
}

#[test]
fn test_emit_mode_writes_scripts() {
    let project = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(
        project.path().join("docki.yaml"),
        "base_image: nvidia/cuda:11.8.0-devel-ubuntu22.04\nsystem_dep: [python3, python3-venv]\ntag: proj\npython_dep: [numpy]\n",
    )
    .unwrap();
    let sub = project.path().join("src");
    fs::create_dir(&sub).unwrap();

    docki()
        .current_dir(&sub)
        .arg("--output")
        .arg(out.path())
        .args(["shell", "ls", "-la"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scripts written to"));

    let dockerfile = fs::read_to_string(out.path().join("Dockerfile")).unwrap();
    assert!(dockerfile.starts_with("FROM nvidia/cuda:11.8.0-devel-ubuntu22.04"));
    assert!(dockerfile.contains("python3 python3-venv"));

    let build = fs::read_to_string(out.path().join("build.sh")).unwrap();
    assert!(build.contains("docker build"));
    assert!(build.contains("-t proj:latest"));

    let install = fs::read_to_string(out.path().join("install.sh")).unwrap();
    assert!(install.contains("pip install numpy"));

    let run = fs::read_to_string(out.path().join("run.sh")).unwrap();
    assert!(run.contains("docker run --rm"));
    assert!(run.contains("--runtime nvidia"));
    assert!(run.contains("&& ls -la'"));
    let root_name = project.path().canonicalize().unwrap();
    let root_name = root_name.file_name().unwrap().to_string_lossy();
    assert!(run.contains(&format!("-w /{}/src", root_name)));
}

#[test]
fn test_env_requires_python_dep() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docki.yaml"), "base_image: ubuntu\nsystem_dep: []\ntag: proj\n").unwrap();

    docki()
        .current_dir(dir.path())
        .args(["env", "py", "train.py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("python_dep must be set"));
}

#[test]
fn test_env_reports_missing_interpreter() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("docki.yaml"),
        "base_image: ubuntu\nsystem_dep: []\ntag: proj\npython_dep: [numpy]\n",
    )
    .unwrap();

    docki()
        .current_dir(dir.path())
        .args(["env", "py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("python3"));

    assert!(!dir.path().join("venv").join("docki.lock").exists());
}
