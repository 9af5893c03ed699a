use assert_cmd::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn init_then_add_then_list() {
    let tmp = tempdir().unwrap();
    let xdg = tmp.path().join("xdg");
    fs::create_dir_all(&xdg).unwrap();
    let project = tmp.path().join("myproj");
    fs::create_dir_all(&project).unwrap();

    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("cmap"));
    cmd.env("XDG_CONFIG_HOME", &xdg);
    cmd.current_dir(&project);
    cmd.args(["init"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Initialized"))
        .stdout(predicates::str::contains("myproj"));

    let file = project.join("codemap.md");
    assert!(file.exists());
    assert!(fs::read_to_string(&file).unwrap().starts_with("# myproj"));

    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("cmap"));
    cmd.env("XDG_CONFIG_HOME", &xdg);
    cmd.current_dir(&project);
    cmd.args(["add", "--to", "src/main.rs", "--line", "10", "startup sequence notes"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Added cm."));

    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("cmap"));
    cmd.env("XDG_CONFIG_HOME", &xdg);
    cmd.current_dir(&project);
    cmd.args(["list"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("src/main.rs/cm."))
        .stdout(predicates::str::contains("startup sequence notes"));
}
