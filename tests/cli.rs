use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

/// `pxc --simulate` with settings and logs confined to `dir`.
fn pxc(dir: &tempfile::TempDir) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("pxc").into();
    cmd.env("PXC_CONFIG_DIR", dir.path().join("pxc"))
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env_remove("PXC_LOG")
        .arg("--simulate");
    cmd
}

fn settings(dir: &tempfile::TempDir) -> String {
    std::fs::read_to_string(dir.path().join("pxc").join("config.toml")).unwrap()
}

#[test]
fn help_works() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Create and manage Proxmox"));
}

#[test]
fn usage_error_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir).args(["start", "web"]).assert().code(1);
    pxc(&dir).arg("frobnicate").assert().code(1);
}

#[test]
fn list_shows_cluster() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("web-server"))
        .stdout(predicate::str::contains("container-1"))
        .stdout(predicate::str::contains(
            "4 total (3 VMs, 1 containers) - 3 running",
        ));
}

#[test]
fn start_and_stop_messages() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["start", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VM 100 is already running"));
    pxc(&dir)
        .args(["stop", "103"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VM 103 is already stopped"));
    pxc(&dir)
        .args(["start", "4242"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VM/Container 4242 not found"));
    pxc(&dir)
        .args(["stop", "102"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped Container 102"));
}

#[test]
fn delete_dry_run_from_piped_keys() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["delete", "100", "--dry-run"])
        .write_stdin("s\n100 DELETE\n")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Dry run completed for VM 100 (web-server)",
        ));
}

#[test]
fn delete_wrong_text_then_escape_cancels() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["delete", "103"])
        .write_stdin("\n103 delete now\n\x1b")
        .assert()
        .success()
        .stderr(predicate::str::contains("Deletion cancelled by user"))
        .stderr(predicate::str::contains("Successfully deleted").not());
}

#[test]
fn delete_missing_target() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["delete", "4242"])
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "VM/container 4242 not found in cluster",
        ));
}

#[test]
fn config_set_and_show() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir).args(["config", "set", "cores", "4"]).assert().success();
    pxc(&dir)
        .args(["config", "set-node", "node2", "bridge", "vmbr2"])
        .assert()
        .success();

    pxc(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cores = 4"))
        .stdout(predicate::str::contains("[nodes.node2]"));
    assert!(settings(&dir).contains("bridge = \"vmbr2\""));
}

#[test]
fn config_rejects_unknown_keys_without_failing_exit() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["config", "set", "colour", "blue"])
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid setting key 'colour'"));
    pxc(&dir)
        .args(["config", "set-node", "node2", "node", "node3"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Valid keys: cores, memory_mb"));
    assert!(!dir.path().join("pxc").join("config.toml").exists());
}

#[test]
fn config_path_follows_env() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(
            dir.path().join("pxc").display().to_string(),
        ));
}

#[test]
fn legacy_settings_are_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("pve-cli");
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("config.json"), r#"{"isoStorage":"nfs-iso"}"#).unwrap();

    pxc(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("iso_storage = \"nfs-iso\""));
    assert!(settings(&dir).contains("save_preferences = true"));
}

#[test]
fn packages_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args([
            "packages", "add", "big", "--cores", "8", "--memory", "8G", "--disk", "100",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved package big"));

    pxc(&dir)
        .args(["packages", "show", "big"])
        .assert()
        .success()
        .stdout(predicate::str::contains("memory_mb: 8192"));

    pxc(&dir)
        .args(["packages", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("big"));

    pxc(&dir)
        .args(["packages", "delete", "big"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted package big"));
    pxc(&dir)
        .args(["packages", "show", "big"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Package not found: big"));
}

#[test]
fn iso_list_is_numbered() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["iso", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1   alpine-3.18.iso"))
        .stdout(predicate::str::contains("3 ISOs"));
}

#[test]
fn iso_download_remembers_storage() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["iso", "download", "https://example.com/images/netinst.iso"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Volume ID: local:iso/netinst.iso"));
    assert!(settings(&dir).contains("iso_storage = \"local\""));
}

#[test]
fn iso_delete_unknown_name() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .args(["iso", "delete", "nothing.iso"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ISO not found: nothing.iso"));
}

#[test]
fn create_needs_a_terminal() {
    let dir = tempfile::tempdir().unwrap();
    pxc(&dir)
        .arg("create")
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::contains("needs an interactive terminal"));
}
