//! CLI tests for gencontainer

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn gencontainer(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gencontainer").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

/// Layout with hash-only auth so no signing tool is needed
fn write_layout(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("boot.src"), vec![0x11u8; 300]).unwrap();
    fs::write(dir.join("app.src"), vec![0x22u8; 1000]).unwrap();
    fs::write(dir.join("cfg.src"), b"config").unwrap();
    let layout = dir.join("layout.txt");
    fs::write(
        &layout,
        "# test container\n\
         ('BOOT', 'image.bin', 'NORMAL', 'SHA2_256', '', 0, 0)\n\
         [\n\
           ('PLD0', 'boot.src', 'Dummy', 'NONE', '', 0, 0),\n\
           ('PLD1', 'app.src', 'Dummy', 'SHA2_256', '', 0x10, 0),\n\
           ('PLD2', 'cfg.src', 'Dummy', 'SHA2_384', '', 0x1000, 0),\n\
         ]\n",
    )
    .unwrap();
    layout
}

/// Mono-signed container built from a component list
fn create_mono(dir: &Path) -> std::path::PathBuf {
    let a = dir.join("a.src");
    let b = dir.join("b.src");
    fs::write(&a, vec![1u8; 64]).unwrap();
    fs::write(&b, vec![2u8; 128]).unwrap();
    let out_dir = dir.join("mono");
    fs::create_dir_all(&out_dir).unwrap();

    gencontainer(dir)
        .args(["-q", "create", "-t", "NORMAL", "--cl"])
        .arg(format!("PLD0:{}", a.display()))
        .arg(format!("INRD:{}", b.display()))
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    out_dir.join("BOOT.bin")
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    gencontainer(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gencontainer"));
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    gencontainer(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("replace"));
}

/// Create from a layout file and view the result
#[test]
fn test_create_and_view() {
    let dir = TempDir::new().unwrap();
    let layout = write_layout(dir.path());

    gencontainer(dir.path())
        .args(["create", "-l"])
        .arg(&layout)
        .assert()
        .success()
        .stdout(predicate::str::contains("created successfully"));

    let image = dir.path().join("image.bin");
    assert!(image.exists());

    gencontainer(dir.path())
        .args(["view", "-i"])
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("<CONTAINER_HDR>"))
        .stdout(predicate::str::contains("'PLD1'"))
        .stdout(predicate::str::contains("SHA2_384"));

    gencontainer(dir.path())
        .args(["view", "--json", "-i"])
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"entry_count\": 3"))
        .stdout(predicate::str::contains("\"name\": \"PLD2\""));
}

#[test]
fn test_create_with_output_dir() {
    let dir = TempDir::new().unwrap();
    let layout = write_layout(dir.path());
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    gencontainer(dir.path())
        .args(["-q", "create", "-l"])
        .arg(&layout)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("image.bin").exists());
    assert!(!dir.path().join("image.bin").exists());
}

#[test]
fn test_create_requires_input() {
    let dir = TempDir::new().unwrap();
    gencontainer(dir.path()).arg("create").assert().failure();
}

#[test]
fn test_create_missing_component_file() {
    let dir = TempDir::new().unwrap();
    let layout = dir.path().join("layout.txt");
    fs::write(
        &layout,
        "('BOOT', '', '', '', '', 0, 0)\n('PLD0', 'missing.src', '', '', '', 0, 0)\n",
    )
    .unwrap();

    gencontainer(dir.path())
        .args(["create", "-l"])
        .arg(&layout)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("missing.src"));
    assert!(!dir.path().join("BOOT.bin").exists());
}

#[test]
fn test_create_duplicate_names() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.src"), b"a").unwrap();
    let layout = dir.path().join("layout.txt");
    fs::write(
        &layout,
        "('BOOT', '', '', '', '', 0, 0)\n\
         ('PLD0', 'a.src', '', '', '', 0, 0)\n\
         ('pld0', 'a.src', '', '', '', 0, 0)\n",
    )
    .unwrap();

    gencontainer(dir.path())
        .args(["create", "-l"])
        .arg(&layout)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicated"));
    assert!(!dir.path().join("BOOT.bin").exists());
}

#[test]
fn test_create_invalid_layout_reports_line() {
    let dir = TempDir::new().unwrap();
    let layout = dir.path().join("layout.txt");
    fs::write(
        &layout,
        "('BOOT', '', '', '', '', 0, 0)\n('PLD0', 'a.src', 'zip', '', '', 0, 0)\n",
    )
    .unwrap();

    gencontainer(dir.path())
        .args(["create", "-l"])
        .arg(&layout)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

/// Component list creates a mono-signed container
#[test]
fn test_create_component_list() {
    let dir = TempDir::new().unwrap();
    let image = create_mono(dir.path());
    assert!(image.exists());

    gencontainer(dir.path())
        .args(["view", "-i"])
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("'_SG_'"))
        .stdout(predicate::str::contains("monolithic signing: digest matches"));
}

#[test]
fn test_replace_mono_signed_fails() {
    let dir = TempDir::new().unwrap();
    let image = create_mono(dir.path());
    let before = fs::read(&image).unwrap();
    fs::write(dir.path().join("new.src"), b"new").unwrap();

    gencontainer(dir.path())
        .args(["replace", "-n", "PLD0", "-f", "new.src", "-i"])
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("monolithically signed"));
    assert_eq!(fs::read(&image).unwrap(), before);
}

#[test]
fn test_replace_component() {
    let dir = TempDir::new().unwrap();
    let layout = write_layout(dir.path());
    gencontainer(dir.path())
        .args(["-q", "create", "-l"])
        .arg(&layout)
        .assert()
        .success();
    fs::write(dir.path().join("new.src"), vec![0x33u8; 200]).unwrap();

    gencontainer(dir.path())
        .args(["replace", "-i", "image.bin", "-n", "pld0", "-f", "new.src", "-o", "new.bin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("replaced successfully"));
    assert!(dir.path().join("new.bin").exists());

    // hash-authenticated components only accept identical content
    gencontainer(dir.path())
        .args(["replace", "-i", "image.bin", "-n", "PLD1", "-f", "new.src", "-o", "bad.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hash does not match"));
    assert!(!dir.path().join("bad.bin").exists());

    gencontainer(dir.path())
        .args(["replace", "-i", "image.bin", "-n", "NOPE", "-f", "new.src"])
        .assert()
        .failure();
}

#[test]
fn test_extract() {
    let dir = TempDir::new().unwrap();
    let layout = write_layout(dir.path());
    gencontainer(dir.path())
        .args(["-q", "create", "-l"])
        .arg(&layout)
        .assert()
        .success();
    let out = dir.path().join("extracted");
    fs::create_dir_all(&out).unwrap();

    gencontainer(dir.path())
        .args(["extract", "-i", "image.bin", "--od"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("extracted successfully"));

    assert!(out.join("BOOT.txt").exists());
    assert_eq!(fs::read(out.join("PLD1.bin")).unwrap(), vec![0x22u8; 1000]);
    assert!(out.join("PLD2.rgn").exists());

    // the extracted layout rebuilds the same image
    let rebuilt = dir.path().join("rebuilt");
    fs::create_dir_all(&rebuilt).unwrap();
    gencontainer(dir.path())
        .args(["-q", "create", "-l"])
        .arg(out.join("BOOT.txt"))
        .arg("-o")
        .arg(&rebuilt)
        .assert()
        .success();
    assert_eq!(
        fs::read(rebuilt.join("image.bin")).unwrap(),
        fs::read(dir.path().join("image.bin")).unwrap()
    );
}

#[test]
fn test_sign() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("comp.bin"), b"payload").unwrap();

    gencontainer(dir.path())
        .args(["sign", "-f", "comp.bin", "-a", "SHA2_256", "-o", "comp.sgn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signed successfully"));

    let signed = fs::read(dir.path().join("comp.sgn")).unwrap();
    assert_eq!(&signed[..4], b"LZDM");
    assert_eq!(signed.len(), 24);
}

#[test]
fn test_sign_rsa_requires_key() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("comp.bin"), b"payload").unwrap();

    gencontainer(dir.path())
        .args(["sign", "-f", "comp.bin", "-a", "RSA2048"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Signing key"));
    assert!(!dir.path().join("comp.signed").exists());
}

#[test]
fn test_invalid_auth_type() {
    let dir = TempDir::new().unwrap();
    gencontainer(dir.path())
        .args(["sign", "-f", "comp.bin", "-a", "MD5"])
        .assert()
        .failure();
}

#[test]
fn test_config_file_output_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("comp.bin"), b"payload").unwrap();
    fs::create_dir_all(dir.path().join("cfgout")).unwrap();
    fs::write(
        dir.path().join("gencontainer.toml"),
        "out_dir = \"cfgout\"\n",
    )
    .unwrap();

    gencontainer(dir.path())
        .args(["-q", "sign", "-f", "comp.bin"])
        .assert()
        .success();
    assert!(dir.path().join("cfgout").join("comp.signed").exists());
}

#[test]
fn test_view_missing_image() {
    let dir = TempDir::new().unwrap();
    gencontainer(dir.path())
        .args(["view", "-i", "nothing.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
