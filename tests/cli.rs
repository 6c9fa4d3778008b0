use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn bin() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hukstore"))
}

fn init_sealed(store: &Path) {
    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(store)
        .arg("init")
        .args(["--argon-mem", "8", "--argon-time", "1", "--argon-parallelism", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("key store initialized"));
}

fn init_plain(store: &Path) {
    bin()
        .arg("--store")
        .arg(store)
        .arg("init")
        .arg("--plain")
        .assert()
        .success();
}

fn generate_x25519(store: &Path, alias: &str) {
    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(store)
        .args(["generate", alias, "--alg", "x25519", "--purpose", "sign,verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("generated key '{alias}'")));
}

#[test]
fn init_creates_store_file() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);

    assert!(store.exists());
}

#[test]
fn generated_keys_compare_not_equal() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);
    generate_x25519(&store, "TestOne");
    generate_x25519(&store, "TestTwo");

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["compare", "TestOne", "TestTwo"])
        .assert()
        .success()
        .stdout(predicate::str::diff("not equal\n"));

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["compare", "TestOne", "TestOne"])
        .assert()
        .success()
        .stdout(predicate::str::diff("equal\n"));
}

#[test]
fn compare_with_missing_alias_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_plain(&store);
    generate_x25519(&store, "TestOne");

    bin()
        .arg("--store")
        .arg(&store)
        .args(["compare", "TestOne", "absent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key 'absent' not found"));
}

#[test]
fn generate_existing_alias_twice_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);
    generate_x25519(&store, "A");

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["generate", "A", "--alg", "x25519", "--purpose", "agree"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn unsupported_key_size_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_plain(&store);

    bin()
        .arg("--store")
        .arg(&store)
        .args(["generate", "k", "--alg", "aes", "--size", "100", "--purpose", "encrypt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key size 100 not supported"));
}

#[test]
fn wrong_password_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);

    bin()
        .env("HUKSTORE_PASSWORD", "wrong_pw")
        .arg("--store")
        .arg(&store)
        .args(["exists", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Invalid password or corrupted data",
        ));
}

#[test]
fn plain_store_needs_no_password() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_plain(&store);

    bin()
        .arg("--store")
        .arg(&store)
        .args(["generate", "mac", "--alg", "hmac", "--size", "256", "--purpose", "mac"])
        .assert()
        .success();

    bin()
        .arg("--store")
        .arg(&store)
        .args(["exists", "mac"])
        .assert()
        .success()
        .stdout(predicate::str::contains("key 'mac' exists"));
}

#[test]
fn init_fails_if_store_exists() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("key store already exists"));
}

#[test]
fn actions_fail_if_store_not_exists() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["exists", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key store does not exist"));
}

#[test]
fn delete_key_works() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);
    generate_x25519(&store, "A");

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["delete", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("key 'A' deleted"));

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["exists", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not found"));

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["delete", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn list_json_reports_keys() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_plain(&store);
    generate_x25519(&store, "first");
    bin()
        .arg("--store")
        .arg(&store)
        .args([
            "generate", "second", "--alg", "aes", "--size", "128", "--purpose", "encrypt,decrypt",
            "--role", "main",
        ])
        .assert()
        .success();

    let output = bin()
        .arg("--store")
        .arg(&store)
        .args(["list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let keys: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let keys = keys.as_array().unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0]["alias"], "first");
    assert_eq!(keys[0]["algorithm"], 101);
    assert_eq!(keys[0]["role"], 0xFFFF_FFFFu32);
    assert_eq!(keys[1]["alias"], "second");
    assert_eq!(keys[1]["key_size"], 128);
    assert_eq!(keys[1]["purpose"], 3);
    assert_eq!(keys[1]["role"], 1);
    assert!(keys[1]["created_ms"].as_u64().is_some());
}

#[test]
fn list_empty_store() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_plain(&store);

    bin()
        .arg("--store")
        .arg(&store)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No keys stored."));
}

#[test]
fn info_json_reports_header() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    init_sealed(&store);
    generate_x25519(&store, "A");

    let output = bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .args(["info", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["sealed"], true);
    assert_eq!(info["key_count"], 1);
    assert_eq!(info["version"], 1);
    assert_eq!(info["argon_mem_kib"], 8);
}

#[test]
fn init_with_invalid_argon2_parameters_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("keys.hks");

    bin()
        .env("HUKSTORE_PASSWORD", "pw")
        .arg("--store")
        .arg(&store)
        .arg("init")
        .args(["--argon-mem", "8", "--argon-parallelism", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("memory cost"));

    assert!(!store.exists());
}

#[test]
fn store_path_from_env() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("env.hks");

    bin()
        .env("HUKSTORE_PATH", &store)
        .args(["init", "--plain"])
        .assert()
        .success();

    assert!(store.exists());
}
