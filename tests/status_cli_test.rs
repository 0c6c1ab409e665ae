use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn status_summarises_registry() {
    let tmp = tempdir().expect("tempdir");
    fs::write(
        tmp.path().join(".job.json"),
        r#"{"schema_version": 1, "files": [
            {"uri": "root.ditamap", "format": "ditamap", "is_input": true},
            {"uri": "a.dita", "format": "dita", "is_target": true},
            {"uri": "b.dita", "format": "dita"}
        ]}"#,
    )
    .expect("write registry");

    assert_cmd::cargo::cargo_bin_cmd!("chunk-reconcile")
        .current_dir(tmp.path())
        .env("CHUNK_HOME", tmp.path())
        .env("CHUNK_CONFIG_PATH", tmp.path().join("none.toml"))
        .env("CHUNK_TRANSTYPE", "eclipsehelp")
        .arg("status")
        .arg("--temp-dir")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("records=3 topics=2 maps=1 other=0"))
        .stdout(predicate::str::contains("inputs=root.ditamap"))
        .stdout(predicate::str::contains("transtype=eclipsehelp"))
        .stdout(predicate::str::contains("CHUNK_TEMP_DIR"));
}

#[test]
fn status_without_registry_reports_issue() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("chunk-reconcile")
        .current_dir(tmp.path())
        .env("CHUNK_HOME", tmp.path())
        .env("CHUNK_CONFIG_PATH", tmp.path().join("none.toml"))
        .env_remove("CHUNK_REGISTRY_FILE")
        .arg("status")
        .arg("--temp-dir")
        .arg(tmp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("registry not found"));
}

#[test]
fn invalid_config_file_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    let config = tmp.path().join("chunk.toml");
    fs::write(&config, "[reconcile]\ntranstype = \"xhtml\"\nid_generation_scheme = \"uuid\"\n")
        .expect("write config");

    assert_cmd::cargo::cargo_bin_cmd!("chunk-reconcile")
        .current_dir(tmp.path())
        .env("CHUNK_HOME", tmp.path())
        .env("CHUNK_CONFIG_PATH", &config)
        .env_remove("CHUNK_ID_GENERATION_SCHEME")
        .arg("status")
        .arg("--temp-dir")
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("id generation scheme `uuid`"));
}
