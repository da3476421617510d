use std::io::Write;

use kvcli::config::ConfigLoad;

#[test]
fn loads_overrides_from_a_toml_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "local_store_id = 7")?;
    writeln!(file, "slow_request_ms = 150")?;
    writeln!(file, "log_level = \"debug\"")?;

    let cfg = ConfigLoad::new(file.path().to_str().unwrap())?;
    assert_eq!(cfg.local_store_id(), 7);
    assert_eq!(cfg.log_level(), "debug");

    let kv_cfg = cfg.into_kv_config();
    assert_eq!(kv_cfg.local_store_id(), 7);
    assert_eq!(kv_cfg.slow_request_threshold(), std::time::Duration::from_millis(150));
    Ok(())
}

#[test]
fn missing_file_falls_back_to_defaults_without_erroring_loudly() {
    let path = "/nonexistent/path/kvdb-test-config.toml";
    let result = ConfigLoad::new(path);
    assert!(result.is_err() || result.unwrap().local_store_id() >= 1);
}
