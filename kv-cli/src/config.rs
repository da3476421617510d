use serde_derive::{Deserialize, Serialize};

const DEFAULT_LOCAL_STORE_ID: u64 = 1;

/// File-backed process configuration, loaded with `confy` so a missing or
/// partial file is never fatal -- every field falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    pub local_store_id: Option<u64>,
    pub slow_request_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            local_store_id: Some(DEFAULT_LOCAL_STORE_ID),
            slow_request_ms: None,
            log_level: Some("info".to_string()),
        }
    }
}

impl ConfigLoad {
    pub fn new(path: &str) -> anyhow::Result<Self> {
        Ok(confy::load_path(path)?)
    }

    pub fn local_store_id(&self) -> u64 {
        self.local_store_id.unwrap_or(DEFAULT_LOCAL_STORE_ID)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn into_kv_config(self) -> kv::config::Config {
        let mut cfg = kv::config::Config::default();
        if self.slow_request_ms.is_some() {
            cfg.slow_request_ms = self.slow_request_ms;
        }
        cfg.local_store_id = self.local_store_id;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_fallbacks() {
        let cfg = ConfigLoad::default();
        assert_eq!(cfg.local_store_id(), 1);
        assert_eq!(cfg.log_level(), "info");
    }

    #[test]
    fn into_kv_config_carries_overrides() {
        let cfg =
            ConfigLoad { local_store_id: Some(3), slow_request_ms: Some(50), log_level: None };
        let kv_cfg = cfg.into_kv_config();
        assert_eq!(kv_cfg.local_store_id(), 3);
        assert_eq!(kv_cfg.slow_request_threshold(), std::time::Duration::from_millis(50));
    }
}
