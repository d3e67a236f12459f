use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::BoardConfig;

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "beacon.toml";

/// 环境变量前缀，例如 `BEACON__POLLING__CLOCK_TICK_MS`
pub const ENV_PREFIX: &str = "BEACON";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// 忽略环境变量覆盖
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// 加载看板配置
    ///
    /// 配置文件不存在时使用默认值，环境变量覆盖文件中的值。
    pub fn load(&self) -> Result<BoardConfig> {
        let config_path = self.config_path();

        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        }
        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// 加载并验证配置
    pub fn load_validated(&self) -> Result<BoardConfig> {
        let config = self.load()?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        self.load()?.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_default_config() {
        let temp_dir = tempdir().unwrap();
        let loader = ConfigLoader::new(temp_dir.path()).without_env();

        let config = loader.load().unwrap();
        assert_eq!(config, BoardConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
[backend]
base_url = "http://board.example:9000"
timeout_secs = 3

[polling]
clock_tick_ms = 500
heartbeat_refresh_ms = 30000
fetch_gpu_info = true

[logging]
level = "debug"
format = "json"
"#;
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), config_content).unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).without_env();
        let config = loader.load().unwrap();

        assert_eq!(config.backend.base_url, "http://board.example:9000");
        assert_eq!(config.backend.timeout_secs, 3);
        assert_eq!(config.backend.signals_path, "/json/signals");
        assert_eq!(config.polling.clock_tick_ms, 500);
        assert_eq!(config.polling.heartbeat_refresh_ms, 30_000);
        assert_eq!(config.polling.report_refresh_ms, 300_000);
        assert!(config.polling.fetch_gpu_info);
        assert_eq!(config.logging.level, beacon_logging::LogLevel::Debug);
        assert!(loader.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_config() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
[polling]
clock_tick_ms = 90000
heartbeat_refresh_ms = 60000
"#;
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), config_content).unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).without_env();
        assert!(loader.validate().is_err());
        assert!(loader.load_validated().is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[polling]\nreport_refresh_ms = 120000\n",
        )
        .unwrap();
        std::env::set_var("BEACONTEST__POLLING__REPORT_REFRESH_MS", "45000");
        std::env::set_var("BEACONTEST__BACKEND__BASE_URL", "http://env.example");

        let config = ConfigLoader::new(temp_dir.path())
            .with_env_prefix("BEACONTEST")
            .load()
            .unwrap();

        std::env::remove_var("BEACONTEST__POLLING__REPORT_REFRESH_MS");
        std::env::remove_var("BEACONTEST__BACKEND__BASE_URL");

        assert_eq!(config.polling.report_refresh_ms, 45_000);
        assert_eq!(config.backend.base_url, "http://env.example");
    }
}
