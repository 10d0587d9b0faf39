use crate::error::{ChartDiagError, Result};
use chart_diag_common::crypto::DEFAULT_PASSPHRASE_LEN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// チャートの最大保存数
pub const DEFAULT_MAX_CHARTS: usize = 3;

const MAX_CHARTS_ENV: &str = "CHART_DIAG_MAX_CHARTS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub passphrase_length: usize,
    pub max_charts: usize,
    /// 集計時に書き出す写真の拡張子
    pub photo_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default_config()
        };

        // 環境変数を優先
        if let Ok(value) = std::env::var(MAX_CHARTS_ENV) {
            config.max_charts = value
                .trim()
                .parse()
                .map_err(|_| ChartDiagError::Config(format!("{} が数値ではありません: {}", MAX_CHARTS_ENV, value)))?;
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ChartDiagError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("chart-diag").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            passphrase_length: DEFAULT_PASSPHRASE_LEN,
            max_charts: DEFAULT_MAX_CHARTS,
            photo_extension: "jpg".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.passphrase_length, 32);
        assert_eq!(config.max_charts, 3);
        assert_eq!(config.photo_extension, "jpg");
    }

    #[test]
    fn test_config_json_shape() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_charts, DEFAULT_MAX_CHARTS);
        assert!(json.contains("\"photo_extension\":\"jpg\""));
    }
}
