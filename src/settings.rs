use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicatePolicy;
use crate::error::{CaixaError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub import: ImportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            import: ImportSettings::default(),
        }
    }
}

/// Knobs for the preview/confirm cycle and duplicate matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub preview_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub duplicate_amount_tolerance_pct: Decimal,
    pub duplicate_day_window: u32,
    pub preview_display_limit: usize,
    /// Year for installment plans whose row carries no purchase date.
    pub default_year: Option<i32>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            preview_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            duplicate_amount_tolerance_pct: Decimal::ONE,
            duplicate_day_window: 0,
            preview_display_limit: 50,
            default_year: None,
        }
    }
}

impl ImportSettings {
    pub fn preview_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy {
            amount_tolerance_pct: self.duplicate_amount_tolerance_pct,
            day_window: self.duplicate_day_window,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("caixa")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("caixa")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CaixaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn db_path(settings: &Settings) -> PathBuf {
    PathBuf::from(&settings.data_dir).join("caixa.db")
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings {
            data_dir: "/tmp/test".to_string(),
            import: ImportSettings::default(),
        };
        settings.import.duplicate_day_window = 1;
        settings.import.default_year = Some(2025);
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.import.duplicate_day_window, 1);
        assert_eq!(loaded.import.default_year, Some(2025));
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(!s.data_dir.is_empty());
        assert_eq!(s.import.preview_ttl(), Duration::from_secs(1800));
        assert_eq!(s.import.duplicate_amount_tolerance_pct, dec!(1));
        assert_eq!(s.import.duplicate_day_window, 0);
        assert_eq!(s.import.preview_display_limit, 50);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "import": {"preview_ttl_secs": 60}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.import.preview_ttl_secs, 60);
        assert_eq!(s.import.sweep_interval_secs, 60);
        assert_eq!(s.import.duplicate_policy().amount_tolerance_pct, dec!(1));
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let s = ImportSettings { sweep_interval_secs: 0, ..Default::default() };
        assert_eq!(s.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_db_path_under_data_dir() {
        let s = Settings { data_dir: "/tmp/caixa".into(), import: ImportSettings::default() };
        assert_eq!(db_path(&s), PathBuf::from("/tmp/caixa/caixa.db"));
    }
}
