use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable holding the passphrase used to encrypt permit sealing
/// keys at rest. Never written to `config.json`.
pub const PERMIT_PASSPHRASE_ENV: &str = "FHE_SUITE_PERMIT_PASSPHRASE";

/// Environment variable holding the mnemonic for networks whose node holds no
/// accounts. Never written to `config.json`.
pub const MNEMONIC_ENV: &str = "FHE_SUITE_MNEMONIC";

// ---------------------------------------------------------------------------
// SuiteConfig
// ---------------------------------------------------------------------------

/// Suite configuration stored at `~/.fhe-suite/config.json`.
///
/// Relative directories are resolved against the working directory, the same
/// way a contracts project lays out `artifacts/` and `deployments/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Passphrase for permit keys -- skipped during JSON serialization.
    #[serde(skip)]
    pub permit_passphrase: Option<String>,

    /// Signing mnemonic -- skipped during JSON serialization.
    #[serde(skip)]
    pub mnemonic: Option<String>,

    // Network
    pub network: String,
    pub custom_rpc_urls: HashMap<String, String>,
    pub mock_fhe: bool,

    // Project layout
    pub deployments_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub permits_path: Option<PathBuf>,

    // Transactions
    pub receipt_poll_ms: u64,
    pub receipt_timeout_secs: u64,

    // General
    pub log_level: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            permit_passphrase: None,
            mnemonic: None,
            network: "localfhenix".into(),
            custom_rpc_urls: HashMap::new(),
            mock_fhe: false,
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            frontend_dir: PathBuf::from("frontend/src/contracts"),
            permits_path: None,
            receipt_poll_ms: 250,
            receipt_timeout_secs: 120,
            log_level: "info".into(),
        }
    }
}

impl SuiteConfig {
    /// Returns the base config directory: `~/.fhe-suite/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".fhe-suite"))
    }

    /// Returns the config file path: `~/.fhe-suite/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.fhe-suite/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Where permits live unless `permits_path` overrides it:
    /// `~/.fhe-suite/permits.json`
    pub fn default_permits_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("permits.json"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        let dirs = [Self::base_dir()?, Self::logs_dir()?];
        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from `~/.fhe-suite/config.json`, creating it with defaults
    /// if missing.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific file path. A missing file is created with
    /// defaults; fields absent from an existing file take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            config
        };
        config.permit_passphrase = secret_from_env(PERMIT_PASSPHRASE_ENV);
        config.mnemonic = secret_from_env(MNEMONIC_ENV);
        Ok(config)
    }

    /// Save config to a specific file path (the passphrase is excluded via
    /// `#[serde(skip)]`).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// The permit store location, falling back to the default under the base
    /// directory.
    pub fn resolved_permits_path(&self) -> Result<PathBuf> {
        match &self.permits_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_permits_path(),
        }
    }
}

fn secret_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_target_local_network() {
        let config = SuiteConfig::default();
        assert_eq!(config.network, "localfhenix");
        assert!(!config.mock_fhe);
        assert_eq!(config.deployments_dir, PathBuf::from("deployments"));
        assert_eq!(config.receipt_poll_ms, 250);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn load_missing_file_creates_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        let config = SuiteConfig::load_from_path(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.network, "localfhenix");
    }

    #[test]
    fn load_partial_json_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "network": "fhenixTestnet", "mock_fhe": true }"#).unwrap();

        let config = SuiteConfig::load_from_path(&path).unwrap();

        assert_eq!(config.network, "fhenixTestnet");
        assert!(config.mock_fhe);
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.receipt_timeout_secs, 120);
    }

    #[test]
    fn load_corrupt_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "NOT VALID JSON {{{{").unwrap();

        assert!(SuiteConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn secrets_are_never_serialized() {
        let config = SuiteConfig {
            permit_passphrase: Some("hunter2".into()),
            mnemonic: Some("test test junk".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("permit_passphrase"));
        assert!(!json.contains("junk"));
        assert!(!json.contains("mnemonic"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = SuiteConfig::default();
        config
            .custom_rpc_urls
            .insert("localfhenix".into(), "http://10.0.0.2:42069".into());
        config.receipt_poll_ms = 50;
        config.save_to_path(&path).unwrap();

        let loaded = SuiteConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.custom_rpc_urls.get("localfhenix").map(String::as_str),
            Some("http://10.0.0.2:42069")
        );
        assert_eq!(loaded.receipt_poll_ms, 50);
    }

    #[test]
    fn explicit_permits_path_wins() {
        let config = SuiteConfig {
            permits_path: Some(PathBuf::from("/tmp/p.json")),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_permits_path().unwrap(),
            PathBuf::from("/tmp/p.json")
        );
    }
}
