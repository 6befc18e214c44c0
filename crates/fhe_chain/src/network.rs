use std::collections::HashMap;

use fhe_core::ConfigError;
use serde::{Deserialize, Serialize};

/// Chain id reported by a local development node.
pub const LOCALFHENIX_CHAIN_ID: u64 = 412346;

/// Chain id of the public test network.
pub const FHENIX_TESTNET_CHAIN_ID: u64 = 42069;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for one target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Faucet base URL; only development networks have one.
    pub faucet_url: Option<String>,
    /// Development networks get the balance top-up guard before paid actions.
    pub dev: bool,
    /// The node holds no accounts; keys are derived locally from a mnemonic.
    #[serde(default)]
    pub local_accounts: bool,
    pub is_custom: bool,
    pub timeout_secs: u64,
}

/// The built-in networks, keyed by name.
pub fn default_networks() -> HashMap<String, NetworkConfig> {
    let mut networks = HashMap::new();

    networks.insert(
        "localfhenix".to_string(),
        NetworkConfig {
            name: "localfhenix".to_string(),
            chain_id: LOCALFHENIX_CHAIN_ID,
            rpc_url: "http://127.0.0.1:42069".to_string(),
            faucet_url: Some("http://127.0.0.1:42000".to_string()),
            dev: true,
            local_accounts: false,
            is_custom: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        },
    );

    networks.insert(
        "fhenixTestnet".to_string(),
        NetworkConfig {
            name: "fhenixTestnet".to_string(),
            chain_id: FHENIX_TESTNET_CHAIN_ID,
            rpc_url: "http://api.testnet.fhenix.zone:7747".to_string(),
            faucet_url: None,
            dev: false,
            local_accounts: true,
            is_custom: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        },
    );

    networks
}

/// Manages per-network configuration with custom RPC override support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStore {
    networks: HashMap<String, NetworkConfig>,
}

impl NetworkStore {
    /// Create a store populated with [`default_networks`].
    pub fn with_defaults() -> Self {
        Self {
            networks: default_networks(),
        }
    }

    /// Look up a network by name.
    pub fn get(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.get(name)
    }

    /// Look up a network by name, failing with a configuration error.
    pub fn require(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }

    /// Override the RPC URL for a known network with a custom endpoint.
    pub fn set_custom_rpc(&mut self, name: &str, url: String) -> Result<(), ConfigError> {
        if !validate_url(&url) {
            return Err(ConfigError::InvalidUrl(url));
        }
        let entry = self
            .networks
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))?;
        entry.rpc_url = url;
        entry.is_custom = true;
        Ok(())
    }

    /// Apply every override in `urls` (network name -> URL).
    pub fn apply_overrides(&mut self, urls: &HashMap<String, String>) -> Result<(), ConfigError> {
        for (name, url) in urls {
            self.set_custom_rpc(name, url.clone())?;
        }
        Ok(())
    }
}

impl Default for NetworkStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}
