use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::deployer::DeployError;

/// One published contract on one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    /// Constructor arguments as they were logged at deploy time.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    pub deployed_at: DateTime<Utc>,
}

/// Per-network mapping from contract name to its deployment record, stored as
/// `<root>/<network>/<ContractName>.json`.
///
/// Commands only read from the registry. [`crate::deployer::Deployer`] is the
/// only writer.
#[derive(Debug, Clone)]
pub struct DeploymentRegistry {
    root: PathBuf,
    network: String,
}

impl DeploymentRegistry {
    pub fn new(root: impl Into<PathBuf>, network: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            network: network.into(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Directory holding this network's records.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.network)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir().join(format!("{name}.json"))
    }

    /// The record for `name`, if one was ever written.
    pub fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, DeployError> {
        let path = self.record_path(name);
        if !path.exists() {
            debug!(name, network = %self.network, "no deployment record");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// The record for `name`, or [`DeployError::Missing`].
    pub fn require(&self, name: &str) -> Result<DeploymentRecord, DeployError> {
        self.get(name)?.ok_or_else(|| DeployError::Missing {
            name: name.to_string(),
            network: self.network.clone(),
        })
    }

    /// Address of the deployed `name`.
    pub fn address_of(&self, name: &str) -> Result<Address, DeployError> {
        Ok(self.require(name)?.address)
    }

    /// Write (or overwrite) a record.
    pub fn save(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir)?;
        let path = self.record_path(&record.contract_name);
        std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
        info!(
            name = %record.contract_name,
            address = %record.address,
            network = %self.network,
            "deployment recorded"
        );
        Ok(())
    }

    /// Names of all recorded contracts on this network, sorted.
    pub fn list(&self) -> Result<Vec<String>, DeployError> {
        let dir = self.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_record_file(p))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn is_record_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, last: u8) -> DeploymentRecord {
        DeploymentRecord {
            contract_name: name.to_string(),
            address: Address::with_last_byte(last),
            transaction_hash: Some(B256::repeat_byte(last)),
            args: vec![serde_json::json!("token"), serde_json::json!("FHE")],
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_get_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = DeploymentRegistry::new(tmp.path(), "localfhenix");
        let rec = record("FHERC20", 9);
        registry.save(&rec).unwrap();

        let loaded = registry.get("FHERC20").unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert!(tmp.path().join("localfhenix").join("FHERC20.json").exists());
    }

    #[test]
    fn missing_record_is_none_and_require_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = DeploymentRegistry::new(tmp.path(), "localfhenix");
        assert!(registry.get("Auction").unwrap().is_none());

        let err = registry.require("Auction").unwrap_err();
        assert!(matches!(err, DeployError::Missing { ref name, .. } if name == "Auction"));
    }

    #[test]
    fn networks_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let local = DeploymentRegistry::new(tmp.path(), "localfhenix");
        let testnet = DeploymentRegistry::new(tmp.path(), "fhenixTestnet");
        local.save(&record("Voting", 1)).unwrap();

        assert!(testnet.get("Voting").unwrap().is_none());
        assert_eq!(local.address_of("Voting").unwrap(), Address::with_last_byte(1));
    }

    #[test]
    fn list_returns_sorted_names() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = DeploymentRegistry::new(tmp.path(), "localfhenix");
        assert!(registry.list().unwrap().is_empty());

        registry.save(&record("Voting", 1)).unwrap();
        registry.save(&record("Auction", 2)).unwrap();
        registry.save(&record("FHERC20", 3)).unwrap();
        std::fs::write(registry.dir().join(".chainId"), "412346").unwrap();

        assert_eq!(registry.list().unwrap(), vec!["Auction", "FHERC20", "Voting"]);
    }

    #[test]
    fn record_uses_camel_case_on_disk() {
        let json = serde_json::to_value(record("Counter", 4)).unwrap();
        assert!(json.get("contractName").is_some());
        assert!(json.get("transactionHash").is_some());
        assert!(json.get("deployedAt").is_some());
    }
}
