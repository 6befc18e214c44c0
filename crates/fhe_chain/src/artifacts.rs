use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::deployer::DeployError;

/// A compiled contract: ABI plus creation bytecode.
///
/// Matches the shape of a hardhat artifact JSON
/// (`artifacts/contracts/<Name>.sol/<Name>.json`); extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: serde_json::Value,
    pub bytecode: String,
}

impl ContractArtifact {
    /// Decode the hex creation bytecode.
    pub fn bytecode_bytes(&self) -> Result<Bytes, DeployError> {
        let trimmed = self.bytecode.trim_start_matches("0x");
        if trimmed.is_empty() {
            return Err(DeployError::InvalidBytecode {
                name: self.contract_name.clone(),
                reason: "empty bytecode (abstract contract or interface?)".into(),
            });
        }
        hex::decode(trimmed)
            .map(Bytes::from)
            .map_err(|e| DeployError::InvalidBytecode {
                name: self.contract_name.clone(),
                reason: e.to_string(),
            })
    }
}

/// Resolves contract artifacts by name from a compiled-artifacts directory,
/// with optional in-memory entries taking precedence.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    root: Option<PathBuf>,
    overrides: HashMap<String, ContractArtifact>,
}

impl ArtifactStore {
    /// A store reading from `root` (searched recursively for `<Name>.json`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            overrides: HashMap::new(),
        }
    }

    /// A store with no backing directory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Register an artifact in memory.
    pub fn insert(&mut self, artifact: ContractArtifact) {
        self.overrides
            .insert(artifact.contract_name.clone(), artifact);
    }

    /// Load the artifact for `name`.
    pub fn load(&self, name: &str) -> Result<ContractArtifact, DeployError> {
        if let Some(artifact) = self.overrides.get(name) {
            return Ok(artifact.clone());
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| DeployError::MissingArtifact(name.to_string()))?;

        let path = find_artifact(root, &format!("{name}.json"))
            .ok_or_else(|| DeployError::MissingArtifact(name.to_string()))?;
        debug!(name, path = %path.display(), "loading artifact");

        let content = std::fs::read_to_string(&path)?;
        let mut artifact: ContractArtifact = serde_json::from_str(&content)?;
        if artifact.contract_name.is_empty() {
            artifact.contract_name = name.to_string();
        }
        Ok(artifact)
    }
}

/// Depth-first search for `file_name`, skipping `*.dbg.json` siblings.
fn find_artifact(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let direct = dir.join(file_name);
    if direct.is_file() {
        return Some(direct);
    }
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs.iter().find_map(|sub| find_artifact(sub, file_name))
}

// ---------------------------------------------------------------------------
// Frontend descriptors
// ---------------------------------------------------------------------------

/// Address descriptor consumed by the frontend: `<Name>_DEPLOY.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDescriptor {
    pub address: Address,
}

/// Write `<Name>.json` (artifact with ABI) and `<Name>_DEPLOY.json`
/// (`{"address": ...}`) into `dir` for the frontend to bundle.
pub fn export_frontend(
    dir: &Path,
    artifact: &ContractArtifact,
    address: Address,
) -> Result<(), DeployError> {
    std::fs::create_dir_all(dir)?;
    let name = &artifact.contract_name;

    let abi_path = dir.join(format!("{name}.json"));
    std::fs::write(&abi_path, serde_json::to_string_pretty(artifact)?)?;

    let deploy_path = dir.join(format!("{name}_DEPLOY.json"));
    let descriptor = AddressDescriptor { address };
    std::fs::write(&deploy_path, serde_json::to_string_pretty(&descriptor)?)?;

    info!(name = %name, %address, dir = %dir.display(), "exported frontend descriptors");
    Ok(())
}

/// Read the address descriptor for `name` from a frontend contracts directory.
pub fn load_address_descriptor(dir: &Path, name: &str) -> Result<AddressDescriptor, DeployError> {
    let path = dir.join(format!("{name}_DEPLOY.json"));
    if !path.exists() {
        return Err(DeployError::MissingArtifact(format!("{name}_DEPLOY.json")));
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> ContractArtifact {
        ContractArtifact {
            contract_name: name.to_string(),
            abi: serde_json::json!([{ "type": "function", "name": "symbol", "inputs": [] }]),
            bytecode: "0x6080".to_string(),
        }
    }

    #[test]
    fn bytecode_decodes_hex() {
        let artifact = sample("FHERC20");
        assert_eq!(artifact.bytecode_bytes().unwrap().as_ref(), &[0x60, 0x80]);
    }

    #[test]
    fn empty_bytecode_is_rejected() {
        let mut artifact = sample("IFHERC20");
        artifact.bytecode = "0x".into();
        assert!(matches!(
            artifact.bytecode_bytes(),
            Err(DeployError::InvalidBytecode { .. })
        ));
    }

    #[test]
    fn in_memory_store_returns_inserted() {
        let mut store = ArtifactStore::in_memory();
        store.insert(sample("Voting"));
        assert_eq!(store.load("Voting").unwrap().bytecode, "0x6080");
        assert!(matches!(
            store.load("Auction"),
            Err(DeployError::MissingArtifact(_))
        ));
    }

    #[test]
    fn store_finds_nested_hardhat_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("contracts").join("Auction.sol");
        std::fs::create_dir_all(&nested).unwrap();
        let json = serde_json::json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "Auction",
            "sourceName": "contracts/Auction.sol",
            "abi": [],
            "bytecode": "0x6001",
            "deployedBytecode": "0x"
        });
        std::fs::write(nested.join("Auction.json"), json.to_string()).unwrap();
        std::fs::write(nested.join("Auction.dbg.json"), "{}").unwrap();

        let store = ArtifactStore::new(tmp.path());
        let artifact = store.load("Auction").unwrap();
        assert_eq!(artifact.contract_name, "Auction");
        assert_eq!(artifact.bytecode, "0x6001");
    }

    #[test]
    fn frontend_export_round_trips_address() {
        let tmp = tempfile::tempdir().unwrap();
        let address = Address::with_last_byte(0x42);
        export_frontend(tmp.path(), &sample("FHERC20"), address).unwrap();

        assert!(tmp.path().join("FHERC20.json").exists());
        let descriptor = load_address_descriptor(tmp.path(), "FHERC20").unwrap();
        assert_eq!(descriptor.address, address);
    }

    #[test]
    fn missing_descriptor_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_address_descriptor(tmp.path(), "FHERC20").is_err());
    }
}
