use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolConstructor;
use async_trait::async_trait;
use chrono::Utc;
use fhe_core::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::error::ChainError;
use crate::network::NetworkConfig;
use crate::registry::{DeploymentRecord, DeploymentRegistry};
use crate::rpc::{ChainClient, ONE_ETHER, ReceiptWait, TxRequest, send_and_confirm};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no deployment of {name} on {network}; run the deploy scripts first")]
    Missing { name: String, network: String },

    #[error("no compiled artifact for {0}")]
    MissingArtifact(String),

    #[error("invalid bytecode for {name}: {reason}")]
    InvalidBytecode { name: String, reason: String },

    #[error("receipt for {0} carries no contract address")]
    NoContractAddress(String),

    #[error("no faucet configured for {0}")]
    NoFaucet(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("deployment store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("deployment store JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Classify for DeployError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Missing { .. } => ErrorClass::PreconditionNotMet,
            Self::MissingArtifact(_) | Self::InvalidBytecode { .. } | Self::NoFaucet(_) => {
                ErrorClass::Configuration
            }
            Self::Chain(e) => e.class(),
            Self::NoContractAddress(_) => ErrorClass::CallFailed,
            Self::Io(_) | Self::Json(_) => ErrorClass::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Faucet
// ---------------------------------------------------------------------------

/// Funding entrypoint of a development network.
#[async_trait]
pub trait Faucet: Send + Sync {
    async fn request_funds(&self, address: Address) -> Result<(), ChainError>;
}

/// The dev node's HTTP faucet: `GET <base>/faucet?address=0x...`.
pub struct HttpFaucet {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFaucet {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// The faucet matches addresses as lowercase hex, not EIP-55.
    pub fn request_url(&self, address: Address) -> String {
        format!(
            "{}/faucet?address=0x{}",
            self.base_url.trim_end_matches('/'),
            hex::encode(address)
        )
    }
}

#[async_trait]
impl Faucet for HttpFaucet {
    async fn request_funds(&self, address: Address) -> Result<(), ChainError> {
        let url = self.request_url(address);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Faucet(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deployer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Return an existing record (whose address still has code) instead of
    /// publishing a new instance.
    pub skip_if_already_deployed: bool,
}

impl DeployOptions {
    pub fn skip_if_deployed() -> Self {
        Self {
            skip_if_already_deployed: true,
        }
    }

    pub fn always() -> Self {
        Self::default()
    }
}

/// ABI-encoded constructor arguments plus a loggable rendition for the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructorArgs {
    pub encoded: Vec<u8>,
    pub logged: Vec<serde_json::Value>,
}

impl ConstructorArgs {
    pub fn new<C: SolConstructor>(call: &C, logged: Vec<serde_json::Value>) -> Self {
        Self {
            encoded: call.abi_encode(),
            logged,
        }
    }
}

/// What [`Deployer::deploy`] did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub record: DeploymentRecord,
    pub newly_deployed: bool,
}

impl Deployment {
    pub fn address(&self) -> Address {
        self.record.address
    }
}

/// Publishes contracts and keeps the deployment registry. The only writer of
/// deployment records.
pub struct Deployer {
    client: Arc<dyn ChainClient>,
    network: NetworkConfig,
    artifacts: ArtifactStore,
    registry: DeploymentRegistry,
    faucet: Option<Arc<dyn Faucet>>,
    wait: ReceiptWait,
}

impl Deployer {
    pub fn new(
        client: Arc<dyn ChainClient>,
        network: NetworkConfig,
        artifacts: ArtifactStore,
        registry: DeploymentRegistry,
    ) -> Self {
        Self {
            client,
            network,
            artifacts,
            registry,
            faucet: None,
            wait: ReceiptWait::default(),
        }
    }

    pub fn with_faucet(mut self, faucet: Arc<dyn Faucet>) -> Self {
        self.faucet = Some(faucet);
        self
    }

    pub fn with_wait(mut self, wait: ReceiptWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Publish `name` from `from`, or reuse the recorded instance when
    /// `options.skip_if_already_deployed` is set and it still has code.
    pub async fn deploy(
        &self,
        from: Address,
        name: &str,
        args: ConstructorArgs,
        options: DeployOptions,
    ) -> Result<Deployment, DeployError> {
        if options.skip_if_already_deployed {
            if let Some(existing) = self.registry.get(name)? {
                let code = self.client.code(existing.address).await?;
                if !code.is_empty() {
                    info!(name, address = %existing.address, "reusing deployment");
                    return Ok(Deployment {
                        record: existing,
                        newly_deployed: false,
                    });
                }
                warn!(name, address = %existing.address, "recorded deployment has no code, redeploying");
            }
        }

        self.ensure_funds(from).await?;

        let artifact = self.artifacts.load(name)?;
        let mut init_code = artifact.bytecode_bytes()?.to_vec();
        init_code.extend_from_slice(&args.encoded);

        let tx = TxRequest::create(from, Bytes::from(init_code));
        let receipt = send_and_confirm(self.client.as_ref(), &tx, self.wait).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::NoContractAddress(name.to_string()))?;

        let record = DeploymentRecord {
            contract_name: name.to_string(),
            address,
            transaction_hash: Some(receipt.transaction_hash),
            args: args.logged,
            deployed_at: Utc::now(),
        };
        self.registry.save(&record)?;
        info!(
            name,
            %address,
            tx = %receipt.transaction_hash,
            gas_used = %receipt.gas_used,
            network = %self.network.name,
            "contract deployed"
        );

        Ok(Deployment {
            record,
            newly_deployed: true,
        })
    }

    /// On dev networks, top `signer` up from the faucet when its balance is
    /// below one native unit. No-op elsewhere.
    pub async fn ensure_funds(&self, signer: Address) -> Result<(), DeployError> {
        ensure_funds(
            self.client.as_ref(),
            &self.network,
            self.faucet.as_deref(),
            signer,
        )
        .await
        .map(|_| ())
    }
}

/// Dev-network funding guard. Returns the new balance when a top-up happened.
pub async fn ensure_funds(
    client: &dyn ChainClient,
    network: &NetworkConfig,
    faucet: Option<&dyn Faucet>,
    signer: Address,
) -> Result<Option<U256>, DeployError> {
    if !network.dev {
        return Ok(None);
    }
    let balance = client.balance(signer).await?;
    if balance >= ONE_ETHER {
        return Ok(None);
    }

    let faucet = faucet.ok_or_else(|| DeployError::NoFaucet(network.name.clone()))?;
    info!(%signer, %balance, "balance below 1 unit, requesting faucet funds");
    faucet.request_funds(signer).await?;

    let updated = client.balance(signer).await?;
    info!(%signer, balance = %updated, "funded from faucet");
    Ok(Some(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkStore;

    #[test]
    fn faucet_url_shape() {
        let faucet = HttpFaucet::new("http://127.0.0.1:42000/", Duration::from_secs(5)).unwrap();
        let url = faucet.request_url(Address::with_last_byte(0xab));
        assert!(url.starts_with("http://127.0.0.1:42000/faucet?address=0x"));
        assert!(url.ends_with("ab"));
    }

    #[test]
    fn faucet_url_uses_lowercase_address() {
        let faucet = HttpFaucet::new("http://127.0.0.1:42000", Duration::from_secs(5)).unwrap();
        let address: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(
            faucet.request_url(address),
            "http://127.0.0.1:42000/faucet?address=0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn missing_deployment_is_precondition() {
        let err = DeployError::Missing {
            name: "Auction".into(),
            network: "localfhenix".into(),
        };
        assert_eq!(err.class(), ErrorClass::PreconditionNotMet);
        assert_eq!(
            err.to_string(),
            "no deployment of Auction on localfhenix; run the deploy scripts first"
        );
    }

    #[test]
    fn missing_artifact_is_configuration() {
        assert_eq!(
            DeployError::MissingArtifact("Voting".into()).class(),
            ErrorClass::Configuration
        );
    }

    #[test]
    fn constructor_args_encode() {
        let call = crate::abi::FHERC20::constructorCall {
            name: "token".into(),
            symbol: "FHE".into(),
        };
        let args = ConstructorArgs::new(&call, vec![serde_json::json!("token"), serde_json::json!("FHE")]);
        assert!(!args.encoded.is_empty());
        assert_eq!(args.logged.len(), 2);
    }

    #[tokio::test]
    async fn ensure_funds_skips_non_dev_networks() {
        struct Unreachable;

        #[async_trait]
        impl ChainClient for Unreachable {
            async fn chain_id(&self) -> Result<u64, ChainError> {
                unreachable!()
            }
            async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
                unreachable!()
            }
            async fn balance(&self, _: Address) -> Result<U256, ChainError> {
                unreachable!()
            }
            async fn code(&self, _: Address) -> Result<Bytes, ChainError> {
                unreachable!()
            }
            async fn call(&self, _: &TxRequest) -> Result<Bytes, ChainError> {
                unreachable!()
            }
            async fn send_transaction(&self, _: &TxRequest) -> Result<alloy_primitives::B256, ChainError> {
                unreachable!()
            }
            async fn receipt(
                &self,
                _: alloy_primitives::B256,
            ) -> Result<Option<crate::rpc::TxReceipt>, ChainError> {
                unreachable!()
            }
            async fn sign_typed_data(&self, _: Address, _: &serde_json::Value) -> Result<Bytes, ChainError> {
                unreachable!()
            }
        }

        let networks = NetworkStore::with_defaults();
        let testnet = networks.get("fhenixTestnet").unwrap();
        let topped = ensure_funds(&Unreachable, testnet, None, Address::ZERO)
            .await
            .unwrap();
        assert!(topped.is_none());
    }
}
