use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context as _, Result};
use fhe_chain::{
    ArtifactStore, ChainClient, ChainError, ContractHandle, Deployer, DeploymentRegistry,
    Encryptor, Faucet, HttpFaucet, LocalSignerClient, NetworkConfig, NetworkStore, PermitStore,
    PlaintextEncryptor, ReceiptWait, RpcClient, signer_at,
};
use fhe_core::{ConfigError, MNEMONIC_ENV, SuiteConfig};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use crate::error::TaskError;

/// Everything a command needs, passed explicitly instead of living in
/// module-level state.
pub struct TaskContext {
    pub client: Arc<dyn ChainClient>,
    pub network: NetworkConfig,
    pub registry: DeploymentRegistry,
    pub artifacts: ArtifactStore,
    pub permits: Mutex<PermitStore>,
    pub faucet: Option<Arc<dyn Faucet>>,
    pub wait: ReceiptWait,
    /// Where deploy scripts export frontend descriptors, if anywhere.
    pub frontend_dir: Option<PathBuf>,
    /// Resolved on first use; read-only commands never touch it.
    encryptor: OnceCell<Arc<dyn Encryptor>>,
    mock_fhe: bool,
}

impl TaskContext {
    pub fn new(
        client: Arc<dyn ChainClient>,
        network: NetworkConfig,
        registry: DeploymentRegistry,
        encryptor: Arc<dyn Encryptor>,
    ) -> Self {
        let mut ctx = Self::lazy(client, network, registry, false);
        ctx.encryptor = OnceCell::from(encryptor);
        ctx
    }

    /// A context whose encryptor is built the first time a command needs one.
    pub fn lazy(
        client: Arc<dyn ChainClient>,
        network: NetworkConfig,
        registry: DeploymentRegistry,
        mock_fhe: bool,
    ) -> Self {
        Self {
            client,
            network,
            registry,
            artifacts: ArtifactStore::in_memory(),
            permits: Mutex::new(PermitStore::new()),
            faucet: None,
            wait: ReceiptWait::default(),
            frontend_dir: None,
            encryptor: OnceCell::new(),
            mock_fhe,
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_permits(mut self, permits: PermitStore) -> Self {
        self.permits = Mutex::new(permits);
        self
    }

    pub fn with_faucet(mut self, faucet: Arc<dyn Faucet>) -> Self {
        self.faucet = Some(faucet);
        self
    }

    pub fn with_wait(mut self, wait: ReceiptWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_frontend_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frontend_dir = Some(dir.into());
        self
    }

    /// Build a context for `config.network` against a live node and check
    /// that the node reports the network's chain id.
    pub async fn from_config(config: &SuiteConfig) -> Result<Self> {
        let ctx = Self::open(config)?;
        ctx.verify_chain().await?;
        Ok(ctx)
    }

    /// Build a context for `config.network` without contacting the node.
    ///
    /// Networks flagged `local_accounts` sign with keys derived from the
    /// configured mnemonic; the rest use the node's own accounts.
    pub fn open(config: &SuiteConfig) -> Result<Self> {
        let network = resolve_network(config)?;
        let timeout = Duration::from_secs(network.timeout_secs);
        let rpc = RpcClient::new(network.rpc_url.clone(), timeout).context("failed to build RPC client")?;

        let client: Arc<dyn ChainClient> = if network.local_accounts {
            let phrase = config.mnemonic.as_deref().ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "{} has no node accounts; set {MNEMONIC_ENV} to sign locally",
                    network.name
                ))
            })?;
            Arc::new(LocalSignerClient::from_mnemonic(rpc, network.chain_id, phrase)?)
        } else {
            Arc::new(rpc)
        };
        Self::build(config, client)
    }

    /// Assemble a context for `config.network` around an existing client.
    /// Touches the filesystem for the permit store, never the network.
    pub fn build(config: &SuiteConfig, client: Arc<dyn ChainClient>) -> Result<Self> {
        let network = resolve_network(config)?;

        let permits_path = config.resolved_permits_path()?;
        let permits = PermitStore::open(&permits_path, config.permit_passphrase.clone())
            .with_context(|| format!("failed to open permit store {}", permits_path.display()))?;

        let registry = DeploymentRegistry::new(&config.deployments_dir, &network.name);
        let wait = ReceiptWait {
            poll_interval: Duration::from_millis(config.receipt_poll_ms),
            timeout: Duration::from_secs(config.receipt_timeout_secs),
        };

        let mut ctx = Self::lazy(client, network.clone(), registry, config.mock_fhe)
            .with_artifacts(ArtifactStore::new(&config.artifacts_dir))
            .with_permits(permits)
            .with_wait(wait)
            .with_frontend_dir(&config.frontend_dir);

        if let Some(faucet_url) = &network.faucet_url {
            let timeout = Duration::from_secs(network.timeout_secs);
            ctx = ctx.with_faucet(Arc::new(HttpFaucet::new(faucet_url.clone(), timeout)?));
        }
        Ok(ctx)
    }

    /// Fail with [`ChainError::ChainMismatch`] unless the node serves this
    /// context's network.
    pub async fn verify_chain(&self) -> Result<()> {
        let actual = self.client.chain_id().await.with_context(|| {
            format!("failed to reach {} at {}", self.network.name, self.network.rpc_url)
        })?;
        if actual != self.network.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.network.chain_id,
                actual,
            }
            .into());
        }
        info!(network = %self.network.name, chain_id = actual, rpc = %self.network.rpc_url, "connected");
        Ok(())
    }

    /// The input encryptor: plaintext for mock-FHE setups, the network key
    /// otherwise. Built once, on first call.
    pub async fn encryptor(&self) -> Result<Arc<dyn Encryptor>, TaskError> {
        let encryptor = self
            .encryptor
            .get_or_try_init(|| build_encryptor(self.mock_fhe, self.client.as_ref()))
            .await?;
        Ok(encryptor.clone())
    }

    /// The node-held account at `index`.
    pub async fn signer(&self, index: usize) -> Result<Address, TaskError> {
        Ok(signer_at(self.client.as_ref(), index).await?)
    }

    /// Handle for the deployment recorded under `name`.
    pub fn contract(&self, name: &str) -> Result<ContractHandle, TaskError> {
        let address = self.registry.address_of(name)?;
        Ok(ContractHandle::new(self.client.clone(), address).with_wait(self.wait))
    }

    /// A deployer sharing this context's client, registry and artifacts.
    pub fn deployer(&self) -> Deployer {
        let deployer = Deployer::new(
            self.client.clone(),
            self.network.clone(),
            self.artifacts.clone(),
            self.registry.clone(),
        )
        .with_wait(self.wait);
        match &self.faucet {
            Some(faucet) => deployer.with_faucet(faucet.clone()),
            None => deployer,
        }
    }

    /// Dev-network balance guard before a paid action.
    pub async fn ensure_funds(&self, signer: Address) -> Result<(), TaskError> {
        fhe_chain::ensure_funds(
            self.client.as_ref(),
            &self.network,
            self.faucet.as_deref(),
            signer,
        )
        .await?;
        Ok(())
    }
}

fn resolve_network(config: &SuiteConfig) -> Result<NetworkConfig> {
    let mut networks = NetworkStore::with_defaults();
    networks
        .apply_overrides(&config.custom_rpc_urls)
        .context("invalid custom RPC URL in config")?;
    Ok(networks.require(&config.network)?.clone())
}

async fn build_encryptor(mock_fhe: bool, client: &dyn ChainClient) -> Result<Arc<dyn Encryptor>, TaskError> {
    if mock_fhe {
        warn!("mock_fhe is set: encrypted inputs are sent as plaintext");
        return Ok(Arc::new(PlaintextEncryptor));
    }
    network_encryptor(client).await
}

#[cfg(feature = "tfhe")]
async fn network_encryptor(client: &dyn ChainClient) -> Result<Arc<dyn Encryptor>, TaskError> {
    Ok(Arc::new(fhe_chain::CompactKeyEncryptor::fetch(client).await?))
}

#[cfg(not(feature = "tfhe"))]
async fn network_encryptor(_client: &dyn ChainClient) -> Result<Arc<dyn Encryptor>, TaskError> {
    Err(ConfigError::Invalid(
        "this build has no FHE support; enable the `tfhe` feature or set mock_fhe".into(),
    )
    .into())
}
