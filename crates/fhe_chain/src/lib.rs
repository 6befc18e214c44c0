pub mod abi;
pub mod artifacts;
pub mod contract;
pub mod deployer;
#[cfg(any(test, feature = "devnet"))]
pub mod devnet;
pub mod error;
pub mod fhe;
pub mod network;
pub mod permit;
pub mod registry;
pub mod rpc;
pub mod signer;

pub use artifacts::{AddressDescriptor, ArtifactStore, ContractArtifact, export_frontend, load_address_descriptor};
pub use contract::ContractHandle;
pub use deployer::{
    ConstructorArgs, DeployError, DeployOptions, Deployer, Deployment, Faucet, HttpFaucet,
    ensure_funds,
};
pub use error::ChainError;
pub use fhe::{EncryptError, EncryptedInput, Encryptor, PlaintextEncryptor, UintWidth};
pub use network::{NetworkConfig, NetworkStore};
pub use permit::{Permit, PermitError, PermitStore, SealingKey};
pub use registry::{DeploymentRecord, DeploymentRegistry};
pub use rpc::{ChainClient, ONE_ETHER, ReceiptWait, RpcClient, TxReceipt, TxRequest, signer_at};
pub use signer::LocalSignerClient;

#[cfg(feature = "tfhe")]
pub use fhe::CompactKeyEncryptor;
