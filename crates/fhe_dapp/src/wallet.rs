//! Wallet provider boundary.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use fhe_chain::{ChainClient, ChainError};
use fhe_core::{Classify, ErrorClass, USER_REJECTED_CODE};
use serde_json::Value;
use thiserror::Error;

/// EIP-1193 code for "chain not added to the wallet".
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Generic internal error code for failures without one of their own.
const INTERNAL_ERROR_CODE: i64 = -32603;

/// An EIP-1193 style provider error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("wallet error {code}: {message}")]
pub struct WalletError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl WalletError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }

    /// `data.message` when the provider attached one, else `message`.
    pub fn rpc_message(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| self.message.clone(), str::to_string)
    }
}

impl From<ChainError> for WalletError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Rpc { code, message, data } => Self { code, message, data },
            other => Self::new(INTERNAL_ERROR_CODE, other.to_string()),
        }
    }
}

impl Classify for WalletError {
    fn class(&self) -> ErrorClass {
        match self.code {
            USER_REJECTED_CODE => ErrorClass::UserDeclined,
            UNRECOGNIZED_CHAIN_CODE => ErrorClass::NetworkMismatch,
            _ => ErrorClass::CallFailed,
        }
    }
}

/// What the dapp needs from an injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts`: prompts the user; the first entry is selected.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// `wallet_switchEthereumChain`.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    /// Client used for contract calls, signing as the selected account.
    fn client(&self) -> Arc<dyn ChainClient>;
}

/// A node's own accounts exposed as a wallet, with `selected` first.
///
/// Switching chains is impossible, so any other chain id is reported as
/// unrecognized.
pub struct NodeWallet {
    client: Arc<dyn ChainClient>,
    selected: usize,
}

impl NodeWallet {
    pub fn new(client: Arc<dyn ChainClient>, selected: usize) -> Self {
        Self { client, selected }
    }
}

#[async_trait]
impl WalletProvider for NodeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let mut accounts = self.client.accounts().await?;
        if self.selected >= accounts.len() {
            return Err(ChainError::NoSuchAccount {
                index: self.selected,
                available: accounts.len(),
            }
            .into());
        }
        accounts.rotate_left(self.selected);
        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.client.chain_id().await?)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if self.client.chain_id().await? == chain_id {
            return Ok(());
        }
        Err(WalletError::new(
            UNRECOGNIZED_CHAIN_CODE,
            format!("Unrecognized chain ID {chain_id:#x}"),
        ))
    }

    fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhe_chain::devnet::DevChain;

    #[test]
    fn revert_data_wins_over_message() {
        let err = WalletError::from(ChainError::Rpc {
            code: 3,
            message: "execution reverted: nope".into(),
            data: Some(serde_json::json!({ "message": "nope" })),
        });
        assert_eq!(err.rpc_message(), "nope");
        assert_eq!(WalletError::new(-32000, "plain").rpc_message(), "plain");
    }

    #[test]
    fn classification() {
        assert_eq!(WalletError::user_rejected().class(), ErrorClass::UserDeclined);
        assert_eq!(
            WalletError::new(UNRECOGNIZED_CHAIN_CODE, "x").class(),
            ErrorClass::NetworkMismatch
        );
        let transport = WalletError::from(ChainError::Transport("down".into()));
        assert_eq!(transport.code, INTERNAL_ERROR_CODE);
    }

    #[tokio::test]
    async fn node_wallet_puts_selected_first() {
        let chain = Arc::new(DevChain::new());
        let wallet = NodeWallet::new(chain.clone(), 2);
        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts[0], chain.account(2));
        assert_eq!(accounts.len(), 10);

        assert!(NodeWallet::new(chain.clone(), 10).request_accounts().await.is_err());
    }

    #[tokio::test]
    async fn node_wallet_cannot_switch() {
        let chain = Arc::new(DevChain::new());
        let wallet = NodeWallet::new(chain, 0);
        assert!(wallet.switch_chain(412346).await.is_ok());
        let err = wallet.switch_chain(1).await.unwrap_err();
        assert_eq!(err.code, UNRECOGNIZED_CHAIN_CODE);
    }
}
