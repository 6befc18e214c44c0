//! Client-side signing for networks whose nodes hold no accounts.
//!
//! [`LocalSignerClient`] wraps an [`RpcClient`] with keys derived from a
//! mnemonic. Reads go straight to the node; transactions are signed locally
//! and submitted raw, and typed data is hashed and signed here.

use std::collections::HashMap;

use alloy_consensus::{SignableTransaction, Signed, TxEnvelope, TxLegacy};
use alloy_dyn_abi::TypedData;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256, Bytes, TxKind, U64, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::coins_bip39::English;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::error::ChainError;
use crate::rpc::{ChainClient, RpcClient, TxReceipt, TxRequest};

/// Accounts derived from a mnemonic, matching a development node's layout.
pub const DERIVED_ACCOUNTS: u32 = 20;

/// Derive `count` signers along `m/44'/60'/0'/0/{index}`.
pub fn signers_from_mnemonic(phrase: &str, count: u32) -> Result<Vec<PrivateKeySigner>, ChainError> {
    (0..count)
        .map(|index| {
            MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .index(index)
                .and_then(|builder| builder.build())
                .map_err(|e| ChainError::Signing(format!("mnemonic derivation failed: {e}")))
        })
        .collect()
}

pub struct LocalSignerClient {
    inner: RpcClient,
    chain_id: u64,
    order: Vec<Address>,
    signers: HashMap<Address, PrivateKeySigner>,
}

impl LocalSignerClient {
    pub fn new(inner: RpcClient, chain_id: u64, signers: Vec<PrivateKeySigner>) -> Self {
        let order = signers.iter().map(|s| s.address()).collect();
        let signers = signers.into_iter().map(|s| (s.address(), s)).collect();
        Self {
            inner,
            chain_id,
            order,
            signers,
        }
    }

    /// Derive [`DERIVED_ACCOUNTS`] keys from `phrase`.
    pub fn from_mnemonic(inner: RpcClient, chain_id: u64, phrase: &str) -> Result<Self, ChainError> {
        let signers = signers_from_mnemonic(phrase, DERIVED_ACCOUNTS)?;
        info!(chain_id, accounts = signers.len(), "using local signer");
        Ok(Self::new(inner, chain_id, signers))
    }

    fn signer(&self, address: Address) -> Result<&PrivateKeySigner, ChainError> {
        self.signers
            .get(&address)
            .ok_or_else(|| ChainError::Signing(format!("no local key for {address}")))
    }

    /// Fill in nonce, gas price and gas limit from the node.
    async fn prepare(&self, tx: &TxRequest) -> Result<TxLegacy, ChainError> {
        let nonce: U64 = self
            .inner
            .request("eth_getTransactionCount", json!([tx.from, "pending"]))
            .await?;
        let gas_price: U256 = self.inner.request("eth_gasPrice", json!([])).await?;
        let gas_limit: U64 = self.inner.request("eth_estimateGas", json!([tx])).await?;
        Ok(legacy_tx(self.chain_id, tx, nonce.to(), gas_price.saturating_to(), gas_limit.to()))
    }

    fn sign(&self, from: Address, tx: TxLegacy) -> Result<Signed<TxLegacy>, ChainError> {
        let signature = self
            .signer(from)?
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        Ok(tx.into_signed(signature))
    }

    fn sign_eip712(&self, signer: Address, typed_data: &serde_json::Value) -> Result<Bytes, ChainError> {
        let typed: TypedData = serde_json::from_value(typed_data.clone())
            .map_err(|e| ChainError::Signing(format!("malformed typed data: {e}")))?;
        let hash = typed
            .eip712_signing_hash()
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let signature = self
            .signer(signer)?
            .sign_hash_sync(&hash)
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

fn legacy_tx(chain_id: u64, tx: &TxRequest, nonce: u64, gas_price: u128, gas_limit: u64) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price,
        gas_limit,
        to: tx.to.map_or(TxKind::Create, TxKind::Call),
        value: tx.value,
        input: tx.data.clone(),
    }
}

#[async_trait]
impl ChainClient for LocalSignerClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.inner.chain_id().await
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.order.clone())
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.inner.balance(address).await
    }

    async fn code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.inner.code(address).await
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ChainError> {
        self.inner.call(tx).await
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError> {
        self.signer(tx.from)?;
        let unsigned = self.prepare(tx).await?;
        let signed = self.sign(tx.from, unsigned)?;
        let raw = Bytes::from(TxEnvelope::Legacy(signed).encoded_2718());
        debug!(from = %tx.from, bytes = raw.len(), "sending raw transaction");
        self.inner
            .request("eth_sendRawTransaction", json!([raw]))
            .await
    }

    async fn receipt(&self, hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        self.inner.receipt(hash).await
    }

    async fn sign_typed_data(
        &self,
        signer: Address,
        typed_data: &serde_json::Value,
    ) -> Result<Bytes, ChainError> {
        self.sign_eip712(signer, typed_data)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{PrimitiveSignature, address};

    use super::*;
    use crate::permit::permit_typed_data;

    const PHRASE: &str = "test test test test test test test test test test test junk";
    const FIRST: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const SECOND: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    fn client() -> LocalSignerClient {
        let rpc = RpcClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        LocalSignerClient::from_mnemonic(rpc, 42069, PHRASE).unwrap()
    }

    #[tokio::test]
    async fn accounts_follow_derivation_order() {
        let accounts = client().accounts().await.unwrap();
        assert_eq!(accounts.len(), DERIVED_ACCOUNTS as usize);
        assert_eq!(accounts[0], FIRST);
        assert_eq!(accounts[1], SECOND);
    }

    #[test]
    fn legacy_transaction_recovers_to_sender() {
        let client = client();
        let request = TxRequest::call(FIRST, SECOND, vec![0xab, 0xcd]);
        let unsigned = legacy_tx(42069, &request, 7, 1_000_000_000, 50_000);
        assert_eq!(unsigned.to, TxKind::Call(SECOND));

        let signed = client.sign(FIRST, unsigned).unwrap();
        let hash = signed.tx().signature_hash();
        let recovered = signed.signature().recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, FIRST);
        assert_eq!(signed.tx().chain_id, Some(42069));
    }

    #[test]
    fn creation_has_no_recipient() {
        let request = TxRequest::create(FIRST, vec![0x60, 0x80]);
        let tx = legacy_tx(1, &request, 0, 1, 21_000);
        assert_eq!(tx.to, TxKind::Create);
    }

    #[tokio::test]
    async fn unknown_sender_is_refused_before_rpc() {
        let request = TxRequest::transfer(Address::with_last_byte(9), FIRST, U256::from(1u64));
        let err = client().send_transaction(&request).await.unwrap_err();
        assert!(matches!(err, ChainError::Signing(_)), "{err:?}");
    }

    #[tokio::test]
    async fn permit_signature_recovers_to_signer() {
        let contract = Address::with_last_byte(0x42);
        let typed = permit_typed_data(42069, contract, B256::repeat_byte(0x11));
        let raw = client().sign_typed_data(SECOND, &typed).await.unwrap();
        assert_eq!(raw.len(), 65);

        let hash = serde_json::from_value::<TypedData>(typed)
            .unwrap()
            .eip712_signing_hash()
            .unwrap();
        let signature = PrimitiveSignature::from_raw(&raw).unwrap();
        assert_eq!(signature.recover_address_from_prehash(&hash).unwrap(), SECOND);
    }

    #[test]
    fn bad_mnemonic_is_a_signing_error() {
        let err = signers_from_mnemonic("not a mnemonic", 1).unwrap_err();
        assert!(matches!(err, ChainError::Signing(_)));
    }
}
