//! JSON-RPC access to an EVM node.
//!
//! [`ChainClient`] is the seam every higher layer talks through. [`RpcClient`]
//! implements it over HTTP; the `devnet` feature provides an in-process one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ChainError;

/// One native-currency unit (1e18 wei).
pub const ONE_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

// ---------------------------------------------------------------------------
// Transaction types
// ---------------------------------------------------------------------------

/// A call or transaction sent from a node-held account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
    #[serde(skip_serializing_if = "U256::is_zero", default)]
    pub value: U256,
}

impl TxRequest {
    /// A contract call (or read) with no value attached.
    pub fn call(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to: Some(to),
            data: data.into(),
            value: U256::ZERO,
        }
    }

    /// A contract creation carrying `bytecode ++ constructor args`.
    pub fn create(from: Address, init_code: impl Into<Bytes>) -> Self {
        Self {
            from,
            to: None,
            data: init_code.into(),
            value: U256::ZERO,
        }
    }

    /// A plain native-currency transfer.
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to: Some(to),
            data: Bytes::new(),
            value,
        }
    }
}

/// The subset of a transaction receipt the suite inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub gas_used: U256,
}

impl TxReceipt {
    /// A receipt only counts as confirmed with a non-zero status.
    pub fn succeeded(&self) -> bool {
        self.status.is_some_and(|s| !s.is_zero())
    }
}

/// How long and how often to poll for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(120),
        }
    }
}

// ---------------------------------------------------------------------------
// ChainClient
// ---------------------------------------------------------------------------

/// Everything the suite needs from a node. Signing happens on the node side:
/// `from` must be one of the node's own accounts.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Node-held accounts, in the order the node reports them.
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;

    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Deployed code at `address`; empty for EOAs and unknown addresses.
    async fn code(&self, address: Address) -> Result<Bytes, ChainError>;

    /// Read-only call against the latest block.
    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ChainError>;

    /// Submit a transaction for the node to sign; returns its hash.
    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError>;

    /// `None` while the transaction is still pending.
    async fn receipt(&self, hash: B256) -> Result<Option<TxReceipt>, ChainError>;

    /// EIP-712 signature over `typed_data` by `signer` (`eth_signTypedData_v4`).
    async fn sign_typed_data(
        &self,
        signer: Address,
        typed_data: &serde_json::Value,
    ) -> Result<Bytes, ChainError>;
}

/// Resolve the signer at `index` in the node's account list.
pub async fn signer_at(client: &dyn ChainClient, index: usize) -> Result<Address, ChainError> {
    let accounts = client.accounts().await?;
    accounts
        .get(index)
        .copied()
        .ok_or(ChainError::NoSuchAccount {
            index,
            available: accounts.len(),
        })
}

/// Poll until the receipt for `hash` appears or `wait.timeout` elapses.
///
/// Returns the receipt whatever its status; callers decide what a zero status
/// means for them.
pub async fn wait_for_receipt(
    client: &dyn ChainClient,
    hash: B256,
    wait: ReceiptWait,
) -> Result<TxReceipt, ChainError> {
    let deadline = tokio::time::Instant::now() + wait.timeout;
    loop {
        if let Some(receipt) = client.receipt(hash).await? {
            debug!(tx = %hash, status = ?receipt.status, "receipt received");
            return Ok(receipt);
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(tx = %hash, "gave up waiting for receipt");
            return Err(ChainError::ReceiptTimeout(hash));
        }
        tokio::time::sleep(wait.poll_interval).await;
    }
}

/// Send a transaction and wait for a successful receipt.
pub async fn send_and_confirm(
    client: &dyn ChainClient,
    tx: &TxRequest,
    wait: ReceiptWait,
) -> Result<TxReceipt, ChainError> {
    let hash = client.send_transaction(tx).await?;
    let receipt = wait_for_receipt(client, hash, wait).await?;
    if !receipt.succeeded() {
        return Err(ChainError::Reverted(hash));
    }
    Ok(receipt)
}

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// RpcClient
// ---------------------------------------------------------------------------

/// HTTP JSON-RPC client for an EVM node.
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one JSON-RPC request and deserialize its `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        debug!(method, id, "rpc request");

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::Transport(format!("HTTP {status}: {text}")));
        }

        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        if let Some(err) = parsed.error {
            debug!(method, code = err.code, message = %err.message, "rpc error");
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        let value = parsed.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value)
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let id: U64 = self.request("eth_chainId", serde_json::json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.request("eth_accounts", serde_json::json!([])).await
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.request("eth_getBalance", serde_json::json!([address, "latest"]))
            .await
    }

    async fn code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.request("eth_getCode", serde_json::json!([address, "latest"]))
            .await
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ChainError> {
        self.request("eth_call", serde_json::json!([tx, "latest"]))
            .await
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError> {
        self.request("eth_sendTransaction", serde_json::json!([tx]))
            .await
    }

    async fn receipt(&self, hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        self.request("eth_getTransactionReceipt", serde_json::json!([hash]))
            .await
    }

    async fn sign_typed_data(
        &self,
        signer: Address,
        typed_data: &serde_json::Value,
    ) -> Result<Bytes, ChainError> {
        // v4 takes the typed data as a JSON string, not an object.
        let encoded = typed_data.to_string();
        self.request(
            "eth_signTypedData_v4",
            serde_json::json!([signer, encoded]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_ether_is_1e18_wei() {
        assert_eq!(ONE_ETHER, U256::from(10u64).pow(U256::from(18u64)));
    }

    #[test]
    fn call_request_omits_zero_value() {
        let tx = TxRequest::call(Address::ZERO, Address::with_last_byte(1), vec![0xab]);
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("value").is_none());
        assert_eq!(json["data"], "0xab");
    }

    #[test]
    fn create_request_omits_to() {
        let tx = TxRequest::create(Address::ZERO, vec![0x60, 0x80]);
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("to").is_none());
    }

    #[test]
    fn transfer_request_carries_value() {
        let tx = TxRequest::transfer(Address::ZERO, Address::with_last_byte(2), ONE_ETHER);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["value"], "0xde0b6b3a7640000");
    }

    #[test]
    fn receipt_parses_node_json() {
        let json = serde_json::json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "status": "0x1",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "blockNumber": "0x2",
            "gasUsed": "0x5208",
            "logs": []
        });
        let receipt: TxReceipt = serde_json::from_value(json).unwrap();
        assert!(receipt.succeeded());
        assert!(receipt.contract_address.is_some());
        assert_eq!(receipt.gas_used, U256::from(21_000u64));
    }

    #[test]
    fn zero_status_is_not_success() {
        let receipt = TxReceipt {
            transaction_hash: B256::ZERO,
            status: Some(U64::ZERO),
            contract_address: None,
            block_number: None,
            gas_used: U256::ZERO,
        };
        assert!(!receipt.succeeded());
    }

    #[test]
    fn missing_status_is_not_success() {
        let receipt = TxReceipt {
            transaction_hash: B256::ZERO,
            status: None,
            contract_address: None,
            block_number: None,
            gas_used: U256::ZERO,
        };
        assert!(!receipt.succeeded());
    }

    #[test]
    fn rpc_client_keeps_url() {
        let client = RpcClient::new("http://127.0.0.1:42069", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:42069");
    }
}
