use std::sync::Arc;

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::error::ChainError;
use crate::rpc::{ChainClient, ReceiptWait, TxReceipt, TxRequest, send_and_confirm};

/// A deployed contract bound to a client: typed reads and writes through the
/// `sol!` call structs in [`crate::abi`].
#[derive(Clone)]
pub struct ContractHandle {
    client: Arc<dyn ChainClient>,
    address: Address,
    wait: ReceiptWait,
}

impl ContractHandle {
    pub fn new(client: Arc<dyn ChainClient>, address: Address) -> Self {
        Self {
            client,
            address,
            wait: ReceiptWait::default(),
        }
    }

    pub fn with_wait(mut self, wait: ReceiptWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// `eth_call` as `from` and decode the return values.
    pub async fn read<C: SolCall>(&self, from: Address, call: &C) -> Result<C::Return, ChainError> {
        debug!(contract = %self.address, method = C::SIGNATURE, "call");
        let tx = TxRequest::call(from, self.address, call.abi_encode());
        let output = self.client.call(&tx).await?;
        C::abi_decode_returns(&output, true).map_err(|e| ChainError::Decode(format!("{}: {e}", C::SIGNATURE)))
    }

    /// Submit a transaction without waiting for it to be mined.
    pub async fn submit<C: SolCall>(&self, from: Address, call: &C) -> Result<B256, ChainError> {
        debug!(contract = %self.address, method = C::SIGNATURE, %from, "send");
        let tx = TxRequest::call(from, self.address, call.abi_encode());
        self.client.send_transaction(&tx).await
    }

    /// Submit a transaction and wait for a successful receipt.
    pub async fn send<C: SolCall>(&self, from: Address, call: &C) -> Result<TxReceipt, ChainError> {
        debug!(contract = %self.address, method = C::SIGNATURE, %from, "send");
        let tx = TxRequest::call(from, self.address, call.abi_encode());
        send_and_confirm(self.client.as_ref(), &tx, self.wait).await
    }
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
