//! Headless dapp session.
//!
//! Holds what the browser page kept in component state (selected account,
//! token handle, permit, balance, last transaction) and exposes the page's
//! handlers as methods. Balance reads are re-attempted whenever one of their
//! inputs changes rather than on a timer. Every change is published as a
//! [`SessionView`] on a watch channel for presentation layers.

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use fhe_chain::abi::{FHERC20, names};
use fhe_chain::rpc::wait_for_receipt;
use fhe_chain::network::LOCALFHENIX_CHAIN_ID;
use fhe_chain::{
    ContractHandle, Encryptor, Permit, PermitStore, ReceiptWait, UintWidth, load_address_descriptor,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::DappError;
use crate::state::{BalanceState, SessionView, TokenData, TxState, UiState};
use crate::wallet::WalletProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DappConfig {
    /// Chain the wallet is asked to switch to when it reports another.
    pub expected_chain_id: u64,
    pub token_address: Address,
    pub wait: ReceiptWait,
}

impl DappConfig {
    pub fn new(token_address: Address) -> Self {
        Self {
            expected_chain_id: LOCALFHENIX_CHAIN_ID,
            token_address,
            wait: ReceiptWait::default(),
        }
    }

    /// Read the token address from the `FHERC20_DEPLOY.json` descriptor the
    /// deploy scripts export.
    pub fn from_frontend_dir(dir: &Path) -> Result<Self, DappError> {
        let descriptor = load_address_descriptor(dir, names::FHERC20)?;
        Ok(Self::new(descriptor.address))
    }
}

pub struct DappSession {
    config: DappConfig,
    wallet: Arc<dyn WalletProvider>,
    /// Only transfers encrypt; a read-only session runs without one.
    encryptor: Option<Arc<dyn Encryptor>>,
    permits: PermitStore,
    updates: watch::Sender<SessionView>,

    connecting: bool,
    account: Option<Address>,
    contract: Option<ContractHandle>,
    token: Option<TokenData>,
    permit: Option<Permit>,
    balance: BalanceState,
    tx: TxState,
    network_error: Option<String>,
}

impl DappSession {
    pub fn new(config: DappConfig, wallet: Arc<dyn WalletProvider>) -> Self {
        let (updates, _) = watch::channel(SessionView::disconnected());
        Self {
            config,
            wallet,
            encryptor: None,
            permits: PermitStore::new(),
            updates,
            connecting: false,
            account: None,
            contract: None,
            token: None,
            permit: None,
            balance: BalanceState::Unavailable,
            tx: TxState::Idle,
            network_error: None,
        }
    }

    pub fn with_encryptor(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Reuse permits issued earlier instead of prompting for new ones.
    pub fn with_permits(mut self, permits: PermitStore) -> Self {
        self.permits = permits;
        self
    }

    /// Receive a fresh [`SessionView`] after every state change, including
    /// the `Connecting` phase while the wallet prompt is open.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.view());
    }

    pub fn state(&self) -> UiState {
        if self.connecting {
            return UiState::Connecting;
        }
        let Some(account) = self.account else {
            return UiState::Disconnected;
        };
        match (&self.token, self.balance) {
            (Some(token), BalanceState::Known(_)) => UiState::Ready {
                account,
                token: token.clone(),
            },
            _ => UiState::Connected { account },
        }
    }

    pub fn balance(&self) -> BalanceState {
        self.balance
    }

    pub fn tx(&self) -> &TxState {
        &self.tx
    }

    pub fn network_error(&self) -> Option<&str> {
        self.network_error.as_deref()
    }

    pub fn permit(&self) -> Option<&Permit> {
        self.permit.as_ref()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            ui: self.state(),
            balance: self.balance,
            tx: self.tx.clone(),
            network_error: self.network_error.clone(),
        }
    }

    // -- Connection ---------------------------------------------------------

    /// Ask the wallet for accounts, make sure it is on the expected chain,
    /// then initialise for the first account.
    ///
    /// A declined prompt leaves the session disconnected and is not an error.
    pub async fn connect(&mut self) -> Result<(), DappError> {
        self.connecting = true;
        self.publish();
        let result = self.connect_inner().await;
        self.connecting = false;
        self.publish();
        match result {
            Err(e) if e.is_user_rejection() => {
                debug!("wallet connection declined");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "error connecting the wallet");
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn connect_inner(&mut self) -> Result<(), DappError> {
        let accounts = self.wallet.request_accounts().await?;
        let Some(&selected) = accounts.first() else {
            return Err(DappError::NotConnected);
        };
        if !self.check_network().await? {
            return Ok(());
        }
        self.initialize(selected).await
    }

    /// Returns whether the wallet ended up on the expected chain. A failed
    /// switch is recorded as the network error.
    async fn check_network(&mut self) -> Result<bool, DappError> {
        let expected = self.config.expected_chain_id;
        let actual = self.wallet.chain_id().await?;
        if actual == expected {
            return Ok(true);
        }
        info!(expected, actual, "wallet on wrong chain, requesting switch");
        match self.wallet.switch_chain(expected).await {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(code = e.code, "network switch error: {}", e.message);
                self.network_error = Some(e.to_string());
                Ok(false)
            }
        }
    }

    /// Wallet `accountsChanged` event.
    pub async fn accounts_changed(&mut self, accounts: &[Address]) -> Result<(), DappError> {
        let result = match accounts.first() {
            None => {
                self.reset();
                Ok(())
            }
            Some(&account) => self.initialize(account).await,
        };
        self.publish();
        result
    }

    /// Back to a fresh, disconnected session.
    pub fn reset(&mut self) {
        debug!("resetting dapp session");
        self.account = None;
        self.contract = None;
        self.token = None;
        self.permit = None;
        self.balance = BalanceState::Unavailable;
        self.tx = TxState::Idle;
        self.network_error = None;
        self.publish();
    }

    async fn initialize(&mut self, account: Address) -> Result<(), DappError> {
        info!(%account, token = %self.config.token_address, "initialising session");
        self.account = Some(account);
        self.token = None;
        self.permit = None;
        self.balance = BalanceState::Pending;

        let contract = ContractHandle::new(self.wallet.client(), self.config.token_address)
            .with_wait(self.config.wait);
        self.contract = Some(contract.clone());
        self.load_token_data(&contract, account).await;

        debug!(contract = %self.config.token_address, "loading permit");
        match self
            .permits
            .get_or_create(contract.client().as_ref(), contract.address(), account)
            .await
        {
            Ok(permit) => self.permit = Some(permit),
            Err(e) => {
                let e = DappError::from(e);
                if !e.is_user_rejection() {
                    warn!(error = %e, "could not obtain a permit");
                }
            }
        }

        self.refresh_balance().await;
        Ok(())
    }

    async fn load_token_data(&mut self, contract: &ContractHandle, account: Address) {
        let name = contract.read(account, &FHERC20::nameCall {}).await;
        let symbol = contract.read(account, &FHERC20::symbolCall {}).await;
        match (name, symbol) {
            (Ok(name), Ok(symbol)) => {
                self.token = Some(TokenData {
                    name: name._0,
                    symbol: symbol._0,
                })
            }
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "could not read token metadata"),
        }
    }

    /// Install a permit obtained elsewhere and re-attempt the balance read.
    pub async fn set_permit(&mut self, permit: Permit) -> Result<(), DappError> {
        self.permits.insert(permit.clone())?;
        self.permit = Some(permit);
        self.refresh_balance().await;
        Ok(())
    }

    /// Read and unseal the balance if contract, account and permit are all
    /// present. Failures leave the balance pending until the next change.
    pub async fn refresh_balance(&mut self) {
        self.balance = self.read_current_balance().await;
        self.publish();
    }

    async fn read_current_balance(&self) -> BalanceState {
        let (Some(contract), Some(account)) = (&self.contract, self.account) else {
            return BalanceState::Unavailable;
        };
        let Some(permit) = &self.permit else {
            debug!(%account, "balance pending: no permit yet");
            return BalanceState::Pending;
        };

        match read_balance(contract, account, permit).await {
            Ok(balance) => {
                debug!(%account, %balance, "balance updated");
                BalanceState::Known(balance)
            }
            Err(e) => {
                warn!(%account, error = %e, "balance read failed, will retry");
                BalanceState::Pending
            }
        }
    }

    // -- Transactions -------------------------------------------------------

    /// Encrypted transfer from the connected account.
    ///
    /// Ends in `Confirmed` (and a balance refresh), `Failed`, or back in
    /// `Idle` when the user declines the prompt. The resulting state is
    /// returned as well as stored.
    pub async fn transfer(&mut self, to: Address, amount: u64) -> TxState {
        self.dismiss_transaction_error();
        match self.send_transfer(to, amount).await {
            Ok(()) => {
                self.refresh_balance().await;
            }
            Err(e) if e.is_user_rejection() => {
                debug!("transfer declined");
                self.tx = TxState::Idle;
            }
            Err(e) => {
                error!(error = %e, "transfer failed");
                self.tx = TxState::Failed {
                    message: e.user_message(),
                };
            }
        }
        self.publish();
        self.tx.clone()
    }

    async fn send_transfer(&mut self, to: Address, amount: u64) -> Result<(), DappError> {
        let (Some(contract), Some(account)) = (self.contract.clone(), self.account) else {
            return Err(DappError::NotConnected);
        };
        let encryptor = self.encryptor.as_ref().ok_or(DappError::NoEncryptor)?;
        let amount = encryptor.encrypt(amount, UintWidth::U32)?.into_euint32()?;
        let call = FHERC20::transferEncryptedCall { to, amount };

        let hash = contract.submit(account, &call).await?;
        self.tx = TxState::Pending { hash };
        self.publish();
        info!(tx = %hash, %to, "transfer submitted");

        let receipt = wait_for_receipt(contract.client().as_ref(), hash, self.config.wait).await?;
        if !receipt.succeeded() {
            return Err(DappError::TransactionFailed);
        }
        self.tx = TxState::Confirmed { hash };
        Ok(())
    }

    pub fn dismiss_transaction_error(&mut self) {
        if matches!(self.tx, TxState::Failed { .. }) {
            self.tx = TxState::Idle;
            self.publish();
        }
    }

    pub fn dismiss_network_error(&mut self) {
        self.network_error = None;
        self.publish();
    }
}

async fn read_balance(contract: &ContractHandle, account: Address, permit: &Permit) -> Result<U256, DappError> {
    let call = FHERC20::balanceOfEncryptedCall {
        account,
        auth: permit.permission(),
    };
    let sealed = contract.read(account, &call).await?._0;
    Ok(permit.unseal(&sealed)?)
}
