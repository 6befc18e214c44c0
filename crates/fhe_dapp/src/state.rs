use alloy_primitives::{Address, B256, U256};
use serde::Serialize;

/// Token metadata shown in the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenData {
    pub name: String,
    pub symbol: String,
}

/// Where the session is in its connect flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UiState {
    Disconnected,
    Connecting,
    /// Account selected; token metadata or balance still missing.
    Connected { account: Address },
    Ready { account: Address, token: TokenData },
}

impl UiState {
    pub fn account(&self) -> Option<Address> {
        match self {
            Self::Connected { account } | Self::Ready { account, .. } => Some(*account),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "balance", content = "value", rename_all = "snake_case")]
pub enum BalanceState {
    /// No account connected.
    #[default]
    Unavailable,
    /// Waiting on the contract, the account or the permit.
    Pending,
    Known(U256),
}

impl BalanceState {
    pub fn known(&self) -> Option<U256> {
        match self {
            Self::Known(value) => Some(*value),
            _ => None,
        }
    }
}

/// Lifecycle of the last transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "tx", rename_all = "snake_case")]
pub enum TxState {
    #[default]
    Idle,
    Pending { hash: B256 },
    Confirmed { hash: B256 },
    Failed { message: String },
}

impl TxState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Everything a presentation layer renders, in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub ui: UiState,
    pub balance: BalanceState,
    pub tx: TxState,
    pub network_error: Option<String>,
}

impl SessionView {
    pub fn disconnected() -> Self {
        Self {
            ui: UiState::Disconnected,
            balance: BalanceState::Unavailable,
            tx: TxState::Idle,
            network_error: None,
        }
    }

    /// The transfer form only makes sense with a positive balance.
    pub fn can_transfer(&self) -> bool {
        matches!(self.ui, UiState::Ready { .. })
            && self.balance.known().is_some_and(|b| !b.is_zero())
            && !self.tx.is_pending()
    }

    pub fn has_no_tokens(&self) -> bool {
        matches!(self.ui, UiState::Ready { .. }) && self.balance.known() == Some(U256::ZERO)
    }
}
