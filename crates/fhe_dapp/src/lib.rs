//! Headless rendition of the token dapp: a session driven by wallet events
//! and user actions, exposing a renderable [`SessionView`].

pub mod error;
pub mod session;
pub mod state;
pub mod wallet;

pub use error::DappError;
pub use session::{DappConfig, DappSession};
pub use state::{BalanceState, SessionView, TokenData, TxState, UiState};
pub use wallet::{NodeWallet, WalletError, WalletProvider};
