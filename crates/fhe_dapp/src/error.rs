use fhe_chain::{ChainError, DeployError, EncryptError, PermitError};
use fhe_core::{Classify, ErrorClass};
use thiserror::Error;

use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum DappError {
    #[error("no wallet account connected")]
    NotConnected,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Permit(#[from] PermitError),

    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("Transaction failed")]
    TransactionFailed,

    #[error("no input encryptor configured for this session")]
    NoEncryptor,
}

impl DappError {
    pub fn is_user_rejection(&self) -> bool {
        self.class() == ErrorClass::UserDeclined
    }

    /// Text for the transaction error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Wallet(e) => e.rpc_message(),
            Self::Chain(e) | Self::Permit(PermitError::Chain(e)) => e.rpc_message(),
            other => other.to_string(),
        }
    }
}

impl Classify for DappError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::NotConnected => ErrorClass::PreconditionNotMet,
            Self::Wallet(e) => e.class(),
            Self::Chain(e) => e.class(),
            Self::Permit(e) => e.class(),
            Self::Encrypt(e) => e.class(),
            Self::Deploy(e) => e.class(),
            Self::TransactionFailed => ErrorClass::CallFailed,
            Self::NoEncryptor => ErrorClass::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_via_permit_is_detected() {
        let err = DappError::from(PermitError::Chain(ChainError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        }));
        assert!(err.is_user_rejection());
    }

    #[test]
    fn failed_receipt_message() {
        assert_eq!(DappError::TransactionFailed.user_message(), "Transaction failed");
        assert_eq!(DappError::NotConnected.class(), ErrorClass::PreconditionNotMet);
    }
}
