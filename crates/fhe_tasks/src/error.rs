use fhe_chain::{ChainError, DeployError, EncryptError, PermitError};
use fhe_core::{Classify, ConfigError, ErrorClass};
use thiserror::Error;

/// Everything a command can fail with.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Permit(#[from] PermitError),

    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TaskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Message for the user: the node's revert reason when there is one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Chain(e) => e.rpc_message(),
            Self::Deploy(DeployError::Chain(e)) => e.rpc_message(),
            Self::Permit(PermitError::Chain(e)) => e.rpc_message(),
            other => other.to_string(),
        }
    }
}

impl Classify for TaskError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument(_) => ErrorClass::Configuration,
            Self::Chain(e) => e.class(),
            Self::Deploy(e) => e.class(),
            Self::Permit(e) => e.class(),
            Self::Encrypt(e) => e.class(),
            Self::Config(e) => e.class(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhe_core::USER_REJECTED_CODE;

    #[test]
    fn rejection_through_permit_is_declined() {
        let err = TaskError::from(PermitError::Chain(ChainError::Rpc {
            code: USER_REJECTED_CODE,
            message: "User rejected the request.".into(),
            data: None,
        }));
        assert_eq!(err.class(), ErrorClass::UserDeclined);
    }

    #[test]
    fn missing_deployment_is_pending() {
        let err = TaskError::from(DeployError::Missing {
            name: "Voting".into(),
            network: "localfhenix".into(),
        });
        assert!(err.class().is_pending());
    }

    #[test]
    fn user_message_prefers_revert_reason() {
        let err = TaskError::from(ChainError::Rpc {
            code: 3,
            message: "execution reverted: Auction ended".into(),
            data: Some(serde_json::json!({ "message": "Auction ended" })),
        });
        assert_eq!(err.user_message(), "Auction ended");
    }

    #[test]
    fn invalid_argument_is_configuration() {
        assert_eq!(TaskError::invalid("amount").class(), ErrorClass::Configuration);
    }
}
