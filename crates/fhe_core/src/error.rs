use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC / EIP-1193 error code a wallet or node returns when the user
/// declines a prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Errors raised while loading or validating suite configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// How a failure is handled by whoever observes it.
///
/// Every crate error in the workspace maps onto one of these through
/// [`Classify`], so the command layer and the dapp session can decide between
/// swallowing, surfacing, or waiting without inspecting concrete error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// The user declined a wallet or node prompt. Always silent.
    UserDeclined,
    /// The wallet or node is on a different chain than expected.
    NetworkMismatch,
    /// A contract call or transaction failed (revert, RPC error, transport).
    CallFailed,
    /// A deployment or permit is not there yet. Non-fatal, resolves later.
    PreconditionNotMet,
    /// Invalid or missing configuration, bad arguments.
    Configuration,
    /// Anything else.
    Internal,
}

impl ErrorClass {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserDeclined => "user_declined",
            Self::NetworkMismatch => "network_mismatch",
            Self::CallFailed => "call_failed",
            Self::PreconditionNotMet => "precondition_not_met",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }

    /// Whether the failure must not be reported to the user at all.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UserDeclined)
    }

    /// Whether the failure is expected to clear once some precondition is met
    /// (wallet connected, permit issued, contract deployed).
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PreconditionNotMet)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Implemented by every error type that crosses a crate boundary.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

impl Classify for ConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_declined_is_silent() {
        assert!(ErrorClass::UserDeclined.is_silent());
        assert!(!ErrorClass::CallFailed.is_silent());
        assert!(!ErrorClass::PreconditionNotMet.is_silent());
    }

    #[test]
    fn precondition_is_pending() {
        assert!(ErrorClass::PreconditionNotMet.is_pending());
        assert!(!ErrorClass::Configuration.is_pending());
    }

    #[test]
    fn config_error_classifies_as_configuration() {
        let err = ConfigError::UnknownNetwork("mainnet".into());
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(err.to_string(), "Unknown network: mainnet");
    }

    #[test]
    fn class_display_uses_label() {
        assert_eq!(ErrorClass::NetworkMismatch.to_string(), "network_mismatch");
    }
}
