use alloy_primitives::B256;
use fhe_core::{Classify, ErrorClass, USER_REJECTED_CODE};
use thiserror::Error;

/// Errors from talking to a node: transport, JSON-RPC, ABI decoding, receipts.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("abi decode failed: {0}")]
    Decode(String),

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("timed out waiting for receipt of {0}")]
    ReceiptTimeout(B256),

    #[error("chain id mismatch: expected {expected}, node reports {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("no account at index {index} ({available} available)")]
    NoSuchAccount { index: usize, available: usize },

    #[error("faucet request failed: {0}")]
    Faucet(String),

    #[error("local signing failed: {0}")]
    Signing(String),
}

impl ChainError {
    /// Whether the node or wallet reported that the user declined the request.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED_CODE)
    }

    /// Human-readable message, preferring the nested `data.message` that
    /// nodes attach to revert errors over the outer message.
    pub fn rpc_message(&self) -> String {
        match self {
            Self::Rpc { message, data, .. } => data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| message.clone()),
            other => other.to_string(),
        }
    }
}

impl Classify for ChainError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Rpc { code, .. } if *code == USER_REJECTED_CODE => ErrorClass::UserDeclined,
            Self::ChainMismatch { .. } => ErrorClass::NetworkMismatch,
            Self::NoSuchAccount { .. } | Self::Signing(_) => ErrorClass::Configuration,
            _ => ErrorClass::CallFailed,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rejection_is_detected_by_code() {
        let err = ChainError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        };
        assert!(err.is_user_rejection());
        assert_eq!(err.class(), ErrorClass::UserDeclined);
    }

    #[test]
    fn revert_is_call_failure() {
        let err = ChainError::Rpc {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        };
        assert!(!err.is_user_rejection());
        assert_eq!(err.class(), ErrorClass::CallFailed);
    }

    #[test]
    fn rpc_message_prefers_data_message() {
        let err = ChainError::Rpc {
            code: -32000,
            message: "outer".into(),
            data: Some(serde_json::json!({ "message": "insufficient funds" })),
        };
        assert_eq!(err.rpc_message(), "insufficient funds");
    }

    #[test]
    fn rpc_message_falls_back_to_message() {
        let err = ChainError::Rpc {
            code: -32000,
            message: "outer".into(),
            data: Some(serde_json::json!("0xdeadbeef")),
        };
        assert_eq!(err.rpc_message(), "outer");
    }

    #[test]
    fn chain_mismatch_classifies_as_network() {
        let err = ChainError::ChainMismatch {
            expected: 412346,
            actual: 1,
        };
        assert_eq!(err.class(), ErrorClass::NetworkMismatch);
    }
}
