//! Client-side encryption of contract inputs.
//!
//! Contracts take encrypted integers as `inEuintN { bytes data; }`. The bytes
//! are opaque to everything above this module: an [`Encryptor`] turns a
//! plaintext into them, sized for the destination field's width.

use std::fmt;

use alloy_primitives::Bytes;
use fhe_core::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::abi::{InEuint8, InEuint16, InEuint32};
use crate::error::ChainError;

/// Bit width of an encrypted unsigned integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UintWidth {
    U8,
    U16,
    U32,
}

impl UintWidth {
    pub fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Largest plaintext that fits.
    pub fn max_value(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    pub fn fits(self, value: u64) -> bool {
        value <= self.max_value()
    }
}

impl fmt::Display for UintWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "euint{}", self.bits())
    }
}

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("value {value} does not fit in {width}")]
    OutOfRange { value: u64, width: UintWidth },

    #[error("ciphertext is {actual}, destination field expects {expected}")]
    WidthMismatch {
        expected: UintWidth,
        actual: UintWidth,
    },

    #[error("network public key unavailable: {0}")]
    PublicKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl Classify for EncryptError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::OutOfRange { .. } | Self::WidthMismatch { .. } => ErrorClass::Configuration,
            Self::Chain(e) => e.class(),
            Self::PublicKey(_) | Self::Encrypt(_) => ErrorClass::Internal,
        }
    }
}

/// An encrypted integer ready to be passed to a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub data: Bytes,
    pub width: UintWidth,
}

impl EncryptedInput {
    fn expect_width(&self, expected: UintWidth) -> Result<(), EncryptError> {
        if self.width != expected {
            return Err(EncryptError::WidthMismatch {
                expected,
                actual: self.width,
            });
        }
        Ok(())
    }

    pub fn into_euint8(self) -> Result<InEuint8, EncryptError> {
        self.expect_width(UintWidth::U8)?;
        Ok(InEuint8 { data: self.data })
    }

    pub fn into_euint16(self) -> Result<InEuint16, EncryptError> {
        self.expect_width(UintWidth::U16)?;
        Ok(InEuint16 { data: self.data })
    }

    pub fn into_euint32(self) -> Result<InEuint32, EncryptError> {
        self.expect_width(UintWidth::U32)?;
        Ok(InEuint32 { data: self.data })
    }
}

/// Turns plaintext integers into contract-ready ciphertexts.
///
/// Implementations are stateless per call; any key material is fetched when
/// the encryptor is built.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, value: u64, width: UintWidth) -> Result<EncryptedInput, EncryptError>;

    fn encrypt_uint8(&self, value: u8) -> Result<InEuint8, EncryptError> {
        self.encrypt(u64::from(value), UintWidth::U8)?.into_euint8()
    }

    fn encrypt_uint16(&self, value: u16) -> Result<InEuint16, EncryptError> {
        self.encrypt(u64::from(value), UintWidth::U16)?.into_euint16()
    }

    fn encrypt_uint32(&self, value: u32) -> Result<InEuint32, EncryptError> {
        self.encrypt(u64::from(value), UintWidth::U32)?.into_euint32()
    }
}

fn check_range(value: u64, width: UintWidth) -> Result<(), EncryptError> {
    if !width.fits(value) {
        return Err(EncryptError::OutOfRange { value, width });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plaintext (mock FHE)
// ---------------------------------------------------------------------------

/// Encoder for mock-FHE networks: the "ciphertext" is the big-endian value
/// padded to the field width.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextEncryptor;

impl PlaintextEncryptor {
    /// Recover the value from data produced by [`PlaintextEncryptor`].
    /// `None` when the length does not match `width`.
    pub fn decode(data: &[u8], width: UintWidth) -> Option<u64> {
        if data.len() != width.bytes() {
            return None;
        }
        Some(data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

impl Encryptor for PlaintextEncryptor {
    fn encrypt(&self, value: u64, width: UintWidth) -> Result<EncryptedInput, EncryptError> {
        check_range(value, width)?;
        let be = value.to_be_bytes();
        let data = be[be.len() - width.bytes()..].to_vec();
        Ok(EncryptedInput {
            data: Bytes::from(data),
            width,
        })
    }
}

// ---------------------------------------------------------------------------
// Network compact public key (tfhe)
// ---------------------------------------------------------------------------

#[cfg(feature = "tfhe")]
pub use compact::CompactKeyEncryptor;

#[cfg(feature = "tfhe")]
mod compact {
    use alloy_primitives::{Address, Bytes};
    use alloy_sol_types::SolCall;
    use tfhe::prelude::*;
    use tfhe::{CompactFheUint8, CompactFheUint16, CompactFheUint32, CompactPublicKey};
    use tracing::info;

    use super::{EncryptError, EncryptedInput, Encryptor, UintWidth, check_range};
    use crate::abi::{FHE_OPS_ADDRESS, IFheOps};
    use crate::rpc::{ChainClient, TxRequest};

    /// Encrypts against the network's compact public key, which the FHE
    /// precompile serves for security zone 0.
    pub struct CompactKeyEncryptor {
        key: CompactPublicKey,
    }

    impl CompactKeyEncryptor {
        pub async fn fetch(client: &dyn ChainClient) -> Result<Self, EncryptError> {
            let call = IFheOps::getNetworkPublicKeyCall { securityZone: 0 };
            let tx = TxRequest::call(Address::ZERO, FHE_OPS_ADDRESS, call.abi_encode());
            let raw = client.call(&tx).await?;
            let decoded = IFheOps::getNetworkPublicKeyCall::abi_decode_returns(&raw, true)
                .map_err(|e| EncryptError::PublicKey(e.to_string()))?;
            let key: CompactPublicKey = bincode::deserialize(&decoded._0)
                .map_err(|e| EncryptError::PublicKey(e.to_string()))?;
            info!(bytes = decoded._0.len(), "fetched network public key");
            Ok(Self { key })
        }
    }

    impl Encryptor for CompactKeyEncryptor {
        fn encrypt(&self, value: u64, width: UintWidth) -> Result<EncryptedInput, EncryptError> {
            check_range(value, width)?;
            let serialized = match width {
                UintWidth::U8 => {
                    let ct = CompactFheUint8::try_encrypt(value as u8, &self.key)
                        .map_err(|e| EncryptError::Encrypt(e.to_string()))?;
                    bincode::serialize(&ct)
                }
                UintWidth::U16 => {
                    let ct = CompactFheUint16::try_encrypt(value as u16, &self.key)
                        .map_err(|e| EncryptError::Encrypt(e.to_string()))?;
                    bincode::serialize(&ct)
                }
                UintWidth::U32 => {
                    let ct = CompactFheUint32::try_encrypt(value as u32, &self.key)
                        .map_err(|e| EncryptError::Encrypt(e.to_string()))?;
                    bincode::serialize(&ct)
                }
            }
            .map_err(|e| EncryptError::Encrypt(e.to_string()))?;

            Ok(EncryptedInput {
                data: Bytes::from(serialized),
                width,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_limits() {
        assert_eq!(UintWidth::U8.max_value(), 255);
        assert_eq!(UintWidth::U16.max_value(), 65_535);
        assert_eq!(UintWidth::U32.max_value(), u32::MAX as u64);
        assert!(UintWidth::U8.fits(255));
        assert!(!UintWidth::U8.fits(256));
    }

    #[test]
    fn plaintext_round_trip_across_widths() {
        let enc = PlaintextEncryptor;
        for (value, width) in [
            (0, UintWidth::U8),
            (255, UintWidth::U8),
            (1_000, UintWidth::U16),
            (100, UintWidth::U32),
            (u32::MAX as u64, UintWidth::U32),
        ] {
            let input = enc.encrypt(value, width).unwrap();
            assert_eq!(input.data.len(), width.bytes());
            assert_eq!(PlaintextEncryptor::decode(&input.data, width), Some(value));
        }
    }

    #[test]
    fn out_of_range_is_rejected_before_encoding() {
        let err = PlaintextEncryptor.encrypt(256, UintWidth::U8).unwrap_err();
        assert!(matches!(err, EncryptError::OutOfRange { value: 256, width: UintWidth::U8 }));
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn width_mismatch_is_caught_client_side() {
        let input = PlaintextEncryptor.encrypt(3, UintWidth::U8).unwrap();
        let err = input.into_euint32().unwrap_err();
        assert!(matches!(
            err,
            EncryptError::WidthMismatch {
                expected: UintWidth::U32,
                actual: UintWidth::U8
            }
        ));
    }

    #[test]
    fn typed_helpers_wrap_data() {
        let input = PlaintextEncryptor.encrypt_uint32(10).unwrap();
        assert_eq!(input.data.as_ref(), &[0, 0, 0, 10]);
        let vote = PlaintextEncryptor.encrypt_uint8(1).unwrap();
        assert_eq!(vote.data.as_ref(), &[1]);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(PlaintextEncryptor::decode(&[0, 1], UintWidth::U8), None);
    }

    #[test]
    fn width_display() {
        assert_eq!(UintWidth::U32.to_string(), "euint32");
    }
}
