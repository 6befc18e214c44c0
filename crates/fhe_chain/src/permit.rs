//! Permits and client-side unsealing.
//!
//! A permit binds an x25519 sealing key to one `(contract, signer)` pair. The
//! signer signs the sealing public key (EIP-712, `Permissioned`); contracts
//! check that signature and seal their encrypted outputs to the public key,
//! which only the holder of the sealing secret can open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use alloy_primitives::{Address, B256, Bytes, U256};
use crypto_box::aead::Aead as _;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use fhe_core::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::abi::Permission;
use crate::error::ChainError;
use crate::rpc::ChainClient;

/// Envelope version string for sealed outputs.
pub const SEALING_VERSION: &str = "x25519-xsalsa20-poly1305";

/// EIP-712 domain name the contracts verify permits against.
pub const PERMIT_DOMAIN_NAME: &str = "Fhenix Permission";
pub const PERMIT_DOMAIN_VERSION: &str = "1.0";

const SALSA_NONCE_LEN: usize = 24;
const AES_NONCE_LEN: usize = 12;
const KDF_SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum PermitError {
    #[error("no permit for contract {contract} and signer {signer}")]
    Missing { contract: Address, signer: Address },

    #[error("sealed value is malformed: {0}")]
    Malformed(String),

    #[error("failed to open sealed value: {0}")]
    Unseal(String),

    #[error("failed to seal value: {0}")]
    Seal(String),

    #[error("permit key material: {0}")]
    Key(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("permit store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("permit store JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Classify for PermitError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Missing { .. } => ErrorClass::PreconditionNotMet,
            Self::Chain(e) => e.class(),
            Self::Key(_) => ErrorClass::Configuration,
            Self::Malformed(_) | Self::Unseal(_) => ErrorClass::CallFailed,
            Self::Seal(_) | Self::Io(_) | Self::Json(_) => ErrorClass::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Sealing
// ---------------------------------------------------------------------------

/// The secret half of a permit. Opens values sealed to its public key.
#[derive(Clone)]
pub struct SealingKey {
    secret: SecretKey,
}

impl SealingKey {
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: SecretKey::from(bytes),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn public_key(&self) -> B256 {
        B256::from(*self.secret.public_key().as_bytes())
    }

    /// Open a sealed output. The plaintext is a big-endian unsigned integer.
    pub fn unseal(&self, sealed: &str) -> Result<U256, PermitError> {
        let envelope = SealedEnvelope::decode(sealed)?;
        if envelope.version != SEALING_VERSION {
            return Err(PermitError::Malformed(format!(
                "unsupported version {}",
                envelope.version
            )));
        }

        let nonce = decode_fixed::<SALSA_NONCE_LEN>(&envelope.nonce, "nonce")?;
        let ephemeral = decode_fixed::<32>(&envelope.ephem_public_key, "ephemPublicKey")?;
        let ciphertext = hex::decode(envelope.ciphertext.trim_start_matches("0x"))
            .map_err(|e| PermitError::Malformed(format!("ciphertext: {e}")))?;

        let sealed_box = SalsaBox::new(&PublicKey::from(ephemeral), &self.secret);
        let plaintext = sealed_box
            .decrypt(crypto_box::aead::Nonce::<SalsaBox>::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|e| PermitError::Unseal(e.to_string()))?;

        U256::try_from_be_slice(&plaintext)
            .ok_or_else(|| PermitError::Malformed(format!("{}-byte plaintext", plaintext.len())))
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Seal `value` to `public_key`, producing the hex envelope a contract returns.
pub fn seal(value: U256, public_key: &B256) -> Result<String, PermitError> {
    let ephemeral = SealingKey::generate();
    let nonce: [u8; SALSA_NONCE_LEN] = rand::random();
    let sealed_box = SalsaBox::new(&PublicKey::from(public_key.0), &ephemeral.secret);
    let plaintext = value.to_be_bytes::<32>();
    let ciphertext = sealed_box
        .encrypt(crypto_box::aead::Nonce::<SalsaBox>::from_slice(&nonce), plaintext.as_slice())
        .map_err(|e| PermitError::Seal(e.to_string()))?;

    let envelope = SealedEnvelope {
        version: SEALING_VERSION.to_string(),
        nonce: hex::encode(nonce),
        ephem_public_key: hex::encode(ephemeral.public_key()),
        ciphertext: hex::encode(ciphertext),
    };
    Ok(format!("0x{}", hex::encode(serde_json::to_vec(&envelope)?)))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealedEnvelope {
    version: String,
    nonce: String,
    ephem_public_key: String,
    ciphertext: String,
}

impl SealedEnvelope {
    fn decode(sealed: &str) -> Result<Self, PermitError> {
        let raw = hex::decode(sealed.trim().trim_start_matches("0x"))
            .map_err(|e| PermitError::Malformed(format!("outer hex: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| PermitError::Malformed(e.to_string()))
    }
}

fn decode_fixed<const N: usize>(text: &str, field: &str) -> Result<[u8; N], PermitError> {
    let bytes = hex::decode(text.trim_start_matches("0x"))
        .map_err(|e| PermitError::Malformed(format!("{field}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| PermitError::Malformed(format!("{field}: expected {N} bytes")))
}

// ---------------------------------------------------------------------------
// Permit
// ---------------------------------------------------------------------------

/// Decryption capability for one contract and one signer.
#[derive(Debug, Clone)]
pub struct Permit {
    pub contract: Address,
    pub signer: Address,
    pub sealing_key: SealingKey,
    pub public_key: B256,
    pub signature: Bytes,
}

impl Permit {
    /// The on-chain argument contracts take to authorise a sealed read.
    pub fn permission(&self) -> Permission {
        Permission {
            publicKey: self.public_key,
            signature: self.signature.clone(),
        }
    }

    pub fn unseal(&self, sealed: &str) -> Result<U256, PermitError> {
        self.sealing_key.unseal(sealed)
    }
}

/// EIP-712 payload for `eth_signTypedData_v4` authorising `public_key` on
/// `contract`.
pub fn permit_typed_data(chain_id: u64, contract: Address, public_key: B256) -> serde_json::Value {
    serde_json::json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "Permissioned": [
                { "name": "publicKey", "type": "bytes32" }
            ]
        },
        "primaryType": "Permissioned",
        "domain": {
            "name": PERMIT_DOMAIN_NAME,
            "version": PERMIT_DOMAIN_VERSION,
            "chainId": chain_id,
            "verifyingContract": contract,
        },
        "message": {
            "publicKey": public_key,
        }
    })
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Permits keyed by `(contract, signer)`, optionally persisted to disk.
#[derive(Debug, Default)]
pub struct PermitStore {
    permits: HashMap<(Address, Address), Permit>,
    path: Option<PathBuf>,
    passphrase: Option<String>,
}

impl PermitStore {
    /// An in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path` (empty when the file does not exist); later changes
    /// are written back there. With a passphrase, sealing keys are stored
    /// AES-256-GCM encrypted.
    pub fn open(path: impl Into<PathBuf>, passphrase: Option<String>) -> Result<Self, PermitError> {
        let path = path.into();
        let mut store = Self {
            permits: HashMap::new(),
            path: Some(path.clone()),
            passphrase,
        };
        if !path.exists() {
            debug!(path = %path.display(), "permit store not found, starting empty");
            return Ok(store);
        }

        let content = std::fs::read_to_string(&path)?;
        let file: PermitFile = serde_json::from_str(&content)?;
        for stored in file.permits {
            let permit = stored.restore(store.passphrase.as_deref())?;
            store.permits.insert((permit.contract, permit.signer), permit);
        }
        info!(path = %path.display(), count = store.permits.len(), "permit store loaded");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.permits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permits.is_empty()
    }

    pub fn get(&self, contract: Address, signer: Address) -> Option<&Permit> {
        self.permits.get(&(contract, signer))
    }

    /// Store a permit, replacing any previous one for the same pair.
    pub fn insert(&mut self, permit: Permit) -> Result<(), PermitError> {
        self.permits.insert((permit.contract, permit.signer), permit);
        self.persist()
    }

    /// Return the cached permit for the pair, or have `signer` sign a fresh
    /// one through the node and cache it.
    pub async fn get_or_create(
        &mut self,
        client: &dyn ChainClient,
        contract: Address,
        signer: Address,
    ) -> Result<Permit, PermitError> {
        if let Some(permit) = self.get(contract, signer) {
            debug!(%contract, %signer, "reusing permit");
            return Ok(permit.clone());
        }

        let chain_id = client.chain_id().await?;
        let sealing_key = SealingKey::generate();
        let public_key = sealing_key.public_key();
        let typed_data = permit_typed_data(chain_id, contract, public_key);
        let signature = client.sign_typed_data(signer, &typed_data).await?;

        let permit = Permit {
            contract,
            signer,
            sealing_key,
            public_key,
            signature,
        };
        info!(%contract, %signer, chain_id, "permit generated");
        self.insert(permit.clone())?;
        Ok(permit)
    }

    /// Open `sealed` with the permit for the pair.
    pub fn unseal(&self, contract: Address, signer: Address, sealed: &str) -> Result<U256, PermitError> {
        self.get(contract, signer)
            .ok_or(PermitError::Missing { contract, signer })?
            .unseal(sealed)
    }

    fn persist(&self) -> Result<(), PermitError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Write every permit to `path` with owner-only permissions.
    pub fn save_to(&self, path: &Path) -> Result<(), PermitError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut permits = self
            .permits
            .values()
            .map(|p| StoredPermit::capture(p, self.passphrase.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        permits.sort_by_key(|p| (p.contract, p.signer));

        let json = serde_json::to_string_pretty(&PermitFile { permits })?;
        std::fs::write(path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), count = self.permits.len(), "permit store saved");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PermitFile {
    permits: Vec<StoredPermit>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPermit {
    contract: Address,
    signer: Address,
    public_key: B256,
    signature: Bytes,
    /// Hex of the raw secret, or of `salt || nonce || ciphertext` when encrypted.
    sealing_key: String,
    #[serde(default)]
    encrypted: bool,
}

impl StoredPermit {
    fn capture(permit: &Permit, passphrase: Option<&str>) -> Result<Self, PermitError> {
        let secret = permit.sealing_key.to_bytes();
        let (sealing_key, encrypted) = match passphrase {
            Some(pass) => (hex::encode(encrypt_secret(&secret, pass)?), true),
            None => (hex::encode(secret), false),
        };
        Ok(Self {
            contract: permit.contract,
            signer: permit.signer,
            public_key: permit.public_key,
            signature: permit.signature.clone(),
            sealing_key,
            encrypted,
        })
    }

    fn restore(self, passphrase: Option<&str>) -> Result<Permit, PermitError> {
        let raw = hex::decode(&self.sealing_key).map_err(|e| PermitError::Key(e.to_string()))?;
        let secret = if self.encrypted {
            let pass = passphrase.ok_or_else(|| {
                PermitError::Key("permit store is encrypted but no passphrase is set".into())
            })?;
            decrypt_secret(&raw, pass)?
        } else {
            raw
        };
        let bytes: [u8; 32] = secret
            .try_into()
            .map_err(|_| PermitError::Key("sealing key must be 32 bytes".into()))?;

        let sealing_key = SealingKey::from_bytes(bytes);
        if sealing_key.public_key() != self.public_key {
            return Err(PermitError::Key(format!(
                "stored key does not match public key for {}",
                self.contract
            )));
        }
        Ok(Permit {
            contract: self.contract,
            signer: self.signer,
            sealing_key,
            public_key: self.public_key,
            signature: self.signature,
        })
    }
}

/// Derive a 256-bit AES key from a passphrase using Argon2id.
fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32], PermitError> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params =
        Params::new(19_456, 2, 1, Some(32)).map_err(|e| PermitError::Key(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| PermitError::Key(e.to_string()))?;
    Ok(key)
}

/// Returns `salt || nonce || ciphertext`.
fn encrypt_secret(secret: &[u8], passphrase: &str) -> Result<Vec<u8>, PermitError> {
    let salt: [u8; KDF_SALT_LEN] = rand::random();
    let key_bytes = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let nonce_bytes: [u8; AES_NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret)
        .map_err(|e| PermitError::Key(format!("encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(KDF_SALT_LEN + AES_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt_secret(data: &[u8], passphrase: &str) -> Result<Vec<u8>, PermitError> {
    if data.len() < KDF_SALT_LEN + AES_NONCE_LEN {
        return Err(PermitError::Key("encrypted sealing key too short".into()));
    }
    let (salt, rest) = data.split_at(KDF_SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(AES_NONCE_LEN);

    let key_bytes = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| PermitError::Key("wrong passphrase or corrupted permit store".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permit(contract: u8, signer: u8) -> Permit {
        let sealing_key = SealingKey::generate();
        Permit {
            contract: Address::with_last_byte(contract),
            signer: Address::with_last_byte(signer),
            public_key: sealing_key.public_key(),
            sealing_key,
            signature: Bytes::from(vec![0x1b; 65]),
        }
    }

    #[test]
    fn seal_then_unseal() {
        let key = SealingKey::generate();
        let sealed = seal(U256::from(10u64), &key.public_key()).unwrap();
        assert_eq!(key.unseal(&sealed).unwrap(), U256::from(10u64));
    }

    #[test]
    fn sealed_value_is_hex_json_envelope() {
        let key = SealingKey::generate();
        let sealed = seal(U256::ZERO, &key.public_key()).unwrap();
        let raw = hex::decode(sealed.trim_start_matches("0x")).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["version"], SEALING_VERSION);
        assert!(json.get("ephemPublicKey").is_some());
    }

    #[test]
    fn other_key_cannot_unseal() {
        let owner = SealingKey::generate();
        let other = SealingKey::generate();
        let sealed = seal(U256::from(7u64), &owner.public_key()).unwrap();
        assert!(matches!(other.unseal(&sealed), Err(PermitError::Unseal(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        let key = SealingKey::generate();
        assert!(matches!(key.unseal("0xzz"), Err(PermitError::Malformed(_))));
        assert!(matches!(key.unseal("0x7b7d"), Err(PermitError::Malformed(_))));
    }

    #[test]
    fn typed_data_shape() {
        let contract = Address::with_last_byte(0xcc);
        let data = permit_typed_data(412346, contract, B256::repeat_byte(1));
        assert_eq!(data["primaryType"], "Permissioned");
        assert_eq!(data["domain"]["name"], PERMIT_DOMAIN_NAME);
        assert_eq!(data["domain"]["chainId"], 412346);
        let parsed: Address = serde_json::from_value(data["domain"]["verifyingContract"].clone()).unwrap();
        assert_eq!(parsed, contract);
    }

    #[test]
    fn unseal_without_permit_is_precondition() {
        let store = PermitStore::new();
        let err = store
            .unseal(Address::with_last_byte(1), Address::with_last_byte(2), "0x")
            .unwrap_err();
        assert!(matches!(err, PermitError::Missing { .. }));
        assert_eq!(err.class(), ErrorClass::PreconditionNotMet);
    }

    #[test]
    fn store_keys_by_contract_and_signer() {
        let mut store = PermitStore::new();
        let a = permit(1, 9);
        let b = permit(2, 9);
        store.insert(a.clone()).unwrap();
        store.insert(b.clone()).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a.contract, a.signer).unwrap().public_key, a.public_key);
        assert_ne!(
            store.get(a.contract, a.signer).unwrap().public_key,
            store.get(b.contract, b.signer).unwrap().public_key
        );
    }

    #[test]
    fn unseal_through_store() {
        let mut store = PermitStore::new();
        let p = permit(1, 2);
        let sealed = seal(U256::from(42u64), &p.public_key).unwrap();
        store.insert(p.clone()).unwrap();
        assert_eq!(store.unseal(p.contract, p.signer, &sealed).unwrap(), U256::from(42u64));
    }

    #[test]
    fn persists_plain_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("permits.json");
        let p = permit(3, 4);
        {
            let mut store = PermitStore::open(&path, None).unwrap();
            store.insert(p.clone()).unwrap();
        }
        let reloaded = PermitStore::open(&path, None).unwrap();
        let restored = reloaded.get(p.contract, p.signer).unwrap();
        assert_eq!(restored.sealing_key.to_bytes(), p.sealing_key.to_bytes());
        assert_eq!(restored.signature, p.signature);
    }

    #[test]
    fn persists_encrypted_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("permits.json");
        let p = permit(5, 6);
        {
            let mut store = PermitStore::open(&path, Some("hunter2".into())).unwrap();
            store.insert(p.clone()).unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains(&hex::encode(p.sealing_key.to_bytes())));

        let reloaded = PermitStore::open(&path, Some("hunter2".into())).unwrap();
        assert_eq!(
            reloaded.get(p.contract, p.signer).unwrap().public_key,
            p.public_key
        );

        let wrong = PermitStore::open(&path, Some("wrong".into())).unwrap_err();
        assert_eq!(wrong.class(), ErrorClass::Configuration);
        assert!(PermitStore::open(&path, None).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("permits.json");
        let mut store = PermitStore::open(&path, None).unwrap();
        store.insert(permit(1, 1)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
