//! Local ed25519 signing wallet.
//!
//! Approves every action without a human in the loop by signing the
//! SHA-256 digest of the action's JSON form.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{ActionDescriptor, AppError, WalletApproval, WalletError, WalletProvider};

pub struct LocalKeyWallet {
    signing_key: SigningKey,
}

impl LocalKeyWallet {
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn from_base58(secret: &SecretString) -> Result<Self, AppError> {
        Ok(Self::new(signing_key_from_base58(secret)?))
    }

    /// Check an approval produced by this wallet for `action`
    pub fn verify(&self, action: &ActionDescriptor, approval: &WalletApproval) -> Result<bool, AppError> {
        let digest = action_digest(action)?;
        let bytes = bs58::decode(&approval.signature)
            .into_vec()
            .map_err(|e| AppError::Wallet(WalletError::Signing(e.to_string())))?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            AppError::Wallet(WalletError::Signing(format!(
                "Signature must be 64 bytes, got {}",
                v.len()
            )))
        })?;
        let signature = Signature::from_bytes(&bytes);
        Ok(approval.address == self.address()
            && self
                .signing_key
                .verifying_key()
                .verify(&digest, &signature)
                .is_ok())
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    fn address(&self) -> String {
        bs58::encode(self.signing_key.verifying_key().as_bytes()).into_string()
    }

    async fn approve(&self, action: &ActionDescriptor) -> Result<WalletApproval, AppError> {
        let digest = action_digest(action)?;
        let signature = self.signing_key.sign(&digest);
        debug!(capability = %action.capability(), "Action signed");
        Ok(WalletApproval {
            address: self.address(),
            signature: bs58::encode(signature.to_bytes()).into_string(),
        })
    }
}

fn action_digest(action: &ActionDescriptor) -> Result<[u8; 32], AppError> {
    let payload = serde_json::to_vec(action)?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(&payload));
    Ok(digest)
}

/// Parse a base58-encoded private key into a SigningKey
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, AppError> {
    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| AppError::Wallet(WalletError::InvalidKey(e.to_string())))?;

    // 32-byte seed, or 64-byte keypair whose first half is the seed
    let seed: [u8; 32] = match key_bytes.len() {
        32 | 64 => key_bytes[..32].try_into().map_err(|_| {
            AppError::Wallet(WalletError::InvalidKey("Invalid key format".to_string()))
        })?,
        len => {
            return Err(AppError::Wallet(WalletError::InvalidKey(format!(
                "Key must be 32 or 64 bytes, got {}",
                len
            ))));
        }
    };

    Ok(SigningKey::from_bytes(&seed))
}
