//! Ed25519 with blake2b-512 as the internal hash (the Nano/Banano variant).
//!
//! Messages are not signed directly: the wallet signs the blake2b-256 digest of
//! the canonical message text. Blocks are signed over their state hash.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use ed25519_dalek::hazmat::{self, ExpandedSecretKey};
use ed25519_dalek::{Signature, VerifyingKey};

type Blake2b256 = Blake2b<U32>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature must be 64 bytes of hex")]
    InvalidSignature,
    #[error("public key is not a valid curve point")]
    InvalidPublicKey,
}

/// Digest actually covered by a message signature.
pub fn message_digest(canonical: &str) -> [u8; 32] {
    Blake2b256::digest(canonical.as_bytes()).into()
}

pub fn parse_signature(signature_hex: &str) -> Result<Signature, SignatureError> {
    let bytes: [u8; 64] = hex::decode(signature_hex.trim())
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(SignatureError::InvalidSignature)?;
    Ok(Signature::from_bytes(&bytes))
}

/// Verify a signature over raw bytes. `Ok(false)` means well-formed but not matching.
pub fn verify(payload: &[u8], signature_hex: &str, public_key: &[u8; 32]) -> Result<bool, SignatureError> {
    let signature = parse_signature(signature_hex)?;
    let key = VerifyingKey::from_bytes(public_key).map_err(|_| SignatureError::InvalidPublicKey)?;
    Ok(hazmat::raw_verify::<Blake2b512>(&key, payload, &signature).is_ok())
}

/// Verify a signature over the canonical message text.
pub fn verify_message(canonical: &str, signature_hex: &str, public_key: &[u8; 32]) -> Result<bool, SignatureError> {
    verify(&message_digest(canonical), signature_hex, public_key)
}

#[cfg(feature = "native")]
pub use keypair::Keypair;

#[cfg(feature = "native")]
mod keypair {
    use super::*;
    use rand::RngCore;
    use zeroize::{Zeroize, ZeroizeOnDrop};

    /// Signing key for the reference wallet. Secret bytes are wiped on drop.
    #[derive(Zeroize, ZeroizeOnDrop)]
    pub struct Keypair {
        private_key: [u8; 32],
        #[zeroize(skip)]
        public_key: [u8; 32],
    }

    impl Keypair {
        pub fn from_private_key(private_key: [u8; 32]) -> Self {
            let esk = expand(&private_key);
            let public_key = VerifyingKey::from(&esk).to_bytes();
            Self { private_key, public_key }
        }

        /// Wallet-style derivation: `blake2b-256(seed || index_be)`.
        pub fn from_seed(seed: &[u8; 32], index: u32) -> Self {
            let mut hasher = Blake2b256::new();
            hasher.update(seed);
            hasher.update(index.to_be_bytes());
            Self::from_private_key(hasher.finalize().into())
        }

        pub fn generate() -> Self {
            let mut private_key = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut private_key);
            let pair = Self::from_private_key(private_key);
            private_key.zeroize();
            pair
        }

        pub fn public_key(&self) -> [u8; 32] {
            self.public_key
        }

        pub fn address(&self) -> String {
            crate::core::address::public_key_to_address(&self.public_key)
        }

        /// Sign raw bytes, returning upper-case hex.
        pub fn sign(&self, payload: &[u8]) -> String {
            let esk = expand(&self.private_key);
            let key = VerifyingKey::from(&esk);
            let signature = hazmat::raw_sign::<Blake2b512>(&esk, payload, &key);
            hex::encode_upper(signature.to_bytes())
        }

        pub fn sign_message(&self, canonical: &str) -> String {
            self.sign(&message_digest(canonical))
        }
    }

    fn expand(private_key: &[u8; 32]) -> ExpandedSecretKey {
        let mut hashed = [0u8; 64];
        hashed.copy_from_slice(&Blake2b512::digest(private_key));
        let esk = ExpandedSecretKey::from_bytes(&hashed);
        hashed.zeroize();
        esk
    }
}
