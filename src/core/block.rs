//! Banano state block as exchanged with the wallet (`signBlock` / `sendBlock`).

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::core::address::{self, AddressError};
use crate::core::amount::{self, AmountError};

type Blake2b256 = Blake2b<U32>;

const STATE_PREAMBLE: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("unsupported block type '{0}'")]
    UnsupportedType(String),
    #[error("{field}: {source}")]
    Account { field: &'static str, source: AddressError },
    #[error("{field} must be 32 bytes of hex")]
    InvalidHash { field: &'static str },
    #[error("balance: {0}")]
    Balance(#[from] AmountError),
}

fn state_type() -> String {
    "state".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type", default = "state_type")]
    pub type_: String,
    pub account: String,
    pub previous: String,
    pub representative: String,
    /// Raw units, decimal string.
    pub balance: String,
    /// 32-byte hex, or an account when the link is a destination.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
}

impl Block {
    /// Canonical state-block hash (the bytes a signature covers).
    pub fn hash(&self) -> Result<[u8; 32], BlockError> {
        if self.type_ != "state" {
            return Err(BlockError::UnsupportedType(self.type_.clone()));
        }
        let account = address::address_to_public_key(&self.account)
            .map_err(|source| BlockError::Account { field: "account", source })?;
        let representative = address::address_to_public_key(&self.representative)
            .map_err(|source| BlockError::Account { field: "representative", source })?;
        let previous = hash_field("previous", &self.previous)?;
        let link = if self.link.starts_with(crate::core::constants::account::PREFIX) {
            address::address_to_public_key(&self.link)
                .map_err(|source| BlockError::Account { field: "link", source })?
        } else {
            hash_field("link", &self.link)?
        };
        let balance = amount::parse_raw(&self.balance)?;

        let mut preamble = [0u8; 32];
        preamble[31] = STATE_PREAMBLE;

        let mut hasher = Blake2b256::new();
        hasher.update(preamble);
        hasher.update(account);
        hasher.update(previous);
        hasher.update(representative);
        hasher.update(balance.to_be_bytes());
        hasher.update(link);
        Ok(hasher.finalize().into())
    }

    pub fn hash_hex(&self) -> Result<String, BlockError> {
        Ok(hex::encode_upper(self.hash()?))
    }
}

fn hash_field(field: &'static str, value: &str) -> Result<[u8; 32], BlockError> {
    hex::decode(value)
        .ok()
        .and_then(|b| <[u8; 32]>::try_from(b).ok())
        .ok_or(BlockError::InvalidHash { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Block {
        let account = address::public_key_to_address(&[7u8; 32]);
        Block {
            type_: "state".into(),
            account: account.clone(),
            previous: "0".repeat(64),
            representative: account,
            balance: "1000".into(),
            link: "AB".repeat(32),
            signature: None,
            work: None,
        }
    }

    #[test]
    fn hash_is_deterministic_and_field_sensitive() {
        let block = sample();
        let h1 = block.hash().unwrap();
        assert_eq!(h1, sample().hash().unwrap());

        let mut changed = sample();
        changed.balance = "1001".into();
        assert_ne!(h1, changed.hash().unwrap());

        // Signature and work are not covered by the hash
        let mut signed = sample();
        signed.signature = Some("00".repeat(64));
        assert_eq!(h1, signed.hash().unwrap());
    }

    #[test]
    fn link_accepts_account_form() {
        let mut block = sample();
        block.link = address::public_key_to_address(&[0xAB; 32]);
        assert_eq!(block.hash().unwrap(), sample().hash().unwrap());
    }

    #[test]
    fn rejects_malformed_fields() {
        let mut block = sample();
        block.previous = "xyz".into();
        assert_eq!(block.hash(), Err(BlockError::InvalidHash { field: "previous" }));

        let mut legacy = sample();
        legacy.type_ = "send".into();
        assert!(matches!(legacy.hash(), Err(BlockError::UnsupportedType(_))));
    }

    #[test]
    fn deserializes_wallet_json() {
        let json = serde_json::json!({
            "type": "state",
            "account": address::public_key_to_address(&[1u8; 32]),
            "previous": "0".repeat(64),
            "representative": address::public_key_to_address(&[2u8; 32]),
            "balance": "5",
            "link": "0".repeat(64),
        });
        let block: Block = serde_json::from_value(json).unwrap();
        assert!(block.signature.is_none());
        assert!(block.hash().is_ok());
    }
}
