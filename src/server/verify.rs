//! Request validation and verification for `POST /verify-signature`.

use serde::Serialize;
use serde_json::Value;

use crate::core::address::{self, AddressError};
use crate::core::message::canonical_message;
use crate::core::signature::{self, SignatureError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    #[error("Invalid public key: {0}")]
    PublicKey(#[from] AddressError),
    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),
}

/// Verification inputs. Fields are optional so absence is reported rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyRequest {
    pub message: Option<String>,
    pub signature: Option<String>,
    pub public_key: Option<String>,
    pub origin: Option<String>,
}

impl VerifyRequest {
    /// Lenient read: non-string fields count as missing.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            message: field("message"),
            signature: field("signature"),
            public_key: field("publicKey"),
            origin: field("origin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    pub message: String,
    pub verified_at: String,
}

/// Rebuild the canonical text for `origin` and check the signature against it.
/// The message may be empty; signature and public key may not.
pub fn verify_request(request: &VerifyRequest, origin: &str) -> Result<VerifyResponse, VerifyError> {
    let mut missing = Vec::new();
    if request.message.is_none() {
        missing.push("message");
    }
    let signature = request.signature.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if signature.is_none() {
        missing.push("signature");
    }
    let public_key = request.public_key.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if public_key.is_none() {
        missing.push("publicKey");
    }
    let (Some(message), Some(signature), Some(public_key)) = (request.message.as_deref(), signature, public_key) else {
        return Err(VerifyError::MissingParameters(missing));
    };

    let key = address::parse_public_key(public_key)?;
    let canonical = canonical_message(origin, message);
    let valid = signature::verify_message(&canonical, signature, &key)?;
    tracing::debug!(origin, valid, "signature checked");

    Ok(VerifyResponse {
        valid,
        message: message.to_string(),
        verified_at: chrono::Utc::now().to_rfc3339(),
    })
}
