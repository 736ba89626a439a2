//! Domain-separated message text that the wallet signs and the verifier rebuilds.

use crate::core::constants::message::{MESSAGE_LABEL, ORIGIN_LABEL, PREAMBLE};

/// `"MonkeyMask Signed Message:\nOrigin: <origin>\nMessage: <message>"`
pub fn canonical_message(origin: &str, message: &str) -> String {
    format!("{PREAMBLE}\n{ORIGIN_LABEL}{origin}\n{MESSAGE_LABEL}{message}")
}
