//! BAN <-> raw conversion. 1 BAN = 10^29 raw; raw fits in u128.

use crate::core::constants::account::RAW_DECIMALS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than 29 decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' overflows")]
    Overflow(String),
}

fn unit() -> u128 {
    10u128.pow(RAW_DECIMALS)
}

/// Format raw units as a trimmed decimal BAN string ("1.5", "0", "0.00000000000000000000000000001").
pub fn raw_to_ban(raw: u128) -> String {
    let whole = raw / unit();
    let frac = raw % unit();
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = RAW_DECIMALS as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Parse a decimal BAN amount into raw units.
pub fn ban_to_raw(amount: &str) -> Result<u128, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits(whole) || !digits(frac) {
        return Err(AmountError::Invalid(amount.to_string()));
    }
    if frac.len() > RAW_DECIMALS as usize {
        return Err(AmountError::TooPrecise(amount.to_string()));
    }
    let overflow = || AmountError::Overflow(amount.to_string());
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| overflow())? };
    let frac_raw: u128 = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow(RAW_DECIMALS - frac.len() as u32);
        frac.parse::<u128>().map_err(|_| overflow())? * scale
    };
    whole
        .checked_mul(unit())
        .and_then(|w| w.checked_add(frac_raw))
        .ok_or_else(overflow)
}

/// Parse a raw decimal string ("1000000...") as reported by the node.
pub fn parse_raw(raw: &str) -> Result<u128, AmountError> {
    raw.trim().parse().map_err(|_| AmountError::Invalid(raw.to_string()))
}
