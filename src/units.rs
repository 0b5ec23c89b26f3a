//! Token Amount Rendering
//!
//! Raw on-chain amounts are unsigned 256-bit integers; documents store them as
//! decimal strings alongside a human-formatted rendering scaled by the token's
//! decimals. Cumulative fields are accumulated here so every handler shares
//! the same parse/add/clamp behavior.

use alloy::primitives::U256;
use tracing::warn;

/// Decimals assumed when no token record exists.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Render a raw amount as a fixed-point decimal string.
///
/// Divides by 10^decimals and renders up to `decimals` fractional digits with
/// trailing zeros trimmed. Decimals large enough to overflow the scale factor
/// fall back to the raw rendering.
pub fn format_units(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let Some(scale) = U256::from(10u8).checked_pow(U256::from(decimals as u64)) else {
        return amount.to_string();
    };

    let whole = amount / scale;
    let frac = amount % scale;
    if frac.is_zero() {
        return whole.to_string();
    }

    let mut frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", whole, frac_str)
}

/// Parse a stored decimal-string amount, treating malformed values as zero.
pub fn parse_amount(value: &str) -> U256 {
    match U256::from_str_radix(value.trim(), 10) {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value, "malformed stored amount, treating as zero");
            U256::ZERO
        }
    }
}

/// Add a delta to a stored cumulative field, returning the new decimal string.
///
/// Saturates at U256::MAX rather than wrapping; cumulative fields must stay
/// monotonically non-decreasing.
pub fn add_amounts(existing: &str, delta: U256) -> String {
    parse_amount(existing).saturating_add(delta).to_string()
}

/// Subtract a delta from a stored balance, clamping at zero.
///
/// Returns the new decimal string and whether clamping occurred. A withdrawal
/// exceeding the tracked balance is a contract-level impossibility, but a
/// malformed stream must not drive a balance negative or crash the pipeline.
pub fn sub_amount_clamped(existing: &str, delta: U256) -> (String, bool) {
    let current = parse_amount(existing);
    if delta > current {
        (U256::ZERO.to_string(), true)
    } else {
        ((current - delta).to_string(), false)
    }
}
