//! Conversion between display amounts and token base units
//!
//! Amounts are typed by the user as decimal strings (`"1.5"`) and sent to
//! the contract as integers scaled by `10^decimals`. The decimals value is
//! not read from the token contract: every token is treated as having
//! [`DEFAULT_DECIMALS`] unless the configuration says otherwise.

use crate::error::{Result, TokenSendError};
use alloy::primitives::utils::{format_units, parse_units, ParseUnits};
use alloy::primitives::U256;

/// Decimals assumed for every token unless configured otherwise.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Largest decimals value whose scale factor still fits in a `U256`.
pub const MAX_DECIMALS: u8 = 77;

/// Parse a decimal amount string into base units.
///
/// Accepts plain decimal notation only: an integer part, optionally followed
/// by `.` and a fractional part no longer than `decimals` digits. Surrounding
/// whitespace is ignored.
///
/// # Errors
///
/// Returns `TokenSendError::InvalidAmount` for empty, negative, non-decimal
/// or over-precise input, or when the scaled value overflows.
///
/// # Examples
///
/// ```
/// use alloy::primitives::U256;
/// use tokensend::units::parse_amount;
///
/// let wei = parse_amount("1.5", 18).unwrap();
/// assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
/// ```
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    check_decimal_syntax(trimmed, decimals)?;

    match parse_units(trimmed, decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => {
            Err(TokenSendError::InvalidAmount(format!("{} is negative", amount)).into())
        }
        Err(e) => Err(TokenSendError::InvalidAmount(format!("{}: {}", amount, e)).into()),
    }
}

fn check_decimal_syntax(amount: &str, decimals: u8) -> Result<()> {
    if amount.is_empty() {
        return Err(TokenSendError::InvalidAmount("amount is empty".to_string()).into());
    }

    let (int_part, frac_part) = match amount.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (amount, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if !all_digits(int_part) || frac_part.is_some_and(|f| !all_digits(f)) {
        return Err(TokenSendError::InvalidAmount(format!(
            "{} is not a decimal number",
            amount
        ))
        .into());
    }

    if let Some(frac) = frac_part {
        if frac.len() > decimals as usize {
            return Err(TokenSendError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                amount, decimals
            ))
            .into());
        }
    }

    Ok(())
}

/// Format base units back into a trimmed decimal string (`"1.5"`, `"2"`).
pub fn format_amount(value: U256, decimals: u8) -> Result<String> {
    let formatted = format_units(value, decimals)
        .map_err(|e| TokenSendError::InvalidAmount(format!("{}: {}", value, e)))?;

    if !formatted.contains('.') {
        return Ok(formatted);
    }

    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    Ok(trimmed.to_string())
}
