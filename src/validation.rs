//! Input validation for operator-supplied amounts and configured SQL identifiers.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Longest amount string accepted from the amount prompt.
pub const MAX_AMOUNT_INPUT: usize = 10;

/// Longest table identifier accepted by MySQL.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Amount validation errors, shown to the operator as a re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Please enter an amount.")]
    Empty,

    #[error("Amount is too long (maximum {max} characters).")]
    TooLong { max: usize },

    #[error("Invalid amount! Please enter a number (decimals allowed).")]
    NotNumeric,

    #[error("Amount must be positive!")]
    NotPositive,
}

/// Table identifier errors. Reported as a fatal configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier is longer than {max} characters")]
    TooLong { max: usize },

    #[error("identifier may only contain ASCII letters, digits, '_' and '$' (found '{found}')")]
    InvalidCharacter { found: char },

    #[error("identifier cannot start with a digit")]
    LeadingDigit,
}

/// Parse an operator-entered amount.
///
/// Accepts plain decimals (`25`, `25.50`, `.5`, `+3`) and scientific notation
/// (`1e3`). The result must be strictly positive.
pub fn parse_amount(input: &str) -> Result<Decimal, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.chars().count() > MAX_AMOUNT_INPUT {
        return Err(AmountError::TooLong {
            max: MAX_AMOUNT_INPUT,
        });
    }

    let normalized = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let normalized = if normalized.starts_with('.') {
        format!("0{}", normalized)
    } else if normalized.starts_with("-.") {
        format!("-0{}", &normalized[1..])
    } else {
        normalized.to_string()
    };

    let value = if normalized.contains(['e', 'E']) {
        Decimal::from_scientific(&normalized).map_err(|_| AmountError::NotNumeric)?
    } else {
        Decimal::from_str(&normalized).map_err(|_| AmountError::NotNumeric)?
    };

    if value <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }
    Ok(value.normalize())
}

/// Validate a table name before it is interpolated into SQL text.
///
/// Only unquoted MySQL identifiers are allowed, optionally schema-qualified
/// (`schema.table`).
pub fn validate_table_name(name: &str) -> Result<(), IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty);
    }
    for part in name.split('.') {
        validate_identifier_part(part)?;
    }
    Ok(())
}

fn validate_identifier_part(part: &str) -> Result<(), IdentifierError> {
    if part.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if part.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if let Some(bad) = part
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$'))
    {
        return Err(IdentifierError::InvalidCharacter { found: bad });
    }
    if part.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(IdentifierError::LeadingDigit);
    }
    Ok(())
}
