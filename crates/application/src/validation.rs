//! Field validators for command structs and the mapping of validation
//! failures onto error codes.

use domain::ErrorCode;
use rust_decimal::Decimal;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{ApplicationError, Result};

/// Validation code reported by the quantity validators; mapped to
/// `INVALID_QUANTITY` instead of `VALIDATION_FAILED`.
pub const INVALID_QUANTITY: &str = "invalid_quantity";

/// Decimal places stored by the ledger columns (`NUMERIC(18,4)`).
pub const QUANTITY_SCALE: u32 = 4;

fn quantity_error(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(INVALID_QUANTITY);
    err.message = Some(message.into());
    err
}

/// Trailing zeros do not count, so `1.50000` is accepted.
fn storable(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if value.normalize().scale() > QUANTITY_SCALE {
        return Err(quantity_error(
            "quantity must not have more than 4 decimal places",
        ));
    }
    Ok(())
}

pub fn positive_quantity(value: &Decimal) -> std::result::Result<(), ValidationError> {
    storable(value)?;
    if *value <= Decimal::ZERO {
        return Err(quantity_error("quantity must be greater than zero"));
    }
    Ok(())
}

pub fn non_negative_quantity(value: &Decimal) -> std::result::Result<(), ValidationError> {
    storable(value)?;
    if *value < Decimal::ZERO {
        return Err(quantity_error("quantity must not be negative"));
    }
    Ok(())
}

pub fn non_zero_quantity(value: &Decimal) -> std::result::Result<(), ValidationError> {
    storable(value)?;
    if value.is_zero() {
        return Err(quantity_error("quantity must not be zero"));
    }
    Ok(())
}

pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

impl From<ValidationErrors> for ApplicationError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let quantity = field_errors
            .values()
            .flat_map(|errs| errs.iter())
            .find(|err| err.code == INVALID_QUANTITY);

        match quantity {
            Some(err) => ApplicationError::rejected(
                ErrorCode::InvalidQuantity,
                err.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid quantity".to_string()),
            ),
            None => ApplicationError::rejected(ErrorCode::ValidationFailed, errors.to_string()),
        }
    }
}

/// Runs the derived validators of a command.
pub fn validate(command: &impl Validate) -> Result<()> {
    command.validate().map_err(ApplicationError::from)
}
