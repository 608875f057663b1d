//! Validation utilities for the inventory planner
//!
//! Field-level checks plug into `validator` derives; cross-field checks
//! return a static message like the rest of the crate.

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::models::{OrderLineInput, PlanningConfig};

// ============================================================================
// Order Validations
// ============================================================================

/// Quantities on an order line must be strictly positive
pub fn validate_positive_quantity(qty: &Decimal) -> Result<(), ValidationError> {
    if *qty <= Decimal::ZERO {
        let mut err = ValidationError::new("positive_quantity");
        err.message = Some("Quantity must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

/// Costs may be zero (samples, transfers at no cost) but never negative
pub fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative_amount");
        err.message = Some("Amount cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// An emission must carry at least one line, and transfers cannot loop
/// back to their origin store
pub fn validate_order_batch(lines: &[OrderLineInput], is_transfer: bool) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("An order must contain at least one line");
    }
    if is_transfer
        && lines
            .iter()
            .any(|l| l.counterparty.trim().eq_ignore_ascii_case(l.destination_store.trim()))
    {
        return Err("Transfer origin and destination must differ");
    }
    Ok(())
}

// ============================================================================
// Planning Validations
// ============================================================================

/// Cross-field checks not expressible as field ranges
pub fn validate_planning_config(config: &PlanningConfig) -> Result<(), &'static str> {
    if config.seasonality_split_days >= config.demand_window_days {
        return Err("seasonality_split_days must be shorter than demand_window_days");
    }
    if config.abc.a > config.abc.b {
        return Err("ABC threshold for A must not exceed the threshold for B");
    }
    if !config.price_markup.is_finite() {
        return Err("price_markup must be a finite number");
    }
    for rule in &config.pack_rules {
        if rule.pack == 0 {
            return Err("Pack size must be at least 1");
        }
        if rule.tokens.iter().all(|t| t.trim().is_empty()) {
            return Err("Pack rule needs at least one non-empty token");
        }
    }
    Ok(())
}
