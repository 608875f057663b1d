//! Common types used across the planner

use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Date range for queries. Either bound may be open; both are inclusive.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Convert an engine quantity or amount into a ledger decimal.
///
/// Non-finite values map to zero; precision is capped at four places.
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4).normalize())
        .unwrap_or(Decimal::ZERO)
}

/// Convert a ledger decimal back into an engine float.
pub fn from_decimal(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
