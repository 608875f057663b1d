//! Demand estimation from the per-SKU sales history string
//!
//! Daily demand is a recency-weighted average of event quantities; the
//! seasonality delta compares the recent half of the window to the prior one.

use chrono::NaiveDate;
use serde::Serialize;
use shared::models::{PlanningConfig, SalesEvent, SkuCell};

/// Demand figures for one cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DemandEstimate {
    pub daily_demand: f64,
    pub seasonality_delta: f64,
}

/// Recoverable parse problems seen while estimating
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemandDiagnostics {
    pub malformed_entries: usize,
    pub cells_with_malformed_history: usize,
    pub cells_without_history: usize,
}

/// Parse `YYYY-MM-DD:qty,...` leniently.
///
/// Returns the valid events and the number of skipped malformed entries.
/// Blank entries (e.g. a trailing comma) are ignored without counting.
pub fn parse_sales_history(raw: &str) -> (Vec<SalesEvent>, usize) {
    let mut events = Vec::new();
    let mut malformed = 0;
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_entry(entry) {
            Some(event) => events.push(event),
            None => {
                tracing::debug!("Skipping malformed sales history entry '{}'", entry);
                malformed += 1;
            }
        }
    }
    (events, malformed)
}

fn parse_entry(entry: &str) -> Option<SalesEvent> {
    let (date, qty) = entry.split_once(':')?;
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let units: f64 = qty.trim().parse().ok()?;
    if !units.is_finite() || units < 0.0 {
        return None;
    }
    Some(SalesEvent { date, units })
}

/// Weighted demand and seasonality delta in a single pass over the events.
///
/// Age `d` is whole days before `today`, clamped at 0 for future dates;
/// weight is `max(0, window - d)`.
pub fn estimate(events: &[SalesEvent], today: NaiveDate, window_days: u32, split_days: u32) -> DemandEstimate {
    let window = i64::from(window_days);
    let split = i64::from(split_days);

    let mut weighted_units = 0.0;
    let mut total_weight = 0.0;
    let mut recent = 0.0;
    let mut prior = 0.0;

    for event in events {
        let age = (today - event.date).num_days().max(0);
        let weight = (window - age).max(0) as f64;
        if weight > 0.0 {
            weighted_units += weight * event.units;
            total_weight += weight;
        }
        if age <= split {
            recent += event.units;
        } else if age <= window {
            prior += event.units;
        }
    }

    DemandEstimate {
        daily_demand: if total_weight > 0.0 {
            weighted_units / total_weight
        } else {
            0.0
        },
        seasonality_delta: recent - prior,
    }
}

/// Fill `daily_demand` and `seasonality_delta` on every cell
pub fn estimate_demand(cells: &mut [SkuCell], config: &PlanningConfig, today: NaiveDate) -> DemandDiagnostics {
    let mut diagnostics = DemandDiagnostics::default();

    for cell in cells.iter_mut() {
        let (events, malformed) = parse_sales_history(&cell.sales_history);
        if malformed > 0 {
            diagnostics.malformed_entries += malformed;
            diagnostics.cells_with_malformed_history += 1;
        }
        if events.is_empty() {
            diagnostics.cells_without_history += 1;
        }

        let estimate = estimate(
            &events,
            today,
            config.demand_window_days,
            config.seasonality_split_days,
        );
        cell.daily_demand = estimate.daily_demand;
        cell.seasonality_delta = estimate.seasonality_delta;
    }

    if diagnostics.malformed_entries > 0 {
        tracing::warn!(
            "Skipped {} malformed sales history entries across {} cells",
            diagnostics.malformed_entries,
            diagnostics.cells_with_malformed_history
        );
    }

    diagnostics
}
