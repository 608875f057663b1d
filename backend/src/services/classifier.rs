//! Cell classification: ABC segment, stock policy levels and inventory state

use std::collections::BTreeMap;

use shared::models::{AbcSegment, AbcThresholds, InventoryState, PlanningConfig, SkuCell};

/// Tolerance for cumulative-share comparisons against the thresholds
const SHARE_EPSILON: f64 = 1e-9;

/// Segment SKUs by their share of total 60-day sales value.
///
/// SKUs are ranked by descending value (ties by ascending SKU); a SKU's
/// share is the cumulative value up to and including it over the total.
/// A zero total puts every SKU in C.
pub fn abc_segments(values: &BTreeMap<String, f64>, thresholds: &AbcThresholds) -> BTreeMap<String, AbcSegment> {
    let total: f64 = values.values().sum();
    if total <= 0.0 {
        return values.keys().map(|sku| (sku.clone(), AbcSegment::C)).collect();
    }

    let mut ranked: Vec<(&String, f64)> = values.iter().map(|(k, v)| (k, *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut cumulative = 0.0;
    ranked
        .into_iter()
        .map(|(sku, value)| {
            cumulative += value;
            let share = cumulative / total;
            let segment = if share <= thresholds.a + SHARE_EPSILON {
                AbcSegment::A
            } else if share <= thresholds.b + SHARE_EPSILON {
                AbcSegment::B
            } else {
                AbcSegment::C
            };
            (sku.clone(), segment)
        })
        .collect()
}

/// Sum 60-day sales value per SKU across all stores
pub fn sales_value_by_sku(cells: &[SkuCell]) -> BTreeMap<String, f64> {
    let mut values: BTreeMap<String, f64> = BTreeMap::new();
    for cell in cells {
        *values.entry(cell.sku.clone()).or_insert(0.0) += cell.sales_value_60d();
    }
    values
}

/// State rules, first match wins
pub fn classify_state(
    stock_units: f64,
    daily_demand: f64,
    reorder_point: f64,
    config: &PlanningConfig,
) -> InventoryState {
    let demand_ok = daily_demand > 0.0 || !config.stockout_requires_demand;
    if stock_units <= 0.0 && demand_ok {
        InventoryState::Stockout
    } else if stock_units > 0.0 && stock_units < reorder_point {
        InventoryState::LowStockRisk
    } else if daily_demand > 0.0 && stock_units / daily_demand > f64::from(config.surplus_days) {
        InventoryState::Surplus
    } else if stock_units > 0.0 && daily_demand <= 0.0 {
        InventoryState::SlowMoving
    } else {
        InventoryState::InStock
    }
}

/// Derive segment, policy levels, state, surplus and raw need for every cell.
///
/// Expects `daily_demand` to be filled in already.
pub fn classify(cells: &mut [SkuCell], config: &PlanningConfig) {
    let segments = abc_segments(&sales_value_by_sku(cells), &config.abc);
    let safety_days = f64::from(config.safety_days);

    for cell in cells.iter_mut() {
        cell.abc_segment = segments.get(&cell.sku).copied().unwrap_or(AbcSegment::C);
        cell.inventory_value = cell.stock_units * cell.unit_cost;
        cell.safety_stock = cell.daily_demand * safety_days;
        cell.reorder_point = cell.daily_demand * cell.lead_time_days + cell.safety_stock;
        cell.target_stock =
            cell.daily_demand * f64::from(config.target_days.for_segment(cell.abc_segment));
        cell.state = classify_state(cell.stock_units, cell.daily_demand, cell.reorder_point, config);
        cell.transferable_surplus = (cell.stock_units - cell.reorder_point).max(0.0);
        cell.raw_need = if cell.state.needs_replenishment() {
            (cell.target_stock - cell.stock_units).max(0.0)
        } else {
            0.0
        };
    }

    let counts = InventoryState::ALL.map(|s| cells.iter().filter(|c| c.state == s).count());
    tracing::debug!(
        "Classified {} cells: {} in stock, {} low, {} stockout, {} surplus, {} slow",
        cells.len(),
        counts[0],
        counts[1],
        counts[2],
        counts[3],
        counts[4]
    );
}
