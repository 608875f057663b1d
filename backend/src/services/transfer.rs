//! Greedy inter-store transfer planning
//!
//! Per SKU, the largest surpluses serve the largest adjusted needs first.
//! Orderings are explicit (store name, then store id) so reruns on the same
//! input yield identical plans.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use shared::models::{SkuCell, TransferPlan, TransferProposal};

fn by_amount_then_store(a: (f64, &SkuCell), b: (f64, &SkuCell)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| a.1.store_name.cmp(&b.1.store_name))
        .then_with(|| a.1.store_id.cmp(&b.1.store_id))
}

/// Plan transfers from cells with transferable surplus to cells with
/// adjusted need. Either side empty yields an empty plan.
pub fn plan_transfers(cells: &[SkuCell]) -> TransferPlan {
    let mut by_sku: BTreeMap<&str, Vec<&SkuCell>> = BTreeMap::new();
    for cell in cells {
        by_sku.entry(cell.sku.as_str()).or_default().push(cell);
    }

    let mut proposals = Vec::new();
    for (sku, group) in by_sku {
        let mut origins: Vec<&SkuCell> = group
            .iter()
            .copied()
            .filter(|c| c.transferable_surplus > 0.0)
            .collect();
        let mut destinations: Vec<&SkuCell> =
            group.iter().copied().filter(|c| c.adjusted_need > 0.0).collect();
        if origins.is_empty() || destinations.is_empty() {
            continue;
        }

        origins.sort_by(|a, b| by_amount_then_store((a.transferable_surplus, a), (b.transferable_surplus, b)));
        destinations.sort_by(|a, b| by_amount_then_store((a.adjusted_need, a), (b.adjusted_need, b)));

        let mut remaining: Vec<f64> = origins.iter().map(|o| o.transferable_surplus).collect();

        for destination in &destinations {
            let mut need = destination.adjusted_need;
            for (origin, left) in origins.iter().zip(remaining.iter_mut()) {
                if need <= 0.0 {
                    break;
                }
                if origin.store_id == destination.store_id || origin.store_name == destination.store_name {
                    continue;
                }
                let take = need.min(*left).floor();
                if take < 1.0 {
                    continue;
                }
                need -= take;
                *left -= take;
                proposals.push(TransferProposal {
                    sku: sku.to_string(),
                    description: origin.description.clone(),
                    origin_store: origin.store_name.clone(),
                    destination_store: destination.store_name.clone(),
                    units: take as u64,
                    est_weight: take * origin.unit_weight,
                    est_value: take * origin.unit_cost,
                    unit_cost: origin.unit_cost,
                    abc_segment: origin.abc_segment,
                });
            }
        }
    }

    proposals.retain(|p| p.units > 0);
    let plan = TransferPlan::new(proposals);
    tracing::debug!(
        "Planned {} transfers moving {} units",
        plan.len(),
        plan.total_units()
    );
    plan
}
