//! Transfer planner tests
//!
//! Tests for the greedy inter-store plan:
//! - Largest surplus serves largest need first, ties by store name
//! - Whole units only; origin never equals destination
//! - Determinism regardless of input order

use proptest::prelude::*;
use shared::models::SkuCell;
use stockplan_backend::services::transfer::plan_transfers;

fn origin(sku: &str, store: &str, surplus: f64) -> SkuCell {
    let mut cell = SkuCell::new(sku, store, store);
    cell.stock_units = surplus;
    cell.transferable_surplus = surplus;
    cell.unit_cost = 10.0;
    cell.unit_weight = 0.5;
    cell.description = format!("{} item", sku);
    cell
}

fn destination(sku: &str, store: &str, need: f64) -> SkuCell {
    let mut cell = SkuCell::new(sku, store, store);
    cell.raw_need = need;
    cell.adjusted_need = need;
    cell.unit_cost = 12.0;
    cell
}

fn moves(cells: &[SkuCell]) -> Vec<(String, String, String, u64)> {
    plan_transfers(cells)
        .proposals
        .into_iter()
        .map(|p| (p.sku, p.origin_store, p.destination_store, p.units))
        .collect()
}

fn mv(sku: &str, from: &str, to: &str, units: u64) -> (String, String, String, u64) {
    (sku.to_string(), from.to_string(), to.to_string(), units)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_single_origin_covers_part_of_need() {
        let cells = vec![origin("S1", "A", 100.0), destination("S1", "B", 300.0)];
        assert_eq!(moves(&cells), vec![mv("S1", "A", "B", 100)]);
    }

    #[test]
    fn test_estimates_use_origin_cost_and_weight() {
        let cells = vec![origin("S1", "A", 100.0), destination("S1", "B", 30.0)];
        let plan = plan_transfers(&cells);
        let p = &plan.proposals[0];
        assert_eq!(p.units, 30);
        assert_eq!(p.est_value, 300.0);
        assert_eq!(p.est_weight, 15.0);
        assert_eq!(p.unit_cost, 10.0);
        assert_eq!(p.description, "S1 item");
    }

    #[test]
    fn test_surplus_ties_break_by_store_name() {
        let cells = vec![
            origin("S1", "Beta", 30.0),
            origin("S1", "Alpha", 30.0),
            destination("S1", "Norte", 40.0),
        ];
        assert_eq!(
            moves(&cells),
            vec![mv("S1", "Alpha", "Norte", 30), mv("S1", "Beta", "Norte", 10)]
        );
    }

    #[test]
    fn test_largest_need_served_first() {
        let cells = vec![
            destination("S1", "Zeta", 10.0),
            destination("S1", "Alpha", 50.0),
            origin("S1", "Centro", 40.0),
        ];
        assert_eq!(moves(&cells), vec![mv("S1", "Centro", "Alpha", 40)]);
    }

    #[test]
    fn test_fractional_amounts_floor_to_whole_units() {
        let cells = vec![origin("S1", "A", 10.7), destination("S1", "B", 5.5)];
        assert_eq!(moves(&cells), vec![mv("S1", "A", "B", 5)]);
    }

    #[test]
    fn test_less_than_one_unit_is_not_moved() {
        let cells = vec![origin("S1", "A", 0.9), destination("S1", "B", 5.0)];
        assert!(plan_transfers(&cells).is_empty());
    }

    #[test]
    fn test_surplus_and_need_in_the_same_store_only() {
        let mut both = origin("S1", "A", 20.0);
        both.adjusted_need = 20.0;
        assert!(plan_transfers(&[both]).is_empty());
    }

    #[test]
    fn test_other_skus_never_mix() {
        let cells = vec![origin("S1", "A", 50.0), destination("S2", "B", 50.0)];
        assert!(plan_transfers(&cells).is_empty());
    }

    #[test]
    fn test_empty_sides_give_empty_plan() {
        assert!(plan_transfers(&[]).is_empty());
        assert!(plan_transfers(&[origin("S1", "A", 50.0)]).is_empty());
        assert!(plan_transfers(&[destination("S1", "A", 50.0)]).is_empty());
    }

    #[test]
    fn test_plan_is_ordered_by_sku() {
        let cells = vec![
            origin("S2", "A", 5.0),
            destination("S2", "B", 5.0),
            origin("S1", "A", 5.0),
            destination("S1", "B", 5.0),
        ];
        assert_eq!(
            moves(&cells),
            vec![mv("S1", "A", "B", 5), mv("S2", "A", "B", 5)]
        );
    }

    #[test]
    fn test_surplus_is_consumed_across_destinations() {
        let cells = vec![
            origin("S1", "A", 25.0),
            destination("S1", "B", 20.0),
            destination("S1", "C", 20.0),
        ];
        assert_eq!(
            moves(&cells),
            vec![mv("S1", "A", "B", 20), mv("S1", "A", "C", 5)]
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use std::collections::BTreeMap;

    const STORES: [&str; 4] = ["A", "B", "C", "D"];

    fn cells_strategy() -> impl Strategy<Value = Vec<SkuCell>> {
        prop::collection::btree_map((0usize..3, 0usize..4), (0u32..60, 0u32..60), 1..12).prop_map(|map| {
            map.into_iter()
                .map(|((sku, store), (surplus, need))| {
                    let mut cell = origin(&format!("S{}", sku), STORES[store], f64::from(surplus) * 0.75);
                    // a cell is either an origin or a destination
                    if need > surplus {
                        cell.transferable_surplus = 0.0;
                        cell.adjusted_need = f64::from(need) * 0.9;
                    }
                    cell
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Nothing is sent beyond surplus or received beyond need
        #[test]
        fn prop_plan_respects_surplus_and_need(cells in cells_strategy()) {
            let plan = plan_transfers(&cells);
            let mut sent: BTreeMap<(String, String), u64> = BTreeMap::new();
            let mut received: BTreeMap<(String, String), u64> = BTreeMap::new();

            for p in &plan.proposals {
                prop_assert!(p.units >= 1);
                prop_assert_ne!(&p.origin_store, &p.destination_store);
                *sent.entry((p.sku.clone(), p.origin_store.clone())).or_insert(0) += p.units;
                *received.entry((p.sku.clone(), p.destination_store.clone())).or_insert(0) += p.units;
            }
            for cell in &cells {
                let key = (cell.sku.clone(), cell.store_name.clone());
                prop_assert!(sent.get(&key).copied().unwrap_or(0) as f64 <= cell.transferable_surplus);
                prop_assert!(received.get(&key).copied().unwrap_or(0) as f64 <= cell.adjusted_need);
            }
        }

        /// Input order does not change the plan
        #[test]
        fn prop_plan_is_order_independent(cells in cells_strategy()) {
            let mut reversed = cells.clone();
            reversed.reverse();
            prop_assert_eq!(plan_transfers(&cells), plan_transfers(&reversed));
        }
    }
}
