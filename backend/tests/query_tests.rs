//! Query facade tests
//!
//! Tests for the read side of one analysis run:
//! - Store scope and cell filters
//! - KPIs including the stockout loss estimate
//! - Consolidated rows, transfer views and order drafts

use rust_decimal::Decimal;
use shared::models::{
    AbcSegment, Catalog, InventoryState, PlanningConfig, SkuCell, StoreInfo, SupplierInfo,
    TransferPlan, TransferProposal,
};
use stockplan_backend::services::query::{
    consolidated, filter_cells, kpis, purchase_drafts, transfer_drafts, transfers_for, CellFilter,
    StoreScope,
};

fn cell(sku: &str, store: &str, state: InventoryState) -> SkuCell {
    let mut cell = SkuCell::new(sku, store, store);
    cell.state = state;
    cell.description = format!("Producto {}", sku);
    cell.brand_id = "10".to_string();
    cell.brand_name = "Acme".to_string();
    cell.supplier = "Distribuidora Sur".to_string();
    cell.unit_cost = 10.0;
    cell
}

fn stocked(sku: &str, store: &str, state: InventoryState, stock: f64, sales: f64) -> SkuCell {
    let mut c = cell(sku, store, state);
    c.stock_units = stock;
    c.inventory_value = stock * c.unit_cost;
    c.sales_units_60d = sales;
    c
}

fn proposal(sku: &str, from: &str, to: &str, units: u64) -> TransferProposal {
    TransferProposal {
        sku: sku.to_string(),
        description: format!("Producto {}", sku),
        origin_store: from.to_string(),
        destination_store: to.to_string(),
        units,
        est_weight: 0.0,
        est_value: units as f64 * 10.0,
        unit_cost: 10.0,
        abc_segment: AbcSegment::C,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// Filters
// ============================================================================

#[cfg(test)]
mod filter_tests {
    use super::*;

    fn sample() -> Vec<SkuCell> {
        let mut other_brand = cell("S2", "Norte", InventoryState::Surplus);
        other_brand.brand_id = "20".to_string();
        other_brand.brand_name = "Zeta".to_string();
        other_brand.supplier = "Andes".to_string();
        other_brand.abc_segment = AbcSegment::A;
        other_brand.description = "Aceite de girasol".to_string();

        vec![
            cell("S1", "Centro", InventoryState::Stockout),
            cell("S1", "Norte", InventoryState::InStock),
            other_brand,
        ]
    }

    fn skus_at(cells: &[&SkuCell]) -> Vec<(String, String)> {
        cells
            .iter()
            .map(|c| (c.sku.clone(), c.store_name.clone()))
            .collect()
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(StoreScope::parse(None), StoreScope::Consolidated);
        assert_eq!(StoreScope::parse(Some("  ")), StoreScope::Consolidated);
        assert_eq!(StoreScope::parse(Some("Consolidated")), StoreScope::Consolidated);
        assert_eq!(StoreScope::parse(Some(" Norte ")), StoreScope::Store("Norte".to_string()));
    }

    #[test]
    fn test_default_filter_matches_everything() {
        let cells = sample();
        assert_eq!(filter_cells(&cells, &CellFilter::default()).len(), 3);
    }

    #[test]
    fn test_store_scope_is_case_insensitive() {
        let cells = sample();
        let filter = CellFilter {
            store: StoreScope::Store("norte".to_string()),
            ..CellFilter::default()
        };
        assert_eq!(
            skus_at(&filter_cells(&cells, &filter)),
            vec![("S1".to_string(), "Norte".to_string()), ("S2".to_string(), "Norte".to_string())]
        );
    }

    #[test]
    fn test_brand_by_name_or_code() {
        let cells = sample();
        let by_name = CellFilter {
            brands: vec!["zeta".to_string()],
            ..CellFilter::default()
        };
        let by_code = CellFilter {
            brands: vec!["20".to_string()],
            ..CellFilter::default()
        };
        assert_eq!(filter_cells(&cells, &by_name).len(), 1);
        assert_eq!(filter_cells(&cells, &by_code).len(), 1);
    }

    #[test]
    fn test_combined_filters() {
        let cells = sample();
        let filter = CellFilter {
            suppliers: vec!["Distribuidora Sur".to_string()],
            states: vec![InventoryState::Stockout, InventoryState::LowStockRisk],
            ..CellFilter::default()
        };
        assert_eq!(
            skus_at(&filter_cells(&cells, &filter)),
            vec![("S1".to_string(), "Centro".to_string())]
        );

        let segment = CellFilter {
            abc: vec![AbcSegment::A],
            ..CellFilter::default()
        };
        assert_eq!(filter_cells(&cells, &segment)[0].sku, "S2");
    }

    #[test]
    fn test_search_matches_sku_or_description() {
        let cells = sample();
        let by_description = CellFilter {
            search: Some("GIRASOL".to_string()),
            ..CellFilter::default()
        };
        assert_eq!(filter_cells(&cells, &by_description).len(), 1);

        let by_sku = CellFilter {
            search: Some("s1".to_string()),
            ..CellFilter::default()
        };
        assert_eq!(filter_cells(&cells, &by_sku).len(), 2);

        let blank = CellFilter {
            search: Some("   ".to_string()),
            ..CellFilter::default()
        };
        assert_eq!(filter_cells(&cells, &blank).len(), 3);
    }
}

// ============================================================================
// KPIs
// ============================================================================

#[cfg(test)]
mod kpi_tests {
    use super::*;

    #[test]
    fn test_stockout_loss_uses_markup_without_price() {
        let mut empty = cell("S1", "Centro", InventoryState::Stockout);
        empty.daily_demand = 2.0;
        let cells = vec![empty];
        let refs: Vec<&SkuCell> = cells.iter().collect();

        let kpis = kpis(&refs, &PlanningConfig::default());
        assert!(approx(kpis.expected_loss, 2.0 * 30.0 * 13.0));
        assert_eq!(kpis.stockout_skus, 1);
    }

    #[test]
    fn test_stockout_loss_prefers_catalog_price() {
        let mut empty = cell("S1", "Centro", InventoryState::Stockout);
        empty.daily_demand = 2.0;
        empty.unit_price = Some(20.0);
        let cells = vec![empty];
        let refs: Vec<&SkuCell> = cells.iter().collect();
        assert_eq!(kpis(&refs, &PlanningConfig::default()).expected_loss, 1200.0);
    }

    #[test]
    fn test_value_rotation_and_purchases() {
        let mut buying = stocked("S1", "Centro", InventoryState::LowStockRisk, 10.0, 30.0);
        buying.purchase_suggestion = 18;
        let cells = vec![
            buying,
            stocked("S1", "Norte", InventoryState::Surplus, 200.0, 20.0),
            stocked("S2", "Norte", InventoryState::SlowMoving, 40.0, 0.0),
            stocked("S3", "Centro", InventoryState::Stockout, 0.0, 0.0),
            stocked("S3", "Norte", InventoryState::Stockout, 0.0, 0.0),
        ];
        let refs: Vec<&SkuCell> = cells.iter().collect();
        let kpis = kpis(&refs, &PlanningConfig::default());

        assert_eq!(kpis.cell_count, 5);
        assert_eq!(kpis.sku_count, 3);
        assert_eq!(kpis.total_inventory_value, 2500.0);
        assert_eq!(kpis.idle_inventory_value, 2400.0);
        assert_eq!(kpis.stockout_skus, 1);
        assert!(approx(kpis.rotation, 50.0 / 250.0));
        assert_eq!(kpis.required_purchase_value, 180.0);
        assert_eq!(kpis.expected_loss, 0.0);
    }

    #[test]
    fn test_empty_selection() {
        let kpis = kpis(&[], &PlanningConfig::default());
        assert_eq!(kpis.cell_count, 0);
        assert_eq!(kpis.rotation, 0.0);
    }
}

// ============================================================================
// Consolidated And Transfer Views
// ============================================================================

#[cfg(test)]
mod view_tests {
    use super::*;

    #[test]
    fn test_consolidated_sums_per_sku() {
        let mut a = stocked("S2", "Centro", InventoryState::InStock, 10.0, 3.0);
        a.raw_need = 0.0;
        a.transferable_surplus = 4.0;
        let mut b = stocked("S2", "Norte", InventoryState::LowStockRisk, 5.0, 2.0);
        b.raw_need = 20.0;
        b.purchase_suggestion = 20;
        let c = stocked("S1", "Norte", InventoryState::InStock, 1.0, 1.0);

        let cells = vec![a, b, c];
        let refs: Vec<&SkuCell> = cells.iter().collect();
        let rows = consolidated(&refs);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "S1");
        assert_eq!(rows[1].store_count, 2);
        assert_eq!(rows[1].stock_units, 15.0);
        assert_eq!(rows[1].sales_units_60d, 5.0);
        assert_eq!(rows[1].inventory_value, 150.0);
        assert_eq!(rows[1].raw_need, 20.0);
        assert_eq!(rows[1].transferable_surplus, 4.0);
        assert_eq!(rows[1].purchase_suggestion, 20);
        assert_eq!(rows[1].purchase_value, 200.0);
    }

    #[test]
    fn test_transfers_for_store_either_side() {
        let plan = TransferPlan::new(vec![
            proposal("S1", "Centro", "Norte", 5),
            proposal("S1", "Sur", "Centro", 3),
            proposal("S2", "Sur", "Norte", 2),
        ]);
        assert_eq!(transfers_for(&plan, &StoreScope::Consolidated).len(), 3);
        let centro = transfers_for(&plan, &StoreScope::Store("centro".to_string()));
        assert_eq!(centro.len(), 2);
        assert!(centro.iter().all(|p| p.sku == "S1"));
    }
}

// ============================================================================
// Order Drafts
// ============================================================================

#[cfg(test)]
mod draft_tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.stores.insert(
            "1".to_string(),
            StoreInfo {
                name: "Centro".to_string(),
                address: Some("Av. Principal 12".to_string()),
                contact: Some("centro@example.com".to_string()),
            },
        );
        catalog.suppliers.insert(
            "Andes".to_string(),
            SupplierInfo {
                contact: Some("ventas@andes.example".to_string()),
            },
        );
        catalog
    }

    #[test]
    fn test_purchase_drafts_group_by_supplier() {
        let mut a = cell("S1", "Centro", InventoryState::Stockout);
        a.purchase_suggestion = 18;
        a.unit_cost = 2.5;
        let mut b = cell("S2", "Norte", InventoryState::LowStockRisk);
        b.purchase_suggestion = 4;
        let mut c = cell("S3", "Norte", InventoryState::LowStockRisk);
        c.supplier = "Andes".to_string();
        c.purchase_suggestion = 7;
        let idle = cell("S4", "Norte", InventoryState::InStock);

        let cells = vec![a, b, c, idle];
        let refs: Vec<&SkuCell> = cells.iter().collect();
        let drafts = purchase_drafts(&refs, &catalog());

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].supplier, "Andes");
        assert_eq!(drafts[0].supplier_contact.as_deref(), Some("ventas@andes.example"));
        assert_eq!(drafts[0].total_units, 7);

        let sur = &drafts[1];
        assert_eq!(sur.supplier_contact, None);
        assert_eq!(sur.lines.len(), 2);
        assert_eq!(sur.total_units, 22);
        assert_eq!(sur.total_value, Decimal::from(85));
        assert_eq!(sur.lines[0].counterparty, "Distribuidora Sur");
        assert_eq!(sur.lines[0].destination_store, "Centro");
        assert_eq!(sur.lines[0].qty_requested, Decimal::from(18));
        assert_eq!(sur.lines[0].unit_cost, Decimal::new(25, 1));
    }

    #[test]
    fn test_transfer_drafts_group_by_origin() {
        let plan = TransferPlan::new(vec![
            proposal("S1", "Norte", "Sur", 5),
            proposal("S1", "Centro", "Sur", 3),
            proposal("S2", "Centro", "Norte", 2),
        ]);
        let drafts = transfer_drafts(&plan, &catalog());

        assert_eq!(drafts.len(), 2);
        let centro = &drafts[0];
        assert_eq!(centro.origin_store, "Centro");
        assert_eq!(centro.origin_address.as_deref(), Some("Av. Principal 12"));
        assert_eq!(centro.origin_contact.as_deref(), Some("centro@example.com"));
        assert_eq!(centro.total_units, 5);
        assert_eq!(centro.lines[1].destination_store, "Norte");
        assert_eq!(centro.lines[1].counterparty, "Centro");
        assert_eq!(centro.lines[1].unit_cost, Decimal::from(10));

        assert_eq!(drafts[1].origin_store, "Norte");
        assert_eq!(drafts[1].origin_address, None);
    }
}
