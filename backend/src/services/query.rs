//! Query facade: filtered views, KPIs and order drafts over one analysis run

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    AbcSegment, Catalog, InventoryState, OrderLineInput, PlanningConfig, SkuCell, TransferPlan,
    TransferProposal,
};
use shared::types::to_decimal;

/// Single store or every store at once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "name", rename_all = "snake_case")]
pub enum StoreScope {
    #[default]
    Consolidated,
    Store(String),
}

impl StoreScope {
    /// `None`, empty or `consolidated` mean every store
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => StoreScope::Consolidated,
            Some(v) if v.eq_ignore_ascii_case("consolidated") => StoreScope::Consolidated,
            Some(v) => StoreScope::Store(v.to_string()),
        }
    }

    pub fn includes(&self, store_name: &str) -> bool {
        match self {
            StoreScope::Consolidated => true,
            StoreScope::Store(name) => name.eq_ignore_ascii_case(store_name),
        }
    }
}

/// Cell predicate; empty sets match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellFilter {
    #[serde(default)]
    pub store: StoreScope,
    /// Brand names or codes
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default)]
    pub suppliers: Vec<String>,
    #[serde(default)]
    pub abc: Vec<AbcSegment>,
    #[serde(default)]
    pub states: Vec<InventoryState>,
    /// Case-insensitive substring of SKU or description
    pub search: Option<String>,
}

fn in_set(set: &[String], value: &str) -> bool {
    set.iter().any(|v| v.trim().eq_ignore_ascii_case(value))
}

impl CellFilter {
    pub fn matches(&self, cell: &SkuCell) -> bool {
        self.store.includes(&cell.store_name)
            && (self.brands.is_empty()
                || in_set(&self.brands, &cell.brand_name)
                || in_set(&self.brands, &cell.brand_id))
            && (self.suppliers.is_empty() || in_set(&self.suppliers, &cell.supplier))
            && (self.abc.is_empty() || self.abc.contains(&cell.abc_segment))
            && (self.states.is_empty() || self.states.contains(&cell.state))
            && self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map_or(true, |s| {
                let needle = s.to_lowercase();
                cell.sku.to_lowercase().contains(&needle)
                    || cell.description.to_lowercase().contains(&needle)
            })
    }
}

pub fn filter_cells<'a>(cells: &'a [SkuCell], filter: &CellFilter) -> Vec<&'a SkuCell> {
    cells.iter().filter(|c| filter.matches(c)).collect()
}

/// Headline figures for the filtered cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryKpis {
    pub cell_count: usize,
    pub sku_count: usize,
    pub total_inventory_value: f64,
    /// Value held in Surplus or SlowMoving cells
    pub idle_inventory_value: f64,
    /// Distinct SKUs with at least one Stockout cell
    pub stockout_skus: usize,
    pub rotation: f64,
    pub required_purchase_value: f64,
    pub expected_loss: f64,
}

pub fn kpis(cells: &[&SkuCell], config: &PlanningConfig) -> InventoryKpis {
    let mut skus = std::collections::BTreeSet::new();
    let mut stockout_skus = std::collections::BTreeSet::new();
    let mut kpis = InventoryKpis {
        cell_count: cells.len(),
        ..InventoryKpis::default()
    };
    let mut sales = 0.0;
    let mut stock = 0.0;
    let horizon = f64::from(config.loss_horizon_days);

    for cell in cells {
        skus.insert(cell.sku.as_str());
        kpis.total_inventory_value += cell.inventory_value;
        if cell.state.is_idle() {
            kpis.idle_inventory_value += cell.inventory_value;
        }
        if cell.state == InventoryState::Stockout {
            stockout_skus.insert(cell.sku.as_str());
            kpis.expected_loss += cell.daily_demand * horizon * cell.estimated_price(config.price_markup);
        }
        kpis.required_purchase_value += cell.purchase_value();
        sales += cell.sales_units_60d;
        stock += cell.stock_units;
    }

    kpis.sku_count = skus.len();
    kpis.stockout_skus = stockout_skus.len();
    kpis.rotation = if stock > 0.0 { sales / stock } else { 0.0 };
    kpis
}

/// One SKU summed across the filtered stores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedRow {
    pub sku: String,
    pub description: String,
    pub brand_name: String,
    pub supplier: String,
    pub abc_segment: AbcSegment,
    pub store_count: usize,
    pub stock_units: f64,
    pub sales_units_60d: f64,
    pub inventory_value: f64,
    pub daily_demand: f64,
    pub raw_need: f64,
    pub transferable_surplus: f64,
    pub purchase_suggestion: u64,
    pub purchase_value: f64,
}

/// Per-SKU totals, ordered by SKU
pub fn consolidated(cells: &[&SkuCell]) -> Vec<ConsolidatedRow> {
    let mut rows: BTreeMap<&str, ConsolidatedRow> = BTreeMap::new();
    for cell in cells {
        let row = rows.entry(cell.sku.as_str()).or_insert_with(|| ConsolidatedRow {
            sku: cell.sku.clone(),
            description: cell.description.clone(),
            brand_name: cell.brand_name.clone(),
            supplier: cell.supplier.clone(),
            abc_segment: cell.abc_segment,
            store_count: 0,
            stock_units: 0.0,
            sales_units_60d: 0.0,
            inventory_value: 0.0,
            daily_demand: 0.0,
            raw_need: 0.0,
            transferable_surplus: 0.0,
            purchase_suggestion: 0,
            purchase_value: 0.0,
        });
        row.store_count += 1;
        row.stock_units += cell.stock_units;
        row.sales_units_60d += cell.sales_units_60d;
        row.inventory_value += cell.inventory_value;
        row.daily_demand += cell.daily_demand;
        row.raw_need += cell.raw_need;
        row.transferable_surplus += cell.transferable_surplus;
        row.purchase_suggestion += cell.purchase_suggestion;
        row.purchase_value += cell.purchase_value();
    }
    rows.into_values().collect()
}

/// Proposals where the store is origin or destination
pub fn transfers_for(plan: &TransferPlan, scope: &StoreScope) -> Vec<TransferProposal> {
    plan.proposals
        .iter()
        .filter(|p| scope.includes(&p.origin_store) || scope.includes(&p.destination_store))
        .cloned()
        .collect()
}

/// Purchase lines for one supplier, ready to emit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseDraft {
    pub supplier: String,
    pub supplier_contact: Option<String>,
    pub lines: Vec<OrderLineInput>,
    pub total_units: u64,
    pub total_value: Decimal,
}

/// Suggested purchases grouped by supplier
pub fn purchase_drafts(cells: &[&SkuCell], catalog: &Catalog) -> Vec<PurchaseDraft> {
    let mut drafts: BTreeMap<&str, PurchaseDraft> = BTreeMap::new();
    for cell in cells.iter().filter(|c| c.purchase_suggestion > 0) {
        let draft = drafts.entry(cell.supplier.as_str()).or_insert_with(|| PurchaseDraft {
            supplier: cell.supplier.clone(),
            supplier_contact: catalog.supplier_contact(&cell.supplier).map(str::to_string),
            lines: Vec::new(),
            total_units: 0,
            total_value: Decimal::ZERO,
        });
        let qty = Decimal::from(cell.purchase_suggestion);
        let unit_cost = to_decimal(cell.unit_cost);
        draft.total_units += cell.purchase_suggestion;
        draft.total_value += qty * unit_cost;
        draft.lines.push(OrderLineInput {
            sku: cell.sku.clone(),
            description: cell.description.clone(),
            counterparty: cell.supplier.clone(),
            destination_store: cell.store_name.clone(),
            qty_requested: qty,
            unit_cost,
        });
    }
    drafts.into_values().collect()
}

/// Transfer lines leaving one store, ready to emit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferDraft {
    pub origin_store: String,
    pub origin_address: Option<String>,
    pub origin_contact: Option<String>,
    pub lines: Vec<OrderLineInput>,
    pub total_units: u64,
}

/// Plan proposals grouped by origin store
pub fn transfer_drafts(plan: &TransferPlan, catalog: &Catalog) -> Vec<TransferDraft> {
    let mut drafts: BTreeMap<&str, TransferDraft> = BTreeMap::new();
    for p in &plan.proposals {
        let draft = drafts.entry(p.origin_store.as_str()).or_insert_with(|| TransferDraft {
            origin_store: p.origin_store.clone(),
            origin_address: catalog.store_address(&p.origin_store).map(str::to_string),
            origin_contact: catalog.store_contact(&p.origin_store).map(str::to_string),
            lines: Vec::new(),
            total_units: 0,
        });
        draft.total_units += p.units;
        draft.lines.push(OrderLineInput {
            sku: p.sku.clone(),
            description: p.description.clone(),
            counterparty: p.origin_store.clone(),
            destination_store: p.destination_store.clone(),
            qty_requested: Decimal::from(p.units),
            unit_cost: to_decimal(p.unit_cost),
        });
    }
    drafts.into_values().collect()
}
