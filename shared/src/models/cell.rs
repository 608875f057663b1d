//! SKU-by-store cell models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Importance class derived from 60-day sales value, per SKU across all stores
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AbcSegment {
    A,
    B,
    #[default]
    C,
}

impl AbcSegment {
    pub const ALL: [AbcSegment; 3] = [AbcSegment::A, AbcSegment::B, AbcSegment::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbcSegment::A => "A",
            AbcSegment::B => "B",
            AbcSegment::C => "C",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Some(AbcSegment::A),
            "B" => Some(AbcSegment::B),
            "C" => Some(AbcSegment::C),
            _ => None,
        }
    }
}

impl std::fmt::Display for AbcSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inventory state of a cell. The first matching classification rule wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryState {
    #[default]
    InStock,
    LowStockRisk,
    Stockout,
    Surplus,
    SlowMoving,
}

impl InventoryState {
    pub const ALL: [InventoryState; 5] = [
        InventoryState::InStock,
        InventoryState::LowStockRisk,
        InventoryState::Stockout,
        InventoryState::Surplus,
        InventoryState::SlowMoving,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryState::InStock => "in_stock",
            InventoryState::LowStockRisk => "low_stock_risk",
            InventoryState::Stockout => "stockout",
            InventoryState::Surplus => "surplus",
            InventoryState::SlowMoving => "slow_moving",
        }
    }

    /// Label written to the `Estado_Inventario` worksheet
    pub fn label(&self) -> &'static str {
        match self {
            InventoryState::InStock => "En stock",
            InventoryState::LowStockRisk => "Riesgo de quiebre",
            InventoryState::Stockout => "Quiebre de stock",
            InventoryState::Surplus => "Excedente",
            InventoryState::SlowMoving => "Baja rotación",
        }
    }

    /// Operator action; a 1:1 function of the state
    pub fn action(&self) -> &'static str {
        match self {
            InventoryState::InStock => "Mantener",
            InventoryState::LowStockRisk => "Reabastecer",
            InventoryState::Stockout => "Reabastecer urgente",
            InventoryState::Surplus => "Transferir excedente",
            InventoryState::SlowMoving => "Revisar rotación",
        }
    }

    /// Whether the state warrants replenishment (and therefore a raw need)
    pub fn needs_replenishment(&self) -> bool {
        matches!(self, InventoryState::Stockout | InventoryState::LowStockRisk)
    }

    /// Whether stock in this state counts as idle capital
    pub fn is_idle(&self) -> bool {
        matches!(self, InventoryState::Surplus | InventoryState::SlowMoving)
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value) || s.label().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for InventoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dated sale from the per-SKU history string
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SalesEvent {
    pub date: NaiveDate,
    pub units: f64,
}

/// Key of a cell as seen by the ledger: destination rows carry store names.
///
/// Store names are trimmed and lowercased, matching how filters and the
/// catalog compare them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub sku: String,
    pub store_name: String,
}

impl CellKey {
    pub fn new(sku: impl AsRef<str>, store_name: impl AsRef<str>) -> Self {
        Self {
            sku: sku.as_ref().trim().to_string(),
            store_name: store_name.as_ref().trim().to_lowercase(),
        }
    }
}

/// One (SKU, store) pair with its raw attributes and derived metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkuCell {
    pub sku: String,
    pub store_id: String,
    pub store_name: String,
    pub department: String,
    pub brand_id: String,
    pub brand_name: String,
    pub description: String,
    pub supplier: String,
    pub supplier_sku: String,
    pub unit_weight: f64,
    pub unit_cost: f64,
    /// True selling price, when the product catalog carries one
    pub unit_price: Option<f64>,
    pub lead_time_days: f64,
    pub stock_units: f64,
    pub sales_units_60d: f64,
    /// Raw `YYYY-MM-DD:qty,...` history, parsed by the demand estimator
    pub sales_history: String,

    pub daily_demand: f64,
    pub seasonality_delta: f64,
    pub abc_segment: AbcSegment,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub target_stock: f64,
    pub inventory_value: f64,
    pub state: InventoryState,
    pub transferable_surplus: f64,
    pub raw_need: f64,
    pub in_transit: f64,
    pub adjusted_need: f64,
    pub covered_by_transfer: f64,
    /// Purchase quantity before pack rounding
    pub purchase_need: f64,
    pub pack_size: u32,
    pub purchase_suggestion: u64,
}

impl SkuCell {
    /// A cell with empty attributes and neutral derived values
    pub fn new(sku: impl Into<String>, store_id: impl Into<String>, store_name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            store_id: store_id.into(),
            store_name: store_name.into(),
            department: String::new(),
            brand_id: String::new(),
            brand_name: String::new(),
            description: String::new(),
            supplier: String::new(),
            supplier_sku: String::new(),
            unit_weight: 0.0,
            unit_cost: 0.0,
            unit_price: None,
            lead_time_days: 0.0,
            stock_units: 0.0,
            sales_units_60d: 0.0,
            sales_history: String::new(),
            daily_demand: 0.0,
            seasonality_delta: 0.0,
            abc_segment: AbcSegment::C,
            safety_stock: 0.0,
            reorder_point: 0.0,
            target_stock: 0.0,
            inventory_value: 0.0,
            state: InventoryState::InStock,
            transferable_surplus: 0.0,
            raw_need: 0.0,
            in_transit: 0.0,
            adjusted_need: 0.0,
            covered_by_transfer: 0.0,
            purchase_need: 0.0,
            pack_size: 1,
            purchase_suggestion: 0,
        }
    }

    /// 60-day sales value used for ABC ranking
    pub fn sales_value_60d(&self) -> f64 {
        self.sales_units_60d * self.unit_cost
    }

    /// Selling price, falling back to cost times the configured markup
    pub fn estimated_price(&self, markup: f64) -> f64 {
        self.unit_price.unwrap_or(self.unit_cost * markup)
    }

    pub fn action(&self) -> &'static str {
        self.state.action()
    }

    /// Value of the pack-rounded purchase suggestion
    pub fn purchase_value(&self) -> f64 {
        self.purchase_suggestion as f64 * self.unit_cost
    }
}
