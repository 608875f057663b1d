//! Inventory state worksheet and CSV downloads

use serde::Serialize;
use shared::models::SkuCell;
use shared::types::to_decimal;

use super::ledger::{timed_write, OrderLedger};
use crate::error::{AppError, AppResult};
use crate::external::sheet_store::{SheetRow, SheetStore};

pub const INVENTORY_SHEET: &str = "Estado_Inventario";

pub const INVENTORY_COLUMNS: [&str; 8] = [
    "SKU",
    "Almacen_Nombre",
    "Stock",
    "Costo_Promedio_UND",
    "Sugerencia_Compra",
    "Necesidad_Total",
    "Excedente_Trasladable",
    "Estado_Inventario",
];

fn number(value: f64) -> String {
    to_decimal(value).to_string()
}

/// One worksheet row per cell, in cell order
pub fn inventory_rows(cells: &[SkuCell]) -> Vec<SheetRow> {
    cells
        .iter()
        .map(|cell| {
            vec![
                cell.sku.clone(),
                cell.store_name.clone(),
                number(cell.stock_units),
                number(cell.unit_cost),
                cell.purchase_suggestion.to_string(),
                number(cell.raw_need),
                number(cell.transferable_surplus),
                cell.state.label().to_string(),
            ]
        })
        .collect()
}

/// Replace the inventory worksheet with the current cells
pub async fn write_inventory_state<S: SheetStore>(ledger: &OrderLedger<S>, cells: &[SkuCell]) -> AppResult<usize> {
    let rows = inventory_rows(cells);
    let count = rows.len();
    timed_write(ledger.io_timeout(), |deadline| {
        ledger.store().replace(INVENTORY_SHEET, &INVENTORY_COLUMNS, rows, deadline)
    })
    .await?;
    tracing::info!("Wrote {} rows to {}", count, INVENTORY_SHEET);
    Ok(count)
}

/// Render serializable rows as CSV with a header
pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in data {
        wtr.serialize(record)
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}
