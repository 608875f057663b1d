//! Order lifecycle ledger on the `Registro_Ordenes` worksheet
//!
//! New orders are appended in one batch; state changes rewrite the whole
//! worksheet once. Every store call is bounded by the configured timeout, and a
//! write that times out leaves the worksheet as it was.

use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{
    format_line_id, format_order_id, order_id_of, summarize_orders, InTransit, OrderFilter,
    OrderKind, OrderLine, OrderLineInput, OrderSelector, OrderState, OrderSummary,
};
use shared::validation::validate_order_batch;
use tokio::time::Instant;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::sheet_store::{Sheet, SheetError, SheetRow, SheetStore};

pub const LEDGER_SHEET: &str = "Registro_Ordenes";

pub const LEDGER_COLUMNS: [&str; 10] = [
    "ID_Orden",
    "Fecha_Emision",
    "Proveedor",
    "SKU",
    "Descripcion",
    "Cantidad_Solicitada",
    "Tienda_Destino",
    "Estado",
    "Costo_Unitario",
    "Costo_Total",
];

const COL_LINE_ID: usize = 0;
const COL_EMITTED_AT: usize = 1;
const COL_COUNTERPARTY: usize = 2;
const COL_SKU: usize = 3;
const COL_DESCRIPTION: usize = 4;
const COL_QTY: usize = 5;
const COL_DESTINATION: usize = 6;
const COL_STATE: usize = 7;
const COL_UNIT_COST: usize = 8;
const COL_TOTAL_COST: usize = 9;

/// `Fecha_Emision` layout
pub const EMITTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of one emission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmittedOrder {
    pub order_id: String,
    pub kind: OrderKind,
    pub emitted_at: NaiveDateTime,
    pub line_ids: Vec<String>,
    pub total_cost: Decimal,
}

/// Run a store read under a timeout
pub(crate) async fn timed<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, SheetError>>,
) -> AppResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::LedgerTimeout(limit.as_millis())),
    }
}

/// Run a store write with a deadline `limit` from now.
///
/// The store itself enforces the deadline, so a reported timeout means
/// nothing was written.
pub(crate) async fn timed_write<F, Fut>(limit: Duration, write: F) -> AppResult<()>
where
    F: FnOnce(Instant) -> Fut,
    Fut: Future<Output = Result<(), SheetError>>,
{
    write(Instant::now() + limit).await.map_err(|err| match err {
        SheetError::DeadlineExceeded(_) => AppError::LedgerTimeout(limit.as_millis()),
        other => AppError::from(other),
    })
}

/// Decimal from a sheet cell; accepts `12.5` and the `1.234,5` locale form
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok().or_else(|| {
        let normalized: String = raw
            .chars()
            .filter(|c| *c != '.' && !c.is_whitespace())
            .map(|c| if c == ',' { '.' } else { c })
            .collect();
        Decimal::from_str(&normalized).ok()
    })
}

/// Ledger rows reordered into [`LEDGER_COLUMNS`] order; absent columns read empty
fn normalize_rows(sheet: Sheet) -> Vec<SheetRow> {
    let positions: Vec<Option<usize>> = LEDGER_COLUMNS.iter().map(|c| sheet.column(c)).collect();
    if positions.iter().any(Option::is_none) && !sheet.rows.is_empty() {
        tracing::warn!(
            "Ledger worksheet header {:?} lacks some expected columns",
            sheet.header
        );
    }
    sheet
        .rows
        .into_iter()
        .map(|row| {
            positions
                .iter()
                .map(|pos| pos.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

fn parse_row(row: &SheetRow) -> Option<OrderLine> {
    let field = |i: usize| row.get(i).map(|v| v.trim()).unwrap_or("");
    let line_id = field(COL_LINE_ID).to_string();
    let order_id = order_id_of(&line_id)?.to_string();
    let kind = OrderKind::from_id(&order_id)?;
    let emitted_at = NaiveDateTime::parse_from_str(field(COL_EMITTED_AT), EMITTED_AT_FORMAT).ok()?;
    let qty_requested = parse_decimal(field(COL_QTY))?;
    let state = OrderState::parse(field(COL_STATE))?;
    let unit_cost = parse_decimal(field(COL_UNIT_COST)).unwrap_or(Decimal::ZERO);
    let total_cost = parse_decimal(field(COL_TOTAL_COST)).unwrap_or(qty_requested * unit_cost);

    Some(OrderLine {
        order_id,
        line_id,
        emitted_at,
        kind,
        counterparty: field(COL_COUNTERPARTY).to_string(),
        sku: field(COL_SKU).to_string(),
        description: field(COL_DESCRIPTION).to_string(),
        qty_requested,
        destination_store: field(COL_DESTINATION).to_string(),
        state,
        unit_cost,
        total_cost,
    })
}

fn line_to_row(line: &OrderLine) -> SheetRow {
    vec![
        line.line_id.clone(),
        line.emitted_at.format(EMITTED_AT_FORMAT).to_string(),
        line.counterparty.clone(),
        line.sku.clone(),
        line.description.clone(),
        line.qty_requested.normalize().to_string(),
        line.destination_store.clone(),
        line.state.sheet_value().to_string(),
        line.unit_cost.normalize().to_string(),
        line.total_cost.normalize().to_string(),
    ]
}

/// Order ledger over any [`SheetStore`]
pub struct OrderLedger<S: SheetStore> {
    store: Arc<S>,
    io_timeout: Duration,
    last_stamp: Mutex<Option<NaiveDateTime>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: SheetStore> OrderLedger<S> {
    pub fn new(store: Arc<S>, io_timeout: Duration) -> Self {
        Self {
            store,
            io_timeout,
            last_stamp: Mutex::new(None),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Emission timestamp, strictly later than any issued before in this process
    fn next_stamp(&self, now: NaiveDateTime) -> NaiveDateTime {
        let now = now.with_nanosecond(0).unwrap_or(now);
        let mut last = self.last_stamp.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = match *last {
            Some(prev) if prev >= now => prev + chrono::Duration::seconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    async fn read_rows(&self) -> AppResult<Vec<SheetRow>> {
        let sheet = timed(self.io_timeout, self.store.read(LEDGER_SHEET)).await?;
        Ok(normalize_rows(sheet))
    }

    /// Every parseable ledger row, in sheet order
    pub async fn read_all(&self) -> AppResult<Vec<OrderLine>> {
        let rows = self.read_rows().await?;
        let total = rows.len();
        let lines: Vec<OrderLine> = rows.iter().filter_map(parse_row).collect();
        if lines.len() < total {
            tracing::warn!(
                "Ignoring {} unreadable rows in {}",
                total - lines.len(),
                LEDGER_SHEET
            );
        }
        Ok(lines)
    }

    /// Emit one order with the current local time
    pub async fn emit_orders(&self, kind: OrderKind, lines: Vec<OrderLineInput>) -> AppResult<EmittedOrder> {
        self.emit_orders_at(kind, lines, Local::now().naive_local()).await
    }

    /// Validate and append one order as Pending lines `{order_id}-{i}`
    pub async fn emit_orders_at(
        &self,
        kind: OrderKind,
        lines: Vec<OrderLineInput>,
        now: NaiveDateTime,
    ) -> AppResult<EmittedOrder> {
        validate_order_batch(&lines, kind.is_transfer())
            .map_err(|msg| AppError::ValidationError(msg.to_string()))?;
        for line in &lines {
            line.validate()?;
        }

        let emitted_at = self.next_stamp(now);
        let order_id = format_order_id(kind, emitted_at);

        let order_lines: Vec<OrderLine> = lines
            .into_iter()
            .enumerate()
            .map(|(i, input)| OrderLine {
                order_id: order_id.clone(),
                line_id: format_line_id(&order_id, i),
                emitted_at,
                kind,
                counterparty: input.counterparty.trim().to_string(),
                sku: input.sku.trim().to_string(),
                description: input.description,
                total_cost: input.qty_requested * input.unit_cost,
                qty_requested: input.qty_requested,
                destination_store: input.destination_store.trim().to_string(),
                state: OrderState::Pending,
                unit_cost: input.unit_cost,
            })
            .collect();
        let rows: Vec<SheetRow> = order_lines.iter().map(line_to_row).collect();

        {
            let _guard = self.write_lock.lock().await;
            timed_write(self.io_timeout, |deadline| {
                self.store.append(LEDGER_SHEET, &LEDGER_COLUMNS, rows, deadline)
            })
            .await?;
        }

        let emitted = EmittedOrder {
            order_id,
            kind,
            emitted_at,
            line_ids: order_lines.iter().map(|l| l.line_id.clone()).collect(),
            total_cost: order_lines.iter().map(|l| l.total_cost).sum(),
        };

        tracing::info!(
            "Emitted order {} ({}) with {} lines, total cost {}",
            emitted.order_id,
            kind,
            emitted.line_ids.len(),
            emitted.total_cost
        );

        Ok(emitted)
    }

    /// Pending quantity per (SKU, destination store)
    pub async fn pending_in_transit(&self) -> AppResult<InTransit> {
        let lines = self.read_all().await?;
        Ok(InTransit::from_lines(&lines))
    }

    /// Rows matching the filter, in sheet order
    pub async fn history(&self, filter: &OrderFilter) -> AppResult<Vec<OrderLine>> {
        let lines = self.read_all().await?;
        Ok(lines.into_iter().filter(|l| filter.matches(l)).collect())
    }

    /// Orders rolled up from the rows matching the filter
    pub async fn orders(&self, filter: &OrderFilter) -> AppResult<Vec<OrderSummary>> {
        let lines = self.history(filter).await?;
        Ok(summarize_orders(&lines))
    }

    /// Move every selected row to `next`, all or nothing.
    ///
    /// Returns the number of rows whose state changed; no write happens
    /// when that number is zero.
    pub async fn update_states(&self, selector: &OrderSelector, next: OrderState) -> AppResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.read_rows().await?;

        let mut selected = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if let Some(mut line) = parse_row(row).filter(|l| selector.matches(l)) {
                let changed = line
                    .transition(next)
                    .map_err(|e| AppError::InvalidStateTransition(e.to_string()))?;
                selected.push((index, changed));
            }
        }

        if selected.is_empty() {
            return Err(AppError::NotFound("Order lines matching the selection".to_string()));
        }

        let mut changed = 0;
        for (index, did_change) in selected {
            if did_change {
                rows[index][COL_STATE] = next.sheet_value().to_string();
                changed += 1;
            }
        }

        if changed == 0 {
            tracing::debug!("State update to {} changed nothing", next);
            return Ok(0);
        }

        timed_write(self.io_timeout, |deadline| {
            self.store.replace(LEDGER_SHEET, &LEDGER_COLUMNS, rows, deadline)
        })
        .await?;
        tracing::info!("Moved {} ledger rows to {}", changed, next);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(parse_decimal("12.5"), Some(Decimal::new(125, 1)));
        assert_eq!(parse_decimal("1.234,5"), Some(Decimal::new(12345, 1)));
        assert_eq!(parse_decimal("7"), Some(Decimal::from(7)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_row_round_trip() {
        let row: SheetRow = [
            "TR-20240517-090307-1",
            "2024-05-17 09:03:07",
            "Centro",
            "SKU1",
            "Aceite 0.94L",
            "12",
            "Norte",
            "Pendiente",
            "2.5",
            "30",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let line = parse_row(&row).unwrap();
        assert_eq!(line.order_id, "TR-20240517-090307");
        assert_eq!(line.kind, OrderKind::TransferAuto);
        assert_eq!(line.state, OrderState::Pending);
        assert_eq!(line_to_row(&line), row);
    }

    #[test]
    fn test_normalize_rows_reorders_columns() {
        let sheet = Sheet {
            header: vec!["SKU".into(), "ID_Orden".into()],
            rows: vec![vec!["S1".into(), "OC-20240101-000000-0".into()]],
        };
        let rows = normalize_rows(sheet);
        assert_eq!(rows[0].len(), LEDGER_COLUMNS.len());
        assert_eq!(rows[0][COL_LINE_ID], "OC-20240101-000000-0");
        assert_eq!(rows[0][COL_SKU], "S1");
        assert_eq!(rows[0][COL_STATE], "");
    }
}
