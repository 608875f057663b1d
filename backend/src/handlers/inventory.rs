//! HTTP handlers for inventory views over the current analysis

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{csv_attachment, split_list};
use crate::error::{AppError, AppResult};
use crate::models::{AbcSegment, InventoryState, SkuCell};
use crate::services::analysis::AnalysisRun;
use crate::services::export::write_inventory_state;
use crate::services::query::{self, CellFilter, ConsolidatedRow, InventoryKpis, StoreScope};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CellQuery {
    pub store: Option<String>,
    pub brand: Option<String>,
    pub supplier: Option<String>,
    pub abc: Option<String>,
    pub state: Option<String>,
    pub q: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

impl CellQuery {
    pub fn to_filter(&self) -> AppResult<CellFilter> {
        let abc = split_list(self.abc.as_deref())
            .iter()
            .map(|v| {
                AbcSegment::parse(v).ok_or_else(|| AppError::Validation {
                    field: "abc".to_string(),
                    message: format!("Unknown ABC segment '{}'", v),
                    message_es: format!("Segmento ABC desconocido '{}'", v),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let states = split_list(self.state.as_deref())
            .iter()
            .map(|v| {
                InventoryState::parse(v).ok_or_else(|| AppError::Validation {
                    field: "state".to_string(),
                    message: format!("Unknown inventory state '{}'", v),
                    message_es: format!("Estado de inventario desconocido '{}'", v),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(CellFilter {
            store: StoreScope::parse(self.store.as_deref()),
            brands: split_list(self.brand.as_deref()),
            suppliers: split_list(self.supplier.as_deref()),
            abc,
            states,
            search: self.q.clone(),
        })
    }

    pub fn wants_csv(&self) -> bool {
        self.format.as_deref() == Some("csv")
    }
}

/// Cell as returned by the API, with its action label
#[derive(Debug, Serialize)]
pub struct CellView<'a> {
    #[serde(flatten)]
    pub cell: &'a SkuCell,
    pub action: &'static str,
}

pub(crate) fn session_missing() -> AppError {
    AppError::NotFound("Analysis session (load a snapshot first)".to_string())
}

pub(crate) async fn with_run<T>(state: &AppState, f: impl FnOnce(&AnalysisRun) -> AppResult<T>) -> AppResult<T> {
    let session = state.session.read().await;
    let run = session.as_ref().ok_or_else(session_missing)?;
    f(run)
}

/// Filtered cells
pub async fn list_cells(State(state): State<AppState>, Query(params): Query<CellQuery>) -> AppResult<Response> {
    let filter = params.to_filter()?;
    with_run(&state, |run| {
        let cells = query::filter_cells(&run.cells, &filter);
        if params.wants_csv() {
            csv_attachment("inventory_cells.csv", &cells)
        } else {
            let views: Vec<CellView> = cells
                .into_iter()
                .map(|cell| CellView {
                    cell,
                    action: cell.action(),
                })
                .collect();
            Ok(Json(views).into_response())
        }
    })
    .await
}

/// KPIs over the filtered cells
pub async fn get_kpis(
    State(state): State<AppState>,
    Query(params): Query<CellQuery>,
) -> AppResult<Json<InventoryKpis>> {
    let filter = params.to_filter()?;
    with_run(&state, |run| {
        let cells = query::filter_cells(&run.cells, &filter);
        Ok(Json(query::kpis(&cells, &state.config.planning)))
    })
    .await
}

/// One row per SKU across the filtered stores
pub async fn get_consolidated(State(state): State<AppState>, Query(params): Query<CellQuery>) -> AppResult<Response> {
    let filter = params.to_filter()?;
    with_run(&state, |run| {
        let rows: Vec<ConsolidatedRow> = query::consolidated(&query::filter_cells(&run.cells, &filter));
        if params.wants_csv() {
            csv_attachment("inventory_consolidated.csv", &rows)
        } else {
            Ok(Json(rows).into_response())
        }
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub sheet: &'static str,
    pub rows: usize,
}

/// Replace the `Estado_Inventario` worksheet with the session cells
pub async fn export_inventory(State(state): State<AppState>) -> AppResult<Json<ExportResponse>> {
    let cells = with_run(&state, |run| Ok(run.cells.clone())).await?;
    let rows = write_inventory_state(&state.ledger, &cells).await?;
    Ok(Json(ExportResponse {
        sheet: crate::services::export::INVENTORY_SHEET,
        rows,
    }))
}
