//! Snapshot loading and re-analysis

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::demand::DemandDiagnostics;
use crate::services::{load_snapshot, AnalysisRun, IngestDiagnostics};
use crate::AppState;

#[derive(Deserialize)]
pub struct SnapshotQuery {
    /// Reference date for demand ages; defaults to the local date
    pub today: Option<NaiveDate>,
}

/// What the operator sees after a run
#[derive(Debug, Serialize)]
pub struct AnalysisSummary {
    pub cells: usize,
    pub skus: usize,
    pub transfers: usize,
    pub purchase_lines: usize,
    pub ingest: IngestDiagnostics,
    pub demand: DemandDiagnostics,
    pub warnings: Vec<String>,
    pub analyzed_at: NaiveDateTime,
    pub today: NaiveDate,
}

impl From<&AnalysisRun> for AnalysisSummary {
    fn from(run: &AnalysisRun) -> Self {
        let skus: std::collections::BTreeSet<&str> = run.cells.iter().map(|c| c.sku.as_str()).collect();
        Self {
            cells: run.cells.len(),
            skus: skus.len(),
            transfers: run.plan.len(),
            purchase_lines: run.cells.iter().filter(|c| c.purchase_suggestion > 0).count(),
            ingest: run.ingest.clone(),
            demand: run.demand.clone(),
            warnings: run.warnings.clone(),
            analyzed_at: run.analyzed_at,
            today: run.today,
        }
    }
}

/// Load a raw snapshot and analyze it; replaces the current session
pub async fn load_snapshot_handler(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
    body: Bytes,
) -> AppResult<Json<AnalysisSummary>> {
    let snapshot = load_snapshot(&body, &state.catalog)?;
    let today = query.today.unwrap_or_else(|| Local::now().date_naive());
    let run = state.analysis().run(snapshot, today).await?;

    let summary = AnalysisSummary::from(&run);
    *state.session.write().await = Some(run);
    Ok(Json(summary))
}

/// Re-analyze the loaded cells against the current ledger
pub async fn refresh_analysis(State(state): State<AppState>) -> AppResult<Json<AnalysisSummary>> {
    let mut session = state.session.write().await;
    let previous = session
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Analysis session".to_string()))?;
    let run = state.analysis().refresh(previous).await?;

    let summary = AnalysisSummary::from(&run);
    *session = Some(run);
    Ok(Json(summary))
}

/// Current session summary
pub async fn get_analysis(State(state): State<AppState>) -> AppResult<Json<AnalysisSummary>> {
    let session = state.session.read().await;
    let run = session
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Analysis session".to_string()))?;
    Ok(Json(AnalysisSummary::from(run)))
}

/// Re-run the session after ledger changes; failures only warn
pub(crate) async fn refresh_session(state: &AppState) {
    let mut session = state.session.write().await;
    let Some(previous) = session.as_ref() else {
        return;
    };
    let refreshed = state.analysis().refresh(previous).await;
    match refreshed {
        Ok(run) => *session = Some(run),
        Err(e) => tracing::warn!("Could not refresh analysis after ledger change: {}", e),
    }
}
