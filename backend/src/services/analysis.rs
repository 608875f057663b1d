//! Analysis pipeline: demand, classification, transit, transfers, purchases
//!
//! [`analyze`] is synchronous and pure over its inputs; [`AnalysisService`]
//! adds the single ledger read that feeds in-transit quantities.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use shared::models::{AbcSegment, InTransit, PlanningConfig, SkuCell, TransferPlan};

use super::classifier::classify;
use super::demand::{estimate_demand, DemandDiagnostics};
use super::ingest::{IngestDiagnostics, LoadedSnapshot};
use super::ledger::OrderLedger;
use super::purchase::{apply_in_transit, apply_transfer_coverage, size_purchases};
use super::transfer::plan_transfers;
use crate::error::{AppError, AppResult};
use crate::external::sheet_store::SheetStore;

/// Float tolerance for invariant checks
const EPSILON: f64 = 1e-6;

/// Enriched cells and the transfer plan derived from them
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub cells: Vec<SkuCell>,
    pub plan: TransferPlan,
    pub demand: DemandDiagnostics,
}

/// Run the engine over loaded cells
pub fn analyze(
    mut cells: Vec<SkuCell>,
    config: &PlanningConfig,
    in_transit: &InTransit,
    today: NaiveDate,
) -> AppResult<AnalysisOutcome> {
    let demand = estimate_demand(&mut cells, config, today);
    classify(&mut cells, config);
    apply_in_transit(&mut cells, in_transit);
    let plan = plan_transfers(&cells);
    apply_transfer_coverage(&mut cells, &plan);
    size_purchases(&mut cells, config);

    verify_invariants(&cells, &plan)?;

    Ok(AnalysisOutcome { cells, plan, demand })
}

fn violation(message: String) -> AppResult<()> {
    tracing::error!("Invariant violated: {}", message);
    Err(AppError::Consistency(message))
}

/// Cell, per-SKU and per-proposal invariants of an analysis result
pub fn verify_invariants(cells: &[SkuCell], plan: &TransferPlan) -> AppResult<()> {
    let mut surplus: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut need: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut segments: BTreeMap<&str, AbcSegment> = BTreeMap::new();
    let mut sku_surplus: BTreeMap<&str, f64> = BTreeMap::new();
    let mut sku_covered: BTreeMap<&str, f64> = BTreeMap::new();

    for cell in cells {
        let id = format!("{}@{}", cell.sku, cell.store_name);
        if cell.stock_units < 0.0 {
            return violation(format!("{}: negative stock", id));
        }
        if cell.transferable_surplus > cell.stock_units + EPSILON {
            return violation(format!("{}: surplus exceeds stock", id));
        }
        if cell.purchase_need + cell.covered_by_transfer > cell.raw_need + EPSILON {
            return violation(format!("{}: purchase plus transfers exceed raw need", id));
        }
        let suggestion = cell.purchase_suggestion as f64;
        if suggestion + EPSILON < cell.purchase_need
            || suggestion - cell.purchase_need >= f64::from(cell.pack_size.max(1))
        {
            return violation(format!("{}: pack rounding out of range", id));
        }
        let segment = *segments.entry(cell.sku.as_str()).or_insert(cell.abc_segment);
        if segment != cell.abc_segment {
            return violation(format!("{}: SKU carries several ABC segments", cell.sku));
        }

        let key = (cell.sku.as_str(), cell.store_name.as_str());
        *surplus.entry(key).or_insert(0.0) += cell.transferable_surplus;
        *need.entry(key).or_insert(0.0) += cell.adjusted_need;
        *sku_surplus.entry(cell.sku.as_str()).or_insert(0.0) += cell.transferable_surplus;
        *sku_covered.entry(cell.sku.as_str()).or_insert(0.0) += cell.covered_by_transfer;
    }

    for (sku, covered) in &sku_covered {
        if *covered > sku_surplus.get(sku).copied().unwrap_or(0.0) + EPSILON {
            return violation(format!("{}: transfers exceed available surplus", sku));
        }
    }

    let mut sent: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut received: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for p in &plan.proposals {
        if p.origin_store == p.destination_store {
            return violation(format!("{}: transfer from {} to itself", p.sku, p.origin_store));
        }
        if p.units < 1 {
            return violation(format!("{}: empty transfer", p.sku));
        }
        *sent.entry((p.sku.as_str(), p.origin_store.as_str())).or_insert(0.0) += p.units as f64;
        *received
            .entry((p.sku.as_str(), p.destination_store.as_str()))
            .or_insert(0.0) += p.units as f64;
    }
    for (key, units) in &sent {
        if *units > surplus.get(key).copied().unwrap_or(0.0) + EPSILON {
            return violation(format!("{}: {} sends more than its surplus", key.0, key.1));
        }
    }
    for (key, units) in &received {
        if *units > need.get(key).copied().unwrap_or(0.0) + EPSILON {
            return violation(format!("{}: {} receives more than it needs", key.0, key.1));
        }
    }

    Ok(())
}

/// One analyzed snapshot, as held by the session
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub cells: Vec<SkuCell>,
    pub plan: TransferPlan,
    pub ingest: IngestDiagnostics,
    pub demand: DemandDiagnostics,
    /// Degradations the operator must see next to the results
    pub warnings: Vec<String>,
    pub analyzed_at: NaiveDateTime,
    pub today: NaiveDate,
}

/// Session entry point tying the engine to the ledger
pub struct AnalysisService<S: SheetStore> {
    ledger: Arc<OrderLedger<S>>,
    planning: PlanningConfig,
}

impl<S: SheetStore> AnalysisService<S> {
    pub fn new(ledger: Arc<OrderLedger<S>>, planning: PlanningConfig) -> Self {
        Self { ledger, planning }
    }

    /// Pending quantities, or none with a warning when the ledger is unreadable
    async fn in_transit(&self) -> (InTransit, Option<String>) {
        match self.ledger.pending_in_transit().await {
            Ok(in_transit) => (in_transit, None),
            Err(e) => {
                tracing::warn!("Ledger unreadable, assuming nothing in transit: {}", e);
                (
                    InTransit::default(),
                    Some(format!(
                        "Order ledger could not be read ({}); in-transit quantities were taken as 0",
                        e
                    )),
                )
            }
        }
    }

    /// Analyze a freshly loaded snapshot
    pub async fn run(&self, snapshot: LoadedSnapshot, today: NaiveDate) -> AppResult<AnalysisRun> {
        let (in_transit, warning) = self.in_transit().await;
        let outcome = analyze(snapshot.cells, &self.planning, &in_transit, today)?;

        tracing::info!(
            "Analysis complete: {} cells, {} transfers, {} in-transit keys",
            outcome.cells.len(),
            outcome.plan.len(),
            in_transit.len()
        );

        Ok(AnalysisRun {
            cells: outcome.cells,
            plan: outcome.plan,
            ingest: snapshot.diagnostics,
            demand: outcome.demand,
            warnings: warning.into_iter().collect(),
            analyzed_at: Local::now().naive_local(),
            today,
        })
    }

    /// Re-analyze the same cells against the current ledger, e.g. after orders
    /// were emitted
    pub async fn refresh(&self, previous: &AnalysisRun) -> AppResult<AnalysisRun> {
        let snapshot = LoadedSnapshot {
            cells: previous.cells.clone(),
            diagnostics: previous.ingest.clone(),
        };
        self.run(snapshot, previous.today).await
    }
}
