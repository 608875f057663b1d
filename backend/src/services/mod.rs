//! Engine services for the inventory planner

pub mod analysis;
pub mod classifier;
pub mod demand;
pub mod export;
pub mod ingest;
pub mod ledger;
pub mod purchase;
pub mod query;
pub mod transfer;

pub use analysis::{analyze, AnalysisOutcome, AnalysisRun, AnalysisService};
pub use ingest::{load_catalog, load_snapshot, IngestDiagnostics, LoadedSnapshot};
pub use ledger::{EmittedOrder, OrderLedger};
pub use query::{CellFilter, InventoryKpis, StoreScope};
