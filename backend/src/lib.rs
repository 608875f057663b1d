//! Multi-store inventory planner - backend library
//!
//! Loads the nightly stock snapshot, classifies every SKU-by-store cell,
//! plans inter-store transfers and sizes purchases, and keeps the order
//! ledger that feeds in-transit quantities back into the next run.

use std::sync::Arc;

use tokio::sync::RwLock;

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use config::Config;

use external::CsvSheetStore;
use models::Catalog;
use services::{AnalysisRun, AnalysisService, OrderLedger};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub ledger: Arc<OrderLedger<CsvSheetStore>>,
    /// The single analysis session; `None` until a snapshot is loaded
    pub session: Arc<RwLock<Option<AnalysisRun>>>,
}

impl AppState {
    pub fn new(config: Config, catalog: Catalog, ledger: OrderLedger<CsvSheetStore>) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            ledger: Arc::new(ledger),
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn analysis(&self) -> AnalysisService<CsvSheetStore> {
        AnalysisService::new(self.ledger.clone(), self.config.planning.clone())
    }
}
