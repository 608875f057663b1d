//! External storage integrations

pub mod sheet_store;

pub use sheet_store::{CsvSheetStore, InMemorySheetStore, Sheet, SheetError, SheetRow, SheetStore};
