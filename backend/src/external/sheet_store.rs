//! Tabular sheet store backing the order ledger
//!
//! A worksheet is a header plus string rows. Appends are additive; a replace
//! swaps the whole worksheet or leaves it untouched. Writes carry a deadline:
//! a write that cannot commit before it reports `DeadlineExceeded` and
//! changes nothing.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

pub type SheetRow = Vec<String>;

/// Contents of one worksheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("I/O error on worksheet {sheet}: {source}")]
    Io {
        sheet: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on worksheet {sheet}: {source}")]
    Csv {
        sheet: String,
        #[source]
        source: csv::Error,
    },

    #[error("worksheet {sheet} has an unexpected header: {detail}")]
    Header { sheet: String, detail: String },

    #[error("worksheet {0} is unavailable")]
    Unavailable(String),

    #[error("write to worksheet {0} missed its deadline")]
    DeadlineExceeded(String),

    #[error("worksheet task failed: {0}")]
    Task(String),
}

/// Out-of-process tabular store, addressed by worksheet name
pub trait SheetStore: Send + Sync + 'static {
    /// Read a worksheet; a missing worksheet reads as empty
    fn read(&self, sheet: &str) -> impl Future<Output = Result<Sheet, SheetError>> + Send;

    /// Append rows laid out as `header` in one batch, creating the worksheet
    /// if needed. All rows land by `deadline` or none do.
    fn append(
        &self,
        sheet: &str,
        header: &[&str],
        rows: Vec<SheetRow>,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), SheetError>> + Send;

    /// Replace the whole worksheet by `deadline`, or leave it untouched
    fn replace(
        &self,
        sheet: &str,
        header: &[&str],
        rows: Vec<SheetRow>,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), SheetError>> + Send;
}

fn owned_header(header: &[&str]) -> Vec<String> {
    header.iter().map(|h| h.to_string()).collect()
}

/// Rows laid out as `expected`, rearranged into the column order of an
/// existing header.
///
/// The existing header may order the columns differently or carry extra
/// ones (written empty); it must hold every expected column.
fn align_rows(
    sheet: &str,
    existing: &[String],
    expected: &[String],
    rows: Vec<SheetRow>,
) -> Result<Vec<SheetRow>, SheetError> {
    if existing.is_empty() || existing == expected {
        return Ok(rows);
    }
    let has_all = expected
        .iter()
        .all(|e| existing.iter().any(|x| x.trim() == e.trim()));
    if !has_all {
        return Err(SheetError::Header {
            sheet: sheet.to_string(),
            detail: format!("found [{}], expected [{}]", existing.join(", "), expected.join(", ")),
        });
    }
    let positions: Vec<Option<usize>> = existing
        .iter()
        .map(|name| expected.iter().position(|e| e.trim() == name.trim()))
        .collect();
    Ok(rows
        .into_iter()
        .map(|row| {
            positions
                .iter()
                .map(|pos| pos.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                .collect()
        })
        .collect())
}

/// Wait out an injected delay unless the deadline comes first
async fn delay_until(sheet: &str, delay: Option<Duration>, deadline: Instant) -> Result<(), SheetError> {
    if let Some(delay) = delay {
        if tokio::time::timeout_at(deadline, tokio::time::sleep(delay)).await.is_err() {
            return Err(SheetError::DeadlineExceeded(sheet.to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store used by tests and ephemeral sessions.
///
/// Reads and writes can be made to fail or stall to exercise the ledger's
/// degradation and timeout paths.
#[derive(Clone, Default)]
pub struct InMemorySheetStore {
    sheets: Arc<Mutex<HashMap<String, Sheet>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl InMemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.delay.lock() {
            *guard = delay;
        }
    }

    /// Current contents, bypassing failure injection
    pub fn snapshot(&self, sheet: &str) -> Sheet {
        self.sheets
            .lock()
            .ok()
            .and_then(|sheets| sheets.get(sheet).cloned())
            .unwrap_or_default()
    }

    fn current_delay(&self) -> Option<Duration> {
        self.delay.lock().ok().and_then(|d| *d)
    }

    fn with_sheets<T>(
        &self,
        sheet: &str,
        f: impl FnOnce(&mut HashMap<String, Sheet>) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let mut sheets = self
            .sheets
            .lock()
            .map_err(|_| SheetError::Unavailable(sheet.to_string()))?;
        f(&mut sheets)
    }

    fn guard_write(&self, sheet: &str) -> Result<(), SheetError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SheetError::Unavailable(sheet.to_string()));
        }
        Ok(())
    }
}

impl SheetStore for InMemorySheetStore {
    fn read(&self, sheet: &str) -> impl Future<Output = Result<Sheet, SheetError>> + Send {
        let sheet = sheet.to_string();
        let delay = self.current_delay();
        let store = self.clone();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if store.fail_reads.load(Ordering::SeqCst) {
                return Err(SheetError::Unavailable(sheet));
            }
            store.with_sheets(&sheet, |sheets| Ok(sheets.get(&sheet).cloned().unwrap_or_default()))
        }
    }

    fn append(
        &self,
        sheet: &str,
        header: &[&str],
        rows: Vec<SheetRow>,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), SheetError>> + Send {
        let sheet = sheet.to_string();
        let header = owned_header(header);
        let delay = self.current_delay();
        let store = self.clone();
        async move {
            delay_until(&sheet, delay, deadline).await?;
            store.guard_write(&sheet)?;
            store.with_sheets(&sheet, |sheets| {
                let entry = sheets.entry(sheet.clone()).or_default();
                let rows = align_rows(&sheet, &entry.header, &header, rows)?;
                if entry.header.is_empty() {
                    entry.header = header;
                }
                entry.rows.extend(rows);
                Ok(())
            })
        }
    }

    fn replace(
        &self,
        sheet: &str,
        header: &[&str],
        rows: Vec<SheetRow>,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), SheetError>> + Send {
        let sheet = sheet.to_string();
        let header = owned_header(header);
        let delay = self.current_delay();
        let store = self.clone();
        async move {
            delay_until(&sheet, delay, deadline).await?;
            store.guard_write(&sheet)?;
            store.with_sheets(&sheet, |sheets| {
                sheets.insert(sheet.clone(), Sheet { header, rows });
                Ok(())
            })
        }
    }
}

// ============================================================================
// CSV file store
// ============================================================================

/// One CSV file per worksheet under a directory
#[derive(Debug, Clone)]
pub struct CsvSheetStore {
    dir: PathBuf,
}

impl CsvSheetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sheet))
    }
}

fn io_err(sheet: &str) -> impl FnOnce(std::io::Error) -> SheetError + '_ {
    move |source| SheetError::Io {
        sheet: sheet.to_string(),
        source,
    }
}

fn csv_err(sheet: &str) -> impl FnOnce(csv::Error) -> SheetError + '_ {
    move |source| SheetError::Csv {
        sheet: sheet.to_string(),
        source,
    }
}

fn read_csv_sheet(sheet: &str, path: &Path) -> Result<Sheet, SheetError> {
    if !path.exists() {
        return Ok(Sheet::default());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err(sheet))?;
    let header = reader
        .headers()
        .map_err(csv_err(sheet))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err(sheet))?;
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }
    Ok(Sheet { header, rows })
}

/// Serialize an optional header and the rows into one buffer
fn encode_rows(sheet: &str, header: Option<&[String]>, rows: &[SheetRow]) -> Result<Vec<u8>, SheetError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if let Some(header) = header {
        writer.write_record(header).map_err(csv_err(sheet))?;
    }
    for row in rows {
        writer.write_record(row).map_err(csv_err(sheet))?;
    }
    writer
        .into_inner()
        .map_err(|e| io_err(sheet)(e.into_error()))
}

const GATE_OPEN: u8 = 0;
const GATE_COMMITTED: u8 = 1;
const GATE_ABORTED: u8 = 2;

/// Settles once whether a blocking write commits or is abandoned
#[derive(Default)]
struct CommitGate(AtomicU8);

impl CommitGate {
    fn try_commit(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_COMMITTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn try_abort(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_ABORTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Abandons the write if the caller stops waiting before it commits
struct AbortOnDrop(Arc<CommitGate>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.try_abort();
    }
}

/// Called by the blocking writer right before its change becomes visible
fn claim_commit(sheet: &str, gate: &CommitGate, deadline: std::time::Instant) -> Result<(), SheetError> {
    if std::time::Instant::now() >= deadline || !gate.try_commit() {
        return Err(SheetError::DeadlineExceeded(sheet.to_string()));
    }
    Ok(())
}

async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, SheetError> + Send + 'static,
) -> Result<T, SheetError> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| SheetError::Task(e.to_string()))?
}

/// Run a blocking write that commits before `deadline` or not at all.
///
/// A write that has already claimed its commit when the deadline passes is
/// awaited, so the reported outcome always matches the file.
async fn run_write(
    sheet: String,
    deadline: Instant,
    task: impl FnOnce(&CommitGate, std::time::Instant) -> Result<(), SheetError> + Send + 'static,
) -> Result<(), SheetError> {
    let gate = Arc::new(CommitGate::default());
    let guard = AbortOnDrop(gate.clone());
    let writer_deadline = deadline.into_std();
    let mut handle = tokio::task::spawn_blocking(move || task(&*gate, writer_deadline));

    let waited = tokio::time::timeout_at(deadline, &mut handle).await;
    let joined = match waited {
        Ok(joined) => joined,
        Err(_) if guard.0.try_abort() => return Err(SheetError::DeadlineExceeded(sheet)),
        Err(_) => handle.await,
    };
    joined.map_err(|e| SheetError::Task(e.to_string()))?
}

impl SheetStore for CsvSheetStore {
    fn read(&self, sheet: &str) -> impl Future<Output = Result<Sheet, SheetError>> + Send {
        let sheet = sheet.to_string();
        let path = self.path_for(&sheet);
        run_blocking(move || read_csv_sheet(&sheet, &path))
    }

    fn append(
        &self,
        sheet: &str,
        header: &[&str],
        rows: Vec<SheetRow>,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), SheetError>> + Send {
        let name = sheet.to_string();
        let sheet = sheet.to_string();
        let header = owned_header(header);
        let dir = self.dir.clone();
        let path = self.path_for(&sheet);
        run_write(name, deadline, move |gate, deadline| {
            fs::create_dir_all(&dir).map_err(io_err(&sheet))?;
            let existing = read_csv_sheet(&sheet, &path)?;
            let rows = align_rows(&sheet, &existing.header, &header, rows)?;
            let new_header = existing.header.is_empty().then_some(header.as_slice());
            let bytes = encode_rows(&sheet, new_header, &rows)?;

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(io_err(&sheet))?;
            let original_len = file.metadata().map_err(io_err(&sheet))?.len();

            claim_commit(&sheet, gate, deadline)?;
            if let Err(source) = file.write_all(&bytes).and_then(|()| file.sync_data()) {
                // A partial batch is cut back off
                let _ = file.set_len(original_len);
                return Err(SheetError::Io { sheet, source });
            }
            Ok(())
        })
    }

    fn replace(
        &self,
        sheet: &str,
        header: &[&str],
        rows: Vec<SheetRow>,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), SheetError>> + Send {
        let name = sheet.to_string();
        let sheet = sheet.to_string();
        let header = owned_header(header);
        let dir = self.dir.clone();
        let path = self.path_for(&sheet);
        run_write(name, deadline, move |gate, deadline| {
            fs::create_dir_all(&dir).map_err(io_err(&sheet))?;
            let bytes = encode_rows(&sheet, Some(&header), &rows)?;
            let tmp = path.with_extension("csv.tmp");
            let written = File::create(&tmp)
                .and_then(|mut file| file.write_all(&bytes).and_then(|()| file.sync_data()));
            if let Err(source) = written {
                let _ = fs::remove_file(&tmp);
                return Err(SheetError::Io { sheet, source });
            }

            if let Err(err) = claim_commit(&sheet, gate, deadline) {
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
            fs::rename(&tmp, &path).map_err(io_err(&sheet))
        })
    }
}
