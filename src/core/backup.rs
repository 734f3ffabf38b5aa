//! Online backup
//!
//! Copies a database page by page from a source connection into a
//! destination while the source stays usable. [`Backup`] is the synchronous
//! cursor; [`Connection::backup`] drives one on a background thread and
//! streams a [`ProgressReport`] after every step.

use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::flags::OpenFlags;
use super::status::StatusCode;
use crate::backends::sqlite::RawBackup;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Name of the main database of a connection
pub const MAIN: &str = "main";

/// Default number of pages copied per step
pub const DEFAULT_PAGES_PER_STEP: i32 = 100;

/// Default capacity of the progress queue
pub const DEFAULT_QUEUE_LENGTH: usize = 8;

/// A steppable backup cursor.
///
/// The copy loop is written against this trait so it can run over any cursor
/// that reports engine status codes.
pub trait BackupCursor {
    /// Copy up to `pages` pages; negative copies everything that is left
    fn step(&mut self, pages: i32) -> StatusCode;

    /// Pages still to copy as of the last step
    fn remaining(&self) -> i32;

    /// Total pages in the source as of the last step
    fn page_count(&self) -> i32;

    /// Release the cursor
    fn finish(&mut self) -> StatusCode;
}

/// Synchronous backup cursor between two open connections.
///
/// Borrows both connections, so it stays on the thread that uses them:
///
/// ```compile_fail
/// use rust_sqlite_driver::{Backup, Connection};
///
/// let source = Connection::open(":memory:").unwrap();
/// let dest = Connection::open(":memory:").unwrap();
/// let backup = Backup::new(&dest, "main", &source, "main").unwrap();
/// std::thread::spawn(move || backup.full());
/// ```
pub struct Backup<'conn> {
    raw: RawBackup,
    _connections: PhantomData<&'conn Connection>,
}

impl<'conn> Backup<'conn> {
    /// Start copying `source_name` of `source` into `dest_name` of `dest`.
    ///
    /// # Errors
    ///
    /// `NotConnected` if either connection is closed; the destination's
    /// engine error if the cursor cannot be created.
    pub fn new(
        dest: &'conn Connection,
        dest_name: &str,
        source: &'conn Connection,
        source_name: &str,
    ) -> Result<Self> {
        let raw = RawBackup::init(dest.raw()?, dest_name, source.raw()?, source_name)?;
        Ok(Self {
            raw,
            _connections: PhantomData,
        })
    }

    /// Copy everything in one step and finish the cursor.
    pub fn full(mut self) -> Result<()> {
        let rc = self.raw.step(-1);
        match StatusCode::from_code(rc) {
            StatusCode::Done | StatusCode::Ok => {}
            _ => {
                self.raw.finish();
                return Err(self.raw.error(rc));
            }
        }

        let rc = self.raw.finish();
        match StatusCode::from_code(rc) {
            StatusCode::Ok => Ok(()),
            _ => Err(self.raw.error(rc)),
        }
    }
}

impl BackupCursor for Backup<'_> {
    fn step(&mut self, pages: i32) -> StatusCode {
        StatusCode::from_code(self.raw.step(pages))
    }

    fn remaining(&self) -> i32 {
        self.raw.remaining()
    }

    fn page_count(&self) -> i32 {
        self.raw.page_count()
    }

    /// Finishing twice is a no-op that reports `Ok`.
    fn finish(&mut self) -> StatusCode {
        StatusCode::from_code(self.raw.finish())
    }
}

impl std::fmt::Debug for Backup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backup")
            .field("remaining", &self.raw.remaining())
            .field("page_count", &self.raw.page_count())
            .finish()
    }
}

/// Settings for [`Connection::backup`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupParameters {
    /// Destination database file
    pub target: PathBuf,
    /// Pages copied per step; must be positive
    pub pages_per_step: i32,
    /// Capacity of the progress queue
    pub queue_length: usize,
    /// Pause between steps
    pub interval: Duration,
    /// Log every report at info level instead of debug
    pub verbose: bool,
}

impl Default for BackupParameters {
    fn default() -> Self {
        Self {
            target: PathBuf::new(),
            pages_per_step: DEFAULT_PAGES_PER_STEP,
            queue_length: DEFAULT_QUEUE_LENGTH,
            interval: Duration::ZERO,
            verbose: false,
        }
    }
}

impl BackupParameters {
    /// Create parameters for a backup into `target`
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Set pages copied per step
    pub fn with_pages_per_step(mut self, pages: i32) -> Self {
        self.pages_per_step = pages;
        self
    }

    /// Set progress queue capacity
    pub fn with_queue_length(mut self, length: usize) -> Self {
        self.queue_length = length;
        self
    }

    /// Set pause between steps
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enable info-level progress logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Snapshot of a running backup, taken after one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Source database filename
    pub source: String,
    /// Destination database file
    pub target: PathBuf,
    /// Status of the step
    pub status: StatusCode,
    /// Total pages in the source
    pub total: i32,
    /// Pages still to copy
    pub remaining: i32,
    /// Whether the run was requested verbose
    pub verbose: bool,
}

impl ProgressReport {
    /// The copy completed
    pub fn is_done(&self) -> bool {
        self.status == StatusCode::Done
    }

    /// No further reports follow this one
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.status,
            StatusCode::Ok | StatusCode::Busy | StatusCode::Locked
        )
    }

    /// The step's failure, if it failed
    pub fn error(&self) -> Option<DatabaseError> {
        match self.status {
            StatusCode::Ok | StatusCode::Done | StatusCode::Busy | StatusCode::Locked => None,
            status => Some(status.into()),
        }
    }

    /// Pages copied so far
    pub fn copied(&self) -> i32 {
        self.total.saturating_sub(self.remaining).max(0)
    }
}

/// Receiving end of a backup's progress stream.
///
/// The stream ends after the terminal report, once the copy loop has
/// released the destination.
#[derive(Debug)]
pub struct Reporter {
    rx: mpsc::Receiver<ProgressReport>,
}

impl Reporter {
    /// Wait for the next report; `None` once the backup has ended
    pub async fn recv(&mut self) -> Option<ProgressReport> {
        self.rx.recv().await
    }

    /// Blocking variant of [`Reporter::recv`].
    ///
    /// # Panics
    ///
    /// If called from inside an async execution context.
    pub fn blocking_recv(&mut self) -> Option<ProgressReport> {
        self.rx.blocking_recv()
    }
}

impl Iterator for Reporter {
    type Item = ProgressReport;

    fn next(&mut self) -> Option<ProgressReport> {
        self.blocking_recv()
    }
}

/// The background copy's cursor. Owns its destination connection; `finish`
/// drops the engine cursor and then closes the destination.
struct DetachedBackup {
    raw: Option<RawBackup>,
    destination: Connection,
}

impl BackupCursor for DetachedBackup {
    fn step(&mut self, pages: i32) -> StatusCode {
        match self.raw.as_mut() {
            Some(raw) => StatusCode::from_code(raw.step(pages)),
            None => StatusCode::Misuse,
        }
    }

    fn remaining(&self) -> i32 {
        self.raw.as_ref().map_or(0, RawBackup::remaining)
    }

    fn page_count(&self) -> i32 {
        self.raw.as_ref().map_or(0, RawBackup::page_count)
    }

    fn finish(&mut self) -> StatusCode {
        let status = match self.raw.take() {
            Some(mut raw) => StatusCode::from_code(raw.finish()),
            None => StatusCode::Ok,
        };
        self.destination.close();
        status
    }
}

/// Launch a backup of `source` as described by `params`.
pub(crate) fn start(source: &Connection, params: BackupParameters) -> Result<Reporter> {
    if params.pages_per_step <= 0 {
        return Err(DatabaseError::invalid_parameters(format!(
            "pages_per_step must be positive, got {}",
            params.pages_per_step
        )));
    }
    source.raw()?;
    if source.flags().contains(OpenFlags::NOMUTEX) {
        return Err(DatabaseError::engine(
            StatusCode::Misuse,
            "background backup requires a source opened in serialized mode",
        ));
    }
    let target = params
        .target
        .to_str()
        .ok_or_else(|| DatabaseError::invalid_parameters("target path is not valid UTF-8"))?
        .to_string();

    let mut destination = Connection::open(target)?;
    let init = RawBackup::init(destination.raw()?, MAIN, source.raw()?, MAIN);
    let raw = match init {
        Ok(raw) => raw,
        Err(e) => {
            destination.close();
            return Err(e);
        }
    };

    let (tx, rx) = mpsc::channel(params.queue_length.max(1));
    let job = DetachedBackup {
        raw: Some(raw),
        destination,
    };
    let source_name = source.filename().to_string();

    tracing::debug!(
        source = %source_name,
        target = %params.target.display(),
        pages_per_step = params.pages_per_step,
        "Starting backup"
    );
    spawn(move || copy_loop(job, &params, &source_name, tx))?;

    Ok(Reporter { rx })
}

/// Run `job` on tokio's blocking pool, or on a dedicated thread outside a
/// runtime.
fn spawn<F>(job: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => {
            std::thread::Builder::new()
                .name("sqlite-backup".to_string())
                .spawn(job)?;
        }
    }
    Ok(())
}

/// Step `cursor` until a terminal status, sending one report per step.
///
/// Runs on a blocking thread. A dropped [`Reporter`] does not stop the copy.
fn copy_loop<C: BackupCursor>(
    mut cursor: C,
    params: &BackupParameters,
    source: &str,
    tx: mpsc::Sender<ProgressReport>,
) {
    let mut listening = true;

    loop {
        let status = cursor.step(params.pages_per_step);
        let report = ProgressReport {
            source: source.to_string(),
            target: params.target.clone(),
            status,
            total: cursor.page_count(),
            remaining: cursor.remaining(),
            verbose: params.verbose,
        };

        if params.verbose {
            tracing::info!(
                source,
                status = %status,
                remaining = report.remaining,
                total = report.total,
                "Backup progress"
            );
        } else {
            tracing::debug!(
                source,
                status = %status,
                remaining = report.remaining,
                total = report.total,
                "Backup progress"
            );
        }

        let terminal = report.is_terminal();
        if listening && tx.blocking_send(report).is_err() {
            tracing::warn!(source, "Backup reporter dropped, continuing without progress");
            listening = false;
        }
        if terminal {
            break;
        }
        if !params.interval.is_zero() {
            std::thread::sleep(params.interval);
        }
    }

    let status = cursor.finish();
    if status.is_error() {
        tracing::warn!(source, status = %status, "Backup finished with an error");
    }
    // The queue closes only once every engine handle is released.
    drop(cursor);
    drop(tx);
}
