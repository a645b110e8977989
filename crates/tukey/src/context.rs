//! Execution context: cooperative cancellation, progress reporting, output sinks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, TukeyError};
use crate::input::{DataTable, Row};
use crate::schema::TableSchema;

/// Progress callback: fraction in `[0, 1]` and a short message.
pub type ProgressFn = dyn Fn(f64, &str) + Send + Sync;

/// Carries the cancellation flag and progress callback through a run.
///
/// Cloning is cheap and clones share the same flag, so a clone can be handed
/// to a signal handler or another thread.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    cancelled: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing flag, e.g. one set by a Ctrl-C handler.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// The shared cancellation flag.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Request cancellation; running loops stop at their next row.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fails with `TukeyError::Cancelled` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TukeyError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report progress. The message is only built when a callback is installed.
    pub fn set_progress(&self, fraction: f64, message: impl FnOnce() -> String) {
        if let Some(progress) = &self.progress {
            progress(fraction.clamp(0.0, 1.0), &message());
        }
    }

    /// A fresh, empty output table with the given schema.
    pub fn create_sink(&self, schema: TableSchema) -> DataTable {
        DataTable::empty(schema)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Destination for treated rows.
pub trait RowSink {
    fn push(&mut self, row: Row) -> Result<()>;
}

impl RowSink for Vec<Row> {
    fn push(&mut self, row: Row) -> Result<()> {
        Vec::push(self, row);
        Ok(())
    }
}

impl RowSink for DataTable {
    fn push(&mut self, row: Row) -> Result<()> {
        if row.len() != self.column_count() {
            return Err(TukeyError::Parse {
                row: self.row_count(),
                column: row.len(),
                message: format!("expected {} cells, found {}", self.column_count(), row.len()),
            });
        }
        self.rows.push(row);
        Ok(())
    }
}

/// Sink that only counts rows; used when just the summary is wanted.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub rows: usize,
}

impl RowSink for CountingSink {
    fn push(&mut self, _row: Row) -> Result<()> {
        self.rows += 1;
        Ok(())
    }
}
