//! In-memory record store for development and testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::store::{RecordStore, Row, RowUpdate};
use crate::RecordStoreError;

/// Views held in memory. Counts write round trips and can be told to fail
/// reads or writes for chosen views.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    views: RwLock<HashMap<String, Vec<Row>>>,
    failing_reads: RwLock<HashSet<String>>,
    failing_writes: RwLock<HashSet<String>>,
    rejects_credentials: AtomicBool,
    update_calls: AtomicUsize,
    append_calls: AtomicUsize,
    cell_calls: AtomicUsize,
}

fn poisoned<E: std::fmt::Display>(e: E) -> RecordStoreError {
    RecordStoreError::Internal(e.to_string())
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a view with a header row and data rows.
    #[must_use]
    pub fn with_view(self, view: &str, header: &[&str], rows: Vec<Vec<&str>>) -> Self {
        let mut all = vec![header.iter().map(|c| (*c).to_string()).collect::<Row>()];
        all.extend(
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect::<Row>()),
        );
        if let Ok(mut views) = self.views.write() {
            views.insert(view.to_string(), all);
        }
        self
    }

    pub fn fail_reads_for(&self, view: &str) {
        if let Ok(mut set) = self.failing_reads.write() {
            set.insert(view.to_string());
        }
    }

    pub fn fail_writes_for(&self, view: &str) {
        if let Ok(mut set) = self.failing_writes.write() {
            set.insert(view.to_string());
        }
    }

    /// Make [`RecordStore::connect`] fail as if the credentials were revoked.
    pub fn reject_credentials(&self) {
        self.rejects_credentials.store(true, Ordering::SeqCst);
    }

    /// Snapshot of every row of `view`, header included.
    #[must_use]
    pub fn rows(&self, view: &str) -> Vec<Row> {
        self.views
            .read()
            .ok()
            .and_then(|v| v.get(view).cloned())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cell_calls(&self) -> usize {
        self.cell_calls.load(Ordering::SeqCst)
    }

    fn check(set: &RwLock<HashSet<String>>, view: &str, op: &str) -> Result<(), RecordStoreError> {
        let set = set.read().map_err(poisoned)?;
        if set.contains(view) {
            return Err(RecordStoreError::Internal(format!(
                "injected {op} failure for '{view}'"
            )));
        }
        Ok(())
    }
}

fn write_at(row: &mut Row, column: usize, value: String) {
    if row.len() <= column {
        row.resize(column + 1, String::new());
    }
    row[column] = value;
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn connect(&self) -> Result<(), RecordStoreError> {
        if self.rejects_credentials.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unauthorized("credentials rejected".to_string()));
        }
        Ok(())
    }

    async fn read_rows(&self, view: &str) -> Result<Vec<Row>, RecordStoreError> {
        Self::check(&self.failing_reads, view, "read")?;
        Ok(self.rows(view))
    }

    async fn update_rows(
        &self,
        view: &str,
        updates: Vec<RowUpdate>,
    ) -> Result<(), RecordStoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.failing_writes, view, "update")?;
        let mut views = self.views.write().map_err(poisoned)?;
        let rows = views.entry(view.to_string()).or_default();
        if let Some(bad) = updates.iter().find(|u| u.row >= rows.len()) {
            return Err(RecordStoreError::RowOutOfRange {
                view: view.to_string(),
                row: bad.row,
            });
        }
        for update in updates {
            let target = &mut rows[update.row];
            for (column, value) in update.values.into_iter().enumerate() {
                write_at(target, column, value);
            }
        }
        Ok(())
    }

    async fn append_rows(&self, view: &str, new_rows: Vec<Row>) -> Result<(), RecordStoreError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.failing_writes, view, "append")?;
        let mut views = self.views.write().map_err(poisoned)?;
        views.entry(view.to_string()).or_default().extend(new_rows);
        Ok(())
    }

    async fn update_cell(
        &self,
        view: &str,
        row: usize,
        column: usize,
        value: String,
    ) -> Result<(), RecordStoreError> {
        self.cell_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.failing_writes, view, "cell update")?;
        let mut views = self.views.write().map_err(poisoned)?;
        let rows = views.entry(view.to_string()).or_default();
        let target = rows
            .get_mut(row)
            .ok_or_else(|| RecordStoreError::RowOutOfRange {
                view: view.to_string(),
                row,
            })?;
        write_at(target, column, value);
        Ok(())
    }
}
