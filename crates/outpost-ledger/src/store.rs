use async_trait::async_trait;

use crate::RecordStoreError;

/// One row of cells, left to right.
pub type Row = Vec<String>;

/// Overwrite of one existing row, starting at the first column.
///
/// `row` indexes the rows returned by [`RecordStore::read_rows`], so the
/// header is row 0 and the first data row is row 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    pub row: usize,
    pub values: Row,
}

/// A tabular store of named views.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check that the store is reachable with the configured credentials.
    async fn connect(&self) -> Result<(), RecordStoreError> {
        Ok(())
    }

    /// Every row of `view`, header first. A missing or blank view is empty.
    async fn read_rows(&self, view: &str) -> Result<Vec<Row>, RecordStoreError>;

    /// Overwrite several rows in a single round trip.
    async fn update_rows(&self, view: &str, updates: Vec<RowUpdate>)
        -> Result<(), RecordStoreError>;

    /// Append several rows after the last non-empty row in a single round trip.
    async fn append_rows(&self, view: &str, rows: Vec<Row>) -> Result<(), RecordStoreError>;

    /// Overwrite a single cell. `row` uses the same indexing as [`RowUpdate`];
    /// `column` is zero-based.
    async fn update_cell(
        &self,
        view: &str,
        row: usize,
        column: usize,
        value: String,
    ) -> Result<(), RecordStoreError>;
}
