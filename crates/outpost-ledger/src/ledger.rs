//! Typed access to the ledger's named views.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use outpost_core::{
    CommunityAggregate, DailyReport, LedgerRow, PerformanceRecord, RelationshipNote,
};

use crate::columns::{self, parse_count, parse_date, place, Columns};
use crate::store::{RecordStore, Row, RowUpdate};
use crate::RecordStoreError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Worksheet names for each view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerViews {
    pub post_log: String,
    pub performance: String,
    pub communities: String,
    pub forecast: String,
    pub relationships: String,
    pub daily_reports: String,
}

impl Default for LedgerViews {
    fn default() -> Self {
        Self {
            post_log: "POST LOG".to_string(),
            performance: "POST PERFORMANCE".to_string(),
            communities: "COMMUNITY PERFORMANCE".to_string(),
            forecast: "WEEKLY FORECAST".to_string(),
            relationships: "RELATIONSHIPS".to_string(),
            daily_reports: "DAILY REPORTS".to_string(),
        }
    }
}

/// Parsed rows of a view plus how many non-blank rows could not be parsed.
#[derive(Debug, Clone)]
pub struct ViewRows<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for ViewRows<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: 0,
        }
    }
}

/// Snapshot of the performance view taken before an upsert.
#[derive(Debug, Clone)]
pub struct PerformanceView {
    /// Post id to row position. Includes rows whose numbers failed to parse,
    /// so an upsert overwrites them instead of adding a second row.
    pub index: HashMap<String, usize>,
    /// Rows that parsed cleanly, in sheet order.
    pub records: Vec<PerformanceRecord>,
    pub skipped: usize,
    columns: Columns,
    has_header: bool,
}

impl PerformanceView {
    /// Last polled date per post id, from the parsed records.
    #[must_use]
    pub fn polled_dates(&self) -> HashMap<&str, NaiveDate> {
        self.records
            .iter()
            .map(|r| (r.post_id.as_str(), r.date_polled))
            .collect()
    }
}

/// The writes an upsert will issue: one overwrite batch and one append batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertPlan {
    pub updates: Vec<RowUpdate>,
    pub update_ids: Vec<String>,
    pub appends: Vec<Row>,
    pub append_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub updated: Vec<String>,
    pub appended: Vec<String>,
    /// `(post_id, error)` for every id whose batch failed.
    pub failed: Vec<(String, String)>,
}

impl UpsertReport {
    /// Ids whose metrics actually landed in the view.
    #[must_use]
    pub fn written(&self) -> Vec<String> {
        self.updated
            .iter()
            .chain(self.appended.iter())
            .cloned()
            .collect()
    }
}

/// Typed adapter over a [`RecordStore`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn RecordStore>,
    views: LedgerViews,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

fn is_blank(row: &Row) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

fn performance_cells(record: &PerformanceRecord) -> Vec<String> {
    vec![
        record.post_id.clone(),
        record.community.clone(),
        record.title.clone(),
        record.upvotes.to_string(),
        record.comments.to_string(),
        record.roi_score.to_string(),
        record.date_polled.format(DATE_FORMAT).to_string(),
    ]
}

fn aggregate_cells(agg: &CommunityAggregate) -> Vec<String> {
    vec![
        agg.community.clone(),
        agg.post_count.to_string(),
        agg.total_upvotes.to_string(),
        agg.total_comments.to_string(),
        format!("{:.2}", agg.avg_upvotes),
        format!("{:.2}", agg.avg_comments),
        agg.best_post.clone(),
        agg.grade.clone(),
        agg.computed_on.format(DATE_FORMAT).to_string(),
    ]
}

/// Build the write batches for `records` against a snapshot of the view.
///
/// Ids already in the view become overwrites of their existing row; new ids
/// become appends. An id repeated within `records` keeps its last values.
#[must_use]
pub fn plan_upsert(view: &PerformanceView, records: &[PerformanceRecord]) -> UpsertPlan {
    let mut plan = UpsertPlan::default();
    let mut update_pos: HashMap<&str, usize> = HashMap::new();
    let mut append_pos: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let row = place(&view.columns, performance_cells(record));
        let id = record.post_id.as_str();

        if let Some(&existing) = view.index.get(id) {
            if let Some(&i) = update_pos.get(id) {
                plan.updates[i].values = row;
            } else {
                update_pos.insert(id, plan.updates.len());
                plan.updates.push(RowUpdate {
                    row: existing,
                    values: row,
                });
                plan.update_ids.push(id.to_string());
            }
        } else if let Some(&i) = append_pos.get(id) {
            plan.appends[i] = row;
        } else {
            append_pos.insert(id, plan.appends.len());
            plan.appends.push(row);
            plan.append_ids.push(id.to_string());
        }
    }

    plan
}

impl Ledger {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, views: LedgerViews) -> Self {
        Self { store, views }
    }

    #[must_use]
    pub fn views(&self) -> &LedgerViews {
        &self.views
    }

    /// # Errors
    ///
    /// Returns [`RecordStoreError::Unauthorized`] when the store rejects the
    /// credentials, or the transport error when it cannot be reached.
    pub async fn connect(&self) -> Result<(), RecordStoreError> {
        self.store.connect().await
    }

    /// # Errors
    ///
    /// Returns the store error if the append fails.
    pub async fn append_post(&self, row: &LedgerRow) -> Result<(), RecordStoreError> {
        let cells = vec![
            row.published_at.format(DATE_FORMAT).to_string(),
            row.published_at.format(TIME_FORMAT).to_string(),
            row.community.clone(),
            row.title.clone(),
            row.post_id.clone(),
            row.strategy.clone(),
            row.model.clone(),
            row.word_count.to_string(),
            row.url.clone(),
        ];
        self.store.append_rows(&self.views.post_log, vec![cells]).await
    }

    /// Every parseable `POST LOG` row. Rows without a post id or date are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns the store error if the view cannot be read.
    pub async fn read_post_log(&self) -> Result<ViewRows<LedgerRow>, RecordStoreError> {
        let view = &self.views.post_log;
        let rows = self.store.read_rows(view).await?;
        let cols = Columns::resolve(rows.first(), columns::POST_LOG);
        let mut out = ViewRows::default();

        for (position, row) in rows.iter().enumerate().skip(1) {
            if is_blank(row) {
                continue;
            }
            let post_id = cols.cell(row, 4);
            let date = parse_date(cols.cell(row, 0));
            let (Some(date), false) = (date, post_id.is_empty()) else {
                tracing::warn!(view = %view, row = position, "skipping malformed post log row");
                out.skipped += 1;
                continue;
            };
            let time = NaiveTime::parse_from_str(cols.cell(row, 1), TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(cols.cell(row, 1), "%H:%M"))
                .unwrap_or(NaiveTime::MIN);

            out.rows.push(LedgerRow {
                published_at: date.and_time(time).and_utc(),
                community: cols.cell(row, 2).to_string(),
                title: cols.cell(row, 3).to_string(),
                post_id: post_id.to_string(),
                strategy: cols.cell(row, 5).to_string(),
                model: cols.cell(row, 6).to_string(),
                word_count: parse_count(cols.cell(row, 7))
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(0),
                url: cols.cell(row, 8).to_string(),
            });
        }

        Ok(out)
    }

    /// # Errors
    ///
    /// Returns the store error if the view cannot be read.
    pub async fn read_performance(&self) -> Result<PerformanceView, RecordStoreError> {
        let view = &self.views.performance;
        let rows = self.store.read_rows(view).await?;
        let cols = Columns::resolve(rows.first(), columns::POST_PERFORMANCE);
        let mut index = HashMap::new();
        let mut records = Vec::new();
        let mut skipped = 0;

        for (position, row) in rows.iter().enumerate().skip(1) {
            let post_id = cols.cell(row, 0);
            if post_id.is_empty() {
                continue;
            }
            if index.contains_key(post_id) {
                tracing::warn!(view = %view, row = position, post_id, "duplicate performance row ignored");
                continue;
            }
            index.insert(post_id.to_string(), position);

            let parsed = (
                parse_count(cols.cell(row, 3)),
                parse_count(cols.cell(row, 4)),
                parse_date(cols.cell(row, 6)),
            );
            let (Some(upvotes), Some(comments), Some(date_polled)) = parsed else {
                tracing::warn!(view = %view, row = position, post_id, "skipping malformed performance row");
                skipped += 1;
                continue;
            };
            records.push(PerformanceRecord::new(
                post_id,
                cols.cell(row, 1),
                cols.cell(row, 2),
                upvotes,
                comments,
                date_polled,
            ));
        }

        Ok(PerformanceView {
            index,
            records,
            skipped,
            columns: cols,
            has_header: !rows.is_empty(),
        })
    }

    /// Overwrite known ids in place and append new ones: at most one update
    /// batch and one append batch regardless of how many records there are.
    pub async fn upsert_performance(
        &self,
        view: &PerformanceView,
        records: &[PerformanceRecord],
    ) -> UpsertReport {
        let target = &self.views.performance;
        let plan = plan_upsert(view, records);
        let mut report = UpsertReport::default();

        if !plan.updates.is_empty() {
            match self.store.update_rows(target, plan.updates).await {
                Ok(()) => report.updated = plan.update_ids,
                Err(e) => {
                    tracing::error!(view = %target, error = %e, rows = plan.update_ids.len(), "batch update failed");
                    let message = e.to_string();
                    report
                        .failed
                        .extend(plan.update_ids.into_iter().map(|id| (id, message.clone())));
                }
            }
        }

        if !plan.appends.is_empty() {
            let mut rows = plan.appends;
            if !view.has_header {
                rows.insert(0, columns::header(columns::POST_PERFORMANCE));
            }
            match self.store.append_rows(target, rows).await {
                Ok(()) => report.appended = plan.append_ids,
                Err(e) => {
                    tracing::error!(view = %target, error = %e, rows = plan.append_ids.len(), "batch append failed");
                    let message = e.to_string();
                    report
                        .failed
                        .extend(plan.append_ids.into_iter().map(|id| (id, message.clone())));
                }
            }
        }

        report
    }

    /// Write one row per community, located case-insensitively by name.
    ///
    /// # Errors
    ///
    /// Returns the first store error from the read or either write batch.
    pub async fn write_aggregates(
        &self,
        aggregates: &[CommunityAggregate],
    ) -> Result<(), RecordStoreError> {
        let view = &self.views.communities;
        let rows = self.store.read_rows(view).await?;
        let cols = Columns::resolve(rows.first(), columns::COMMUNITY_PERFORMANCE);

        let existing: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, row)| !cols.cell(row, 0).is_empty())
            .map(|(i, row)| (cols.cell(row, 0).to_lowercase(), i))
            .collect();

        let mut updates = Vec::new();
        let mut appends = Vec::new();
        if rows.is_empty() && !aggregates.is_empty() {
            appends.push(columns::header(columns::COMMUNITY_PERFORMANCE));
        }
        for agg in aggregates {
            let row = place(&cols, aggregate_cells(agg));
            match existing.get(&agg.community.to_lowercase()) {
                Some(&position) => updates.push(RowUpdate {
                    row: position,
                    values: row,
                }),
                None => appends.push(row),
            }
        }

        if !updates.is_empty() {
            self.store.update_rows(view, updates).await?;
        }
        if !appends.is_empty() {
            self.store.append_rows(view, appends).await?;
        }
        Ok(())
    }

    /// Write `engagement` into the actual-engagement cell of the week row
    /// containing `today`. Returns the row written, or `None` when no week
    /// covers `today`.
    ///
    /// # Errors
    ///
    /// Returns the store error from the read or the cell write.
    pub async fn update_forecast(
        &self,
        today: NaiveDate,
        engagement: u64,
    ) -> Result<Option<usize>, RecordStoreError> {
        let view = &self.views.forecast;
        let rows = self.store.read_rows(view).await?;
        let cols = Columns::resolve(rows.first(), columns::WEEKLY_FORECAST);

        let hit = rows.iter().enumerate().skip(1).find(|(_, row)| {
            match (parse_date(cols.cell(row, 0)), parse_date(cols.cell(row, 1))) {
                (Some(start), Some(end)) => outpost_core::ForecastWeek { start, end }.contains(today),
                _ => false,
            }
        });

        let Some((position, _)) = hit else {
            tracing::info!(view = %view, %today, "no forecast week covers today");
            return Ok(None);
        };
        self.store
            .update_cell(view, position, cols.at(5), engagement.to_string())
            .await?;
        Ok(Some(position))
    }

    /// # Errors
    ///
    /// Returns the store error if the append fails.
    pub async fn append_relationship(&self, note: &RelationshipNote) -> Result<(), RecordStoreError> {
        let cells = vec![
            note.at.format(DATE_FORMAT).to_string(),
            note.platform.clone(),
            note.counterparty.clone(),
            note.note.clone(),
            note.tags.join(", "),
        ];
        self.store
            .append_rows(&self.views.relationships, vec![cells])
            .await
    }

    /// # Errors
    ///
    /// Returns the store error if the append fails.
    pub async fn append_daily_report(
        &self,
        report: &DailyReport,
        notified: bool,
    ) -> Result<(), RecordStoreError> {
        let cells = vec![
            report.date.format(DATE_FORMAT).to_string(),
            report.posts.to_string(),
            report.communities.join(", "),
            report.strategies.join(", "),
            if notified { "yes" } else { "no" }.to_string(),
        ];
        self.store
            .append_rows(&self.views.daily_reports, vec![cells])
            .await
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
