//! View layouts and header-driven column lookup.

use chrono::NaiveDate;

use crate::store::Row;

pub const POST_LOG: &[&str] = &[
    "Date",
    "Time (UTC)",
    "Community",
    "Title",
    "Post ID",
    "Strategy",
    "Model",
    "Word Count",
    "URL",
];

pub const POST_PERFORMANCE: &[&str] = &[
    "Post ID",
    "Community",
    "Title",
    "Upvotes",
    "Comments",
    "ROI Score",
    "Date Polled",
];

pub const COMMUNITY_PERFORMANCE: &[&str] = &[
    "Community",
    "Posts",
    "Total Upvotes",
    "Total Comments",
    "Avg Upvotes",
    "Avg Comments",
    "Best Post",
    "ROI Grade",
    "Last Computed",
];

pub const WEEKLY_FORECAST: &[&str] = &[
    "Week Start",
    "Week End",
    "Posts Target",
    "Posts Actual",
    "Engagement Target",
    "Engagement Actual",
];

pub const RELATIONSHIPS: &[&str] = &["Date", "Platform", "Counterparty", "Note", "Tags"];

pub const DAILY_REPORTS: &[&str] = &["Date", "Posts", "Communities", "Strategies", "Notified"];

/// Column positions for one view, resolved from its header row.
///
/// A header that lacks one of the layout's names falls back to the
/// layout's own position for it.
#[derive(Debug, Clone)]
pub struct Columns {
    positions: Vec<usize>,
}

impl Columns {
    #[must_use]
    pub fn resolve(header: Option<&Row>, layout: &[&str]) -> Self {
        let positions = layout
            .iter()
            .enumerate()
            .map(|(default, name)| {
                header
                    .and_then(|h| {
                        h.iter()
                            .position(|cell| cell.trim().eq_ignore_ascii_case(name))
                    })
                    .unwrap_or(default)
            })
            .collect();
        Self { positions }
    }

    /// Position of the layout's `index`-th column.
    #[must_use]
    pub fn at(&self, index: usize) -> usize {
        self.positions.get(index).copied().unwrap_or(index)
    }

    /// Trimmed cell text; blank or absent cells are empty.
    #[must_use]
    pub fn cell<'a>(&self, row: &'a Row, index: usize) -> &'a str {
        row.get(self.at(index)).map_or("", |c| c.trim())
    }
}

/// Parse a spreadsheet date cell. Accepts ISO dates, optionally followed by a
/// time, and US `m/d/yyyy`.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

/// Parse a count cell, tolerating thousands separators and integral floats.
#[must_use]
pub fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    let f = cleaned.parse::<f64>().ok()?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then(|| f as u64)
}

/// Spreadsheet column letters for a zero-based index: 0 → `A`, 26 → `AA`.
#[must_use]
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        #[allow(clippy::cast_possible_truncation)]
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Fill a layout-ordered record into a row that honours the header's positions.
#[must_use]
pub fn place(columns: &Columns, values: Vec<String>) -> Row {
    let width = (0..values.len())
        .map(|i| columns.at(i) + 1)
        .max()
        .unwrap_or(0);
    let mut row = vec![String::new(); width];
    for (i, value) in values.into_iter().enumerate() {
        row[columns.at(i)] = value;
    }
    row
}

#[must_use]
pub fn header(layout: &[&str]) -> Row {
    layout.iter().map(|c| (*c).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn resolve_reads_reordered_headers_case_insensitively() {
        let header = row(&["post id", "Title", "COMMUNITY"]);
        let cols = Columns::resolve(Some(&header), POST_PERFORMANCE);
        assert_eq!(cols.at(0), 0);
        assert_eq!(cols.at(1), 2);
        assert_eq!(cols.at(2), 1);
        // Not in the header: canonical position.
        assert_eq!(cols.at(3), 3);
    }

    #[test]
    fn cell_is_trimmed_and_missing_is_empty() {
        let cols = Columns::resolve(None, POST_PERFORMANCE);
        let r = row(&[" abc "]);
        assert_eq!(cols.cell(&r, 0), "abc");
        assert_eq!(cols.cell(&r, 4), "");
    }

    #[test]
    fn parse_date_formats() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(parse_date("2026-03-01"), Some(d));
        assert_eq!(parse_date("2026-03-01 14:22:00"), Some(d));
        assert_eq!(parse_date("3/1/2026"), Some(d));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn parse_count_tolerates_sheet_formatting() {
        assert_eq!(parse_count("1,204"), Some(1204));
        assert_eq!(parse_count("7.0"), Some(7));
        assert_eq!(parse_count("7.5"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("n/a"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(5), "F");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn place_follows_header_positions() {
        let header = row(&["Title", "Post ID"]);
        let cols = Columns::resolve(Some(&header), &["Post ID", "Title"]);
        assert_eq!(
            place(&cols, vec!["p1".into(), "hello".into()]),
            row(&["hello", "p1"])
        );
    }
}
