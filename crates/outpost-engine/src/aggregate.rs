//! Per-community aggregates, rebuilt from scratch from the performance view.

use chrono::NaiveDate;
use outpost_core::{grade_for, CommunityAggregate, GradeThreshold, PerformanceRecord};

/// Group `records` by community (first-seen order) and compute every
/// aggregate field from the group alone. Records without a community are
/// ignored.
///
/// Community names match case-insensitively, the same way the ledger locates
/// aggregate rows; each group keeps the first spelling seen.
#[must_use]
pub fn compute_aggregates(
    records: &[PerformanceRecord],
    thresholds: &[GradeThreshold],
    today: NaiveDate,
) -> Vec<CommunityAggregate> {
    let mut groups: Vec<(String, &str, Vec<&PerformanceRecord>)> = Vec::new();
    for record in records.iter().filter(|r| !r.community.trim().is_empty()) {
        let key = record.community.trim().to_lowercase();
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, members)) => members.push(record),
            None => groups.push((key, record.community.trim(), vec![record])),
        }
    }

    groups
        .into_iter()
        .map(|(_, community, members)| aggregate(community, &members, thresholds, today))
        .collect()
}

fn aggregate(
    community: &str,
    members: &[&PerformanceRecord],
    thresholds: &[GradeThreshold],
    today: NaiveDate,
) -> CommunityAggregate {
    let post_count = members.len();
    let total_upvotes: u64 = members.iter().map(|r| r.upvotes).sum();
    let total_comments: u64 = members.iter().map(|r| r.comments).sum();

    #[allow(clippy::cast_precision_loss)]
    let (avg_upvotes, avg_comments) = (
        total_upvotes as f64 / post_count as f64,
        total_comments as f64 / post_count as f64,
    );

    // Ties keep the earlier row.
    let best_post = members
        .iter()
        .copied()
        .fold(None::<&PerformanceRecord>, |best, r| match best {
            Some(b) if b.roi_score >= r.roi_score => Some(b),
            _ => Some(r),
        })
        .map(|r| r.post_id.clone())
        .unwrap_or_default();

    CommunityAggregate {
        community: community.to_string(),
        post_count,
        total_upvotes,
        total_comments,
        avg_upvotes,
        avg_comments,
        best_post,
        grade: grade_for(avg_upvotes, thresholds),
        computed_on: today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PollerSettings;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn rec(id: &str, community: &str, up: u64, co: u64) -> PerformanceRecord {
        PerformanceRecord::new(id, community, "t", up, co, day())
    }

    #[test]
    fn groups_in_first_seen_order_with_totals() {
        let records = vec![
            rec("a", "mcp", 10, 1),
            rec("b", "finance", 1, 0),
            rec("c", "mcp", 2, 3),
        ];
        let aggs = compute_aggregates(&records, &PollerSettings::default().grade_thresholds, day());
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].community, "mcp");
        assert_eq!(aggs[0].post_count, 2);
        assert_eq!(aggs[0].total_upvotes, 12);
        assert_eq!(aggs[0].total_comments, 4);
        assert!((aggs[0].avg_upvotes - 6.0).abs() < f64::EPSILON);
        assert_eq!(aggs[0].grade, "A");
        assert_eq!(aggs[1].community, "finance");
        assert_eq!(aggs[1].grade, "C");
    }

    #[test]
    fn average_is_total_over_count() {
        let records = vec![
            rec("a", "x", 1, 0),
            rec("b", "x", 2, 0),
            rec("c", "x", 4, 7),
        ];
        let agg = &compute_aggregates(&records, &[], day())[0];
        #[allow(clippy::cast_precision_loss)]
        let expected = agg.total_upvotes as f64 / agg.post_count as f64;
        assert!((agg.avg_upvotes - expected).abs() < f64::EPSILON);
        assert_eq!(agg.grade, "F");
    }

    #[test]
    fn best_post_is_highest_roi_with_earliest_tie() {
        // roi: a = 10, b = 10, c = 5
        let records = vec![rec("a", "x", 5, 0), rec("b", "x", 0, 2), rec("c", "x", 0, 1)];
        let agg = &compute_aggregates(&records, &[], day())[0];
        assert_eq!(agg.best_post, "a");

        let records = vec![rec("a", "x", 1, 0), rec("b", "x", 0, 1)];
        assert_eq!(compute_aggregates(&records, &[], day())[0].best_post, "b");
    }

    #[test]
    fn community_names_differing_only_in_case_share_one_aggregate() {
        let records = vec![
            rec("p1", "MCP", 10, 0),
            rec("p2", "MCP", 10, 0),
            rec("p9", "mcp", 1, 0),
            rec("p3", " Finance", 1, 0),
            rec("p4", "finance", 0, 0),
        ];
        let aggs = compute_aggregates(&records, &[], day());

        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].community, "MCP");
        assert_eq!(aggs[0].post_count, 3);
        assert_eq!(aggs[0].total_upvotes, 21);
        assert_eq!(aggs[0].best_post, "p1");
        assert_eq!(aggs[1].community, "Finance");
        assert_eq!(aggs[1].post_count, 2);
    }

    #[test]
    fn blank_community_is_ignored() {
        let records = vec![rec("a", " ", 5, 0)];
        assert!(compute_aggregates(&records, &[], day()).is_empty());
    }
}
