//! ROI scoring and grading for published posts.

use crate::app_config::GradeThreshold;

/// Grade returned when no threshold matches.
pub const FALLBACK_GRADE: &str = "F";

/// The default ladder as `(min_avg_upvotes, grade)` pairs, highest first.
pub const DEFAULT_GRADE_THRESHOLDS: [(f64, &str); 4] = [(5.0, "A"), (2.0, "B"), (0.5, "C"), (0.0, "D")];

/// Comments are weighted more heavily than upvotes.
#[must_use]
pub fn roi_score(upvotes: u64, comments: u64) -> u64 {
    upvotes.saturating_mul(2).saturating_add(comments.saturating_mul(5))
}

/// Walks the ladder from the highest threshold down and returns the first
/// grade whose threshold `avg_upvotes` reaches.
///
/// `ladder` must be sorted highest first, as produced by config loading.
#[must_use]
pub fn grade_for(avg_upvotes: f64, ladder: &[GradeThreshold]) -> String {
    ladder
        .iter()
        .find(|t| avg_upvotes >= t.min_avg_upvotes)
        .map_or_else(|| FALLBACK_GRADE.to_string(), |t| t.grade.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_ladder() -> Vec<GradeThreshold> {
        DEFAULT_GRADE_THRESHOLDS
            .iter()
            .map(|(min, grade)| GradeThreshold {
                min_avg_upvotes: *min,
                grade: (*grade).to_string(),
            })
            .collect()
    }

    #[test]
    fn roi_weights_comments_over_upvotes() {
        assert_eq!(roi_score(0, 0), 0);
        assert_eq!(roi_score(3, 0), 6);
        assert_eq!(roi_score(0, 3), 15);
        assert_eq!(roi_score(10, 4), 40);
    }

    #[test]
    fn roi_saturates_instead_of_overflowing() {
        assert_eq!(roi_score(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn grade_boundaries_are_inclusive() {
        let ladder = default_ladder();
        assert_eq!(grade_for(5.0, &ladder), "A");
        assert_eq!(grade_for(4.99, &ladder), "B");
        assert_eq!(grade_for(2.0, &ladder), "B");
        assert_eq!(grade_for(0.5, &ladder), "C");
        assert_eq!(grade_for(0.0, &ladder), "D");
    }

    #[test]
    fn below_every_threshold_falls_back_to_f() {
        assert_eq!(grade_for(-1.0, &default_ladder()), "F");
        assert_eq!(grade_for(10.0, &[]), "F");
    }
}
