//! Derived score statistics.
//!
//! Nothing here holds counters of its own: every figure is recomputed from the
//! ordered results of a session, so totals cannot drift from the answers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::SubmissionResult;

/// Read-only statistics over a session's results.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBoard<'a> {
    results: &'a [SubmissionResult],
}

impl<'a> ScoreBoard<'a> {
    #[must_use]
    pub fn new(results: &'a [SubmissionResult]) -> Self {
        Self { results }
    }

    #[must_use]
    pub fn answered(&self) -> usize {
        self.results.len()
    }

    /// Sum of awarded scores.
    #[must_use]
    pub fn total_score(&self) -> f64 {
        self.results.iter().map(SubmissionResult::score).sum()
    }

    /// Sum of attainable scores over the answered questions.
    #[must_use]
    pub fn max_score(&self) -> f64 {
        self.results
            .iter()
            .map(|result| f64::from(result.max_score()))
            .sum()
    }

    /// Percentage in `[0, 100]`; `0` when nothing has been answered.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        let max = self.max_score();
        if max <= 0.0 {
            return 0.0;
        }
        (100.0 * self.total_score() / max).clamp(0.0, 100.0)
    }

    #[must_use]
    pub fn tier(&self) -> PerformanceTier {
        PerformanceTier::from_percentage(self.percentage())
    }

    /// Multiple-choice answers judged correct.
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.is_correct() == Some(true))
            .count()
    }

    /// Multiple-choice answers judged incorrect.
    #[must_use]
    pub fn incorrect_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.is_correct() == Some(false))
            .count()
    }
}

/// Qualitative bucket of a percentage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Exceptional,
    Good,
    Fair,
    Weak,
    Poor,
}

impl PerformanceTier {
    /// Thresholds: ≥90, ≥75, ≥60, ≥40, below.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Exceptional
        } else if percentage >= 75.0 {
            Self::Good
        } else if percentage >= 60.0 {
            Self::Fair
        } else if percentage >= 40.0 {
            Self::Weak
        } else {
            Self::Poor
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exceptional => "exceptional",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Weak => "weak",
            Self::Poor => "poor",
        }
    }

    /// Message shown on the results screen.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Exceptional => "Excellent! You have mastered these concepts.",
            Self::Good => "Very good! A few small gaps left to fill.",
            Self::Fair => "Not bad! Keep studying to sharpen your knowledge.",
            Self::Weak => "There is progress to make, but don't get discouraged!",
            Self::Poor => "Time to review the basics. Practice makes perfect!",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionId, Verdict};

    fn graded(id: u64, score: f64) -> SubmissionResult {
        SubmissionResult::new(
            QuestionId::new(id),
            score,
            10,
            Verdict::Graded {
                percentage: score * 10.0,
                similarity: 0.5,
                feedback: "ok".into(),
                technical_terms_found: Vec::new(),
                technical_bonus: 0,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_board_is_zero_percent() {
        let board = ScoreBoard::new(&[]);
        assert_eq!(board.max_score(), 0.0);
        assert_eq!(board.percentage(), 0.0);
        assert_eq!(board.tier(), PerformanceTier::Poor);
    }

    #[test]
    fn three_question_scenario_is_fair() {
        let results = vec![graded(1, 8.0), graded(2, 10.0), graded(3, 0.0)];
        let board = ScoreBoard::new(&results);
        assert_eq!(board.total_score(), 18.0);
        assert_eq!(board.max_score(), 30.0);
        assert_eq!(board.percentage(), 60.0);
        assert_eq!(PerformanceTier::from_percentage(60.0), PerformanceTier::Fair);
        assert_eq!(board.tier().to_string(), "fair");
    }

    #[test]
    fn tier_thresholds_are_inclusive() {
        assert_eq!(PerformanceTier::from_percentage(100.0), PerformanceTier::Exceptional);
        assert_eq!(PerformanceTier::from_percentage(90.0), PerformanceTier::Exceptional);
        assert_eq!(PerformanceTier::from_percentage(89.9), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_percentage(75.0), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_percentage(59.99), PerformanceTier::Weak);
        assert_eq!(PerformanceTier::from_percentage(40.0), PerformanceTier::Weak);
        assert_eq!(PerformanceTier::from_percentage(39.0), PerformanceTier::Poor);
    }

    #[test]
    fn percentage_stays_in_bounds() {
        let results = vec![graded(1, 10.0), graded(2, 10.0)];
        let board = ScoreBoard::new(&results);
        assert_eq!(board.percentage(), 100.0);
        assert_eq!(board.correct_count(), 0);
        assert_eq!(board.incorrect_count(), 0);
    }
}
