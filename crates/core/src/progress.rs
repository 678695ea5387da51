//! Learner progress kept across sessions and page loads.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ExerciseId;

/// Points removed when a learner reveals an exercise solution.
pub const SOLUTION_PENALTY: u32 = 10;

/// Completions faster than this count toward the speed achievement.
pub const FAST_COMPLETION_SECS: i64 = 5 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("exercise must award at least one point")]
    ZeroPoints,
}

/// Persisted progress object (`completedExercises`, `points`, `streak`, ...).
///
/// Always read and written as a whole; fields missing from older objects fall
/// back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerProgress {
    pub completed_exercises: Vec<ExerciseId>,
    pub points: u32,
    pub streak: u32,
    pub level: u32,
    pub fast_completions: u32,
    pub perfect_completions: u32,
}

impl Default for LearnerProgress {
    fn default() -> Self {
        Self {
            completed_exercises: Vec::new(),
            points: 0,
            streak: 0,
            level: 1,
            fast_completions: 0,
            perfect_completions: 0,
        }
    }
}

/// Facts about one finished exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseCompletion {
    exercise_id: ExerciseId,
    points: u32,
    elapsed: Duration,
    hints_used: u32,
}

impl ExerciseCompletion {
    /// # Errors
    ///
    /// Returns `ProgressError::ZeroPoints` if the exercise is worth nothing.
    pub fn new(
        exercise_id: ExerciseId,
        points: u32,
        elapsed: Duration,
        hints_used: u32,
    ) -> Result<Self, ProgressError> {
        if points == 0 {
            return Err(ProgressError::ZeroPoints);
        }
        Ok(Self {
            exercise_id,
            points,
            elapsed,
            hints_used,
        })
    }

    #[must_use]
    pub fn exercise_id(&self) -> ExerciseId {
        self.exercise_id
    }

    #[must_use]
    pub fn is_fast(&self) -> bool {
        self.elapsed < Duration::seconds(FAST_COMPLETION_SECS)
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.hints_used == 0
    }
}

impl LearnerProgress {
    #[must_use]
    pub fn is_completed(&self, id: ExerciseId) -> bool {
        self.completed_exercises.contains(&id)
    }

    /// Record a completion. Points and counters are awarded only the first
    /// time an exercise is completed; returns whether anything changed.
    pub fn complete_exercise(&mut self, completion: &ExerciseCompletion) -> bool {
        if self.is_completed(completion.exercise_id) {
            return false;
        }
        self.completed_exercises.push(completion.exercise_id);
        self.points = self.points.saturating_add(completion.points);
        if completion.is_fast() {
            self.fast_completions = self.fast_completions.saturating_add(1);
        }
        if completion.is_perfect() {
            self.perfect_completions = self.perfect_completions.saturating_add(1);
        }
        true
    }

    /// Apply the solution-reveal penalty; never goes below zero.
    pub fn apply_solution_penalty(&mut self) {
        self.points = self.points.saturating_sub(SOLUTION_PENALTY);
    }

    /// Achievements whose condition currently holds.
    #[must_use]
    pub fn achievements(&self) -> Vec<Achievement> {
        Achievement::ALL
            .iter()
            .copied()
            .filter(|achievement| achievement.is_unlocked(self))
            .collect()
    }
}

/// Badges derived from progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstSteps,
    PythonMaster,
    SpeedCoder,
    Perfectionist,
    StreakWarrior,
}

impl Achievement {
    pub const ALL: [Achievement; 5] = [
        Achievement::FirstSteps,
        Achievement::PythonMaster,
        Achievement::SpeedCoder,
        Achievement::Perfectionist,
        Achievement::StreakWarrior,
    ];

    #[must_use]
    pub fn is_unlocked(self, progress: &LearnerProgress) -> bool {
        match self {
            Achievement::FirstSteps => !progress.completed_exercises.is_empty(),
            Achievement::PythonMaster => progress.completed_exercises.len() >= 5,
            Achievement::SpeedCoder => progress.fast_completions >= 1,
            Achievement::Perfectionist => progress.perfect_completions >= 3,
            Achievement::StreakWarrior => progress.streak >= 7,
        }
    }

    /// Bonus points advertised for the badge.
    #[must_use]
    pub fn points(self) -> u32 {
        match self {
            Achievement::FirstSteps => 25,
            Achievement::PythonMaster => 100,
            Achievement::SpeedCoder => 50,
            Achievement::Perfectionist => 75,
            Achievement::StreakWarrior => 200,
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Achievement::FirstSteps => "First Steps",
            Achievement::PythonMaster => "Python Master",
            Achievement::SpeedCoder => "Speed Coder",
            Achievement::Perfectionist => "Perfectionist",
            Achievement::StreakWarrior => "Streak Warrior",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(id: u32, points: u32, secs: i64, hints: u32) -> ExerciseCompletion {
        ExerciseCompletion::new(ExerciseId::new(id), points, Duration::seconds(secs), hints)
            .unwrap()
    }

    #[test]
    fn completing_twice_awards_once() {
        let mut progress = LearnerProgress::default();
        assert!(progress.complete_exercise(&completion(1, 50, 600, 1)));
        assert!(!progress.complete_exercise(&completion(1, 50, 600, 1)));
        assert_eq!(progress.points, 50);
        assert_eq!(progress.completed_exercises, vec![ExerciseId::new(1)]);
    }

    #[test]
    fn penalty_saturates_at_zero() {
        let mut progress = LearnerProgress {
            points: 4,
            ..LearnerProgress::default()
        };
        progress.apply_solution_penalty();
        assert_eq!(progress.points, 0);
    }

    #[test]
    fn achievements_follow_counters() {
        let mut progress = LearnerProgress::default();
        assert!(progress.achievements().is_empty());

        progress.complete_exercise(&completion(1, 50, 120, 0));
        let unlocked = progress.achievements();
        assert!(unlocked.contains(&Achievement::FirstSteps));
        assert!(unlocked.contains(&Achievement::SpeedCoder));
        assert!(!unlocked.contains(&Achievement::Perfectionist));

        for id in 2..=5 {
            progress.complete_exercise(&completion(id, 10, 900, 0));
        }
        let unlocked = progress.achievements();
        assert!(unlocked.contains(&Achievement::PythonMaster));
        assert!(unlocked.contains(&Achievement::Perfectionist));
        assert!(!unlocked.contains(&Achievement::StreakWarrior));
    }

    #[test]
    fn zero_point_completion_is_rejected() {
        let err = ExerciseCompletion::new(ExerciseId::new(1), 0, Duration::zero(), 0).unwrap_err();
        assert_eq!(err, ProgressError::ZeroPoints);
    }

    #[test]
    fn partial_objects_load_with_defaults() {
        let progress: LearnerProgress =
            serde_json::from_str(r#"{"completedExercises":[1,2],"points":75}"#).unwrap();
        assert_eq!(progress.completed_exercises.len(), 2);
        assert_eq!(progress.points, 75);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.streak, 0);

        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"completedExercises\":[1,2]"));
        assert!(json.contains("\"fastCompletions\":0"));
    }
}
