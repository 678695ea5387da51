use std::sync::Arc;

use quiz_core::progress::{Achievement, ExerciseCompletion, LearnerProgress};
use storage::repository::ProgressRepository;

use crate::error::ProgressServiceError;

/// Learner progress, loaded once and saved whole after each change.
pub struct ProgressService {
    repo: Arc<dyn ProgressRepository>,
    progress: LearnerProgress,
}

/// What a completion changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// `false` when the exercise had already been completed.
    pub awarded: bool,
    pub points: u32,
    pub unlocked: Vec<Achievement>,
}

impl ProgressService {
    /// Read stored progress, or start fresh if none exists.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the repository fails.
    pub async fn load(repo: Arc<dyn ProgressRepository>) -> Result<Self, ProgressServiceError> {
        let progress = repo.load_progress().await?.unwrap_or_default();
        tracing::debug!(
            completed = progress.completed_exercises.len(),
            points = progress.points,
            "progress loaded"
        );
        Ok(Self { repo, progress })
    }

    #[must_use]
    pub fn progress(&self) -> &LearnerProgress {
        &self.progress
    }

    #[must_use]
    pub fn achievements(&self) -> Vec<Achievement> {
        self.progress.achievements()
    }

    /// Record an exercise completion and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if saving fails; the in-memory
    /// progress is left as it was.
    pub async fn complete_exercise(
        &mut self,
        completion: &ExerciseCompletion,
    ) -> Result<CompletionOutcome, ProgressServiceError> {
        let before = self.progress.achievements();
        let mut next = self.progress.clone();
        let awarded = next.complete_exercise(completion);
        if awarded {
            self.commit(next).await?;
        }
        let unlocked = self
            .progress
            .achievements()
            .into_iter()
            .filter(|achievement| !before.contains(achievement))
            .collect();
        Ok(CompletionOutcome {
            awarded,
            points: self.progress.points,
            unlocked,
        })
    }

    /// Deduct the solution-reveal penalty and persist. Returns the new total.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if saving fails.
    pub async fn reveal_solution(&mut self) -> Result<u32, ProgressServiceError> {
        let mut next = self.progress.clone();
        next.apply_solution_penalty();
        self.commit(next).await?;
        Ok(self.progress.points)
    }

    /// Erase all progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the repository fails.
    pub async fn reset(&mut self) -> Result<(), ProgressServiceError> {
        self.repo.clear_progress().await?;
        self.progress = LearnerProgress::default();
        tracing::info!("progress reset");
        Ok(())
    }

    async fn commit(&mut self, next: LearnerProgress) -> Result<(), ProgressServiceError> {
        self.repo.save_progress(&next).await?;
        self.progress = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::ExerciseId;
    use storage::repository::Storage;

    fn completion(id: u32, secs: i64, hints: u32) -> ExerciseCompletion {
        ExerciseCompletion::new(ExerciseId::new(id), 20, Duration::seconds(secs), hints).unwrap()
    }

    #[tokio::test]
    async fn completion_persists_and_reports_unlocks() {
        let storage = Storage::in_memory();
        let mut service = ProgressService::load(Arc::clone(&storage.progress))
            .await
            .unwrap();

        let outcome = service
            .complete_exercise(&completion(1, 120, 0))
            .await
            .unwrap();
        assert!(outcome.awarded);
        assert_eq!(outcome.points, 20);
        assert!(outcome.unlocked.contains(&Achievement::FirstSteps));
        assert!(outcome.unlocked.contains(&Achievement::SpeedCoder));

        let again = service
            .complete_exercise(&completion(1, 120, 0))
            .await
            .unwrap();
        assert!(!again.awarded);
        assert_eq!(again.points, 20);
        assert!(again.unlocked.is_empty());

        let reloaded = ProgressService::load(Arc::clone(&storage.progress))
            .await
            .unwrap();
        assert_eq!(reloaded.progress(), service.progress());
    }

    #[tokio::test]
    async fn reveal_penalty_floors_at_zero() {
        let storage = Storage::in_memory();
        let mut service = ProgressService::load(Arc::clone(&storage.progress))
            .await
            .unwrap();
        service
            .complete_exercise(&completion(2, 900, 1))
            .await
            .unwrap();
        assert_eq!(service.reveal_solution().await.unwrap(), 10);
        assert_eq!(service.reveal_solution().await.unwrap(), 0);
        assert_eq!(service.reveal_solution().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_clears_store() {
        let storage = Storage::in_memory();
        let mut service = ProgressService::load(Arc::clone(&storage.progress))
            .await
            .unwrap();
        service
            .complete_exercise(&completion(3, 60, 0))
            .await
            .unwrap();
        service.reset().await.unwrap();
        assert_eq!(service.progress(), &LearnerProgress::default());
        assert!(storage.progress.load_progress().await.unwrap().is_none());
    }
}
