use quiz_core::model::ExerciseId;
use quiz_core::progress::LearnerProgress;
use storage::repository::{
    CredentialRepository, KeyValueStore, PROGRESS_KEY, ProgressRepository, Storage,
};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_replaces_progress_whole() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let first = LearnerProgress {
        completed_exercises: vec![ExerciseId::new(1)],
        points: 50,
        ..LearnerProgress::default()
    };
    repo.save_progress(&first).await.unwrap();

    let second = LearnerProgress {
        completed_exercises: vec![ExerciseId::new(1), ExerciseId::new(2)],
        points: 125,
        streak: 1,
        ..LearnerProgress::default()
    };
    repo.save_progress(&second).await.unwrap();

    let loaded = repo.load_progress().await.unwrap().expect("progress stored");
    assert_eq!(loaded, second);

    repo.clear_progress().await.unwrap();
    assert!(repo.get(PROGRESS_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    repo.put("k", "v1").await.unwrap();
    repo.put("k", "v2").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v2"));
}

#[tokio::test]
async fn storage_facade_keeps_token() {
    let storage = Storage::sqlite("sqlite:file:memdb_token?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage.credentials.save_token("secret-token").await.unwrap();
    assert_eq!(
        storage.credentials.load_token().await.unwrap().as_deref(),
        Some("secret-token")
    );
    storage.credentials.clear_token().await.unwrap();
    assert!(storage.credentials.load_token().await.unwrap().is_none());
}
