mod helpers;

use helpers::{date, pacific, record, spawn_service};
use hooter::streak::machine::Transition;
use hooter::streak::notify::Outcome;
use hooter::streak::session::{SessionEvent, SessionOutcome};
use hooter::streak::store::StreakStore;
use hooter::streak::Population;
use tempfile::TempDir;

fn seed(path: &std::path::Path, user_id: &str, rec: hooter::streak::StreakRecord) {
    let mut pop = Population::new();
    pop.insert(user_id.to_string(), rec);
    StreakStore::new(path).save(&pop).unwrap();
}

#[tokio::test]
async fn new_user_first_qualifying_session_starts_streak() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    let (handle, task, sink) = spawn_service(&path);

    let join = pacific(2024, 6, 3, 21, 0);
    handle.handle_event(SessionEvent::enter("1", "ann", join)).await.unwrap();
    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", join + chrono::Duration::minutes(35)))
        .await
        .unwrap();

    assert_eq!(out, SessionOutcome::Increased { current: 1, longest: 1 });
    let rec = handle.get_record("1").await.unwrap().unwrap();
    assert_eq!((rec.current_streak, rec.longest_streak), (1, 1));
    assert_eq!(rec.last_join_date, Some(date(2024, 6, 3)));

    let sent = sink.notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].outcome, Outcome::Increased);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn session_day_after_last_credit_increments() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    seed(&path, "1", record("ann", 4, 4, Some(date(2024, 6, 2))));
    let (handle, task, _sink) = spawn_service(&path);

    let join = pacific(2024, 6, 3, 20, 0);
    handle.handle_event(SessionEvent::enter("1", "ann", join)).await.unwrap();
    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", join + chrono::Duration::minutes(30)))
        .await
        .unwrap();

    assert_eq!(out, SessionOutcome::Increased { current: 5, longest: 5 });

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn session_after_gap_resets_keeping_longest() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    seed(&path, "1", record("ann", 6, 8, Some(date(2024, 5, 31))));
    let (handle, task, sink) = spawn_service(&path);

    let join = pacific(2024, 6, 3, 20, 0);
    handle.handle_event(SessionEvent::enter("1", "ann", join)).await.unwrap();
    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", join + chrono::Duration::minutes(30)))
        .await
        .unwrap();

    assert_eq!(
        out,
        SessionOutcome::Maintained {
            current: 1,
            longest: 8,
            transition: Transition::Reset
        }
    );
    let rec = handle.get_record("1").await.unwrap().unwrap();
    assert_eq!((rec.current_streak, rec.longest_streak), (1, 8));
    assert_eq!(sink.notifications()[0].detail.as_deref(), Some("reset"));

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn short_session_does_not_touch_streak() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    seed(&path, "1", record("ann", 2, 3, Some(date(2024, 6, 2))));
    let (handle, task, sink) = spawn_service(&path);

    let join = pacific(2024, 6, 3, 20, 0);
    handle.handle_event(SessionEvent::enter("1", "ann", join)).await.unwrap();
    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", join + chrono::Duration::minutes(10)))
        .await
        .unwrap();

    assert_eq!(out, SessionOutcome::TooShort { current: 2, longest: 3, minutes: 10 });
    let rec = handle.get_record("1").await.unwrap().unwrap();
    assert_eq!(rec.current_streak, 2);
    assert_eq!(rec.last_join_date, Some(date(2024, 6, 2)));
    assert!(rec.join_time.is_none());
    assert_eq!(sink.notifications()[0].outcome, Outcome::TooShort);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn second_session_same_day_is_maintained() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    let (handle, task, sink) = spawn_service(&path);

    let morning = pacific(2024, 6, 3, 9, 0);
    let evening = pacific(2024, 6, 3, 21, 0);
    for start in [morning, evening] {
        handle.handle_event(SessionEvent::enter("1", "ann", start)).await.unwrap();
        handle
            .handle_event(SessionEvent::leave("1", "ann", start + chrono::Duration::minutes(40)))
            .await
            .unwrap();
    }

    let rec = handle.get_record("1").await.unwrap().unwrap();
    assert_eq!((rec.current_streak, rec.longest_streak), (1, 1));

    let outcomes: Vec<Outcome> = sink.notifications().iter().map(|n| n.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Increased, Outcome::Maintained]);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn leave_without_join_is_a_logged_no_op() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    seed(&path, "1", record("ann", 2, 3, Some(date(2024, 6, 2))));
    let (handle, task, sink) = spawn_service(&path);

    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", pacific(2024, 6, 3, 20, 0)))
        .await
        .unwrap();

    assert_eq!(out, SessionOutcome::NoOpenSession);
    assert_eq!(
        handle.get_record("1").await.unwrap().unwrap(),
        record("ann", 2, 3, Some(date(2024, 6, 2)))
    );
    assert!(sink.notifications().is_empty());

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn date_regression_is_reported_and_session_cleared() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    seed(&path, "1", record("ann", 2, 3, Some(date(2024, 6, 10))));
    let (handle, task, sink) = spawn_service(&path);

    let join = pacific(2024, 6, 3, 20, 0);
    handle.handle_event(SessionEvent::enter("1", "ann", join)).await.unwrap();
    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", join + chrono::Duration::minutes(30)))
        .await
        .unwrap();

    assert!(matches!(out, SessionOutcome::Anomaly { current: 2, longest: 3, .. }));
    let rec = handle.get_record("1").await.unwrap().unwrap();
    assert!(rec.join_time.is_none());
    assert_eq!(rec.last_join_date, Some(date(2024, 6, 10)));
    assert_eq!(sink.notifications()[0].outcome, Outcome::Anomaly);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn open_session_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("streaks.json");
    let join = pacific(2024, 6, 3, 20, 0);

    let (handle, task, _) = spawn_service(&path);
    handle.handle_event(SessionEvent::enter("1", "ann", join)).await.unwrap();
    handle.shutdown().await;
    task.await.unwrap();

    // Shutdown leaves the session open rather than inventing a leave.
    let on_disk = StreakStore::new(&path).get_record("1").unwrap().unwrap();
    assert_eq!(on_disk.join_time, Some(join));

    let (handle, task, _) = spawn_service(&path);
    let out = handle
        .handle_event(SessionEvent::leave("1", "ann", join + chrono::Duration::minutes(45)))
        .await
        .unwrap();
    assert_eq!(out, SessionOutcome::Increased { current: 1, longest: 1 });
    handle.shutdown().await;
    task.await.unwrap();
}
