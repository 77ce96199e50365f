//! Full pictionary sessions driven through the public registry API with
//! paused tokio time.

use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use partyhall_engine::{
    AdminDetail, CommandError, CreatorRef, EngineConfig, GuessOutcome, JoinRequest, ModeSnapshot,
    Origin, PictionaryConfig, SessionConfig, SessionEvent, SessionRegistry, SessionStatus,
    SharedRegistry, WordEntry,
};

fn test_registry() -> SharedRegistry {
    SessionRegistry::new(EngineConfig {
        tick_interval: None,
        ..EngineConfig::default()
    })
}

fn words(entries: &[&str]) -> Vec<WordEntry> {
    entries
        .iter()
        .map(|word| WordEntry {
            id: Uuid::new_v4(),
            word: word.to_string(),
            category: "test".to_string(),
            difficulty: "medium".to_string(),
        })
        .collect()
}

fn pictionary_config(rounds: u32, pool: &[&str], time_per_drawer: u64) -> SessionConfig {
    SessionConfig::Pictionary(PictionaryConfig {
        actual_rounds: rounds,
        time_per_round_secs: 60,
        time_per_drawer_secs: time_per_drawer,
        points_first_guess: 3,
        points_other_guess: 1,
        points_drawing_team: 1,
        word_pool: words(pool),
    })
}

async fn join(registry: &SessionRegistry, id: Uuid, name: &str, team: &str) -> Uuid {
    registry
        .join(id, JoinRequest {
            display_name: name.to_string(),
            team_name: team.to_string(),
        })
        .await
        .expect("join failed")
        .participant_id
}

async fn current_word(registry: &SessionRegistry, id: Uuid) -> String {
    let admin = registry
        .admin_snapshot(id, Origin::Admin)
        .await
        .expect("admin snapshot failed");
    match admin.detail {
        AdminDetail::Pictionary { word: Some(word), .. } => word,
        other => panic!("expected an active word, got {other:?}"),
    }
}

fn pictionary_snapshot(detail: &ModeSnapshot) -> &partyhall_engine::PictionarySnapshot {
    match detail {
        ModeSnapshot::Pictionary(snapshot) => snapshot,
        other => panic!("expected a pictionary snapshot, got {other:?}"),
    }
}

fn score_of(summary: &partyhall_engine::SessionSummary, team: &str) -> i32 {
    summary
        .team_totals
        .iter()
        .find(|entry| entry.team == team)
        .map(|entry| entry.score)
        .unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn three_team_scenario_scores_and_short_circuits() {
    let registry = test_registry();
    let session = registry
        .create(
            pictionary_config(1, &["soleil", "lune", "montagne"], 0),
            CreatorRef::Admin,
        )
        .unwrap();
    let _ada = join(&registry, session.id, "ada", "A").await;
    let grace = join(&registry, session.id, "grace", "B").await;
    let alan = join(&registry, session.id, "alan", "C").await;

    let started = registry.start(session.id, Origin::Admin).await.unwrap();
    // Teams joined in order A, B, C: round 0 drawing team is A.
    let snapshot = pictionary_snapshot(&started.detail);
    assert_eq!(snapshot.total_passages, 3);
    assert_eq!(snapshot.drawing_team.as_deref(), Some("A"));

    let word = current_word(&registry, session.id).await;

    // B guesses first: first-guess points for B, drawing points for A.
    let outcome = registry.guess(session.id, grace, &word).await.unwrap();
    assert_eq!(outcome, GuessOutcome::Correct { rank: 1, points: 3 });

    // A repeat guess from a found team is a no-op success.
    let repeat = registry.guess(session.id, grace, &word).await.unwrap();
    assert_eq!(repeat, GuessOutcome::AlreadyFound);

    // C guesses second: other-guess points for C, drawing points for A again.
    let outcome = registry.guess(session.id, alan, &word).await.unwrap();
    assert_eq!(outcome, GuessOutcome::Correct { rank: 2, points: 1 });

    let summary = registry.snapshot(session.id).await.unwrap();
    assert_eq!(score_of(&summary, "B"), 3);
    assert_eq!(score_of(&summary, "C"), 1);
    assert_eq!(score_of(&summary, "A"), 2);
    assert_eq!(
        pictionary_snapshot(&summary.detail).teams_found,
        vec!["B".to_string(), "C".to_string()]
    );

    // Both non-drawing teams found the word: the round short-circuits after
    // the celebratory delay.
    sleep(Duration::from_secs(4)).await;
    let summary = registry.snapshot(session.id).await.unwrap();
    assert_eq!(pictionary_snapshot(&summary.detail).round_index, 1);
    assert_eq!(
        pictionary_snapshot(&summary.detail).drawing_team.as_deref(),
        Some("B")
    );
}

#[tokio::test(start_paused = true)]
async fn each_team_draws_actual_rounds_times_in_cycle_order() {
    let registry = test_registry();
    let session = registry
        .create(
            pictionary_config(2, &["a", "b", "c", "d"], 0),
            CreatorRef::Admin,
        )
        .unwrap();
    join(&registry, session.id, "ada", "A").await;
    join(&registry, session.id, "grace", "B").await;

    let mut events = registry.subscribe(session.id).unwrap();
    registry.start(session.id, Origin::Admin).await.unwrap();

    // Skip every passage; collect the drawing team of each RoundStarted.
    let mut drawing_teams = Vec::new();
    for _ in 0..4 {
        loop {
            match events.recv().await.expect("event stream closed") {
                SessionEvent::RoundStarted { drawing_team, .. } => {
                    drawing_teams.push(drawing_team);
                    break;
                }
                _ => continue,
            }
        }
        registry.advance(session.id, Origin::Admin).await.unwrap();
    }

    // Each team draws exactly `actual_rounds` times, never twice within one
    // team-count-length cycle.
    assert_eq!(drawing_teams, vec!["A", "B", "A", "B"]);

    let summary = registry.snapshot(session.id).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn guesses_fold_case_and_diacritics() {
    let registry = test_registry();
    let session = registry
        .create(
            pictionary_config(1, &["Éléphant", "Château"], 0),
            CreatorRef::Admin,
        )
        .unwrap();
    join(&registry, session.id, "ada", "A").await;
    let grace = join(&registry, session.id, "grace", "B").await;

    registry.start(session.id, Origin::Admin).await.unwrap();

    let word = current_word(&registry, session.id).await;
    let folded = if word == "Éléphant" { "ELEPHANT" } else { "chateau" };

    let wrong = registry.guess(session.id, grace, "baguette").await.unwrap();
    assert_eq!(wrong, GuessOutcome::Incorrect);

    let outcome = registry.guess(session.id, grace, folded).await.unwrap();
    assert_eq!(outcome, GuessOutcome::Correct { rank: 1, points: 3 });
}

#[tokio::test(start_paused = true)]
async fn drawing_team_cannot_guess_its_own_word() {
    let registry = test_registry();
    let session = registry
        .create(pictionary_config(1, &["a", "b"], 0), CreatorRef::Admin)
        .unwrap();
    let ada = join(&registry, session.id, "ada", "A").await;
    join(&registry, session.id, "grace", "B").await;

    registry.start(session.id, Origin::Admin).await.unwrap();
    let word = current_word(&registry, session.id).await;

    let err = registry.guess(session.id, ada, &word).await.unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));
}

#[tokio::test(start_paused = true)]
async fn round_timeout_reveals_the_word_and_advances() {
    let registry = test_registry();
    let session = registry
        .create(pictionary_config(1, &["phare", "port"], 0), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "A").await;
    join(&registry, session.id, "grace", "B").await;

    let mut events = registry.subscribe(session.id).unwrap();
    registry.start(session.id, Origin::Admin).await.unwrap();
    let word = current_word(&registry, session.id).await;

    // Nobody guesses; the round timer expires.
    sleep(Duration::from_secs(61)).await;
    let revealed = loop {
        match events.recv().await.expect("event stream closed") {
            SessionEvent::WordRevealed { word, .. } => break word,
            _ => continue,
        }
    };
    assert_eq!(revealed, word);

    // The next passage opens after the reveal delay.
    sleep(Duration::from_secs(5)).await;
    let summary = registry.snapshot(session.id).await.unwrap();
    assert_eq!(pictionary_snapshot(&summary.detail).round_index, 1);
}

#[tokio::test(start_paused = true)]
async fn drawer_rotation_cycles_the_drawing_team_members() {
    let registry = test_registry();
    let session = registry
        .create(pictionary_config(1, &["a", "b"], 2), CreatorRef::Admin)
        .unwrap();
    let ada = join(&registry, session.id, "ada", "A").await;
    let alan = join(&registry, session.id, "alan", "A").await;
    join(&registry, session.id, "grace", "B").await;

    let mut events = registry.subscribe(session.id).unwrap();
    let started = registry.start(session.id, Origin::Admin).await.unwrap();
    assert_eq!(pictionary_snapshot(&started.detail).drawer, Some(ada));

    sleep(Duration::from_secs(2)).await;
    let drawer = loop {
        match events.recv().await.expect("event stream closed") {
            SessionEvent::DrawerRotated { drawer, .. } => break drawer,
            _ => continue,
        }
    };
    assert_eq!(drawer, alan);

    // The rotation wraps around without ending the round.
    sleep(Duration::from_secs(2)).await;
    let drawer = loop {
        match events.recv().await.expect("event stream closed") {
            SessionEvent::DrawerRotated { drawer, .. } => break drawer,
            _ => continue,
        }
    };
    assert_eq!(drawer, ada);
    let summary = registry.snapshot(session.id).await.unwrap();
    assert_eq!(pictionary_snapshot(&summary.detail).round_index, 0);
}

#[tokio::test(start_paused = true)]
async fn only_the_designated_uploader_saves_and_only_once() {
    let registry = test_registry();
    let session = registry
        .create(pictionary_config(1, &["a", "b"], 0), CreatorRef::Admin)
        .unwrap();
    let ada = join(&registry, session.id, "ada", "A").await;
    let alan = join(&registry, session.id, "alan", "A").await;
    let grace = join(&registry, session.id, "grace", "B").await;

    registry.start(session.id, Origin::Admin).await.unwrap();

    // Round 0: A draws. ada is A's first member by join order.
    let second_member = registry
        .save_drawing(session.id, alan, "data:image/png;nope")
        .await
        .unwrap();
    assert!(!second_member.stored);

    let guesser = registry
        .save_drawing(session.id, grace, "data:image/png;nope")
        .await
        .unwrap();
    assert!(!guesser.stored);

    let accepted = registry
        .save_drawing(session.id, ada, "data:image/png;round0")
        .await
        .unwrap();
    assert!(accepted.stored);

    let duplicate = registry
        .save_drawing(session.id, ada, "data:image/png;retry")
        .await
        .unwrap();
    assert!(!duplicate.stored);

    // Finish the session and check exactly one drawing survived.
    registry.advance(session.id, Origin::Admin).await.unwrap();
    registry.advance(session.id, Origin::Admin).await.unwrap();
    let outcome = registry.outcome(session.id).await.unwrap();
    assert_eq!(outcome.drawings.len(), 1);
    assert_eq!(outcome.drawings[0].image_data, "data:image/png;round0");
    assert_eq!(outcome.drawings[0].team, "A");
}

#[tokio::test(start_paused = true)]
async fn start_requires_two_teams_and_enough_words() {
    let registry = test_registry();

    let session = registry
        .create(pictionary_config(1, &["a", "b"], 0), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "A").await;
    let err = registry.start(session.id, Origin::Admin).await.unwrap_err();
    assert!(matches!(err, CommandError::PreconditionFailed(_)));

    // Three teams, one cycle = 3 passages, but only two words in the pool.
    let session = registry
        .create(pictionary_config(1, &["a", "b"], 0), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "A").await;
    join(&registry, session.id, "grace", "B").await;
    join(&registry, session.id, "alan", "C").await;
    let err = registry.start(session.id, Origin::Admin).await.unwrap_err();
    assert!(matches!(err, CommandError::PreconditionFailed(_)));
}

#[tokio::test(start_paused = true)]
async fn final_ranking_sorts_by_score_with_name_tiebreak() {
    let registry = test_registry();
    let session = registry
        .create(pictionary_config(1, &["a", "b", "c"], 0), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "A").await;
    let grace = join(&registry, session.id, "grace", "B").await;
    join(&registry, session.id, "alan", "C").await;

    registry.start(session.id, Origin::Admin).await.unwrap();

    // Only B scores in round 0, then every passage is skipped.
    let word = current_word(&registry, session.id).await;
    registry.guess(session.id, grace, &word).await.unwrap();
    for _ in 0..3 {
        registry.advance(session.id, Origin::Admin).await.unwrap();
    }

    let outcome = registry.outcome(session.id).await.unwrap();
    assert_eq!(outcome.ranking[0].team, "B");
    assert_eq!(outcome.ranking[0].rank, 1);
    assert_eq!(outcome.ranking[0].score, 3);
    // A earned drawing points; C never scored.
    assert_eq!(outcome.ranking[1].team, "A");
    assert_eq!(outcome.ranking[1].score, 1);
    assert_eq!(outcome.ranking[2].team, "C");
    assert_eq!(outcome.ranking[2].score, 0);
}
