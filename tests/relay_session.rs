//! Full relay sessions driven through the public registry API with paused
//! tokio time.

use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use partyhall_engine::{
    CommandError, CreatorRef, EngineConfig, JoinRequest, ModeSnapshot, ObservedSource, Origin,
    ReferenceImage, RelayConfig, RelayPhase, SessionConfig, SessionEvent, SessionRegistry,
    SessionStatus, SharedRegistry,
};

const OBSERVATION_SECS: u64 = 5;
const DRAWING_SECS: u64 = 10;

fn test_registry() -> SharedRegistry {
    SessionRegistry::new(EngineConfig {
        tick_interval: None,
        ..EngineConfig::default()
    })
}

fn references(count: usize) -> Vec<ReferenceImage> {
    (0..count)
        .map(|index| ReferenceImage {
            id: Uuid::new_v4(),
            name: format!("reference {index}"),
            image_url: format!("https://bank.example/ref-{index}.png"),
            category: "test".to_string(),
        })
        .collect()
}

fn relay_config(passages: u32, pool: usize) -> SessionConfig {
    SessionConfig::Relay(RelayConfig {
        passages,
        observation_secs: OBSERVATION_SECS,
        drawing_secs: DRAWING_SECS,
        reference_pool: references(pool),
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

fn relay_snapshot(detail: &ModeSnapshot) -> &partyhall_engine::RelaySnapshot {
    match detail {
        ModeSnapshot::Relay(snapshot) => snapshot,
        other => panic!("expected a relay snapshot, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn four_teams_four_passages_produce_sixteen_drawings_and_four_chains() -> anyhow::Result<()>
{
    let registry = test_registry();
    let session = registry.create(relay_config(4, 5), CreatorRef::Admin)?;

    let teams = ["T0", "T1", "T2", "T3"];
    let mut members = Vec::new();
    for (index, team) in teams.iter().enumerate() {
        members.push(join(&registry, session.id, &format!("player{index}"), team).await);
    }

    registry.start(session.id, Origin::Admin).await?;

    for round in 0..4 {
        let summary = registry.snapshot(session.id).await?;
        let snapshot = relay_snapshot(&summary.detail);
        assert_eq!(snapshot.round_index, round);
        assert_eq!(snapshot.phase, Some(RelayPhase::Observation));

        // Assignments are a bijection every round.
        let mut chains: Vec<usize> = snapshot
            .assignments
            .iter()
            .map(|assignment| assignment.chain)
            .collect();
        chains.sort_unstable();
        assert_eq!(chains, vec![0, 1, 2, 3]);

        sleep(Duration::from_secs(OBSERVATION_SECS)).await;
        let summary = registry.snapshot(session.id).await?;
        assert_eq!(
            relay_snapshot(&summary.detail).phase,
            Some(RelayPhase::Drawing)
        );

        for (index, member) in members.iter().enumerate() {
            let receipt = registry
                .save_drawing(
                    session.id,
                    *member,
                    format!("data:image/png;{}-round{round}", teams[index]),
                )
                .await?;
            assert!(receipt.stored);
        }

        sleep(Duration::from_secs(DRAWING_SECS)).await;
    }

    let summary = registry.snapshot(session.id).await?;
    assert_eq!(summary.status, SessionStatus::Finished);

    let outcome = registry.outcome(session.id).await?;
    assert_eq!(outcome.drawings.len(), 16);
    assert!(outcome.ranking.is_empty());

    let chains = outcome.chains.expect("relay outcome carries chains");
    assert_eq!(chains.len(), 4);
    for chain in &chains {
        assert_eq!(chain.links.len(), 4);
        for (round, link) in chain.links.iter().enumerate() {
            // Holder of chain c at round r = holder at round 0 advanced r
            // positions around the team ring.
            assert_eq!(link.team, teams[(chain.chain + round) % teams.len()]);
            assert_eq!(
                link.image_data.as_deref(),
                Some(format!("data:image/png;{}-round{round}", link.team).as_str())
            );
        }
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn each_round_observes_the_previous_holders_drawing() {
    let registry = test_registry();
    let session = registry
        .create(relay_config(2, 4), CreatorRef::Admin)
        .unwrap();

    let teams = ["T0", "T1", "T2"];
    let mut members = Vec::new();
    for (index, team) in teams.iter().enumerate() {
        members.push(join(&registry, session.id, &format!("player{index}"), team).await);
    }

    registry.start(session.id, Origin::Admin).await.unwrap();

    // Round 0 observes the original references.
    let summary = registry.snapshot(session.id).await.unwrap();
    for assignment in &relay_snapshot(&summary.detail).assignments {
        assert!(matches!(
            assignment.observed,
            ObservedSource::Reference { .. }
        ));
    }

    sleep(Duration::from_secs(OBSERVATION_SECS)).await;
    for (index, member) in members.iter().enumerate() {
        registry
            .save_drawing(session.id, *member, format!("drawing-{}", teams[index]))
            .await
            .unwrap();
    }
    sleep(Duration::from_secs(DRAWING_SECS)).await;

    // Round 1: every team observes the drawing made by the previous holder
    // of its chain, i.e. the team one position behind on the ring.
    let summary = registry.snapshot(session.id).await.unwrap();
    let snapshot = relay_snapshot(&summary.detail);
    assert_eq!(snapshot.round_index, 1);
    for (team_index, team) in teams.iter().enumerate() {
        let assignment = snapshot
            .assignments
            .iter()
            .find(|assignment| assignment.team == *team)
            .expect("assignment for every team");
        let previous = teams[(team_index + teams.len() - 1) % teams.len()];
        match &assignment.observed {
            ObservedSource::Drawing { round, team, image_data } => {
                assert_eq!(*round, 0);
                assert_eq!(team, previous);
                assert_eq!(image_data, &format!("drawing-{previous}"));
            }
            other => panic!("expected a drawing source, got {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn missing_drawing_falls_back_to_the_reference() {
    let registry = test_registry();
    let session = registry
        .create(relay_config(2, 3), CreatorRef::Admin)
        .unwrap();

    let t0 = join(&registry, session.id, "ada", "T0").await;
    let _t1 = join(&registry, session.id, "grace", "T1").await;

    registry.start(session.id, Origin::Admin).await.unwrap();
    sleep(Duration::from_secs(OBSERVATION_SECS)).await;

    // Only T0 saves; T1's chain loses its round-0 drawing.
    registry
        .save_drawing(session.id, t0, "drawing-T0")
        .await
        .unwrap();
    sleep(Duration::from_secs(DRAWING_SECS)).await;

    let summary = registry.snapshot(session.id).await.unwrap();
    let snapshot = relay_snapshot(&summary.detail);
    assert_eq!(snapshot.round_index, 1);
    for assignment in &snapshot.assignments {
        match (assignment.team.as_str(), &assignment.observed) {
            // T1 holds T0's chain and sees T0's drawing.
            ("T1", ObservedSource::Drawing { team, .. }) => assert_eq!(team, "T0"),
            // T0 holds T1's chain; with no drawing it falls back to the
            // original reference.
            ("T0", ObservedSource::Reference { .. }) => {}
            (team, other) => panic!("unexpected source for {team}: {other:?}"),
        }
    }

    sleep(Duration::from_secs(OBSERVATION_SECS + DRAWING_SECS)).await;
    let outcome = registry.outcome(session.id).await.unwrap();
    let chains = outcome.chains.expect("relay outcome carries chains");
    let holed: Vec<_> = chains
        .iter()
        .flat_map(|chain| chain.links.iter())
        .filter(|link| link.image_data.is_none())
        .collect();
    // Three empty slots: T1 round 0 plus both teams in round 1.
    assert_eq!(holed.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn only_the_room_master_or_admin_starts_a_relay_lobby() {
    let registry = test_registry();

    // The room master creates the lobby and joins in the same breath.
    let created = registry
        .create_as_master(relay_config(1, 2), JoinRequest {
            display_name: "ada".to_string(),
            team_name: "T0".to_string(),
        })
        .await
        .unwrap();
    let session_id = created.session.id;
    let master = created.participant_id;
    let other = join(&registry, session_id, "grace", "T1").await;

    let err = registry
        .start(session_id, Origin::Participant(other))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    let started = registry
        .start(session_id, Origin::Participant(master))
        .await
        .unwrap();
    assert_eq!(started.status, SessionStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn late_joins_are_rejected_while_playing() {
    let registry = test_registry();
    let session = registry
        .create(relay_config(1, 2), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "T0").await;
    join(&registry, session.id, "grace", "T1").await;
    registry.start(session.id, Origin::Admin).await.unwrap();

    let err = registry
        .join(session.id, JoinRequest {
            display_name: "late".to_string(),
            team_name: "T0".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidState(_)));
}

#[tokio::test(start_paused = true)]
async fn strokes_flow_only_during_the_drawing_phase() {
    let registry = test_registry();
    let session = registry
        .create(relay_config(1, 2), CreatorRef::Admin)
        .unwrap();
    let ada = join(&registry, session.id, "ada", "T0").await;
    join(&registry, session.id, "grace", "T1").await;

    let mut events = registry.subscribe(session.id).unwrap();
    registry.start(session.id, Origin::Admin).await.unwrap();

    // Observation phase: the canvas is locked, strokes are dropped.
    registry
        .stroke(session.id, ada, serde_json::json!({"x": 1, "y": 2}))
        .unwrap();
    registry.snapshot(session.id).await.unwrap();

    sleep(Duration::from_secs(OBSERVATION_SECS)).await;
    registry
        .stroke(session.id, ada, serde_json::json!({"x": 3, "y": 4}))
        .unwrap();
    // Strokes are fire-and-forget; a snapshot round-trip guarantees the
    // queue has drained before inspecting the broadcasts.
    registry.snapshot(session.id).await.unwrap();

    // The only stroke broadcast is the drawing-phase one.
    let mut strokes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::StrokePainted { payload, .. } = event {
            strokes.push(payload);
        }
    }
    assert_eq!(strokes, vec![serde_json::json!({"x": 3, "y": 4})]);
}

#[tokio::test(start_paused = true)]
async fn delete_cancels_pending_timers_and_removes_the_session() {
    let registry = test_registry();
    let session = registry
        .create(relay_config(3, 2), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "T0").await;
    join(&registry, session.id, "grace", "T1").await;
    registry.start(session.id, Origin::Admin).await.unwrap();

    registry.delete(session.id, Origin::Admin).await.unwrap();
    let err = registry.snapshot(session.id).await.unwrap_err();
    assert!(matches!(err, CommandError::NotFound(_)));

    // Sleeping past every old deadline must not panic or resurrect state.
    sleep(Duration::from_secs(120)).await;
    assert!(registry.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_requires_enough_references_for_every_team() {
    let registry = test_registry();
    let session = registry
        .create(relay_config(1, 2), CreatorRef::Admin)
        .unwrap();
    join(&registry, session.id, "ada", "T0").await;
    join(&registry, session.id, "grace", "T1").await;
    join(&registry, session.id, "alan", "T2").await;

    let err = registry.start(session.id, Origin::Admin).await.unwrap_err();
    assert!(matches!(err, CommandError::PreconditionFailed(_)));
}
