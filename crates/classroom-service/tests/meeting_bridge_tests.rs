//! Tests for the meeting bridge actor.
//!
//! The conferencing engine is replaced by `MockEngineLoader`; its probe
//! injects engine events and counts dispose calls. Engine timeouts run in
//! virtual time.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use classroom_service::bridge::{
    BridgeExit, BridgePhase, BridgeSettings, BridgeSnapshot, BridgeTarget, EngineCommand,
    EngineEvent, MeetingBridge, MeetingBridgeHandle, RecoveryAction,
};
use classroom_service::devices::JoinIntent;
use classroom_test_utils::*;
use common::types::{ParticipantId, RoomId, SessionId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn settings() -> BridgeSettings {
    BridgeSettings {
        engine_domain: "meet.campus.example.edu".to_string(),
        engine_load_timeout: Duration::from_secs(15),
        room_join_timeout: Duration::from_secs(30),
    }
}

fn target() -> BridgeTarget {
    BridgeTarget {
        session_id: SessionId::new(),
        room_id: RoomId("cs201-week3".to_string()),
        intent: JoinIntent::new("Grace Hopper", false, true)
            .unwrap()
            .with_email(Some("grace@example.edu".to_string())),
    }
}

fn spawn(loader: Arc<MockEngineLoader>) -> (MeetingBridgeHandle, JoinHandle<()>) {
    MeetingBridge::spawn(loader, target(), settings(), CancellationToken::new())
}

async fn wait_until(
    handle: &MeetingBridgeHandle,
    predicate: impl FnMut(&BridgeSnapshot) -> bool,
) -> BridgeSnapshot {
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(120), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for bridge state")
        .expect("bridge state channel closed")
        .clone();
    snapshot
}

fn participant(id: &str) -> ParticipantId {
    ParticipantId(id.to_string())
}

#[tokio::test(start_paused = true)]
async fn test_bridge_reaches_active_with_intent_options() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);

    let snapshot = wait_until(&handle, |s| s.phase == BridgePhase::Active).await;
    assert_eq!(snapshot.participant_count, 1);
    assert!(snapshot.error.is_none());

    let options = probe.last_options().expect("engine should be created");
    assert_eq!(options.room_name, "cs201-week3");
    assert_eq!(options.display_name, "Grace Hopper");
    assert_eq!(options.email.as_deref(), Some("grace@example.edu"));
    assert_eq!(options.config.domain, "meet.campus.example.edu");
    assert!(options.config.start_video_muted);
    assert!(!options.config.start_audio_muted);
    assert_eq!(probe.load_calls(), 1);
    assert_eq!(probe.create_calls(), 1);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_participant_count_follows_roster_and_never_drops_below_one() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    assert!(probe.emit(EngineEvent::ParticipantJoined {
        id: participant("p1"),
        display_name: "Ada".to_string(),
    }));
    assert!(probe.emit(EngineEvent::ParticipantJoined {
        id: participant("p2"),
        display_name: "Alan".to_string(),
    }));
    wait_until(&handle, |s| s.participant_count == 3).await;

    assert!(probe.emit(EngineEvent::ParticipantLeft { id: participant("p1") }));
    assert!(probe.emit(EngineEvent::ParticipantLeft { id: participant("p2") }));
    // A leave for someone never seen must not push the count below one.
    assert!(probe.emit(EngineEvent::ParticipantLeft { id: participant("ghost") }));
    wait_until(&handle, |s| s.participant_count == 1).await;

    assert!(probe.emit(EngineEvent::ParticipantJoined {
        id: participant("p3"),
        display_name: "Barbara".to_string(),
    }));
    // Events are relayed in order, so reaching 2 means the ghost leave ran too.
    let snapshot = wait_until(&handle, |s| s.participant_count == 2).await;
    assert_eq!(snapshot.phase, BridgePhase::Active);

    let roster = handle.roster().await.unwrap();
    assert_eq!(roster.len(), 3);
    assert_eq!(roster.iter().filter(|p| p.is_active()).count(), 1);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_double_dispose_disposes_engine_once() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    handle.dispose().await;
    handle.dispose().await;

    assert!(handle.is_disposed());
    assert_eq!(probe.dispose_calls(), 1);
    task.await.unwrap();
    assert_eq!(probe.dispose_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_event_after_dispose_is_dropped() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;
    assert!(probe.emit(EngineEvent::ParticipantJoined {
        id: participant("p1"),
        display_name: "Ada".to_string(),
    }));
    wait_until(&handle, |s| s.participant_count == 2).await;

    handle.dispose().await;
    let disposed = handle.snapshot();
    // Open presences are finalized by teardown.
    assert_eq!(disposed.participant_count, 1);

    assert!(!probe.has_subscriber(), "dispose must revoke the subscription");
    assert!(!probe.emit(EngineEvent::ParticipantJoined {
        id: participant("late"),
        display_name: "Late".to_string(),
    }));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.snapshot(), disposed);
}

#[tokio::test(start_paused = true)]
async fn test_engine_load_timeout_moves_to_error() {
    let (loader, probe) = MockEngineLoader::builder()
        .load_delay(Duration::from_secs(60))
        .build();
    let (handle, _task) = spawn(loader);

    assert_eq!(handle.wait_for_exit().await, BridgeExit::Failed);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, BridgePhase::Error);
    let failure = snapshot.error.expect("failure should be published");
    assert_eq!(
        failure.recovery,
        vec![RecoveryAction::Reload, RecoveryAction::NavigateBack]
    );
    assert_eq!(probe.create_calls(), 0);

    handle.dispose().await;
    assert_eq!(probe.dispose_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_engine_load_failure_is_not_retried() {
    let (loader, probe) = MockEngineLoader::builder()
        .failing_load("script blocked")
        .build();
    let (handle, _task) = spawn(loader);

    assert_eq!(handle.wait_for_exit().await, BridgeExit::Failed);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(probe.load_calls(), 1);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_room_creation_failure_moves_to_error() {
    let (loader, probe) = MockEngineLoader::builder()
        .failing_create("room full")
        .build();
    let (handle, _task) = spawn(loader);

    assert_eq!(handle.wait_for_exit().await, BridgeExit::Failed);
    assert_eq!(probe.create_calls(), 1);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_conference_join_timeout_moves_to_error_and_disposes_engine() {
    // Engine is created but never reports "conference joined".
    let (loader, probe) = MockEngineLoader::builder().build();
    let (handle, _task) = spawn(loader);

    wait_until(&handle, |s| s.phase == BridgePhase::CreatingRoom).await;
    let started = tokio::time::Instant::now();

    assert_eq!(handle.wait_for_exit().await, BridgeExit::Failed);
    assert!(started.elapsed() <= Duration::from_secs(30));

    // A late "joined" does not revive the bridge.
    assert!(probe.emit(EngineEvent::ConferenceJoined));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.snapshot().phase, BridgePhase::Error);

    handle.dispose().await;
    assert_eq!(probe.dispose_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_conference_left_terminates_and_ignores_later_events() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    assert!(probe.emit(EngineEvent::ConferenceLeft));
    assert_eq!(handle.wait_for_exit().await, BridgeExit::NavigateAway);

    // Still subscribed until disposed, but nothing mutates state.
    assert!(probe.emit(EngineEvent::ParticipantJoined {
        id: participant("p1"),
        display_name: "Ada".to_string(),
    }));
    tokio::time::sleep(Duration::from_secs(1)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, BridgePhase::Terminated);
    assert_eq!(snapshot.participant_count, 1);

    handle.dispose().await;
    assert_eq!(probe.dispose_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ready_to_close_terminates() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    assert!(probe.emit(EngineEvent::ReadyToClose));
    assert_eq!(handle.wait_for_exit().await, BridgeExit::NavigateAway);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_event_fails_bridge() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    assert!(probe.emit(EngineEvent::Error {
        message: "ICE failed".to_string(),
    }));

    assert_eq!(handle.wait_for_exit().await, BridgeExit::Failed);
    let failure = handle.snapshot().error.unwrap();
    assert!(!failure.message.contains("ICE"), "engine details stay internal");

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_are_forwarded_and_hangup_terminates() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, _task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    handle.execute_command(EngineCommand::ToggleAudio).await.unwrap();
    handle.execute_command(EngineCommand::ToggleVideo).await.unwrap();
    handle.execute_command(EngineCommand::HangUp).await.unwrap();

    assert_eq!(handle.wait_for_exit().await, BridgeExit::NavigateAway);
    assert_eq!(
        probe.commands(),
        vec![
            EngineCommand::ToggleAudio,
            EngineCommand::ToggleVideo,
            EngineCommand::HangUp
        ]
    );

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_without_engine_is_connection_error() {
    let (loader, _probe) = MockEngineLoader::builder()
        .failing_load("offline")
        .build();
    let (handle, _task) = spawn(loader);
    assert_eq!(handle.wait_for_exit().await, BridgeExit::Failed);

    let err = handle
        .execute_command(EngineCommand::HangUp)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONNECTION");

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropping_all_handles_tears_down() {
    let (loader, probe) = MockEngineLoader::builder().auto_join().build();
    let (handle, task) = spawn(loader);
    wait_until(&handle, |s| s.phase == BridgePhase::Active).await;

    drop(handle);
    task.await.unwrap();

    assert_eq!(probe.dispose_calls(), 1);
    assert!(!probe.has_subscriber());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_load_skips_engine() {
    let (loader, probe) = MockEngineLoader::builder()
        .load_delay(Duration::from_secs(10))
        .build();
    let token = CancellationToken::new();
    let (handle, task) = MeetingBridge::spawn(loader, target(), settings(), token.clone());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.snapshot().phase, BridgePhase::LoadingEngine);

    token.cancel();
    task.await.unwrap();

    assert!(handle.is_disposed());
    assert_eq!(handle.wait_for_exit().await, BridgeExit::Disposed);
    assert_eq!(probe.create_calls(), 0);
    assert_eq!(probe.dispose_calls(), 0);
}
