//! End-to-end join flow: eligibility, directory, device preview and bridge.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use classroom_service::bridge::{BridgeExit, BridgePhase};
use classroom_service::classroom::{ClassroomSettings, ClassroomView};
use classroom_service::devices::DevicePreviewManager;
use classroom_service::errors::{ClassroomAction, ClassroomError, ValidationError};
use classroom_service::models::{RoleContext, Session, SessionStatus};
use classroom_test_utils::*;

struct Harness {
    directory: Arc<MockSessionDirectory>,
    loader: Arc<MockEngineLoader>,
    engine: Arc<EngineProbe>,
    preview: DevicePreviewManager<MockMediaDevices>,
    media: Arc<MediaProbe>,
    clock: FixedClock,
    settings: ClassroomSettings,
}

impl Harness {
    async fn new(sessions: Vec<Session>) -> Self {
        let (loader, engine) = MockEngineLoader::builder().auto_join().build();
        let (devices, media) = MockMediaDevices::granting();
        let mut preview = DevicePreviewManager::new(devices);
        preview.acquire().await.unwrap();

        Self {
            directory: Arc::new(MockSessionDirectory::new().with_sessions(sessions)),
            loader,
            engine,
            preview,
            media,
            clock: FixedClock::new(base_time()),
            settings: ClassroomSettings::default(),
        }
    }

    async fn enter(
        &mut self,
        ctx: &RoleContext,
        session: &Session,
    ) -> Result<ClassroomView, ClassroomError> {
        ClassroomView::enter(
            self.directory.as_ref(),
            ctx,
            session,
            &mut self.preview,
            Arc::clone(&self.loader) as Arc<dyn classroom_service::bridge::engine::ConferenceEngineLoader>,
            &self.settings,
            &self.clock,
        )
        .await
    }
}

async fn wait_for_active(view: &ClassroomView) {
    let mut rx = view.bridge().subscribe();
    tokio::time::timeout(
        Duration::from_secs(60),
        rx.wait_for(|s| s.phase == BridgePhase::Active),
    )
    .await
    .expect("bridge never became active")
    .expect("bridge state channel closed");
}

#[tokio::test(start_paused = true)]
async fn test_outside_window_sends_nothing() {
    let early = TestSession::scheduled_in(45).build();
    let mut harness = Harness::new(vec![early.clone()]).await;

    let err = harness.enter(&student_ctx(), &early).await.err().unwrap();
    assert!(matches!(
        err,
        ClassroomError::TimingViolation {
            action: ClassroomAction::Join,
            ..
        }
    ));

    let err = harness.enter(&instructor_ctx(), &early).await.err().unwrap();
    assert!(matches!(
        err,
        ClassroomError::TimingViolation {
            action: ClassroomAction::Start,
            ..
        }
    ));

    assert_eq!(harness.directory.total_calls(), 0);
    assert_eq!(harness.engine.load_calls(), 0);
    assert!(harness.preview.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_finished_session_cannot_be_joined() {
    let done = TestSession::scheduled_in(-120)
        .with_status(SessionStatus::Completed)
        .build();
    let mut harness = Harness::new(vec![done.clone()]).await;

    let err = harness.enter(&instructor_ctx(), &done).await.err().unwrap();

    assert!(matches!(err, ClassroomError::TimingViolation { .. }));
    assert_eq!(harness.directory.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_instructor_starts_then_joins() {
    let session = TestSession::scheduled_in(12).with_room("cs201-week3").build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    let ctx = instructor_ctx();

    let view = harness.enter(&ctx, &session).await.unwrap();

    assert_eq!(harness.directory.start_calls(), 1);
    assert_eq!(harness.directory.join_calls(), 1);
    assert_eq!(view.room_id().as_str(), "cs201-week3");
    assert_eq!(view.session_id(), session.id);
    assert!(!harness.preview.is_live(), "preview must release before the bridge opens");
    assert_eq!(harness.media.live(), 0);

    wait_for_active(&view).await;
    let options = harness.engine.last_options().unwrap();
    assert_eq!(options.display_name, ctx.display_name);
    assert_eq!(options.email, ctx.email);
    assert_eq!(options.room_name, "cs201-week3");

    view.leave().await;
    view.leave().await;
    assert!(view.snapshot().disposed);
    assert_eq!(harness.engine.dispose_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_student_joins_ongoing_session_without_starting() {
    let session = TestSession::ongoing().build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    harness.preview.toggle_video(false);

    let view = harness.enter(&student_ctx(), &session).await.unwrap();

    assert_eq!(harness.directory.start_calls(), 0);
    assert_eq!(harness.directory.join_calls(), 1);
    wait_for_active(&view).await;
    assert!(harness.engine.last_options().unwrap().config.start_video_muted);

    view.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_instructor_joins_already_running_session() {
    let session = TestSession::ongoing().build();
    let mut harness = Harness::new(vec![session.clone()]).await;

    let view = harness.enter(&instructor_ctx(), &session).await.unwrap();

    assert_eq!(harness.directory.start_calls(), 0);
    view.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_blank_display_name_is_rejected_before_any_request() {
    let session = TestSession::scheduled_in(5).build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    let mut ctx = instructor_ctx();
    ctx.display_name = "   ".to_string();

    let err = harness.enter(&ctx, &session).await.err().unwrap();

    assert!(matches!(
        err,
        ClassroomError::Validation(ValidationError::EmptyDisplayName)
    ));
    assert_eq!(harness.directory.total_calls(), 0);
    assert!(harness.preview.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_join_failure_keeps_preview() {
    let session = TestSession::ongoing().build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    harness
        .directory
        .fail_next_join(ClassroomError::Network("connection reset".to_string()));

    let err = harness.enter(&student_ctx(), &session).await.err().unwrap();

    assert!(err.is_retryable());
    assert!(harness.preview.is_live());
    assert_eq!(harness.engine.load_calls(), 0);

    // Retry succeeds with the same preview.
    let view = harness.enter(&student_ctx(), &session).await.unwrap();
    wait_for_active(&view).await;
    assert_eq!(harness.media.max_live(), 1);
    view.leave().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_rejected_by_directory() {
    let session = TestSession::scheduled_in(14).build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    harness.directory.fail_next_start(ClassroomError::TimingViolation {
        action: ClassroomAction::Start,
        reason: "rejected by session directory".to_string(),
    });

    let err = harness.enter(&instructor_ctx(), &session).await.err().unwrap();

    assert!(matches!(err, ClassroomError::TimingViolation { .. }));
    assert_eq!(harness.directory.join_calls(), 0);
    assert!(harness.preview.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_hang_up_navigates_away() {
    let session = TestSession::ongoing().build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    let view = harness.enter(&student_ctx(), &session).await.unwrap();
    wait_for_active(&view).await;

    view.hang_up().await.unwrap();

    assert_eq!(view.wait_for_exit().await, BridgeExit::NavigateAway);
    view.leave().await;
    assert_eq!(harness.engine.dispose_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_view_tears_down_bridge() {
    let session = TestSession::ongoing().build();
    let mut harness = Harness::new(vec![session.clone()]).await;
    let view = harness.enter(&student_ctx(), &session).await.unwrap();
    wait_for_active(&view).await;
    let bridge = view.bridge().clone();

    drop(view);

    let mut rx = bridge.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.disposed))
        .await
        .expect("teardown did not run")
        .ok();
    assert_eq!(harness.engine.dispose_calls(), 1);
    assert!(!harness.engine.has_subscriber());
}
