//! Cancellation and deletion policy tests

mod helpers;

use assert_matches::assert_matches;
use chrono::Duration;
use helpers::*;
use Encontro::database::EventStore;
use Encontro::models::*;
use Encontro::Rejection;

#[tokio::test]
async fn test_event_without_approved_participants_can_be_cancelled_until_start() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(1), 3).await;
    let cancellation = &ctx.services.cancellation_service;

    ctx.clock.set(event.start_time - Duration::minutes(1));
    let check = cancellation.can_cancel_event(event.id, 1).await.unwrap().unwrap();
    assert_eq!(check.hours_required, 0);
    assert_eq!(check.approved_count, 0);

    ctx.clock.set(event.start_time);
    assert_eq!(
        cancellation.can_cancel_event(event.id, 1).await.unwrap().unwrap_err(),
        Rejection::EventAlreadyStarted
    );
}

#[tokio::test]
async fn test_one_approved_participant_needs_a_day_of_notice() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(3), 3).await;
    ctx.enroll(event.id, 10).await;
    let cancellation = &ctx.services.cancellation_service;

    ctx.clock.set(event.start_time - Duration::hours(24) + Duration::minutes(6));
    let refused = cancellation.can_cancel_event(event.id, 1).await.unwrap().unwrap_err();
    assert_matches!(refused, Rejection::CancellationTooLate { hours_required: 24, .. });
    assert!(refused.to_string().contains("faltam 23.9h"));

    ctx.clock.set(event.start_time - Duration::hours(24));
    assert_matches!(cancellation.can_cancel_event(event.id, 1).await.unwrap(), Ok(_));
}

#[tokio::test]
async fn test_two_approved_participants_need_two_days_of_notice() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(5), 3).await;
    ctx.enroll(event.id, 10).await;
    ctx.enroll(event.id, 11).await;
    let cancellation = &ctx.services.cancellation_service;

    ctx.clock.set(event.start_time - Duration::hours(47));
    assert_matches!(
        cancellation.can_cancel_event(event.id, 1).await.unwrap(),
        Err(Rejection::CancellationTooLate { hours_required: 48, .. })
    );

    ctx.clock.set(event.start_time - Duration::hours(48) - Duration::minutes(6));
    let check = cancellation.can_cancel_event(event.id, 1).await.unwrap().unwrap();
    assert_eq!(check.approved_count, 2);
    assert!(check.hours_remaining > 48.0);
}

#[tokio::test]
async fn test_cancelling_notifies_active_participants_with_the_reason() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(5), 3).await;
    ctx.enroll(event.id, 10).await;
    ctx.services.participation_service.apply_to_event(event.id, 11).await.unwrap().unwrap();
    let cancellation = &ctx.services.cancellation_service;

    assert_eq!(
        cancellation.cancel_event(event.id, 2, None).await.unwrap().unwrap_err(),
        Rejection::NotCreator
    );

    let cancelled = cancellation
        .cancel_event(event.id, 1, Some("  chuva forte  ".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelado);
    assert_eq!(cancelled.cancelamento_motivo.as_deref(), Some("chuva forte"));
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Cancelado);

    for user_id in [10, 11] {
        let notice = ctx
            .notifications_for(user_id)
            .await
            .into_iter()
            .find(|n| n.kind == NotificationKind::EventCancelled)
            .expect("participant should be told");
        assert!(notice.message.contains("chuva forte"));
    }

    assert_eq!(
        cancellation.cancel_event(event.id, 1, None).await.unwrap().unwrap_err(),
        Rejection::EventClosed
    );
}

#[tokio::test]
async fn test_event_with_approved_participants_cannot_be_deleted() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(2), 3).await;
    ctx.enroll(event.id, 10).await;

    assert_eq!(
        ctx.services.cancellation_service.delete_event(event.id, 1).await.unwrap(),
        Err(Rejection::HasApprovedParticipants)
    );
    assert!(ctx.store.get_event(event.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_deleting_cascades_and_tells_pending_candidates() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(2), 3).await;
    ctx.services.participation_service.apply_to_event(event.id, 10).await.unwrap().unwrap();
    let cancellation = &ctx.services.cancellation_service;

    assert_eq!(cancellation.delete_event(event.id, 2).await.unwrap(), Err(Rejection::NotCreator));
    assert_eq!(cancellation.can_delete_event(event.id, 1).await.unwrap(), Ok(()));
    assert_eq!(cancellation.delete_event(event.id, 1).await.unwrap(), Ok(()));

    assert!(ctx.store.get_event(event.id).await.unwrap().is_none());
    assert!(ctx.store.list_participations(event.id).await.unwrap().is_empty());

    let inbox = ctx.notifications_for(10).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::EventDeleted);
    assert_eq!(inbox[0].event_id, None);
}

#[tokio::test]
async fn test_finished_event_cannot_be_deleted() {
    let ctx = TestContext::new();
    let start = ctx.now() - Duration::days(1);
    ctx.store
        .put_event(create_test_event(300, 1, EventStatus::Finalizado, start, 3, 3))
        .unwrap();

    assert_eq!(
        ctx.services.cancellation_service.delete_event(300, 1).await.unwrap(),
        Err(Rejection::EventFinished)
    );
}

#[tokio::test]
async fn test_abandoned_sweep_spares_events_with_any_candidacy() {
    let ctx = TestContext::new();
    let empty = ctx.create_event(1, EventType::Publico, Duration::hours(1), 3).await;
    let pending = ctx.create_event(2, EventType::Publico, Duration::hours(1), 3).await;
    ctx.services.participation_service.apply_to_event(pending.id, 10).await.unwrap().unwrap();

    ctx.clock.set(empty.start_time + Duration::minutes(4));
    let report = ctx.services.cancellation_service.sweep_abandoned_events().await.unwrap();
    assert_eq!(report.examined, 0);

    ctx.clock.set(empty.start_time + Duration::minutes(5));
    let report = ctx.services.cancellation_service.sweep_abandoned_events().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.changed, 1);
    assert!(ctx.store.get_event(empty.id).await.unwrap().is_none());
    assert!(ctx.store.get_event(pending.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_stale_sweep_finalizes_unattended_events_only() {
    let ctx = TestContext::new();
    let start = ctx.now() - Duration::days(10);
    ctx.store
        .put_event(create_test_event(400, 1, EventStatus::Confirmado, start, 3, 2))
        .unwrap();
    ctx.store
        .put_participation(create_test_participation(401, 400, 10, ParticipationStatus::Aprovado, true, false, false))
        .unwrap();
    ctx.store
        .put_event(create_test_event(410, 2, EventStatus::EmAndamento, start, 3, 2))
        .unwrap();
    ctx.store
        .put_participation(create_test_participation(411, 410, 11, ParticipationStatus::Aprovado, true, true, false))
        .unwrap();

    let report = ctx.services.cancellation_service.sweep_stale_events().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.changed, 1);
    assert_eq!(ctx.event(400).await.status, EventStatus::Finalizado);
    assert_eq!(ctx.event(410).await.status, EventStatus::EmAndamento);

    let profile = ctx.services.trust_service.get_trust_profile(10).await.unwrap();
    assert_eq!(profile.trust_score, MAX_TRUST_SCORE - 1);
}
