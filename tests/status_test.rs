//! Status engine tests
//!
//! Drives events through their lifecycle by moving the manual clock and
//! running status passes.

mod helpers;

use chrono::Duration;
use helpers::*;
use Encontro::database::EventStore;
use Encontro::models::*;
use Encontro::services::{compute_status, should_auto_complete};
use Encontro::Rejection;

#[tokio::test]
async fn test_status_follows_the_clock_through_the_whole_lifecycle() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(1), 3).await;

    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Aberto);

    ctx.clock.set(event.start_time - Duration::minutes(5) - Duration::seconds(1));
    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Aberto);

    ctx.clock.set(event.start_time - Duration::minutes(5));
    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Confirmado);

    ctx.clock.set(event.start_time);
    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::EmAndamento);

    ctx.clock.set(event.end_time);
    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Finalizado);

    ctx.clock.set(event.end_time + Duration::days(7));
    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Concluido);

    ctx.clock.advance(Duration::days(30));
    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Concluido);
}

#[tokio::test]
async fn test_stored_status_never_moves_backwards() {
    let ctx = TestContext::new();
    let start = ctx.now() + Duration::days(2);
    ctx.store
        .put_event(create_test_event(500, 1, EventStatus::EmAndamento, start, 4, 4))
        .unwrap();

    ctx.recompute().await;
    assert_eq!(ctx.event(500).await.status, EventStatus::EmAndamento);

    let finalized = create_test_event(501, 1, EventStatus::Finalizado, start, 4, 4);
    assert_eq!(compute_status(&finalized, &[], ctx.now()), EventStatus::Finalizado);

    let cancelled = create_test_event(502, 1, EventStatus::Cancelado, start, 4, 4);
    assert_eq!(compute_status(&cancelled, &[], start + Duration::days(30)), EventStatus::Cancelado);
}

#[tokio::test]
async fn test_full_event_confirms_before_the_lead_time() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(3), 1).await;
    ctx.enroll(event.id, 10).await;

    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Confirmado);
}

#[tokio::test]
async fn test_manual_confirmation_sticks_and_is_creator_only() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(3), 5).await;
    let status = &ctx.services.status_service;

    assert_eq!(status.confirm_event(event.id, 2).await.unwrap().unwrap_err(), Rejection::NotCreator);

    let confirmed = status.confirm_event(event.id, 1).await.unwrap().unwrap();
    assert_eq!(confirmed.status, EventStatus::Confirmado);
    assert_eq!(status.confirm_event(event.id, 1).await.unwrap().unwrap_err(), Rejection::NotConfirmable);

    ctx.recompute().await;
    assert_eq!(ctx.event(event.id).await.status, EventStatus::Confirmado);

    ctx.clock.set(event.start_time);
    assert_eq!(status.confirm_event(event.id, 1).await.unwrap().unwrap_err(), Rejection::EventAlreadyStarted);
}

#[test]
fn test_auto_complete_needs_every_present_participant_evaluated() {
    let start = base_time() - Duration::days(1);
    let event = create_test_event(7, 1, EventStatus::Finalizado, start, 5, 2);
    let after_end = event.end_time + Duration::hours(1);

    let done = create_test_participation(1, 7, 10, ParticipationStatus::Aprovado, true, true, true);
    let pending = create_test_participation(2, 7, 11, ParticipationStatus::Aprovado, true, true, false);
    let absent = create_test_participation(3, 7, 12, ParticipationStatus::Aprovado, false, false, false);
    let cancelled = create_test_participation(4, 7, 13, ParticipationStatus::Cancelado, true, false, false);

    assert!(!should_auto_complete(&event, &[done.clone(), pending.clone()], after_end));
    assert!(should_auto_complete(&event, &[done.clone(), absent, cancelled], after_end));
    assert!(!should_auto_complete(&event, &[], after_end));
    assert!(should_auto_complete(&event, &[pending], event.end_time + Duration::days(7)));
}

#[tokio::test]
async fn test_status_pass_retries_the_batch_read() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(1), 3).await;
    ctx.clock.set(event.start_time);

    ctx.store.fail_next_batch_reads(2);
    let report = ctx.services.status_service.recompute_all().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.changed, 1);
    assert_eq!(ctx.event(event.id).await.status, EventStatus::EmAndamento);

    ctx.store.fail_next_batch_reads(3);
    let failed = ctx.services.status_service.recompute_all().await;
    assert!(failed.unwrap_err().is_transient());
}

#[tokio::test]
async fn test_ending_an_event_penalizes_confirmed_no_shows() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(1), 3).await;
    ctx.enroll(event.id, 10).await;
    ctx.enroll(event.id, 11).await;
    ctx.services.status_service.confirm_event(event.id, 1).await.unwrap().unwrap();

    let participations = &ctx.services.participation_service;
    participations.confirm_presence(event.id, 10).await.unwrap().unwrap();
    let attendee = participations.confirm_presence(event.id, 11).await.unwrap().unwrap();
    ctx.store.grant_access(attendee.id, ctx.now()).await.unwrap();

    ctx.clock.set(event.end_time);
    ctx.recompute().await;

    let trust = &ctx.services.trust_service;
    assert_eq!(trust.get_trust_profile(10).await.unwrap().trust_score, MAX_TRUST_SCORE - 1);
    assert_eq!(trust.get_trust_profile(11).await.unwrap().trust_score, MAX_TRUST_SCORE);

    ctx.clock.advance(Duration::hours(1));
    ctx.recompute().await;
    assert_eq!(trust.get_trust_profile(10).await.unwrap().trust_score, MAX_TRUST_SCORE - 1);
}
