//! Cross-engine scenarios
//!
//! Vacancy accounting under arbitrary operation sequences and concurrent
//! approvals, plus organizer creation limits.

mod helpers;

use chrono::Duration;
use helpers::*;
use proptest::prelude::*;
use Encontro::database::EventStore;
use Encontro::models::*;
use Encontro::Rejection;

#[derive(Debug, Clone)]
enum Action {
    Apply(i64),
    Approve(i64),
    Reject(i64),
    Cancel(i64),
}

fn action() -> impl Strategy<Value = Action> {
    let user = 10i64..16;
    prop_oneof![
        user.clone().prop_map(Action::Apply),
        user.clone().prop_map(Action::Approve),
        user.clone().prop_map(Action::Reject),
        user.prop_map(Action::Cancel),
    ]
}

async fn active(ctx: &TestContext, event_id: i64, user_id: i64) -> Option<Participation> {
    ctx.store.find_active_participation(event_id, user_id).await.unwrap()
}

async fn run_actions(max_vagas: i32, actions: Vec<Action>) {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(2), max_vagas).await;
    let participations = &ctx.services.participation_service;

    for action in actions {
        match action {
            Action::Apply(user_id) => {
                participations.apply_to_event(event.id, user_id).await.unwrap().ok();
            }
            Action::Approve(user_id) => {
                if let Some(p) = active(&ctx, event.id, user_id).await {
                    participations.approve_participation(p.id, event.id).await.unwrap().ok();
                }
            }
            Action::Reject(user_id) => {
                if let Some(p) = active(&ctx, event.id, user_id).await {
                    participations.reject_participation(p.id, None).await.unwrap().ok();
                }
            }
            Action::Cancel(user_id) => {
                if let Some(p) = active(&ctx, event.id, user_id).await {
                    participations.cancel_participation(p.id, user_id).await.unwrap().ok();
                }
            }
        }

        let stored = ctx.event(event.id).await;
        let approved = ctx
            .store
            .list_participations(event.id)
            .await
            .unwrap()
            .iter()
            .filter(|p| p.is_approved())
            .count() as i32;
        assert!(stored.vagas >= 0 && stored.vagas <= stored.max_vagas);
        assert_eq!(stored.vagas, stored.max_vagas - approved);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_vacancies_always_match_approved_participants(
        max_vagas in 1i32..4,
        actions in prop::collection::vec(action(), 1..40),
    ) {
        tokio_test::block_on(run_actions(max_vagas, actions));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_never_oversell() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Publico, Duration::days(2), 3).await;

    let mut pending = Vec::new();
    for user_id in 10..20 {
        let p = ctx
            .services
            .participation_service
            .apply_to_event(event.id, user_id)
            .await
            .unwrap()
            .unwrap();
        pending.push(p.id);
    }

    let handles: Vec<_> = pending
        .into_iter()
        .map(|participation_id| {
            let participations = ctx.services.participation_service.clone();
            let event_id = event.id;
            tokio::spawn(async move {
                participations
                    .approve_participation(participation_id, event_id)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut approved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => approved += 1,
            Err(rejection) => assert_eq!(rejection, Rejection::NoVacancies),
        }
    }
    assert_eq!(approved, 3);
    assert_eq!(ctx.event(event.id).await.vagas, 0);
}

#[tokio::test]
async fn test_organizer_creates_one_event_per_day_once_earlier_ones_are_concluded() {
    let ctx = TestContext::new();
    let events = &ctx.services.event_service;
    let first = ctx.create_event(1, EventType::Publico, Duration::days(1), 3).await;

    let same_day = new_event_request(1, EventType::Publico, ctx.now() + Duration::days(3), 3);
    assert_eq!(
        events.create_event(same_day).await.unwrap().unwrap_err(),
        Rejection::DailyLimitReached
    );

    ctx.clock.advance(Duration::hours(13));
    let next_day = new_event_request(1, EventType::Publico, ctx.now() + Duration::days(3), 3);
    assert_eq!(
        events.create_event(next_day).await.unwrap().unwrap_err(),
        Rejection::ActiveEventExists
    );

    ctx.services
        .cancellation_service
        .cancel_event(first.id, 1, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        events.can_user_create_new_event(1).await.unwrap(),
        Err(Rejection::ActiveEventExists)
    );

    let cancelled = ctx.event(first.id).await;
    ctx.store
        .put_event(Event {
            status: EventStatus::Concluido,
            ..cancelled
        })
        .unwrap();
    assert_eq!(events.can_user_create_new_event(1).await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_deleting_a_cancelled_event_lifts_the_creation_block() {
    let ctx = TestContext::new();
    let events = &ctx.services.event_service;
    let cancellation = &ctx.services.cancellation_service;
    let first = ctx.create_event(1, EventType::Publico, Duration::days(2), 3).await;

    cancellation.cancel_event(first.id, 1, None).await.unwrap().unwrap();
    ctx.clock.advance(Duration::days(1));
    assert_eq!(
        events.can_user_create_new_event(1).await.unwrap(),
        Err(Rejection::ActiveEventExists)
    );

    cancellation.delete_event(first.id, 1).await.unwrap().unwrap();
    assert_eq!(events.can_user_create_new_event(1).await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_event_is_created_open_with_every_slot_free() {
    let ctx = TestContext::new();
    let event = ctx.create_event(1, EventType::Privado, Duration::days(1), 6).await;
    assert_eq!(event.status, EventStatus::Aberto);
    assert_eq!(event.vagas, 6);
    assert_eq!(event.max_vagas, 6);
    assert_eq!(event.created_at, ctx.now());
}
