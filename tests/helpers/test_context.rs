//! Test context for unified test setup
//!
//! Wires every service to an in-memory store and a manual clock so tests can
//! walk an event through its whole life without waiting on real time.

use std::sync::{Arc, Once};
use chrono::{DateTime, Duration, TimeZone, Utc};
use Encontro::config::Settings;
use Encontro::database::{EventStore, InMemoryStore};
use Encontro::models::*;
use Encontro::services::{Clock, ManualClock, ServiceFactory};
use super::test_data::new_event_request;

static INIT: Once = Once::new();

/// Unified test context that manages all test components
pub struct TestContext {
    pub store: InMemoryStore,
    pub clock: ManualClock,
    pub services: ServiceFactory,
    pub settings: Settings,
}

impl TestContext {
    /// Context whose clock starts at `base_time()`
    pub fn new() -> Self {
        Self::new_with_settings(test_settings())
    }

    pub fn new_with_settings(settings: Settings) -> Self {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        });

        let store = InMemoryStore::new();
        let clock = ManualClock::new(base_time());
        let services = ServiceFactory::new(
            settings.clone(),
            Arc::new(store.clone()) as Arc<dyn EventStore>,
            Arc::new(clock.clone()) as Arc<dyn Clock>,
        )
        .expect("Failed to build services");

        Self {
            store,
            clock,
            services,
            settings,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create an event through the rule engine, panicking on refusal
    pub async fn create_event(&self, creator_id: i64, event_type: EventType, starts_in: Duration, max_vagas: i32) -> Event {
        let request = new_event_request(creator_id, event_type, self.now() + starts_in, max_vagas);
        self.services
            .event_service
            .create_event(request)
            .await
            .expect("store failure")
            .expect("event creation refused")
    }

    /// Apply and, for non-institucional events, approve
    pub async fn enroll(&self, event_id: i64, user_id: i64) -> Participation {
        let applied = self
            .services
            .participation_service
            .apply_to_event(event_id, user_id)
            .await
            .expect("store failure")
            .expect("application refused");
        if applied.status == ParticipationStatus::Aprovado {
            return applied;
        }
        self.services
            .participation_service
            .approve_participation(applied.id, event_id)
            .await
            .expect("store failure")
            .expect("approval refused")
    }

    pub async fn event(&self, event_id: i64) -> Event {
        self.store
            .get_event(event_id)
            .await
            .expect("store failure")
            .expect("event missing")
    }

    pub async fn participation(&self, participation_id: i64) -> Participation {
        self.store
            .get_participation(participation_id)
            .await
            .expect("store failure")
            .expect("participation missing")
    }

    pub async fn active_participation(&self, event_id: i64, user_id: i64) -> Participation {
        self.store
            .find_active_participation(event_id, user_id)
            .await
            .expect("store failure")
            .expect("no active participation")
    }

    pub async fn notifications_for(&self, user_id: i64) -> Vec<Notification> {
        self.store
            .list_notifications_for_user(user_id)
            .await
            .expect("store failure")
    }

    /// Run one status pass at the current clock time
    pub async fn recompute(&self) {
        self.services
            .status_service
            .recompute_all()
            .await
            .expect("status pass failed");
    }
}

/// Fixed starting instant shared by every context
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
}

/// Defaults with millisecond backoffs so retry paths stay fast
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.fetch_backoff_ms = 1;
    settings.retry.delivery_backoff_ms = 1;
    settings
}
