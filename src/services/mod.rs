//! Services module
//!
//! This module contains the rule engines and the services around them

pub mod cancellation;
pub mod clock;
pub mod entry;
pub mod events;
pub mod notification;
pub mod participation;
pub mod push;
pub mod rating;
pub mod scheduler;
pub mod status;
pub mod trust;
pub mod waiting_list;

// Re-export commonly used services
pub use cancellation::{evaluate_cancellation, CancellationCheck, CancellationService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{check_entry_window, EntryAttempt, EntryService};
pub use events::EventService;
pub use notification::{notify_quietly, DeliveryReport, NotificationDispatcher, Notifier, OutboxNotifier};
pub use participation::{CancellationReceipt, ParticipationService};
pub use push::PushClient;
pub use rating::RatingService;
pub use scheduler::Scheduler;
pub use status::{compute_status, should_auto_complete, PassReport, StatusService};
pub use trust::TrustService;
pub use waiting_list::WaitingListService;

use std::sync::Arc;
use crate::config::settings::Settings;
use crate::database::EventStore;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub event_service: EventService,
    pub status_service: StatusService,
    pub participation_service: ParticipationService,
    pub cancellation_service: CancellationService,
    pub entry_service: EntryService,
    pub trust_service: TrustService,
    pub rating_service: RatingService,
    pub notification_dispatcher: Option<NotificationDispatcher>,
    store: Arc<dyn EventStore>,
    settings: Settings,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    ///
    /// Notices go to the store's outbox; the dispatcher exists only when a
    /// push gateway is configured.
    pub fn new(settings: Settings, store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = Arc::new(OutboxNotifier::new(store.clone(), clock.clone()));
        Self::with_notifier(settings, store, clock, notifier)
    }

    /// Same as `new` with a caller-supplied notifier
    pub fn with_notifier(
        settings: Settings,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let fetch_policy = settings.retry.fetch_policy();

        let trust_service = TrustService::new(store.clone(), clock.clone(), notifier.clone());
        let waiting_list = WaitingListService::new(
            store.clone(),
            clock.clone(),
            notifier.clone(),
            settings.waiting_list.requeue_after_minutes,
        );
        let participation_service = ParticipationService::new(store.clone(), clock.clone(), notifier.clone(), waiting_list);
        let status_service = StatusService::new(store.clone(), clock.clone(), trust_service.clone(), fetch_policy);
        let cancellation_service = CancellationService::new(
            store.clone(),
            clock.clone(),
            notifier.clone(),
            trust_service.clone(),
            fetch_policy,
        );
        let entry_service = EntryService::new(store.clone(), clock.clone(), settings.entry.max_attempts_per_minute)?;
        let event_service = EventService::new(store.clone(), clock.clone(), notifier);
        let rating_service = RatingService::new(store.clone(), clock.clone());

        let notification_dispatcher = match &settings.push {
            Some(push) => Some(NotificationDispatcher::new(
                store.clone(),
                PushClient::new(push)?,
                clock,
                settings.retry.delivery_policy(),
                push.batch_size,
            )),
            None => None,
        };

        Ok(Self {
            event_service,
            status_service,
            participation_service,
            cancellation_service,
            entry_service,
            trust_service,
            rating_service,
            notification_dispatcher,
            store,
            settings,
        })
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Waiting list operations live next to the participation engine that serves them
    pub fn waiting_list_service(&self) -> &WaitingListService {
        self.participation_service.waiting_list()
    }

    /// Periodic passes wired to these services
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.settings.scheduler.clone(),
            self.status_service.clone(),
            self.cancellation_service.clone(),
            self.participation_service.clone(),
            self.entry_service.clone(),
            self.notification_dispatcher.clone(),
        )
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let store_healthy = self.store.list_undelivered_notifications(1).await.is_ok();

        ServiceHealthStatus {
            store_healthy,
            push_enabled: self.notification_dispatcher.is_some(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub store_healthy: bool,
    pub push_enabled: bool,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.store_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.store_healthy {
            issues.push("Event store unreachable".to_string());
        }
        if !self.push_enabled {
            issues.push("Push gateway not configured; notifications stay in the in-app feed".to_string());
        }

        issues
    }
}
