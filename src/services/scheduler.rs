//! Periodic passes
//!
//! Each pass runs in its own tokio task on a fixed interval. A loop awaits its
//! pass before the next tick, so a pass never overlaps itself; ticks missed
//! while a pass was running are skipped. All loops stop when the shutdown
//! channel flips to `true`.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;
use crate::config::SchedulerConfig;
use crate::services::cancellation::CancellationService;
use crate::services::entry::EntryService;
use crate::services::notification::NotificationDispatcher;
use crate::services::participation::ParticipationService;
use crate::services::status::StatusService;
use crate::utils::errors::Result;

#[derive(Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    status: StatusService,
    cancellation: CancellationService,
    participations: ParticipationService,
    entry: EntryService,
    dispatcher: Option<NotificationDispatcher>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        status: StatusService,
        cancellation: CancellationService,
        participations: ParticipationService,
        entry: EntryService,
        dispatcher: Option<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            status,
            cancellation,
            participations,
            entry,
            dispatcher,
        }
    }

    /// Start every periodic pass; the handles finish after shutdown
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let status = self.status.clone();
        handles.push(tokio::spawn(run_periodic(
            "status",
            self.config.status_interval(),
            shutdown.clone(),
            move || {
                let status = status.clone();
                async move { status.recompute_all().await.map(|_| ()) }
            },
        )));

        let cancellation = self.cancellation.clone();
        handles.push(tokio::spawn(run_periodic(
            "auto_delete",
            self.config.auto_delete_interval(),
            shutdown.clone(),
            move || {
                let cancellation = cancellation.clone();
                async move { cancellation.sweep_abandoned_events().await.map(|_| ()) }
            },
        )));

        let cancellation = self.cancellation.clone();
        handles.push(tokio::spawn(run_periodic(
            "auto_finalize",
            self.config.auto_finalize_interval(),
            shutdown.clone(),
            move || {
                let cancellation = cancellation.clone();
                async move { cancellation.sweep_stale_events().await.map(|_| ()) }
            },
        )));

        let participations = self.participations.clone();
        let entry = self.entry.clone();
        handles.push(tokio::spawn(run_periodic(
            "waiting_list_requeue",
            self.config.waiting_list_requeue_interval(),
            shutdown.clone(),
            move || {
                let participations = participations.clone();
                // the entry gate's attempt counters ride on this tick
                entry.prune_attempt_counters();
                async move {
                    participations
                        .waiting_list()
                        .requeue_stale(&participations)
                        .await
                        .map(|_| ())
                }
            },
        )));

        if let Some(dispatcher) = self.dispatcher.clone() {
            handles.push(tokio::spawn(run_periodic(
                "outbox",
                self.config.outbox_interval(),
                shutdown,
                move || {
                    let dispatcher = dispatcher.clone();
                    async move { dispatcher.dispatch_pending().await.map(|_| ()) }
                },
            )));
        }

        info!(tasks = handles.len(), "Scheduler started");
        handles
    }
}

async fn run_periodic<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(pass = name, period_secs = period.as_secs(), "Periodic pass scheduled");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let span = info_span!("periodic_pass", pass = name, pass_id = %Uuid::new_v4());
                if let Err(e) = pass().instrument(span).await {
                    error!(pass = name, error = %e, severity = %e.severity(), "Periodic pass failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(pass = name, "Periodic pass stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_periodic_pass_runs_until_shutdown() {
        let runs = Arc::new(AtomicU32::new(0));
        let (tx, rx) = watch::channel(false);

        let counter = runs.clone();
        let handle = tokio::spawn(run_periodic("test", Duration::from_millis(10), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        tokio::time::sleep(Duration::from_millis(55)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let seen = runs.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several runs, saw {}", seen);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_failing_pass_keeps_loop_alive() {
        let runs = Arc::new(AtomicU32::new(0));
        let (tx, rx) = watch::channel(false);

        let counter = runs.clone();
        let handle = tokio::spawn(run_periodic("failing", Duration::from_millis(10), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(crate::utils::errors::EncontroError::Store("down".to_string()))
            }
        }));

        tokio::time::sleep(Duration::from_millis(45)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
