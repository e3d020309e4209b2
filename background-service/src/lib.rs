//! Polling loop and midnight digest for the keyword monitor.
//!
//! Every cycle runs the [`Collector`] and then the [`Reconciler`]; the digest
//! task runs on its own timeline. Both share one [`SharedStores`] guard.

use chrono::{NaiveDate, NaiveDateTime};
use llm_interface::LlmProvider;
use match_store::SharedStores;
use notifier::Mailer;
use reddit_client::ContentSource;
use std::sync::Arc;
use std::time::Duration;
use threadwatch_core::{CoreError, ErrorReporter, MonitorConfig};
use tokio::sync::watch;
use tracing::{info, warn};

pub mod collector;
pub mod digest;
pub mod reconciler;
pub mod scheduler;


pub use collector::{CollectReport, Collector};
pub use digest::{DigestGenerator, DigestOutcome, DIGEST_SYSTEM_PROMPT};
pub use reconciler::{ReconcilePlan, ReconcileReport, Reconciler};
pub use scheduler::{next_midnight, spawn_daily_digest, Clock, SystemClock};

/// Outcome of one collect + reconcile cycle. `None` means that step failed and was logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub collected: Option<CollectReport>,
    pub reconciled: Option<ReconcileReport>,
}

/// Stops a running [`BackgroundService`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

pub struct BackgroundService {
    collector: Collector,
    reconciler: Reconciler,
    digest: Arc<DigestGenerator>,
    stores: SharedStores,
    poll_interval: Duration,
    reporter: ErrorReporter,
    clock: Arc<dyn Clock>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl BackgroundService {
    pub fn new(
        collector: Collector,
        reconciler: Reconciler,
        digest: DigestGenerator,
        stores: SharedStores,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            collector,
            reconciler,
            digest: Arc::new(digest),
            stores,
            poll_interval,
            reporter: ErrorReporter::new(),
            clock: Arc::new(SystemClock),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Replaces the host clock used for polling cycles and the midnight digest.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wires the three workers from the monitor settings and their collaborators.
    pub fn from_config(
        config: &MonitorConfig,
        source: Arc<dyn ContentSource>,
        mailer: Arc<dyn Mailer>,
        llm: Arc<dyn LlmProvider>,
        stores: SharedStores,
    ) -> Self {
        let matcher = config.keyword_matcher();
        let collector = Collector::new(source, matcher.clone(), config.fetch_limit);
        let reconciler = Reconciler::new(
            matcher,
            mailer.clone(),
            config.window(),
            config.retire_stale_raw,
        );
        let digest = DigestGenerator::new(llm, mailer);
        Self::new(collector, reconciler, digest, stores, config.poll_interval())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: self.shutdown.clone(),
        }
    }

    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle(self.clock.local_now()).await
    }

    /// One cycle against an explicit clock. A collection failure does not skip reconciliation.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> CycleReport {
        let collected = match self.collector.collect(&self.stores).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.reporter.report_error("collection", &e);
                None
            }
        };

        let reconciled = match self.reconciler.reconcile(&self.stores, now).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.reporter.report_error("reconciliation", &e);
                None
            }
        };

        CycleReport {
            collected,
            reconciled,
        }
    }

    pub async fn generate_digest(&self, date: NaiveDate) -> Result<DigestOutcome, CoreError> {
        self.digest.generate(&self.stores, date).await
    }

    /// Polls until a [`ShutdownHandle`] fires.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.stores.lock().await.ensure_exists()?;

        let mut shutdown = self.shutdown.subscribe();
        let digest_task = spawn_daily_digest(
            self.digest.clone(),
            self.stores.clone(),
            self.clock.clone(),
            self.shutdown.subscribe(),
        );

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Background service started"
        );

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
            self.run_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.shutdown.send_replace(true);
        if let Err(e) = digest_task.await {
            warn!("Digest task ended abnormally: {}", e);
        }

        info!("Background service stopped");
        Ok(())
    }
}
