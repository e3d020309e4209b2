use crate::digest::{DigestGenerator, DigestOutcome};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use match_store::SharedStores;
use std::sync::Arc;
use std::time::Duration;
use threadwatch_core::ErrorReporter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Wall clock the monitor and the digest schedule read from.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local wall time at `instant`.
    fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime;

    /// Earliest instant at which the wall clock reads `local`, `None` inside a DST gap.
    fn resolve_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>>;

    fn local_now(&self) -> NaiveDateTime {
        self.local(self.now())
    }
}

/// The host clock in the host time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&Local).naive_local()
    }

    fn resolve_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        Local
            .from_local_datetime(&local)
            .earliest()
            .map(|instant| instant.with_timezone(&Utc))
    }
}

/// Real time left until the next local midnight, and the date that midnight closes.
///
/// Measured between instants, so a day with a DST change waits 23 or 25 hours.
/// When midnight itself is skipped by a spring-forward gap, the first wall hour
/// that exists stands in for it.
pub fn next_midnight(clock: &dyn Clock) -> (Duration, NaiveDate) {
    let now = clock.now();
    let local_now = clock.local(now);
    let today = local_now.date();
    let tomorrow = today.succ_opt().unwrap_or(today);

    let target = (0..4)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| clock.resolve_local(tomorrow.and_time(time)));
    let remaining = match target {
        Some(target) => target - now,
        None => tomorrow.and_time(NaiveTime::MIN) - local_now,
    };
    (remaining.to_std().unwrap_or(Duration::ZERO), today)
}

/// Runs the digest at every local midnight until `shutdown` flips to true.
pub fn spawn_daily_digest(
    generator: Arc<DigestGenerator>,
    stores: SharedStores,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reporter = ErrorReporter::new();
        loop {
            let (delay, ended_day) = next_midnight(clock.as_ref());
            debug!(seconds = delay.as_secs(), %ended_day, "Digest scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    let stopping = changed.is_err() || *shutdown.borrow();
                    if stopping {
                        break;
                    }
                    continue;
                }
            }

            // The day is only over once the wall clock has rolled past it.
            let today = clock.local_now().date();
            if today <= ended_day {
                debug!(%ended_day, %today, "Woke before midnight, rescheduling");
                continue;
            }

            match generator.generate(&stores, ended_day).await {
                Ok(DigestOutcome::Sent { records }) => {
                    info!(%ended_day, records, "Midnight digest delivered")
                }
                Ok(DigestOutcome::NoData) => {}
                Err(e) => reporter.report_error("daily digest", &e),
            }
        }
        info!("Digest scheduler stopped");
    })
}
