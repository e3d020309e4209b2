use chrono::{Duration, NaiveDateTime};
use match_store::SharedStores;
use notifier::{alert_subject, render_match_alert, Mailer};
use std::collections::HashSet;
use std::sync::Arc;
use threadwatch_core::{CoreError, ErrorReporter, Keyword, KeywordMatcher, MatchRecord};
use tracing::{debug, info};

/// What one reconciliation pass does to the two stores.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    /// Records inside the window whose URL has never been tracked, first occurrence per URL.
    pub fresh: Vec<MatchRecord>,
    pub remaining_raw: Vec<MatchRecord>,
    pub retired: usize,
}

impl ReconcilePlan {
    pub fn changes_raw(&self) -> bool {
        !self.fresh.is_empty() || self.retired > 0
    }
}

/// Splits the raw store into fresh matches, rows to keep, and stale rows to drop.
///
/// The window is `(now - window, now]`. A raw row leaves the store when its URL
/// is fresh, wherever it sits, or when `retire_stale` is set and the row is at
/// or before the window start.
pub fn plan(
    raw: Vec<MatchRecord>,
    tracking: &[MatchRecord],
    now: NaiveDateTime,
    window: Duration,
    retire_stale: bool,
) -> ReconcilePlan {
    let window_start = now
        .checked_sub_signed(window)
        .unwrap_or(NaiveDateTime::MIN);
    let tracked: HashSet<&str> = tracking.iter().map(|r| r.url.as_str()).collect();

    let mut fresh_urls: HashSet<String> = HashSet::new();
    let mut fresh = Vec::new();
    for record in &raw {
        let in_window = record.timestamp > window_start && record.timestamp <= now;
        if in_window
            && !tracked.contains(record.url.as_str())
            && fresh_urls.insert(record.url.clone())
        {
            fresh.push(record.clone());
        }
    }

    let before = raw.len();
    let mut retired = 0;
    let remaining_raw: Vec<MatchRecord> = raw
        .into_iter()
        .filter(|record| !fresh_urls.contains(&record.url))
        .filter(|record| {
            let stale = retire_stale && record.timestamp <= window_start;
            if stale {
                retired += 1;
            }
            !stale
        })
        .collect();

    debug!(
        raw = before,
        fresh = fresh.len(),
        kept = remaining_raw.len(),
        retired,
        "Reconcile plan"
    );

    ReconcilePlan {
        fresh,
        remaining_raw,
        retired,
    }
}

/// Fresh records per keyword, in configured keyword order. Keywords without hits are skipped.
pub fn group_by_keyword<'a>(
    matcher: &'a KeywordMatcher,
    fresh: &'a [MatchRecord],
) -> Vec<(&'a Keyword, Vec<&'a MatchRecord>)> {
    matcher
        .keywords()
        .iter()
        .filter_map(|keyword| {
            let hits: Vec<&MatchRecord> = fresh
                .iter()
                .filter(|record| keyword.is_contained_in(&record.content))
                .collect();
            (!hits.is_empty()).then_some((keyword, hits))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub fresh: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub retired: usize,
}

/// Moves fresh matches from the raw store into tracking, alerting once per keyword.
pub struct Reconciler {
    matcher: KeywordMatcher,
    mailer: Arc<dyn Mailer>,
    window: Duration,
    retire_stale: bool,
    reporter: ErrorReporter,
}

impl Reconciler {
    pub fn new(
        matcher: KeywordMatcher,
        mailer: Arc<dyn Mailer>,
        window: Duration,
        retire_stale: bool,
    ) -> Self {
        Self {
            matcher,
            mailer,
            window,
            retire_stale,
            reporter: ErrorReporter::new(),
        }
    }

    pub async fn reconcile(
        &self,
        stores: &SharedStores,
        now: NaiveDateTime,
    ) -> Result<ReconcileReport, CoreError> {
        let guard = stores.lock().await;
        guard.ensure_exists()?;

        let raw = guard.raw.load()?;
        let tracking = guard.tracking.load()?;
        let plan = plan(raw, &tracking, now, self.window, self.retire_stale);

        let mut report = ReconcileReport {
            fresh: plan.fresh.len(),
            retired: plan.retired,
            ..ReconcileReport::default()
        };

        if !plan.changes_raw() {
            debug!("Nothing new to reconcile");
            return Ok(report);
        }

        let window_minutes = self.window.num_minutes();
        for (keyword, hits) in group_by_keyword(&self.matcher, &plan.fresh) {
            // A failed alert does not keep its records out of tracking.
            match self.send_alert(keyword, &hits, window_minutes).await {
                Ok(()) => report.emails_sent += 1,
                Err(e) => {
                    report.emails_failed += 1;
                    self.reporter.report_warning("match alert", &e);
                }
            }
        }

        if !plan.fresh.is_empty() {
            guard.tracking.append(&plan.fresh)?;
        }
        guard.raw.rewrite(&plan.remaining_raw)?;
        drop(guard);

        info!(
            fresh = report.fresh,
            emails_sent = report.emails_sent,
            emails_failed = report.emails_failed,
            retired = report.retired,
            "Reconciliation finished"
        );
        Ok(report)
    }

    async fn send_alert(
        &self,
        keyword: &Keyword,
        hits: &[&MatchRecord],
        window_minutes: i64,
    ) -> Result<(), CoreError> {
        let body = render_match_alert(&keyword.text, hits, window_minutes)?;
        self.mailer.send(&alert_subject(&keyword.text), &body).await?;
        debug!(keyword = %keyword.text, records = hits.len(), "Alert sent");
        Ok(())
    }
}
