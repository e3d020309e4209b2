use chrono::NaiveDate;
use llm_interface::LlmProvider;
use match_store::SharedStores;
use notifier::{digest_subject, render_daily_digest, Mailer};
use std::sync::Arc;
use threadwatch_core::{CoreError, MatchRecord};
use tracing::info;

pub const DIGEST_SYSTEM_PROMPT: &str = "You are an expert assistant in creating data reports to identify real needs of people and then come up with ideas to solve those needs for a software project. You should choose the best data that contains a real problem and use it to create the report to identify pain points, features to solve them, and ideas derived from them that may be viable. Ignore data that is not relevant or does not contain a problem or need.";

pub fn digest_user_prompt(data: &str) -> String {
    format!("Create a report from this data in Markdown format:\n\n{}", data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    NoData,
    Sent { records: usize },
}

/// Summarises one day of tracked matches through the LLM and mails the report.
pub struct DigestGenerator {
    llm: Arc<dyn LlmProvider>,
    mailer: Arc<dyn Mailer>,
}

impl DigestGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, mailer: Arc<dyn Mailer>) -> Self {
        Self { llm, mailer }
    }

    pub async fn generate(
        &self,
        stores: &SharedStores,
        date: NaiveDate,
    ) -> Result<DigestOutcome, CoreError> {
        let records: Vec<MatchRecord> = {
            let guard = stores.lock().await;
            guard.tracking.ensure_exists()?;
            guard
                .tracking
                .load()?
                .into_iter()
                .filter(|record| record.date() == date)
                .collect()
        };

        if records.is_empty() {
            info!(%date, "No tracked matches for digest");
            return Ok(DigestOutcome::NoData);
        }

        let data = serde_json::to_string(&records)?;
        let report = self
            .llm
            .complete(DIGEST_SYSTEM_PROMPT, &digest_user_prompt(&data))
            .await?;

        let date_label = date.format("%Y-%m-%d").to_string();
        let body = render_daily_digest(&date_label, records.len(), &report)?;
        self.mailer.send(&digest_subject(&date_label), &body).await?;

        info!(%date, records = records.len(), provider = self.llm.name(), "Daily digest sent");
        Ok(DigestOutcome::Sent {
            records: records.len(),
        })
    }
}
