//! HTML bodies for the alert and digest emails.
//!
//! Both templates are registered under `.html` names so minijinja escapes
//! every interpolated value unless it is explicitly marked `safe`.

use minijinja::{context, Environment};
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;
use threadwatch_core::{timestamp_format, CoreError, MailError, MatchRecord};

const MATCH_ALERT: &str = "match_alert.html";
const DAILY_DIGEST: &str = "daily_digest.html";

#[derive(Debug, Serialize)]
struct AlertItem<'a> {
    kind: &'static str,
    subreddit: &'a str,
    url: &'a str,
    content: &'a str,
    timestamp: String,
}

fn build_env() -> Result<Environment<'static>, CoreError> {
    let mut env = Environment::new();
    env.add_template(MATCH_ALERT, include_str!("../templates/match_alert.html"))
        .map_err(template_failed)?;
    env.add_template(DAILY_DIGEST, include_str!("../templates/daily_digest.html"))
        .map_err(template_failed)?;
    Ok(env)
}

fn template_failed(error: minijinja::Error) -> MailError {
    MailError::TemplateFailed {
        reason: error.to_string(),
    }
}

pub fn alert_subject(keyword: &str) -> String {
    format!("Threadwatch found something: {}", keyword)
}

pub fn digest_subject(date: &str) -> String {
    format!("Daily Reddit Report - {}", date)
}

/// One email body listing every new match for a keyword.
pub fn render_match_alert(
    keyword: &str,
    records: &[&MatchRecord],
    window_minutes: i64,
) -> Result<String, CoreError> {
    let items: Vec<AlertItem<'_>> = records
        .iter()
        .map(|record| AlertItem {
            kind: record.kind.label(),
            subreddit: &record.subreddit,
            url: &record.url,
            content: &record.content,
            timestamp: record
                .timestamp
                .format(timestamp_format::FORMAT)
                .to_string(),
        })
        .collect();

    let env = build_env()?;
    let template = env.get_template(MATCH_ALERT).map_err(template_failed)?;
    let body = template
        .render(context! { keyword, items, window_minutes })
        .map_err(template_failed)?;
    Ok(body)
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);
    body
}

/// Wraps the model's Markdown report in the digest email layout.
pub fn render_daily_digest(
    date: &str,
    record_count: usize,
    report_markdown: &str,
) -> Result<String, CoreError> {
    let report = markdown_to_html(report_markdown);

    let env = build_env()?;
    let template = env.get_template(DAILY_DIGEST).map_err(template_failed)?;
    let body = template
        .render(context! { date, record_count, report })
        .map_err(template_failed)?;
    Ok(body)
}
