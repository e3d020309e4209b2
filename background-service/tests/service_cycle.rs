use async_trait::async_trait;
use background_service::BackgroundService;
use llm_interface::LlmProvider;
use match_store::{MatchStores, SharedStores};
use notifier::Mailer;
use reddit_client::ContentSource;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use threadwatch_core::{CoreError, MonitorConfig, RedditComment, RedditPost};

struct LiveFeed {
    created_utc: i64,
}

#[async_trait]
impl ContentSource for LiveFeed {
    async fn recent_comments(&self, _limit: u32) -> Result<Vec<RedditComment>, CoreError> {
        Ok(vec![
            RedditComment {
                id: "k1".to_string(),
                body: "Does anyone know how to solve duplicate invoices?".to_string(),
                subreddit: "smallbusiness".to_string(),
                permalink: "/r/smallbusiness/comments/abc/invoices/k1/".to_string(),
                created_utc: self.created_utc,
            },
            RedditComment {
                id: "k2".to_string(),
                body: "Great photo".to_string(),
                subreddit: "pics".to_string(),
                permalink: "/r/pics/comments/def/photo/k2/".to_string(),
                created_utc: self.created_utc,
            },
        ])
    }

    async fn recent_posts(&self, _limit: u32) -> Result<Vec<RedditPost>, CoreError> {
        Ok(vec![RedditPost {
            id: "p9".to_string(),
            title: "I need help for my bakery website".to_string(),
            content: None,
            subreddit: "webdev".to_string(),
            url: "https://example.com/bakery".to_string(),
            permalink: "/r/webdev/comments/p9/bakery/".to_string(),
            created_utc: self.created_utc,
        }])
    }
}

#[derive(Default)]
struct Outbox {
    subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, subject: &str, _html_body: &str) -> Result<(), CoreError> {
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

struct SilentLlm;

#[async_trait]
impl LlmProvider for SilentLlm {
    fn name(&self) -> &str {
        "silent"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, CoreError> {
        Ok("# Report".to_string())
    }
}

#[tokio::test]
async fn test_repeated_polls_alert_once_per_item() {
    let dir = TempDir::new().unwrap();
    let config = MonitorConfig {
        results_path: dir.path().join("results.csv"),
        tracking_path: dir.path().join("tracking.csv"),
        ..MonitorConfig::default()
    };
    let stores = SharedStores::new(MatchStores::new(
        &config.results_path,
        &config.tracking_path,
    ));
    let outbox = Arc::new(Outbox::default());

    let service = BackgroundService::from_config(
        &config,
        Arc::new(LiveFeed {
            created_utc: chrono::Utc::now().timestamp() - 5,
        }),
        outbox.clone(),
        Arc::new(SilentLlm),
        stores.clone(),
    );

    let first = service.run_once().await;
    assert_eq!(first.collected.map(|c| c.matched), Some(2));
    assert_eq!(first.reconciled.map(|r| r.fresh), Some(2));

    let subjects = outbox.subjects.lock().unwrap().clone();
    assert_eq!(
        subjects,
        vec![
            "Threadwatch found something: I need help for".to_string(),
            "Threadwatch found something: how to solve".to_string(),
        ]
    );

    let second = service.run_once().await;
    assert_eq!(second.reconciled.map(|r| r.fresh), Some(0));
    assert_eq!(outbox.subjects.lock().unwrap().len(), 2);

    let guard = stores.lock().await;
    let tracking = guard.tracking.load().unwrap();
    assert_eq!(tracking.len(), 2);
    assert!(tracking
        .iter()
        .any(|r| r.url == "https://www.reddit.com/r/webdev/comments/p9/bakery/"));

    // Second poll staged the same items again; they stay until they age out.
    assert_eq!(guard.raw.load().unwrap().len(), 2);
}
