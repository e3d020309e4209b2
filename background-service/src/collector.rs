use match_store::SharedStores;
use reddit_client::ContentSource;
use std::sync::Arc;
use threadwatch_core::{CoreError, KeywordMatcher, MatchRecord, RedditComment, RedditPost};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub comments_scanned: usize,
    pub posts_scanned: usize,
    pub matched: usize,
}

/// Pulls the latest comments and submissions and stages keyword hits in the raw store.
pub struct Collector {
    source: Arc<dyn ContentSource>,
    matcher: KeywordMatcher,
    fetch_limit: u32,
}

impl Collector {
    pub fn new(source: Arc<dyn ContentSource>, matcher: KeywordMatcher, fetch_limit: u32) -> Self {
        Self {
            source,
            matcher,
            fetch_limit,
        }
    }

    pub async fn collect(&self, stores: &SharedStores) -> Result<CollectReport, CoreError> {
        let comments = self.source.recent_comments(self.fetch_limit).await?;
        let posts = self.source.recent_posts(self.fetch_limit).await?;

        let records = self.scan(&comments, &posts);
        let report = CollectReport {
            comments_scanned: comments.len(),
            posts_scanned: posts.len(),
            matched: records.len(),
        };

        let guard = stores.lock().await;
        guard.raw.ensure_exists()?;
        if !records.is_empty() {
            guard.raw.append(&records)?;
        }
        drop(guard);

        info!(
            comments = report.comments_scanned,
            posts = report.posts_scanned,
            matched = report.matched,
            "Collection finished"
        );
        Ok(report)
    }

    /// Comments first, then posts, each in listing order. One record per matching item.
    pub fn scan(&self, comments: &[RedditComment], posts: &[RedditPost]) -> Vec<MatchRecord> {
        let mut records = Vec::new();

        for comment in comments {
            if self.matcher.matches(&comment.body) {
                debug!(id = %comment.id, subreddit = %comment.subreddit, "Comment matched");
                records.push(MatchRecord::from_comment(comment));
            }
        }

        for post in posts {
            if self.matcher.matches(&post.searchable_text()) {
                debug!(id = %post.id, subreddit = %post.subreddit, "Post matched");
                records.push(MatchRecord::from_post(post));
            }
        }

        records
    }
}
