use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use threadwatch_core::{CoreError, RedditApiError, RedditComment, RedditPost};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Reddit never returns more than this many items per listing page.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub link_id: Option<String>,
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String, base_url: String, timeout: Duration) -> Result<Self, CoreError> {
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth()));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

        self.observe_rate_limit_headers(response.headers()).await;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let err = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => match subreddit_of(endpoint) {
                Some(subreddit) => RedditApiError::SubredditNotFound {
                    subreddit: subreddit.to_string(),
                },
                None => RedditApiError::InvalidResponse {
                    details: format!("Not found: {}", endpoint),
                },
            },
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => RedditApiError::InvalidResponse {
                details: format!("Unexpected status {}", code),
            },
        };
        Err(CoreError::RedditApi(err))
    }

    async fn observe_rate_limit_headers(&self, headers: &HeaderMap) {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
        };

        if let (Some(remaining), Some(reset)) =
            (read("x-ratelimit-remaining"), read("x-ratelimit-reset"))
        {
            self.rate_limiter
                .observe_server_budget(remaining, Duration::from_secs_f64(reset.max(0.0)))
                .await;
        }
    }

    /// Fetches one page of a listing endpoint such as `/r/all/new`.
    pub async fn get_listing<T: DeserializeOwned>(
        &self,
        access_token: &str,
        endpoint: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<T>, CoreError> {
        let limit_str = limit.min(MAX_PAGE_SIZE).to_string();
        let mut params = Vec::with_capacity(3);
        params.push(("limit", limit_str.as_str()));
        params.push(("raw_json", "1"));
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let response = self
            .make_request(Method::GET, endpoint, access_token, Some(params.as_slice()))
            .await?;

        let listing: RedditListing<T> = response.json().await.map_err(|e| {
            error!("Failed to parse listing {}: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse listing {}", endpoint),
            })
        })?;

        info!(
            "Retrieved {} items from {}",
            listing.data.children.len(),
            endpoint
        );
        Ok(listing)
    }

    pub async fn available_tokens(&self) -> u32 {
        self.rate_limiter.available_tokens().await
    }
}

pub fn new_posts_endpoint(subreddit: &str) -> String {
    format!("/r/{}/new", subreddit)
}

pub fn comments_endpoint(subreddit: &str) -> String {
    format!("/r/{}/comments", subreddit)
}

/// Subreddit name of a `/r/{name}/...` endpoint.
fn subreddit_of(endpoint: &str) -> Option<&str> {
    endpoint
        .strip_prefix("/r/")?
        .split('/')
        .next()
        .filter(|name| !name.is_empty())
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            content: if post_data.selftext.trim().is_empty() {
                None
            } else {
                Some(post_data.selftext)
            },
            subreddit: post_data.subreddit,
            url: post_data.url,
            permalink: post_data.permalink,
            created_utc: post_data.created_utc as i64,
        }
    }
}

impl From<RedditCommentData> for RedditComment {
    fn from(comment_data: RedditCommentData) -> Self {
        Self {
            id: comment_data.id,
            body: comment_data.body,
            subreddit: comment_data.subreddit,
            permalink: comment_data.permalink,
            created_utc: comment_data.created_utc as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        let client = RedditApiClient::new(
            "test-user-agent/1.0".to_string(),
            format!("{}/", REDDIT_API_BASE),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, REDDIT_API_BASE);
        assert!(tokio_test::block_on(client.available_tokens()) > 0);
    }

    #[test]
    fn test_subreddit_of_endpoint() {
        assert_eq!(subreddit_of("/r/startups/new"), Some("startups"));
        assert_eq!(subreddit_of(&comments_endpoint("all")), Some("all"));
        assert_eq!(subreddit_of("/api/v1/me"), None);
        assert_eq!(subreddit_of("/r//new"), None);
    }

    #[test]
    fn test_listing_endpoints() {
        assert_eq!(new_posts_endpoint("all"), "/r/all/new");
        assert_eq!(comments_endpoint("rust"), "/r/rust/comments");
    }

    #[test]
    fn test_reddit_post_conversion() {
        let post_data = RedditPostData {
            id: "test123".to_string(),
            title: "Test Post".to_string(),
            selftext: "This is test content".to_string(),
            author: "test_user".to_string(),
            subreddit: "test".to_string(),
            url: "https://reddit.com/r/test/comments/test123".to_string(),
            permalink: "/r/test/comments/test123/test_post/".to_string(),
            created_utc: 1640995200.0,
            is_self: true,
        };

        let reddit_post: RedditPost = post_data.into();
        assert_eq!(reddit_post.id, "test123");
        assert_eq!(reddit_post.title, "Test Post");
        assert_eq!(
            reddit_post.content,
            Some("This is test content".to_string())
        );
        assert_eq!(reddit_post.permalink, "/r/test/comments/test123/test_post/");
        assert_eq!(reddit_post.created_utc, 1640995200);
    }

    #[test]
    fn test_link_post_has_no_content() {
        let post_data: RedditPostData = serde_json::from_value(serde_json::json!({
            "id": "lnk1",
            "title": "Check this out",
            "subreddit": "news",
            "url": "https://example.com/article",
            "permalink": "/r/news/comments/lnk1/check_this_out/",
            "created_utc": 1640995200.0
        }))
        .unwrap();

        let reddit_post: RedditPost = post_data.into();
        assert_eq!(reddit_post.content, None);
        assert_eq!(reddit_post.searchable_text(), "Check this out");
    }

    #[test]
    fn test_comment_listing_deserialization() {
        let listing: RedditListing<RedditCommentData> =
            serde_json::from_value(serde_json::json!({
                "kind": "Listing",
                "data": {
                    "after": "t1_def",
                    "before": null,
                    "dist": 1,
                    "children": [{
                        "kind": "t1",
                        "data": {
                            "id": "def",
                            "body": "Where I find a good accountant?",
                            "author": "someone",
                            "subreddit": "smallbusiness",
                            "permalink": "/r/smallbusiness/comments/abc/title/def/",
                            "created_utc": 1700000000.0,
                            "link_id": "t3_abc"
                        }
                    }]
                }
            }))
            .unwrap();

        assert_eq!(listing.data.after.as_deref(), Some("t1_def"));
        let comment: RedditComment = listing.data.children[0].data.clone().into();
        assert_eq!(comment.body, "Where I find a good accountant?");
        assert_eq!(comment.created_utc, 1_700_000_000);
    }
}
