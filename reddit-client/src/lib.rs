use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, TokenResponse, TokenUrl};
use serde::de::DeserializeOwned;
use std::time::{Duration, SystemTime};
use threadwatch_core::{
    ConfigError, CoreError, RedditApiError, RedditComment, RedditConfig, RedditPost,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod api;
pub mod rate_limiter;


pub use api::RedditApiClient;

const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

/// Tokens are refreshed this long before Reddit would expire them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Read-only access to the most recent items of a listing.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn recent_comments(&self, limit: u32) -> Result<Vec<RedditComment>, CoreError>;

    async fn recent_posts(&self, limit: u32) -> Result<Vec<RedditPost>, CoreError>;
}

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_fresh(&self) -> bool {
        SystemTime::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

/// Application-only Reddit client: authenticates with the client-credentials
/// grant and reads public listings.
pub struct RedditClient {
    config: RedditConfig,
    api: RedditApiClient,
    oauth: BasicClient,
    token_http: reqwest::Client,
    token: Mutex<Option<RedditToken>>,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "reddit.authorize_url".to_string(),
                value: e.to_string(),
            }
        })?;
        let token_url =
            TokenUrl::new(config.token_url.clone()).map_err(|_| ConfigError::InvalidValue {
                field: "reddit.token_url".to_string(),
                value: config.token_url.clone(),
            })?;

        let oauth = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let timeout = Duration::from_secs(config.request_timeout_secs);

        // Reddit rejects token requests without a descriptive user agent.
        let token_http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let api = RedditApiClient::new(
            config.user_agent.clone(),
            config.api_base_url.clone(),
            timeout,
        )?;

        Ok(Self {
            config,
            api,
            oauth,
            token_http,
            token: Mutex::new(None),
        })
    }

    pub fn subreddit(&self) -> &str {
        &self.config.subreddit
    }

    pub async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Returns a cached bearer token, requesting a new one when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        debug!("Requesting application-only Reddit token");
        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(|request| send_token_request(&self.token_http, request))
            .await
            .map_err(|e| RedditApiError::AuthenticationFailed {
                reason: e.to_string(),
            })?;

        let lifetime = response
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.as_str().to_owned()).collect())
            .unwrap_or_default();

        info!("Authenticated with Reddit, token valid for {:?}", lifetime);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }

    /// Walks a listing with `after` cursors until `limit` items or the end.
    async fn collect_listing<T>(&self, endpoint: &str, limit: u32) -> Result<Vec<T>, CoreError>
    where
        T: DeserializeOwned + Send,
    {
        let limit = limit as usize;
        let mut items: Vec<T> = Vec::with_capacity(limit);
        let mut after: Option<String> = None;

        while items.len() < limit {
            let page_size = (limit - items.len()).min(api::MAX_PAGE_SIZE as usize) as u32;
            let access_token = self.access_token().await?;

            let listing = match self
                .api
                .get_listing::<T>(&access_token, endpoint, page_size, after.as_deref())
                .await
            {
                Err(e @ CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                    warn!("Reddit rejected the cached token, it will be renewed");
                    self.invalidate_token().await;
                    return Err(e);
                }
                other => other?,
            };

            let page_len = listing.data.children.len();
            let remaining_budget = self.api.available_tokens().await;
            debug!(
                endpoint,
                page_len,
                remaining_budget,
                "Listing page received"
            );
            items.extend(listing.data.children.into_iter().map(|child| child.data));

            match listing.data.after {
                Some(next) if page_len > 0 => after = Some(next),
                _ => break,
            }
        }

        items.truncate(limit);
        Ok(items)
    }

    pub async fn fetch_comments(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<RedditComment>, CoreError> {
        let comments = self
            .collect_listing::<api::RedditCommentData>(&api::comments_endpoint(subreddit), limit)
            .await?;
        Ok(comments.into_iter().map(RedditComment::from).collect())
    }

    pub async fn fetch_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let posts = self
            .collect_listing::<api::RedditPostData>(&api::new_posts_endpoint(subreddit), limit)
            .await?;
        Ok(posts.into_iter().map(RedditPost::from).collect())
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn recent_comments(&self, limit: u32) -> Result<Vec<RedditComment>, CoreError> {
        self.fetch_comments(self.subreddit(), limit).await
    }

    async fn recent_posts(&self, limit: u32) -> Result<Vec<RedditPost>, CoreError> {
        self.fetch_posts(self.subreddit(), limit).await
    }
}

/// Token endpoint transport for `oauth2`, sharing the configured user agent.
async fn send_token_request(
    client: &reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let mut builder = client
        .request(request.method, request.url.as_str())
        .body(request.body);
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }

    let response = builder.send().await?;
    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
