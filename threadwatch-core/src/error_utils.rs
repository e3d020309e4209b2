use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Store(e) => {
                error!("Store error details: {:?}", e);
            }
            CoreError::Llm(e) => {
                error!("LLM error details: {:?}", e);
            }
            CoreError::Mail(e) => {
                error!("Mail error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Store(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Mail(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Io(_) => "A file could not be read or written.".to_string(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::Serialization(_) => {
                "Matches could not be prepared for the report. The next cycle will try again."
                    .to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::Store(_) => "STORE".to_string(),
            CoreError::Llm(_) => "LLM".to_string(),
            CoreError::Mail(_) => "MAIL".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit authentication failed. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Reddit asked to wait {} seconds.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. You may not have permission to view this content.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit '{}' not found or is private.", subreddit)
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid. A new token will be requested.".to_string()
            }
            RedditApiError::RequestTimeout => "Request to Reddit timed out.".to_string(),
            _ => "Reddit API error occurred.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for StoreError {
    fn log_error(&self) -> &Self {
        error!("StoreError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("StoreError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StoreError::ReadFailed { path, .. } => format!("Could not read '{}'.", path),
            StoreError::WriteFailed { path, .. } => format!("Could not write '{}'.", path),
            StoreError::MalformedRow { path, line, .. } => format!(
                "Row {} of '{}' is malformed. Fix or remove it to resume processing.",
                line, path
            ),
            StoreError::UnexpectedHeader { path, .. } => format!(
                "'{}' does not have the expected date,type,subreddit,content,url header.",
                path
            ),
            StoreError::Csv(_) => "A results file could not be processed.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            StoreError::ReadFailed { .. } => "STORE_READ_FAILED".to_string(),
            StoreError::WriteFailed { .. } => "STORE_WRITE_FAILED".to_string(),
            StoreError::MalformedRow { .. } => "STORE_MALFORMED_ROW".to_string(),
            StoreError::UnexpectedHeader { .. } => "STORE_UNEXPECTED_HEADER".to_string(),
            StoreError::Csv(_) => "STORE_CSV_ERROR".to_string(),
        }
    }
}

impl ErrorExt for LlmError {
    fn log_error(&self) -> &Self {
        error!("LlmError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("LlmError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::InvalidApiKey { provider } => {
                format!("The API key for {} is invalid or missing.", provider)
            }
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!(
                "{} rate limit reached. Try again in {} seconds.",
                provider, retry_after
            ),
            LlmError::ModelNotAvailable { model } => {
                format!("The model '{}' is not available.", model)
            }
            LlmError::ServiceUnavailable { provider } => {
                format!("{} is currently unavailable.", provider)
            }
            LlmError::RequestTimeout { provider } => {
                format!("The request to {} timed out.", provider)
            }
            _ => "The language model request failed.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            LlmError::InvalidApiKey { .. } => "LLM_INVALID_API_KEY".to_string(),
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMIT".to_string(),
            LlmError::ModelNotAvailable { .. } => "LLM_MODEL_NOT_AVAILABLE".to_string(),
            LlmError::ServiceUnavailable { .. } => "LLM_SERVICE_UNAVAILABLE".to_string(),
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT".to_string(),
            LlmError::RequestFailed { .. } => "LLM_REQUEST_FAILED".to_string(),
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE".to_string(),
            LlmError::EmptyCompletion { .. } => "LLM_EMPTY_COMPLETION".to_string(),
        }
    }
}

impl ErrorExt for MailError {
    fn log_error(&self) -> &Self {
        error!("MailError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("MailError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            MailError::InvalidAddress { address } => {
                format!("'{}' is not a valid email address.", address)
            }
            MailError::DeliveryFailed { .. } => {
                "The email could not be delivered. Check the SMTP credentials.".to_string()
            }
            _ => "The email could not be prepared.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            MailError::InvalidAddress { .. } => "MAIL_INVALID_ADDRESS".to_string(),
            MailError::BuildFailed { .. } => "MAIL_BUILD_FAILED".to_string(),
            MailError::DeliveryFailed { .. } => "MAIL_DELIVERY_FAILED".to_string(),
            MailError::TemplateFailed { .. } => "MAIL_TEMPLATE_FAILED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs errors that a cycle swallows so the loop can keep running.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, context: &str, error: &CoreError) {
        error!(operation = context, code = %error.error_code(), "{} failed", context);
        error.log_error();
        info!("User message: {}", error.user_friendly_message());
    }

    pub fn report_warning(&self, context: &str, error: &CoreError) {
        warn!(operation = context, code = %error.error_code(), "{} degraded", context);
        error.log_warn();
    }
}
