use threadwatch_core::{
    ConfigError, CoreError, ErrorExt, ErrorReporter, LlmError, MailError, RedditApiError,
    StoreError,
};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let store_error = CoreError::Store(StoreError::WriteFailed {
        path: "tracking.csv".to_string(),
        reason: "disk full".to_string(),
    });
    assert_eq!(store_error.error_code(), "STORE");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let mail_error = CoreError::Mail(MailError::DeliveryFailed {
        reason: "connection refused".to_string(),
    });
    assert_eq!(mail_error.error_code(), "MAIL");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "monitor.keywords".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_nested_error_codes() {
    assert_eq!(
        RedditApiError::RateLimitExceeded { retry_after: 60 }.error_code(),
        "REDDIT_RATE_LIMIT"
    );
    assert_eq!(
        StoreError::MalformedRow {
            path: "results.csv".to_string(),
            line: 4,
            reason: "invalid timestamp".to_string(),
        }
        .error_code(),
        "STORE_MALFORMED_ROW"
    );
    assert_eq!(
        LlmError::EmptyCompletion {
            provider: "openai".to_string()
        }
        .error_code(),
        "LLM_EMPTY_COMPLETION"
    );
}

#[test]
fn test_from_conversions() {
    let err: CoreError = MailError::InvalidAddress {
        address: "nobody".to_string(),
    }
    .into();
    assert!(matches!(err, CoreError::Mail(MailError::InvalidAddress { .. })));

    let err: CoreError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert_eq!(err.error_code(), "IO");
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "OPENAI_API_KEY".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("OPENAI_API_KEY"));

    let store_error = CoreError::Store(StoreError::MalformedRow {
        path: "results.csv".to_string(),
        line: 7,
        reason: "bad type".to_string(),
    });
    let message = store_error.user_friendly_message();
    assert!(message.contains("Row 7"));
    assert!(message.contains("results.csv"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new();
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // This test just ensures the methods don't panic
    reporter.report_error("collect", &error);
    reporter.report_warning("collect", &error);
}
