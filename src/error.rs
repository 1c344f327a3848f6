use reqwest::StatusCode;
use thiserror::Error;

/// 單次請求失敗的原因
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("malformed body: {0}")]
    Body(String),
}

/// 重試用盡後仍失敗的請求，保留最後一次的錯誤
#[derive(Debug, Error)]
#[error("Failed to fetch {url} after {attempts} attempts; last error: {source}")]
pub struct FetchError {
    pub url: String,
    pub attempts: usize,
    #[source]
    pub source: FetchFailure,
}

/// 資料庫操作失敗，`step` 標示發生在哪個步驟
#[derive(Debug, Error)]
#[error("Failed to {step} because {source}")]
pub struct DatabaseError {
    pub step: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl DatabaseError {
    pub fn new(step: &'static str, source: sqlx::Error) -> Self {
        DatabaseError { step, source }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Failed to load config because {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to build HTTP client because {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = FetchError {
            url: "https://example.com/feed".to_string(),
            attempts: 2,
            source: FetchFailure::Status(StatusCode::BAD_GATEWAY),
        };

        assert_eq!(
            err.to_string(),
            "Failed to fetch https://example.com/feed after 2 attempts; last error: unexpected status 502 Bad Gateway"
        );

        let top: Error = err.into();
        assert!(matches!(top, Error::Fetch(_)));
    }

    #[test]
    fn test_database_error_message() {
        let err = DatabaseError::new("upsert stock_symbols", sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("Failed to upsert stock_symbols because"));
    }
}
