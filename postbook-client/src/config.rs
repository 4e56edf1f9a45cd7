use crate::error::PostbookError;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://jsonplaceholder.typicode.com";

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_COMMENTS_SHOWN: usize = 3;
pub const COMMENTS_SHOWN_INCREMENT: usize = 2;

/// Connection settings for [`crate::http_client::HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, PostbookError> {
        let defaults = Self::default();

        Ok(Self {
            base_url: std::env::var("POSTBOOK_API_URL").unwrap_or(defaults.base_url),
            timeout: env_parse::<u64>("POSTBOOK_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: env_parse::<u64>("POSTBOOK_CONNECT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Window sizes for the post and comment lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub page_size: usize,
    pub comments_shown: usize,
    pub comments_increment: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            comments_shown: DEFAULT_COMMENTS_SHOWN,
            comments_increment: COMMENTS_SHOWN_INCREMENT,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Result<Self, PostbookError> {
        let defaults = Self::default();

        let config = Self {
            page_size: env_parse("POSTBOOK_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            comments_shown: env_parse("POSTBOOK_COMMENTS_SHOWN")?
                .unwrap_or(defaults.comments_shown),
            comments_increment: env_parse("POSTBOOK_COMMENTS_INCREMENT")?
                .unwrap_or(defaults.comments_increment),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PostbookError> {
        if self.page_size == 0 {
            return Err(PostbookError::ConfigError(
                "page size must be at least 1".to_string(),
            ));
        }
        if self.comments_increment == 0 {
            return Err(PostbookError::ConfigError(
                "comment increment must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, PostbookError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            PostbookError::ConfigError(format!("{} is not a valid number: {:?}", key, raw))
        }),
        Err(_) => Ok(None),
    }
}
