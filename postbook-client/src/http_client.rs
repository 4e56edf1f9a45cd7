use crate::config::ClientConfig;
use crate::error::PostbookError;
use crate::models::{Comment, CommentDraft, Post, PostDraft, User};
use crate::resource::RemoteResource;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

/// [`RemoteResource`] over the JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Fails if the base URL does not parse or the transport cannot be
    /// built with the configured timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self, PostbookError> {
        Url::parse(&config.base_url).map_err(|e| {
            PostbookError::ConfigError(format!("invalid API url {:?}: {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| PostbookError::ConfigError(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PostbookError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!("Request failed: {}", e);
            PostbookError::from(e)
        })?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                tracing::error!("Failed to parse response body: {}", e);
                PostbookError::SerializationError(e.to_string())
            })
        } else {
            Err(Self::status_error(status, text))
        }
    }

    fn status_error(status: StatusCode, body: String) -> PostbookError {
        tracing::error!("Resource returned HTTP {}", status);
        match status {
            StatusCode::NOT_FOUND => PostbookError::NotFound,
            _ => PostbookError::ServerError {
                status: status.as_u16(),
                body,
            },
        }
    }
}

#[async_trait]
impl RemoteResource for HttpClient {
    async fn list_posts(&self) -> Result<Vec<Post>, PostbookError> {
        let url = self.url("/posts");
        tracing::debug!("GET {}", url);
        self.send_json(self.client.get(&url)).await
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, PostbookError> {
        let url = self.url(&format!("/posts/{}/comments", post_id));
        tracing::debug!("GET {}", url);
        self.send_json(self.client.get(&url)).await
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, PostbookError> {
        let url = self.url("/posts");
        tracing::debug!("POST {}", url);
        self.send_json(self.client.post(&url).json(draft)).await
    }

    async fn create_comment(&self, draft: &CommentDraft) -> Result<Comment, PostbookError> {
        let url = self.url(&format!("/posts/{}/comments", draft.post_id));
        tracing::debug!("POST {}", url);
        self.send_json(self.client.post(&url).json(draft)).await
    }

    async fn update_comment(&self, id: i64, patch: &Comment) -> Result<Comment, PostbookError> {
        let url = self.url(&format!("/posts/{}/comments/{}", patch.post_id, id));
        tracing::debug!("PUT {}", url);
        self.send_json(self.client.put(&url).json(patch)).await
    }

    async fn delete_comment(&self, post_id: i64, id: i64) -> Result<(), PostbookError> {
        let url = self.url(&format!("/posts/{}/comments/{}", post_id, id));
        tracing::debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await.map_err(|e| {
            tracing::error!("Request failed: {}", e);
            PostbookError::from(e)
        })?;
        let status = response.status();

        // Body is not guaranteed on success.
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await?;
            Err(Self::status_error(status, text))
        }
    }

    async fn get_user(&self, id: i64) -> Result<User, PostbookError> {
        let url = self.url(&format!("/users/{}", id));
        tracing::debug!("GET {}", url);
        self.send_json(self.client.get(&url)).await
    }
}
