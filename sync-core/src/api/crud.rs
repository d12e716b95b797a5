use super::{error::*, types::*};
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{header, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use solsync::WireItem;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Page size used when walking a whole collection
const PER_PAGE: u32 = 100;

pub struct CrudOperations {
    client: reqwest::Client,
    root: Url,
    token: Option<String>,
    retry: RetryPolicy,
}

impl CrudOperations {
    pub fn new(client: reqwest::Client, root: Url, token: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            root,
            token,
            retry,
        }
    }

    /// URL of a collection, or of one entry in it when `key` is given.
    ///
    /// Keys containing `/` (file paths) become several path segments.
    pub fn endpoint(&self, collection: &str, key: Option<&str>) -> Result<Url> {
        let mut url = self.root.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty().push(collection);
            if let Some(key) = key {
                segments.extend(key.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    /// One page of a collection
    pub async fn list_page(&self, collection: &str, params: &ListParams) -> Result<ListResult<WireItem>> {
        let url = self.endpoint(collection, None)?;
        let operation = || async {
            let response = self.authorized(self.client.get(url.clone()).query(params)).send().await?;
            self.handle_response(response).await
        };

        self.retry_operation(operation).await
    }

    /// Every record of a collection (with automatic pagination)
    pub async fn list(&self, collection: &str) -> Result<Vec<WireItem>> {
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let params = ListParams::new().page(page).per_page(PER_PAGE);
            let result = self.list_page(collection, &params).await?;

            all_items.extend(result.items);

            if page >= result.total_pages {
                break;
            }

            page += 1;
        }

        debug!("Listed {} records from {}", all_items.len(), collection);
        Ok(all_items)
    }

    /// Get a single record by key
    pub async fn get(&self, collection: &str, key: &str) -> Result<WireItem> {
        let url = self.endpoint(collection, Some(key))?;
        let operation = || async {
            let response = self.authorized(self.client.get(url.clone())).send().await?;
            self.handle_response(response).await
        };

        self.retry_operation(operation).await
    }

    /// Create a new record; returns the record as stored
    pub async fn create(&self, collection: &str, data: &WireItem) -> Result<WireItem> {
        let url = self.endpoint(collection, None)?;
        let operation = || async {
            let response = self.authorized(self.client.post(url.clone()).json(data)).send().await?;
            self.handle_response(response).await
        };

        self.retry_operation(operation).await
    }

    /// Replace an existing record; returns the record as stored
    pub async fn update(&self, collection: &str, key: &str, data: &WireItem) -> Result<WireItem> {
        let url = self.endpoint(collection, Some(key))?;
        let operation = || async {
            let response = self.authorized(self.client.put(url.clone()).json(data)).send().await?;
            self.handle_response(response).await
        };

        self.retry_operation(operation).await
    }

    /// Delete a record or a file
    pub async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        let url = self.endpoint(collection, Some(key))?;
        let operation = || async {
            let response = self.authorized(self.client.delete(url.clone())).send().await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(self.parse_error_response(response).await)
            }
        };

        self.retry_operation(operation).await
    }

    /// Raw content of a stored file
    pub async fn get_content(&self, collection: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(collection, Some(path))?;
        let operation = || async {
            let response = self
                .authorized(self.client.get(url.clone()).header(header::ACCEPT, "*/*"))
                .send()
                .await?;

            if response.status().is_success() {
                Ok(response.bytes().await?.to_vec())
            } else {
                Err(self.parse_error_response(response).await)
            }
        };

        self.retry_operation(operation).await
    }

    /// Store raw file content; returns the file's record as stored
    pub async fn put_content(
        &self,
        collection: &str,
        path: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<WireItem> {
        let url = self.endpoint(collection, Some(path))?;
        let operation = || async {
            let request = self
                .client
                .put(url.clone())
                .header(header::CONTENT_TYPE, content_type)
                .body(content.to_vec());
            let response = self.authorized(request).send().await?;
            self.handle_response(response).await
        };

        self.retry_operation(operation).await
    }

    // Helper methods

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            let text = response.text().await?;
            serde_json::from_str(&text).map_err(|e| ApiError::UnexpectedResponse(format!("{}: {}", e, text)))
        } else {
            Err(self.parse_error_response(response).await)
        }
    }

    async fn parse_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status();
        let path = response.url().path().to_string();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(path),
            StatusCode::NOT_FOUND => ApiError::NotFound(path),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());

                ApiError::RateLimit { retry_after }
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorResponse>(&error_text)
                    .map(|body| body.message)
                    .unwrap_or(error_text);

                ApiError::Server {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    async fn retry_operation<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let backoff = ExponentialBackoff {
            initial_interval: self.retry.initial_interval,
            max_interval: self.retry.max_interval,
            max_elapsed_time: self.retry.max_elapsed_time,
            ..Default::default()
        };

        retry(backoff, || async {
            match operation().await {
                Ok(result) => Ok(result),
                Err(ApiError::RateLimit { retry_after: Some(seconds) }) => {
                    warn!("Rate limited, retrying after {}s", seconds);
                    Err(backoff::Error::retry_after(
                        ApiError::RateLimit { retry_after: Some(seconds) },
                        Duration::from_secs(seconds),
                    ))
                }
                Err(error) => {
                    if error.is_retryable() {
                        warn!("Retryable error occurred: {}", error);
                        Err(backoff::Error::transient(error))
                    } else {
                        debug!("Non-retryable error: {}", error);
                        Err(backoff::Error::permanent(error))
                    }
                }
            }
        })
        .await
    }
}
