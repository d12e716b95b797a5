use serde::{Deserialize, Serialize};

/// Paged list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    pub page: u32,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
    pub items: Vec<T>,
}

/// Query parameters for list requests
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "perPage", skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

/// Error body returned by the solution API
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<u16>,
    pub message: String,
}

/// Retry schedule for retryable failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: std::time::Duration,
    pub max_interval: std::time::Duration,
    pub max_elapsed_time: Option<std::time::Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: std::time::Duration::from_millis(100),
            max_interval: std::time::Duration::from_secs(10),
            max_elapsed_time: Some(std::time::Duration::from_secs(60)),
        }
    }
}
