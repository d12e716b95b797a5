use super::{crud::CrudOperations, error::*, types::RetryPolicy};
use reqwest::ClientBuilder;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client for one remote solution
pub struct SolutionClient {
    /// CRUD operations on the solution's collections
    pub crud: CrudOperations,

    /// Base URL of the platform API host
    base_url: Url,

    /// Solution the collections belong to
    solution_id: String,
}

impl SolutionClient {
    /// Create a client with default HTTP settings
    pub fn new(base_url: &str, solution_id: &str) -> Result<Self> {
        SolutionClientBuilder::new(base_url).solution_id(solution_id).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn solution_id(&self) -> &str {
        &self.solution_id
    }
}

/// Root of every collection URL: `{base}/api/v1/solution/{solution_id}/`
pub fn solution_root(base_url: &Url, solution_id: &str) -> Result<Url> {
    let mut root = base_url.clone();
    root.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(["api", "v1", "solution", solution_id, ""]);
    Ok(root)
}

// Builder pattern for client configuration
pub struct SolutionClientBuilder {
    base_url: String,
    solution_id: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    retry: RetryPolicy,
}

impl SolutionClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            solution_id: None,
            token: None,
            timeout: None,
            connect_timeout: None,
            user_agent: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn solution_id(mut self, solution_id: impl Into<String>) -> Self {
        self.solution_id = Some(solution_id.into());
        self
    }

    /// Bearer token sent with every request
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<SolutionClient> {
        let solution_id = self
            .solution_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::Configuration("no solution id given".to_string()))?;

        let base_url = Url::parse(&self.base_url)?;
        let root = solution_root(&base_url, &solution_id)?;

        let mut client_builder = ClientBuilder::new()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .connect_timeout(self.connect_timeout.unwrap_or(Duration::from_secs(10)))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| concat!("solsync/", env!("CARGO_PKG_VERSION")).to_string()),
            );

        // Redirects would drop the bearer header
        client_builder = client_builder.redirect(reqwest::redirect::Policy::none());

        let http_client = client_builder.build().map_err(ApiError::Network)?;

        debug!("Solution {} at {}", solution_id, root);

        Ok(SolutionClient {
            crud: CrudOperations::new(http_client, root, self.token, self.retry),
            base_url,
            solution_id,
        })
    }
}
