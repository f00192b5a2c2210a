mod auth;

use super::{IIssueTracker, InstallationToken, IssueTrackerError, RateLimitStatus};
use crate::{config::GithubConfig, ISys};
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::error;

const USER_AGENT: &str = "nudge-reminder-bot";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitResource,
}

#[derive(Debug, Deserialize)]
struct RateLimitResource {
    remaining: i64,
    /// Epoch seconds
    reset: i64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

pub struct GithubRestApi {
    client: Client,
    config: GithubConfig,
    sys: Arc<dyn ISys>,
}

impl GithubRestApi {
    pub fn new(config: GithubConfig, sys: Arc<dyn ISys>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                error!("Unable to build GitHub client, using defaults. Error: {:?}", e);
                Client::new()
            });

        Self {
            client,
            config,
            sys,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Sends the request and turns non success statuses into errors
    async fn send(&self, method: &str, req: RequestBuilder) -> Result<Response, IssueTrackerError> {
        let res = req
            .header("accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| {
                error!("[Network Error] GitHub API {} error. Error message: {:?}", method, e);
                IssueTrackerError::from(e)
            })?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        Err(IssueTrackerError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(method: &str, res: Response) -> Result<T, IssueTrackerError> {
        res.json::<T>().await.map_err(|e| {
            error!(
                "[Unexpected Response] GitHub API {} error. Error message: {:?}",
                method, e
            );
            IssueTrackerError::Transport(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl IIssueTracker for GithubRestApi {
    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        issue_number: i64,
        body: &str,
    ) -> Result<(), IssueTrackerError> {
        let req = self
            .client
            .post(self.url(&format!(
                "repos/{}/{}/issues/{}/comments",
                owner, repo, issue_number
            )))
            .bearer_auth(token)
            .json(&CreateCommentRequest { body });
        self.send("POST", req).await.map(|_| ())
    }

    async fn get_rate_limit_status(
        &self,
        token: &str,
    ) -> Result<RateLimitStatus, IssueTrackerError> {
        let req = self.client.get(self.url("rate_limit")).bearer_auth(token);
        let res = self.send("GET", req).await?;
        let rate_limit = Self::json::<RateLimitResponse>("GET", res).await?;

        Ok(RateLimitStatus {
            remaining: rate_limit.resources.core.remaining,
            reset_at: rate_limit.resources.core.reset * 1000,
        })
    }

    async fn issue_installation_credential(
        &self,
        installation_id: i64,
    ) -> Result<InstallationToken, IssueTrackerError> {
        let app = self.config.app.as_ref().ok_or_else(|| {
            IssueTrackerError::NotConfigured("GitHub App credentials are missing".into())
        })?;
        let now_secs = self.sys.get_timestamp_millis() / 1000;
        let jwt = auth::create_app_jwt(app, now_secs)?;

        let req = self
            .client
            .post(self.url(&format!(
                "app/installations/{}/access_tokens",
                installation_id
            )))
            .bearer_auth(jwt);
        let res = self.send("POST", req).await?;
        let access_token = Self::json::<AccessTokenResponse>("POST", res).await?;
        let expires_at = DateTime::parse_from_rfc3339(&access_token.expires_at)
            .map_err(|e| {
                IssueTrackerError::Transport(format!(
                    "Invalid installation token expiry: {}. Error: {}",
                    access_token.expires_at, e
                ))
            })?
            .timestamp_millis();

        Ok(InstallationToken {
            token: access_token.token,
            expires_at,
        })
    }
}
