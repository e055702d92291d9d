//! GitHub delivery of rendered reports
//!
//! Provides:
//! - REST client for comments, check runs and pull request files
//! - Pull request / commit resolution from workflow event payloads

pub mod event;

pub use event::{resolve_pull_request, EventSource, PullRequestContext};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;

use crate::config::Repository;
use crate::coverage::CheckConclusion;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// `path` with pagination parameters for `page` (1-based)
fn page_path(path: &str, page: usize) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}per_page={}&page={}", path, separator, PER_PAGE, page)
}

/// Fetch pages until one comes back shorter than `PER_PAGE`
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch(page).await?;
        let done = batch.len() < PER_PAGE;
        items.extend(batch);
        if done {
            return Ok(items);
        }
        page += 1;
    }
}

/// Operations the action needs from the code review host
#[allow(async_fn_in_trait)]
pub trait ReviewHost {
    /// Head commit of pull request `number`
    async fn pull_head_sha(&self, number: u64) -> Result<String>;

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>>;

    /// Paths changed by pull request `number`
    async fn list_pull_files(&self, number: u64) -> Result<Vec<String>>;

    /// Update the first comment containing `marker`, or create a new one
    async fn upsert_comment(&self, issue: u64, body: &str, marker: &str) -> Result<()>;

    async fn create_check(&self, check: &CheckRun<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: PullHead,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullHead {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullFile {
    filename: String,
}

/// A completed check run
#[derive(Debug, Clone)]
pub struct CheckRun<'a> {
    pub name: &'a str,
    pub head_sha: &'a str,
    pub title: &'a str,
    pub summary: &'a str,
    pub conclusion: CheckConclusion,
}

impl CheckRun<'_> {
    fn payload(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "head_sha": self.head_sha,
            "status": "completed",
            "conclusion": self.conclusion,
            "output": {
                "title": self.title,
                "summary": self.summary,
            }
        })
    }
}

/// First comment whose body mentions `marker`
pub fn find_comment<'a>(comments: &'a [IssueComment], marker: &str) -> Option<&'a IssueComment> {
    comments
        .iter()
        .find(|c| c.body.as_deref().is_some_and(|body| body.contains(marker)))
}

/// GitHub REST API client, constructed once by the caller and passed in
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
    repository: Repository,
    api_url: String,
}

impl GithubClient {
    pub fn with_api_url(
        token: impl Into<String>,
        repository: Repository,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            repository,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_url, self.repository, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "covmark")
            .header("Accept", "application/vnd.github.v3+json")
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub {} request failed", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub {} failed: {} - {}", what, status, text);
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let request = self.request(reqwest::Method::GET, &self.url(path));
        let response = self.send(request, what).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to decode GitHub {} response", what))
    }

    async fn get_all<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<Vec<T>> {
        collect_pages(|page| {
            let paged = page_path(path, page);
            async move { self.get_json(&paged, what).await }
        })
        .await
    }

    pub async fn list_comments(&self, issue: u64) -> Result<Vec<IssueComment>> {
        self.get_all(&format!("/issues/{}/comments", issue), "comment listing")
            .await
    }

    pub async fn create_comment(&self, issue: u64, body: &str) -> Result<()> {
        let url = self.url(&format!("/issues/{}/comments", issue));
        let request = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }));
        self.send(request, "comment creation").await?;
        Ok(())
    }

    pub async fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        let url = self.url(&format!("/issues/comments/{}", comment_id));
        let request = self
            .request(reqwest::Method::PATCH, &url)
            .json(&json!({ "body": body }));
        self.send(request, "comment update").await?;
        Ok(())
    }
}

impl ReviewHost for GithubClient {
    async fn pull_head_sha(&self, number: u64) -> Result<String> {
        let pull: PullRequest = self
            .get_json(&format!("/pulls/{}", number), "pull request lookup")
            .await?;
        Ok(pull.head.sha)
    }

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>> {
        self.get_all("/pulls?state=open", "pull request listing")
            .await
    }

    async fn list_pull_files(&self, number: u64) -> Result<Vec<String>> {
        let files: Vec<PullFile> = self
            .get_all(&format!("/pulls/{}/files", number), "pull request files")
            .await?;
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    async fn upsert_comment(&self, issue: u64, body: &str, marker: &str) -> Result<()> {
        let comments = self.list_comments(issue).await?;
        match find_comment(&comments, marker) {
            Some(comment) => self.update_comment(comment.id, body).await,
            None => self.create_comment(issue, body).await,
        }
    }

    async fn create_check(&self, check: &CheckRun<'_>) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, &self.url("/check-runs"))
            .json(&check.payload());
        self.send(request, "check run").await?;
        Ok(())
    }
}
