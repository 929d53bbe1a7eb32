//! GitHub REST API client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use warden_common::util::truncate_with_ellipsis;
use warden_common::{Error, GitHubConfig, Result, ResultExt};

use crate::api::{
    Issue, IssueApi, IssueComment, Label, PullCommit, PullRequest, PullRequestFile, RepoRef,
};

/// Page size used for every paginated listing.
const PER_PAGE: &str = "100";

// ============================================================================
// Client
// ============================================================================

/// GitHub API client.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Create a new GitHub client against api.github.com.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, "https://api.github.com", Duration::from_secs(30))
    }

    /// Create a client from the `github` config section.
    pub fn from_config(config: &GitHubConfig) -> Result<Self> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("github.token is not set".into()))?;
        Self::with_base_url(
            token,
            config.api_base.as_str(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    /// Create a client with custom base URL (for GitHub Enterprise).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|_| Error::Config("github token is not a valid header value".into()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("Warden-Workflow/1.0"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn repo_url(&self, repo: &RepoRef, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url, repo.owner, repo.name, path
        )
    }

    /// Send a request and map non-success statuses onto [`Error`].
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await.context(what)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let rate_limit_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, rate_limit_exhausted, &body).with_context(what))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self.send(self.client.get(url), what).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        request: RequestBuilder,
        body: &B,
        what: &str,
    ) -> Result<Response> {
        self.send(request.json(body), what).await
    }

    /// Fetch every page of a listing endpoint, following `Link: rel="next"`.
    ///
    /// Pages are requested one after another so results keep page order.
    pub async fn get_all_pages<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut response = self
            .send(self.client.get(url).query(&[("per_page", PER_PAGE)]), what)
            .await?;
        let mut page = 1_u32;

        loop {
            let next = next_page_url(response.headers());
            let chunk: Vec<T> = response.json().await?;
            rows.extend(chunk);

            let Some(next) = next else {
                break;
            };
            page = page.saturating_add(1);
            tracing::trace!(page, what, "Fetching next page");
            response = self.send(self.client.get(next), what).await?;
        }

        Ok(rows)
    }
}

/// Map a failed response onto the error taxonomy.
fn status_error(status: StatusCode, rate_limit_exhausted: bool, body: &str) -> Error {
    let detail = format!("GitHub API error {}: {}", status, truncate_with_ellipsis(body, 200));
    match status {
        StatusCode::UNAUTHORIZED => Error::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(detail),
        StatusCode::FORBIDDEN if rate_limit_exhausted => Error::RateLimited(detail),
        StatusCode::FORBIDDEN => Error::Forbidden(detail),
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        StatusCode::UNPROCESSABLE_ENTITY => Error::InvalidInput(detail),
        _ => Error::External(detail),
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == r#"rel="next""#);
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[async_trait]
impl IssueApi for GitHubClient {
    async fn list_labels(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>> {
        let url = self.repo_url(repo, &format!("issues/{}/labels", number));
        let labels: Vec<Label> = self.get_all_pages(&url, "Failed to list labels").await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn set_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
        let url = self.repo_url(repo, &format!("issues/{}/labels", number));
        self.send_json(
            self.client.put(&url),
            &serde_json::json!({ "labels": labels }),
            "Failed to set labels",
        )
        .await?;
        Ok(())
    }

    async fn add_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
        let url = self.repo_url(repo, &format!("issues/{}/labels", number));
        self.send_json(
            self.client.post(&url),
            &serde_json::json!({ "labels": labels }),
            "Failed to add labels",
        )
        .await?;
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        let mut url = Url::parse(&self.repo_url(repo, &format!("issues/{}/labels", number)))
            .map_err(|e| Error::Internal(format!("invalid label URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Internal("label URL cannot be a base".into()))?
            .push(label);

        self.send(self.client.delete(url), "Failed to remove label")
            .await?;
        Ok(())
    }

    async fn add_assignees(
        &self,
        repo: &RepoRef,
        number: u64,
        assignees: &[String],
    ) -> Result<()> {
        let url = self.repo_url(repo, &format!("issues/{}/assignees", number));
        self.send_json(
            self.client.post(&url),
            &serde_json::json!({ "assignees": assignees }),
            "Failed to add assignees",
        )
        .await?;
        Ok(())
    }

    async fn get_pull(&self, repo: &RepoRef, number: u64) -> Result<PullRequest> {
        let url = self.repo_url(repo, &format!("pulls/{}", number));
        self.get_json(&url, "Failed to fetch pull request").await
    }

    async fn list_pull_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullRequestFile>> {
        let url = self.repo_url(repo, &format!("pulls/{}/files", number));
        self.get_all_pages(&url, "Failed to list PR files").await
    }

    async fn list_pull_commits(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullCommit>> {
        let url = self.repo_url(repo, &format!("pulls/{}/commits", number));
        self.get_all_pages(&url, "Failed to list PR commits").await
    }

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<Issue> {
        let url = self.repo_url(repo, &format!("issues/{}", number));
        self.get_json(&url, "Failed to fetch issue").await
    }

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueComment>> {
        let url = self.repo_url(repo, &format!("issues/{}/comments", number));
        self.get_all_pages(&url, "Failed to list comments").await
    }

    async fn create_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<IssueComment> {
        let url = self.repo_url(repo, &format!("issues/{}/comments", number));
        let response = self
            .send_json(
                self.client.post(&url),
                &serde_json::json!({ "body": body }),
                "Failed to create comment",
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<()> {
        let url = self.repo_url(repo, &format!("issues/comments/{}", comment_id));
        self.send(self.client.delete(&url), "Failed to delete comment")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::with_base_url("test-token", server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn repo() -> RepoRef {
        RepoRef::new("octo", "widgets")
    }

    #[test]
    fn test_next_page_url() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/x?page=2>; rel="next", <https://api.github.com/x?page=5>; rel="last""#,
            ),
        );
        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://api.github.com/x?page=2")
        );

        let mut last_page = HeaderMap::new();
        last_page.insert(
            LINK,
            HeaderValue::from_static(r#"<https://api.github.com/x?page=1>; rel="prev""#),
        );
        assert_eq!(next_page_url(&last_page), None);
        assert_eq!(next_page_url(&HeaderMap::new()), None);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, false, ""),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, true, ""),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, false, ""),
            Error::Forbidden(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, false, ""),
            Error::External(_)
        ));
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = GitHubConfig::default();
        assert!(matches!(
            GitHubClient::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_follows_link_header_in_order() {
        let server = MockServer::start().await;
        let next = format!("{}/repos/octo/widgets/pulls/3/files?per_page=100&page=2", server.uri());

        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls/3/files"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "filename": "c.rs", "changes": 3 }
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls/3/files"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!(r#"<{}>; rel="next""#, next).as_str())
                    .set_body_json(json!([
                        { "filename": "a.rs", "changes": 1 },
                        { "filename": "b.rs", "changes": 2 }
                    ])),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let files = client(&server).list_pull_files(&repo(), 3).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[tokio::test]
    async fn test_remove_absent_label_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octo/widgets/issues/9/labels/merge%20conflict"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Label does not exist" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .remove_label(&repo(), 9, "merge conflict")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rate_limit_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/issues/4"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
            .mount(&server)
            .await;

        let err = client(&server).get_issue(&repo(), 4).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn test_set_labels_sends_full_set() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/octo/widgets/issues/5/labels"))
            .and(body_json(json!({ "labels": ["reviewed", "size/M"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .set_labels(&repo(), 5, &["reviewed".to_string(), "size/M".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_carries_context() {
        let client = GitHubClient::with_base_url(
            "test-token",
            "http://127.0.0.1:1",
            Duration::from_millis(500),
        )
        .unwrap();

        let err = client.list_labels(&repo(), 5).await.unwrap_err();
        assert!(matches!(err, Error::WithContext { .. }));
        assert!(err.to_string().starts_with("Failed to list labels: HTTP error"));
        assert_eq!(err.status_code(), 502);
    }
}
