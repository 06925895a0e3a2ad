//! GitHub REST implementation of [`GitHost`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{GitError, GitHost};
use crate::config::GitHubConfig;
use crate::models::{FileRevision, MergeOutcome, PrFile, PullRequest};

const USER_AGENT: &str = concat!("draft_backend/", env!("CARGO_PKG_VERSION"));
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const FILES_PER_PAGE: u8 = 100;

/// Which kind of call failed, so statuses can be read in context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Write,
    Merge,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: ShaOnly,
}

#[derive(Deserialize)]
struct MergeResponse {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct HostErrorBody {
    message: String,
}

#[derive(Serialize)]
struct WriteFileRequest<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Serialize)]
struct DeleteFileRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Serialize)]
struct MergeRequest<'a> {
    merge_method: &'a str,
    commit_title: &'a str,
}

#[derive(Serialize)]
struct CloseRequest<'a> {
    state: &'a str,
}

pub struct GitHubClient {
    http: Client,
    settings: GitHubConfig,
}

impl GitHubClient {
    pub fn new(settings: GitHubConfig) -> Result<Self, GitError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GitError::Configuration(format!("could not build HTTP client: {}", e)))?;
        Ok(Self { http, settings })
    }

    fn token(&self) -> Result<&str, GitError> {
        self.settings
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GitError::Configuration("GITHUB_PAT environment variable is not set".to_string()))
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.owner,
            self.settings.repo,
            tail
        )
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, GitError> {
        let token = self.token()?;
        Ok(request
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, GITHUB_ACCEPT))
    }

    async fn send(&self, request: RequestBuilder, kind: CallKind, what: &str) -> Result<Response, GitError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| GitError::Network(format!("{}: {}", what, e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<HostErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| if body.is_empty() { status.to_string() } else { body });
        log::debug!("git host returned {} for {}: {}", status, what, message);
        Err(classify(status, kind, format!("{}: {}", what, message)))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, kind: CallKind, what: &str) -> Result<T, GitError> {
        self.send(request, kind, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GitError::Decode(format!("{}: {}", what, e)))
    }

    async fn fetch_contents(&self, branch: &str, path: &str) -> Result<ContentsResponse, GitError> {
        let request = self
            .http
            .get(self.repo_url(&format!("contents/{}", path)))
            .query(&[("ref", branch)]);
        self.send_json(request, CallKind::Read, &format!("could not fetch {} from {}", path, branch))
            .await
    }
}

fn classify(status: StatusCode, kind: CallKind, message: String) -> GitError {
    match (status, kind) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => GitError::Authentication(message),
        (StatusCode::NOT_FOUND, _) => GitError::NotFound(message),
        (StatusCode::CONFLICT, CallKind::Write) => GitError::Conflict(message),
        (StatusCode::METHOD_NOT_ALLOWED | StatusCode::CONFLICT, CallKind::Merge) => GitError::MergeBlocked(message),
        _ => GitError::Api { status: status.as_u16(), message },
    }
}

/// Decodes the line-wrapped base64 the contents API returns.
fn decode_content(encoded: &str) -> Result<String, GitError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| GitError::Decode(format!("file content is not valid base64: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| GitError::Decode(format!("file content is not UTF-8: {}", e)))
}

#[async_trait]
impl GitHost for GitHubClient {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, GitError> {
        let per_page = self.settings.per_page.to_string();
        let request = self
            .http
            .get(self.repo_url("pulls"))
            .query(&[("state", "open"), ("per_page", per_page.as_str())]);
        self.send_json(request, CallKind::Read, "could not list pull requests").await
    }

    async fn pull_request_files(&self, pr_number: u64) -> Result<Vec<PrFile>, GitError> {
        let per_page = FILES_PER_PAGE.to_string();
        let request = self
            .http
            .get(self.repo_url(&format!("pulls/{}/files", pr_number)))
            .query(&[("per_page", per_page.as_str())]);
        self.send_json(request, CallKind::Read, &format!("could not list files of PR #{}", pr_number))
            .await
    }

    async fn get_file(&self, branch: &str, path: &str) -> Result<FileRevision, GitError> {
        let data = self.fetch_contents(branch, path).await?;
        Ok(FileRevision {
            content: decode_content(&data.content)?,
            sha: data.sha,
        })
    }

    async fn get_file_sha(&self, branch: &str, path: &str) -> Result<String, GitError> {
        Ok(self.fetch_contents(branch, path).await?.sha)
    }

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        sha: &str,
        message: &str,
    ) -> Result<String, GitError> {
        let encoded = STANDARD.encode(content.as_bytes());
        let request = self
            .http
            .put(self.repo_url(&format!("contents/{}", path)))
            .json(&WriteFileRequest { message, content: &encoded, sha: Some(sha), branch });
        let data: WriteResponse = self
            .send_json(request, CallKind::Write, &format!("could not update {} on {}", path, branch))
            .await?;
        Ok(data.content.sha)
    }

    async fn create_file(
        &self,
        branch: &str,
        path: &str,
        base64_content: &str,
        existing_sha: Option<&str>,
        message: &str,
    ) -> Result<String, GitError> {
        let request = self
            .http
            .put(self.repo_url(&format!("contents/{}", path)))
            .json(&WriteFileRequest { message, content: base64_content, sha: existing_sha, branch });
        let data: WriteResponse = self
            .send_json(request, CallKind::Write, &format!("could not create {} on {}", path, branch))
            .await?;
        Ok(data.content.sha)
    }

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), GitError> {
        let request = self
            .http
            .delete(self.repo_url(&format!("contents/{}", path)))
            .json(&DeleteFileRequest { message, sha, branch });
        self.send(request, CallKind::Write, &format!("could not delete {} on {}", path, branch))
            .await?;
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        pr_number: u64,
        commit_title: &str,
    ) -> Result<MergeOutcome, GitError> {
        let request = self
            .http
            .put(self.repo_url(&format!("pulls/{}/merge", pr_number)))
            .json(&MergeRequest { merge_method: "squash", commit_title });
        let data: MergeResponse = self
            .send_json(request, CallKind::Merge, &format!("merge of PR #{} failed", pr_number))
            .await?;
        Ok(MergeOutcome { merged: data.merged, message: data.message })
    }

    async fn delete_draft(&self, pr_number: u64, branch: &str) -> Result<(), GitError> {
        let close = self
            .http
            .patch(self.repo_url(&format!("pulls/{}", pr_number)))
            .json(&CloseRequest { state: "closed" });
        self.send(close, CallKind::Write, &format!("could not close PR #{}", pr_number))
            .await?;

        let delete_ref = self.http.delete(self.repo_url(&format!("git/refs/heads/{}", branch)));
        self.send(delete_ref, CallKind::Write, &format!("could not delete branch {}", branch))
            .await?;
        Ok(())
    }

    fn raw_file_url(&self, branch: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.settings.raw_base.trim_end_matches('/'),
            self.settings.owner,
            self.settings.repo,
            branch,
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::draft_helpers::upload_image;
    use crate::helper::session_helpers::AdminSession;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(api_base: &str, token: Option<&str>) -> GitHubConfig {
        GitHubConfig {
            api_base: api_base.to_string(),
            raw_base: "https://raw.example.com".to_string(),
            owner: "acme".to_string(),
            repo: "site".to_string(),
            per_page: 50,
            token: token.map(str::to_string),
        }
    }

    async fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(settings(&server.uri(), Some("test-token"))).expect("client should build")
    }

    #[tokio::test]
    async fn lists_open_pull_requests_with_bearer_token_and_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/pulls"))
            .and(query_param("state", "open"))
            .and(query_param("per_page", "50"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "number": 42,
                "title": "Draft: Hello world",
                "head": { "ref": "draft/hello-world" },
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-02T00:00:00Z",
                "html_url": "https://github.com/acme/site/pull/42",
                "user": { "login": "octocat" }
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let pulls = client_for(&server).await.list_open_pull_requests().await.expect("list should succeed");

        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].number, 42);
        assert_eq!(pulls[0].head.branch, "draft/hello-world");
        assert_eq!(pulls[0].user.as_ref().map(|u| u.login.as_str()), Some("octocat"));
    }

    #[tokio::test]
    async fn get_file_decodes_wrapped_base64() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/contents/content/insights/hello-world.mdx"))
            .and(query_param("ref", "draft/hello-world"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "LS0tCmRyYWZ0OiB0\ncnVlCi0tLQpIaQ==\n",
                "sha": "abc123",
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let file = client_for(&server)
            .await
            .get_file("draft/hello-world", "content/insights/hello-world.mdx")
            .await
            .expect("file should load");

        assert_eq!(file.content, "---\ndraft: true\n---\nHi");
        assert_eq!(file.sha, "abc123");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/contents/public/images/insights/x/a.png"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.get_file_sha("draft/x", "public/images/insights/x/a.png").await;

        assert_matches!(result, Err(GitError::NotFound(message)) if message.contains("Not Found"));
    }

    #[tokio::test]
    async fn update_sends_previous_sha_and_returns_new_one() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/site/contents/content/insights/hello-world.mdx"))
            .and(body_json(json!({
                "message": "Update draft: hello-world",
                "content": "SGVsbG8=",
                "sha": "old-sha",
                "branch": "draft/hello-world"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": { "sha": "new-sha" } })))
            .expect(1)
            .mount(&server)
            .await;

        let sha = client_for(&server)
            .await
            .update_file("draft/hello-world", "content/insights/hello-world.mdx", "Hello", "old-sha", "Update draft: hello-world")
            .await
            .expect("update should succeed");

        assert_eq!(sha, "new-sha");
    }

    #[tokio::test]
    async fn new_binary_file_is_sent_without_sha() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/site/contents/public/images/insights/hello-world/a.png"))
            .and(body_json(json!({
                "message": "Add image: a.png for hello-world",
                "content": "aGk=",
                "branch": "draft/hello-world"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "content": { "sha": "img-sha" } })))
            .expect(1)
            .mount(&server)
            .await;

        let sha = client_for(&server)
            .await
            .create_file("draft/hello-world", "public/images/insights/hello-world/a.png", "aGk=", None, "Add image: a.png for hello-world")
            .await
            .expect("create should succeed");

        assert_eq!(sha, "img-sha");
    }

    #[tokio::test]
    async fn reupload_through_client_overwrites_with_current_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/pulls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "number": 42,
                "title": "Draft: hello-world",
                "head": { "ref": "draft/hello-world" },
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-02T00:00:00Z",
                "html_url": "https://github.com/acme/site/pull/42",
                "user": { "login": "editor" }
            }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/pulls/42/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "filename": "content/insights/hello-world.mdx", "sha": "c1", "status": "added" },
                { "filename": "public/images/insights/hello-world/my-photo.png", "sha": "img-sha", "status": "added" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/contents/public/images/insights/hello-world/my-photo.png"))
            .and(query_param("ref", "draft/hello-world"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "Zmlyc3Q=", "sha": "img-sha" })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/site/contents/public/images/insights/hello-world/my-photo.png"))
            .and(body_json(json!({
                "message": "Add image: my-photo.png for hello-world",
                "content": "c2Vjb25k",
                "sha": "img-sha",
                "branch": "draft/hello-world"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": { "sha": "img-sha-2" } })))
            .expect(1)
            .mount(&server)
            .await;
        let session = AdminSession { username: "editor".to_string(), role: "admin".to_string() };

        let stored = upload_image(&client_for(&server).await, &session, "hello-world", Some("My Photo!!.PNG"), Some("c2Vjb25k"))
            .await
            .expect("re-upload should overwrite");

        assert_eq!(stored.path, "public/images/insights/hello-world/my-photo.png");
        assert_eq!(stored.sha, "img-sha-2");
    }

    #[tokio::test]
    async fn stale_sha_on_update_is_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/site/contents/content/insights/hello-world.mdx"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "message": "content/insights/hello-world.mdx does not match old-sha"
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .update_file("draft/hello-world", "content/insights/hello-world.mdx", "Hello", "old-sha", "msg")
            .await;

        assert_matches!(result, Err(GitError::Conflict(message)) if message.contains("does not match"));
    }

    #[tokio::test]
    async fn blocked_merge_keeps_host_message() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/site/pulls/42/merge"))
            .and(body_json(json!({ "merge_method": "squash", "commit_title": "Publish: hello-world" })))
            .respond_with(ResponseTemplate::new(405).set_body_json(json!({ "message": "Pull Request is not mergeable" })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.merge_pull_request(42, "Publish: hello-world").await;

        assert_matches!(result, Err(GitError::MergeBlocked(message)) if message.ends_with("Pull Request is not mergeable"));
    }

    #[tokio::test]
    async fn successful_merge_reports_host_message() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/site/pulls/42/merge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "deadbeef",
                "merged": true,
                "message": "Pull Request successfully merged"
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.merge_pull_request(42, "Publish: hello-world").await.expect("merge should succeed");

        assert_eq!(outcome, MergeOutcome { merged: true, message: "Pull Request successfully merged".to_string() });
    }

    #[tokio::test]
    async fn delete_draft_closes_then_removes_branch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/site/pulls/42"))
            .and(body_json(json!({ "state": "closed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "number": 42, "state": "closed" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/site/git/refs/heads/draft/hello-world"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).await.delete_draft(42, "draft/hello-world").await.expect("discard should succeed");
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(settings(&server.uri(), None)).expect("client should build");

        let result = client.list_open_pull_requests().await;

        assert_matches!(result, Err(GitError::Configuration(_)));
        let received = server.received_requests().await.unwrap_or_default();
        assert!(received.is_empty(), "no request may reach the host without a token");
    }

    #[tokio::test]
    async fn rejected_token_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/pulls"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.list_open_pull_requests().await;

        assert_matches!(result, Err(GitError::Authentication(_)));
    }

    #[test]
    fn raw_url_points_at_branch() {
        let client = GitHubClient::new(settings("https://api.example.com", None)).expect("client should build");
        assert_eq!(
            client.raw_file_url("draft/hello-world", "public/images/insights/hello-world/hero.jpg"),
            "https://raw.example.com/acme/site/draft/hello-world/public/images/insights/hello-world/hero.jpg"
        );
    }
}
