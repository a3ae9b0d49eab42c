use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GithubConfig;
use crate::container::REQWEST_CLIENT;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// 按文件名后缀查找附件
    pub fn find_asset(&self, suffix: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(suffix))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub expired: bool,
}

#[derive(Debug, Deserialize)]
struct ArtifactList {
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub user: Option<IssueUser>,
    #[serde(default)]
    pub created_at: String,
    /// 存在时表示这是一个 PR
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

/// GitHub REST API 客户端
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    codeload_base: String,
    api_version: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Self {
        Self::with_http(REQWEST_CLIENT.clone(), config)
    }

    pub fn with_http(http: reqwest::Client, config: &GithubConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            codeload_base: config.codeload_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", &self.api_version);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, url: &str) -> ApiResult<reqwest::Response> {
        debug!("GitHub request: {}", url);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::upstream(
                "github",
                format!("{} returned {}", url, response.status()),
            ));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = format!("{}{}", self.api_base, path);
        let response = self.send(&url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::upstream("github", format!("invalid response from {url}: {e}")))
    }

    pub async fn latest_release(&self, repo: &str) -> ApiResult<Release> {
        self.get_json(&format!("/repos/{repo}/releases/latest")).await
    }

    /// 分页获取 release 列表，每页 30 条
    pub async fn releases_page(&self, repo: &str, page: u32) -> ApiResult<Vec<Release>> {
        self.get_json(&format!("/repos/{repo}/releases?per_page=30&page={page}"))
            .await
    }

    pub async fn workflow_runs(&self, repo: &str, workflow: &str) -> ApiResult<Vec<WorkflowRun>> {
        let list: WorkflowRunList = self
            .get_json(&format!("/repos/{repo}/actions/workflows/{workflow}/runs"))
            .await?;
        Ok(list.workflow_runs)
    }

    pub async fn run_artifacts(&self, repo: &str, run_id: u64) -> ApiResult<Vec<Artifact>> {
        let list: ArtifactList = self
            .get_json(&format!("/repos/{repo}/actions/runs/{run_id}/artifacts"))
            .await?;
        Ok(list.artifacts)
    }

    pub async fn open_pulls(&self, repo: &str) -> ApiResult<Vec<PullRequest>> {
        self.get_json(&format!("/repos/{repo}/pulls?state=open")).await
    }

    pub async fn open_bug_issues(&self, repo: &str) -> ApiResult<Vec<Issue>> {
        self.get_json(&format!("/repos/{repo}/issues?state=open&type=Bug"))
            .await
    }

    /// 下载 release 附件的文本内容（如 SHA256SUMS）
    pub async fn download_text(&self, url: &str) -> ApiResult<String> {
        let response = self.send(url).await?;
        Ok(response.text().await?)
    }

    /// 下载仓库分支的 tar.gz 归档
    pub async fn download_tarball(&self, repo: &str, branch: &str) -> ApiResult<Vec<u8>> {
        let url = format!("{}/{}/tar.gz/refs/heads/{}", self.codeload_base, repo, branch);
        let response = self.send(&url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// GitHub Actions 产物页面地址
    pub fn artifact_page_url(repo: &str, run_id: u64, artifact_id: u64) -> String {
        format!("https://github.com/{repo}/actions/runs/{run_id}/artifacts/{artifact_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::ServerGuard) -> GithubConfig {
        GithubConfig {
            token: Some("pat".to_string()),
            api_base: server.url(),
            codeload_base: server.url(),
            api_version: "2022-11-28".to_string(),
        }
    }

    #[tokio::test]
    async fn test_latest_release_sends_api_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao/releases/latest")
            .match_header("x-github-api-version", "2022-11-28")
            .match_header("authorization", "Bearer pat")
            .with_status(200)
            .with_body(
                r#"{"tag_name":"1.12.0","assets":[{"name":"Snap.Hutao_1.12.0.msix","browser_download_url":"https://github.com/a.msix"}]}"#,
            )
            .create_async()
            .await;

        let client = GithubClient::with_http(reqwest::Client::new(), &config_for(&server));
        let release = client.latest_release("DGP-Studio/Snap.Hutao").await.unwrap();

        mock.assert_async().await;
        assert_eq!(release.tag_name, "1.12.0");
        assert!(!release.prerelease);
        assert!(release.find_asset(".msix").is_some());
        assert!(release.find_asset("SHA256SUMS").is_none());
    }

    #[tokio::test]
    async fn test_error_status_maps_to_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/a/b/releases/latest")
            .with_status(404)
            .create_async()
            .await;

        let client = GithubClient::with_http(reqwest::Client::new(), &config_for(&server));
        let err = client.latest_release("a/b").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_workflow_runs_and_artifacts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/a/b/actions/workflows/alpha.yml/runs")
            .with_status(200)
            .with_body(r#"{"workflow_runs":[{"id":7,"conclusion":"success","head_branch":"develop"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/a/b/actions/runs/7/artifacts")
            .with_status(200)
            .with_body(r#"{"artifacts":[{"id":9,"name":"Snap.Hutao.Alpha-1.0.0.0","expired":false}]}"#)
            .create_async()
            .await;

        let client = GithubClient::with_http(reqwest::Client::new(), &config_for(&server));
        let runs = client.workflow_runs("a/b", "alpha.yml").await.unwrap();
        assert_eq!(runs[0].id, 7);
        let artifacts = client.run_artifacts("a/b", 7).await.unwrap();
        assert_eq!(artifacts[0].name, "Snap.Hutao.Alpha-1.0.0.0");
        assert_eq!(
            GithubClient::artifact_page_url("a/b", 7, 9),
            "https://github.com/a/b/actions/runs/7/artifacts/9"
        );
    }
}
