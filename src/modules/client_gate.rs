use axum::{
    Extension,
    body::Body,
    http::{HeaderMap, Request, header::USER_AGENT},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use crate::config::{PatchSource, SharedConfig};
use crate::container::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::models::PatchMeta;
use crate::modules::github::GithubClient;
use crate::modules::storage::{DataStore, get_json, set_json};

pub const ALLOWED_USER_AGENTS_KEY: &str = "allowed_user_agents";

/// 根据 `X.Y.Z` 推测下一个主版本、次版本与修订版本
pub fn guess_next_versions(tag: &str) -> Vec<String> {
    let parts: Vec<u64> = match tag
        .trim_start_matches('v')
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
    {
        Ok(parts) if parts.len() >= 3 => parts,
        _ => return Vec::new(),
    };

    vec![
        format!("{}.0.0", parts[0] + 1),
        format!("{}.{}.0", parts[0], parts[1] + 1),
        format!("{}.{}.{}", parts[0], parts[1], parts[2] + 1),
    ]
}

/// 从文档仓库 PR 标题 `Update to X.Y.Z` 中取出版本号
pub fn announced_version(title: &str) -> Option<&str> {
    title
        .strip_prefix("Update to ")
        .and_then(|rest| rest.split_whitespace().next())
        .filter(|v| !v.is_empty())
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// 客户端版本校验
#[derive(Clone)]
pub struct ClientGate {
    store: DataStore,
    config: SharedConfig,
}

impl ClientGate {
    pub fn new(store: DataStore, config: SharedConfig) -> Self {
        Self { store, config }
    }

    /// 读取缓存的允许列表，不存在时返回 None
    pub async fn cached_user_agents(&self) -> ApiResult<Option<Vec<String>>> {
        get_json(self.store.as_ref(), ALLOWED_USER_AGENTS_KEY)
            .await
            .map_err(|e| ApiError::store_error("get_allowed_user_agents", e))
    }

    pub async fn check(&self, user_agent: &str) -> ApiResult<()> {
        {
            let config = self.config.load();
            if config.client_gate.bypass {
                return Ok(());
            }
            if config
                .client_gate
                .trusted_prefixes
                .iter()
                .any(|prefix| user_agent.starts_with(prefix.as_str()))
            {
                return Ok(());
            }
        }

        let allowed = match self.cached_user_agents().await? {
            Some(list) => list,
            None => {
                info!("Allowed user agents expired, refreshing from GitHub");
                self.refresh().await?
            }
        };

        if allowed.iter().any(|ua| ua == user_agent) {
            Ok(())
        } else {
            info!("Client is outdated: {}", user_agent);
            Err(ApiError::client_outdated(user_agent))
        }
    }

    /// 单个白名单仓库对应的 UA 列表
    async fn repository_user_agents(
        &self,
        github: &GithubClient,
        repo: &str,
        template: &str,
        stable_history: usize,
    ) -> ApiResult<Vec<String>> {
        let format_ua = |ver: &str| template.replace("{ver}", ver);

        let latest = github.latest_release(repo).await?.tag_name;
        let mut agents = vec![format_ua(&latest)];

        let mut page = 1;
        while agents.len() < stable_history {
            let releases = github.releases_page(repo, page).await?;
            if releases.is_empty() {
                break;
            }
            for release in releases.iter().filter(|r| !r.prerelease && !r.draft) {
                push_unique(&mut agents, format_ua(&release.tag_name));
            }
            page += 1;
        }
        agents.truncate(stable_history.max(1));

        for next in guess_next_versions(&latest) {
            push_unique(&mut agents, format_ua(&next));
        }
        Ok(agents)
    }

    /// 重新生成允许的 UA 列表并写入缓存
    pub async fn refresh(&self) -> ApiResult<Vec<String>> {
        let config = self.config.load_full();
        let github = GithubClient::new(&config.github);
        let gate = &config.client_gate;
        let mut agents: Vec<String> = Vec::new();

        for (repo, template) in &gate.whitelist_repositories {
            match self
                .repository_user_agents(&github, repo, template, gate.stable_history)
                .await
            {
                Ok(list) => list.into_iter().for_each(|ua| push_unique(&mut agents, ua)),
                Err(e) => warn!("Failed to collect versions of {}: {}", repo, e),
            }
        }

        // 测试版
        for (key, project) in &config.projects {
            if project.source != PatchSource::Workflow {
                continue;
            }
            match get_json::<PatchMeta>(self.store.as_ref(), &format!("{key}:patch")).await {
                Ok(Some(meta)) => push_unique(&mut agents, format!("Snap Hutao/{}", meta.version)),
                Ok(None) => {}
                Err(e) => warn!("Failed to read {} patch: {}", key, e),
            }
        }

        // 文档仓库中预告的下一个版本
        match github.open_pulls(&gate.docs_repository).await {
            Ok(pulls) => {
                if let Some(version) = pulls.iter().find_map(|pr| announced_version(&pr.title)) {
                    push_unique(&mut agents, format!("Snap Hutao/{version}.0"));
                }
            }
            Err(e) => warn!("Failed to fetch pull requests of {}: {}", gate.docs_repository, e),
        }

        set_json(
            self.store.as_ref(),
            ALLOWED_USER_AGENTS_KEY,
            &agents,
            Some(gate.allowed_list_ttl),
        )
        .await
        .map_err(|e| ApiError::store_error("set_allowed_user_agents", e))?;

        info!("Updated allowed user agents: {:?}", agents);
        Ok(agents)
    }
}

/// 拦截过时客户端，返回 418
pub async fn client_gate_middleware(
    Extension(ctx): Extension<AppContext>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = ctx.client_gate.check(user_agent).await {
        if matches!(e, ApiError::ClientOutdated { .. }) {
            ctx.metrics.record_client_rejection();
        }
        return Err(e);
    }

    Ok(next.run(request).await)
}
