use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{PatchSource, ProjectConfig, SharedConfig};
use crate::error::{ApiError, ApiResult};
use crate::metrics::Metrics;
use crate::models::{MirrorMeta, MirrorType, PatchMeta, PatchView, ProjectPatch};
use crate::modules::client_gate::ClientGate;
use crate::modules::github::GithubClient;
use crate::modules::storage::{DataStore, get_json, set_json};
use crate::region::Region;

const OUTDATED_CN: &str = "过时的客户端，请更新到最新版本。";
const OUTDATED_GLOBAL: &str =
    "Outdated client, please update to the latest version. 过时的客户端版本，请更新到最新版本。";

fn version_key(project: &str) -> String {
    format!("{project}:version")
}

fn mirrors_key(project: &str, version: &str) -> String {
    format!("{project}:mirrors:{version}")
}

pub fn patch_key(project: &str) -> String {
    format!("{project}:patch")
}

fn upstream_key(project: &str) -> String {
    format!("{project}:upstream")
}

/// 刷新结果：Release 项目返回组合视图，工作流项目返回产物元数据
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RefreshOutcome {
    Release(ProjectPatch),
    Workflow(Option<PatchMeta>),
}

/// 区域补丁视图及客户端提示
#[derive(Debug, Clone)]
pub struct PatchLookup {
    pub retcode: i32,
    pub message: String,
    pub view: PatchView,
}

/// 镜像操作结果
#[derive(Debug, Clone)]
pub struct MirrorUpdate {
    pub message: String,
    pub mirrors: Vec<MirrorMeta>,
}

/// 补丁版本与镜像管理
#[derive(Clone)]
pub struct PatchService {
    store: DataStore,
    config: SharedConfig,
    client_gate: ClientGate,
    metrics: Arc<Metrics>,
}

impl PatchService {
    pub fn new(
        store: DataStore,
        config: SharedConfig,
        client_gate: ClientGate,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            config,
            client_gate,
            metrics,
        }
    }

    fn project(&self, project: &str) -> ApiResult<ProjectConfig> {
        self.config
            .load()
            .get_project(project)
            .cloned()
            .ok_or_else(|| ApiError::project_not_found(project))
    }

    fn github(&self) -> GithubClient {
        GithubClient::new(&self.config.load().github)
    }

    async fn cached_version(&self, project: &str) -> ApiResult<Option<String>> {
        self.store
            .get_string(&version_key(project))
            .await
            .map(|v| v.filter(|v| !v.is_empty()))
            .map_err(|e| ApiError::store_error("get_version", e))
    }

    async fn stored_mirrors(&self, project: &str, version: &str) -> ApiResult<Option<Vec<MirrorMeta>>> {
        get_json(self.store.as_ref(), &mirrors_key(project, version))
            .await
            .map_err(|e| ApiError::store_error("get_mirrors", e))
    }

    async fn save_mirrors(&self, project: &str, version: &str, mirrors: &[MirrorMeta]) -> ApiResult<()> {
        set_json(self.store.as_ref(), &mirrors_key(project, version), mirrors, None)
            .await
            .map_err(|e| ApiError::store_error("set_mirrors", e))
    }

    /// 从 GitHub 最新 Release 构建上游元数据
    pub async fn fetch_upstream(&self, project: &str) -> ApiResult<PatchMeta> {
        let cfg = self.project(project)?;
        let github = self.github();
        let release = github.latest_release(&cfg.repository).await?;

        let asset = release.find_asset(&cfg.asset_suffix).ok_or_else(|| {
            ApiError::upstream(
                "github",
                format!(
                    "release {} of {} has no {} asset",
                    release.tag_name, cfg.repository, cfg.asset_suffix
                ),
            )
        })?;

        let file_name = asset
            .browser_download_url
            .rsplit('/')
            .next()
            .unwrap_or(&asset.name)
            .to_string();

        let mut validation = String::new();
        if let Some(checksum) = cfg
            .checksum_suffix
            .as_deref()
            .and_then(|suffix| release.find_asset(suffix))
        {
            validation = github
                .download_text(&checksum.browser_download_url)
                .await?
                .replace(['\r', '\n'], "");
        }

        let meta = PatchMeta {
            version: format!("{}.0", release.tag_name),
            validation,
            cache_time: Utc::now(),
            file_name,
            mirrors: vec![MirrorMeta::new(
                asset.browser_download_url.clone(),
                "GitHub",
                MirrorType::Direct,
            )],
        };
        debug!("Upstream patch of {}: {:?}", project, meta);
        Ok(meta)
    }

    /// 版本替换：版本变化时重建镜像列表，否则合并已保存的镜像
    async fn apply_upstream(
        &self,
        project: &str,
        cfg: &ProjectConfig,
        upstream: PatchMeta,
    ) -> ApiResult<ProjectPatch> {
        set_json(self.store.as_ref(), &upstream_key(project), &upstream, None)
            .await
            .map_err(|e| ApiError::store_error("set_upstream", e))?;

        let mut cn = upstream.clone();
        if !cfg.static_mirrors.is_empty() {
            cn.mirrors = cfg.static_mirrors.clone();
        }

        let cached = self.cached_version(project).await?;
        if cached.as_deref() != Some(upstream.version.as_str()) {
            if let Some(old) = &cached {
                info!("{} version changed: {} -> {}", project, old, upstream.version);
                self.store
                    .delete(&mirrors_key(project, old))
                    .await
                    .map_err(|e| ApiError::store_error("delete_mirrors", e))?;
            } else {
                info!("{} version initialized: {}", project, upstream.version);
            }
            self.store
                .set_string(&version_key(project), &upstream.version, None)
                .await
                .map_err(|e| ApiError::store_error("set_version", e))?;
            self.save_mirrors(project, &upstream.version, &cfg.static_mirrors)
                .await?;
        } else {
            let stored = match self.stored_mirrors(project, &upstream.version).await? {
                Some(list) => list,
                None => {
                    self.save_mirrors(project, &upstream.version, &cfg.static_mirrors)
                        .await?;
                    cfg.static_mirrors.clone()
                }
            };
            cn.merge_mirrors(stored);
        }

        let patch = ProjectPatch {
            global: upstream,
            cn,
            github_message: String::new(),
            gitlab_message: String::new(),
        };
        set_json(self.store.as_ref(), &patch_key(project), &patch, None)
            .await
            .map_err(|e| ApiError::store_error("set_patch", e))?;
        Ok(patch)
    }

    async fn refresh_gate(&self, cfg: &ProjectConfig) {
        if !cfg.refresh_client_gate {
            return;
        }
        if let Err(e) = self.client_gate.refresh().await {
            warn!("Failed to refresh allowed user agents: {}", e);
        }
    }

    /// 从上游刷新项目
    pub async fn refresh(&self, project: &str) -> ApiResult<RefreshOutcome> {
        let cfg = self.project(project)?;
        let result = match cfg.source {
            PatchSource::Release => match self.fetch_upstream(project).await {
                Ok(upstream) => self
                    .apply_upstream(project, &cfg, upstream)
                    .await
                    .map(RefreshOutcome::Release),
                Err(e) => Err(e),
            },
            PatchSource::Workflow => self.fetch_alpha(project).await.map(RefreshOutcome::Workflow),
        };

        self.metrics.record_patch_refresh(project, result.is_ok());
        if let Err(e) = &result {
            if matches!(e, ApiError::Upstream { .. } | ApiError::NetworkError { .. }) {
                self.metrics.record_upstream_error("github");
            }
            return result;
        }

        self.refresh_gate(&cfg).await;
        info!("Patch data of {} refreshed", project);
        result
    }

    /// 使用缓存的上游数据重建视图，缓存缺失时回源
    pub async fn rebuild(&self, project: &str) -> ApiResult<ProjectPatch> {
        let cfg = self.project(project)?;
        let upstream = match get_json::<PatchMeta>(self.store.as_ref(), &upstream_key(project))
            .await
            .map_err(|e| ApiError::store_error("get_upstream", e))?
        {
            Some(meta) => meta,
            None => self.fetch_upstream(project).await?,
        };
        self.apply_upstream(project, &cfg, upstream).await
    }

    /// 最近一次成功的工作流产物
    pub async fn fetch_alpha(&self, project: &str) -> ApiResult<Option<PatchMeta>> {
        let cfg = self.project(project)?;
        let workflow = cfg
            .workflow
            .as_ref()
            .ok_or_else(|| ApiError::config_error(format!("{project} has no workflow configured")))?;
        let github = self.github();

        let runs = github.workflow_runs(&cfg.repository, &workflow.file).await?;
        let Some(run) = runs.into_iter().find(|r| {
            r.conclusion.as_deref() == Some("success")
                && r.head_branch.as_deref() == Some(workflow.branch.as_str())
        }) else {
            debug!("No successful {} run on {}", workflow.file, workflow.branch);
            return Ok(None);
        };

        let artifacts = github.run_artifacts(&cfg.repository, run.id).await?;
        let Some(artifact) = artifacts
            .into_iter()
            .find(|a| !a.expired && a.name.starts_with(&workflow.artifact_prefix))
        else {
            debug!("Run {} has no usable artifact", run.id);
            return Ok(None);
        };

        let version = artifact
            .name
            .trim_start_matches(workflow.artifact_prefix.as_str())
            .to_string();
        let meta = PatchMeta {
            version: version.clone(),
            validation: String::new(),
            cache_time: Utc::now(),
            file_name: version,
            mirrors: vec![MirrorMeta::new(
                GithubClient::artifact_page_url(&cfg.repository, run.id, artifact.id),
                "GitHub",
                MirrorType::Browser,
            )],
        };

        set_json(
            self.store.as_ref(),
            &patch_key(project),
            &meta,
            Some(cfg.cache_ttl.unwrap_or(600)),
        )
        .await
        .map_err(|e| ApiError::store_error("set_alpha_patch", e))?;
        info!("Alpha patch of {} updated to {}", project, meta.version);
        Ok(Some(meta))
    }

    /// 优先读取缓存的测试版数据
    pub async fn alpha(&self, project: &str) -> ApiResult<Option<PatchMeta>> {
        let cached: Option<PatchMeta> = get_json(self.store.as_ref(), &patch_key(project))
            .await
            .map_err(|e| ApiError::store_error("get_alpha_patch", e))?;
        match cached {
            Some(meta) => Ok(Some(meta)),
            None => self.fetch_alpha(project).await,
        }
    }

    async fn project_patch(&self, project: &str) -> ApiResult<ProjectPatch> {
        get_json(self.store.as_ref(), &patch_key(project))
            .await
            .map_err(|e| ApiError::store_error("get_patch", e))?
            .ok_or_else(|| ApiError::patch_not_cached(project))
    }

    /// 按区域生成客户端补丁视图
    pub async fn patch_view(
        &self,
        project: &str,
        region: Region,
        user_agent: &str,
    ) -> ApiResult<PatchLookup> {
        let cfg = self.project(project)?;
        let patch = self.project_patch(project).await?;

        let (meta, prefix, note, outdated) = if region.uses_cn_patch() {
            (patch.cn.clone(), "CN endpoint reached", &patch.gitlab_message, OUTDATED_CN)
        } else {
            (patch.global.clone(), "Global endpoint reached", &patch.github_message, OUTDATED_GLOBAL)
        };

        let (retcode, message) = if cfg.refresh_client_gate {
            // 空列表与列表缺失一样视为不校验
            match self
                .client_gate
                .cached_user_agents()
                .await?
                .filter(|allowed| !allowed.is_empty())
            {
                Some(allowed) if !allowed.iter().any(|ua| ua == user_agent) => {
                    (418, outdated.to_string())
                }
                Some(_) => (0, format!("{prefix}. {note}").trim_end().to_string()),
                None => (0, format!("{prefix}.")),
            }
        } else {
            (0, prefix.to_string())
        };

        let view = PatchView {
            urls: meta.download_urls(),
            sha256: patch.cn.validation.clone(),
            meta,
        };
        Ok(PatchLookup {
            retcode,
            message,
            view,
        })
    }

    /// 下载重定向目标与校验值
    pub async fn download_target(
        &self,
        project: &str,
        region: Region,
    ) -> ApiResult<(String, Option<String>)> {
        let patch = self.project_patch(project).await?;
        let meta = if region.uses_cn_patch() {
            &patch.cn
        } else {
            &patch.global
        };
        let mirror = meta
            .preferred_mirror()
            .ok_or_else(|| ApiError::not_found(format!("mirror of {project}")))?;
        let checksum = Some(meta.validation.clone()).filter(|v| !v.is_empty());
        Ok((mirror.url.clone(), checksum))
    }

    fn validate_mirror_project(&self, project: &str) -> ApiResult<()> {
        if self.config.load().mirror_project_keys().contains(&project) {
            Ok(())
        } else {
            Err(ApiError::invalid_input("key", "Invalid project key"))
        }
    }

    async fn require_version(&self, project: &str) -> ApiResult<String> {
        self.cached_version(project)
            .await?
            .ok_or_else(|| ApiError::version_not_cached(project))
    }

    async fn persist_and_rebuild(&self, project: &str, version: &str, mirrors: &[MirrorMeta]) -> ApiResult<()> {
        self.save_mirrors(project, version, mirrors).await?;
        // 镜像已保存，视图重建失败时等待下一次定时刷新
        if let Err(e) = self.rebuild(project).await {
            warn!("Failed to rebuild patch view of {}: {}", project, e);
        }
        Ok(())
    }

    pub async fn add_mirror(
        &self,
        project: &str,
        url: &str,
        mirror_name: &str,
        mirror_type: MirrorType,
    ) -> ApiResult<MirrorUpdate> {
        if project.is_empty() || url.is_empty() || mirror_name.is_empty() {
            return Err(ApiError::invalid_input(
                "mirror",
                "key, url and mirror_name are required",
            ));
        }
        self.validate_mirror_project(project)?;
        let version = self.require_version(project).await?;

        let mut mirrors = self.stored_mirrors(project, &version).await?.unwrap_or_default();
        let method = match mirrors.iter_mut().find(|m| m.mirror_name == mirror_name) {
            Some(existing) => {
                existing.url = url.to_string();
                existing.mirror_type = mirror_type;
                "updated"
            }
            None => {
                mirrors.push(MirrorMeta::new(url, mirror_name, mirror_type));
                "added"
            }
        };

        self.persist_and_rebuild(project, &version, &mirrors).await?;
        info!("Mirror {} of {} {}: {}", mirror_name, project, method, url);
        Ok(MirrorUpdate {
            message: format!("Successfully {method} {mirror_name} mirror URL for {project}"),
            mirrors,
        })
    }

    pub async fn delete_mirror(&self, project: &str, mirror_name: &str) -> ApiResult<MirrorUpdate> {
        if project.is_empty() || mirror_name.is_empty() {
            return Err(ApiError::invalid_input(
                "mirror",
                "project_name and mirror_name are required",
            ));
        }
        self.validate_mirror_project(project)?;
        let version = self.require_version(project).await?;

        let mut mirrors = self.stored_mirrors(project, &version).await?.unwrap_or_default();
        let before = mirrors.len();
        mirrors.retain(|m| m.mirror_name != mirror_name);
        let method = if mirrors.len() != before {
            "deleted"
        } else if mirror_name == "all" {
            mirrors.clear();
            "cleared"
        } else {
            "not found"
        };

        self.persist_and_rebuild(project, &version, &mirrors).await?;
        info!("Mirror {} of {}: {}", mirror_name, project, method);
        Ok(MirrorUpdate {
            message: format!("Successfully {method} {mirror_name} mirror URL for {project}"),
            mirrors,
        })
    }

    pub async fn list_mirrors(&self, project: &str) -> ApiResult<Vec<MirrorMeta>> {
        self.validate_mirror_project(project)?;
        let Some(version) = self.cached_version(project).await? else {
            return Ok(Vec::new());
        };
        Ok(self.stored_mirrors(project, &version).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::modules::client_gate::ALLOWED_USER_AGENTS_KEY;
    use crate::tests::common::*;

    fn service(env: &TestEnvironment) -> PatchService {
        env.app_context.patch_service.clone()
    }

    fn upstream(version: &str) -> PatchMeta {
        PatchMetaBuilder::new().with_version(version).build()
    }

    async fn github_release_server(tag: &str) -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let msix_url = format!("{base}/download/Snap.Hutao_{tag}.msix");
        let sums_url = format!("{base}/download/SHA256SUMS");
        server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao/releases/latest")
            .with_status(200)
            .with_body(github_release_body(
                tag,
                &[
                    ("Snap.Hutao.msix", msix_url.as_str()),
                    ("SHA256SUMS", sums_url.as_str()),
                ],
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/download/SHA256SUMS")
            .with_status(200)
            .with_body("0123ABCD\n")
            .create_async()
            .await;
        server
    }

    fn config_for(server: &mockito::ServerGuard) -> AppConfig {
        let mut config = AppConfig::default();
        config.github.api_base = server.url();
        config.client_gate.bypass = true;
        for project in config.projects.values_mut() {
            project.refresh_client_gate = false;
        }
        config
    }

    #[tokio::test]
    async fn test_fetch_upstream_builds_meta() {
        let server = github_release_server("1.12.0").await;
        let env = TestEnvironment::with_config(config_for(&server));

        let meta = service(&env).fetch_upstream("snap-hutao").await.unwrap();
        assert_eq!(meta.version, "1.12.0.0");
        assert_eq!(meta.file_name, "Snap.Hutao_1.12.0.msix");
        assert_eq!(meta.validation, "0123ABCD");
        assert_eq!(meta.mirrors.len(), 1);
        assert_eq!(meta.mirrors[0].mirror_name, "GitHub");
    }

    #[tokio::test]
    async fn test_fetch_upstream_missing_asset_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao.Deployment/releases/latest")
            .with_status(200)
            .with_body(r#"{"tag_name":"1.0.0","assets":[]}"#)
            .create_async()
            .await;
        let env = TestEnvironment::with_config(config_for(&server));

        let err = service(&env)
            .fetch_upstream("snap-hutao-deployment")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_refresh_unknown_project() {
        let env = TestEnvironment::new();
        let err = service(&env).refresh("snap-hutao-next").await.unwrap_err();
        assert_eq!(err.http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_refresh_stores_version_and_patch() {
        let server = github_release_server("1.12.0").await;
        let env = TestEnvironment::with_config(config_for(&server));
        let svc = service(&env);

        let outcome = svc.refresh("snap-hutao").await.unwrap();
        let RefreshOutcome::Release(patch) = outcome else {
            panic!("expected release outcome");
        };
        assert_eq!(patch.global.version, "1.12.0.0");
        assert_eq!(
            env.data_store.get_string("snap-hutao:version").await.unwrap(),
            Some("1.12.0.0".to_string())
        );
        assert!(env.data_store.exists("snap-hutao:upstream").await.unwrap());
        assert!(env.data_store.exists("snap-hutao:patch").await.unwrap());
    }

    #[tokio::test]
    async fn test_version_change_drops_old_mirrors() {
        let env = TestEnvironment::new();
        let svc = service(&env);
        let cfg = env.shared_config.load().get_project("snap-hutao").cloned().unwrap();

        svc.apply_upstream("snap-hutao", &cfg, upstream("1.0.0.0")).await.unwrap();
        svc.add_mirror("snap-hutao", "https://cdn.example.com/1.msix", "CDN", MirrorType::Direct)
            .await
            .unwrap();

        let patch = svc.apply_upstream("snap-hutao", &cfg, upstream("1.0.0.0")).await.unwrap();
        assert_eq!(patch.cn.mirrors.len(), 2);
        assert_eq!(patch.global.mirrors.len(), 1);

        let patch = svc.apply_upstream("snap-hutao", &cfg, upstream("1.1.0.0")).await.unwrap();
        assert_eq!(patch.cn.mirrors.len(), 1);
        assert!(!env.data_store.exists("snap-hutao:mirrors:1.0.0.0").await.unwrap());
        assert!(svc.list_mirrors("snap-hutao").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_mirrors_seed_new_version() {
        let env = TestEnvironment::new();
        let svc = service(&env);
        let cfg = env
            .shared_config
            .load()
            .get_project("snap-hutao-deployment")
            .cloned()
            .unwrap();

        let patch = svc
            .apply_upstream("snap-hutao-deployment", &cfg, upstream("1.0.0.0"))
            .await
            .unwrap();
        assert_eq!(patch.cn.mirrors.len(), 1);
        assert_eq!(patch.cn.mirrors[0].mirror_name, "QHY CDN");
        assert_eq!(patch.global.mirrors[0].mirror_name, "GitHub");

        let mirrors = svc.list_mirrors("snap-hutao-deployment").await.unwrap();
        assert_eq!(mirrors.len(), 1);
    }

    #[tokio::test]
    async fn test_mirror_operations() {
        let env = TestEnvironment::new();
        let svc = service(&env);

        let err = svc
            .add_mirror("snap-hutao", "https://a", "A", MirrorType::Direct)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 404);

        let cfg = env.shared_config.load().get_project("snap-hutao").cloned().unwrap();
        svc.apply_upstream("snap-hutao", &cfg, upstream("1.0.0.0")).await.unwrap();

        let added = svc
            .add_mirror("snap-hutao", "https://a", "A", MirrorType::Direct)
            .await
            .unwrap();
        assert_eq!(added.message, "Successfully added A mirror URL for snap-hutao");

        let updated = svc
            .add_mirror("snap-hutao", "https://b", "A", MirrorType::Browser)
            .await
            .unwrap();
        assert_eq!(updated.message, "Successfully updated A mirror URL for snap-hutao");
        assert_eq!(updated.mirrors.len(), 1);
        assert_eq!(updated.mirrors[0].url, "https://b");

        // 重建后国内视图包含新镜像
        let (url, checksum) = svc.download_target("snap-hutao", Region::China).await.unwrap();
        assert_eq!(url, "https://b");
        assert_eq!(checksum.as_deref(), Some("ABCDEF"));

        let missing = svc.delete_mirror("snap-hutao", "B").await.unwrap();
        assert_eq!(missing.message, "Successfully not found B mirror URL for snap-hutao");

        svc.add_mirror("snap-hutao", "https://c", "C", MirrorType::Direct)
            .await
            .unwrap();
        let deleted = svc.delete_mirror("snap-hutao", "A").await.unwrap();
        assert_eq!(deleted.mirrors.len(), 1);

        let cleared = svc.delete_mirror("snap-hutao", "all").await.unwrap();
        assert!(cleared.mirrors.is_empty());
        assert_eq!(cleared.message, "Successfully cleared all mirror URL for snap-hutao");
    }

    #[tokio::test]
    async fn test_mirror_validation() {
        let env = TestEnvironment::new();
        let svc = service(&env);
        let err = svc
            .add_mirror("snap-hutao-alpha", "https://a", "A", MirrorType::Direct)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        let err = svc
            .add_mirror("snap-hutao", "", "A", MirrorType::Direct)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert!(svc.list_mirrors("unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_patch_view_gates_outdated_clients() {
        let env = TestEnvironment::new();
        let svc = service(&env);

        let err = svc
            .patch_view("snap-hutao", Region::China, "Snap Hutao/1.0.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PatchNotCached { .. }));

        let cfg = env.shared_config.load().get_project("snap-hutao").cloned().unwrap();
        svc.apply_upstream("snap-hutao", &cfg, upstream("1.0.0.0")).await.unwrap();

        let lookup = svc
            .patch_view("snap-hutao", Region::Global, "Snap Hutao/1.0.0.0")
            .await
            .unwrap();
        assert_eq!(lookup.retcode, 0);
        assert_eq!(lookup.message, "Global endpoint reached.");
        assert_eq!(lookup.view.sha256, "ABCDEF");
        assert_eq!(lookup.view.urls.len(), 1);

        set_json(
            env.data_store.as_ref(),
            ALLOWED_USER_AGENTS_KEY,
            &vec!["Snap Hutao/1.0.0.0"],
            Some(300),
        )
        .await
        .unwrap();

        let lookup = svc
            .patch_view("snap-hutao", Region::Fujian, "Snap Hutao/1.0.0.0")
            .await
            .unwrap();
        assert_eq!((lookup.retcode, lookup.message.as_str()), (0, "CN endpoint reached."));

        let lookup = svc
            .patch_view("snap-hutao", Region::China, "Snap Hutao/0.9.0.0")
            .await
            .unwrap();
        assert_eq!(lookup.retcode, 418);
        assert_eq!(lookup.message, OUTDATED_CN);
    }

    #[tokio::test]
    async fn test_fetch_alpha_picks_successful_artifact() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao/actions/workflows/alpha.yml/runs")
            .with_status(200)
            .with_body(
                r#"{"workflow_runs":[
                    {"id":3,"conclusion":"failure","head_branch":"develop"},
                    {"id":2,"conclusion":"success","head_branch":"main"},
                    {"id":1,"conclusion":"success","head_branch":"develop"}
                ]}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao/actions/runs/1/artifacts")
            .with_status(200)
            .with_body(
                r#"{"artifacts":[
                    {"id":10,"name":"Snap.Hutao.Alpha-1.12.5.0","expired":true},
                    {"id":11,"name":"logs","expired":false},
                    {"id":12,"name":"Snap.Hutao.Alpha-1.12.6.0","expired":false}
                ]}"#,
            )
            .create_async()
            .await;
        let env = TestEnvironment::with_config(config_for(&server));
        let svc = service(&env);

        let meta = svc.fetch_alpha("snap-hutao-alpha").await.unwrap().unwrap();
        assert_eq!(meta.version, "1.12.6.0");
        assert_eq!(meta.mirrors[0].mirror_type, MirrorType::Browser);
        assert_eq!(
            meta.mirrors[0].url,
            "https://github.com/DGP-Studio/Snap.Hutao/actions/runs/1/artifacts/12"
        );

        let cached = svc.alpha("snap-hutao-alpha").await.unwrap().unwrap();
        assert_eq!(cached.version, "1.12.6.0");
    }
}
