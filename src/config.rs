use arc_swap::{ArcSwap, Guard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{MirrorMeta, MirrorType};

fn default_homepage_url() -> String {
    "https://hut.ao".to_string()
}
fn default_patch_refresh_interval() -> u64 {
    600
} // 10分钟
fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_codeload_base() -> String {
    "https://codeload.github.com".to_string()
}
fn default_github_api_version() -> String {
    "2022-11-28".to_string()
}
fn default_admin_email() -> String {
    "support@dgp-studio.cn".to_string()
}
fn default_smtp_port() -> u16 {
    465
}

/// GitHub API 访问配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Personal access token，为空时匿名访问
    pub token: Option<String>,
    pub api_base: String,
    pub codeload_base: String,
    pub api_version: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_github_api_base(),
            codeload_base: default_codeload_base(),
            api_version: default_github_api_version(),
        }
    }
}

/// 客户端版本校验配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientGateConfig {
    pub bypass: bool,
    /// 仓库 -> UA 模板（`{ver}` 会被替换为版本号）
    pub whitelist_repositories: BTreeMap<String, String>,
    /// 以这些前缀开头的 UA 永远放行
    pub trusted_prefixes: Vec<String>,
    /// 发布预告 PR 所在仓库
    pub docs_repository: String,
    /// 允许列表缓存时间（秒）
    pub allowed_list_ttl: u32,
    /// 每个仓库保留的稳定版本数
    pub stable_history: usize,
}

impl Default for ClientGateConfig {
    fn default() -> Self {
        Self {
            bypass: false,
            whitelist_repositories: BTreeMap::new(),
            trusted_prefixes: vec![
                "Snap Hutao/2024".to_string(),
                "PaimonsNotebook/".to_string(),
            ],
            docs_repository: "DGP-Studio/Snap.Hutao.Docs".to_string(),
            allowed_list_ttl: 300,
            stable_history: 4,
        }
    }
}

/// 补丁数据来源
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchSource {
    /// GitHub Release 最新版本
    #[default]
    Release,
    /// GitHub Actions 工作流产物
    Workflow,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    pub file: String,
    pub branch: String,
    pub artifact_prefix: String,
}

/// 单个补丁项目配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub repository: String,
    #[serde(default)]
    pub source: PatchSource,
    /// 主安装包文件后缀
    #[serde(default)]
    pub asset_suffix: String,
    /// 校验文件后缀，缺省时不做校验
    #[serde(default)]
    pub checksum_suffix: Option<String>,
    /// 版本变更时用于初始化镜像列表的固定国内镜像
    #[serde(default)]
    pub static_mirrors: Vec<MirrorMeta>,
    /// 是否允许通过管理接口维护镜像
    #[serde(default)]
    pub mirrors_enabled: bool,
    /// 刷新后是否同步刷新客户端 UA 允许列表
    #[serde(default)]
    pub refresh_client_gate: bool,
    #[serde(default)]
    pub workflow: Option<WorkflowConfig>,
    /// 工作流产物缓存时间（秒）
    #[serde(default)]
    pub cache_ttl: Option<u32>,
}

fn default_projects() -> BTreeMap<String, ProjectConfig> {
    let mut projects = BTreeMap::new();
    projects.insert(
        "snap-hutao".to_string(),
        ProjectConfig {
            repository: "DGP-Studio/Snap.Hutao".to_string(),
            source: PatchSource::Release,
            asset_suffix: ".msix".to_string(),
            checksum_suffix: Some("SHA256SUMS".to_string()),
            static_mirrors: vec![],
            mirrors_enabled: true,
            refresh_client_gate: true,
            workflow: None,
            cache_ttl: None,
        },
    );
    projects.insert(
        "snap-hutao-deployment".to_string(),
        ProjectConfig {
            repository: "DGP-Studio/Snap.Hutao.Deployment".to_string(),
            source: PatchSource::Release,
            asset_suffix: ".exe".to_string(),
            checksum_suffix: None,
            static_mirrors: vec![MirrorMeta::new(
                "https://api.qhy04.com/hutaocdn/deployment",
                "QHY CDN",
                MirrorType::Direct,
            )],
            mirrors_enabled: true,
            refresh_client_gate: false,
            workflow: None,
            cache_ttl: None,
        },
    );
    projects.insert(
        "snap-hutao-alpha".to_string(),
        ProjectConfig {
            repository: "DGP-Studio/Snap.Hutao".to_string(),
            source: PatchSource::Workflow,
            asset_suffix: String::new(),
            checksum_suffix: None,
            static_mirrors: vec![],
            mirrors_enabled: false,
            refresh_client_gate: true,
            workflow: Some(WorkflowConfig {
                file: "alpha.yml".to_string(),
                branch: "develop".to_string(),
                artifact_prefix: "Snap.Hutao.Alpha-".to_string(),
            }),
            cache_ttl: Some(600),
        },
    );
    projects
}

/// 合规扫描配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CensorConfig {
    pub enabled: bool,
    pub upstream_repository: String,
    pub jihulab_repository: String,
    pub branch: String,
    pub jihulab_base: String,
    /// 扫描间隔（分钟）
    pub scan_interval_minutes: u64,
    pub concurrency: usize,
    pub cache_file: String,
}

impl Default for CensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            upstream_repository: "DGP-Studio/Snap.Metadata".to_string(),
            jihulab_repository: "DGP-Studio/Snap.Metadata".to_string(),
            branch: "main".to_string(),
            jihulab_base: "https://jihulab.com".to_string(),
            scan_interval_minutes: 30,
            concurrency: 8,
            cache_file: "cache/censored_files.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// 发件人，缺省使用 username
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp: Option<SmtpConfig>,
    pub admin_email: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp: None,
            admin_email: default_admin_email(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrowdinConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub project_id: u64,
    pub cache_ttl: u32,
}

impl Default for CrowdinConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.crowdin.com/api/v2".to_string(),
            project_id: 565845,
            cache_ttl: 3600,
        }
    }
}

/// 角色攻略数据源
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub uigf_dict_url: String,
    pub uigf_dict_ttl: u32,
    pub uigf_lang: String,
    pub miyoushe_list_url: String,
    pub miyoushe_channel_id: i64,
    pub miyoushe_avatar_menu_id: i64,
    pub hoyolab_list_url: String,
    pub hoyolab_guide_id: String,
    pub miyoushe_url_template: String,
    pub hoyolab_url_template: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            uigf_dict_url: "https://api.uigf.org/dict/genshin/all.json".to_string(),
            uigf_dict_ttl: 3 * 3600,
            uigf_lang: "chs".to_string(),
            miyoushe_list_url: "https://api-static.mihoyo.com/common/blackboard/ys_strategy/v1/home/content/list?app_sn=ys_strategy&channel_id=37".to_string(),
            miyoushe_channel_id: 37,
            miyoushe_avatar_menu_id: 39,
            hoyolab_list_url: "https://bbs-api-os.hoyolab.com/community/painter/wapi/circle/channel/guide/second_page/info".to_string(),
            hoyolab_guide_id: "63b63aefc61f3cbe3ead18d9".to_string(),
            miyoushe_url_template: "https://bbs.mihoyo.com/ys/strategy/channel/map/39/{mys_strategy_id}?bbs_presentation_style=no_header".to_string(),
            hoyolab_url_template: "https://www.hoyolab.com/guidelist?game_id=2&guide_id={hoyolab_strategy_id}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IssueConfig {
    pub repository: String,
    pub cache_ttl: u32,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            repository: "DGP-Studio/Snap.Hutao".to_string(),
            cache_ttl: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 管理接口 token（请求头 `api-token`）
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_homepage_url")]
    pub homepage_url: String,
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub server_type: String,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub client_gate: ClientGateConfig,
    #[serde(default = "default_projects")]
    pub projects: BTreeMap<String, ProjectConfig>,
    #[serde(default = "default_patch_refresh_interval")]
    pub patch_refresh_interval_secs: u64,
    /// 覆盖内置的默认重定向模板
    #[serde(default)]
    pub redirect_rules: BTreeMap<String, String>,
    #[serde(default)]
    pub censor: CensorConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub crowdin: CrowdinConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub issues: IssueConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            homepage_url: default_homepage_url(),
            image_name: String::new(),
            server_type: String::new(),
            github: GithubConfig::default(),
            client_gate: ClientGateConfig::default(),
            projects: default_projects(),
            patch_refresh_interval_secs: default_patch_refresh_interval(),
            redirect_rules: BTreeMap::new(),
            censor: CensorConfig::default(),
            mail: MailConfig::default(),
            crowdin: CrowdinConfig::default(),
            strategy: StrategyConfig::default(),
            issues: IssueConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn get_project(&self, key: &str) -> Option<&ProjectConfig> {
        self.projects.get(key)
    }

    /// 可维护镜像的项目
    pub fn mirror_project_keys(&self) -> Vec<&str> {
        self.projects
            .iter()
            .filter(|(_, p)| p.mirrors_enabled)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// 镜像名包含 alpha 或 dev 时为调试部署
    pub fn is_debug(&self) -> bool {
        let name = self.image_name.to_lowercase();
        name.contains("alpha") || name.contains("dev")
    }

    /// 使用环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = non_empty("API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(pat) = non_empty("GITHUB_PAT") {
            self.github.token = Some(pat);
        }
        if let Some(raw) = non_empty("WHITE_LIST_REPOSITORIES") {
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(repos) => self.client_gate.whitelist_repositories = repos,
                Err(e) => warn!("Failed to parse WHITE_LIST_REPOSITORIES: {}", e),
            }
        }
        if let Some(bypass) = non_empty("BYPASS_CLIENT_VERIFICATION") {
            self.client_gate.bypass = bypass.eq_ignore_ascii_case("true");
            if self.client_gate.bypass {
                warn!("Client verification is bypassed in this server");
            }
        }
        if let Some(key) = non_empty("CROWDIN_API_KEY") {
            self.crowdin.api_key = Some(key);
        }
        if let Some(minutes) = non_empty("CENSOR_FILE_SCAN_DURATION") {
            match minutes.parse::<u64>() {
                Ok(m) if m > 0 => self.censor.scan_interval_minutes = m,
                _ => warn!("Invalid CENSOR_FILE_SCAN_DURATION: {}", minutes),
            }
        }
        if let Some(email) = non_empty("ADMIN_EMAIL") {
            self.mail.admin_email = email;
        }
        if let Some(name) = non_empty("IMAGE_NAME") {
            self.image_name = name;
        }
        if let Some(server_type) = non_empty("SERVER_TYPE") {
            self.server_type = server_type;
        }

        // SMTP 需要服务器、用户名、密码同时存在
        if let (Some(server), Some(username), Some(password)) = (
            non_empty("EMAIL_SERVER"),
            non_empty("EMAIL_USERNAME"),
            non_empty("EMAIL_PASSWORD"),
        ) {
            let port = non_empty("EMAIL_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_smtp_port);
            self.mail.smtp = Some(SmtpConfig {
                server,
                port,
                username,
                password,
                from: None,
            });
        }
    }

    pub async fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_yaml::from_str::<AppConfig>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file {} not found, using defaults", path);
                AppConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.apply_env_overrides();

        if config.api_token.is_none() {
            warn!("API_TOKEN is not set, management endpoints will reject every request");
        }

        Ok(config)
    }
}

/// 使用 ArcSwap 实现的共享配置，支持热重载且无锁读取
#[derive(Clone)]
pub struct SharedConfig {
    config: Arc<ArcSwap<AppConfig>>,
}

impl SharedConfig {
    pub fn new(initial_config: AppConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(initial_config)),
        }
    }

    /// 无锁获取配置的引用
    pub fn load(&self) -> Guard<Arc<AppConfig>> {
        self.config.load()
    }

    /// 获取配置快照，可跨 await 持有
    pub fn load_full(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// 热重载配置（原子操作）
    pub fn reload(&self, new_config: AppConfig) {
        self.config.store(Arc::new(new_config));
        info!("Configuration reloaded successfully");
    }

    pub async fn reload_from_file(&self) -> anyhow::Result<()> {
        let new_config = AppConfig::load().await?;
        self.reload(new_config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_projects() {
        let config = AppConfig::default();
        let hutao = config.get_project("snap-hutao").unwrap();
        assert_eq!(hutao.asset_suffix, ".msix");
        assert_eq!(hutao.checksum_suffix.as_deref(), Some("SHA256SUMS"));

        let deployment = config.get_project("snap-hutao-deployment").unwrap();
        assert_eq!(deployment.static_mirrors[0].mirror_name, "QHY CDN");

        let alpha = config.get_project("snap-hutao-alpha").unwrap();
        assert_eq!(alpha.source, PatchSource::Workflow);

        let mut keys = config.mirror_project_keys();
        keys.sort();
        assert_eq!(keys, vec!["snap-hutao", "snap-hutao-deployment"]);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.homepage_url, "https://hut.ao");
        assert_eq!(config.censor.scan_interval_minutes, 30);
        assert_eq!(config.projects.len(), 3);
        assert_eq!(config.github.api_base, "https://api.github.com");
    }

    #[test]
    fn test_partial_yaml_keeps_nested_defaults() {
        let yaml = r#"
api_token: secret
github:
  api_base: http://127.0.0.1:9000
censor:
  enabled: false
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.github.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.github.api_version, "2022-11-28");
        assert!(!config.censor.enabled);
        assert_eq!(config.censor.branch, "main");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(lookup_from(&[
            ("API_TOKEN", "token"),
            ("GITHUB_PAT", "ghp_x"),
            (
                "WHITE_LIST_REPOSITORIES",
                r#"{"DGP-Studio/Snap.Hutao": "Snap Hutao/{ver}.0"}"#,
            ),
            ("BYPASS_CLIENT_VERIFICATION", "True"),
            ("CENSOR_FILE_SCAN_DURATION", "15"),
            ("IMAGE_NAME", "hutao-dev"),
            ("EMAIL_SERVER", "smtp.example.com"),
            ("EMAIL_USERNAME", "bot@example.com"),
            ("EMAIL_PASSWORD", "pw"),
        ]));

        assert_eq!(config.api_token.as_deref(), Some("token"));
        assert_eq!(config.github.token.as_deref(), Some("ghp_x"));
        assert_eq!(
            config
                .client_gate
                .whitelist_repositories
                .get("DGP-Studio/Snap.Hutao")
                .map(String::as_str),
            Some("Snap Hutao/{ver}.0")
        );
        assert!(config.client_gate.bypass);
        assert_eq!(config.censor.scan_interval_minutes, 15);
        assert!(config.is_debug());

        let smtp = config.mail.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.server, "smtp.example.com");
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(lookup_from(&[
            ("WHITE_LIST_REPOSITORIES", "not json"),
            ("CENSOR_FILE_SCAN_DURATION", "0"),
            ("EMAIL_SERVER", "smtp.example.com"),
        ]));
        assert!(config.client_gate.whitelist_repositories.is_empty());
        assert_eq!(config.censor.scan_interval_minutes, 30);
        assert!(config.mail.smtp.is_none());
        assert!(!config.is_debug());
    }

    #[test]
    fn test_shared_config_reload() {
        let shared = SharedConfig::new(AppConfig::default());
        assert!(shared.load().api_token.is_none());

        let mut updated = AppConfig::default();
        updated.api_token = Some("new".to_string());
        shared.reload(updated);
        assert_eq!(shared.load().api_token.as_deref(), Some("new"));
    }
}
