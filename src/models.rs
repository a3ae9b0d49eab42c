use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// 镜像类型：direct 可直接下载，browser 需要浏览器打开
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MirrorType {
    #[default]
    Direct,
    Browser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MirrorMeta {
    pub url: String,
    pub mirror_name: String,
    #[serde(default)]
    pub mirror_type: MirrorType,
}

impl MirrorMeta {
    pub fn new<U: Into<String>, N: Into<String>>(url: U, mirror_name: N, mirror_type: MirrorType) -> Self {
        Self {
            url: url.into(),
            mirror_name: mirror_name.into(),
            mirror_type,
        }
    }
}

/// 单个版本的补丁元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatchMeta {
    pub version: String,
    #[serde(default)]
    pub validation: String,
    pub cache_time: DateTime<Utc>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub mirrors: Vec<MirrorMeta>,
}

impl PatchMeta {
    /// 追加镜像，同名镜像以后出现的为准，位置保持首次出现处
    pub fn merge_mirrors<I: IntoIterator<Item = MirrorMeta>>(&mut self, mirrors: I) {
        for mirror in mirrors {
            match self
                .mirrors
                .iter_mut()
                .find(|m| m.mirror_name == mirror.mirror_name)
            {
                Some(existing) => *existing = mirror,
                None => self.mirrors.push(mirror),
            }
        }
    }

    /// 客户端兼容字段：排除归档链接后倒序
    pub fn download_urls(&self) -> Vec<String> {
        self.mirrors
            .iter()
            .filter(|m| !m.url.contains("archive"))
            .map(|m| m.url.clone())
            .rev()
            .collect()
    }

    /// 下载重定向使用最后一个镜像
    pub fn preferred_mirror(&self) -> Option<&MirrorMeta> {
        self.mirrors.last()
    }
}

/// `<project>:patch` 中保存的组合视图
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectPatch {
    pub global: PatchMeta,
    pub cn: PatchMeta,
    #[serde(default)]
    pub github_message: String,
    #[serde(default)]
    pub gitlab_message: String,
}

/// 返回给客户端的补丁数据
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatchView {
    #[serde(flatten)]
    pub meta: PatchMeta,
    pub urls: Vec<String>,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Wallpaper {
    pub url: String,
    #[serde(default)]
    pub display_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_display_date: Option<NaiveDate>,
    pub source_url: String,
    pub author: String,
    pub uploader: String,
    #[serde(default)]
    pub disabled: bool,
}

impl Wallpaper {
    /// 三天内未展示过的壁纸视为新鲜
    pub fn is_fresh(&self, today: NaiveDate) -> bool {
        match self.last_display_date {
            None => true,
            Some(last) => last < today - chrono::Duration::days(3),
        }
    }
}

/// 角色 ID -> 攻略 ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AvatarStrategy {
    #[serde(default)]
    pub mys_strategy_id: Option<i64>,
    #[serde(default)]
    pub hoyolab_strategy_id: Option<i64>,
}

pub type StrategyMap = HashMap<String, AvatarStrategy>;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StrategyLinks {
    pub miyoushe_url: Option<String>,
    pub hoyolab_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub labels: Vec<String>,
    pub author: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IssueStats {
    pub waiting_for_release: u32,
    pub untreated: u32,
    pub hard_to_fix: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct IssueReport {
    pub details: Vec<IssueSummary>,
    pub stat: IssueStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LanguageProgress {
    pub total: u64,
    pub translated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyActiveUserStats {
    pub date: NaiveDate,
    pub cn_user: u64,
    pub global_user: u64,
    pub unknown: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyVersionStats {
    pub date: NaiveDate,
    pub stats: HashMap<String, u64>,
}
