use tracing::{debug, info, warn};

use crate::config::SharedConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{IssueReport, IssueStats, IssueSummary};
use crate::modules::github::{GithubClient, Issue};
use crate::modules::storage::{DataStore, get_json, set_json};

pub const ISSUE_CACHE_KEY: &str = "issues:hutao:open:bug";

/// 去掉 PR，只保留客户端需要的字段
pub fn summarize(issues: Vec<Issue>) -> Vec<IssueSummary> {
    issues
        .into_iter()
        .filter(|i| i.pull_request.is_none())
        .map(|i| IssueSummary {
            number: i.number,
            title: i.title,
            labels: i.labels.into_iter().map(|l| l.name).collect(),
            author: i.user.map(|u| u.login).unwrap_or_default(),
            created_at: i.created_at,
        })
        .collect()
}

pub fn bug_stats(issues: &[IssueSummary]) -> IssueStats {
    let mut stat = IssueStats::default();
    for issue in issues {
        let labels: Vec<&str> = issue
            .labels
            .iter()
            .map(String::as_str)
            .filter(|l| !l.starts_with("priority"))
            .collect();

        if labels.contains(&"等待发布") {
            stat.waiting_for_release += 1;
        }
        if !labels.is_empty() && labels.iter().all(|l| l.starts_with("area")) {
            stat.untreated += 1;
        }
        if labels
            .iter()
            .any(|l| *l == "need-community-help" || *l == "无法稳定复现")
        {
            stat.hard_to_fix += 1;
        }
    }
    stat
}

#[derive(Clone)]
pub struct IssueService {
    store: DataStore,
    config: SharedConfig,
}

impl IssueService {
    pub fn new(store: DataStore, config: SharedConfig) -> Self {
        Self { store, config }
    }

    /// 返回报告以及是否命中缓存
    pub async fn open_bugs(&self) -> ApiResult<(IssueReport, bool)> {
        match get_json::<IssueReport>(self.store.as_ref(), ISSUE_CACHE_KEY).await {
            Ok(Some(report)) => return Ok((report, true)),
            Ok(None) => {}
            Err(e) => warn!("Failed to decode cached issues: {}", e),
        }

        let config = self.config.load_full();
        let github = GithubClient::new(&config.github);
        debug!("Fetching open bug issues of {}", config.issues.repository);
        let details = summarize(github.open_bug_issues(&config.issues.repository).await?);
        info!("Fetched {} open 'Bug' issues", details.len());

        let report = IssueReport {
            stat: bug_stats(&details),
            details,
        };
        set_json(
            self.store.as_ref(),
            ISSUE_CACHE_KEY,
            &report,
            Some(config.issues.cache_ttl),
        )
        .await
        .map_err(|e| ApiError::store_error("set_issue_cache", e))?;
        Ok((report, false))
    }
}
