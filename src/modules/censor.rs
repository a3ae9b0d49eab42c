use flate2::read::GzDecoder;
use futures::{StreamExt, stream};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Component, Path};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SharedConfig;
use crate::container::REQWEST_CLIENT;
use crate::error::{ApiError, ApiResult};
use crate::modules::github::GithubClient;
use crate::modules::mailer::SharedMailer;
use crate::modules::storage::{DataStore, set_json};

pub const CENSORED_FILES_KEY: &str = "metadata_censored_files";

const CENSOR_MARKERS: [&str; 2] = [
    "根据相关法律政策",
    "According to the relevant laws and regulations",
];

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVerdict {
    Clean,
    Censored,
    BrokenJson,
}

/// 判断镜像返回的文件内容是否被拦截
pub fn classify(file: &str, body: &str) -> FileVerdict {
    if CENSOR_MARKERS.iter().any(|marker| body.contains(marker)) {
        return FileVerdict::Censored;
    }
    if file.ends_with(".json") && serde_json::from_str::<serde::de::IgnoredAny>(body).is_err() {
        return FileVerdict::BrokenJson;
    }
    FileVerdict::Clean
}

/// 列出 tar.gz 中的普通文件，路径去掉归档顶层目录
pub fn list_archive_files<R: Read>(reader: R) -> ApiResult<Vec<String>> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| ApiError::io_error("read_archive", e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ApiError::io_error("read_archive_entry", e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| ApiError::io_error("read_archive_path", e.to_string()))?;
        let relative: Vec<String> = path
            .components()
            .skip(1)
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if !relative.is_empty() {
            files.push(relative.join("/"));
        }
    }
    Ok(files)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub content: String,
}

/// 对比前后两次扫描结果生成通知邮件，无变化时返回 None
pub fn build_notification(
    jihulab_base: &str,
    repo: &str,
    previous: &[String],
    current: &[String],
) -> Option<Notification> {
    let blob_url = |file: &str| format!("{jihulab_base}/{repo}/-/blob/main/{file}");
    let footer = "若内部检查后确认文件内容无违规，请将本邮件转发至 usersupport@gitlab.cn 以做恢复处理。\n\n   -- DGP-Studio 审核系统";
    let review_subject = format!("请求人工复审被拦截的文件 - {repo}");

    if current.is_empty() {
        if previous.is_empty() {
            return None;
        }
        let mut content = format!("致系统管理员：\n\n 检测到 {repo} 仓库中的以下文件已恢复：\n");
        for file in previous {
            content.push_str(&format!("{}\n", blob_url(file)));
        }
        content.push_str("\n   -- DGP-Studio 审核系统");
        return Some(Notification {
            subject: format!("被拦截的文件已恢复访问 - {repo}"),
            content,
        });
    }

    let header = format!("致系统管理员：\n\n 检测到 {repo} 仓库中的以下文件被审查系统拦截，请及时处理：\n");

    if previous.is_empty() {
        let mut content = header;
        for file in current {
            content.push_str(&format!("{}\n", blob_url(file)));
        }
        content.push_str(footer);
        return Some(Notification {
            subject: review_subject,
            content,
        });
    }

    let previous_set: BTreeSet<&String> = previous.iter().collect();
    let current_set: BTreeSet<&String> = current.iter().collect();
    if previous_set == current_set {
        return None;
    }

    let mut content = header;
    content.push_str("新增被拦截的文件：\n");
    for file in current_set.difference(&previous_set) {
        content.push_str(&format!("{}\n", blob_url(file)));
    }
    content.push_str("\n被拦截的文件已恢复访问：\n");
    for file in previous_set.difference(&current_set) {
        content.push_str(&format!("{}\n", blob_url(file)));
    }
    content.push_str(footer);
    Some(Notification {
        subject: review_subject,
        content,
    })
}

/// 极狐 GitLab 镜像合规扫描
#[derive(Clone)]
pub struct CensorScanner {
    store: DataStore,
    config: SharedConfig,
    mailer: SharedMailer,
    retry_delay: Duration,
}

impl CensorScanner {
    pub fn new(store: DataStore, config: SharedConfig, mailer: SharedMailer) -> Self {
        Self {
            store,
            config,
            mailer,
            retry_delay: Duration::from_secs(3),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// 读取上次结果；结果文件仍在扫描间隔内时第二项为 true
    async fn load_previous(path: &Path, interval: Duration) -> (Vec<String>, bool) {
        let previous = match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Failed to parse {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(_) => return (Vec::new(), false),
        };

        let fresh = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age < interval);
        (previous, fresh)
    }

    async fn check_file(&self, url: String, file: String) -> (String, FileVerdict) {
        for attempt in 1..=MAX_ATTEMPTS {
            let result = REQWEST_CLIENT
                .get(&url)
                .header("Accept-Language", "zh-CN;q=0.8,zh;q=0.7")
                .send()
                .await;
            match result {
                Ok(response) => match response.text().await {
                    Ok(body) => {
                        let verdict = classify(&file, &body);
                        if verdict != FileVerdict::Clean {
                            warn!("Found {:?} file: {}", verdict, file);
                        }
                        return (file, verdict);
                    }
                    Err(e) => warn!("Failed to read {} (attempt {}): {}", file, attempt, e),
                },
                Err(e) => warn!("Failed to check {} (attempt {}): {}", file, attempt, e),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        (file, FileVerdict::Clean)
    }

    /// 执行一次扫描，返回排序去重后的屏蔽文件列表
    pub async fn scan(&self) -> ApiResult<Vec<String>> {
        let config = self.config.load_full();
        let censor = &config.censor;
        let interval = Duration::from_secs(censor.scan_interval_minutes * 60);
        let cache_path = Path::new(&censor.cache_file);

        let (previous, fresh) = Self::load_previous(cache_path, interval).await;
        if fresh {
            info!(
                "Last check is less than {} minutes, skip this check",
                censor.scan_interval_minutes
            );
            self.publish(&previous, censor.scan_interval_minutes).await?;
            return Ok(previous);
        }

        info!("Starting regulatory checker for {}", censor.jihulab_repository);
        let github = GithubClient::new(&config.github);
        let tarball = github
            .download_tarball(&censor.upstream_repository, &censor.branch)
            .await?;
        let files = tokio::task::spawn_blocking(move || list_archive_files(tarball.as_slice()))
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))??;
        debug!("Upstream files: {:?}", files);

        let base = censor.jihulab_base.trim_end_matches('/');
        let verdicts: Vec<(String, FileVerdict)> = stream::iter(files)
            .map(|file| {
                let url = format!(
                    "{}/{}/-/raw/{}/{}",
                    base, censor.jihulab_repository, censor.branch, file
                );
                self.check_file(url, file)
            })
            .buffer_unordered(censor.concurrency.max(1))
            .collect()
            .await;

        let censored: Vec<String> = verdicts
            .into_iter()
            .filter(|(_, verdict)| *verdict != FileVerdict::Clean)
            .map(|(file, _)| file)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!("Censored files: {:?}", censored);

        if let Some(notification) =
            build_notification(base, &censor.jihulab_repository, &previous, &censored)
        {
            if let Err(e) = self
                .mailer
                .send(
                    &notification.subject,
                    &notification.content,
                    &config.mail.admin_email,
                )
                .await
            {
                warn!("Failed to send censor notification: {}", e);
            }
        } else {
            info!("No change in censored file list");
        }

        if let Some(parent) = cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&censored)?;
        tokio::fs::write(cache_path, json).await?;

        self.publish(&censored, censor.scan_interval_minutes).await?;
        Ok(censored)
    }

    async fn publish(&self, files: &[String], interval_minutes: u64) -> ApiResult<()> {
        let ttl = (interval_minutes * 60 * 2).min(u32::MAX as u64) as u32;
        set_json(self.store.as_ref(), CENSORED_FILES_KEY, files, Some(ttl))
            .await
            .map_err(|e| ApiError::store_error("set_censored_files", e))
    }
}
