use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::SharedConfig;
use crate::services::PatchService;

/// 启动时已刷新过一次，首次触发推迟一个周期
fn refresh_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// 定时从上游刷新所有补丁项目
pub struct PatchUpdater {
    config: SharedConfig,
    patch_service: PatchService,
}

impl PatchUpdater {
    pub fn new(config: SharedConfig, patch_service: PatchService) -> Self {
        Self {
            config,
            patch_service,
        }
    }

    /// 启动后台更新任务
    pub async fn start_background_task(self: Arc<Self>) {
        let interval_secs = self.config.load().patch_refresh_interval_secs.max(60);
        info!("Starting patch updater background task, interval: {}s", interval_secs);

        tokio::spawn(async move {
            let mut interval = refresh_interval(Duration::from_secs(interval_secs));

            loop {
                interval.tick().await;

                let updated = self.update_all().await;
                debug!("Patch update cycle completed, refreshed {} projects", updated);
            }
        });
    }

    /// 刷新每个项目，返回成功数量
    pub async fn update_all(&self) -> usize {
        let projects: Vec<String> = self.config.load().projects.keys().cloned().collect();
        let total = projects.len();
        let mut updated = 0;

        for (index, project) in projects.iter().enumerate() {
            // 错开请求时间，避免同时请求 GitHub API
            if index > 0 {
                let stagger_delay = (index * 1000) / total;
                if stagger_delay > 0 {
                    tokio::time::sleep(Duration::from_millis(stagger_delay as u64)).await;
                }
            }

            match self.patch_service.refresh(project).await {
                Ok(_) => updated += 1,
                Err(e) => error!("Failed to refresh {}: {}", project, e),
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::tests::common::*;

    #[tokio::test]
    async fn test_first_tick_waits_one_period() {
        let mut interval = refresh_interval(Duration::from_secs(60));
        let first = tokio::time::timeout(Duration::from_millis(50), interval.tick()).await;
        assert!(first.is_err());
    }

    #[tokio::test]
    async fn test_failed_projects_do_not_stop_cycle() {
        let mut server = mockito::Server::new_async().await;
        let asset_url = format!("{}/d/Deployment.exe", server.url());
        server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao.Deployment/releases/latest")
            .with_status(200)
            .with_body(github_release_body(
                "1.2.0",
                &[("Deployment.exe", asset_url.as_str())],
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/repos/DGP-Studio/Snap.Hutao/releases/latest")
            .with_status(500)
            .create_async()
            .await;

        let mut config = AppConfig::default();
        config.github.api_base = server.url();
        config.projects.retain(|key, _| key != "snap-hutao-alpha");
        let env = TestEnvironment::with_config(config);

        let updater = PatchUpdater::new(
            env.shared_config.clone(),
            env.app_context.patch_service.clone(),
        );
        assert_eq!(updater.update_all().await, 1);
        assert_eq!(
            env.data_store
                .get_string("snap-hutao-deployment:version")
                .await
                .unwrap(),
            Some("1.2.0.0".to_string())
        );
    }
}
