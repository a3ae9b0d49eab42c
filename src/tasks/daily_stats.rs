use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::{Asia::Shanghai, Tz};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::ApiResult;
use crate::modules::stats::{StatsService, shanghai_yesterday};

/// 距下一个上海时间零点的时长
pub fn duration_until_next_midnight(now: DateTime<Tz>) -> Duration {
    let next_midnight = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Shanghai.from_local_datetime(&naive).single());

    match next_midnight {
        Some(midnight) => (midnight - now)
            .to_std()
            .unwrap_or(Duration::from_secs(24 * 3600)),
        None => Duration::from_secs(24 * 3600),
    }
}

/// 每日零点（上海时间）归档活跃设备与版本统计
pub struct DailyStatsTask {
    stats: StatsService,
}

impl DailyStatsTask {
    pub fn new(stats: StatsService) -> Self {
        Self { stats }
    }

    pub async fn start_background_task(self: Arc<Self>) {
        info!("Starting daily stats task");

        tokio::spawn(async move {
            loop {
                let wait = duration_until_next_midnight(Utc::now().with_timezone(&Shanghai));
                info!("Next daily stats dump in {}s", wait.as_secs());
                // 多等一秒，确保已跨过零点
                tokio::time::sleep(wait + Duration::from_secs(1)).await;

                if let Err(e) = self.run_once().await {
                    error!("Daily stats dump failed: {}", e);
                }
            }
        });
    }

    /// 归档昨天的数据
    pub async fn run_once(&self) -> ApiResult<()> {
        let date = shanghai_yesterday();
        self.stats.dump_daily_active_users(date).await?;
        self.stats.dump_daily_version_stats(date).await?;
        info!("Daily stats of {} dumped", date);
        Ok(())
    }
}
