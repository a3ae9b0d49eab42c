use axum::http::{HeaderMap, header::USER_AGENT};
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::models::{DailyActiveUserStats, DailyVersionStats};
use crate::modules::storage::{DataStore, get_json, set_json};

pub const ACTIVE_USERS_CN: &str = "active_users_cn";
pub const ACTIVE_USERS_GLOBAL: &str = "active_users_global";
pub const ACTIVE_USERS_UNKNOWN: &str = "active_users_unknown";

/// 区域标签 -> 设备集合
pub const ACTIVE_USER_SETS: [(&str, &str); 3] = [
    ("cn", ACTIVE_USERS_CN),
    ("global", ACTIVE_USERS_GLOBAL),
    ("unknown", ACTIVE_USERS_UNKNOWN),
];

pub const VERSION_SET_PREFIX: &str = "stats:version:";
pub const ACTIVE_USER_HISTORY_KEY: &str = "stats:history:active_users";
pub const VERSION_HISTORY_KEY: &str = "stats:history:versions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailCounter {
    Requested,
    Sent,
    Failed,
}

impl EmailCounter {
    pub fn key(&self) -> &'static str {
        match self {
            EmailCounter::Requested => "stats:email:requested",
            EmailCounter::Sent => "stats:email:sent",
            EmailCounter::Failed => "stats:email:failed",
        }
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct LiveCounters {
    pub active_users_cn: u64,
    pub active_users_global: u64,
    pub active_users_unknown: u64,
    pub email_requested: i64,
    pub email_sent: i64,
    pub email_failed: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsSnapshot {
    pub active_users: Vec<DailyActiveUserStats>,
    pub versions: Vec<DailyVersionStats>,
    pub live: LiveCounters,
}

/// 上海时区的昨天，每日统计在零点后归档到这一天
pub fn shanghai_yesterday() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive() - Duration::days(1)
}

/// `X-Region` 头对应的设备集合
pub fn active_set_for_region(region: Option<&str>) -> &'static str {
    match region.map(|r| r.to_ascii_lowercase()).as_deref() {
        Some("cn") => ACTIVE_USERS_CN,
        Some("global") => ACTIVE_USERS_GLOBAL,
        _ => ACTIVE_USERS_UNKNOWN,
    }
}

#[derive(Clone)]
pub struct StatsService {
    store: DataStore,
}

impl StatsService {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    /// 记录设备 ID，返回是否记录
    pub async fn record_device(
        &self,
        device_id: Option<&str>,
        region: Option<&str>,
        user_agent: Option<&str>,
    ) -> ApiResult<bool> {
        let Some(device_id) = device_id.filter(|d| !d.is_empty()) else {
            debug!("Device ID not found in headers, not recording device ID");
            return Ok(false);
        };

        let set_key = active_set_for_region(region);
        self.store
            .set_add(set_key, device_id)
            .await
            .map_err(|e| ApiError::store_error("record_device", e))?;

        if let Some(version) = user_agent.and_then(|ua| ua.strip_prefix("Snap Hutao/")) {
            self.store
                .set_add(&format!("{VERSION_SET_PREFIX}{version}"), device_id)
                .await
                .map_err(|e| ApiError::store_error("record_version", e))?;
        }
        Ok(true)
    }

    /// 从请求头记录设备，失败只记日志
    pub async fn record_from_headers(&self, headers: &HeaderMap) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
        if let Err(e) = self
            .record_device(header("x-device-id"), header("x-region"), user_agent)
            .await
        {
            warn!("Failed to record device: {}", e);
        }
    }

    pub async fn incr_email(&self, counter: EmailCounter) {
        if let Err(e) = self.store.incr_by(counter.key(), 1).await {
            warn!("Failed to increase {}: {}", counter.key(), e);
        }
    }

    async fn read_counter(&self, key: &str) -> ApiResult<i64> {
        let raw = self
            .store
            .get_string(key)
            .await
            .map_err(|e| ApiError::store_error("read_counter", e))?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn active_user_history(&self) -> ApiResult<Vec<DailyActiveUserStats>> {
        get_json(self.store.as_ref(), ACTIVE_USER_HISTORY_KEY)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| ApiError::store_error("read_active_user_history", e))
    }

    pub async fn version_history(&self) -> ApiResult<Vec<DailyVersionStats>> {
        get_json(self.store.as_ref(), VERSION_HISTORY_KEY)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| ApiError::store_error("read_version_history", e))
    }

    /// 归档并清空三个活跃设备集合
    pub async fn dump_daily_active_users(&self, date: NaiveDate) -> ApiResult<DailyActiveUserStats> {
        let drain = |key: &'static str| async move {
            self.store
                .set_drain_count(key)
                .await
                .map_err(|e| ApiError::store_error("drain_active_users", e))
        };

        let stats = DailyActiveUserStats {
            date,
            cn_user: drain(ACTIVE_USERS_CN).await?,
            global_user: drain(ACTIVE_USERS_GLOBAL).await?,
            unknown: drain(ACTIVE_USERS_UNKNOWN).await?,
        };

        let mut history = self.active_user_history().await?;
        history.retain(|h| h.date != date);
        history.push(stats.clone());
        set_json(self.store.as_ref(), ACTIVE_USER_HISTORY_KEY, &history, None)
            .await
            .map_err(|e| ApiError::store_error("write_active_user_history", e))?;

        info!("Daily active data of {}: {:?}", date, stats);
        Ok(stats)
    }

    /// 归档并清空每个版本的设备集合
    pub async fn dump_daily_version_stats(&self, date: NaiveDate) -> ApiResult<DailyVersionStats> {
        let keys = self
            .store
            .scan_keys(VERSION_SET_PREFIX)
            .await
            .map_err(|e| ApiError::store_error("scan_version_sets", e))?;

        let mut stats = DailyVersionStats {
            date,
            stats: Default::default(),
        };
        for key in keys {
            let count = self
                .store
                .set_drain_count(&key)
                .await
                .map_err(|e| ApiError::store_error("drain_version_set", e))?;
            let version = key.trim_start_matches(VERSION_SET_PREFIX).to_string();
            stats.stats.insert(version, count);
        }

        let mut history = self.version_history().await?;
        history.retain(|h| h.date != date);
        history.push(stats.clone());
        set_json(self.store.as_ref(), VERSION_HISTORY_KEY, &history, None)
            .await
            .map_err(|e| ApiError::store_error("write_version_history", e))?;

        info!("Daily version stats of {}: {:?}", date, stats.stats);
        Ok(stats)
    }

    pub async fn snapshot(&self) -> ApiResult<StatsSnapshot> {
        let card = |key: &'static str| async move {
            self.store
                .set_card(key)
                .await
                .map_err(|e| ApiError::store_error("read_active_users", e))
        };

        let live = LiveCounters {
            active_users_cn: card(ACTIVE_USERS_CN).await?,
            active_users_global: card(ACTIVE_USERS_GLOBAL).await?,
            active_users_unknown: card(ACTIVE_USERS_UNKNOWN).await?,
            email_requested: self.read_counter(EmailCounter::Requested.key()).await?,
            email_sent: self.read_counter(EmailCounter::Sent.key()).await?,
            email_failed: self.read_counter(EmailCounter::Failed.key()).await?,
        };

        Ok(StatsSnapshot {
            active_users: self.active_user_history().await?,
            versions: self.version_history().await?,
            live,
        })
    }
}
