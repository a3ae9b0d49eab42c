use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::Wallpaper;
use crate::modules::storage::{DataStore, get_json, set_json};

pub const WALLPAPERS_KEY: &str = "wallpapers:all";
const TODAY_PREFIX: &str = "wallpaper:today:";
const TODAY_TTL: u32 = 2 * 24 * 3600;

fn today() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive()
}

/// 今日壁纸选择
pub fn pick_wallpaper(wallpapers: &[Wallpaper], today: NaiveDate) -> Option<usize> {
    let enabled: Vec<usize> = (0..wallpapers.len())
        .filter(|&i| !wallpapers[i].disabled)
        .collect();
    let fresh: Vec<usize> = enabled
        .iter()
        .copied()
        .filter(|&i| wallpapers[i].is_fresh(today))
        .collect();

    let pool = if fresh.is_empty() { &enabled } else { &fresh };
    pool.choose(&mut rand::rng()).copied()
}

#[derive(Clone)]
pub struct WallpaperService {
    store: DataStore,
    // 串行化列表的读改写
    write_lock: Arc<Mutex<()>>,
}

impl WallpaperService {
    pub fn new(store: DataStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn all(&self) -> ApiResult<Vec<Wallpaper>> {
        get_json(self.store.as_ref(), WALLPAPERS_KEY)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| ApiError::store_error("get_wallpapers", e))
    }

    async fn save(&self, wallpapers: &[Wallpaper]) -> ApiResult<()> {
        set_json(self.store.as_ref(), WALLPAPERS_KEY, wallpapers, None)
            .await
            .map_err(|e| ApiError::store_error("set_wallpapers", e))
    }

    /// 新增壁纸，URL 已存在时覆盖原记录
    pub async fn add(&self, mut wallpaper: Wallpaper) -> ApiResult<Wallpaper> {
        if wallpaper.url.is_empty() {
            return Err(ApiError::invalid_input("url", "wallpaper url is required"));
        }
        wallpaper.display_date = None;
        wallpaper.last_display_date = None;
        wallpaper.disabled = false;

        let _guard = self.write_lock.lock().await;
        let mut wallpapers = self.all().await?;
        match wallpapers.iter_mut().find(|w| w.url == wallpaper.url) {
            Some(existing) => *existing = wallpaper.clone(),
            None => wallpapers.push(wallpaper.clone()),
        }
        self.save(&wallpapers).await?;
        info!("Wallpaper added: {}", wallpaper.url);
        Ok(wallpaper)
    }

    /// 启用或禁用，返回是否找到该壁纸
    pub async fn set_disabled(&self, url: &str, disabled: bool) -> ApiResult<bool> {
        if url.is_empty() {
            return Ok(false);
        }
        let _guard = self.write_lock.lock().await;
        let mut wallpapers = self.all().await?;
        let Some(target) = wallpapers.iter_mut().find(|w| w.url == url) else {
            return Ok(false);
        };
        target.disabled = disabled;
        self.save(&wallpapers).await?;
        info!("Wallpaper {} disabled={}", url, disabled);
        Ok(true)
    }

    pub async fn reset(&self) -> ApiResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut wallpapers = self.all().await?;
        for wallpaper in wallpapers.iter_mut() {
            wallpaper.last_display_date = None;
        }
        self.save(&wallpapers).await?;
        Ok(true)
    }

    /// 今日壁纸，`force` 时重新抽取
    pub async fn today(&self, force: bool) -> ApiResult<Wallpaper> {
        let date = today();
        let today_key = format!("{TODAY_PREFIX}{date}");

        if !force {
            let cached: Option<Wallpaper> = get_json(self.store.as_ref(), &today_key)
                .await
                .map_err(|e| ApiError::store_error("get_today_wallpaper", e))?;
            if let Some(wallpaper) = cached {
                return Ok(wallpaper);
            }
        }

        let _guard = self.write_lock.lock().await;
        let mut wallpapers = self.all().await?;
        let index = pick_wallpaper(&wallpapers, date)
            .ok_or_else(|| ApiError::not_found("enabled wallpaper"))?;

        let picked = &mut wallpapers[index];
        picked.display_date = Some(date);
        picked.last_display_date = Some(date);
        let picked = picked.clone();
        self.save(&wallpapers).await?;

        set_json(self.store.as_ref(), &today_key, &picked, Some(TODAY_TTL))
            .await
            .map_err(|e| ApiError::store_error("set_today_wallpaper", e))?;
        info!("Random pick wallpaper: {}", picked.url);
        Ok(picked)
    }
}
