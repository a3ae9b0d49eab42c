use serde_json::Value;
use tracing::info;

use crate::config::SharedConfig;
use crate::container::REQWEST_CLIENT;
use crate::error::{ApiError, ApiResult};
use crate::modules::storage::DataStore;

pub const UIGF_DICT_KEY: &str = "uigf:dict:all";

/// 在 UIGF 字典中查找角色 ID
pub fn lookup_avatar_id(dict: &Value, lang: &str, name: &str) -> Option<i64> {
    dict.get(lang)?.get(name)?.as_i64()
}

/// UIGF 名称 -> ID 字典，缓存在存储中
#[derive(Clone)]
pub struct UigfDictionary {
    store: DataStore,
    config: SharedConfig,
}

impl UigfDictionary {
    pub fn new(store: DataStore, config: SharedConfig) -> Self {
        Self { store, config }
    }

    pub async fn refresh(&self) -> ApiResult<Value> {
        let (url, ttl) = {
            let config = self.config.load();
            (
                config.strategy.uigf_dict_url.clone(),
                config.strategy.uigf_dict_ttl,
            )
        };

        let response = REQWEST_CLIENT.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::upstream(
                "uigf",
                format!("Failed to refresh UIGF dict, status code: {}", response.status()),
            ));
        }
        let text = response.text().await?;
        let dict: Value = serde_json::from_str(&text)?;

        self.store
            .set_string(UIGF_DICT_KEY, &text, Some(ttl))
            .await
            .map_err(|e| ApiError::store_error("set_uigf_dict", e))?;
        info!("UIGF dictionary refreshed");
        Ok(dict)
    }

    /// 优先读取缓存，缺失时从 UIGF 拉取
    pub async fn load(&self) -> ApiResult<Value> {
        let cached = self
            .store
            .get_string(UIGF_DICT_KEY)
            .await
            .map_err(|e| ApiError::store_error("get_uigf_dict", e))?;
        match cached {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => self.refresh().await,
        }
    }
}
