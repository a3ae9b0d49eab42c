use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::SharedConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{StrategyLinks, StrategyMap};
use crate::modules::external::strategy_sources::{
    StrategyEntry, fetch_hoyolab_avatars, fetch_miyoushe_avatars,
};
use crate::modules::external::uigf::{UigfDictionary, lookup_avatar_id};
use crate::modules::storage::{DataStore, get_json, set_json};

pub const AVATAR_STRATEGY_KEY: &str = "avatar_strategy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChannel {
    Miyoushe,
    Hoyolab,
    All,
}

impl FromStr for StrategyChannel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "miyoushe" => Ok(Self::Miyoushe),
            "hoyolab" => Ok(Self::Hoyolab),
            "all" => Ok(Self::All),
            _ => Err(ApiError::invalid_input("channel", "Invalid channel")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRefresh {
    /// 每个来源更新的条目数
    pub updated: BTreeMap<&'static str, usize>,
    pub cache: StrategyMap,
}

#[derive(Clone)]
pub struct StrategyService {
    store: DataStore,
    config: SharedConfig,
    dictionary: UigfDictionary,
}

impl StrategyService {
    pub fn new(store: DataStore, config: SharedConfig) -> Self {
        let dictionary = UigfDictionary::new(store.clone(), config.clone());
        Self {
            store,
            config,
            dictionary,
        }
    }

    async fn cached(&self) -> ApiResult<Option<StrategyMap>> {
        get_json(self.store.as_ref(), AVATAR_STRATEGY_KEY)
            .await
            .map_err(|e| ApiError::store_error("get_avatar_strategy", e))
    }

    /// 把攻略条目按角色名映射到角色 ID 后合并，返回成功映射的数量
    fn merge<F>(
        map: &mut StrategyMap,
        dict: &serde_json::Value,
        lang: &str,
        entries: Vec<StrategyEntry>,
        mut apply: F,
    ) -> usize
    where
        F: FnMut(&mut crate::models::AvatarStrategy, i64),
    {
        let mut count = 0;
        for entry in entries {
            match lookup_avatar_id(dict, lang, &entry.name) {
                Some(avatar_id) => {
                    apply(map.entry(avatar_id.to_string()).or_default(), entry.id);
                    count += 1;
                }
                None => debug!("Failed to get avatar id for {}", entry.name),
            }
        }
        count
    }

    pub async fn refresh(&self, channel: StrategyChannel) -> ApiResult<StrategyRefresh> {
        let config = self.config.load_full();
        let dict = self.dictionary.load().await?;
        let lang = config.strategy.uigf_lang.as_str();

        let mut map = self.cached().await?.unwrap_or_default();
        let mut updated = BTreeMap::new();

        if matches!(channel, StrategyChannel::Miyoushe | StrategyChannel::All) {
            let entries = fetch_miyoushe_avatars(&config.strategy).await?;
            let count = Self::merge(&mut map, &dict, lang, entries, |s, id| {
                s.mys_strategy_id = Some(id)
            });
            updated.insert("mys", count);
        }
        if matches!(channel, StrategyChannel::Hoyolab | StrategyChannel::All) {
            let entries = fetch_hoyolab_avatars(&config.strategy).await?;
            let count = Self::merge(&mut map, &dict, lang, entries, |s, id| {
                s.hoyolab_strategy_id = Some(id)
            });
            updated.insert("hoyolab", count);
        }

        set_json(self.store.as_ref(), AVATAR_STRATEGY_KEY, &map, None)
            .await
            .map_err(|e| ApiError::store_error("set_avatar_strategy", e))?;
        info!("Avatar strategy refreshed: {:?}", updated);
        Ok(StrategyRefresh {
            updated,
            cache: map,
        })
    }

    pub async fn item(&self, item_id: i64) -> ApiResult<StrategyLinks> {
        let map = match self.cached().await? {
            Some(map) => map,
            None => self.refresh(StrategyChannel::All).await?.cache,
        };

        let config = self.config.load();
        let entry = map.get(&item_id.to_string());
        Ok(StrategyLinks {
            miyoushe_url: entry.and_then(|s| s.mys_strategy_id).map(|id| {
                config
                    .strategy
                    .miyoushe_url_template
                    .replace("{mys_strategy_id}", &id.to_string())
            }),
            hoyolab_url: entry.and_then(|s| s.hoyolab_strategy_id).map(|id| {
                config
                    .strategy
                    .hoyolab_url_template
                    .replace("{hoyolab_strategy_id}", &id.to_string())
            }),
        })
    }
}
