use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SharedConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::LanguageProgress;
use crate::modules::external::crowdin::fetch_translation_progress;
use crate::modules::storage::{DataStore, get_json, set_json};

pub const LOCALIZATION_CACHE_KEY: &str = "localization:crowdin:progress";

/// Crowdin 翻译进度（带缓存）
#[derive(Clone)]
pub struct LocalizationService {
    store: DataStore,
    config: SharedConfig,
}

impl LocalizationService {
    pub fn new(store: DataStore, config: SharedConfig) -> Self {
        Self { store, config }
    }

    pub async fn status(&self) -> ApiResult<BTreeMap<String, LanguageProgress>> {
        if let Some(cached) = get_json(self.store.as_ref(), LOCALIZATION_CACHE_KEY)
            .await
            .map_err(|e| ApiError::store_error("get_localization", e))?
        {
            debug!("Localization status served from cache");
            return Ok(cached);
        }

        let crowdin = self.config.load_full().crowdin.clone();
        let progress = fetch_translation_progress(&crowdin).await?;
        // 未配置 key 时结果为空，不缓存
        if !progress.is_empty() {
            set_json(
                self.store.as_ref(),
                LOCALIZATION_CACHE_KEY,
                &progress,
                Some(crowdin.cache_ttl),
            )
            .await
            .map_err(|e| ApiError::store_error("set_localization", e))?;
        }
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::tests::common::*;

    #[tokio::test]
    async fn test_status_without_key_is_empty() {
        let env = TestEnvironment::new();
        let service = LocalizationService::new(env.data_store.clone(), env.shared_config.clone());
        assert!(service.status().await.unwrap().is_empty());
        assert!(!env.data_store.exists(LOCALIZATION_CACHE_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let project = server
            .mock("GET", "/projects/565845")
            .with_status(200)
            .with_body(r#"{"data":{"targetLanguageIds":["ja"]}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/projects/565845/languages/ja/progress")
            .with_status(200)
            .with_body(r#"{"data":[{"data":{"words":{"total":100,"translated":80}}}]}"#)
            .create_async()
            .await;

        let mut config = AppConfig::default();
        config.crowdin.api_key = Some("key".to_string());
        config.crowdin.api_base = server.url();
        let env = TestEnvironment::with_config(config);
        let service = LocalizationService::new(env.data_store.clone(), env.shared_config.clone());

        let first = service.status().await.unwrap();
        assert_eq!(first["ja"].translated, 80);
        let second = service.status().await.unwrap();
        assert_eq!(second["ja"].total, 100);
        project.assert_async().await;
    }
}
