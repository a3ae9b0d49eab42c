use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::config::{AppConfig, SharedConfig};
use crate::container::{AppContainer, AppContext};
use crate::error::ApiResult;
use crate::modules::mailer::{Mailer, SharedMailer};
use crate::modules::storage::data_store::{DataStore, DataStoreBackend};

/// 统一的测试环境，包含所有必要的服务和Mock
pub struct TestEnvironment {
    pub data_store: DataStore,
    pub shared_config: SharedConfig,
    pub mailer: RecordingMailer,
    pub app_context: AppContext,
}

impl TestEnvironment {
    /// 创建标准测试环境
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// 使用自定义配置创建测试环境
    pub fn with_config(config: AppConfig) -> Self {
        let data_store: DataStore = Arc::new(MockDataStore::new());
        let mailer = RecordingMailer::default();
        let shared_mailer: SharedMailer = Arc::new(mailer.clone());

        let container = AppContainer::from_parts(config, data_store.clone(), shared_mailer).unwrap();
        let app_context = container.create_app_context();

        Self {
            data_store,
            shared_config: container.shared_config.clone(),
            mailer,
            app_context,
        }
    }
}

/// 记录所有发出的邮件
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    /// (subject, content, recipient)
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, subject: &str, content: &str, recipient: &str) -> ApiResult<()> {
        if self.fail {
            return Err(crate::error::ApiError::mail_error("connection refused"));
        }
        self.sent.lock().unwrap().push((
            subject.to_string(),
            content.to_string(),
            recipient.to_string(),
        ));
        Ok(())
    }
}

/// Mock数据存储实现
pub struct MockDataStore {
    strings: Arc<RwLock<HashMap<String, (String, Option<u64>)>>>, // (value, expires_at)
    sets: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
}

impl MockDataStore {
    pub fn new() -> Self {
        Self {
            strings: Arc::new(RwLock::new(HashMap::new())),
            sets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 获取当前时间戳
    fn current_timestamp() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    /// 检查值是否过期
    fn is_expired(expires_at: Option<u64>) -> bool {
        if let Some(expires) = expires_at {
            Self::current_timestamp() > expires
        } else {
            false
        }
    }
}

#[async_trait::async_trait]
impl DataStoreBackend for MockDataStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, String> {
        let strings = self.strings.read().await;
        Ok(strings
            .get(key)
            .filter(|(_, expires)| !Self::is_expired(*expires))
            .map(|(value, _)| value.clone()))
    }

    async fn set_string(&self, key: &str, value: &str, expires: Option<u32>) -> Result<(), String> {
        let expires_at = expires.map(|secs| Self::current_timestamp() + secs as u64);
        let mut strings = self.strings.write().await;
        strings.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn set_string_if_absent(&self, key: &str, value: &str) -> Result<bool, String> {
        let mut strings = self.strings.write().await;
        if let Some((_, expires)) = strings.get(key) {
            if !Self::is_expired(*expires) {
                return Ok(false);
            }
        }
        strings.insert(key.to_string(), (value.to_string(), None));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let removed_string = self.strings.write().await.remove(key).is_some();
        let removed_set = self.sets.write().await.remove(key).is_some();
        Ok(removed_string || removed_set)
    }

    async fn exists(&self, key: &str) -> Result<bool, String> {
        if self.get_string(key).await?.is_some() {
            return Ok(true);
        }
        Ok(self.sets.read().await.contains_key(key))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, String> {
        let mut sets = self.sets.write().await;
        Ok(sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_card(&self, key: &str) -> Result<u64, String> {
        let sets = self.sets.read().await;
        Ok(sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn set_drain_count(&self, key: &str) -> Result<u64, String> {
        let mut sets = self.sets.write().await;
        Ok(sets.remove(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, String> {
        let mut strings = self.strings.write().await;
        let current = match strings.get(key) {
            Some((value, expires)) if !Self::is_expired(*expires) => value
                .parse::<i64>()
                .map_err(|e| format!("value of {key} is not an integer: {e}"))?,
            _ => 0,
        };
        let next = current + delta;
        strings.insert(key.to_string(), (next.to_string(), None));
        Ok(next)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let mut keys: BTreeSet<String> = self
            .strings
            .read()
            .await
            .iter()
            .filter(|(k, (_, expires))| k.starts_with(prefix) && !Self::is_expired(*expires))
            .map(|(k, _)| k.clone())
            .collect();
        keys.extend(
            self.sets
                .read()
                .await
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned(),
        );
        Ok(keys.into_iter().collect())
    }

    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}
