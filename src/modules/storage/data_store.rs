use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

const MAX_FILE_STEM: usize = 200;
const HASHED_NAME_PREFIX: usize = 160;

// 数据存储后端抽象
#[async_trait::async_trait]
pub trait DataStoreBackend: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, String>;
    async fn set_string(&self, key: &str, value: &str, expires: Option<u32>) -> Result<(), String>;
    /// 仅在键不存在时写入，返回是否写入成功
    async fn set_string_if_absent(&self, key: &str, value: &str) -> Result<bool, String>;
    /// 返回键是否存在并被删除
    async fn delete(&self, key: &str) -> Result<bool, String>;
    async fn exists(&self, key: &str) -> Result<bool, String>;

    // 集合
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, String>;
    async fn set_card(&self, key: &str) -> Result<u64, String>;
    /// 原子地读取集合大小并删除集合
    async fn set_drain_count(&self, key: &str) -> Result<u64, String>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, String>;
    /// 按前缀列出键（不含存储层前缀）
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, String>;
    async fn ping(&self) -> Result<(), String>;
}

/// 数据存储类型
pub type DataStore = Arc<dyn DataStoreBackend>;

/// 读取 JSON 值
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn DataStoreBackend,
    key: &str,
) -> Result<Option<T>, String> {
    match store.get_string(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| format!("JSON parse error for {key}: {e}")),
        None => Ok(None),
    }
}

/// 写入 JSON 值
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn DataStoreBackend,
    key: &str,
    value: &T,
    expires: Option<u32>,
) -> Result<(), String> {
    let raw = serde_json::to_string(value).map_err(|e| format!("Serialization error: {e}"))?;
    store.set_string(key, &raw, expires).await
}

// 文件数据存储实现 - 每个key对应一个文件
pub struct FileDataStore {
    base_path: PathBuf,
    // 读改写操作串行化
    write_lock: Mutex<()>,
}

// 存储过期时间的包装结构
#[derive(Serialize, Deserialize)]
struct StoredValue<T> {
    key: String,
    data: T,
    expires_at: Option<u64>, // Unix timestamp
}

impl<T> StoredValue<T> {
    fn new(key: &str, data: T, expires: Option<u32>) -> Self {
        let expires_at = expires.map(|secs| chrono::Utc::now().timestamp() as u64 + secs as u64);
        Self {
            key: key.to_string(),
            data,
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            chrono::Utc::now().timestamp() as u64 > expires_at
        } else {
            false
        }
    }

    fn into_data(self) -> Option<T> {
        if self.is_expired() {
            None
        } else {
            Some(self.data)
        }
    }
}

impl FileDataStore {
    pub async fn new() -> Result<Self, String> {
        let base_path: PathBuf = std::env::var("DATA_STORE_PATH")
            .unwrap_or_else(|_| "./data_store".to_string())
            .into();
        Self::with_path(base_path).await
    }

    pub async fn with_path<P: AsRef<Path>>(base_path: P) -> Result<Self, String> {
        let base_path = base_path.as_ref().to_path_buf();

        // 确保存储目录存在
        if let Err(e) = fs::create_dir_all(&base_path).await {
            return Err(format!("Failed to create data store directory: {e}"));
        }

        info!("File data store initialized at {:?}", base_path);
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// 将key转换为安全的文件名
    ///
    /// `_` 本身也转义，映射保持一一对应；过长的键保留前缀并追加完整键的哈希
    fn sanitize_filename(input: &str) -> String {
        let mut result = String::new();
        let mut prefix_end = None;
        for c in input.chars() {
            let replacement = match c {
                '_' => "_US_".to_string(),
                ':' => "_COLON_".to_string(),
                '?' => "_QUEST_".to_string(),
                '*' => "_STAR_".to_string(),
                '<' => "_LT_".to_string(),
                '>' => "_GT_".to_string(),
                '"' => "_QUOTE_".to_string(),
                '|' => "_PIPE_".to_string(),
                '\\' => "_BSLASH_".to_string(),
                '/' => "_SLASH_".to_string(),
                ' ' => "_SPACE_".to_string(),
                c if c.is_control() => format!("_U{:04X}_", c as u32),
                c => c.to_string(),
            };
            if prefix_end.is_none() && result.len() + replacement.len() > HASHED_NAME_PREFIX {
                prefix_end = Some(result.len());
            }
            result.push_str(&replacement);
        }

        if result.len() <= MAX_FILE_STEM {
            return result;
        }
        result.truncate(prefix_end.unwrap_or(result.len()));
        result.push_str(&format!("_H{:016x}_", xxh3_64(input.as_bytes())));
        result
    }

    fn key_to_file_path(&self, key: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.json", Self::sanitize_filename(key)))
    }

    async fn write_value<T: Serialize>(&self, value: &StoredValue<T>) -> Result<(), String> {
        let file_path = self.key_to_file_path(&value.key);
        let json =
            serde_json::to_string_pretty(value).map_err(|e| format!("Serialization error: {e}"))?;

        // 使用临时文件确保原子写入
        let temp_path = file_path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .await
            .map_err(|e| format!("Failed to write temp file: {e}"))?;

        fs::rename(temp_path, file_path)
            .await
            .map_err(|e| format!("Failed to rename file: {e}"))
    }

    async fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, String> {
        let file_path = self.key_to_file_path(key);
        debug!("Reading JSON file from: {:?}", file_path);

        match fs::read_to_string(&file_path).await {
            Ok(content) => {
                let stored: StoredValue<T> = serde_json::from_str(&content).map_err(|e| {
                    format!("JSON parse error in {}: {}", file_path.display(), e)
                })?;
                Ok(stored.into_data())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(format!("Failed to read {}: {}", file_path.display(), e)),
        }
    }

    async fn remove_file(&self, key: &str) -> Result<bool, String> {
        match fs::remove_file(self.key_to_file_path(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(format!("Failed to delete {key}: {e}")),
        }
    }
}

#[async_trait::async_trait]
impl DataStoreBackend for FileDataStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, String> {
        // 计数器以数字保存，与 Redis GET 行为保持一致
        match self.read_value::<serde_json::Value>(key).await? {
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(format!("Key {key} does not hold a string value")),
            None => Ok(None),
        }
    }

    async fn set_string(&self, key: &str, value: &str, expires: Option<u32>) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;
        self.write_value(&StoredValue::new(key, value.to_string(), expires))
            .await
    }

    async fn set_string_if_absent(&self, key: &str, value: &str) -> Result<bool, String> {
        let _guard = self.write_lock.lock().await;
        if self.read_value::<serde_json::Value>(key).await?.is_some() {
            return Ok(false);
        }
        self.write_value(&StoredValue::new(key, value.to_string(), None))
            .await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let _guard = self.write_lock.lock().await;
        self.remove_file(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, String> {
        Ok(self.read_value::<serde_json::Value>(key).await?.is_some())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, String> {
        let _guard = self.write_lock.lock().await;
        let mut members: BTreeSet<String> = self.read_value(key).await?.unwrap_or_default();
        let inserted = members.insert(member.to_string());
        if inserted {
            self.write_value(&StoredValue::new(key, members, None))
                .await?;
        }
        Ok(inserted)
    }

    async fn set_card(&self, key: &str) -> Result<u64, String> {
        let members: BTreeSet<String> = self.read_value(key).await?.unwrap_or_default();
        Ok(members.len() as u64)
    }

    async fn set_drain_count(&self, key: &str) -> Result<u64, String> {
        let _guard = self.write_lock.lock().await;
        let members: BTreeSet<String> = self.read_value(key).await?.unwrap_or_default();
        self.remove_file(key).await?;
        Ok(members.len() as u64)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, String> {
        let _guard = self.write_lock.lock().await;
        let current: i64 = self.read_value(key).await?.unwrap_or(0);
        let next = current + delta;
        self.write_value(&StoredValue::new(key, next, None)).await?;
        Ok(next)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let mut keys = Vec::new();
        let mut dir_reader = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| format!("Failed to read data store directory: {e}"))?;

        while let Ok(Some(entry)) = dir_reader.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path).await else {
                continue;
            };
            if let Ok(stored) = serde_json::from_str::<StoredValue<serde_json::Value>>(&content) {
                if !stored.is_expired() && stored.key.starts_with(prefix) {
                    keys.push(stored.key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), String> {
        fs::metadata(&self.base_path)
            .await
            .map(|_| ())
            .map_err(|e| format!("Data store directory unavailable: {e}"))
    }
}

/// 创建数据存储实例
pub async fn create_data_store() -> Result<DataStore, String> {
    use std::env;

    let store_type = env::var("DATA_STORE_TYPE").unwrap_or_else(|_| "file".to_string());

    match store_type.as_str() {
        "redis" => {
            let redis_url =
                env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
            let client = redis::Client::open(redis_url)
                .map_err(|e| format!("Failed to create Redis client: {e}"))?;
            let prefix = env::var("REDIS_PREFIX").ok().filter(|p| !p.is_empty());
            let redis_store =
                crate::modules::storage::redis_data_store::RedisDataStore::new(client, prefix);
            info!("Using Redis data store");
            Ok(Arc::new(redis_store))
        }
        _ => {
            let file_store = FileDataStore::new().await?;
            Ok(Arc::new(file_store))
        }
    }
}
