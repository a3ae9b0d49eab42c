use crate::modules::storage::data_store::DataStoreBackend;
use redis::{AsyncCommands, Client};
use tracing::debug;

#[derive(Clone)]
pub struct RedisDataStore {
    client: Client,
    prefix: Option<String>,
}

impl RedisDataStore {
    pub fn new(client: Client, prefix: Option<String>) -> Self {
        Self { client, prefix }
    }

    /// 生成带前缀的Redis键
    /// 格式: prefix:key 或者 key (如果没有设置前缀)
    fn redis_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .unwrap_or(key),
            None => key,
        }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, String> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait::async_trait]
impl DataStoreBackend for RedisDataStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, String> {
        let mut conn = self.conn().await?;
        conn.get(self.redis_key(key))
            .await
            .map_err(|e| e.to_string())
    }

    async fn set_string(&self, key: &str, value: &str, expires: Option<u32>) -> Result<(), String> {
        let mut conn = self.conn().await?;
        let redis_key = self.redis_key(key);
        match expires {
            Some(secs) => conn
                .set_ex(&redis_key, value, secs as u64)
                .await
                .map_err(|e| e.to_string()),
            None => conn.set(&redis_key, value).await.map_err(|e| e.to_string()),
        }
    }

    async fn set_string_if_absent(&self, key: &str, value: &str) -> Result<bool, String> {
        let mut conn = self.conn().await?;
        conn.set_nx(self.redis_key(key), value)
            .await
            .map_err(|e| e.to_string())
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn
            .del(self.redis_key(key))
            .await
            .map_err(|e| e.to_string())?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, String> {
        let mut conn = self.conn().await?;
        conn.exists(self.redis_key(key))
            .await
            .map_err(|e| e.to_string())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, String> {
        let mut conn = self.conn().await?;
        let added: u64 = conn
            .sadd(self.redis_key(key), member)
            .await
            .map_err(|e| e.to_string())?;
        Ok(added > 0)
    }

    async fn set_card(&self, key: &str) -> Result<u64, String> {
        let mut conn = self.conn().await?;
        conn.scard(self.redis_key(key))
            .await
            .map_err(|e| e.to_string())
    }

    async fn set_drain_count(&self, key: &str) -> Result<u64, String> {
        let mut conn = self.conn().await?;
        let redis_key = self.redis_key(key);

        // 读取数量与删除放在同一事务中，避免统计期间新写入的设备丢失
        let (count, _removed): (u64, u64) = redis::pipe()
            .atomic()
            .scard(&redis_key)
            .del(&redis_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| e.to_string())?;
        Ok(count)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, String> {
        let mut conn = self.conn().await?;
        conn.incr(self.redis_key(key), delta)
            .await
            .map_err(|e| e.to_string())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let mut conn = self.conn().await?;
        let scan_pattern = format!("{}*", self.redis_key(prefix));
        let mut cursor = 0u64;
        let mut result = Vec::new();

        loop {
            // 使用 SCAN 命令扫描匹配的键，每次返回最多100个键
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&scan_pattern)
                .arg("COUNT")
                .arg(100u64)
                .query_async(&mut conn)
                .await
                .map_err(|e| e.to_string())?;

            result.extend(keys.iter().map(|k| self.strip_prefix(k).to_string()));

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        result.sort();
        result.dedup();
        debug!("Scanned {} keys with pattern {}", result.len(), scan_pattern);
        Ok(result)
    }

    async fn ping(&self) -> Result<(), String> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix: Option<&str>) -> RedisDataStore {
        let client = Client::open("redis://127.0.0.1/").unwrap();
        RedisDataStore::new(client, prefix.map(str::to_string))
    }

    #[test]
    fn test_redis_key_prefix() {
        assert_eq!(store(None).redis_key("snap-hutao:patch"), "snap-hutao:patch");
        assert_eq!(
            store(Some("hutao")).redis_key("snap-hutao:patch"),
            "hutao:snap-hutao:patch"
        );
    }

    #[test]
    fn test_strip_prefix() {
        let s = store(Some("hutao"));
        assert_eq!(s.strip_prefix("hutao:stats:version:1.0"), "stats:version:1.0");
        assert_eq!(s.strip_prefix("other:key"), "other:key");
        assert_eq!(store(None).strip_prefix("a:b"), "a:b");
    }
}
