//! 分析结果缓存 - 业务能力层
//!
//! 只缓存分析阶段：后续阶段依赖完整的分析文本，键难以稳定，
//! 重新生成比可靠命中更便宜。缓存是尽力而为的：后端故障降级为
//! 未命中，绝不导致任务失败。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppResult;

/// 缓存的分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub analysis: String,
    pub tokens_used: u64,
}

/// 缓存后端接口
///
/// 实际部署由外部存储承担，这里只约定契约；进程内实现见
/// [`MemoryCache`]。
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<CachedAnalysis>>;

    async fn put(&self, key: &str, value: CachedAnalysis, ttl_secs: i64) -> AppResult<()>;
}

/// 计算分析阶段的缓存指纹
///
/// 对规范化（去首尾空白 + 小写）后的 `(query, country, language)`
/// 三元组取 SHA-256，相同语义输入产生相同键。
pub fn analysis_fingerprint(query: &str, country: &str, language: &str) -> String {
    let normalized = format!(
        "{}|{}|{}",
        query.trim().to_lowercase(),
        country.trim().to_lowercase(),
        language.trim().to_lowercase()
    );
    format!("seo_analysis_{:x}", Sha256::digest(normalized.as_bytes()))
}

struct CacheEntry {
    value: CachedAnalysis,
    expires_at: i64,
}

/// 进程内 TTL 缓存
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_at(&self, key: &str, now: i64) -> Option<CachedAnalysis> {
        let mut entries = self.entries.lock().expect("缓存锁中毒");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put_at(&self, key: &str, value: CachedAnalysis, ttl_secs: i64, now: i64) {
        let mut entries = self.entries.lock().expect("缓存锁中毒");
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl_secs,
            },
        );
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<CachedAnalysis>> {
        Ok(self.get_at(key, Utc::now().timestamp()))
    }

    async fn put(&self, key: &str, value: CachedAnalysis, ttl_secs: i64) -> AppResult<()> {
        self.put_at(key, value, ttl_secs, Utc::now().timestamp());
        Ok(())
    }
}
