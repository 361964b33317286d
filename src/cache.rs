//! Ticket 缓存
//!
//! 授权码不把 ticket 交给客户端，而是把加密后的 ticket 存在服务端缓存里，
//! 以随机键作为授权码返回。缓存条目在首次读取成功后立即删除，保证授权码只能使用一次。
//!
//! ## 示例
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use oidcrs::cache::{InMemoryTicketCache, TicketCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache = InMemoryTicketCache::new();
//! cache.set("key", b"payload".to_vec(), Utc::now() + Duration::minutes(5)).await.unwrap();
//!
//! assert_eq!(cache.take("key").await.unwrap(), Some(b"payload".to_vec()));
//! assert_eq!(cache.take("key").await.unwrap(), None);
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

// ============================================================================
// 存储接口
// ============================================================================

/// Ticket 缓存接口
///
/// 实现此 trait 以提供自定义的存储后端（如 Redis 等分布式缓存）。
/// 过期时间由缓存实现负责执行，引擎不会再次检查。
#[async_trait]
pub trait TicketCache: Send + Sync {
    /// 写入条目，在 `absolute_expiry` 之后失效
    async fn set(&self, key: &str, value: Vec<u8>, absolute_expiry: DateTime<Utc>) -> Result<()>;

    /// 读取条目
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 删除条目
    async fn remove(&self, key: &str) -> Result<()>;

    /// 读取并删除条目
    ///
    /// 默认实现先 `get` 再 `remove`；支持原子操作的后端应当覆盖此方法，
    /// 避免同一个授权码被并发兑换两次。
    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.remove(key).await?;
        }
        Ok(value)
    }
}

// ============================================================================
// 内存存储实现
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// 内存缓存实现
///
/// 适用于单实例部署或测试环境。
/// 多实例部署需要共享的分布式缓存。
#[derive(Clone)]
pub struct InMemoryTicketCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryTicketCache {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryTicketCache {
    /// 创建新的内存缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用指定时钟判断过期
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// 当前条目数量（包括已过期但尚未清理的）
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清理过期条目，返回清理的数量
    pub fn cleanup_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }
}

impl fmt::Debug for InMemoryTicketCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTicketCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TicketCache for InMemoryTicketCache {
    async fn set(&self, key: &str, value: Vec<u8>, absolute_expiry: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: absolute_expiry,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| lock_poisoned())?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        entries.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        Ok(entries
            .remove(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value))
    }
}

fn lock_poisoned() -> Error {
    Error::storage("lock poisoned")
}
