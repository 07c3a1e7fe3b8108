//! 请求限流器 - 业务能力层
//!
//! 按「服务 + 分钟桶」记录请求数，阻止编排层超过每分钟配额。
//! 窗口条目在写入后 120 秒过期，比分钟桶多留一分钟余量，
//! 以容忍检查与记录之间的时钟偏差。
//!
//! 并发约束：同一个桶的计数必须在一个临界区内完成「检查 + 递增」，
//! 否则两个并发任务可能同时通过检查而联合超限。`reserve` 是编排层
//! 使用的原子入口；`check_limit` / `record_request` 保留为无副作用
//! 检查与显式记录，供观测场景使用。

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::{AppResult, GenerationError};
use crate::models::ProviderKind;

/// 窗口条目保活时长（秒）
const WINDOW_TTL_SECS: i64 = 120;

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    expires_at: i64,
}

/// 某个服务的当前限流状态
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub provider: ProviderKind,
    pub current: u32,
    pub limit: u32,
    pub remaining: u32,
    /// 当前分钟桶的滚动时间
    pub reset_at: DateTime<Utc>,
}

/// 按服务限流的请求配额门
pub struct RateLimiter {
    limits: HashMap<ProviderKind, u32>,
    windows: Mutex<HashMap<(ProviderKind, i64), WindowEntry>>,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        Self::with_limits(config.openai_rpm, config.google_rpm)
    }

    pub fn with_limits(openai_rpm: u32, google_rpm: u32) -> Self {
        let mut limits = HashMap::new();
        limits.insert(ProviderKind::OpenAi, openai_rpm);
        limits.insert(ProviderKind::Gemini, google_rpm);
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// 原子地占用一个配额：当前桶未满则递增并返回 Ok，否则返回
    /// `RateLimitExceeded`（不递增）
    pub fn reserve(&self, provider: ProviderKind) -> AppResult<()> {
        self.reserve_at(provider, Utc::now().timestamp())
    }

    /// 无副作用地检查当前桶是否已满
    pub fn check_limit(&self, provider: ProviderKind) -> AppResult<()> {
        self.check_limit_at(provider, Utc::now().timestamp())
    }

    /// 记录一次已发出的请求
    pub fn record_request(&self, provider: ProviderKind) {
        self.record_request_at(provider, Utc::now().timestamp());
    }

    /// 查询当前限流状态（观测用，不在关键路径上）
    pub fn status(&self, provider: ProviderKind) -> RateLimitStatus {
        self.status_at(provider, Utc::now().timestamp())
    }

    fn limit_for(&self, provider: ProviderKind) -> u32 {
        self.limits.get(&provider).copied().unwrap_or(u32::MAX)
    }

    fn reserve_at(&self, provider: ProviderKind, now: i64) -> AppResult<()> {
        let limit = self.limit_for(provider);
        let mut windows = self.windows.lock().expect("限流窗口锁中毒");
        windows.retain(|_, entry| entry.expires_at > now);

        let entry = windows
            .entry((provider, bucket_of(now)))
            .or_insert(WindowEntry {
                count: 0,
                expires_at: now + WINDOW_TTL_SECS,
            });

        if entry.count >= limit {
            return Err(rate_limit_error(provider, now));
        }
        entry.count += 1;
        entry.expires_at = now + WINDOW_TTL_SECS;
        Ok(())
    }

    fn check_limit_at(&self, provider: ProviderKind, now: i64) -> AppResult<()> {
        let current = self.current_count(provider, now);
        if current >= self.limit_for(provider) {
            return Err(rate_limit_error(provider, now));
        }
        Ok(())
    }

    fn record_request_at(&self, provider: ProviderKind, now: i64) {
        let mut windows = self.windows.lock().expect("限流窗口锁中毒");
        let entry = windows
            .entry((provider, bucket_of(now)))
            .or_insert(WindowEntry {
                count: 0,
                expires_at: now + WINDOW_TTL_SECS,
            });
        entry.count += 1;
        entry.expires_at = now + WINDOW_TTL_SECS;
    }

    fn status_at(&self, provider: ProviderKind, now: i64) -> RateLimitStatus {
        let current = self.current_count(provider, now);
        let limit = self.limit_for(provider);
        RateLimitStatus {
            provider,
            current,
            limit,
            remaining: limit.saturating_sub(current),
            reset_at: DateTime::<Utc>::from_timestamp((bucket_of(now) + 1) * 60, 0)
                .unwrap_or_default(),
        }
    }

    fn current_count(&self, provider: ProviderKind, now: i64) -> u32 {
        let windows = self.windows.lock().expect("限流窗口锁中毒");
        windows
            .get(&(provider, bucket_of(now)))
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

fn bucket_of(now: i64) -> i64 {
    now / 60
}

fn rate_limit_error(provider: ProviderKind, now: i64) -> GenerationError {
    GenerationError::RateLimitExceeded {
        provider,
        retry_after_secs: (60 - now.rem_euclid(60)) as u64,
    }
}
