//! 应用程序错误类型
//!
//! 错误分类：
//! - `Validation` - 调用方参数非法，在创建任务之前拒绝
//! - `UnknownScenario` - 场景名不在支持范围内，任务创建后立即失败
//! - `RateLimitExceeded` - 当前分钟配额用尽，携带建议等待秒数
//! - `Provider` / `ProviderUnavailable` - 外部生成服务错误 / 未配置凭证
//! - `Cache` - 缓存后端不可用（内部降级为未命中，不会导致任务失败）

use thiserror::Error;

use crate::models::ProviderKind;

/// 生成流程错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 参数校验失败
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 未知场景名
    #[error("未知场景: {scenario}")]
    UnknownScenario { scenario: String },

    /// 请求频率超限
    #[error("{provider} 请求频率超限，请在 {retry_after_secs} 秒后重试")]
    RateLimitExceeded {
        provider: ProviderKind,
        retry_after_secs: u64,
    },

    /// 生成服务返回非成功响应
    ///
    /// `status` 为 HTTP 状态码，SDK 内部错误等拿不到状态码时为 None
    #[error("{provider} API 错误: {message}")]
    Provider {
        provider: ProviderKind,
        status: Option<u16>,
        message: String,
    },

    /// 未配置该服务的 API Key
    #[error("{provider} API Key 未配置")]
    ProviderUnavailable { provider: ProviderKind },

    /// 缓存后端错误（调用方应降级为缓存未命中）
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 任务存储错误
    #[error("任务存储错误: {0}")]
    Store(String),
}

impl GenerationError {
    /// 队列重试是否有意义
    ///
    /// 场景名错误和参数错误重试必然再次失败；凭证缺失同理。
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Validation(_)
            | GenerationError::UnknownScenario { .. }
            | GenerationError::ProviderUnavailable { .. } => false,
            GenerationError::RateLimitExceeded { .. }
            | GenerationError::Provider { .. }
            | GenerationError::Cache(_)
            | GenerationError::Store(_) => true,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, GenerationError>;
