use serde::Deserialize;

/// 程序配置
///
/// 三种来源，优先级从低到高：内置默认值 → TOML 配置文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- OpenAI 配置 ---
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub openai_model: String,
    // --- Google Gemini 配置 ---
    pub google_api_key: String,
    pub google_api_base: String,
    pub google_model: String,
    /// 单次生成请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 限流配置（每分钟请求数） ---
    pub openai_rpm: u32,
    pub google_rpm: u32,
    // --- 分析缓存配置 ---
    pub cache_enabled: bool,
    pub cache_ttl_secs: i64,
    // --- 任务执行配置 ---
    /// 同时处理的任务数量
    pub max_concurrent_jobs: usize,
    /// 队列投递尝试次数上限
    pub queue_max_attempts: u32,
    /// 重试退避间隔（秒）
    pub queue_backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o".to_string(),
            google_api_key: String::new(),
            google_api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            google_model: "gemini-2.0-flash-exp".to_string(),
            request_timeout_secs: 900,
            openai_rpm: 500,
            google_rpm: 1000,
            cache_enabled: true,
            cache_ttl_secs: 3600,
            max_concurrent_jobs: 4,
            queue_max_attempts: 3,
            queue_backoff_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(default.openai_api_key),
            openai_api_base: std::env::var("OPENAI_API_BASE").unwrap_or(default.openai_api_base),
            openai_model: std::env::var("OPENAI_DEFAULT_MODEL").unwrap_or(default.openai_model),
            google_api_key: std::env::var("GOOGLE_GEMINI_API_KEY").unwrap_or(default.google_api_key),
            google_api_base: std::env::var("GOOGLE_API_BASE").unwrap_or(default.google_api_base),
            google_model: std::env::var("GOOGLE_DEFAULT_MODEL").unwrap_or(default.google_model),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            openai_rpm: std::env::var("OPENAI_RATE_LIMIT_RPM").ok().and_then(|v| v.parse().ok()).unwrap_or(default.openai_rpm),
            google_rpm: std::env::var("GOOGLE_RATE_LIMIT_RPM").ok().and_then(|v| v.parse().ok()).unwrap_or(default.google_rpm),
            cache_enabled: std::env::var("CACHE_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.cache_enabled),
            cache_ttl_secs: std::env::var("CACHE_TTL").ok().and_then(|v| v.parse().ok()).unwrap_or(default.cache_ttl_secs),
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_jobs),
            queue_max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.queue_max_attempts),
            queue_backoff_secs: std::env::var("QUEUE_BACKOFF_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.queue_backoff_secs),
        }
    }

    /// 从 TOML 配置文件加载，缺失字段使用默认值
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.openai_rpm, 500);
        assert_eq!(config.google_rpm, 1000);
        assert_eq!(config.queue_max_attempts, 3);
        assert!(config.cache_enabled);
        assert!(config.openai_api_key.is_empty());
    }

    #[test]
    fn test_from_toml_partial() {
        let config: Config = toml::from_str(
            r#"
            openai_api_key = "sk-test"
            openai_rpm = 10
            cache_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_rpm, 10);
        assert!(!config.cache_enabled);
        // 未指定字段回落到默认值
        assert_eq!(config.google_rpm, 1000);
        assert_eq!(config.openai_model, "gpt-4o");
    }
}
