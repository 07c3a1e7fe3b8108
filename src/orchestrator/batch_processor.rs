//! 批量生成处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量生成任务的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：构建限流器、缓存与任务存储
//! 2. **任务受理**：参数校验 → 创建任务记录（queued）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：将任务分批次处理，每批完成后再开始下一批
//! 5. **状态查询**：单任务状态、历史列表、限流状态
//! 6. **全局统计**：汇总所有任务的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个任务的细节
//! - **资源所有者**：唯一持有限流器 / 缓存 / 存储的模块
//! - **并发安全**：通过 Semaphore 和 tokio::spawn 实现并发
//! - **向下委托**：委托 job_processor 处理单个任务

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::clients::{GeminiClient, OpenAiClient, ProviderClient};
use crate::config::Config;
use crate::error::{AppResult, GenerationError};
use crate::models::{GenerationParams, Job, JobStatus, ProviderKind};
use crate::orchestrator::job_processor::{self, RetryPolicy};
use crate::services::{
    CacheStore, JobStore, MemoryCache, MemoryJobStore, RateLimitStatus, RateLimiter,
};
use crate::workflow::{GenerationFlow, JobCtx};

/// 目标字数下限
const MIN_WORD_COUNT: u32 = 500;
/// 目标字数上限
const MAX_WORD_COUNT: u32 = 10_000;
/// 关键词最大长度（字符）
const MAX_KEYWORD_CHARS: usize = 255;

/// 应用主结构
pub struct App {
    config: Config,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn JobStore>,
}

impl App {
    /// 使用进程内缓存与存储初始化应用
    pub fn new(config: Config) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config));
        Self {
            config,
            rate_limiter,
            cache: Arc::new(MemoryCache::new()),
            store: Arc::new(MemoryJobStore::new()),
        }
    }

    /// 注入式构造，便于替换缓存 / 存储实现
    pub fn with_stores(
        config: Config,
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config));
        Self {
            config,
            rate_limiter,
            cache,
            store,
        }
    }

    /// 校验生成参数
    ///
    /// 校验失败在任务创建之前拒绝，不产生任务记录。
    /// 场景名不在这里校验：未知场景按约定创建任务后立即失败。
    pub fn validate(params: &GenerationParams) -> AppResult<()> {
        if params.keyword.trim().is_empty() {
            return Err(GenerationError::Validation("关键词不能为空".to_string()));
        }
        if params.keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(GenerationError::Validation(format!(
                "关键词长度不能超过 {} 字符",
                MAX_KEYWORD_CHARS
            )));
        }
        if params.word_count < MIN_WORD_COUNT || params.word_count > MAX_WORD_COUNT {
            return Err(GenerationError::Validation(format!(
                "目标字数必须在 {} 到 {} 之间，实际: {}",
                MIN_WORD_COUNT, MAX_WORD_COUNT, params.word_count
            )));
        }
        for (field, value) in [
            ("language", &params.language),
            ("country", &params.country),
            ("page_type", &params.page_type),
        ] {
            if value.trim().is_empty() {
                return Err(GenerationError::Validation(format!("{} 不能为空", field)));
            }
        }
        Ok(())
    }

    /// 受理单个生成请求：校验参数并创建 queued 任务
    pub async fn submit(&self, scenario: &str, params: GenerationParams) -> AppResult<Uuid> {
        Self::validate(&params)?;
        let job = Job::new(scenario, params);
        let id = job.id;
        info!("📥 受理任务 {}: 关键词 \"{}\", 场景 {}", id, job.query, scenario);
        self.store.create(job).await?;
        Ok(id)
    }

    /// 受理并同步执行单个任务，返回最终任务记录
    ///
    /// 同步模式只尝试一次，不走队列重试
    pub async fn submit_and_wait(
        &self,
        scenario: &str,
        params: GenerationParams,
    ) -> AppResult<Job> {
        let id = self.submit(scenario, params).await?;
        let job = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| GenerationError::Store(format!("任务不存在: {}", id)))?;
        let ctx = JobCtx::new(id, 1, &job.query);
        let flow = GenerationFlow::from_config(
            &self.config,
            &job.params,
            self.rate_limiter.clone(),
            self.cache.clone(),
        );
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff_secs: 0,
        };
        job_processor::process_job(&flow, self.store.as_ref(), &job, &ctx, &policy).await?;
        self.store
            .find(id)
            .await?
            .ok_or_else(|| GenerationError::Store(format!("任务不存在: {}", id)))
    }

    /// 批量运行同一场景下的多个生成请求
    pub async fn run_batch(
        &self,
        scenario: &str,
        batch: Vec<GenerationParams>,
    ) -> AppResult<ProcessingStats> {
        log_startup(&self.config);

        if batch.is_empty() {
            info!("⚠️ 没有待处理的生成请求，程序结束");
            return Ok(ProcessingStats::default());
        }

        // 先受理全部请求；校验失败的直接计入失败，不创建任务
        let mut jobs = Vec::new();
        let mut stats = ProcessingStats {
            total: batch.len(),
            ..Default::default()
        };
        for params in batch {
            match self.submit(scenario, params).await {
                Ok(id) => {
                    if let Some(job) = self.store.find(id).await? {
                        jobs.push(job);
                    }
                }
                Err(e) => {
                    error!("❌ 请求被拒绝: {}", e);
                    stats.failed += 1;
                }
            }
        }

        log_jobs_loaded(jobs.len(), self.config.max_concurrent_jobs);

        // 分批处理
        let max_concurrent = self.config.max_concurrent_jobs.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let total_jobs = jobs.len();
        let total_batches = total_jobs.div_ceil(max_concurrent);

        for (batch_idx, batch_jobs) in jobs.chunks(max_concurrent).enumerate() {
            let batch_num = batch_idx + 1;
            let batch_start = batch_idx * max_concurrent;
            log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + batch_jobs.len(),
                total_jobs,
            );

            let batch_result = self
                .process_batch(batch_jobs, batch_start, semaphore.clone())
                .await?;

            stats.success += batch_result.success;
            stats.failed += batch_result.failed;

            log_batch_complete(batch_num, &batch_result);
        }

        print_final_stats(&stats);
        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_jobs: &[Job],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> AppResult<BatchResult> {
        let mut batch_handles = Vec::new();

        for (idx, job) in batch_jobs.iter().enumerate() {
            let job_index = batch_start + idx + 1;
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| GenerationError::Store(format!("并发信号量已关闭: {}", e)))?;

            let job = job.clone();
            let ctx = JobCtx::new(job.id, job_index, &job.query);
            // 客户端按任务构建：单次请求的 API Key 覆盖互不影响
            let flow = GenerationFlow::from_config(
                &self.config,
                &job.params,
                self.rate_limiter.clone(),
                self.cache.clone(),
            );
            let store = self.store.clone();
            let policy = RetryPolicy::from(&self.config);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                job_processor::process_job(&flow, store.as_ref(), &job, &ctx, &policy).await
            });
            batch_handles.push((job_index, handle));
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();

        for (job_index, handle) in batch_handles {
            match handle.await {
                Ok(Ok(true)) => {
                    result.success += 1;
                }
                Ok(Ok(false)) => {
                    result.failed += 1;
                }
                Ok(Err(e)) => {
                    error!("[任务 {}] ❌ 处理过程中发生错误: {}", job_index, e);
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[任务 {}] 任务执行失败: {}", job_index, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    /// 查询单个任务
    pub async fn job_status(&self, id: Uuid) -> AppResult<Option<Job>> {
        self.store.find(id).await
    }

    /// 按创建顺序列出历史任务，可按状态过滤
    pub async fn history(&self, status: Option<JobStatus>) -> AppResult<Vec<Job>> {
        self.store.list(status).await
    }

    /// 查询两个服务的当前限流状态
    pub fn rate_limit_status(&self) -> Vec<RateLimitStatus> {
        vec![
            self.rate_limiter.status(ProviderKind::OpenAi),
            self.rate_limiter.status(ProviderKind::Gemini),
        ]
    }

    /// 探测两个服务的连通性
    pub async fn test_connections(&self) -> Vec<(ProviderKind, AppResult<()>)> {
        let openai = OpenAiClient::new(&self.config);
        let gemini = GeminiClient::new(&self.config);
        let mut results = Vec::new();
        for client in [&openai as &dyn ProviderClient, &gemini] {
            let kind = client.kind();
            let result = client.test_connection().await;
            match &result {
                Ok(_) => info!("✅ {} 连通性正常", kind),
                Err(e) => error!("❌ {} 连通性异常: {}", kind, e),
            }
            results.push((kind, result));
        }
        results
    }
}

/// 处理统计
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量文章生成模式");
    info!("📊 最大并发数: {}", config.max_concurrent_jobs);
    info!("{}", "=".repeat(60));
}

fn log_jobs_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 受理 {} 个生成任务", total);
    info!("📋 将以每批 {} 个的方式处理", max_concurrent);
    info!("💡 每批完成后再开始下一批\n");
}

fn log_batch_start(batch_num: usize, total_batches: usize, start: usize, end: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批任务: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

fn log_batch_complete(batch_num: usize, result: &BatchResult) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 成功 {}/{}",
        batch_num,
        result.success,
        result.success + result.failed
    );
    info!("{}", "─".repeat(60));
}

fn print_final_stats(stats: &ProcessingStats) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.total);
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(word_count: u32, keyword: &str) -> GenerationParams {
        GenerationParams {
            keyword: keyword.to_string(),
            required_keywords: vec![],
            language: "English".to_string(),
            country: "US".to_string(),
            page_type: "article".to_string(),
            word_count,
            openai_api_key: None,
            google_api_key: None,
        }
    }

    #[test]
    fn test_validate_word_count_bounds() {
        assert!(App::validate(&params(500, "rust")).is_ok());
        assert!(App::validate(&params(10_000, "rust")).is_ok());
        assert!(matches!(
            App::validate(&params(499, "rust")),
            Err(GenerationError::Validation(_))
        ));
        assert!(matches!(
            App::validate(&params(10_001, "rust")),
            Err(GenerationError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_keyword() {
        assert!(matches!(
            App::validate(&params(1000, "  ")),
            Err(GenerationError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_overlong_keyword() {
        let long = "词".repeat(256);
        assert!(matches!(
            App::validate(&params(1000, &long)),
            Err(GenerationError::Validation(_))
        ));
        assert!(App::validate(&params(1000, &"词".repeat(255))).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_locale_fields() {
        let mut p = params(1000, "rust");
        p.language = String::new();
        assert!(matches!(
            App::validate(&p),
            Err(GenerationError::Validation(_))
        ));

        let mut p = params(1000, "rust");
        p.page_type = "  ".to_string();
        assert!(matches!(
            App::validate(&p),
            Err(GenerationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_params_without_job() {
        let app = App::new(Config::default());
        let err = app.submit("simple_gpt", params(100, "rust")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
        // 校验失败不留任务记录
        assert!(app.history(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_creates_queued_job() {
        let app = App::new(Config::default());
        let id = app.submit("simple_gpt", params(1000, "rust")).await.unwrap();

        let job = app.job_status(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.query, "rust");
        assert_eq!(job.scenario, "simple_gpt");
    }

    #[tokio::test]
    async fn test_unknown_scenario_job_is_created_then_fails() {
        // 场景名在受理时不校验
        let app = App::new(Config::default());
        let id = app.submit("no_such_scenario", params(1000, "rust")).await.unwrap();
        assert!(app.job_status(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_and_wait_without_credentials_fails_terminally() {
        // 未配置 API Key：同步模式单次尝试后进入 failed 终态
        let app = App::new(Config::default());
        let job = app
            .submit_and_wait("simple_gpt", params(1000, "rust"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        let message = job.error_message.unwrap();
        assert!(message.starts_with("Job failed after 1 attempts:"), "{}", message);
    }

    #[tokio::test]
    async fn test_rate_limit_status_covers_both_providers() {
        let app = App::new(Config::default());
        let status = app.rate_limit_status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].provider, ProviderKind::OpenAi);
        assert_eq!(status[1].provider, ProviderKind::Gemini);
        assert_eq!(status[0].current, 0);
    }
}
