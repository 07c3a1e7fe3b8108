//! 单个任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责单个生成任务的完整生命周期，是任务级别的编排器。
//!
//! 1. **状态推进**：queued → processing → completed / failed
//! 2. **重试控制**：可重试错误按固定间隔重试，最多 N 次
//! 3. **结果落库**：成功写入结果，失败写入错误信息
//!
//! 不可重试的错误（参数校验、未知场景、服务未配置）直接终止，
//! 不消耗剩余重试次数。

use std::time::Duration;

use tracing::{error, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::Job;
use crate::services::JobStore;
use crate::workflow::{GenerationFlow, JobCtx};

/// 任务重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.queue_max_attempts,
            backoff_secs: config.queue_backoff_secs,
        }
    }
}

/// 处理单个任务
///
/// # 返回
/// 返回任务是否成功（存储层错误向上传播）
pub async fn process_job(
    flow: &GenerationFlow,
    store: &dyn JobStore,
    job: &Job,
    ctx: &JobCtx,
    policy: &RetryPolicy,
) -> AppResult<bool> {
    store.mark_processing(job.id).await?;

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match flow.run(&job.scenario, &job.params, ctx).await {
            Ok(result) => {
                store.mark_completed(job.id, result).await?;
                return Ok(true);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    "[任务 {}] ⚠️ 第 {}/{} 次尝试失败，{} 秒后重试: {}",
                    ctx.job_index, attempt, max_attempts, policy.backoff_secs, e
                );
                tokio::time::sleep(Duration::from_secs(policy.backoff_secs)).await;
                attempt += 1;
            }
            Err(e) => {
                let message = format!("Job failed after {} attempts: {}", attempt, e);
                error!("[任务 {}] ❌ {}", ctx.job_index, message);
                store.mark_failed(job.id, message).await?;
                return Ok(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::clients::{response_parser, ProviderClient};
    use crate::error::GenerationError;
    use crate::models::{
        ArticleOutput, GenerationParams, JobStatus, ProviderKind, StageOutput,
    };
    use crate::services::{MemoryCache, MemoryJobStore, RateLimiter};

    /// 前 N 次调用失败、之后成功的服务替身
    struct FlakyClient {
        calls: AtomicUsize,
        fail_first: usize,
        error: fn() -> GenerationError,
    }

    impl FlakyClient {
        fn new(fail_first: usize, error: fn() -> GenerationError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                error,
            }
        }

        fn next(&self) -> AppResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ProviderClient for FlakyClient {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn analyze(&self, _params: &GenerationParams) -> AppResult<StageOutput> {
            self.next()?;
            Ok(StageOutput {
                text: "a".to_string(),
                tokens_used: 1,
            })
        }

        async fn build_prompt(
            &self,
            _analysis: &str,
            _params: &GenerationParams,
        ) -> AppResult<StageOutput> {
            self.next()?;
            Ok(StageOutput {
                text: "p".to_string(),
                tokens_used: 1,
            })
        }

        async fn write_article(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> AppResult<ArticleOutput> {
            self.next()?;
            Ok(response_parser::parse_article("# Done\n\nok", 1))
        }

        async fn write_simple_article(
            &self,
            _params: &GenerationParams,
        ) -> AppResult<ArticleOutput> {
            self.next()?;
            Ok(response_parser::parse_article("# Done\n\nok", 1))
        }

        async fn test_connection(&self) -> AppResult<()> {
            Ok(())
        }
    }

    fn provider_error() -> GenerationError {
        GenerationError::Provider {
            provider: ProviderKind::OpenAi,
            status: Some(500),
            message: "internal error".to_string(),
        }
    }

    fn test_params() -> GenerationParams {
        GenerationParams {
            keyword: "rust".to_string(),
            required_keywords: vec![],
            language: "English".to_string(),
            country: "US".to_string(),
            page_type: "article".to_string(),
            word_count: 1000,
            openai_api_key: None,
            google_api_key: None,
        }
    }

    fn flow_with(client: Arc<FlakyClient>) -> GenerationFlow {
        GenerationFlow::new(
            client.clone(),
            client,
            Arc::new(RateLimiter::with_limits(1000, 1000)),
            Arc::new(MemoryCache::new()),
            false,
            3600,
        )
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_secs: 0,
        }
    }

    async fn run(
        scenario: &str,
        client: Arc<FlakyClient>,
        max_attempts: u32,
    ) -> (bool, Job) {
        let store = MemoryJobStore::new();
        let flow = flow_with(client);
        let job = Job::new(scenario, test_params());
        let id = job.id;
        store.create(job.clone()).await.unwrap();
        let ctx = JobCtx::new(id, 1, "rust");
        let ok = process_job(&flow, &store, &job, &ctx, &policy(max_attempts))
            .await
            .unwrap();
        (ok, store.find(id).await.unwrap().unwrap())
    }

    #[tokio::test]
    async fn test_success_marks_completed() {
        let client = Arc::new(FlakyClient::new(0, provider_error));
        let (ok, job) = run("simple_gpt", client, 3).await;
        assert!(ok);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.started_at.is_some() && job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        // 前两次失败，第三次成功
        let client = Arc::new(FlakyClient::new(2, provider_error));
        let (ok, job) = run("simple_gpt", client.clone(), 3).await;
        assert!(ok);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fail_with_message() {
        let client = Arc::new(FlakyClient::new(10, provider_error));
        let (ok, job) = run("simple_gpt", client.clone(), 3).await;
        assert!(!ok);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        let message = job.error_message.unwrap();
        assert!(message.starts_with("Job failed after 3 attempts:"), "{}", message);
    }

    #[tokio::test]
    async fn test_unknown_scenario_fails_without_retry() {
        let client = Arc::new(FlakyClient::new(0, provider_error));
        let (ok, job) = run("five_tier_all", client.clone(), 3).await;
        assert!(!ok);
        assert_eq!(job.status, JobStatus::Failed);
        // 未知场景不可重试，也从未调用过服务
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(job
            .error_message
            .unwrap()
            .starts_with("Job failed after 1 attempts:"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_without_retry() {
        let client = Arc::new(FlakyClient::new(10, || {
            GenerationError::ProviderUnavailable {
                provider: ProviderKind::OpenAi,
            }
        }));
        let (ok, job) = run("simple_gpt", client.clone(), 3).await;
        assert!(!ok);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}
