//! 任务存储 - 业务能力层
//!
//! 持久化由外部存储承担，这里约定核心需要的最小契约：
//! 创建、查找、三次状态更新（processing / completed / failed）与
//! 历史列表。存储实现负责守住状态机不变量：状态只向前推进，
//! 终态不再变化，`result` 与 `error_message` 互斥。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppResult, GenerationError};
use crate::models::{GenerationResult, Job, JobStatus};

/// 任务存储接口
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: Job) -> AppResult<()>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Job>>;

    /// 进入 processing，设置开始时间（只发生一次）
    async fn mark_processing(&self, id: Uuid) -> AppResult<()>;

    /// 进入 completed，写入结果与完成时间
    async fn mark_completed(&self, id: Uuid, result: GenerationResult) -> AppResult<()>;

    /// 进入 failed，写入错误信息
    async fn mark_failed(&self, id: Uuid, message: String) -> AppResult<()>;

    /// 按创建顺序列出任务，可按状态过滤
    async fn list(&self, status: Option<JobStatus>) -> AppResult<Vec<Job>>;
}

/// 进程内任务存储
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// 对单个任务应用更新，任务不存在时报错
    fn update<F>(&self, id: Uuid, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock().expect("任务存储锁中毒");
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| GenerationError::Store(format!("任务不存在: {}", id)))?;
        apply(job);
        Ok(())
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> AppResult<()> {
        let mut jobs = self.jobs.lock().expect("任务存储锁中毒");
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Job>> {
        let jobs = self.jobs.lock().expect("任务存储锁中毒");
        Ok(jobs.get(&id).cloned())
    }

    async fn mark_processing(&self, id: Uuid) -> AppResult<()> {
        self.update(id, |job| {
            if job.status != JobStatus::Queued {
                warn!("任务 {} 状态为 {:?}，忽略重复的 processing 转换", id, job.status);
                return;
            }
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
        })
    }

    async fn mark_completed(&self, id: Uuid, result: GenerationResult) -> AppResult<()> {
        self.update(id, |job| {
            if job.status.is_terminal() {
                warn!("任务 {} 已处于终态 {:?}，忽略 completed 转换", id, job.status);
                return;
            }
            job.status = JobStatus::Completed;
            job.result = Some(result);
            job.error_message = None;
            job.completed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, id: Uuid, message: String) -> AppResult<()> {
        self.update(id, |job| {
            if job.status.is_terminal() {
                warn!("任务 {} 已处于终态 {:?}，忽略 failed 转换", id, job.status);
                return;
            }
            job.status = JobStatus::Failed;
            job.error_message = Some(message);
            job.result = None;
        })
    }

    async fn list(&self, status: Option<JobStatus>) -> AppResult<Vec<Job>> {
        let jobs = self.jobs.lock().expect("任务存储锁中毒");
        let mut result: Vec<Job> = jobs
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        // UUID v7 按创建时间有序
        result.sort_by_key(|job| job.id);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationParams, TokenUsage};

    fn test_job(keyword: &str) -> Job {
        Job::new(
            "simple_gpt",
            GenerationParams {
                keyword: keyword.to_string(),
                required_keywords: vec![],
                language: "English".to_string(),
                country: "US".to_string(),
                page_type: "article".to_string(),
                word_count: 1000,
                openai_api_key: None,
                google_api_key: None,
            },
        )
    }

    fn test_result() -> GenerationResult {
        let mut tokens = TokenUsage::default();
        tokens.record(1, 42);
        GenerationResult {
            title: "Title".to_string(),
            content: "<h1>Title</h1>".to_string(),
            meta_titles: vec!["Title".to_string()],
            meta_descriptions: vec!["desc".to_string()],
            word_count: 1,
            tokens_used: tokens,
            generation_time: 0.5,
            scenario: "simple_gpt".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_happy_path() {
        let store = MemoryJobStore::new();
        let job = test_job("rust");
        let id = job.id;
        store.create(job).await.unwrap();

        store.mark_processing(id).await.unwrap();
        let job = store.find(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());
        assert!(job.result.is_none() && job.error_message.is_none());

        store.mark_completed(id, test_result()).await.unwrap();
        let job = store.find(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.error_message.is_none());
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_job_has_no_result() {
        let store = MemoryJobStore::new();
        let job = test_job("rust");
        let id = job.id;
        store.create(job).await.unwrap();
        store.mark_processing(id).await.unwrap();
        store.mark_failed(id, "openai API 错误".to_string()).await.unwrap();

        let job = store.find(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert_eq!(job.error_message.as_deref(), Some("openai API 错误"));
    }

    #[tokio::test]
    async fn test_terminal_states_are_absorbing() {
        let store = MemoryJobStore::new();
        let job = test_job("rust");
        let id = job.id;
        store.create(job).await.unwrap();
        store.mark_processing(id).await.unwrap();
        store.mark_completed(id, test_result()).await.unwrap();

        // 终态之后的转换全部被忽略
        store.mark_failed(id, "太迟了".to_string()).await.unwrap();
        let job = store.find(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_processing_happens_once() {
        let store = MemoryJobStore::new();
        let job = test_job("rust");
        let id = job.id;
        store.create(job).await.unwrap();
        store.mark_processing(id).await.unwrap();
        let first_start = store.find(id).await.unwrap().unwrap().started_at;

        store.mark_processing(id).await.unwrap();
        let job = store.find(id).await.unwrap().unwrap();
        assert_eq!(job.started_at, first_start);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = MemoryJobStore::new();
        let a = test_job("a");
        let b = test_job("b");
        let b_id = b.id;
        store.create(a).await.unwrap();
        store.create(b).await.unwrap();
        store.mark_processing(b_id).await.unwrap();
        store.mark_failed(b_id, "boom".to_string()).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        let failed = store.list(Some(JobStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].query, "b");
        assert_eq!(store.list(Some(JobStatus::Queued)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_job_fails() {
        let store = MemoryJobStore::new();
        let err = store.mark_processing(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Store(_)));
    }
}
