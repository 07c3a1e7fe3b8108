//! 生成任务记录
//!
//! 一个任务对应一个关键词的生成尝试，生命周期：
//!
//! ```text
//! queued → processing → completed
//!                     ↘ failed
//! ```
//!
//! 状态只向前推进；进入终态后不再变化。`result` 与 `error_message`
//! 互斥，且在 queued / processing 期间均为空。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GenerationResult;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// 生成参数，任务创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// 关键词 / 目标查询
    pub keyword: String,
    /// 必须出现的关键词（可为空）
    pub required_keywords: Vec<String>,
    pub language: String,
    pub country: String,
    pub page_type: String,
    pub word_count: u32,
    /// 单次请求覆盖的 OpenAI API Key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    /// 单次请求覆盖的 Gemini API Key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            required_keywords: vec![],
            language: "English".to_string(),
            country: "US".to_string(),
            page_type: "article".to_string(),
            word_count: 1000,
            openai_api_key: None,
            google_api_key: None,
        }
    }
}

/// 生成任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v7，按创建时间可排序
    pub id: Uuid,
    /// 场景名（执行时解析，未知场景在执行阶段立即失败）
    pub scenario: String,
    /// 关键词回显
    pub query: String,
    pub params: GenerationParams,
    pub status: JobStatus,
    pub result: Option<GenerationResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// 进入 processing 的时间，只设置一次
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(scenario: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            scenario: scenario.into(),
            query: params.keyword.clone(),
            params,
            status: JobStatus::Queued,
            result: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn has_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }
}
