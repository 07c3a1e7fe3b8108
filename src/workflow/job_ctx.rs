//! 任务上下文 - 流程层
//!
//! 封装日志与追踪需要的任务标识，避免在各层函数签名里
//! 散落 job_id / 序号参数。

use uuid::Uuid;

/// 单个生成任务的上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    pub job_id: Uuid,
    /// 批次内序号（从 1 开始），用于日志输出
    pub job_index: usize,
    pub keyword: String,
}

impl JobCtx {
    pub fn new(job_id: Uuid, job_index: usize, keyword: impl Into<String>) -> Self {
        Self {
            job_id,
            job_index,
            keyword: keyword.into(),
        }
    }
}
