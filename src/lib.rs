//! # Article Generator
//!
//! 一个基于多家 LLM 服务的 SEO 文章批量生成应用
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 封装外部生成服务，只暴露能力
//! - `OpenAiClient` / `GeminiClient` - 统一实现 `ProviderClient`
//! - `response_parser` - 把模型原始输出解析为结构化文章
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，与具体流程无关
//! - `RateLimiter` - 按服务的分钟级请求配额
//! - `CacheStore` / `MemoryCache` - 分析阶段结果缓存
//! - `JobStore` / `MemoryJobStore` - 任务记录与状态机
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整生成流程
//! - `JobCtx` - 上下文封装（job_id + 批次序号）
//! - `GenerationFlow` - 流程编排（限流 → 缓存 → 分阶段调用）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量生成处理器，管理资源和并发
//! - `orchestrator/job_processor` - 单个任务处理器，负责重试与状态推进

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{GeminiClient, OpenAiClient, ProviderClient};
pub use config::Config;
pub use error::{AppResult, GenerationError};
pub use models::{GenerationParams, GenerationResult, Job, JobStatus, ProviderKind, Scenario};
pub use orchestrator::{App, ProcessingStats};
pub use services::{CacheStore, JobStore, RateLimiter};
pub use workflow::{GenerationFlow, JobCtx};
