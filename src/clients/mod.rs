//! 生成服务客户端层
//!
//! `ProviderClient` 是统一的能力接口，两个实现（OpenAI / Gemini）
//! 契约完全一致，上层流水线不感知具体服务。重试、超时属于底层
//! HTTP 客户端的职责，这里只暴露最终结果。

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{ArticleOutput, GenerationParams, ProviderKind, StageOutput};

pub mod gemini_client;
pub mod openai_client;
pub mod response_parser;

pub use gemini_client::GeminiClient;
pub use openai_client::OpenAiClient;

/// 文本生成服务能力接口
///
/// 每个操作要么返回最终输出，要么返回：
/// - `Provider` - 服务返回了非成功响应
/// - `ProviderUnavailable` - 未配置 API Key（在发起网络请求之前检查）
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// 服务标识（用于限流与日志）
    fn kind(&self) -> ProviderKind;

    /// 阶段 1：对目标查询做 SEO 分析
    async fn analyze(&self, params: &GenerationParams) -> AppResult<StageOutput>;

    /// 阶段 2：基于分析结果生成写作提示词
    async fn build_prompt(
        &self,
        analysis: &str,
        params: &GenerationParams,
    ) -> AppResult<StageOutput>;

    /// 阶段 3：按提示词写文章
    async fn write_article(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> AppResult<ArticleOutput>;

    /// 单步场景：直接按关键词写文章
    async fn write_simple_article(&self, params: &GenerationParams) -> AppResult<ArticleOutput>;

    /// 连通性探测
    async fn test_connection(&self) -> AppResult<()>;
}

/// 拼接必选关键词描述，为空时返回占位文案
pub(crate) fn required_keywords_text(params: &GenerationParams) -> String {
    if params.required_keywords.is_empty() {
        "not specified".to_string()
    } else {
        params.required_keywords.join(", ")
    }
}
