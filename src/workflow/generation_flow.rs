//! 文章生成流水线 - 流程层
//!
//! 核心职责：定义"一个任务"的完整生成流程
//!
//! - 把场景名解析为流水线形状（阶段序列 + 各阶段的生成服务）
//! - 逐阶段执行：占用限流配额 → 调用服务 → 累计 token 用量
//! - 分析阶段先查缓存，命中则既不发网络请求也不占用配额
//! - 单个任务内阶段严格串行（阶段 N+1 依赖阶段 N 的输出）
//! - 不持有任务记录，不关心重试（由编排层负责）

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::clients::{GeminiClient, OpenAiClient, ProviderClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    GenerationParams, GenerationResult, ParsedArticle, ProviderKind, Scenario, StageOutput,
    TokenUsage,
};
use crate::services::{analysis_fingerprint, CacheStore, CachedAnalysis, RateLimiter};
use crate::workflow::job_ctx::JobCtx;

/// 文章生成流水线
pub struct GenerationFlow {
    openai: Arc<dyn ProviderClient>,
    gemini: Arc<dyn ProviderClient>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<dyn CacheStore>,
    cache_enabled: bool,
    cache_ttl_secs: i64,
}

impl GenerationFlow {
    /// 注入式构造，便于使用测试替身
    pub fn new(
        openai: Arc<dyn ProviderClient>,
        gemini: Arc<dyn ProviderClient>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<dyn CacheStore>,
        cache_enabled: bool,
        cache_ttl_secs: i64,
    ) -> Self {
        Self {
            openai,
            gemini,
            rate_limiter,
            cache,
            cache_enabled,
            cache_ttl_secs,
        }
    }

    /// 按配置构建真实客户端；单次请求的 API Key 覆盖在这里生效，
    /// 不存在跨任务共享的可变凭证状态
    pub fn from_config(
        config: &Config,
        params: &GenerationParams,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let openai = Arc::new(
            OpenAiClient::new(config).with_api_key_override(params.openai_api_key.as_deref()),
        );
        let gemini = Arc::new(
            GeminiClient::new(config).with_api_key_override(params.google_api_key.as_deref()),
        );
        Self::new(
            openai,
            gemini,
            rate_limiter,
            cache,
            config.cache_enabled,
            config.cache_ttl_secs,
        )
    }

    /// 执行完整流水线
    ///
    /// 未知场景名在任何限流检查 / 服务调用之前返回 `UnknownScenario`。
    /// 任一阶段出错立即中止，已累计的 token 用量随之丢弃。
    pub async fn run(
        &self,
        scenario_name: &str,
        params: &GenerationParams,
        ctx: &JobCtx,
    ) -> AppResult<GenerationResult> {
        let scenario = Scenario::from_str(scenario_name)?;

        info!(
            "[任务 {}] 🚀 开始生成: 关键词 \"{}\", 场景 {}, 目标 {} 词",
            ctx.job_index, ctx.keyword, scenario, params.word_count
        );

        let start = Instant::now();

        let (article, tokens_used) = if scenario.is_three_tier() {
            self.run_three_tier(scenario, params, ctx).await?
        } else {
            self.run_simple(scenario, params, ctx).await?
        };

        let generation_time = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        info!(
            "[任务 {}] ✅ 生成完成: {} 词, 共 {} tokens, 耗时 {:.2} 秒",
            ctx.job_index, article.word_count, tokens_used.total, generation_time
        );

        Ok(GenerationResult::from_article(
            article,
            tokens_used,
            generation_time,
            scenario.as_str(),
        ))
    }

    /// 三阶段流水线：分析 → 生成提示词 → 写文章
    async fn run_three_tier(
        &self,
        scenario: Scenario,
        params: &GenerationParams,
        ctx: &JobCtx,
    ) -> AppResult<(ParsedArticle, TokenUsage)> {
        let analyzer = self.client_for(scenario.analyzer());
        let writer = self.client_for(scenario.writer());
        let mut tokens_used = TokenUsage::default();

        // ========== 阶段 1: SEO 分析（唯一走缓存的阶段） ==========
        let analysis = self.analyze_with_cache(analyzer, params, ctx).await?;
        tokens_used.record(1, analysis.tokens_used);
        info!(
            "[任务 {}] ✓ 阶段 1/3 完成（分析, {}），消耗 {} tokens",
            ctx.job_index,
            analyzer.kind(),
            analysis.tokens_used
        );

        // ========== 阶段 2: 生成写作提示词 ==========
        self.rate_limiter.reserve(writer.kind())?;
        let prompt = writer.build_prompt(&analysis.text, params).await?;
        tokens_used.record(2, prompt.tokens_used);
        info!(
            "[任务 {}] ✓ 阶段 2/3 完成（提示词, {}），消耗 {} tokens",
            ctx.job_index,
            writer.kind(),
            prompt.tokens_used
        );

        // ========== 阶段 3: 写文章 ==========
        self.rate_limiter.reserve(writer.kind())?;
        let article = writer.write_article(&prompt.text, params).await?;
        tokens_used.record(3, article.tokens_used);
        info!(
            "[任务 {}] ✓ 阶段 3/3 完成（文章, {}），消耗 {} tokens",
            ctx.job_index,
            writer.kind(),
            article.tokens_used
        );

        Ok((article.article, tokens_used))
    }

    /// 单阶段流水线：直接写文章
    async fn run_simple(
        &self,
        scenario: Scenario,
        params: &GenerationParams,
        ctx: &JobCtx,
    ) -> AppResult<(ParsedArticle, TokenUsage)> {
        let provider = self.client_for(scenario.writer());
        let mut tokens_used = TokenUsage::default();

        self.rate_limiter.reserve(provider.kind())?;
        let article = provider.write_simple_article(params).await?;
        tokens_used.record(1, article.tokens_used);
        info!(
            "[任务 {}] ✓ 阶段 1/1 完成（单步文章, {}），消耗 {} tokens",
            ctx.job_index,
            provider.kind(),
            article.tokens_used
        );

        Ok((article.article, tokens_used))
    }

    /// 分析阶段：先查缓存，命中时跳过网络调用且不占用配额；
    /// 缓存后端故障一律降级为未命中
    async fn analyze_with_cache(
        &self,
        analyzer: &Arc<dyn ProviderClient>,
        params: &GenerationParams,
        ctx: &JobCtx,
    ) -> AppResult<StageOutput> {
        let key = analysis_fingerprint(&params.keyword, &params.country, &params.language);

        if self.cache_enabled {
            match self.cache.get(&key).await {
                Ok(Some(hit)) => {
                    info!("[任务 {}] 💾 分析缓存命中，跳过网络调用", ctx.job_index);
                    return Ok(StageOutput {
                        text: hit.analysis,
                        tokens_used: hit.tokens_used,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("[任务 {}] ⚠️ 缓存读取失败，按未命中处理: {}", ctx.job_index, e);
                }
            }
        }

        self.rate_limiter.reserve(analyzer.kind())?;
        let output = analyzer.analyze(params).await?;

        if self.cache_enabled {
            let cached = CachedAnalysis {
                analysis: output.text.clone(),
                tokens_used: output.tokens_used,
            };
            if let Err(e) = self.cache.put(&key, cached, self.cache_ttl_secs).await {
                warn!("[任务 {}] ⚠️ 缓存写入失败: {}", ctx.job_index, e);
            }
        }

        Ok(output)
    }

    fn client_for(&self, kind: ProviderKind) -> &Arc<dyn ProviderClient> {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}
