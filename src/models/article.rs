//! 文章生成的中间产物与最终结果

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 单个阶段的输出（文本 + 消耗的 token 数）
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub text: String,
    pub tokens_used: u64,
}

/// 解析后的文章（不含 token 统计）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedArticle {
    pub title: String,
    pub content: String,
    /// 最多 5 个备选 meta 标题
    pub meta_titles: Vec<String>,
    /// 最多 5 个备选 meta 描述
    pub meta_descriptions: Vec<String>,
    /// 去除标记后的正文词数
    pub word_count: usize,
}

/// 写文章阶段的输出
#[derive(Debug, Clone)]
pub struct ArticleOutput {
    pub article: ParsedArticle,
    pub tokens_used: u64,
}

/// 各阶段 token 用量
///
/// 序列化为 `{"stage_1": 100, "stage_2": 200, "total": 300}` 的扁平结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(flatten)]
    pub stages: BTreeMap<String, u64>,
    pub total: u64,
}

impl TokenUsage {
    /// 记录第 `stage` 阶段（从 1 开始）的 token 消耗
    pub fn record(&mut self, stage: usize, tokens: u64) {
        self.stages.insert(format!("stage_{}", stage), tokens);
        self.total += tokens;
    }

    pub fn stage(&self, stage: usize) -> Option<u64> {
        self.stages.get(&format!("stage_{}", stage)).copied()
    }
}

/// 完整的生成结果，仅在任务成功后持久化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub title: String,
    pub content: String,
    pub meta_titles: Vec<String>,
    pub meta_descriptions: Vec<String>,
    pub word_count: usize,
    pub tokens_used: TokenUsage,
    /// 生成总耗时（秒，保留两位小数）
    pub generation_time: f64,
    /// 使用的场景名回显
    pub scenario: String,
}

impl GenerationResult {
    pub fn from_article(
        article: ParsedArticle,
        tokens_used: TokenUsage,
        generation_time: f64,
        scenario: &str,
    ) -> Self {
        Self {
            title: article.title,
            content: article.content,
            meta_titles: article.meta_titles,
            meta_descriptions: article.meta_descriptions,
            word_count: article.word_count,
            tokens_used,
            generation_time,
            scenario: scenario.to_string(),
        }
    }
}
