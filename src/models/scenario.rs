//! 生成场景
//!
//! 场景名决定流水线形状（阶段序列 + 各阶段使用的生成服务）。
//! 五个固定场景：
//!
//! | 场景 | 阶段 | 服务 |
//! |---|---|---|
//! | `three_tier_both` | 分析 → 生成提示词 → 写文章 | 分析用 Gemini，其余用 OpenAI |
//! | `three_tier_gpt` | 分析 → 生成提示词 → 写文章 | 全部 OpenAI |
//! | `three_tier_gemini` | 分析 → 生成提示词 → 写文章 | 全部 Gemini |
//! | `simple_gpt` | 单步写文章 | OpenAI |
//! | `simple_gemini` | 单步写文章 | Gemini |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// 外部文本生成服务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// 限流与日志使用的服务标识
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "google",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// SEO 分析
    Analyze,
    /// 生成写作提示词
    BuildPrompt,
    /// 按提示词写文章
    WriteArticle,
    /// 单步直接写文章
    WriteSimpleArticle,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::BuildPrompt => "build_prompt",
            Stage::WriteArticle => "write_article",
            Stage::WriteSimpleArticle => "write_simple_article",
        }
    }
}

/// 生成场景
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    ThreeTierBoth,
    ThreeTierGpt,
    ThreeTierGemini,
    SimpleGpt,
    SimpleGemini,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::ThreeTierBoth => "three_tier_both",
            Scenario::ThreeTierGpt => "three_tier_gpt",
            Scenario::ThreeTierGemini => "three_tier_gemini",
            Scenario::SimpleGpt => "simple_gpt",
            Scenario::SimpleGemini => "simple_gemini",
        }
    }

    /// 是否为三阶段流水线
    pub fn is_three_tier(&self) -> bool {
        matches!(
            self,
            Scenario::ThreeTierBoth | Scenario::ThreeTierGpt | Scenario::ThreeTierGemini
        )
    }

    /// 分析阶段使用的服务
    pub fn analyzer(&self) -> ProviderKind {
        match self {
            Scenario::ThreeTierBoth | Scenario::ThreeTierGemini | Scenario::SimpleGemini => {
                ProviderKind::Gemini
            }
            Scenario::ThreeTierGpt | Scenario::SimpleGpt => ProviderKind::OpenAi,
        }
    }

    /// 写作阶段（提示词生成 + 写文章）使用的服务
    pub fn writer(&self) -> ProviderKind {
        match self {
            Scenario::ThreeTierBoth | Scenario::ThreeTierGpt | Scenario::SimpleGpt => {
                ProviderKind::OpenAi
            }
            Scenario::ThreeTierGemini | Scenario::SimpleGemini => ProviderKind::Gemini,
        }
    }
}

impl FromStr for Scenario {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "three_tier_both" => Ok(Scenario::ThreeTierBoth),
            "three_tier_gpt" => Ok(Scenario::ThreeTierGpt),
            "three_tier_gemini" => Ok(Scenario::ThreeTierGemini),
            "simple_gpt" => Ok(Scenario::SimpleGpt),
            "simple_gemini" => Ok(Scenario::SimpleGemini),
            _ => Err(GenerationError::UnknownScenario {
                scenario: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
