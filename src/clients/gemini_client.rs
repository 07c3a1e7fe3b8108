//! Google Gemini 生成服务客户端
//!
//! 直接通过 `reqwest` 调用 `generateContent` 接口。
//! 与 OpenAI 客户端的契约完全一致，仅传输层和提示词组织方式不同。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::clients::{required_keywords_text, response_parser, ProviderClient};
use crate::config::Config;
use crate::error::{AppResult, GenerationError};
use crate::models::{ArticleOutput, GenerationParams, ProviderKind, StageOutput};

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.google_api_key.clone(),
            api_base: config.google_api_base.clone(),
            model: config.google_model.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// 使用单次请求提供的 API Key 覆盖配置值
    pub fn with_api_key_override(mut self, api_key: Option<&str>) -> Self {
        if let Some(key) = api_key {
            if !key.is_empty() {
                self.api_key = key.to_string();
            }
        }
        self
    }

    /// 发送一次 generateContent 请求，返回 (内容, 消耗 token 数)
    async fn generate(
        &self,
        system_text: &str,
        user_text: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> AppResult<(String, u64)> {
        if self.api_key.is_empty() {
            return Err(GenerationError::ProviderUnavailable {
                provider: ProviderKind::Gemini,
            });
        }

        debug!("调用 Gemini API，模型: {}", self.model);

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = json!({
            "contents": [
                {
                    "parts": [
                        { "text": system_text },
                        { "text": user_text }
                    ]
                }
            ],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_output_tokens
            }
        });

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Gemini API 请求失败: {}", e);
                GenerationError::Provider {
                    provider: ProviderKind::Gemini,
                    status: None,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let data: JsonValue = response.json().await.map_err(|e| GenerationError::Provider {
            provider: ProviderKind::Gemini,
            status: Some(status.as_u16()),
            message: format!("响应解析失败: {}", e),
        })?;

        if !status.is_success() {
            let message = data["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string();
            warn!("Gemini API 错误 ({}): {}", status.as_u16(), message);
            return Err(GenerationError::Provider {
                provider: ProviderKind::Gemini,
                status: Some(status.as_u16()),
                message: format!("({}) {}", status.as_u16(), message),
            });
        }

        let content = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        let tokens_used = data["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0);

        debug!("Gemini API 调用成功，消耗 {} tokens", tokens_used);

        Ok((content, tokens_used))
    }

    fn seo_analysis_system(&self, params: &GenerationParams) -> String {
        format!(
            "You are a leading SEO strategist with deep understanding of web search semantics.\n\n\
             Parameters:\n\
             - Query: {}\n\
             - Country: {}\n\
             - Language: {}\n\
             - Page Type: {}\n\
             - Required Keywords: {}\n\n\
             Perform comprehensive SEO analysis: intent, SERP, structure, keywords.",
            params.keyword,
            params.country,
            params.language,
            params.page_type,
            required_keywords_text(params),
        )
    }

    fn simple_article_system(&self, params: &GenerationParams) -> String {
        let required_keywords = if params.required_keywords.is_empty() {
            String::new()
        } else {
            format!("- Required keywords: {}\n", params.required_keywords.join(", "))
        };
        format!(
            "You are a professional SEO copywriter.\n\n\
             Requirements:\n\
             - Language: {}\n\
             - Country: {}\n\
             - Word Count: {}\n\
             - Page Type: {}\n\
             {}\n\
             Format: HTML (h1-h3, p, ul, li). At the end add \
             <json>{{\"meta_titles\": [\"...\", \"...\", \"...\", \"...\", \"...\"], \
             \"meta_descriptions\": [\"...\", \"...\", \"...\", \"...\", \"...\"]}}</json> \
             block with 5 variants.",
            params.language, params.country, params.word_count, params.page_type, required_keywords,
        )
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn analyze(&self, params: &GenerationParams) -> AppResult<StageOutput> {
        debug!("Gemini SEO 分析开始: {}", params.keyword);
        let (text, tokens_used) = self
            .generate(
                &self.seo_analysis_system(params),
                &format!("Analyze the query: {}", params.keyword),
                0.7,
                4000,
            )
            .await?;
        Ok(StageOutput { text, tokens_used })
    }

    async fn build_prompt(
        &self,
        analysis: &str,
        params: &GenerationParams,
    ) -> AppResult<StageOutput> {
        let system = format!(
            "You are an expert in creating prompts for SEO articles in {}. \
             Target: {} words. Create detailed prompt with role, H1-H3 structure, tone, keywords.",
            params.language, params.word_count,
        );
        let user = format!(
            "SEO Analysis:\n{}\n\nCreate a detailed prompt for writing the article.",
            analysis
        );
        let (text, tokens_used) = self.generate(&system, &user, 0.8, 3000).await?;
        Ok(StageOutput { text, tokens_used })
    }

    async fn write_article(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> AppResult<ArticleOutput> {
        let _ = params;
        let (content, tokens_used) = self
            .generate(
                prompt,
                "Write the article according to all requirements in the prompt. \
                 Output valid HTML. Add JSON metadata at the end.",
                0.9,
                8000,
            )
            .await?;
        Ok(response_parser::parse_article(&content, tokens_used))
    }

    async fn write_simple_article(&self, params: &GenerationParams) -> AppResult<ArticleOutput> {
        debug!("Gemini 单步文章生成开始: {}", params.keyword);
        let (content, tokens_used) = self
            .generate(
                &self.simple_article_system(params),
                &format!("Write an expert article about: {}", params.keyword),
                0.85,
                8000,
            )
            .await?;
        Ok(response_parser::parse_article(&content, tokens_used))
    }

    async fn test_connection(&self) -> AppResult<()> {
        self.generate("You are a connectivity probe.", "Test connection", 0.0, 16)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = GeminiClient::new(&Config::default());
        let params = GenerationParams {
            keyword: "test".to_string(),
            required_keywords: vec![],
            language: "English".to_string(),
            country: "US".to_string(),
            page_type: "article".to_string(),
            word_count: 1000,
            openai_api_key: None,
            google_api_key: None,
        };
        let err = client.write_simple_article(&params).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ProviderUnavailable {
                provider: ProviderKind::Gemini
            }
        ));
    }

    #[test]
    fn test_api_key_override() {
        let mut config = Config::default();
        config.google_api_key = "config-key".to_string();
        let client = GeminiClient::new(&config).with_api_key_override(Some("request-key"));
        assert_eq!(client.api_key, "request-key");
    }
}
