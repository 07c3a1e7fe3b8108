//! OpenAI 生成服务客户端
//!
//! 使用 `async-openai` crate 进行 API 调用，支持自定义端点与模型。
//! 各阶段的采样温度与 token 上限是固定的生成策略，不随请求变化。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::clients::{required_keywords_text, response_parser, ProviderClient};
use crate::config::Config;
use crate::error::{AppResult, GenerationError};
use crate::models::{ArticleOutput, GenerationParams, ProviderKind, StageOutput};

/// OpenAI 客户端
pub struct OpenAiClient {
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.openai_api_key.clone(),
            api_base: config.openai_api_base.clone(),
            model: config.openai_model.clone(),
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

    /// 发送一次对话补全请求，返回 (内容, 消耗 token 数)
    async fn chat(
        &self,
        system_message: &str,
        user_message: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<(String, u64)> {
        if self.api_key.is_empty() {
            return Err(GenerationError::ProviderUnavailable {
                provider: ProviderKind::OpenAi,
            });
        }

        debug!("调用 OpenAI API，模型: {}", self.model);

        let openai_config = OpenAIConfig::new()
            .with_api_key(&self.api_key)
            .with_api_base(&self.api_base);
        let client = Client::with_config(openai_config);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(|e| self.provider_error(e.to_string()))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.provider_error(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| self.provider_error(e.to_string()))?;

        let response = client.chat().create(request).await.map_err(|e| {
            warn!("OpenAI API 调用失败: {}", e);
            self.provider_error(e.to_string())
        })?;

        let tokens_used = response
            .usage
            .as_ref()
            .map(|u| u64::from(u.total_tokens))
            .unwrap_or(0);

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        debug!("OpenAI API 调用成功，消耗 {} tokens", tokens_used);

        Ok((content.trim().to_string(), tokens_used))
    }

    fn provider_error(&self, message: String) -> GenerationError {
        GenerationError::Provider {
            provider: ProviderKind::OpenAi,
            status: None,
            message,
        }
    }

    fn seo_analysis_system(&self, params: &GenerationParams) -> String {
        format!(
            "You are a leading SEO strategist with deep understanding of web search semantics, \
             modern search AI architectures, entities, ontologies and knowledge graphs.\n\n\
             Parameters:\n\
             - Query: {}\n\
             - Country: {}\n\
             - Language: {}\n\
             - Page Type: {}\n\
             - Required Keywords: {}\n\n\
             Perform comprehensive SEO analysis: SERP content types, query interpretation and \
             intent, article structure (H1-H3 hierarchy), keywords and LSI, mandatory sections. \
             Finish with 5 meta title variants (50-58 characters) and 5 meta description \
             variants (140-155 characters).",
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
impl ProviderClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn analyze(&self, params: &GenerationParams) -> AppResult<StageOutput> {
        debug!("OpenAI SEO 分析开始: {}", params.keyword);
        let (text, tokens_used) = self
            .chat(
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
             Target length: {} words. Create a detailed prompt including the copywriter role, \
             article goal, target audience, tone and style, detailed H1-H3 structure, \
             keywords to use and special instructions.",
            params.language, params.word_count,
        );
        let user = format!(
            "SEO Analysis:\n{}\n\nCreate a detailed prompt for writing the article.",
            analysis
        );
        let (text, tokens_used) = self.chat(&system, &user, 0.8, 3000).await?;
        Ok(StageOutput { text, tokens_used })
    }

    async fn write_article(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> AppResult<ArticleOutput> {
        let _ = params;
        let (content, tokens_used) = self
            .chat(
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
        debug!("OpenAI 单步文章生成开始: {}", params.keyword);
        let (content, tokens_used) = self
            .chat(
                &self.simple_article_system(params),
                &format!("Write an expert article about: {}", params.keyword),
                0.85,
                8000,
            )
            .await?;
        Ok(response_parser::parse_article(&content, tokens_used))
    }

    async fn test_connection(&self) -> AppResult<()> {
        self.chat("You are a connectivity probe.", "Test connection", 0.0, 16)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> GenerationParams {
        GenerationParams {
            keyword: "coffee grinder".to_string(),
            required_keywords: vec!["burr".to_string(), "espresso".to_string()],
            language: "English".to_string(),
            country: "US".to_string(),
            page_type: "product page".to_string(),
            word_count: 1500,
            openai_api_key: None,
            google_api_key: None,
        }
    }

    #[test]
    fn test_api_key_override() {
        let mut config = Config::default();
        config.openai_api_key = "sk-config".to_string();

        let client = OpenAiClient::new(&config).with_api_key_override(Some("sk-request"));
        assert_eq!(client.api_key, "sk-request");

        // None / 空串不覆盖
        let client = OpenAiClient::new(&config).with_api_key_override(None);
        assert_eq!(client.api_key, "sk-config");
        let client = OpenAiClient::new(&config).with_api_key_override(Some(""));
        assert_eq!(client.api_key, "sk-config");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = OpenAiClient::new(&Config::default());
        let err = client.analyze(&test_params()).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ProviderUnavailable {
                provider: ProviderKind::OpenAi
            }
        ));
    }

    #[test]
    fn test_prompts_embed_parameters() {
        let mut config = Config::default();
        config.openai_api_key = "sk-test".to_string();
        let client = OpenAiClient::new(&config);
        let params = test_params();

        let analysis = client.seo_analysis_system(&params);
        assert!(analysis.contains("coffee grinder"));
        assert!(analysis.contains("US"));
        assert!(analysis.contains("burr, espresso"));

        let simple = client.simple_article_system(&params);
        assert!(simple.contains("1500"));
        assert!(simple.contains("<json>"));
    }
}
