//! 生成结果解析器
//!
//! 纯函数，与具体生成服务无关：两个服务的原始输出都走同一套解析。
//!
//! 提取内容：
//! 1. 末尾的 `<json>...</json>` 元数据块（meta 标题 / meta 描述各最多 5 个）
//! 2. 文档标题：优先 `<h1>`，其次第一个 Markdown 一级标题
//! 3. meta 变体缺失时的兜底：标题本身 / 去标记后前 150 字符的纯文本预览
//! 4. 去除标记后的词数统计

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ArticleOutput, ParsedArticle};

static JSON_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<json>(.*?)</json>").unwrap());
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?si)<h1[^>]*>(.*?)</h1>").unwrap());
static MD_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());
static META_TITLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(?:meta[ _-]?title|мета-тайтл)[^:\n]*:\s*(.+)$").unwrap()
});
static META_DESC_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(?:meta[ _-]?description|мета-дескрипшен)[^:\n]*:\s*(.+)$").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// 最多保留的 meta 变体数量
const MAX_META_VARIANTS: usize = 5;
/// 兜底 meta 描述的预览长度（字符）
const META_PREVIEW_CHARS: usize = 150;

/// 解析原始生成输出
pub fn parse_article(raw_content: &str, tokens_used: u64) -> ArticleOutput {
    let (content, mut meta_titles, mut meta_descriptions) = extract_json_block(raw_content);

    let title = extract_title(&content);

    // <json> 块缺失时尝试按行标注的变体
    if meta_titles.is_empty() {
        meta_titles = extract_labeled_lines(&META_TITLE_LINE_RE, &content);
    }
    if meta_descriptions.is_empty() {
        meta_descriptions = extract_labeled_lines(&META_DESC_LINE_RE, &content);
    }

    meta_titles.truncate(MAX_META_VARIANTS);
    meta_descriptions.truncate(MAX_META_VARIANTS);

    if meta_titles.is_empty() {
        meta_titles = vec![title.clone()];
    }
    if meta_descriptions.is_empty() {
        meta_descriptions = vec![plain_text_preview(&content, META_PREVIEW_CHARS)];
    }

    let word_count = count_words(&strip_tags(&content));

    ArticleOutput {
        article: ParsedArticle {
            title,
            content: content.trim().to_string(),
            meta_titles,
            meta_descriptions,
            word_count,
        },
        tokens_used,
    }
}

/// 去除 HTML 标记
pub fn strip_tags(content: &str) -> String {
    TAG_RE.replace_all(content, "").into_owned()
}

/// 统计词数：按空白切分，只计包含字母或数字的词
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .count()
}

/// 提取并移除 `<json>` 元数据块
fn extract_json_block(content: &str) -> (String, Vec<String>, Vec<String>) {
    let Some(captures) = JSON_BLOCK_RE.captures(content) else {
        return (content.to_string(), Vec::new(), Vec::new());
    };

    let mut meta_titles = Vec::new();
    let mut meta_descriptions = Vec::new();

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&captures[1]) {
        meta_titles = string_array(&json["meta_titles"]);
        meta_descriptions = string_array(&json["meta_descriptions"]);
    }

    let remaining = content.replacen(&captures[0], "", 1);
    (remaining, meta_titles, meta_descriptions)
}

fn string_array(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn extract_title(content: &str) -> String {
    if let Some(captures) = H1_RE.captures(content) {
        let title = strip_tags(&captures[1]).trim().to_string();
        if !title.is_empty() {
            return title;
        }
    }
    if let Some(captures) = MD_TITLE_RE.captures(content) {
        return captures[1].trim().to_string();
    }
    "Untitled Article".to_string()
}

fn extract_labeled_lines(re: &Regex, content: &str) -> Vec<String> {
    re.captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// 去标记后的纯文本预览，按字符截断避免切坏多字节字符
fn plain_text_preview(content: &str, max_chars: usize) -> String {
    strip_tags(content)
        .trim()
        .chars()
        .take(max_chars)
        .collect()
}
