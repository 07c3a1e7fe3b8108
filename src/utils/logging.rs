/// 日志工具模块
///
/// 提供 tracing 初始化和日志格式化的辅助函数
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// 日志级别由 `RUST_LOG` 控制，未设置时默认 `info`。
/// 重复调用安全（测试场景下多次初始化只生效一次）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        // 按字符截断，不会切坏多字节文本
        assert_eq!(truncate_text("你好世界", 2), "你好...");
    }
}
