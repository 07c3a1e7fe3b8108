use anyhow::{bail, Result};
use article_generator::{utils::logging, App, Config, GenerationParams};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 命令行：<场景名> <关键词>...
    let mut args = std::env::args().skip(1);
    let Some(scenario) = args.next() else {
        bail!("用法: article_generator <场景名> <关键词>...");
    };
    let keywords: Vec<String> = args.collect();
    if keywords.is_empty() {
        bail!("至少提供一个关键词");
    }

    let batch: Vec<GenerationParams> = keywords
        .into_iter()
        .map(|keyword| GenerationParams {
            keyword,
            ..Default::default()
        })
        .collect();

    let app = App::new(config);
    let stats = app.run_batch(&scenario, batch).await?;

    if stats.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
