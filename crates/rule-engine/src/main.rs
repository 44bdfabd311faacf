//! 地块资格评估命令行
//!
//! 用法：`parcel-rules <request.json>`，请求文件为 `-` 时从标准输入读取。
//!
//! 请求格式：
//! ```json
//! { "rules": ["perimeter"], "options": { "parcel": {...}, "quantity": 70 }, "outputFacts": ["perimeterBounds"] }
//! ```
//! `rules` 为空时评估目录中的全部规则。

use std::io::Read;

use anyhow::{Context, Result, bail};
use parcel_shared::config::AppConfig;
use parcel_shared::observability;
use rule_engine::{Engine, RuleCatalog, RunOptions, collect_facts, collect_failures};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// 评估请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    #[serde(default)]
    rules: Vec<String>,
    options: RunOptions,
    #[serde(default)]
    output_facts: Vec<String>,
}

fn read_request(source: &str) -> Result<Request> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("读取标准输入失败")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("读取请求文件失败: {}", source))?
    };
    serde_json::from_str(&raw).context("请求格式错误")
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("parcel-rules").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config.observability.clone().with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    let Some(source) = std::env::args().nth(1) else {
        bail!("用法: parcel-rules <request.json | ->");
    };
    let request = read_request(&source)?;

    let mut catalog = RuleCatalog::builtin()?;
    if let Some(dir) = &config.engine.rules_dir {
        catalog.load_dir(dir)?;
    }

    let rules = if request.rules.is_empty() {
        catalog.all()
    } else {
        catalog.select(&request.rules)?
    };
    info!(rules = rules.len(), explain = config.engine.explain, "开始评估");

    let engine = Engine::with_default_facts(rules)?.with_explain(config.engine.explain);
    let run = engine.run(request.options).await?;

    let facts = collect_facts(&run, &request.output_facts).await?;
    let failures = collect_failures(&run).await;

    let output = json!({
        "events": run.events(),
        "facts": facts,
        "failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
