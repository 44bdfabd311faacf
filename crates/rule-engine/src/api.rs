//! 一次性调用入口
//!
//! 每次调用用内置事实构造引擎并执行一次评估，适合不需要订阅事件的调用方。

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::engine::{Engine, RunOptions, RunResult};
use crate::error::Result;
use crate::explain::{self, FailureReport};
use crate::models::{EmittedEvent, Rule};

/// `run_engine` 的输出
#[derive(Debug, Clone, Serialize)]
pub struct EngineOutput {
    /// 每条规则一个事件，按评估顺序
    pub events: Vec<EmittedEvent>,
    /// 调用方请求的事实
    pub facts: Map<String, Value>,
}

impl EngineOutput {
    /// 通过的事件
    pub fn successes(&self) -> impl Iterator<Item = &EmittedEvent> {
        self.events.iter().filter(|e| e.outcome.is_success())
    }
}

async fn evaluate(rules: &[Rule], options: RunOptions) -> Result<RunResult> {
    Engine::with_default_facts(rules.to_vec())?.run(options).await
}

/// 校验地块、评估所有规则，并返回事件及请求的事实
#[instrument(skip_all, fields(rule_count = rules.len(), output_facts = ?output_facts))]
pub async fn run_engine<S: AsRef<str> + std::fmt::Debug>(
    rules: &[Rule],
    options: RunOptions,
    output_facts: &[S],
) -> Result<EngineOutput> {
    let run = evaluate(rules, options).await?;
    let facts = explain::collect_facts(&run, output_facts).await?;

    Ok(EngineOutput {
        events: run.events(),
        facts,
    })
}

/// 所有规则都通过
pub async fn all_rules_pass(rules: &[Rule], options: RunOptions) -> Result<bool> {
    let run = evaluate(rules, options).await?;
    Ok(explain::all_pass(&run.results, rules.len()))
}

/// 部分规则通过
pub async fn some_rules_pass(rules: &[Rule], options: RunOptions) -> Result<bool> {
    let run = evaluate(rules, options).await?;
    Ok(explain::some_pass(&run.results, rules.len()))
}

/// 返回未通过规则的解释
pub async fn run_rules(rules: &[Rule], options: RunOptions) -> Result<Vec<FailureReport>> {
    let run = evaluate(rules, options).await?;
    Ok(explain::collect_failures(&run).await)
}
