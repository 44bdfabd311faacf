//! 规则引擎
//!
//! 引擎在构造时编译规则，之后只读，可通过 `Arc` 在多个任务间共享。
//! 每次运行：
//!
//! ```text
//! Initialized -> Validating -> ValidationFailed
//!                           -> Evaluating (逐条规则) -> Completed
//! ```
//!
//! 每次运行创建独立的 [`Almanac`]，运行之间不共享事实缓存。

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::almanac::Almanac;
use crate::compiler::{CompiledRule, RuleCompiler};
use crate::error::Result;
use crate::executor::RuleExecutor;
use crate::facts::calendar::DATE_FORMAT;
use crate::facts::{FactRegistry, names, number};
use crate::listener::{FnListener, RuleListener};
use crate::models::{EmittedEvent, Outcome, Rule, RuleEvent, RuleResult};
use crate::schema::ParcelSchema;

/// 单次运行的输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// 待评估的地块（原始 JSON，运行前做 schema 校验）
    #[serde(default)]
    pub parcel: Value,
    /// 申报数量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    /// 计算年份差的基准日期，缺省为当天
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_years_threshold: Option<f64>,
    /// 其他运行时事实
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunOptions {
    pub fn new(parcel: Value) -> Self {
        Self {
            parcel,
            ..Self::default()
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_action(mut self, action_id: impl Into<String>, years_threshold: f64) -> Self {
        self.action_id = Some(action_id.into());
        self.action_years_threshold = Some(years_threshold);
        self
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// 额外的运行时事实
    pub fn with_fact(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// 生成本次运行的 Almanac，未提供的可选值不注册为事实
    fn into_almanac(self, registry: Arc<FactRegistry>) -> Almanac {
        let reference_date = self
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());

        let mut almanac = Almanac::new(registry)
            .with_runtime_fact(names::PARCEL, self.parcel)
            .with_runtime_fact(
                names::REFERENCE_DATE,
                Value::String(reference_date.format(DATE_FORMAT).to_string()),
            );

        if let Some(quantity) = self.quantity {
            almanac.add_runtime_fact(names::QUANTITY, number(quantity));
        }
        if let Some(tolerance) = self.tolerance {
            almanac.add_runtime_fact(names::TOLERANCE, number(tolerance));
        }
        if let Some(action_id) = self.action_id {
            almanac.add_runtime_fact(names::ACTION_ID, Value::String(action_id));
        }
        if let Some(threshold) = self.action_years_threshold {
            almanac.add_runtime_fact(names::ACTION_YEARS_THRESHOLD, number(threshold));
        }
        for (name, value) in self.extra {
            almanac.add_runtime_fact(name, value);
        }

        almanac
    }
}

/// 单次运行的结果
#[derive(Debug)]
pub struct RunResult {
    /// 每条规则一个结果，按评估顺序
    pub results: Vec<RuleResult>,
    almanac: Almanac,
}

impl RunResult {
    /// 本次运行的事实解析器，可继续查询任意事实
    pub fn almanac(&self) -> &Almanac {
        &self.almanac
    }

    /// 发出的事件（成功与失败）
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.results.iter().map(EmittedEvent::from).collect()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn rule_count(&self) -> usize {
        self.results.len()
    }

    /// 未通过的规则
    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

/// 规则引擎
pub struct Engine {
    /// 按评估顺序排列
    rules: Vec<CompiledRule>,
    registry: Arc<FactRegistry>,
    schema: Arc<ParcelSchema>,
    executor: RuleExecutor,
    listeners: Vec<Arc<dyn RuleListener>>,
}

impl Engine {
    /// 编译规则并创建引擎
    pub fn new(rules: Vec<Rule>, registry: FactRegistry) -> Result<Self> {
        let mut compiler = RuleCompiler::new();
        let mut compiled = rules
            .into_iter()
            .map(|rule| compiler.compile(rule))
            .collect::<Result<Vec<_>>>()?;
        compiled.sort_by_key(CompiledRule::sort_key);

        info!(
            rule_count = compiled.len(),
            fact_count = registry.len(),
            "规则引擎初始化完成"
        );

        Ok(Self {
            rules: compiled,
            registry: Arc::new(registry),
            schema: Arc::new(ParcelSchema::new()?),
            executor: RuleExecutor::new(),
            listeners: Vec::new(),
        })
    }

    /// 使用内置事实创建引擎
    pub fn with_default_facts(rules: Vec<Rule>) -> Result<Self> {
        Self::new(rules, FactRegistry::with_defaults())
    }

    /// 启用解释模式：被短路的条件也会评估并记录
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.executor = if explain {
            RuleExecutor::new().with_explain()
        } else {
            RuleExecutor::new()
        };
        self
    }

    /// 替换地块 schema
    pub fn with_schema(mut self, schema: ParcelSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    /// 订阅规则事件
    pub fn subscribe(&mut self, listener: Arc<dyn RuleListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// 规则通过时调用闭包
    pub fn on_success<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&RuleEvent, &Almanac, &RuleResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener::new(Outcome::Success, handler)))
    }

    /// 规则未通过时调用闭包
    pub fn on_failure<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&RuleEvent, &Almanac, &RuleResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener::new(Outcome::Failure, handler)))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 按评估顺序返回规则
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn registry(&self) -> &FactRegistry {
        &self.registry
    }

    /// 执行一次评估
    #[instrument(skip(self, options), fields(run_id = %Uuid::new_v4(), rule_count = self.rules.len()))]
    pub async fn run(&self, options: RunOptions) -> Result<RunResult> {
        debug!(state = "initialized", "运行开始");

        info!(state = "validating", "校验地块");
        if let Err(e) = self.schema.validate(&options.parcel) {
            info!(state = "validation_failed", error = %e, "地块校验失败，跳过规则评估");
            return Err(e);
        }

        let almanac = options.into_almanac(self.registry.clone());

        info!(state = "evaluating", "开始评估规则");
        let mut results = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let result = self.executor.execute(rule, &almanac).await?;
            self.notify(&result, &almanac).await;
            results.push(result);
        }

        let run = RunResult { results, almanac };
        info!(
            state = "completed",
            success_count = run.success_count(),
            failure_count = run.rule_count() - run.success_count(),
            "运行完成"
        );
        Ok(run)
    }

    /// 通知监听器，错误只记录不传播
    async fn notify(&self, result: &RuleResult, almanac: &Almanac) {
        for listener in &self.listeners {
            let outcome = match result.outcome {
                Outcome::Success => listener.on_success(&result.event, almanac, result).await,
                Outcome::Failure => listener.on_failure(&result.event, almanac, result).await,
            };

            if let Err(e) = outcome {
                warn!(rule = %result.name, outcome = ?result.outcome, error = %e, "监听器执行失败");
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("registry", &self.registry)
            .field("listeners", &self.listeners.len())
            .field("explain", &self.executor.explain())
            .finish()
    }
}
