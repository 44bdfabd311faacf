//! 规则执行器
//!
//! 对一条编译后的规则求值：先按事实优先级预取条件引用的事实，再对条件树做短路求值，
//! 返回评估结论和结果树。启用解释模式时，组内所有子节点都会被评估，结论不变。

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, trace};

use crate::almanac::Almanac;
use crate::compiler::CompiledRule;
use crate::error::Result;
use crate::evaluator::ConditionEvaluator;
use crate::models::{Comparison, Condition, ConditionResult, Outcome, RuleResult, ValueSource};
use crate::operators::LogicalOperator;

/// 规则执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleExecutor {
    /// 是否评估被短路的子节点
    explain: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用解释模式
    pub fn with_explain(mut self) -> Self {
        self.explain = true;
        self
    }

    pub fn explain(&self) -> bool {
        self.explain
    }

    /// 执行规则评估
    pub async fn execute(&self, rule: &CompiledRule, almanac: &Almanac) -> Result<RuleResult> {
        self.prefetch(rule, almanac).await?;

        let conditions = self.evaluate_node(rule.conditions(), almanac, "conditions").await?;
        let outcome = if conditions.result() == Some(true) {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        debug!(rule = %rule.name(), outcome = ?outcome, "规则评估完成");

        Ok(RuleResult {
            name: rule.name().to_string(),
            outcome,
            event: rule.rule.event.clone(),
            conditions,
        })
    }

    /// 按（优先级，声明顺序）解析规则引用的事实
    async fn prefetch(&self, rule: &CompiledRule, almanac: &Almanac) -> Result<()> {
        let mut facts: Vec<_> = rule.required_facts.iter().collect();
        facts.sort_by_key(|usage| {
            (
                almanac.priority(&usage.fact).unwrap_or(u32::MAX),
                almanac.declaration_order(&usage.fact),
            )
        });

        for usage in facts {
            trace!(rule = %rule.name(), fact = %usage.fact, "预取事实");
            almanac
                .fact_value_with(&usage.fact, usage.params.as_ref())
                .await?;
        }
        Ok(())
    }

    /// 递归评估条件节点
    fn evaluate_node<'a>(
        &'a self,
        node: &'a Condition,
        almanac: &'a Almanac,
        path: &'a str,
    ) -> BoxFuture<'a, Result<ConditionResult>> {
        async move {
            match node {
                Condition::Leaf(cmp) => self.evaluate_comparison(cmp, almanac, path).await,
                Condition::All { all: children } => {
                    self.evaluate_group(LogicalOperator::All, children, almanac, path)
                        .await
                }
                Condition::Any { any: children } => {
                    self.evaluate_group(LogicalOperator::Any, children, almanac, path)
                        .await
                }
            }
        }
        .boxed()
    }

    /// 评估叶子比较
    async fn evaluate_comparison(
        &self,
        cmp: &Comparison,
        almanac: &Almanac,
        path: &str,
    ) -> Result<ConditionResult> {
        let fact_result = almanac
            .fact_value_at(&cmp.fact, cmp.path.as_deref(), cmp.params.as_ref())
            .await?;

        let value = match &cmp.value {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::Fact(reference) => almanac
                .fact_value_at(
                    &reference.fact,
                    reference.path.as_deref(),
                    reference.params.as_ref(),
                )
                .await?
                .unwrap_or(Value::Null),
        };

        let matched = ConditionEvaluator::evaluate(fact_result.as_ref(), cmp.operator, &value)?;

        debug!(
            path = %path,
            fact = %cmp.fact,
            operator = %cmp.operator,
            value = %value,
            matched,
            "条件评估"
        );

        Ok(ConditionResult::Leaf {
            fact: cmp.fact.clone(),
            path: cmp.path.clone(),
            operator: cmp.operator,
            value,
            fact_result,
            result: Some(matched),
        })
    }

    /// 评估逻辑组（短路求值）
    async fn evaluate_group(
        &self,
        operator: LogicalOperator,
        children: &[Condition],
        almanac: &Almanac,
        path: &str,
    ) -> Result<ConditionResult> {
        // all 遇到 false、any 遇到 true 即可确定结论
        let decisive = operator == LogicalOperator::Any;
        let mut decided: Option<bool> = None;
        let mut results = Vec::with_capacity(children.len());

        for (i, child) in children.iter().enumerate() {
            if decided.is_some() && !self.explain {
                results.push(skipped(child));
                continue;
            }

            let child_path = format!("{}.{}[{}]", path, operator, i);
            let child_result = self.evaluate_node(child, almanac, &child_path).await?;

            if decided.is_none() && child_result.result() == Some(decisive) {
                trace!(path = %path, index = i, "{} 组短路", operator);
                decided = Some(decisive);
            }
            results.push(child_result);
        }

        // 空的 all 为 true，空的 any 为 false
        let result = decided.unwrap_or(!decisive);

        Ok(ConditionResult::Group {
            operator,
            result: Some(result),
            children: results,
        })
    }
}

/// 未评估节点的结果树
fn skipped(node: &Condition) -> ConditionResult {
    match node {
        Condition::Leaf(cmp) => ConditionResult::Leaf {
            fact: cmp.fact.clone(),
            path: cmp.path.clone(),
            operator: cmp.operator,
            value: match &cmp.value {
                ValueSource::Literal(value) => value.clone(),
                ValueSource::Fact(_) => Value::Null,
            },
            fact_result: None,
            result: None,
        },
        Condition::All { all: children } => ConditionResult::Group {
            operator: LogicalOperator::All,
            result: None,
            children: children.iter().map(skipped).collect(),
        },
        Condition::Any { any: children } => ConditionResult::Group {
            operator: LogicalOperator::Any,
            result: None,
            children: children.iter().map(skipped).collect(),
        },
    }
}
