//! 结果汇总与失败解释
//!
//! 提示模板只对未通过的规则展开，所需事实从本次运行的 Almanac 读取，
//! 与评估时使用的值一致。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::almanac::Almanac;
use crate::engine::RunResult;
use crate::error::Result;
use crate::hint;
use crate::models::{InputBounds, RuleResult};

/// 未通过规则的解释
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// 事件类型
    pub name: String,
    pub description: Option<String>,
    /// 展开后的提示，规则没有提示时为 None
    pub expanded_hint: Option<String>,
    /// 申报值的有效范围，未声明时为空对象
    pub input_bounds: Value,
}

/// 所有规则都通过
pub fn all_pass(results: &[RuleResult], rule_count: usize) -> bool {
    success_count(results) == rule_count
}

/// 部分规则通过（至少一条通过，且不是全部）
pub fn some_pass(results: &[RuleResult], rule_count: usize) -> bool {
    let passed = success_count(results);
    passed > 0 && passed < rule_count
}

fn success_count(results: &[RuleResult]) -> usize {
    results.iter().filter(|r| r.passed()).count()
}

/// 解释单条未通过的规则
///
/// 提示或范围事实无法解析时记录告警并降级（原始模板、空范围），不影响其他规则的解释。
pub async fn explain_failure(result: &RuleResult, almanac: &Almanac) -> FailureReport {
    let params = &result.event.params;

    let expanded_hint = match params.hint.as_deref() {
        None => None,
        Some(template) => match hint::expand(template, almanac).await {
            Ok(expanded) => Some(expanded),
            Err(e) => {
                warn!(rule = %result.name, error = %e, "提示展开失败，使用原始模板");
                Some(template.to_string())
            }
        },
    };

    let input_bounds = match &params.input_bounds {
        None => Value::Object(Map::new()),
        Some(InputBounds::Literal(bounds)) => Value::Object(bounds.clone()),
        Some(InputBounds::Fact(name)) => match almanac.fact_value(name).await {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!(rule = %result.name, fact = %name, error = %e, "输入范围解析失败");
                Value::Object(Map::new())
            }
        },
    };

    FailureReport {
        name: result.event.event_type.clone(),
        description: params.description.clone(),
        expanded_hint,
        input_bounds,
    }
}

/// 收集所有未通过规则的解释，按评估顺序
pub async fn collect_failures(run: &RunResult) -> Vec<FailureReport> {
    let mut reports = Vec::new();
    for result in run.failures() {
        reports.push(explain_failure(result, run.almanac()).await);
    }

    debug!(failure_count = reports.len(), "失败解释已生成");
    reports
}

/// 读取调用方请求的事实，与规则是否通过无关
///
/// 尚未解析的事实会在此时计算；未注册的事实名返回错误。
pub async fn collect_facts<S: AsRef<str>>(run: &RunResult, names: &[S]) -> Result<Map<String, Value>> {
    let mut facts = Map::new();
    for name in names {
        let name = name.as_ref();
        let value = run.almanac().fact_value(name).await?;
        facts.insert(name.to_string(), value);
    }
    Ok(facts)
}
