//! 规则引擎领域模型
//!
//! 规则 JSON 采用 json-rules-engine 的结构：
//!
//! ```json
//! {
//!   "conditions": { "all": [ { "fact": "parcel", "path": "$.sssi", "operator": "equal", "value": false } ] },
//!   "event": { "type": "notSSSI", "params": { "description": "Parcel should not be in an SSSI" } }
//! }
//! ```

use crate::operators::{LogicalOperator, Operator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// 规则名称，缺省时使用事件类型
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 规则优先级，数值越大越先评估
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub conditions: Condition,
    pub event: RuleEvent,
}

impl Rule {
    pub fn new(conditions: Condition, event: RuleEvent) -> Self {
        Self {
            name: None,
            priority: None,
            conditions,
            event,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 规则名称（缺省为事件类型）
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.event.event_type)
    }
}

/// 条件节点：`all` / `any` 组合或叶子比较
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Leaf(Comparison),
}

impl Condition {
    pub fn all(children: Vec<Condition>) -> Self {
        Self::All { all: children }
    }

    pub fn any(children: Vec<Condition>) -> Self {
        Self::Any { any: children }
    }

    pub fn leaf(comparison: Comparison) -> Self {
        Self::Leaf(comparison)
    }

    /// 组合节点的逻辑符与子节点，叶子节点返回 None
    pub fn group(&self) -> Option<(LogicalOperator, &[Condition])> {
        match self {
            Self::All { all } => Some((LogicalOperator::All, all)),
            Self::Any { any } => Some((LogicalOperator::Any, any)),
            Self::Leaf(_) => None,
        }
    }
}

/// 叶子比较条件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub operator: Operator,
    #[serde(default)]
    pub value: ValueSource,
}

impl Comparison {
    pub fn new(fact: impl Into<String>, operator: Operator, value: impl Into<ValueSource>) -> Self {
        Self {
            fact: fact.into(),
            path: None,
            params: None,
            operator,
            value: value.into(),
        }
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// 比较右侧的取值：字面量或另一个事实的引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSource {
    Fact(FactRef),
    Literal(Value),
}

impl Default for ValueSource {
    fn default() -> Self {
        Self::Literal(Value::Null)
    }
}

impl From<Value> for ValueSource {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<FactRef> for ValueSource {
    fn from(fact: FactRef) -> Self {
        Self::Fact(fact)
    }
}

/// 事实引用 `{ "fact": "...", "path": "$.upper" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactRef {
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl FactRef {
    pub fn new(fact: impl Into<String>) -> Self {
        Self {
            fact: fact.into(),
            path: None,
            params: None,
        }
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// 规则关联的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub params: EventParams,
}

impl RuleEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            params: EventParams::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.params.description = Some(description.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.params.hint = Some(hint.into());
        self
    }

    pub fn with_input_bounds(mut self, bounds: InputBounds) -> Self {
        self.params.input_bounds = Some(bounds);
        self
    }
}

/// 事件参数，失败解释所需的信息都在这里
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 提示模板，包含 `${fact}` 或 `${fact.path}` 占位符
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_bounds: Option<InputBounds>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 输入范围：事实名（解析为 `{lower, upper}`）或字面量对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBounds {
    Fact(String),
    Literal(Map<String, Value>),
}

/// 规则评估结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// 条件评估结果树
///
/// `result` 为 None 表示该节点因短路未被评估。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionResult {
    Group {
        operator: LogicalOperator,
        result: Option<bool>,
        children: Vec<ConditionResult>,
    },
    Leaf {
        fact: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        operator: Operator,
        /// 解析后的右侧值
        value: Value,
        /// 解析后的左侧值，路径不存在时为 None
        fact_result: Option<Value>,
        result: Option<bool>,
    },
}

impl ConditionResult {
    pub fn result(&self) -> Option<bool> {
        match self {
            Self::Group { result, .. } | Self::Leaf { result, .. } => *result,
        }
    }

    /// 已评估且不满足的叶子条件
    pub fn unsatisfied_leaves(&self) -> Vec<&ConditionResult> {
        let mut leaves = Vec::new();
        self.collect_unsatisfied(&mut leaves);
        leaves
    }

    fn collect_unsatisfied<'a>(&'a self, out: &mut Vec<&'a ConditionResult>) {
        match self {
            Self::Group { children, .. } => {
                for child in children {
                    child.collect_unsatisfied(out);
                }
            }
            Self::Leaf { result, .. } => {
                if *result == Some(false) {
                    out.push(self);
                }
            }
        }
    }
}

/// 单条规则的评估结果
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub name: String,
    pub outcome: Outcome,
    pub event: RuleEvent,
    pub conditions: ConditionResult,
}

impl RuleResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// 对外发出的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedEvent {
    pub outcome: Outcome,
    #[serde(flatten)]
    pub event: RuleEvent,
}

impl From<&RuleResult> for EmittedEvent {
    fn from(result: &RuleResult) -> Self {
        Self {
            outcome: result.outcome,
            event: result.event.clone(),
        }
    }
}
