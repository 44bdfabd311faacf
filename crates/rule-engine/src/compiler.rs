//! 规则编译器
//!
//! 校验 JSON 规则的结构，并预先提取规则引用的事实，供执行器按优先级预取。

use crate::error::{Result, RuleError};
use crate::models::{Comparison, Condition, InputBounds, Rule, ValueSource};
use serde_json::Value;

/// 规则中引用的事实（名称 + 参数）
#[derive(Debug, Clone, PartialEq)]
pub struct FactUse {
    pub fact: String,
    pub params: Option<Value>,
}

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// 原始规则
    pub rule: Rule,
    /// 条件中引用的事实，按出现顺序去重
    pub required_facts: Vec<FactUse>,
    /// 规则在引擎中的声明序号
    pub index: usize,
}

impl CompiledRule {
    pub fn name(&self) -> &str {
        self.rule.name()
    }

    pub fn conditions(&self) -> &Condition {
        &self.rule.conditions
    }

    /// 评估顺序的排序键，优先级高者在前，其次按声明顺序
    pub fn sort_key(&self) -> (std::cmp::Reverse<u32>, usize) {
        (std::cmp::Reverse(self.rule.priority.unwrap_or(1)), self.index)
    }
}

/// 规则编译器
#[derive(Debug, Default)]
pub struct RuleCompiler {
    compiled: usize,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 字符串编译规则
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledRule> {
        let rule: Rule =
            serde_json::from_str(json).map_err(|e| RuleError::ParseError(e.to_string()))?;
        self.compile(rule)
    }

    /// 编译规则
    pub fn compile(&mut self, rule: Rule) -> Result<CompiledRule> {
        self.validate_rule(&rule)?;

        let mut required_facts = Vec::new();
        collect_facts(&rule.conditions, &mut required_facts);

        let index = self.compiled;
        self.compiled += 1;

        Ok(CompiledRule {
            rule,
            required_facts,
            index,
        })
    }

    /// 验证规则结构
    fn validate_rule(&self, rule: &Rule) -> Result<()> {
        if rule.event.event_type.trim().is_empty() {
            return Err(RuleError::ParseError("事件类型不能为空".to_string()));
        }

        if let Some(InputBounds::Fact(name)) = &rule.event.params.input_bounds
            && name.trim().is_empty()
        {
            return Err(RuleError::ParseError(format!(
                "规则 '{}' 的 inputBounds 事实名不能为空",
                rule.name()
            )));
        }

        self.validate_node(&rule.conditions, "conditions")
    }

    /// 验证条件节点
    fn validate_node(&self, node: &Condition, path: &str) -> Result<()> {
        match node {
            Condition::Leaf(cmp) => self.validate_comparison(cmp, path),
            Condition::All { .. } | Condition::Any { .. } => {
                let Some((operator, children)) = node.group() else {
                    return Ok(());
                };
                if children.is_empty() {
                    return Err(RuleError::ParseError(format!(
                        "逻辑组 '{}' ({}) 不能为空",
                        path, operator
                    )));
                }

                for (i, child) in children.iter().enumerate() {
                    let child_path = format!("{}.{}[{}]", path, operator, i);
                    self.validate_node(child, &child_path)?;
                }
                Ok(())
            }
        }
    }

    /// 验证比较条件
    fn validate_comparison(&self, cmp: &Comparison, path: &str) -> Result<()> {
        if cmp.fact.trim().is_empty() {
            return Err(RuleError::ParseError(format!(
                "条件 '{}' 的事实名不能为空",
                path
            )));
        }

        match &cmp.value {
            ValueSource::Fact(reference) if reference.fact.trim().is_empty() => {
                Err(RuleError::ParseError(format!(
                    "条件 '{}' 引用的事实名不能为空",
                    path
                )))
            }
            ValueSource::Literal(value) if cmp.operator.expects_array() && !value.is_array() => {
                Err(RuleError::ParseError(format!(
                    "条件 '{}' 的 {} 操作符需要数组值",
                    path, cmp.operator
                )))
            }
            ValueSource::Literal(value)
                if cmp.operator.is_numeric() && !(value.is_number() || value.is_null()) =>
            {
                Err(RuleError::ParseError(format!(
                    "条件 '{}' 的 {} 操作符需要数值，实际为 {}",
                    path, cmp.operator, value
                )))
            }
            _ => Ok(()),
        }
    }
}

/// 递归收集条件中引用的事实
fn collect_facts(node: &Condition, facts: &mut Vec<FactUse>) {
    let mut push = |fact: &str, params: &Option<Value>| {
        let usage = FactUse {
            fact: fact.to_string(),
            params: params.clone(),
        };
        if !facts.contains(&usage) {
            facts.push(usage);
        }
    };

    match node {
        Condition::Leaf(cmp) => {
            push(&cmp.fact, &cmp.params);
            if let ValueSource::Fact(reference) = &cmp.value {
                push(&reference.fact, &reference.params);
            }
        }
        Condition::All { all: children } | Condition::Any { any: children } => {
            for child in children {
                collect_facts(child, facts);
            }
        }
    }
}
