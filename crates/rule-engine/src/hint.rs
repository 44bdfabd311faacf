//! 失败提示模板
//!
//! 模板中的 `${fact}` 或 `${fact.path}` 占位符在规则失败后按需解析并替换，
//! 例如 `The claimed area of ${quantity} should be within the range (${areaBounds.lower} to ${areaBounds.upper})`。

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::almanac::Almanac;
use crate::error::Result;

/// 匹配 ${fact} 与 ${fact.a.b} 格式的占位符
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_]+)*)\}")
        .expect("placeholder pattern is valid")
});

/// 模板占位符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    /// 原始文本，如 `${areaBounds.upper}`
    pub token: String,
    pub fact: String,
    /// `$.upper` 形式的路径
    pub path: Option<String>,
}

impl Placeholder {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let path = caps
            .get(2)
            .map(|m| m.as_str())
            .filter(|p| !p.is_empty())
            .map(|p| format!("${}", p));

        Self {
            token: caps[0].to_string(),
            fact: caps[1].to_string(),
            path,
        }
    }
}

/// 列出模板中的占位符（按出现顺序，去重）
pub fn placeholders(template: &str) -> Vec<Placeholder> {
    let mut found: Vec<Placeholder> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let placeholder = Placeholder::from_captures(&caps);
        if !found.contains(&placeholder) {
            found.push(placeholder);
        }
    }
    found
}

/// 展开模板，占位符引用的事实通过 almanac 解析
pub async fn expand(template: &str, almanac: &Almanac) -> Result<String> {
    let mut values: HashMap<String, String> = HashMap::new();
    for placeholder in placeholders(template) {
        let value = almanac
            .fact_value_at(&placeholder.fact, placeholder.path.as_deref(), None)
            .await?;
        values.insert(placeholder.token, render(value.as_ref()));
    }

    Ok(substitute(template, &values))
}

/// 用已解析的值替换占位符
pub fn substitute(template: &str, values: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values
                .get(&caps[0])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// 值的文本形式：字符串不带引号，缺失为 `undefined`
pub fn render(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}
