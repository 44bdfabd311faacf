//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 序列化名称沿用 json-rules-engine 的命名（如 `greaterThanInclusive`），
/// 以便直接加载现有的规则 JSON。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    // 通用比较
    Equal,
    NotEqual,

    // 数值比较
    GreaterThan,
    GreaterThanInclusive,
    LessThan,
    LessThanInclusive,

    // 集合检查
    In,
    NotIn,
    Contains,
    DoesNotContain,

    // 类型检查，右侧值被忽略
    IsInteger,
}

impl Operator {
    /// 右侧值是否必须为数组
    pub fn expects_array(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// 是否为数值比较
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanInclusive | Self::LessThan | Self::LessThanInclusive
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanInclusive => "greaterThanInclusive",
            Self::LessThan => "lessThan",
            Self::LessThanInclusive => "lessThanInclusive",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Contains => "contains",
            Self::DoesNotContain => "doesNotContain",
            Self::IsInteger => "isInteger",
        };
        write!(f, "{}", s)
    }
}

/// 逻辑组合符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    All,
    Any,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
        }
    }
}
