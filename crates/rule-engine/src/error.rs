//! 规则引擎错误类型
//!
//! 地块 schema 校验失败是唯一的预期错误，调用方可据此给出字段级提示；
//! 其余错误都代表规则或事实定义有误，应直接向上传播。

use serde::Serialize;
use thiserror::Error;

/// 单个字段的校验违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// 违规字段名
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// 必填字段缺失
    Missing,
    /// 字段存在但类型或格式不符
    Invalid,
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("地块 schema 校验失败: {}", format_violations(.violations))]
    ParcelSchemaValidation { violations: Vec<FieldViolation> },

    #[error("事实未注册: {0}")]
    FactNotFound(String),

    #[error("事实存在循环依赖: {0}")]
    CircularFact(String),

    #[error("事实 {fact} 计算失败: {reason}")]
    FactComputation { fact: String, reason: String },

    #[error("类型不匹配: 操作符 {operator} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        operator: String,
        expected: String,
        actual: String,
    },

    #[error("无法解析日期 '{value}': 期望格式 YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("规则编译失败: {0}")]
    CompileError(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("读取规则文件失败: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    /// 是否为地块校验错误（唯一可恢复的错误类型）
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ParcelSchemaValidation { .. })
    }

    /// 校验违规列表，非校验错误时为空
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::ParcelSchemaValidation { violations } => violations,
            _ => &[],
        }
    }

    pub(crate) fn computation(fact: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::FactComputation {
            fact: fact.into(),
            reason: reason.to_string(),
        }
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, RuleError>;
