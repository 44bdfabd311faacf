//! 条件评估器
//!
//! 实现各操作符的比较逻辑。缺失值与 null 视为同一个哨兵：
//! `equal null` 对两者都成立，数值比较对两者都返回 false。

use crate::error::{Result, RuleError};
use crate::operators::Operator;
use serde_json::Value;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估单个比较
    ///
    /// # Arguments
    /// * `fact_value` - 左侧事实值（路径提取后），None 表示缺失
    /// * `operator` - 操作符
    /// * `expected_value` - 右侧值（字面量或已解析的事实）
    pub fn evaluate(
        fact_value: Option<&Value>,
        operator: Operator,
        expected_value: &Value,
    ) -> Result<bool> {
        let fact_value = fact_value.unwrap_or(&Value::Null);

        match operator {
            Operator::Equal => Ok(Self::eq(fact_value, expected_value)),
            Operator::NotEqual => Ok(!Self::eq(fact_value, expected_value)),
            Operator::GreaterThan => Self::compare(operator, fact_value, expected_value, |a, b| a > b),
            Operator::GreaterThanInclusive => {
                Self::compare(operator, fact_value, expected_value, |a, b| a >= b)
            }
            Operator::LessThan => Self::compare(operator, fact_value, expected_value, |a, b| a < b),
            Operator::LessThanInclusive => {
                Self::compare(operator, fact_value, expected_value, |a, b| a <= b)
            }
            Operator::In => Self::in_list(operator, fact_value, expected_value),
            Operator::NotIn => Self::in_list(operator, fact_value, expected_value).map(|r| !r),
            Operator::Contains => Self::contains(operator, fact_value, expected_value),
            Operator::DoesNotContain => {
                if fact_value.is_null() {
                    return Ok(false);
                }
                Self::contains(operator, fact_value, expected_value).map(|r| !r)
            }
            Operator::IsInteger => Ok(Self::is_integer(fact_value)),
        }
    }

    /// 相等比较
    fn eq(field: &Value, expected: &Value) -> bool {
        // 数值统一转为浮点数，避免 60 与 60.0 比较失败
        if let (Some(f1), Some(f2)) = (field.as_f64(), expected.as_f64()) {
            return f1 == f2;
        }

        field == expected
    }

    /// 数值比较，任一侧为 null 时不成立
    fn compare<F>(operator: Operator, field: &Value, expected: &Value, cmp: F) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        if field.is_null() || expected.is_null() {
            return Ok(false);
        }

        let field_num = Self::as_number(operator, field)?;
        let expected_num = Self::as_number(operator, expected)?;

        Ok(cmp(field_num, expected_num))
    }

    /// 列表包含检查 (in / notIn)
    fn in_list(operator: Operator, field: &Value, expected: &Value) -> Result<bool> {
        let arr = expected.as_array().ok_or_else(|| RuleError::TypeMismatch {
            operator: operator.to_string(),
            expected: "array".to_string(),
            actual: Self::type_name(expected).to_string(),
        })?;

        Ok(arr.iter().any(|item| Self::eq(field, item)))
    }

    /// 字符串/数组包含检查
    fn contains(operator: Operator, field: &Value, expected: &Value) -> Result<bool> {
        match field {
            Value::Null => Ok(false),
            Value::String(s) => {
                let substr = expected.as_str().ok_or_else(|| RuleError::TypeMismatch {
                    operator: operator.to_string(),
                    expected: "string".to_string(),
                    actual: Self::type_name(expected).to_string(),
                })?;
                Ok(s.contains(substr))
            }
            Value::Array(arr) => Ok(arr.iter().any(|item| Self::eq(item, expected))),
            _ => Err(RuleError::TypeMismatch {
                operator: operator.to_string(),
                expected: "string or array".to_string(),
                actual: Self::type_name(field).to_string(),
            }),
        }
    }

    /// 整数检查：字符串等非数值一律不成立
    fn is_integer(value: &Value) -> bool {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => true,
            Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
            _ => false,
        }
    }

    fn as_number(operator: Operator, value: &Value) -> Result<f64> {
        value.as_f64().ok_or_else(|| RuleError::TypeMismatch {
            operator: operator.to_string(),
            expected: "number".to_string(),
            actual: Self::type_name(value).to_string(),
        })
    }

    /// 获取值的类型名称
    pub(crate) fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
