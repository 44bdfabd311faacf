//! 地块 schema 校验
//!
//! 评估任何规则之前先校验地块。每个顶层属性编译一个独立的校验器，
//! 以便一次列出所有缺失或类型错误的字段，而不是在第一个错误处停止。
//! 启用 `format` 校验，`"format": "date"` 会拒绝不存在的日历日期（如 2019-02-30）。

use jsonschema::Validator;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{FieldViolation, Result, RuleError, ViolationKind};

/// 内置的地块 schema
pub const PARCEL_SCHEMA: &str = include_str!("../schemas/parcel.json");

/// 地块 schema 校验器
pub struct ParcelSchema {
    required: Vec<String>,
    properties: Vec<(String, Validator)>,
}

impl ParcelSchema {
    /// 加载内置 schema
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(PARCEL_SCHEMA)?;
        Self::from_value(&schema)
    }

    /// 从 schema 文档编译
    pub fn from_value(schema: &Value) -> Result<Self> {
        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut properties = Vec::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, property_schema) in props {
                let validator = jsonschema::options()
                    .should_validate_formats(true)
                    .build(property_schema)
                    .map_err(|e| {
                        RuleError::CompileError(format!("属性 {} 的 schema 无效: {}", name, e))
                    })?;
                properties.push((name.clone(), validator));
            }
        }

        debug!(
            required = ?required,
            property_count = properties.len(),
            "地块 schema 编译完成"
        );

        Ok(Self {
            required,
            properties,
        })
    }

    /// 必填字段
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// 校验地块，返回所有违规字段
    pub fn violations(&self, parcel: &Value) -> Vec<FieldViolation> {
        let Some(object) = parcel.as_object() else {
            return vec![FieldViolation {
                field: "parcel".to_string(),
                kind: ViolationKind::Invalid,
                message: format!("地块必须是 JSON 对象, 实际为 {}", parcel),
            }];
        };

        let mut violations: Vec<FieldViolation> = self
            .required
            .iter()
            .filter(|field| !object.contains_key(field.as_str()))
            .map(|field| FieldViolation {
                field: field.clone(),
                kind: ViolationKind::Missing,
                message: "必填字段缺失".to_string(),
            })
            .collect();

        for (name, validator) in &self.properties {
            let Some(value) = object.get(name) else {
                continue;
            };
            if validator.is_valid(value) {
                continue;
            }

            let message = validator
                .iter_errors(value)
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            violations.push(FieldViolation {
                field: name.clone(),
                kind: ViolationKind::Invalid,
                message,
            });
        }

        violations
    }

    /// 校验地块，存在违规时返回 [`RuleError::ParcelSchemaValidation`]
    pub fn validate(&self, parcel: &Value) -> Result<()> {
        let violations = self.violations(parcel);
        if violations.is_empty() {
            return Ok(());
        }

        warn!(
            violation_count = violations.len(),
            fields = ?violations.iter().map(|v| v.field.as_str()).collect::<Vec<_>>(),
            "地块 schema 校验失败"
        );
        Err(RuleError::ParcelSchemaValidation { violations })
    }
}

impl std::fmt::Debug for ParcelSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParcelSchema")
            .field("required", &self.required)
            .field(
                "properties",
                &self.properties.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}
