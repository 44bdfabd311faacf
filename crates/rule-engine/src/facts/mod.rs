//! 事实定义
//!
//! 事实是按需计算、在单次运行内缓存的具名值。派生事实通过 [`Almanac`]
//! 解析其他事实，从而形成依赖图（如 `adjustedPerimeterBounds` 依赖
//! `adjustedPerimeter`，后者又依赖 `parcel`）。

pub mod builtin;
pub mod calendar;
pub mod registry;

pub use registry::FactRegistry;

use crate::almanac::Almanac;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// 事实名称
pub mod names {
    pub const PARCEL: &str = "parcel";
    pub const QUANTITY: &str = "quantity";
    pub const TOLERANCE: &str = "tolerance";
    pub const REFERENCE_DATE: &str = "referenceDate";
    pub const ACTION_ID: &str = "actionId";
    pub const ACTION_YEARS_THRESHOLD: &str = "actionYearsThreshold";

    pub const PERIMETER_BOUNDS: &str = "perimeterBounds";
    pub const ADJUSTED_PERIMETER: &str = "adjustedPerimeter";
    pub const ADJUSTED_PERIMETER_BOUNDS: &str = "adjustedPerimeterBounds";
    pub const AREA_BOUNDS: &str = "areaBounds";
    pub const ADJUSTED_AREA: &str = "adjustedArea";
    pub const ADJUSTED_AREA_BOUNDS: &str = "adjustedAreaBounds";
    pub const PONDLESS_AREA: &str = "pondlessArea";
    pub const PONDLESS_AREA_BOUNDS: &str = "pondlessAreaBounds";
    pub const TOLERANCE_UPPER_LIMIT: &str = "toleranceUpperLimit";
    pub const YEARS_SINCE_LAST_ACTION: &str = "yearsSinceLastAction";
}

/// 运行时事实的优先级，早于任何派生事实解析
pub const RUNTIME_PRIORITY: u32 = 0;

/// 派生事实的默认优先级
pub const DEFAULT_PRIORITY: u32 = 1;

/// 事实 Trait
///
/// 每个派生事实实现此 trait 并注册到 [`FactRegistry`]。优先级数值越小越先解析；
/// 同优先级按声明顺序解析。
#[async_trait]
pub trait Fact: Send + Sync {
    /// 事实名称，注册表按此索引
    fn name(&self) -> &str;

    /// 解析优先级
    fn priority(&self) -> u32 {
        DEFAULT_PRIORITY
    }

    /// 计算事实值
    ///
    /// `params` 为条件中声明的参数（未声明时为 null）；可通过 `almanac`
    /// 解析依赖的其他事实，依赖值同样会被缓存。
    async fn calculate(&self, params: &Value, almanac: &Almanac) -> Result<Value>;
}

/// 常量事实
pub struct ConstantFact {
    name: String,
    value: Value,
    priority: u32,
}

impl ConstantFact {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Fact for ConstantFact {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn calculate(&self, _params: &Value, _almanac: &Almanac) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// 将浮点数转换为 JSON 数值，整数值输出为整数（60 而不是 60.0）
pub fn number(value: f64) -> Value {
    // 2^53，超出后 f64 不再能精确表示整数
    const MAX_SAFE: f64 = 9_007_199_254_740_992.0;

    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_SAFE {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
