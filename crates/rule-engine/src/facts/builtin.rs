//! 内置地块事实
//!
//! | 事实 | 值 |
//! |---|---|
//! | `perimeterBounds` | `{lower: 0, upper: totalPerimeter}` |
//! | `adjustedPerimeter` | `totalPerimeter` 减去周长要素总长 |
//! | `adjustedPerimeterBounds` | `{lower: 0, upper: adjustedPerimeter}` |
//! | `areaBounds` | `{lower: 0, upper: totalArea}` |
//! | `adjustedArea` | `totalArea` 减去全部面积要素 |
//! | `adjustedAreaBounds` | `{lower: 0, upper: adjustedArea}` |
//! | `pondlessArea` | `totalArea` 减去池塘面积 |
//! | `pondlessAreaBounds` | `{lower: 0, upper: pondlessArea}` |
//! | `toleranceUpperLimit` | `totalPerimeter + tolerance` |
//! | `yearsSinceLastAction` | 距最近一次匹配操作的年数，无匹配时为 null |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::debug;

use super::calendar::{parse_date, years_between};
use super::names;
use super::{number, Fact, DEFAULT_PRIORITY};
use crate::almanac::Almanac;
use crate::error::{Result, RuleError};
use crate::parcel::Parcel;

/// 依赖其他派生事实的事实优先级
const DERIVED_PRIORITY: u32 = DEFAULT_PRIORITY + 1;

/// 所有内置事实，按注册顺序
pub fn defaults() -> Vec<Arc<dyn Fact>> {
    vec![
        Arc::new(BoundsFact::new(
            names::PERIMETER_BOUNDS,
            names::PARCEL,
            Some("$.totalPerimeter"),
        )),
        Arc::new(ParcelMeasure::new(
            names::ADJUSTED_PERIMETER,
            Parcel::adjusted_perimeter,
        )),
        Arc::new(
            BoundsFact::new(names::ADJUSTED_PERIMETER_BOUNDS, names::ADJUSTED_PERIMETER, None)
                .with_priority(DERIVED_PRIORITY),
        ),
        Arc::new(BoundsFact::new(
            names::AREA_BOUNDS,
            names::PARCEL,
            Some("$.totalArea"),
        )),
        Arc::new(ParcelMeasure::new(names::ADJUSTED_AREA, Parcel::adjusted_area)),
        Arc::new(
            BoundsFact::new(names::ADJUSTED_AREA_BOUNDS, names::ADJUSTED_AREA, None)
                .with_priority(DERIVED_PRIORITY),
        ),
        Arc::new(ParcelMeasure::new(names::PONDLESS_AREA, Parcel::pondless_area)),
        Arc::new(
            BoundsFact::new(names::PONDLESS_AREA_BOUNDS, names::PONDLESS_AREA, None)
                .with_priority(DERIVED_PRIORITY),
        ),
        Arc::new(ToleranceUpperLimit),
        Arc::new(YearsSinceLastAction),
    ]
}

/// 从地块计算出的数值
pub struct ParcelMeasure {
    name: &'static str,
    measure: fn(&Parcel) -> f64,
}

impl ParcelMeasure {
    pub fn new(name: &'static str, measure: fn(&Parcel) -> f64) -> Self {
        Self { name, measure }
    }
}

#[async_trait]
impl Fact for ParcelMeasure {
    fn name(&self) -> &str {
        self.name
    }

    async fn calculate(&self, _params: &Value, almanac: &Almanac) -> Result<Value> {
        let parcel: Parcel = almanac.fact_as(names::PARCEL).await?;
        Ok(number((self.measure)(&parcel)))
    }
}

/// `{lower: 0, upper: <source>}` 形式的范围事实
pub struct BoundsFact {
    name: &'static str,
    source: &'static str,
    path: Option<&'static str>,
    priority: u32,
}

impl BoundsFact {
    pub fn new(name: &'static str, source: &'static str, path: Option<&'static str>) -> Self {
        Self {
            name,
            source,
            path,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Fact for BoundsFact {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn calculate(&self, _params: &Value, almanac: &Almanac) -> Result<Value> {
        let upper = almanac
            .fact_value_at(self.source, self.path, None)
            .await?
            .filter(Value::is_number)
            .ok_or_else(|| {
                RuleError::computation(
                    self.name,
                    format!("{} 的 {:?} 不是数值", self.source, self.path),
                )
            })?;

        Ok(json!({ "lower": 0, "upper": upper }))
    }
}

/// 周长加容差得到的上限
pub struct ToleranceUpperLimit;

#[async_trait]
impl Fact for ToleranceUpperLimit {
    fn name(&self) -> &str {
        names::TOLERANCE_UPPER_LIMIT
    }

    async fn calculate(&self, _params: &Value, almanac: &Almanac) -> Result<Value> {
        let parcel: Parcel = almanac.fact_as(names::PARCEL).await?;
        let tolerance: f64 = almanac.fact_as(names::TOLERANCE).await?;
        Ok(number(parcel.total_perimeter + tolerance))
    }
}

/// 距最近一次同类操作的年数
///
/// 没有匹配的历史操作时返回 null，表示无法比较，规则中以 `equal null` 单独处理。
pub struct YearsSinceLastAction;

#[async_trait]
impl Fact for YearsSinceLastAction {
    fn name(&self) -> &str {
        names::YEARS_SINCE_LAST_ACTION
    }

    async fn calculate(&self, _params: &Value, almanac: &Almanac) -> Result<Value> {
        let reference: String = almanac.fact_as(names::REFERENCE_DATE).await?;
        let reference = parse_date(&reference)?;
        let parcel: Parcel = almanac.fact_as(names::PARCEL).await?;
        let action_id: String = almanac.fact_as(names::ACTION_ID).await?;

        let mut last: Option<NaiveDate> = None;
        for action in parcel.actions_matching(&action_id) {
            let date = parse_date(&action.date)?;
            last = Some(last.map_or(date, |d| d.max(date)));
        }

        let Some(last) = last else {
            debug!(action_id = %action_id, "无匹配的历史操作");
            return Ok(Value::Null);
        };

        Ok(number(years_between(last, reference)?))
    }
}
