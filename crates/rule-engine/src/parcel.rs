//! 地块领域模型
//!
//! 字段命名与输入 JSON 保持一致（camelCase），在 schema 校验通过后才会反序列化。

use serde::{Deserialize, Serialize};

/// 池塘要素类型
pub const POND_FEATURE: &str = "pond";

/// 地块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    #[serde(rename = "ref")]
    pub reference: String,
    pub total_perimeter: f64,
    pub total_area: f64,
    pub perimeter_features: Vec<PerimeterFeature>,
    pub area_features: Vec<AreaFeature>,
    pub sssi: bool,
    /// 土地覆盖分类代码，schema 保证为整数值（110 与 110.0 均可）
    pub land_cover_class: f64,
    pub has_reintroduced_grazing: bool,
    pub in_water_pollution_zone: bool,
    pub previous_actions: Vec<PreviousAction>,
}

/// 周长要素（如树篱、湖岸）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerimeterFeature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub length: f64,
}

/// 面积要素（如池塘）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaFeature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub area_covered: f64,
}

/// 历史操作记录，日期格式 YYYY-MM-DD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousAction {
    pub date: String,
    pub identifier: String,
}

impl Parcel {
    /// 周长要素总长度，无要素时为 0
    pub fn perimeter_feature_length(&self) -> f64 {
        self.perimeter_features.iter().map(|f| f.length).sum()
    }

    /// 面积要素覆盖总面积，可按要素类型过滤
    pub fn area_feature_coverage(&self, feature_type: Option<&str>) -> f64 {
        self.area_features
            .iter()
            .filter(|f| feature_type.is_none_or(|t| f.feature_type == t))
            .map(|f| f.area_covered)
            .sum()
    }

    /// 扣除周长要素后的周长
    pub fn adjusted_perimeter(&self) -> f64 {
        self.total_perimeter - self.perimeter_feature_length()
    }

    /// 扣除全部面积要素后的面积
    pub fn adjusted_area(&self) -> f64 {
        self.total_area - self.area_feature_coverage(None)
    }

    /// 扣除池塘后的面积
    pub fn pondless_area(&self) -> f64 {
        self.total_area - self.area_feature_coverage(Some(POND_FEATURE))
    }

    /// 指定操作标识的历史操作
    pub fn actions_matching<'a>(
        &'a self,
        identifier: &'a str,
    ) -> impl Iterator<Item = &'a PreviousAction> + 'a {
        self.previous_actions
            .iter()
            .filter(move |a| a.identifier == identifier)
    }
}
