//! 规则目录
//!
//! 内置的地块资格规则随二进制发布，也可以从目录加载额外的规则文件。
//! 规则在加载时即做结构校验，目录中只保存校验通过的规则。

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::compiler::RuleCompiler;
use crate::error::{Result, RuleError};
use crate::models::Rule;

/// 内置规则：（目录名, JSON 定义）
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("adjustedPerimeter", include_str!("../rules/adjusted-perimeter.json")),
    ("area", include_str!("../rules/area.json")),
    ("cultivatedParcel", include_str!("../rules/cultivated-parcel.json")),
    ("hasReintroducedGrazing", include_str!("../rules/has-reintroduced-grazing.json")),
    ("inWaterPollutionZone", include_str!("../rules/in-water-pollution-zone.json")),
    ("noActionsInTimePeriod", include_str!("../rules/no-actions-in-time-period.json")),
    ("notSSSI", include_str!("../rules/not-sssi.json")),
    ("perimeter", include_str!("../rules/perimeter.json")),
    ("pondlessArea", include_str!("../rules/pondless-area.json")),
    ("tolerancePerimeter", include_str!("../rules/tolerance-perimeter.json")),
];

/// 规则目录
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    /// 按加载顺序保存
    rules: Vec<(String, Rule)>,
}

impl RuleCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载全部内置规则
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::new();
        for (name, json) in BUILTIN_RULES {
            catalog.load_json(name, json)?;
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 添加规则，同名规则会被替换
    pub fn insert(&mut self, name: impl Into<String>, rule: Rule) -> Result<()> {
        let name = name.into();
        let rule = RuleCompiler::new().compile(rule)?.rule;

        match self.rules.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = rule,
            None => self.rules.push((name, rule)),
        }
        Ok(())
    }

    /// 从 JSON 字符串加载规则
    pub fn load_json(&mut self, name: &str, json: &str) -> Result<()> {
        let rule: Rule = serde_json::from_str(json)
            .map_err(|e| RuleError::ParseError(format!("规则 {}: {}", name, e)))?;
        self.insert(name, rule)
    }

    /// 加载目录中的所有 `*.json` 规则文件，文件名（不含扩展名）作为规则名
    #[instrument(skip(self, dir), fields(path = %dir.as_ref().display()))]
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "跳过无法识别的规则文件名");
                continue;
            };
            let json = std::fs::read_to_string(&path)?;
            self.load_json(name, &json)?;
            loaded += 1;
        }

        info!(loaded, total = self.len(), "规则目录加载完成");
        Ok(loaded)
    }

    /// 获取规则
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 所有规则名，按加载顺序
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 按名称选取规则，保持请求的顺序
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Rule>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .cloned()
                    .ok_or_else(|| RuleError::RuleNotFound(name.to_string()))
            })
            .collect()
    }

    /// 所有规则，按加载顺序
    pub fn all(&self) -> Vec<Rule> {
        self.rules.iter().map(|(_, r)| r.clone()).collect()
    }
}
