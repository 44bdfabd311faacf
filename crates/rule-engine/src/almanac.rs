//! 事实解析器（Almanac）
//!
//! 每次运行创建一个新的 Almanac：持有运行时事实（地块、申报数量等）和派生事实的缓存。
//! 同一事实在同一运行内只计算一次，缓存键为（名称，参数）。失败解释阶段重新读取事实时
//! 看到的是评估时的同一个值。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{Result, RuleError};
use crate::facts::{FactRegistry, RUNTIME_PRIORITY};
use crate::path;

/// 缓存键：事实名称 + 参数的 JSON 文本
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FactKey {
    name: String,
    params: String,
}

impl FactKey {
    fn new(name: &str, params: Option<&Value>) -> Self {
        Self {
            name: name.to_string(),
            params: params
                .filter(|p| !p.is_null())
                .map(Value::to_string)
                .unwrap_or_default(),
        }
    }

    fn is_plain(&self) -> bool {
        self.params.is_empty()
    }
}

/// 事实解析器
pub struct Almanac {
    registry: Arc<FactRegistry>,
    /// 运行时事实，优先于同名的注册事实
    runtime: HashMap<String, Value>,
    cache: Mutex<HashMap<FactKey, Value>>,
    /// 正在计算的事实，用于检测循环依赖
    pending: Mutex<HashSet<FactKey>>,
}

impl Almanac {
    pub fn new(registry: Arc<FactRegistry>) -> Self {
        Self {
            registry,
            runtime: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// 添加运行时事实
    pub fn with_runtime_fact(mut self, name: impl Into<String>, value: Value) -> Self {
        self.add_runtime_fact(name, value);
        self
    }

    pub fn add_runtime_fact(&mut self, name: impl Into<String>, value: Value) {
        self.runtime.insert(name.into(), value);
    }

    /// 事实是否可解析（运行时事实或已注册事实）
    pub fn contains(&self, name: &str) -> bool {
        self.runtime.contains_key(name) || self.registry.contains(name)
    }

    /// 事实的解析优先级，运行时事实最先
    pub fn priority(&self, name: &str) -> Option<u32> {
        if self.runtime.contains_key(name) {
            return Some(RUNTIME_PRIORITY);
        }
        self.registry.get(name).map(|f| f.priority())
    }

    /// 事实的声明序号，运行时事实排在注册事实之前
    pub(crate) fn declaration_order(&self, name: &str) -> usize {
        if self.runtime.contains_key(name) {
            return 0;
        }
        self.registry.position(name).map_or(usize::MAX, |p| p + 1)
    }

    /// 解析事实值
    pub async fn fact_value(&self, name: &str) -> Result<Value> {
        self.fact_value_with(name, None).await
    }

    /// 带参数解析事实值
    pub async fn fact_value_with(&self, name: &str, params: Option<&Value>) -> Result<Value> {
        if let Some(value) = self.runtime.get(name) {
            return Ok(value.clone());
        }

        let key = FactKey::new(name, params);
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(value) = cached {
            trace!(fact = %name, "事实缓存命中");
            return Ok(value);
        }

        let fact = self
            .registry
            .get(name)
            .ok_or_else(|| RuleError::FactNotFound(name.to_string()))?;

        let inserted = self.pending.lock().insert(key.clone());
        if !inserted {
            return Err(RuleError::CircularFact(name.to_string()));
        }

        let result = fact.calculate(params.unwrap_or(&Value::Null), self).await;
        self.pending.lock().remove(&key);

        let value = result?;
        debug!(fact = %name, value = %value, "事实已计算");
        self.cache.lock().insert(key, value.clone());
        Ok(value)
    }

    /// 解析事实并按路径提取，路径不存在时返回 None
    pub async fn fact_value_at(
        &self,
        name: &str,
        path: Option<&str>,
        params: Option<&Value>,
    ) -> Result<Option<Value>> {
        let value = self.fact_value_with(name, params).await?;
        Ok(path::extract_owned(&value, path))
    }

    /// 解析事实并反序列化为指定类型
    pub async fn fact_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.fact_value(name).await?;
        serde_json::from_value(value).map_err(|e| RuleError::computation(name, e))
    }

    /// 读取已解析的值（不触发计算）
    pub fn cached(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.runtime.get(name) {
            return Some(value.clone());
        }
        self.cache.lock().get(&FactKey::new(name, None)).cloned()
    }

    /// 当前已解析的无参事实快照（含运行时事实）
    pub fn resolved_facts(&self) -> Map<String, Value> {
        let mut snapshot: Map<String, Value> = self
            .runtime
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let cache = self.cache.lock();
        for (key, value) in cache.iter().filter(|(k, _)| k.is_plain()) {
            snapshot.insert(key.name.clone(), value.clone());
        }
        snapshot
    }
}

impl std::fmt::Debug for Almanac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Almanac")
            .field("runtime", &self.runtime.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}
