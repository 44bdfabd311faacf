//! 事实注册表
//!
//! 管理所有派生事实，按名称索引。注册表在引擎构造时传入，运行期间只读，
//! 不存在进程级的全局注册表。
//!
//! ## 使用示例
//!
//! ```ignore
//! use rule_engine::facts::{ConstantFact, FactRegistry};
//! use std::sync::Arc;
//!
//! let mut registry = FactRegistry::with_defaults();
//! registry.register(Arc::new(ConstantFact::new("lowerInputBound", json!(0))));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::builtin;
use super::Fact;

/// 事实注册表
#[derive(Clone, Default)]
pub struct FactRegistry {
    facts: HashMap<String, Arc<dyn Fact>>,
    /// 注册顺序，用于同优先级时的稳定排序
    order: Vec<String>,
}

impl FactRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个事实，同名事实会被替换
    pub fn register(&mut self, fact: Arc<dyn Fact>) -> &mut Self {
        let name = fact.name().to_string();
        debug!(fact = %name, priority = fact.priority(), "注册事实");
        if self.facts.insert(name.clone(), fact).is_none() {
            self.order.push(name);
        }
        self
    }

    /// 获取指定名称的事实
    pub fn get(&self, name: &str) -> Option<Arc<dyn Fact>> {
        self.facts.get(name).cloned()
    }

    /// 检查是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    /// 事实的注册序号
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// 按注册顺序返回所有事实名称
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// 创建包含所有内置地块事实的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for fact in builtin::defaults() {
            registry.register(fact);
        }

        info!(fact_count = registry.len(), "内置事实注册完成");
        registry
    }
}

impl std::fmt::Debug for FactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactRegistry")
            .field("facts", &self.order)
            .finish()
    }
}
