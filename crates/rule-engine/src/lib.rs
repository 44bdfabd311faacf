//! 地块资格规则引擎
//!
//! 对一个地块（parcel）及若干运行时输入评估一组声明式规则：
//! - JSON 规则定义（all/any 条件树、事实引用、事件与提示模板）
//! - 按需计算并缓存的事实（almanac），支持派生事实与 JSONPath 取值
//! - 带优先级的短路求值，成功/失败监听器
//! - 失败原因解释：提示展开、输入边界、事实回传

pub mod almanac;
pub mod api;
pub mod catalog;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod explain;
pub mod facts;
pub mod hint;
pub mod listener;
pub mod models;
pub mod operators;
pub mod parcel;
pub mod path;
pub mod schema;

pub use almanac::Almanac;
pub use api::{EngineOutput, all_rules_pass, run_engine, run_rules, some_rules_pass};
pub use catalog::RuleCatalog;
pub use compiler::{CompiledRule, RuleCompiler};
pub use engine::{Engine, RunOptions, RunResult};
pub use error::{FieldViolation, Result, RuleError, ViolationKind};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use explain::{FailureReport, all_pass, collect_facts, collect_failures, some_pass};
pub use facts::{ConstantFact, Fact, FactRegistry};
pub use listener::RuleListener;
pub use models::{
    Comparison, Condition, ConditionResult, EmittedEvent, EventParams, FactRef, InputBounds,
    Outcome, Rule, RuleEvent, RuleResult, ValueSource,
};
pub use operators::{LogicalOperator, Operator};
pub use parcel::Parcel;
pub use schema::ParcelSchema;
