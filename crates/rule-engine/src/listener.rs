//! 规则事件监听
//!
//! 每条规则评估完成后，引擎按评估顺序通知已订阅的监听器。
//! 监听器的错误只记录日志，不影响其他规则的评估。

use async_trait::async_trait;

use crate::almanac::Almanac;
use crate::models::{Outcome, RuleEvent, RuleResult};

/// 规则事件监听器
#[async_trait]
pub trait RuleListener: Send + Sync {
    /// 规则通过
    async fn on_success(
        &self,
        _event: &RuleEvent,
        _almanac: &Almanac,
        _result: &RuleResult,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// 规则未通过
    async fn on_failure(
        &self,
        _event: &RuleEvent,
        _almanac: &Almanac,
        _result: &RuleResult,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 只关心某一种结论的闭包监听器
pub(crate) struct FnListener<F> {
    outcome: Outcome,
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&RuleEvent, &Almanac, &RuleResult) -> anyhow::Result<()> + Send + Sync,
{
    pub(crate) fn new(outcome: Outcome, handler: F) -> Self {
        Self { outcome, handler }
    }
}

#[async_trait]
impl<F> RuleListener for FnListener<F>
where
    F: Fn(&RuleEvent, &Almanac, &RuleResult) -> anyhow::Result<()> + Send + Sync,
{
    async fn on_success(
        &self,
        event: &RuleEvent,
        almanac: &Almanac,
        result: &RuleResult,
    ) -> anyhow::Result<()> {
        if self.outcome == Outcome::Success {
            (self.handler)(event, almanac, result)?;
        }
        Ok(())
    }

    async fn on_failure(
        &self,
        event: &RuleEvent,
        almanac: &Almanac,
        result: &RuleResult,
    ) -> anyhow::Result<()> {
        if self.outcome == Outcome::Failure {
            (self.handler)(event, almanac, result)?;
        }
        Ok(())
    }
}
