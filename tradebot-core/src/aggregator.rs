//! Plan aggregation: run signal modules in priority order against one plan.
//!
//! Failures are isolated per module. A module returning `Err` keeps whatever it
//! wrote for unaffected symbols; a module that panics is rolled back to the plan
//! it was handed. Either way the remaining modules still run, and the plan that
//! comes out is used downstream even if some modules failed.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigRegistry, SignalSettings};
use crate::domain::TradingPlan;
use crate::signals::{create_signals, MarketContext, SignalKind, SignalModule};

/// One module that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFailure {
    pub module: String,
    pub reason: String,
}

/// Aggregated plan plus the modules that failed while building it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub plan: TradingPlan,
    pub failures: Vec<ModuleFailure>,
}

pub struct PlanAggregator {
    modules: Vec<Box<dyn SignalModule>>,
}

impl PlanAggregator {
    pub fn new(modules: Vec<Box<dyn SignalModule>>) -> Self {
        Self { modules }
    }

    /// Built-in modules in the given priority order.
    pub fn from_order(order: &[SignalKind]) -> Self {
        Self::new(create_signals(order))
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Run every module with settings read from the registry.
    ///
    /// The registry is read once per module, so an update made while the
    /// aggregation is running applies from the next module on.
    pub fn aggregate(&self, ctx: &MarketContext<'_>, registry: &ConfigRegistry) -> AggregationReport {
        self.aggregate_with(ctx, || registry.snapshot())
    }

    /// Run every module with one fixed settings record.
    pub fn aggregate_fixed(&self, ctx: &MarketContext<'_>, settings: &SignalSettings) -> AggregationReport {
        self.aggregate_with(ctx, || settings.clone())
    }

    fn aggregate_with(
        &self,
        ctx: &MarketContext<'_>,
        settings: impl Fn() -> SignalSettings,
    ) -> AggregationReport {
        let mut report = AggregationReport::default();

        for module in &self.modules {
            let name = module.name();
            let settings = settings();
            let before = report.plan.clone();

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                module.propose(&mut report.plan, ctx, &settings)
            }));

            let reason = match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(module = name, entries = report.plan.len(), "module done");
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => {
                    report.plan = before;
                    panic_message(panic.as_ref())
                }
            };

            tracing::error!(module = name, error = %reason, "signal module failed, continuing");
            report.failures.push(ModuleFailure {
                module: name.to_string(),
                reason,
            });
        }

        tracing::info!(
            entries = report.plan.len(),
            buys = report.plan.buys(),
            sells = report.plan.sells(),
            failures = report.failures.len(),
            "plan aggregated"
        );
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
