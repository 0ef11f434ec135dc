//! 优化参数检查

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, MachineClass, OptimizationSetup, PlanSnapshot, Severity};
use crate::core::profile::{MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;
use crate::rules::is_srs_plan;

const ACCEPTED_ASC_LEVELS: [&str; 2] = ["High", "Very High"];

/// Edge 优化参数：Jaw Tracking、SRS 计划的 Aperture Shape Controller
pub struct OptimizationRule {
    machines: MachineConfig,
}

impl OptimizationRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            machines: config.machines.clone(),
        }
    }
}

impl Rule for OptimizationRule {
    fn name(&self) -> &str {
        "optimization"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        if self.machines.classify(plan.machine_id()) != MachineClass::Edge {
            return Ok(Vec::new());
        }
        let default_setup = OptimizationSetup::default();
        let setup = plan.optimization.as_ref().unwrap_or(&default_setup);

        let mut findings = vec![Finding::check(
            setup.jaw_tracking_used,
            "Plan.Optimization",
            "Jaw Tracking is used for Edge plan",
            "Jaw Tracking is NOT used for Edge plan",
            Severity::Warning,
        )];

        if is_srs_plan(plan) {
            findings.push(match setup.aperture_shape_controller.as_deref() {
                Some(level) => Finding::check(
                    ACCEPTED_ASC_LEVELS.contains(&level),
                    "Plan.Optimization",
                    format!("Aperture Shape Controller is set to '{level}' for Edge SRS plan"),
                    format!("Aperture Shape Controller is set to '{level}' - not 'High' or 'Very High' for Edge SRS plans"),
                    Severity::Warning,
                ),
                None => Finding::warning(
                    "Plan.Optimization",
                    "Cannot determine Aperture Shape Controller setting for Edge SRS plan",
                ),
            });
        }

        Ok(findings)
    }
}
