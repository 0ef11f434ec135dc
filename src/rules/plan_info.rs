//! 计划信息检查

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, MachineClass, PlanSnapshot, Severity};
use crate::core::profile::{MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;

const STANDARD_ORIENTATION: &str = "Head First-Supine";
const DIBH_MARKER: &str = "DIBH";

/// 体位与 DIBH 门控
///
/// 作为 plan 规则组的后置规则，在所有子规则之后输出。
pub struct PlanInfoRule {
    machines: MachineConfig,
}

impl PlanInfoRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            machines: config.machines.clone(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_uppercase().contains(&needle.to_ascii_uppercase())
}

/// 影像 ID、结构集 ID 或序列描述中带有 DIBH
fn is_dibh(plan: &PlanSnapshot) -> bool {
    let Some(set) = plan.structure_set.as_ref() else {
        return false;
    };
    let image_marked = set.image.as_ref().is_some_and(|image| {
        contains_ignore_case(&image.id, DIBH_MARKER) || contains_ignore_case(&image.series_comment, DIBH_MARKER)
    });
    image_marked || contains_ignore_case(&set.id, DIBH_MARKER)
}

impl Rule for PlanInfoRule {
    fn name(&self) -> &str {
        "plan info"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let orientation = &plan.treatment_orientation;
        let is_standard = orientation.eq_ignore_ascii_case(STANDARD_ORIENTATION);
        let mut findings = vec![Finding::check(
            is_standard,
            "Plan.Info",
            format!("Treatment orientation: {orientation}"),
            format!("Treatment orientation: {orientation} (non-standard orientation)"),
            Severity::Warning,
        )];

        if self.machines.classify(plan.machine_id()) == MachineClass::Edge && is_dibh(plan) {
            findings.push(Finding::check(
                plan.use_gating,
                "Plan.Info",
                "Gating is correctly enabled for DIBH plan",
                "Gating should be enabled for DIBH plan",
                Severity::Error,
            ));
        }

        Ok(findings)
    }
}
