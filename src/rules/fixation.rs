//! 固定装置检查

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, MachineClass, PlanSnapshot, Severity, Structure};
use crate::core::profile::{FixationConfig, MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;
use crate::rules::density_from_name;

/// 固定装置结构与密度覆盖
pub struct FixationRule {
    config: FixationConfig,
    machines: MachineConfig,
}

impl FixationRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.fixation.clone(),
            machines: config.machines.clone(),
        }
    }

    fn density_finding(&self, structure: &Structure, expected: f64) -> Finding {
        let id = &structure.id;
        match structure.assigned_hu {
            Some(actual) => Finding::check(
                (actual - expected).abs() < self.config.density_tolerance_hu,
                "Fixation.Density",
                format!("Structure '{id}' has correct density override ({actual} HU)"),
                format!("Structure '{id}' has incorrect density override: {actual} HU (expected: {expected} HU)"),
                Severity::Error,
            ),
            None => Finding::error(
                "Fixation.Density",
                format!("Structure '{id}' has no density override assigned (expected: {expected} HU)"),
            ),
        }
    }
}

impl Rule for FixationRule {
    fn name(&self) -> &str {
        "fixation"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        if plan.structure_set.is_none() {
            return Ok(Vec::new());
        }
        let structures = plan.structures();
        let mut findings = Vec::new();

        if self.machines.classify(plan.machine_id()) == MachineClass::Halcyon {
            for prefix in &self.config.halcyon_required_prefixes {
                findings.push(Finding::check(
                    structures.iter().any(|s| s.has_prefix(prefix)),
                    "Fixation.Structures",
                    format!("Required Halcyon structure '{prefix}*' exists"),
                    format!("Required Halcyon structure '{prefix}*' is missing"),
                    Severity::Error,
                ));
            }
        }

        for structure in structures {
            if !self.config.density_prefixes.iter().any(|p| structure.has_prefix(p)) {
                continue;
            }
            // 名称不带 `_<值>HU` 的固定装置不检查
            if let Some(expected) = density_from_name(&structure.id) {
                findings.push(self.density_finding(structure, expected));
            }
        }

        Ok(findings)
    }
}
