//! 剂量网格、技术与剂量率检查

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, PlanSnapshot, Severity};
use crate::core::profile::{DoseConfig, MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;
use crate::rules::is_srs_plan;

/// 剂量网格、高剂量分次的 SRS 技术、剂量率
pub struct DoseRule {
    config: DoseConfig,
    machines: MachineConfig,
}

impl DoseRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.dose.clone(),
            machines: config.machines.clone(),
        }
    }

    fn grid_finding(&self, plan: &PlanSnapshot, resolution_mm: f64) -> Finding {
        let srs = is_srs_plan(plan);
        let grid_cm = resolution_mm / 10.0;
        let limit = if srs {
            self.config.srs_max_grid_cm
        } else {
            self.config.max_grid_cm
        };
        let (pass_suffix, fail_suffix) = if srs {
            (" for SRS plan".to_string(), format!(" (should be ≤ {limit} cm for SRS plans)"))
        } else {
            (String::new(), format!(" (should be ≤ {limit} cm)"))
        };

        Finding::check(
            grid_cm <= limit,
            "Dose.Grid",
            format!("Dose grid size ({grid_cm:.3} cm) is valid{pass_suffix}"),
            format!("Dose grid size ({grid_cm:.3} cm) is too large{fail_suffix}"),
            Severity::Error,
        )
    }
}

impl Rule for DoseRule {
    fn name(&self) -> &str {
        "dose"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        // 没有计算剂量时不检查
        let Some(resolution_mm) = plan.dose_grid_resolution_mm else {
            return Ok(Vec::new());
        };

        let mut findings = vec![self.grid_finding(plan, resolution_mm)];
        let per_fraction = plan.dose_per_fraction_gy;
        let high_dose = per_fraction >= self.config.high_dose_per_fraction_gy;
        let threshold = self.config.high_dose_per_fraction_gy;

        if high_dose {
            for beam in plan.treatment_beams() {
                let id = &beam.id;
                findings.push(
                    Finding::check(
                        beam.uses_srs_technique(),
                        "Dose.Technique",
                        format!("Field '{id}' correctly uses SRS technique for ≥{threshold}Gy/fraction ({per_fraction:.2} Gy)"),
                        format!("Field '{id}' should use SRS technique for ≥{threshold}Gy/fraction ({per_fraction:.2} Gy)"),
                        Severity::Error,
                    )
                    .per_item(),
                );
            }
        }

        for beam in plan.treatment_beams() {
            let machine = self.machines.classify(Some(&beam.machine_id));
            let expected = self.config.dose_rates.iter().find(|e| {
                e.machine == machine && e.energy == beam.energy && (high_dose || !e.high_dose_only)
            });
            let Some(expected) = expected else {
                continue;
            };

            let (id, energy, rate) = (&beam.id, &beam.energy, beam.dose_rate);
            findings.push(
                Finding::check(
                    (rate - expected.dose_rate).abs() < f64::EPSILON,
                    "Dose.DoseRate",
                    format!("Field '{id}' has correct dose rate ({rate} MU/min) for {energy}"),
                    format!(
                        "Field '{id}' has incorrect dose rate ({rate} MU/min) for {energy} (should be {} MU/min)",
                        expected.dose_rate
                    ),
                    Severity::Error,
                )
                .per_item(),
            );
        }

        Ok(findings)
    }
}
