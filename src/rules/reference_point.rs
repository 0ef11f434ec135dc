//! 参考点与处方检查

use crate::core::error::ReviewResult;
use crate::core::models::{starts_with_ignore_case, Finding, PlanSnapshot, ReferencePointKind, Severity};
use crate::core::profile::{DoseConfig, ReviewConfig};
use crate::core::rule_engine::Rule;

/// 参考点命名、类型、剂量限值与处方一致性
pub struct ReferencePointRule {
    prefix: String,
    dose: DoseConfig,
}

impl ReferencePointRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            prefix: config.naming.reference_point_prefix.clone(),
            dose: config.dose.clone(),
        }
    }

    fn limit_finding(&self, label: &str, actual: f64, expected: f64, basis: &str) -> Finding {
        let offset = self.dose.reference_dose_offset_gy;
        Finding::check(
            (actual - expected).abs() <= self.dose.reference_dose_tolerance_gy,
            "Dose.ReferencePoint",
            format!("{label} reference point dose ({actual:.2} Gy) is correct: {basis}+{offset}={expected:.2} Gy"),
            format!("{label} reference point dose ({actual:.2} Gy) is incorrect: {basis}+{offset}={expected:.2} Gy"),
            Severity::Error,
        )
    }

    fn prescription_findings(&self, plan: &PlanSnapshot, findings: &mut Vec<Finding>) {
        let Some(prescription) = plan.prescription.as_ref() else {
            findings.push(Finding::warning(
                "Dose.Prescription",
                "This plan is not linked to the Prescription",
            ));
            return;
        };

        // 取总剂量最高的靶区
        let mut total = 0.0;
        let mut per_fraction = 0.0;
        for target in &prescription.targets {
            if target.total_dose_gy() > total {
                total = target.total_dose_gy();
                per_fraction = target.dose_per_fraction_gy;
            }
        }
        if total <= 0.0 {
            findings.push(Finding::warning(
                "Dose.Prescription",
                "No dose values found in prescription targets",
            ));
            return;
        }

        let tolerance = self.dose.prescription_tolerance_gy;
        let (plan_total, plan_fraction) = (plan.total_dose_gy, plan.dose_per_fraction_gy);
        findings.push(Finding::check(
            (total - plan_total).abs() < tolerance,
            "Dose.Prescription",
            format!("Plan dose ({plan_total:.2} Gy) matches prescription dose ({total:.2} Gy)"),
            format!("Plan dose ({plan_total:.2} Gy) does not match prescription dose ({total:.2} Gy)"),
            Severity::Error,
        ));
        findings.push(Finding::check(
            (per_fraction - plan_fraction).abs() < tolerance,
            "Dose.Prescription",
            format!("Plan fraction dose ({plan_fraction:.2} Gy) matches prescription dose per fraction ({per_fraction:.2} Gy)"),
            format!(
                "Plan fraction dose ({plan_fraction:.2} Gy) does not match prescription dose per fraction ({per_fraction:.2} Gy)"
            ),
            Severity::Error,
        ));
    }
}

impl Rule for ReferencePointRule {
    fn name(&self) -> &str {
        "reference points"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let prefix = &self.prefix;
        let mut findings = Vec::new();

        for point in plan.reference_points.iter().filter(|p| starts_with_ignore_case(&p.id, prefix)) {
            let id = &point.id;
            findings.push(Finding::check(
                point.kind == ReferencePointKind::Target,
                "Dose.ReferencePoint",
                format!("Reference point '{id}' correctly has type 'Target'"),
                format!("Reference point '{id}' should have type 'Target' (current: {})", point.kind),
                Severity::Warning,
            ));
        }

        let Some(primary) = plan.primary_reference_point() else {
            findings.push(Finding::error("Dose.ReferencePoint", "No primary reference point found in plan"));
            return Ok(findings);
        };

        let id = &primary.id;
        findings.push(Finding::check(
            starts_with_ignore_case(id, prefix),
            "Dose.ReferencePoint",
            format!("Primary reference point name '{id}' follows naming convention ({prefix}*)"),
            format!("Primary reference point name '{id}' should start with '{prefix}'"),
            Severity::Error,
        ));

        let offset = self.dose.reference_dose_offset_gy;
        let expected_total = plan.total_dose_gy + offset;
        let expected_daily = plan.dose_per_fraction_gy + offset;
        findings.push(self.limit_finding("Total", primary.total_dose_limit_gy, expected_total, "Total"));
        findings.push(self.limit_finding("Daily", primary.daily_dose_limit_gy, expected_daily, "Fraction"));
        findings.push(self.limit_finding("Session", primary.session_dose_limit_gy, expected_daily, "Fraction"));

        self.prescription_findings(plan, &mut findings);
        Ok(findings)
    }
}
