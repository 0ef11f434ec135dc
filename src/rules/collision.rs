//! 碰撞风险检查

use crate::core::collision::{assess, AngularFilter, CollisionAssessment, CollisionRiskScanner};
use crate::core::error::ReviewResult;
use crate::core::models::{Finding, MachineClass, PlanSnapshot, Severity, Structure};
use crate::core::profile::{ClearanceMetric, CollisionConfig, CollisionProfile, MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;
use crate::core::sector::ArcSweep;

const CATEGORY: &str = "Collision";

/// 机架与患者/固定装置的碰撞风险
pub struct CollisionRule {
    config: CollisionConfig,
    machines: MachineConfig,
}

impl CollisionRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.collision.clone(),
            machines: config.machines.clone(),
        }
    }

    /// 按前缀顺序挑出参与评估的结构
    fn candidates<'a>(profile: &CollisionProfile, structures: &'a [Structure]) -> Vec<&'a Structure> {
        let mut selected: Vec<&Structure> = Vec::new();
        for prefix in &profile.structure_prefixes {
            for structure in structures.iter().filter(|s| s.has_prefix(prefix)) {
                if !selected.iter().any(|s| std::ptr::eq(*s, structure)) {
                    selected.push(structure);
                }
            }
        }
        selected
    }

    fn angular_filter(profile: &CollisionProfile, plan: &PlanSnapshot) -> ReviewResult<AngularFilter> {
        if !profile.angular_filtering {
            return Ok(AngularFilter::FullCircle);
        }
        let mut sweeps = Vec::new();
        for beam in plan.treatment_beams() {
            sweeps.push(ArcSweep::from_beam(beam)?);
        }
        Ok(AngularFilter::for_sweeps(
            &sweeps,
            profile.arc_margin_degrees,
            profile.static_margin_degrees,
        ))
    }

    fn message(profile: &CollisionProfile, assessment: &CollisionAssessment) -> String {
        let id = &assessment.worst.structure_id;
        let direction = assessment.direction;
        let mut message = match profile.metric {
            ClearanceMetric::Clearance => format!(
                "Clearance {:.1} cm between fixation device '{id}' ({direction} edge) and {}",
                assessment.clearance_cm, profile.boundary_label
            ),
            ClearanceMetric::Distance if profile.angular_filtering => format!(
                "Max distance {:.1} cm from isocenter to fixation device '{id}' ({direction} edge) within treated gantry angles (+/-{} deg)",
                assessment.distance_cm, profile.static_margin_degrees
            ),
            ClearanceMetric::Distance => format!(
                "Max distance {:.1} cm from isocenter to fixation device '{id}' ({direction} edge)",
                assessment.distance_cm
            ),
        };
        match assessment.severity {
            Severity::Error => message.push_str(" - potential collision risk"),
            Severity::Warning => message.push_str(" - limited clearance"),
            Severity::Info => {}
        }
        message
    }
}

impl Rule for CollisionRule {
    fn name(&self) -> &str {
        "collision"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let Some(center) = plan.isocenter() else {
            return Ok(Vec::new());
        };
        let machine = self.machines.classify(plan.machine_id());
        let Some(profile) = self.config.profile_for(machine) else {
            return Ok(vec![Finding::info(
                CATEGORY,
                format!(
                    "Collision assessment skipped - machine '{}' has no collision profile",
                    plan.machine_id().unwrap_or_default()
                ),
            )]);
        };

        if plan.has_couch_rotation()? {
            return Ok(vec![Finding::info(
                CATEGORY,
                "Collision assessment skipped for plans with couch rotation - manual verification required",
            )]);
        }

        let candidates = Self::candidates(profile, plan.structures());
        let scanner = CollisionRiskScanner::new(center, Self::angular_filter(profile, plan)?)?;
        let results = scanner.scan_all(candidates)?;
        tracing::debug!(
            machine = %machine,
            structures = results.len(),
            full_circle = scanner.filter().is_full_circle(),
            "碰撞扫描完成"
        );

        let finding = match assess(&results, center, profile) {
            Some(assessment) => Finding::new(CATEGORY, Self::message(profile, &assessment), assessment.severity),
            None => Finding::warning(
                CATEGORY,
                format!("Cannot assess {machine} collision risk - none of the required fixation devices found"),
            ),
        };
        Ok(vec![finding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{self, circle_structure, point_structure, static_beam, with_couch, EDGE, HALCYON};

    fn run(plan: &PlanSnapshot) -> Vec<Finding> {
        CollisionRule::new(&ReviewConfig::default()).evaluate(plan).unwrap()
    }

    fn edge_plan(structures: Vec<Structure>) -> PlanSnapshot {
        fixtures::with_structures(
            fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE)]),
            structures,
        )
    }

    #[test]
    fn test_edge_body_beyond_38_cm_is_error() {
        let findings = run(&edge_plan(vec![circle_structure("BODY", 390.0, 3)]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(
            findings[0].message,
            "Max distance 39.0 cm from isocenter to fixation device 'BODY' (right edge) within treated gantry angles (+/-10 deg) - potential collision risk"
        );
    }

    #[test]
    fn test_edge_body_within_37_cm_is_info() {
        let findings = run(&edge_plan(vec![circle_structure("BODY", 360.0, 3)]));
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.starts_with("Max distance 36.0 cm"));
    }

    #[test]
    fn test_edge_ignores_points_outside_treated_angles() {
        // G180 ±10°，0° 方向的点不参与评估
        let findings = run(&edge_plan(vec![
            point_structure("BODY", 400.0, 0.0),
            point_structure("z_VacBag", -300.0, 0.0),
        ]));
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.contains("'z_VacBag'"));
    }

    #[test]
    fn test_halcyon_clearance_to_ring() {
        let plan = fixtures::with_structures(
            fixtures::plan(HALCYON, vec![]),
            vec![circle_structure("BODY", 200.0, 2), point_structure("z_AltaHD_+200HU", 0.0, -432.0)],
        );
        let findings = run(&plan);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(
            findings[0].message,
            "Clearance 4.3 cm between fixation device 'z_AltaHD_+200HU' (posterior edge) and Halcyon ring - potential collision risk"
        );
    }

    #[test]
    fn test_halcyon_partial_config_keeps_clearance_metric() {
        let json = r#"{ "collision": { "halcyon": { "error_threshold_cm": 4.0 } } }"#;
        let config: ReviewConfig = serde_json::from_str(json).unwrap();
        let plan = fixtures::with_structures(
            fixtures::plan(HALCYON, vec![]),
            vec![circle_structure("BODY", 200.0, 2)],
        );

        let findings = CollisionRule::new(&config).evaluate(&plan).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.starts_with("Clearance 27.5 cm"));
        assert!(findings[0].message.ends_with("and Halcyon ring"));
    }

    #[test]
    fn test_no_candidate_structures_warns() {
        let findings = run(&edge_plan(vec![point_structure("PTV", 10.0, 0.0)]));
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(
            findings[0].message,
            "Cannot assess Edge collision risk - none of the required fixation devices found"
        );
    }

    #[test]
    fn test_couch_rotation_skips_scan() {
        let plan = fixtures::plan(EDGE, vec![with_couch(static_beam("T90-G0-A", 0.0, EDGE), 90.0)]);
        let findings = run(&plan);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.contains("manual verification required"));
    }

    #[test]
    fn test_unknown_machine_is_skipped() {
        let plan = fixtures::plan("TrueBeamSN1000", vec![]);
        let findings = run(&plan);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.starts_with("Collision assessment skipped"));
    }
}
