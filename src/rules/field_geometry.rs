//! 射野几何检查

use crate::core::error::ReviewResult;
use crate::core::models::{Beam, Finding, MachineClass, PlanSnapshot, Point3, Severity};
use crate::core::profile::{GeometryConfig, MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;

/// 射野几何：准直器角、Halcyon 等中心位置、公差表、首野起始角、Halcyon 铅门重叠
pub struct FieldGeometryRule {
    config: GeometryConfig,
    machines: MachineConfig,
}

impl FieldGeometryRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.geometry.clone(),
            machines: config.machines.clone(),
        }
    }

    fn is_forbidden_collimator(&self, angle: f64) -> bool {
        self.config
            .forbidden_collimator_windows
            .iter()
            .any(|&(low, high)| [angle, angle + 360.0].iter().any(|a| *a > low && *a < high))
    }

    fn collimator_findings(&self, beams: &[&Beam], findings: &mut Vec<Finding>) -> ReviewResult<()> {
        let mut angles = Vec::with_capacity(beams.len());
        for beam in beams {
            angles.push(beam.first_control_point()?.collimator_angle);
        }

        for &angle in &angles {
            let duplicated = angles.iter().filter(|a| **a == angle).count() > 1;
            let finding = if self.is_forbidden_collimator(angle) {
                Finding::error("Fields.Geometry.Collimator", format!("Invalid collimator angle {angle:.1}°"))
            } else if duplicated {
                Finding::warning(
                    "Fields.Geometry.Collimator",
                    format!("Collimator angle {angle:.1}° is duplicated"),
                )
            } else {
                Finding::info("Fields.Geometry.Collimator", format!("Collimator angle {angle:.1}° is valid"))
            };
            findings.push(finding.per_item());
        }
        Ok(())
    }

    fn isocenter_finding(&self, beam: &Beam, user_origin: Point3) -> Finding {
        // IEC Y 对应 DICOM z，相对摆位原点
        let iec_y = (beam.isocenter.z - user_origin.z) / 10.0;
        let (low, high) = (self.config.halcyon_isocenter_y_min_cm, self.config.halcyon_isocenter_y_max_cm);
        let id = &beam.id;
        Finding::check(
            iec_y > low && iec_y < high,
            "Fields.Geometry.Isocenter",
            format!("Field '{id}' isocenter Y position ({iec_y:.1} cm) is within Halcyon limits ({low} to +{high} cm)"),
            format!("Field '{id}' isocenter Y position ({iec_y:.1} cm) is outside Halcyon limits ({low} to +{high} cm)"),
            Severity::Error,
        )
        .per_item()
    }

    fn tolerance_table_finding(&self, beam: &Beam, expected: &str) -> Finding {
        let id = &beam.id;
        let found = &beam.tolerance_table;
        Finding::check(
            found == expected,
            "Fields.Geometry.ToleranceTable",
            format!("Field '{id}' has correct tolerance table ({found})"),
            format!("Field '{id}' has incorrect tolerance table. Expected: {expected}, Found: {found}"),
            Severity::Warning,
        )
        .per_item()
        .with_summary(format!("All treatment fields have correct tolerance table ({expected})"))
    }

    fn first_field_finding(&self, first: &Beam) -> ReviewResult<Finding> {
        let gantry = first.first_control_point()?.gantry_angle;
        let id = &first.id;
        Ok(Finding::check(
            (gantry - 180.0).abs() <= self.config.first_field_max_deviation_degrees,
            "Fields.Geometry.1st Field Start Angle",
            format!("First field '{id}' correctly starts at {gantry:.1}° - closest to the 180°"),
            format!("First field '{id}' starts at {gantry:.1}° (should be close to 180°)"),
            Severity::Warning,
        )
        .per_item())
    }

    /// 同一准直器角的分割野，X 方向铅门应有重叠
    fn jaw_overlap_findings(&self, beams: &[&Beam], findings: &mut Vec<Finding>) -> ReviewResult<()> {
        let mut groups: Vec<(f64, Vec<&Beam>)> = Vec::new();
        for &beam in beams {
            let collimator = (beam.first_control_point()?.collimator_angle * 10.0).round() / 10.0;
            match groups.iter_mut().find(|(angle, _)| *angle == collimator) {
                Some((_, members)) => members.push(beam),
                None => groups.push((collimator, vec![beam])),
            }
        }

        for (collimator, members) in groups.iter().filter(|(_, m)| m.len() > 1) {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    let ja = a.first_control_point()?.jaws;
                    let jb = b.first_control_point()?.jaws;
                    let overlap = ja.x2.min(jb.x2) - ja.x1.max(jb.x1);
                    let finding = if overlap > 0.0 {
                        Finding::info(
                            "Fields.Geometry.MLCOverlap",
                            format!(
                                "Fields '{}' and '{}' with collimator {collimator:.1}° have {:.1} cm jaw overlap (X1/X2: {:.1}/{:.1} cm and {:.1}/{:.1} cm)",
                                a.id,
                                b.id,
                                overlap / 10.0,
                                ja.x1 / 10.0,
                                ja.x2 / 10.0,
                                jb.x1 / 10.0,
                                jb.x2 / 10.0
                            ),
                        )
                    } else {
                        Finding::warning(
                            "Fields.Geometry.MLCOverlap",
                            format!(
                                "Fields '{}' and '{}' with collimator {collimator:.1}° have no jaw overlap",
                                a.id, b.id
                            ),
                        )
                    };
                    findings.push(finding.per_item());
                }
            }
        }
        Ok(())
    }
}

impl Rule for FieldGeometryRule {
    fn name(&self) -> &str {
        "field geometry"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let treatment: Vec<&Beam> = plan.treatment_beams().collect();
        let mut findings = Vec::new();
        self.collimator_findings(&treatment, &mut findings)?;

        let user_origin = plan.image().map(|image| image.user_origin).unwrap_or_default();
        for beam in &plan.beams {
            let (is_halcyon, expected_table) = match self.machines.classify(Some(&beam.machine_id)) {
                MachineClass::Halcyon => (true, &self.config.halcyon_tolerance_table),
                MachineClass::Edge => (false, &self.config.edge_tolerance_table),
                MachineClass::Unknown => continue,
            };
            if is_halcyon {
                findings.push(self.isocenter_finding(beam, user_origin));
            }
            findings.push(self.tolerance_table_finding(beam, expected_table));
        }

        let with_couch = plan.has_couch_rotation()?;
        if !with_couch {
            if let Some(first) = treatment.first() {
                findings.push(self.first_field_finding(first)?);
            }
            if self.machines.classify(plan.machine_id()) == MachineClass::Halcyon {
                self.jaw_overlap_findings(&treatment, &mut findings)?;
            }
        }

        Ok(findings)
    }
}
