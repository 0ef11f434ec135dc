//! 射野命名检查

use crate::core::error::ReviewResult;
use crate::core::models::{Beam, Finding, GantryDirection, PlanSnapshot, Severity};
use crate::core::profile::ReviewConfig;
use crate::core::rule_engine::Rule;
use crate::rules::compile_pattern;
use regex::{Captures, Regex};

const HYPERARC_TECHNIQUE: &str = "SRS HyperArc";

/// 治疗野命名
///
/// 静态野 `G<机架角>-<字母>`，弧形野 `<起始角><CW|CCW><终止角>-<字母>`；
/// 计划中任一射野有床旋转时，所有名称前加 `T<床角>-`。
pub struct FieldNamesRule {
    static_field: Regex,
    static_field_couch: Regex,
    arc_field: Regex,
    arc_field_couch: Regex,
}

/// 名称中使用的整数角度
struct NamedAngles {
    couch: i64,
    start: i64,
    end: i64,
}

impl FieldNamesRule {
    pub fn new(config: &ReviewConfig) -> ReviewResult<Self> {
        let naming = &config.naming;
        Ok(Self {
            static_field: compile_pattern(&naming.static_field_pattern)?,
            static_field_couch: compile_pattern(&naming.static_field_couch_pattern)?,
            arc_field: compile_pattern(&naming.arc_field_pattern)?,
            arc_field_couch: compile_pattern(&naming.arc_field_couch_pattern)?,
        })
    }

    fn follows_convention(&self, beam: &Beam, with_couch: bool) -> ReviewResult<bool> {
        let angles = named_angles(beam)?;
        let id = beam.id.as_str();

        if angles.start != angles.end {
            let pattern = if with_couch {
                &self.arc_field_couch
            } else {
                &self.arc_field
            };
            let Some(caps) = pattern.captures(id) else {
                return Ok(false);
            };
            let offset = usize::from(with_couch);
            let direction_ok = match (beam.gantry_direction, caps.get(offset + 2).map(|m| m.as_str())) {
                (GantryDirection::Clockwise, Some(name)) => name == "CW",
                (GantryDirection::CounterClockwise, Some(name)) => name == "CCW",
                (GantryDirection::None, Some(_)) => true,
                (_, None) => false,
            };
            Ok((!with_couch || group(&caps, 1) == Some(angles.couch))
                && group(&caps, offset + 1) == Some(angles.start)
                && group(&caps, offset + 3) == Some(angles.end)
                && direction_ok)
        } else {
            let pattern = if with_couch {
                &self.static_field_couch
            } else {
                &self.static_field
            };
            let Some(caps) = pattern.captures(id) else {
                return Ok(false);
            };
            let offset = usize::from(with_couch);
            Ok((!with_couch || group(&caps, 1) == Some(angles.couch))
                && group(&caps, offset + 1) == Some(angles.start))
        }
    }
}

fn group(caps: &Captures<'_>, index: usize) -> Option<i64> {
    caps.get(index)?.as_str().parse().ok()
}

/// 先保留一位小数再取整；HyperArc 的 180.1 记为 181，179.9 记为 179
fn named_angles(beam: &Beam) -> ReviewResult<NamedAngles> {
    let first = beam.first_control_point()?;
    let last = beam.last_control_point()?;
    let hyperarc = beam.technique.contains(HYPERARC_TECHNIQUE);

    let gantry = |angle: f64| -> i64 {
        let tenths = (angle * 10.0).round() as i64;
        match tenths {
            1801 if hyperarc => 181,
            1799 if hyperarc => 179,
            _ => (tenths as f64 / 10.0).round() as i64,
        }
    };

    Ok(NamedAngles {
        couch: first.couch_angle.round() as i64,
        start: gantry(first.gantry_angle),
        end: gantry(last.gantry_angle),
    })
}

impl Rule for FieldNamesRule {
    fn name(&self) -> &str {
        "field names"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let with_couch = plan.has_couch_rotation()?;
        let mut findings = Vec::new();

        for beam in plan.treatment_beams() {
            let id = &beam.id;
            findings.push(
                Finding::check(
                    self.follows_convention(beam, with_couch)?,
                    "Fields.Names",
                    format!("Field '{id}' follows naming convention"),
                    format!("Field '{id}' does not follow naming convention"),
                    Severity::Warning,
                )
                .per_item(),
            );
        }

        Ok(findings)
    }
}
