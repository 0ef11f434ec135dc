//! 本院审核规则
//!
//! 每条规则只读取计划快照并输出检查结果；机型差异、阈值和命名规则全部来自
//! [`ReviewConfig`](crate::core::profile::ReviewConfig)。

mod beam_energy;
mod collision;
mod contrast;
mod course;
mod ct_patient;
mod dose;
mod field_geometry;
mod field_names;
mod fixation;
mod optimization;
mod plan_info;
mod planning_structures;
mod reference_point;
mod setup_fields;

pub use beam_energy::BeamEnergyRule;
pub use collision::CollisionRule;
pub use contrast::ContrastStructureRule;
pub use course::CourseRule;
pub use ct_patient::CtAndPatientRule;
pub use dose::DoseRule;
pub use field_geometry::FieldGeometryRule;
pub use field_names::FieldNamesRule;
pub use fixation::FixationRule;
pub use optimization::OptimizationRule;
pub use plan_info::PlanInfoRule;
pub use planning_structures::PlanningStructuresRule;
pub use reference_point::ReferencePointRule;
pub use setup_fields::SetupFieldsRule;

use crate::core::error::{ReviewError, ReviewResult};
use crate::core::models::PlanSnapshot;
use regex::Regex;

/// 编译配置中的正则
pub(crate) fn compile_pattern(pattern: &str) -> ReviewResult<Regex> {
    Regex::new(pattern).map_err(|source| ReviewError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// 从结构名末尾的 `_<值>HU` 解析期望密度，如 `z_AltaHD_+200HU`
pub(crate) fn density_from_name(id: &str) -> Option<f64> {
    let (_, suffix) = id.rsplit_once('_')?;
    let split = suffix.len().checked_sub(2)?;
    let (value, unit) = (suffix.get(..split)?, suffix.get(split..)?);
    if !unit.eq_ignore_ascii_case("HU") {
        return None;
    }
    value.parse().ok()
}

/// 治疗野中是否有 SRS 技术
pub(crate) fn is_srs_plan(plan: &PlanSnapshot) -> bool {
    plan.treatment_beams().any(|b| b.uses_srs_technique())
}
