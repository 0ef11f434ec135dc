//! 计划辅助结构检查

use crate::core::error::{ReviewError, ReviewResult};
use crate::core::models::{Finding, Image, PlanSnapshot, Severity, Structure};
use crate::core::profile::{PlanningStructureConfig, ReviewConfig};
use crate::core::rule_engine::Rule;
use crate::rules::density_from_name;

const CATEGORY: &str = "PlanningStructures.z_Air Density";

/// 空气密度覆盖结构 `z_Air_<值>HU`
///
/// 先核对覆盖值，再按步长抽样结构内的原始 CT 值，偏高体素比例不应超过上限。
pub struct PlanningStructuresRule {
    config: PlanningStructureConfig,
}

/// 抽样统计
#[derive(Debug, Default, PartialEq)]
struct VoxelSample {
    inside: usize,
    above: usize,
}

impl PlanningStructuresRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.planning_structures.clone(),
        }
    }

    fn override_finding(&self, structure: &Structure, expected: f64) -> Finding {
        let id = &structure.id;
        match structure.assigned_hu {
            Some(actual) => Finding::check(
                (actual - expected).abs() < self.config.density_tolerance_hu,
                CATEGORY,
                format!("Air structure '{id}' has correct density override ({actual} HU)"),
                format!("Air structure '{id}' has incorrect density override: {actual} HU (expected: {expected} HU)"),
                Severity::Error,
            ),
            None => Finding::error(
                CATEGORY,
                format!("Air structure '{id}' has no density override assigned (expected: {expected} HU)"),
            ),
        }
    }

    fn sample(&self, image: &Image, structure: &Structure, threshold: f64) -> VoxelSample {
        let xy_stride = self.config.xy_stride.max(1);
        let z_stride = self.config.z_stride.max(1);
        let mut sample = VoxelSample::default();

        for z in (0..image.z_size).step_by(z_stride) {
            if structure.contours_on_plane(z).is_empty() {
                continue;
            }
            for x in (0..image.x_size).step_by(xy_stride) {
                for y in (0..image.y_size).step_by(xy_stride) {
                    if !structure.contains_point(z, image.voxel_position(x, y, z)) {
                        continue;
                    }
                    let Some(hu) = image.hu_at(x, y, z) else {
                        continue;
                    };
                    sample.inside += 1;
                    if hu > threshold {
                        sample.above += 1;
                    }
                }
            }
        }
        sample
    }
}

/// 维度与体素数据不一致时无法抽样
fn check_voxel_grid(image: &Image) -> ReviewResult<()> {
    if image.voxel_count() == Some(image.hu_values.len()) {
        return Ok(());
    }
    Err(ReviewError::MalformedGeometry {
        owner: format!("image {}", image.id),
        detail: format!(
            "{}x{}x{} voxel grid does not match {} HU values",
            image.x_size,
            image.y_size,
            image.z_size,
            image.hu_values.len()
        ),
    })
}

impl Rule for PlanningStructuresRule {
    fn name(&self) -> &str {
        "planning structures"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let mut findings = Vec::new();
        let air = plan.structures().iter().filter(|s| s.has_prefix(&self.config.air_prefix));

        for structure in air {
            let Some(expected) = density_from_name(&structure.id) else {
                continue;
            };
            findings.push(self.override_finding(structure, expected));

            let Some(image) = plan.image().filter(|image| image.has_voxels()) else {
                continue;
            };
            check_voxel_grid(image)?;
            let threshold = expected + self.config.hu_threshold_offset;
            let sample = self.sample(image, structure, threshold);
            if sample.inside == 0 {
                continue;
            }

            let percent = sample.above as f64 / sample.inside as f64 * 100.0;
            let limit = self.config.max_percent_above;
            let id = &structure.id;
            findings.push(Finding::check(
                percent <= limit,
                CATEGORY,
                format!("Air structure '{id}': {percent:.1}% of voxels exceed {threshold} HU (within {limit}% limit)"),
                format!("Air structure '{id}': {percent:.1}% of voxels exceed {threshold} HU (exceeds {limit}% limit)"),
                Severity::Warning,
            ));
        }

        Ok(findings)
    }
}
