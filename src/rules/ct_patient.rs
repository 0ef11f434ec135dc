//! CT 与摆位原点检查

use crate::core::error::ReviewResult;
use crate::core::models::{starts_with_ignore_case, Finding, PlanSnapshot, Severity};
use crate::core::profile::{CtConfig, ReviewConfig};
use crate::core::rule_engine::Rule;

/// 摆位原点与 CT 设备（HU 曲线）
///
/// 界面上的 Y/Z 与 DICOM 坐标不同：DICOM z 显示为 Y，DICOM -y 显示为 Z。
pub struct CtAndPatientRule {
    config: CtConfig,
}

impl CtAndPatientRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.ct.clone(),
        }
    }

    /// 以 Head 开头、但不是头颈部的序列
    fn is_head_scan(series_comment: &str) -> bool {
        starts_with_ignore_case(series_comment, "Head")
            && !starts_with_ignore_case(series_comment, "Head and Neck")
            && !starts_with_ignore_case(series_comment, "Head & Neck")
    }
}

impl Rule for CtAndPatientRule {
    fn name(&self) -> &str {
        "ct and patient"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let Some(image) = plan.image() else {
            return Ok(Vec::new());
        };
        let origin = image.user_origin;
        let limit = self.config.user_origin_limit_cm;
        let mut findings = Vec::with_capacity(4);

        for (axis, value_mm) in [("X", origin.x), ("Y", origin.z)] {
            let value_cm = value_mm / 10.0;
            findings.push(Finding::check(
                value_cm.abs() <= limit,
                "CT.UserOrigin",
                format!("User Origin {axis} coordinate ({value_cm:.1} cm) is within {limit} cm limits"),
                format!("User Origin {axis} coordinate ({value_cm:.1} cm) is outside acceptable limits"),
                Severity::Warning,
            ));
        }

        let (y_min, y_max) = (self.config.user_origin_y_min_mm, self.config.user_origin_y_max_mm);
        let vertical_cm = -origin.y / 10.0;
        findings.push(Finding::check(
            (y_min..=y_max).contains(&origin.y),
            "CT.UserOrigin",
            format!("User Origin Z coordinate ({vertical_cm:.1} cm) is within limits"),
            format!(
                "User Origin Z coordinate ({vertical_cm:.1} cm) is outside limits ({} to {} cm)",
                -y_max / 10.0,
                -y_min / 10.0
            ),
            Severity::Warning,
        ));

        let is_head = Self::is_head_scan(&image.series_comment);
        let expected = if is_head {
            &self.config.head_device
        } else {
            &self.config.body_device
        };
        let device = &image.imaging_device_id;
        let region = if is_head { "head" } else { "non-head" };
        findings.push(Finding::check(
            device == expected,
            "CT.Curve",
            format!("Correct imaging device '{device}' used for {region} CT series"),
            format!(
                "Incorrect imaging device '{device}' used. Expected: '{expected}' for {region} scan (CT series: '{}')",
                image.series_comment
            ),
            Severity::Error,
        ));

        Ok(findings)
    }
}
