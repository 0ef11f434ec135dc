//! 增强扫描结构检查

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, PlanSnapshot, Severity};
use crate::core::profile::{ContrastConfig, ReviewConfig};
use crate::core::rule_engine::Rule;

const CATEGORY: &str = "Structure.Contrast";

/// 检查备注标明增强扫描时，应勾画造影剂结构
pub struct ContrastStructureRule {
    config: ContrastConfig,
}

impl ContrastStructureRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.contrast.clone(),
        }
    }
}

impl Rule for ContrastStructureRule {
    fn name(&self) -> &str {
        "contrast structure"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let Some(image) = plan.image() else {
            return Ok(Vec::new());
        };
        let keyword = self.config.study_keyword.to_lowercase();
        if keyword.is_empty() || !image.study_comment.to_lowercase().contains(&keyword) {
            return Ok(Vec::new());
        }

        let prefix = &self.config.structure_prefix;
        let present = plan.structures().iter().any(|s| s.has_prefix(prefix));
        Ok(vec![Finding::check(
            present,
            CATEGORY,
            format!("Study contains contrast imaging and {prefix}* structure exists"),
            format!(
                "Study comment contains '{}' but {prefix}* structure is missing. Consider adding {prefix} structure if needed.",
                self.config.study_keyword
            ),
            Severity::Warning,
        )])
    }
}
