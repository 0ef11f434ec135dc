//! 疗程命名检查

use crate::core::error::ReviewResult;
use crate::core::models::{Finding, PlanSnapshot, Severity};
use crate::core::profile::ReviewConfig;
use crate::core::rule_engine::Rule;
use crate::rules::compile_pattern;
use regex::Regex;

/// 疗程命名 `RT[n]_*`
pub struct CourseRule {
    pattern: Regex,
}

impl CourseRule {
    pub fn new(config: &ReviewConfig) -> ReviewResult<Self> {
        Ok(Self {
            pattern: compile_pattern(&config.naming.course_pattern)?,
        })
    }
}

impl Rule for CourseRule {
    fn name(&self) -> &str {
        "course"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let Some(course_id) = plan.course_id.as_deref() else {
            return Ok(Vec::new());
        };

        Ok(vec![Finding::check(
            self.pattern.is_match(course_id),
            "Course",
            format!("Course ID '{course_id}' follows the required format (RT[n]_*)"),
            format!("Course ID '{course_id}' does not start with (RT[n]_*)"),
            Severity::Error,
        )])
    }
}
