//! 规则引擎模块
//!
//! 规则组成一棵树：叶子是单项检查，规则组按注册顺序依次执行子规则并拼接结果。
//! 规则树在启动时按配置构建一次，之后只读，可在多次审核间复用。

use crate::core::aggregator::aggregate;
use crate::core::error::ReviewResult;
use crate::core::models::{Finding, PlanSnapshot};
use crate::core::profile::ReviewConfig;
use crate::rules::{
    BeamEnergyRule, CollisionRule, ContrastStructureRule, CourseRule, CtAndPatientRule, DoseRule,
    FieldGeometryRule, FieldNamesRule, FixationRule, OptimizationRule, PlanInfoRule,
    PlanningStructuresRule, ReferencePointRule, SetupFieldsRule,
};

/// 单项检查
///
/// `evaluate` 只读取快照，不修改任何全局状态；前提条件缺失时可以不输出结果。
pub trait Rule: Send + Sync {
    /// 规则名称（用于日志）
    fn name(&self) -> &str;

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>>;
}

/// 规则组
///
/// 执行顺序：前置规则 → 子规则（注册顺序）→ 后置规则。
pub struct RuleGroup {
    name: String,
    prologue: Vec<Box<dyn Rule>>,
    children: Vec<Box<dyn Rule>>,
    epilogue: Vec<Box<dyn Rule>>,
}

impl RuleGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prologue: Vec::new(),
            children: Vec::new(),
            epilogue: Vec::new(),
        }
    }

    /// 添加子规则
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.children.push(rule);
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.add_rule(Box::new(rule));
        self
    }

    /// 在子规则之前执行
    pub fn with_prologue(mut self, rule: impl Rule + 'static) -> Self {
        self.prologue.push(Box::new(rule));
        self
    }

    /// 在子规则之后执行
    pub fn with_epilogue(mut self, rule: impl Rule + 'static) -> Self {
        self.epilogue.push(Box::new(rule));
        self
    }

    pub fn children(&self) -> &[Box<dyn Rule>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.prologue.len() + self.children.len() + self.epilogue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Rule for RuleGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let mut findings = Vec::new();
        let stages = [&self.prologue, &self.children, &self.epilogue];
        for rule in stages.into_iter().flatten() {
            let produced = rule.evaluate(plan)?;
            tracing::debug!(group = %self.name, rule = rule.name(), count = produced.len(), "规则执行完成");
            findings.extend(produced);
        }
        Ok(findings)
    }
}

/// 按配置构建规则树
///
/// ```text
/// root
/// ├── course
/// └── plan (后置: plan info)
///     ├── ct & patient
///     ├── dose
///     ├── fields (names, geometry, setup fields, energy)
///     ├── reference points
///     ├── fixation
///     ├── collision
///     ├── optimization
///     └── planning structures
/// ```
pub fn build_root_group(config: &ReviewConfig) -> ReviewResult<RuleGroup> {
    let fields = RuleGroup::new("fields")
        .with_rule(FieldNamesRule::new(config)?)
        .with_rule(FieldGeometryRule::new(config))
        .with_rule(SetupFieldsRule::new(config))
        .with_rule(BeamEnergyRule::new(config));

    let plan = RuleGroup::new("plan")
        .with_rule(CtAndPatientRule::new(config))
        .with_rule(DoseRule::new(config))
        .with_rule(fields)
        .with_rule(ReferencePointRule::new(config))
        .with_rule(FixationRule::new(config))
        .with_rule(CollisionRule::new(config))
        .with_rule(OptimizationRule::new(config))
        .with_rule(PlanningStructuresRule::new(config))
        .with_rule(ContrastStructureRule::new(config))
        .with_epilogue(PlanInfoRule::new(config));

    Ok(RuleGroup::new("root")
        .with_rule(CourseRule::new(config)?)
        .with_rule(plan))
}

/// 规则引擎
pub struct RuleEngine {
    root: RuleGroup,
}

impl RuleEngine {
    /// 按配置创建规则引擎
    pub fn new(config: &ReviewConfig) -> ReviewResult<Self> {
        Ok(Self {
            root: build_root_group(config)?,
        })
    }

    pub fn root(&self) -> &RuleGroup {
        &self.root
    }

    /// 原始结果：规则树深度优先执行的顺序
    pub fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        self.root.evaluate(plan)
    }

    /// 折叠并排序后的结果
    pub fn review(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let raw = self.evaluate(plan)?;
        tracing::info!(plan = %plan.plan_id, findings = raw.len(), "计划审核完成");
        Ok(aggregate(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ReviewError;
    use crate::core::models::Severity;

    struct Fixed {
        name: &'static str,
        findings: Vec<Finding>,
    }

    impl Rule for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn evaluate(&self, _plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
            Ok(self.findings.clone())
        }
    }

    struct Failing;

    impl Rule for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, _plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
            Err(ReviewError::MissingControlPoints("G0-A".to_string()))
        }
    }

    fn fixed(name: &'static str, message: &str) -> Fixed {
        Fixed {
            name,
            findings: vec![Finding::info("Test", message)],
        }
    }

    fn messages(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn test_group_preserves_registration_order() {
        let inner = RuleGroup::new("inner").with_rule(fixed("b", "b")).with_rule(fixed("c", "c"));
        let group = RuleGroup::new("outer")
            .with_epilogue(fixed("z", "z"))
            .with_rule(fixed("a", "a"))
            .with_rule(inner)
            .with_prologue(fixed("p", "p"))
            .with_rule(Fixed {
                name: "empty",
                findings: vec![],
            });

        let findings = group.evaluate(&PlanSnapshot::default()).unwrap();
        assert_eq!(messages(&findings), vec!["p", "a", "b", "c", "z"]);
        assert_eq!(group.len(), 5);
    }

    #[test]
    fn test_child_error_aborts_whole_run() {
        let group = RuleGroup::new("root").with_rule(fixed("a", "a")).with_rule(Failing);
        assert!(group.evaluate(&PlanSnapshot::default()).is_err());
    }

    #[test]
    fn test_default_tree_builds() {
        let engine = RuleEngine::new(&ReviewConfig::default()).unwrap();
        assert_eq!(engine.root().children().len(), 2);
        assert_eq!(engine.root().children()[1].name(), "plan");
    }

    #[test]
    fn test_invalid_pattern_fails_construction() {
        let mut config = ReviewConfig::default();
        config.naming.course_pattern = "^RT(".to_string();
        assert!(matches!(
            RuleEngine::new(&config),
            Err(ReviewError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_empty_plan_reports_missing_reference_point() {
        let engine = RuleEngine::new(&ReviewConfig::default()).unwrap();
        let findings = engine.review(&PlanSnapshot::default()).unwrap();
        assert!(findings
            .iter()
            .any(|f| f.category == "Dose.ReferencePoint" && f.severity == Severity::Error));
    }
}
