//! 端到端审核场景：默认配置的完整规则树 + 结果整理

use crate::core::fixtures::{self, circle_structure, setup_beam, static_beam, EDGE, HALCYON};
use crate::core::models::{Finding, PlanSnapshot, Severity};
use crate::core::profile::ReviewConfig;
use crate::core::report::ReviewReport;
use crate::core::rule_engine::RuleEngine;

fn review(plan: &PlanSnapshot) -> Vec<Finding> {
    crate::logging::init_test();
    RuleEngine::new(&ReviewConfig::default())
        .unwrap()
        .review(plan)
        .unwrap()
}

fn halcyon_plan(setup_name: &str) -> PlanSnapshot {
    fixtures::plan(
        HALCYON,
        vec![static_beam("G180-A", 180.0, HALCYON), setup_beam(setup_name, HALCYON)],
    )
}

fn setup_field_severities(findings: &[Finding]) -> Vec<Severity> {
    fixtures::in_category(findings, "Fields.SetupFields")
        .iter()
        .map(|f| f.severity)
        .collect()
}

#[test]
fn scenario_static_g180_fields_collapse_into_summary() {
    let plan = fixtures::plan(
        EDGE,
        vec![static_beam("G180-A", 180.0, EDGE), static_beam("G180-B", 180.0, EDGE)],
    );
    let findings = review(&plan);

    let names = fixtures::in_category(&findings, "Fields.Names");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].message, "All treatment fields passed Fields.Names checks");
    assert_eq!(names[0].severity, Severity::Info);
    assert!(!names[0].is_per_item);
}

#[test]
fn scenario_single_field_is_not_collapsed() {
    let plan = fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE)]);
    let findings = review(&plan);
    let names = fixtures::in_category(&findings, "Fields.Names");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].message, "Field 'G180-A' follows naming convention");
}

#[test]
fn scenario_halcyon_kvcbct_setup_field() {
    let findings = review(&halcyon_plan("KVCBCT"));
    assert_eq!(setup_field_severities(&findings), vec![Severity::Info, Severity::Info]);

    let renamed = review(&halcyon_plan("CBCT1"));
    assert_eq!(setup_field_severities(&renamed), vec![Severity::Error, Severity::Error]);
}

#[test]
fn scenario_edge_body_clearance() {
    let far = fixtures::with_structures(
        fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE)]),
        vec![circle_structure("BODY", 390.0, 4)],
    );
    let collision = review(&far);
    let collision = fixtures::in_category(&collision, "Collision");
    assert_eq!(collision.len(), 1);
    assert_eq!(collision[0].severity, Severity::Error);

    let near = fixtures::with_structures(
        fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE)]),
        vec![circle_structure("BODY", 360.0, 4)],
    );
    let collision = review(&near);
    assert_eq!(fixtures::in_category(&collision, "Collision")[0].severity, Severity::Info);
}

#[test]
fn scenario_reference_point_without_prefix_is_error() {
    let mut plan = fixtures::plan(EDGE, vec![]);
    plan.reference_points[0].id = "ISO1".to_string();
    plan.primary_reference_point = Some("ISO1".to_string());

    let findings = review(&plan);
    let naming: Vec<_> = fixtures::in_category(&findings, "Dose.ReferencePoint")
        .into_iter()
        .filter(|f| f.message.starts_with("Primary reference point name"))
        .collect();
    assert_eq!(naming.len(), 1);
    assert_eq!(naming[0].severity, Severity::Error);
    assert_eq!(naming[0].message, "Primary reference point name 'ISO1' should start with 'RP_'");
}

#[test]
fn scenario_review_is_deterministic() {
    let plan = fixtures::with_structures(
        fixtures::plan(
            EDGE,
            vec![static_beam("G180-A", 180.0, EDGE), static_beam("G0-B", 0.0, EDGE), setup_beam("CBCT", EDGE)],
        ),
        vec![circle_structure("BODY", 300.0, 3), circle_structure("z_VacBag_-390HU", 250.0, 3)],
    );

    let engine = RuleEngine::new(&ReviewConfig::default()).unwrap();
    let first = ReviewReport::generate(&engine, &plan).unwrap();
    let second = ReviewReport::generate(&engine, &plan).unwrap();

    assert_eq!(first.findings, second.findings);
    assert_eq!(first.digest, second.digest);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        serde_json::to_string(&first.findings).unwrap(),
        serde_json::to_string(&second.findings).unwrap()
    );
}

#[test]
fn scenario_findings_follow_category_order() {
    let findings = review(&fixtures::plan(EDGE, vec![]));
    let categories: Vec<&str> = findings.iter().map(|f| f.category.as_str()).collect();

    let position = |name: &str| categories.iter().position(|c| *c == name).unwrap();
    assert_eq!(categories[0], "Course");
    assert!(position("CT.Curve") < position("Plan.Info"));
    assert!(position("Plan.Info") < position("Collision"));
    assert!(position("Collision") < position("CT.UserOrigin"));
    assert!(position("Fields.Names") < position("Dose.Grid"));
    assert!(position("Dose.Grid") < position("Plan.Optimization"));
}

#[test]
fn scenario_snapshot_loads_from_partial_json() {
    let json = r#"{
        "plan_id": "Plan1",
        "course_id": "C1",
        "beams": [
            { "id": "G90-A", "machine_id": "TrueBeamSN6368",
              "control_points": [ { "gantry_angle": 90.0 } ] }
        ]
    }"#;
    let plan: PlanSnapshot = serde_json::from_str(json).unwrap();
    let findings = review(&plan);

    assert_eq!(findings[0].category, "Course");
    assert_eq!(findings[0].severity, Severity::Error);
    assert!(findings
        .iter()
        .any(|f| f.message == "No primary reference point found in plan"));
}

#[test]
fn scenario_contrast_study_without_contrast_structure_warns() {
    let mut plan = fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE)]);
    if let Some(image) = plan.structure_set.as_mut().and_then(|set| set.image.as_mut()) {
        image.study_comment = "Abdomen contrast".to_string();
    }
    let findings = review(&plan);

    let contrast = fixtures::in_category(&findings, "Structure.Contrast");
    assert_eq!(contrast.len(), 1);
    assert_eq!(contrast[0].severity, Severity::Warning);
}
