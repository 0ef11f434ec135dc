//! 结果整理
//!
//! 按类别分组；同一类别下全部是单条目 Info 且多于一条时，折叠成一条汇总。
//! 只做展示压缩，不会隐藏 Warning / Error，也不会折叠单条结果。

use crate::core::models::{Finding, Severity};

/// 类别显示顺序（按前缀匹配），未列出的类别排在最后
const CATEGORY_ORDER: &[(&str, u32)] = &[
    ("Course", 10),
    ("CT.Curve", 20),
    ("Plan.Info", 30),
    ("PlanningStructures", 40),
    ("Fixation", 50),
    ("Collision", 60),
    ("CT.UserOrigin", 70),
    ("Fields", 80),
    ("Dose", 90),
    ("Plan.Optimization", 100),
];

const UNKNOWN_CATEGORY_ORDER: u32 = 999;

pub fn category_order(category: &str) -> u32 {
    CATEGORY_ORDER
        .iter()
        .find(|(prefix, _)| category.starts_with(prefix))
        .map(|(_, order)| *order)
        .unwrap_or(UNKNOWN_CATEGORY_ORDER)
}

/// 折叠并排序
///
/// 类别之间按显示顺序排序，顺序相同时按类别名排序；类别内部保持原顺序。
pub fn aggregate(findings: Vec<Finding>) -> Vec<Finding> {
    let mut groups: Vec<(String, Vec<Finding>)> = Vec::new();
    for finding in findings {
        match groups.iter_mut().find(|(category, _)| *category == finding.category) {
            Some((_, members)) => members.push(finding),
            None => groups.push((finding.category.clone(), vec![finding])),
        }
    }

    groups.sort_by(|(a, _), (b, _)| category_order(a).cmp(&category_order(b)).then_with(|| a.cmp(b)));

    groups
        .into_iter()
        .flat_map(|(category, members)| collapse(category, members))
        .collect()
}

fn collapse(category: String, members: Vec<Finding>) -> Vec<Finding> {
    let collapsible = members.len() > 1
        && members
            .iter()
            .all(|f| f.is_per_item && f.severity == Severity::Info);
    if !collapsible {
        return members;
    }

    let message = members
        .iter()
        .find_map(|f| f.collapsed_summary.clone())
        .unwrap_or_else(|| format!("All treatment fields passed {category} checks"));
    vec![Finding::info(category, message)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(category: &str, severity: Severity) -> Finding {
        Finding::new(category, "Field 'G0-A' ok", severity).per_item()
    }

    #[test]
    fn test_passing_per_item_findings_collapse() {
        let out = aggregate(vec![field("Fields.Names", Severity::Info), field("Fields.Names", Severity::Info)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, "All treatment fields passed Fields.Names checks");
        assert_eq!(out[0].severity, Severity::Info);
        assert!(!out[0].is_per_item);
    }

    #[test]
    fn test_custom_summary_is_used() {
        let out = aggregate(vec![
            field("Fields.Geometry.ToleranceTable", Severity::Info).with_summary("All fields use EDGE"),
            field("Fields.Geometry.ToleranceTable", Severity::Info).with_summary("All fields use EDGE"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, "All fields use EDGE");
    }

    #[test]
    fn test_warning_blocks_collapse() {
        let input = vec![
            field("Fields.Names", Severity::Info),
            field("Fields.Names", Severity::Warning),
            field("Fields.Names", Severity::Info),
        ];
        let out = aggregate(input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn test_single_or_mixed_findings_pass_through() {
        let single = vec![field("Fields.Names", Severity::Info)];
        assert_eq!(aggregate(single.clone()), single);

        let mixed = vec![
            Finding::info("Fields.SetupFields", "Plan has the required 1 setup field for Halcyon"),
            field("Fields.SetupFields", Severity::Info),
        ];
        assert_eq!(aggregate(mixed.clone()), mixed);
    }

    #[test]
    fn test_categories_follow_display_order() {
        let out = aggregate(vec![
            Finding::info("Dose.Grid", "grid"),
            Finding::info("Custom", "custom"),
            Finding::info("Course", "course"),
            Finding::info("Fields.Energy", "energy"),
            Finding::info("Dose.Grid", "grid 2"),
        ]);
        let categories: Vec<_> = out.iter().map(|f| f.category.as_str()).collect();
        assert_eq!(
            categories,
            vec!["Course", "Fields.Energy", "Dose.Grid", "Dose.Grid", "Custom"]
        );
        assert_eq!(out[3].message, "grid 2");
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let input = vec![
            field("Fields.Names", Severity::Info),
            Finding::error("Dose.ReferencePoint", "x"),
            field("Fields.Names", Severity::Info),
        ];
        assert_eq!(aggregate(input.clone()), aggregate(input));
    }
}
