//! 摆位野检查

use crate::core::error::ReviewResult;
use crate::core::models::{starts_with_ignore_case, Beam, Finding, MachineClass, PlanSnapshot, Severity};
use crate::core::profile::{MachineConfig, ReviewConfig, SetupFieldConfig};
use crate::core::rule_engine::Rule;

/// 摆位野数量、名称与能量
pub struct SetupFieldsRule {
    config: SetupFieldConfig,
    machines: MachineConfig,
}

impl SetupFieldsRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            config: config.setup_fields.clone(),
            machines: config.machines.clone(),
        }
    }

    fn is_halcyon_name(&self, beam: &Beam) -> bool {
        beam.id.eq_ignore_ascii_case(&self.config.halcyon_name)
    }

    /// Halcyon：只能有一个 kVCBCT，名称不符时数量也不算数
    fn halcyon_findings(&self, setup: &[&Beam], findings: &mut Vec<Finding>) {
        let expected = self.config.halcyon_count;
        let name = &self.config.halcyon_name;
        let named = setup.iter().filter(|b| self.is_halcyon_name(b)).count();
        let count_ok = setup.len() == expected && named == expected;
        findings.push(Finding::check(
            count_ok,
            "Fields.SetupFields",
            format!("Plan has the required {expected} setup field for Halcyon"),
            format!(
                "Invalid setup field count for Halcyon: {} setup field(s), {named} named '{name}' (should be {expected})",
                setup.len()
            ),
            Severity::Error,
        ));

        for beam in setup {
            findings.push(
                Finding::check(
                    self.is_halcyon_name(beam),
                    "Fields.SetupFields",
                    format!("Setup field '{}' configuration is valid for Halcyon", beam.id),
                    format!("Invalid setup field for Halcyon: should be '{name}'"),
                    Severity::Error,
                )
                .per_item(),
            );
        }
    }

    fn edge_count_findings(&self, setup: &[&Beam], findings: &mut Vec<Finding>) {
        let expected = self.config.edge_count;
        let count_ok = setup.len() == expected;
        findings.push(Finding::check(
            count_ok,
            "Fields.SetupFields",
            format!("Plan has the required {expected} setup fields for Edge"),
            format!("Invalid setup field count for Edge: {} (should be {expected})", setup.len()),
            Severity::Error,
        ));

        let required = &self.config.edge_required_names;
        let all_present = required
            .iter()
            .all(|name| setup.iter().any(|b| b.id.eq_ignore_ascii_case(name)));
        if count_ok && !all_present {
            let names: Vec<String> = required.iter().map(|n| format!("'{n}'")).collect();
            findings.push(Finding::error(
                "Fields.SetupFields",
                format!("Edge setup fields should be named {}", names.join(" and ")),
            ));
        }
    }

    /// 非 Halcyon：名称为 CBCT 或 SF-*，能量 6X/10X
    fn field_finding(&self, beam: &Beam) -> Finding {
        let id = &beam.id;
        let energy = &beam.energy;
        let valid_name = id.eq_ignore_ascii_case("CBCT") || starts_with_ignore_case(id, &self.config.name_prefix);
        let valid_energy = self.config.allowed_energies.iter().any(|e| e == energy);
        Finding::check(
            valid_name && valid_energy,
            "Fields.SetupFields",
            format!("Setup field '{id}' configuration is valid"),
            format!("Invalid setup field configuration: {id} with energy {energy}"),
            Severity::Error,
        )
        .per_item()
    }
}

impl Rule for SetupFieldsRule {
    fn name(&self) -> &str {
        "setup fields"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        if plan.beams.is_empty() {
            return Ok(Vec::new());
        }
        let setup: Vec<&Beam> = plan.setup_beams().collect();
        let mut findings = Vec::new();

        match self.machines.classify(plan.machine_id()) {
            MachineClass::Halcyon => self.halcyon_findings(&setup, &mut findings),
            MachineClass::Edge => {
                self.edge_count_findings(&setup, &mut findings);
                findings.extend(setup.iter().map(|b| self.field_finding(b)));
            }
            MachineClass::Unknown => findings.extend(setup.iter().map(|b| self.field_finding(b))),
        }

        Ok(findings)
    }
}
