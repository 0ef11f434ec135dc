//! 能量检查

use crate::core::error::ReviewResult;
use crate::core::models::{Beam, Finding, MachineClass, PlanSnapshot, Severity};
use crate::core::profile::{DoseConfig, MachineConfig, ReviewConfig};
use crate::core::rule_engine::Rule;

/// 能量：Edge 高剂量分次需用 FFF，各治疗野能量一致
pub struct BeamEnergyRule {
    dose: DoseConfig,
    machines: MachineConfig,
}

impl BeamEnergyRule {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            dose: config.dose.clone(),
            machines: config.machines.clone(),
        }
    }
}

impl Rule for BeamEnergyRule {
    fn name(&self) -> &str {
        "beam energy"
    }

    fn evaluate(&self, plan: &PlanSnapshot) -> ReviewResult<Vec<Finding>> {
        let treatment: Vec<&Beam> = plan.treatment_beams().collect();
        let Some(first) = treatment.first() else {
            return Ok(Vec::new());
        };
        let mut findings = Vec::new();

        let threshold = self.dose.high_dose_per_fraction_gy;
        let is_edge = self.machines.classify(Some(&first.machine_id)) == MachineClass::Edge;
        if is_edge && plan.dose_per_fraction_gy >= threshold {
            let allowed = self.dose.high_dose_energies.join(" or ");
            for beam in &treatment {
                let (id, energy) = (&beam.id, &beam.energy);
                findings.push(
                    Finding::check(
                        self.dose.high_dose_energies.contains(energy),
                        "Fields.Energy",
                        format!("Field '{id}' correctly uses FFF energy ({energy}) for dose/fraction ≥{threshold}Gy"),
                        format!("Field '{id}' should use {allowed} energy for dose/fraction ≥{threshold}Gy, found: {energy}"),
                        Severity::Error,
                    )
                    .per_item(),
                );
            }
        }

        let mut energies: Vec<&str> = Vec::new();
        for beam in &treatment {
            if !energies.contains(&beam.energy.as_str()) {
                energies.push(&beam.energy);
            }
        }

        if let [energy] = energies.as_slice() {
            findings.push(Finding::info(
                "Fields.Energy",
                format!("All treatment fields use the same energy: {energy}"),
            ));
        } else {
            findings.push(Finding::warning(
                "Fields.Energy",
                format!(
                    "Treatment fields use different energies: {}. Verify this is clinically intended.",
                    energies.join(", ")
                ),
            ));
            for beam in &treatment {
                findings.push(Finding::info("Fields.Energy", format!("Field '{}': {}", beam.id, beam.energy)).per_item());
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{self, static_beam, EDGE};

    fn run(plan: &PlanSnapshot) -> Vec<Finding> {
        BeamEnergyRule::new(&ReviewConfig::default()).evaluate(plan).unwrap()
    }

    #[test]
    fn test_single_energy() {
        let plan = fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE), static_beam("G0-B", 0.0, EDGE)]);
        let findings = run(&plan);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "All treatment fields use the same energy: 6X");
    }

    #[test]
    fn test_mixed_energies_warn_with_breakdown() {
        let mut b = static_beam("G0-B", 0.0, EDGE);
        b.energy = "10X".to_string();
        let plan = fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE), b]);
        let findings = run(&plan);
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("6X, 10X"));
        assert_eq!(findings[2].message, "Field 'G0-B': 10X");
    }

    #[test]
    fn test_edge_high_dose_requires_fff() {
        let mut plan = fixtures::plan(EDGE, vec![static_beam("G180-A", 180.0, EDGE)]);
        plan.dose_per_fraction_gy = 6.0;
        let findings = run(&plan);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.ends_with("found: 6X"));
    }
}
