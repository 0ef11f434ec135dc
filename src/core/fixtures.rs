//! 测试用计划快照构造

use crate::core::models::*;

pub const HALCYON: &str = "Halcyon1";
pub const EDGE: &str = "TrueBeamSN6368";

fn control_point(gantry: f64) -> ControlPoint {
    ControlPoint {
        gantry_angle: gantry,
        couch_angle: 0.0,
        collimator_angle: 30.0,
        jaws: JawPositions {
            x1: -50.0,
            x2: 50.0,
            y1: -50.0,
            y2: 50.0,
        },
    }
}

pub fn static_beam(id: &str, gantry: f64, machine: &str) -> Beam {
    Beam {
        id: id.to_string(),
        machine_id: machine.to_string(),
        energy: "6X".to_string(),
        dose_rate: 600.0,
        technique: "STATIC".to_string(),
        gantry_direction: GantryDirection::None,
        tolerance_table: tolerance_table(machine).to_string(),
        control_points: vec![control_point(gantry), control_point(gantry)],
        ..Default::default()
    }
}

pub fn arc_beam(id: &str, start: f64, end: f64, direction: GantryDirection, machine: &str) -> Beam {
    Beam {
        technique: "ARC".to_string(),
        gantry_direction: direction,
        control_points: vec![control_point(start), control_point(end)],
        ..static_beam(id, start, machine)
    }
}

pub fn setup_beam(id: &str, machine: &str) -> Beam {
    Beam {
        is_setup_field: true,
        ..static_beam(id, 0.0, machine)
    }
}

pub fn with_couch(mut beam: Beam, couch: f64) -> Beam {
    for cp in &mut beam.control_points {
        cp.couch_angle = couch;
    }
    beam
}

pub fn with_collimator(mut beam: Beam, collimator: f64) -> Beam {
    for cp in &mut beam.control_points {
        cp.collimator_angle = collimator;
    }
    beam
}

fn tolerance_table(machine: &str) -> &'static str {
    if machine == EDGE {
        "EDGE"
    } else {
        "HAL"
    }
}

/// 以原点为圆心、半径 `radius_mm` 的 36 边形，每层一条轮廓
pub fn circle_structure(id: &str, radius_mm: f64, planes: usize) -> Structure {
    let contour: Contour = (0..36)
        .map(|i| {
            let a = f64::from(i) * 10.0_f64.to_radians();
            Point3::new(radius_mm * a.cos(), radius_mm * a.sin(), 0.0)
        })
        .collect();
    Structure {
        id: id.to_string(),
        assigned_hu: None,
        contours: vec![vec![contour]; planes],
    }
}

/// 单个点组成的结构，用来精确控制最远距离
pub fn point_structure(id: &str, x: f64, y: f64) -> Structure {
    Structure {
        id: id.to_string(),
        assigned_hu: None,
        contours: vec![vec![vec![Point3::new(x, y, 0.0)]]],
    }
}

pub fn image() -> Image {
    Image {
        id: "CT_1".to_string(),
        series_comment: "Pelvis".to_string(),
        imaging_device_id: "CT130265".to_string(),
        user_origin: Point3::new(0.0, -200.0, 0.0),
        x_res: 1.0,
        y_res: 1.0,
        z_res: 2.5,
        x_size: 4,
        y_size: 4,
        z_size: 2,
        ..Default::default()
    }
}

/// 2 Gy × 25 次、参考点剂量正确的计划
pub fn plan(machine: &str, beams: Vec<Beam>) -> PlanSnapshot {
    PlanSnapshot {
        plan_id: "Plan1".to_string(),
        course_id: Some("RT1_Prostate".to_string()),
        treatment_orientation: "Head First-Supine".to_string(),
        total_dose_gy: 50.0,
        dose_per_fraction_gy: 2.0,
        dose_grid_resolution_mm: Some(2.0),
        beams: if beams.is_empty() {
            vec![static_beam("G180-A", 180.0, machine)]
        } else {
            beams
        },
        reference_points: vec![ReferencePoint {
            id: "RP_Prostate".to_string(),
            kind: ReferencePointKind::Target,
            total_dose_limit_gy: 50.1,
            daily_dose_limit_gy: 2.1,
            session_dose_limit_gy: 2.1,
        }],
        primary_reference_point: Some("RP_Prostate".to_string()),
        prescription: Some(Prescription {
            targets: vec![PrescriptionTarget {
                id: "PTV".to_string(),
                dose_per_fraction_gy: 2.0,
                fractions: 25,
            }],
        }),
        optimization: Some(OptimizationSetup {
            jaw_tracking_used: true,
            aperture_shape_controller: None,
        }),
        structure_set: Some(StructureSet {
            id: "CT_1".to_string(),
            image: Some(image()),
            structures: vec![circle_structure("BODY", 150.0, 2)],
        }),
        ..Default::default()
    }
}

pub fn with_structures(mut plan: PlanSnapshot, structures: Vec<Structure>) -> PlanSnapshot {
    if let Some(set) = plan.structure_set.as_mut() {
        set.structures = structures;
    }
    plan
}

/// 指定类别的结果
pub fn in_category<'a>(findings: &'a [Finding], category: &str) -> Vec<&'a Finding> {
    findings.iter().filter(|f| f.category == category).collect()
}
