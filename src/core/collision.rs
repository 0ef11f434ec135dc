//! 碰撞风险扫描
//!
//! 逐层遍历结构轮廓点，计算在垂直于旋转轴的平面内离等中心的最大径向距离，
//! 可选地只保留机架实际经过的角度范围内的点。

use crate::core::error::{ReviewError, ReviewResult};
use crate::core::models::{Point3, Severity, Structure};
use crate::core::profile::{ClearanceMetric, CollisionProfile};
use crate::core::sector::{
    build_sectors, is_angle_covered, is_full_coverage, normalize_angle, AngularSector, ArcSweep,
};
use serde::{Deserialize, Serialize};

/// 角度过滤方式
#[derive(Debug, Clone, PartialEq)]
pub enum AngularFilter {
    /// 检查整个圆周
    FullCircle,
    /// 只检查落在扇区内的点
    Sectors(Vec<AngularSector>),
}

impl AngularFilter {
    /// 覆盖达到 180° 时检查全周，否则按扇区过滤
    pub fn for_sweeps(sweeps: &[ArcSweep], arc_margin: f64, static_margin: f64) -> Self {
        if sweeps.is_empty() || is_full_coverage(sweeps) {
            return AngularFilter::FullCircle;
        }
        let sectors = build_sectors(sweeps, arc_margin, static_margin);
        if sectors.is_empty() {
            AngularFilter::FullCircle
        } else {
            AngularFilter::Sectors(sectors)
        }
    }

    pub fn admits(&self, angle: f64) -> bool {
        match self {
            AngularFilter::FullCircle => true,
            AngularFilter::Sectors(sectors) => is_angle_covered(angle, sectors),
        }
    }

    pub fn is_full_circle(&self) -> bool {
        matches!(self, AngularFilter::FullCircle)
    }
}

/// 患者方位（按最远点相对等中心的角度划分，每象限 90°，偏移 45°）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnatomicalDirection {
    Left,
    Anterior,
    Right,
    Posterior,
}

impl AnatomicalDirection {
    /// `degrees` 为 atan2 结果，范围 (-180, 180]
    pub fn from_angle(degrees: f64) -> Self {
        if (-45.0..45.0).contains(&degrees) {
            AnatomicalDirection::Left
        } else if (45.0..135.0).contains(&degrees) {
            AnatomicalDirection::Anterior
        } else if degrees >= 135.0 || degrees < -135.0 {
            AnatomicalDirection::Right
        } else {
            AnatomicalDirection::Posterior
        }
    }
}

impl std::fmt::Display for AnatomicalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnatomicalDirection::Left => write!(f, "left"),
            AnatomicalDirection::Anterior => write!(f, "anterior"),
            AnatomicalDirection::Right => write!(f, "right"),
            AnatomicalDirection::Posterior => write!(f, "posterior"),
        }
    }
}

/// 单个结构的扫描结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialScanResult {
    pub structure_id: String,
    /// 最大径向距离（mm）
    pub max_distance_mm: f64,
    /// 产生最大距离的轮廓点
    pub furthest_point: Point3,
}

impl RadialScanResult {
    pub fn distance_cm(&self) -> f64 {
        self.max_distance_mm / 10.0
    }

    /// 到旋转边界的剩余距离（cm），正数表示安全
    pub fn clearance_cm(&self, boundary_radius_mm: f64) -> f64 {
        (boundary_radius_mm - self.max_distance_mm) / 10.0
    }

    pub fn direction_from(&self, center: Point3) -> AnatomicalDirection {
        let dy = self.furthest_point.y - center.y;
        let dx = self.furthest_point.x - center.x;
        AnatomicalDirection::from_angle(dy.atan2(dx).to_degrees())
    }
}

/// 扫描器
pub struct CollisionRiskScanner {
    center: Point3,
    filter: AngularFilter,
}

impl CollisionRiskScanner {
    pub fn new(center: Point3, filter: AngularFilter) -> ReviewResult<Self> {
        if !center.is_finite() {
            return Err(ReviewError::MalformedGeometry {
                owner: "isocenter".to_string(),
                detail: format!("non-finite position {center:?}"),
            });
        }
        Ok(Self { center, filter })
    }

    pub fn filter(&self) -> &AngularFilter {
        &self.filter
    }

    /// 扫描单个结构；没有保留下来的点时返回 None
    pub fn scan_structure(&self, structure: &Structure) -> ReviewResult<Option<RadialScanResult>> {
        let mut best: Option<(f64, Point3)> = None;

        for plane in &structure.contours {
            for contour in plane {
                for &point in contour {
                    if !point.is_finite() {
                        return Err(ReviewError::MalformedGeometry {
                            owner: structure.id.clone(),
                            detail: format!("non-finite contour point {point:?}"),
                        });
                    }

                    let dx = point.x - self.center.x;
                    let dy = point.y - self.center.y;

                    if !self.filter.is_full_circle() {
                        let angle = normalize_angle(dy.atan2(dx).to_degrees());
                        if !self.filter.admits(angle) {
                            continue;
                        }
                    }

                    let distance = (dx * dx + dy * dy).sqrt();
                    if best.map_or(true, |(max, _)| distance > max) {
                        best = Some((distance, point));
                    }
                }
            }
        }

        Ok(best.map(|(max_distance_mm, furthest_point)| RadialScanResult {
            structure_id: structure.id.clone(),
            max_distance_mm,
            furthest_point,
        }))
    }

    /// 依次扫描多个结构，跳过没有点的结构
    pub fn scan_all<'a, I>(&self, structures: I) -> ReviewResult<Vec<RadialScanResult>>
    where
        I: IntoIterator<Item = &'a Structure>,
    {
        let mut results = Vec::new();
        for structure in structures {
            match self.scan_structure(structure)? {
                Some(result) => results.push(result),
                None => tracing::debug!(structure = %structure.id, "结构没有可用的轮廓点"),
            }
        }
        Ok(results)
    }
}

/// 最危险结构的评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionAssessment {
    pub worst: RadialScanResult,
    pub clearance_cm: f64,
    pub distance_cm: f64,
    pub direction: AnatomicalDirection,
    pub severity: Severity,
}

/// 选出余量最小的结构并分级
pub fn assess(
    results: &[RadialScanResult],
    center: Point3,
    profile: &CollisionProfile,
) -> Option<CollisionAssessment> {
    let worst = results
        .iter()
        .min_by(|a, b| {
            a.clearance_cm(profile.boundary_radius_mm)
                .total_cmp(&b.clearance_cm(profile.boundary_radius_mm))
        })?
        .clone();

    let clearance_cm = worst.clearance_cm(profile.boundary_radius_mm);
    let distance_cm = worst.distance_cm();
    let severity = classify(profile, clearance_cm, distance_cm);
    let direction = worst.direction_from(center);

    Some(CollisionAssessment {
        worst,
        clearance_cm,
        distance_cm,
        direction,
        severity,
    })
}

/// 按两个阈值分级：越过严格阈值为 Error，越过宽松阈值为 Warning
pub fn classify(profile: &CollisionProfile, clearance_cm: f64, distance_cm: f64) -> Severity {
    match profile.metric {
        ClearanceMetric::Clearance => {
            if clearance_cm < profile.error_threshold_cm {
                Severity::Error
            } else if clearance_cm < profile.warning_threshold_cm {
                Severity::Warning
            } else {
                Severity::Info
            }
        }
        ClearanceMetric::Distance => {
            if distance_cm > profile.error_threshold_cm {
                Severity::Error
            } else if distance_cm > profile.warning_threshold_cm {
                Severity::Warning
            } else {
                Severity::Info
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sector::RotationDirection;

    /// 以原点为中心、半径 r 的多边形轮廓，n 个点
    fn ring(id: &str, radius: f64, points: usize, planes: usize) -> Structure {
        let contour: Vec<Point3> = (0..points)
            .map(|i| {
                let a = (i as f64) * std::f64::consts::TAU / points as f64;
                Point3::new(radius * a.cos(), radius * a.sin(), 0.0)
            })
            .collect();
        Structure {
            id: id.to_string(),
            assigned_hu: None,
            contours: vec![vec![contour]; planes],
        }
    }

    fn point_structure(id: &str, points: &[(f64, f64)]) -> Structure {
        Structure {
            id: id.to_string(),
            assigned_hu: None,
            contours: vec![vec![points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect()]],
        }
    }

    #[test]
    fn test_full_circle_scan_finds_furthest_point() {
        let scanner = CollisionRiskScanner::new(Point3::default(), AngularFilter::FullCircle).unwrap();
        let body = point_structure("BODY", &[(100.0, 0.0), (0.0, -250.0), (-30.0, 40.0)]);

        let result = scanner.scan_structure(&body).unwrap().unwrap();
        assert_eq!(result.max_distance_mm, 250.0);
        assert_eq!(result.furthest_point, Point3::new(0.0, -250.0, 0.0));
        assert_eq!(result.direction_from(Point3::default()), AnatomicalDirection::Posterior);
    }

    #[test]
    fn test_axial_coordinate_is_ignored() {
        let scanner = CollisionRiskScanner::new(Point3::new(0.0, 0.0, 50.0), AngularFilter::FullCircle).unwrap();
        let s = Structure {
            id: "BODY".to_string(),
            assigned_hu: None,
            contours: vec![vec![vec![Point3::new(30.0, 40.0, 900.0)]]],
        };
        assert_eq!(scanner.scan_structure(&s).unwrap().unwrap().max_distance_mm, 50.0);
    }

    #[test]
    fn test_sector_filter_discards_points_outside_coverage() {
        let sectors = build_sectors(&[ArcSweep::fixed(90.0)], 0.0, 10.0);
        let scanner =
            CollisionRiskScanner::new(Point3::default(), AngularFilter::Sectors(sectors)).unwrap();
        // 90° 方向 100 mm，0° 方向 300 mm
        let s = point_structure("BODY", &[(0.0, 100.0), (300.0, 0.0)]);

        let result = scanner.scan_structure(&s).unwrap().unwrap();
        assert_eq!(result.max_distance_mm, 100.0);
    }

    #[test]
    fn test_structure_without_points_is_skipped() {
        let scanner = CollisionRiskScanner::new(Point3::default(), AngularFilter::FullCircle).unwrap();
        let empty = Structure {
            id: "z_VacBag".to_string(),
            ..Default::default()
        };
        let results = scanner.scan_all([&empty, &ring("BODY", 200.0, 8, 2)]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].structure_id, "BODY");
    }

    #[test]
    fn test_non_finite_point_is_hard_error() {
        let scanner = CollisionRiskScanner::new(Point3::default(), AngularFilter::FullCircle).unwrap();
        let s = point_structure("BODY", &[(f64::NAN, 0.0)]);
        assert!(matches!(
            scanner.scan_structure(&s),
            Err(ReviewError::MalformedGeometry { .. })
        ));
        assert!(CollisionRiskScanner::new(Point3::new(f64::INFINITY, 0.0, 0.0), AngularFilter::FullCircle).is_err());
    }

    #[test]
    fn test_assess_picks_least_clearance() {
        let results = vec![
            RadialScanResult {
                structure_id: "BODY".to_string(),
                max_distance_mm: 300.0,
                furthest_point: Point3::new(300.0, 0.0, 0.0),
            },
            RadialScanResult {
                structure_id: "z_AltaHD_+200HU".to_string(),
                max_distance_mm: 435.0,
                furthest_point: Point3::new(-435.0, 0.0, 0.0),
            },
        ];
        let profile = CollisionProfile::halcyon();
        let assessment = assess(&results, Point3::default(), &profile).unwrap();

        assert_eq!(assessment.worst.structure_id, "z_AltaHD_+200HU");
        assert!((assessment.clearance_cm - 4.0).abs() < 1e-9);
        assert_eq!(assessment.severity, Severity::Error);
        assert_eq!(assessment.direction, AnatomicalDirection::Right);
        assert!(assess(&[], Point3::default(), &profile).is_none());
    }

    #[test]
    fn test_distance_metric_thresholds() {
        let profile = CollisionProfile::edge();
        assert_eq!(classify(&profile, -1.0, 39.0), Severity::Error);
        assert_eq!(classify(&profile, 0.5, 37.5), Severity::Warning);
        assert_eq!(classify(&profile, 2.0, 36.0), Severity::Info);
    }

    #[test]
    fn test_filter_selection_by_coverage() {
        let partial = [ArcSweep::new(30.0, 60.0, RotationDirection::Clockwise)];
        assert!(!AngularFilter::for_sweeps(&partial, 10.0, 10.0).is_full_circle());

        let full = [ArcSweep::new(181.0, 179.0, RotationDirection::Clockwise)];
        assert!(AngularFilter::for_sweeps(&full, 10.0, 10.0).is_full_circle());
    }

    #[test]
    fn test_direction_quadrants() {
        assert_eq!(AnatomicalDirection::from_angle(0.0), AnatomicalDirection::Left);
        assert_eq!(AnatomicalDirection::from_angle(90.0), AnatomicalDirection::Anterior);
        assert_eq!(AnatomicalDirection::from_angle(180.0), AnatomicalDirection::Right);
        assert_eq!(AnatomicalDirection::from_angle(-90.0), AnatomicalDirection::Posterior);
        assert_eq!(AnatomicalDirection::from_angle(-135.0), AnatomicalDirection::Posterior);
        assert_eq!(AnatomicalDirection::from_angle(-135.5), AnatomicalDirection::Right);
    }
}
