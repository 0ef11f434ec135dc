//! 核心数据模型定义
//!
//! 计划快照由宿主一次性提供，规则只读访问。坐标单位为 mm，角度单位为度，
//! 剂量单位为 Gy。

use crate::core::error::{ReviewError, ReviewResult};
use serde::{Deserialize, Serialize};

/// 三维坐标点（DICOM 患者坐标系）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// 机架旋转方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GantryDirection {
    /// 静态野
    #[default]
    None,
    Clockwise,
    CounterClockwise,
}

/// 准直器铅门位置（mm）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JawPositions {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

/// 控制点
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPoint {
    pub gantry_angle: f64,
    /// 治疗床角度
    pub couch_angle: f64,
    pub collimator_angle: f64,
    pub jaws: JawPositions,
}

/// 射野
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Beam {
    pub id: String,
    pub is_setup_field: bool,
    /// 治疗机 ID
    pub machine_id: String,
    /// 能量显示名，如 "6X", "10X-FFF"
    pub energy: String,
    /// 剂量率 (MU/min)
    pub dose_rate: f64,
    /// 技术名称，如 "ARC", "SRS HyperArc"
    pub technique: String,
    pub gantry_direction: GantryDirection,
    pub isocenter: Point3,
    pub tolerance_table: String,
    pub control_points: Vec<ControlPoint>,
}

impl Beam {
    /// 第一个控制点
    pub fn first_control_point(&self) -> ReviewResult<&ControlPoint> {
        self.control_points
            .first()
            .ok_or_else(|| ReviewError::MissingControlPoints(self.id.clone()))
    }

    /// 最后一个控制点
    pub fn last_control_point(&self) -> ReviewResult<&ControlPoint> {
        self.control_points
            .last()
            .ok_or_else(|| ReviewError::MissingControlPoints(self.id.clone()))
    }

    pub fn couch_angle(&self) -> ReviewResult<f64> {
        Ok(self.first_control_point()?.couch_angle)
    }

    pub fn has_couch_rotation(&self) -> ReviewResult<bool> {
        Ok(self.couch_angle()?.abs() > COUCH_ROTATION_TOLERANCE_DEGREES)
    }

    pub fn uses_srs_technique(&self) -> bool {
        self.technique.contains("SRS")
    }
}

/// 治疗床角度超过此值视为有床旋转
pub const COUCH_ROTATION_TOLERANCE_DEGREES: f64 = 0.1;

/// 参考点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferencePointKind {
    #[default]
    Target,
    Field,
    OrganAtRisk,
    Other,
}

impl std::fmt::Display for ReferencePointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferencePointKind::Target => write!(f, "Target"),
            ReferencePointKind::Field => write!(f, "Field"),
            ReferencePointKind::OrganAtRisk => write!(f, "Organ at Risk"),
            ReferencePointKind::Other => write!(f, "Other"),
        }
    }
}

/// 参考点及其剂量限值
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePoint {
    pub id: String,
    pub kind: ReferencePointKind,
    pub total_dose_limit_gy: f64,
    pub daily_dose_limit_gy: f64,
    pub session_dose_limit_gy: f64,
}

/// 处方靶区
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrescriptionTarget {
    pub id: String,
    pub dose_per_fraction_gy: f64,
    pub fractions: u32,
}

impl PrescriptionTarget {
    pub fn total_dose_gy(&self) -> f64 {
        self.dose_per_fraction_gy * f64::from(self.fractions)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Prescription {
    pub targets: Vec<PrescriptionTarget>,
}

/// 优化参数
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationSetup {
    pub jaw_tracking_used: bool,
    /// VMAT/ApertureShapeController 取值，未知时为空
    pub aperture_shape_controller: Option<String>,
}

/// CT 影像
///
/// `hu_values` 按 z→y→x 展平存放；宿主不提供体素时为空，依赖体素的检查会跳过。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub id: String,
    /// 序列描述
    pub series_comment: String,
    /// 检查（Study）备注
    pub study_comment: String,
    pub imaging_device_id: String,
    pub user_origin: Point3,
    /// 体素 (0,0,0) 的中心位置
    pub origin: Point3,
    pub x_res: f64,
    pub y_res: f64,
    pub z_res: f64,
    pub x_size: usize,
    pub y_size: usize,
    pub z_size: usize,
    pub hu_values: Vec<f32>,
}

impl Image {
    /// 读取体素 HU 值
    pub fn hu_at(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        if x >= self.x_size || y >= self.y_size || z >= self.z_size {
            return None;
        }
        let index = z
            .checked_mul(self.y_size)?
            .checked_add(y)?
            .checked_mul(self.x_size)?
            .checked_add(x)?;
        self.hu_values.get(index).map(|v| f64::from(*v))
    }

    /// 体素总数，维度乘积溢出时为 None
    pub fn voxel_count(&self) -> Option<usize> {
        self.x_size.checked_mul(self.y_size)?.checked_mul(self.z_size)
    }

    pub fn has_voxels(&self) -> bool {
        !self.hu_values.is_empty()
    }

    /// 体素中心的患者坐标
    pub fn voxel_position(&self, x: usize, y: usize, z: usize) -> Point3 {
        Point3::new(
            self.origin.x + x as f64 * self.x_res,
            self.origin.y + y as f64 * self.y_res,
            self.origin.z + z as f64 * self.z_res,
        )
    }
}

/// 一条闭合轮廓线
pub type Contour = Vec<Point3>;

/// 结构
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Structure {
    pub id: String,
    /// 密度覆盖值（HU），未设置为 None
    pub assigned_hu: Option<f64>,
    /// 每个 CT 层面上的轮廓线，下标即层面号
    pub contours: Vec<Vec<Contour>>,
}

impl Structure {
    /// 指定层面上的轮廓线，超出范围返回空
    pub fn contours_on_plane(&self, plane: usize) -> &[Contour] {
        self.contours.get(plane).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        starts_with_ignore_case(&self.id, prefix)
    }

    /// 判断点是否在该层面的轮廓内（奇偶规则，只看 x/y）
    pub fn contains_point(&self, plane: usize, point: Point3) -> bool {
        let mut inside = false;
        for contour in self.contours_on_plane(plane) {
            if contour.len() < 3 {
                continue;
            }
            let mut j = contour.len() - 1;
            for i in 0..contour.len() {
                let (a, b) = (contour[i], contour[j]);
                if (a.y > point.y) != (b.y > point.y)
                    && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
                {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }
}

/// 结构集
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureSet {
    pub id: String,
    pub image: Option<Image>,
    pub structures: Vec<Structure>,
}

/// 计划快照 - 单次审核的全部只读输入
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSnapshot {
    pub plan_id: String,
    pub course_id: Option<String>,
    pub treatment_orientation: String,
    pub use_gating: bool,
    pub total_dose_gy: f64,
    pub dose_per_fraction_gy: f64,
    /// 剂量网格分辨率（mm），未计算剂量时为 None
    pub dose_grid_resolution_mm: Option<f64>,
    /// 按治疗顺序排列的射野
    pub beams: Vec<Beam>,
    pub reference_points: Vec<ReferencePoint>,
    /// 主参考点 ID
    pub primary_reference_point: Option<String>,
    pub prescription: Option<Prescription>,
    pub optimization: Option<OptimizationSetup>,
    pub structure_set: Option<StructureSet>,
}

impl PlanSnapshot {
    pub fn treatment_beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.iter().filter(|b| !b.is_setup_field)
    }

    pub fn setup_beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.iter().filter(|b| b.is_setup_field)
    }

    /// 以第一个射野的治疗机作为计划的治疗机
    pub fn machine_id(&self) -> Option<&str> {
        self.beams.first().map(|b| b.machine_id.as_str())
    }

    pub fn isocenter(&self) -> Option<Point3> {
        self.beams.first().map(|b| b.isocenter)
    }

    pub fn primary_reference_point(&self) -> Option<&ReferencePoint> {
        let id = self.primary_reference_point.as_deref()?;
        self.reference_points.iter().find(|p| p.id == id)
    }

    pub fn has_couch_rotation(&self) -> ReviewResult<bool> {
        for beam in &self.beams {
            if beam.has_couch_rotation()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn image(&self) -> Option<&Image> {
        self.structure_set.as_ref().and_then(|s| s.image.as_ref())
    }

    pub fn structures(&self) -> &[Structure] {
        self.structure_set
            .as_ref()
            .map(|s| s.structures.as_slice())
            .unwrap_or(&[])
    }
}

/// 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// 检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub message: String,
    pub severity: Severity,
    /// 是否针对单个射野等重复条目
    pub is_per_item: bool,
    /// 同类条目全部通过时的汇总文字
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed_summary: Option<String>,
}

impl Finding {
    pub fn new(category: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            severity,
            is_per_item: false,
            collapsed_summary: None,
        }
    }

    /// 通过时 Info，否则使用给定的严重程度
    pub fn check(
        passed: bool,
        category: impl Into<String>,
        pass_message: impl Into<String>,
        fail_message: impl Into<String>,
        fail_severity: Severity,
    ) -> Self {
        if passed {
            Self::new(category, pass_message, Severity::Info)
        } else {
            Self::new(category, fail_message, fail_severity)
        }
    }

    pub fn info(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(category, message, Severity::Info)
    }

    pub fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(category, message, Severity::Warning)
    }

    pub fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(category, message, Severity::Error)
    }

    /// 标记为单条目结果
    pub fn per_item(mut self) -> Self {
        self.is_per_item = true;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.collapsed_summary = Some(summary.into());
        self
    }
}

/// 治疗机类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineClass {
    Halcyon,
    Edge,
    /// 未识别的治疗机，机型相关检查跳过
    Unknown,
}

impl std::fmt::Display for MachineClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineClass::Halcyon => write!(f, "Halcyon"),
            MachineClass::Edge => write!(f, "Edge"),
            MachineClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// 忽略大小写的前缀比较
pub fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
