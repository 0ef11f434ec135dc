//! 诊所配置
//!
//! 所有阈值、命名规则、结构前缀都是数据，由配置文件提供。
//! 默认值即本院当前使用的参数。

use crate::core::models::{starts_with_ignore_case, MachineClass};
use serde::{Deserialize, Deserializer, Serialize};

/// 审核配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub machines: MachineConfig,
    pub naming: NamingConfig,
    pub setup_fields: SetupFieldConfig,
    pub collision: CollisionConfig,
    pub dose: DoseConfig,
    pub fixation: FixationConfig,
    pub ct: CtConfig,
    pub geometry: GeometryConfig,
    pub planning_structures: PlanningStructureConfig,
    pub contrast: ContrastConfig,
}

/// 治疗机识别
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Halcyon 机器 ID 前缀（忽略大小写）
    pub halcyon_prefix: String,
    /// Edge 机器 ID（精确匹配）
    pub edge_ids: Vec<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            halcyon_prefix: "Halcyon".to_string(),
            edge_ids: vec!["TrueBeamSN6368".to_string()],
        }
    }
}

impl MachineConfig {
    pub fn classify(&self, machine_id: Option<&str>) -> MachineClass {
        match machine_id {
            Some(id) if self.edge_ids.iter().any(|e| e == id) => MachineClass::Edge,
            Some(id) if starts_with_ignore_case(id, &self.halcyon_prefix) => MachineClass::Halcyon,
            _ => MachineClass::Unknown,
        }
    }
}

/// 命名规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub course_pattern: String,
    /// 静态野：捕获组 1 = 机架角
    pub static_field_pattern: String,
    /// 有床旋转的静态野：1 = 床角, 2 = 机架角
    pub static_field_couch_pattern: String,
    /// 弧形野：1 = 起始角, 2 = 方向, 3 = 终止角
    pub arc_field_pattern: String,
    /// 有床旋转的弧形野：1 = 床角, 2 = 起始角, 3 = 方向, 4 = 终止角
    pub arc_field_couch_pattern: String,
    pub reference_point_prefix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            course_pattern: r"^RT\d*_".to_string(),
            static_field_pattern: r"^G(\d+)-[A-Z]$".to_string(),
            static_field_couch_pattern: r"^T(\d+)-G(\d+)-[A-Z]$".to_string(),
            arc_field_pattern: r"^(\d+)(CW|CCW)(\d+)-[A-Z]$".to_string(),
            arc_field_couch_pattern: r"^T(\d+)-(\d+)(CW|CCW)(\d+)-[A-Z]$".to_string(),
            reference_point_prefix: "RP_".to_string(),
        }
    }
}

/// 摆位野要求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupFieldConfig {
    pub halcyon_count: usize,
    pub halcyon_name: String,
    pub edge_count: usize,
    pub edge_required_names: Vec<String>,
    /// 其它机型允许的摆位野名称前缀
    pub name_prefix: String,
    pub allowed_energies: Vec<String>,
}

impl Default for SetupFieldConfig {
    fn default() -> Self {
        Self {
            halcyon_count: 1,
            halcyon_name: "kVCBCT".to_string(),
            edge_count: 2,
            edge_required_names: vec!["CBCT".to_string(), "SF-0".to_string()],
            name_prefix: "SF-".to_string(),
            allowed_energies: vec!["6X".to_string(), "10X".to_string()],
        }
    }
}

/// 碰撞评估的度量方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearanceMetric {
    /// 边界半径减去最远距离，越小越危险
    Clearance,
    /// 离等中心的最远距离，越大越危险
    Distance,
}

/// 单一机型的碰撞评估参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionProfile {
    pub enabled: bool,
    /// 旋转边界半径（mm）
    pub boundary_radius_mm: f64,
    pub boundary_label: String,
    pub metric: ClearanceMetric,
    pub error_threshold_cm: f64,
    pub warning_threshold_cm: f64,
    /// 是否只检查实际经过的机架角
    pub angular_filtering: bool,
    pub arc_margin_degrees: f64,
    pub static_margin_degrees: f64,
    /// 参与评估的结构前缀（忽略大小写）
    pub structure_prefixes: Vec<String>,
}

impl CollisionProfile {
    /// Halcyon：47.5 cm 环形机架，全周检查
    pub fn halcyon() -> Self {
        Self {
            enabled: true,
            boundary_radius_mm: 475.0,
            boundary_label: "Halcyon ring".to_string(),
            metric: ClearanceMetric::Clearance,
            error_threshold_cm: 4.5,
            warning_threshold_cm: 5.0,
            angular_filtering: false,
            arc_margin_degrees: 0.0,
            static_margin_degrees: 10.0,
            structure_prefixes: default_collision_prefixes(),
        }
    }

    /// Edge：离等中心 38 cm 以外视为碰撞风险，只检查治疗角度 ±10°
    pub fn edge() -> Self {
        Self {
            enabled: true,
            boundary_radius_mm: 380.0,
            boundary_label: "Edge gantry".to_string(),
            metric: ClearanceMetric::Distance,
            error_threshold_cm: 38.0,
            warning_threshold_cm: 37.0,
            angular_filtering: true,
            arc_margin_degrees: 10.0,
            static_margin_degrees: 10.0,
            structure_prefixes: default_collision_prefixes(),
        }
    }
}

fn default_collision_prefixes() -> Vec<String> {
    ["BODY", "z_AltaLD", "z_AltaHD", "CouchSurface", "z_ArmShuttle", "z_VacBag"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 配置文件中的碰撞参数片段，缺省字段由所属机型的默认值补齐
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CollisionProfileOverrides {
    enabled: Option<bool>,
    boundary_radius_mm: Option<f64>,
    boundary_label: Option<String>,
    metric: Option<ClearanceMetric>,
    error_threshold_cm: Option<f64>,
    warning_threshold_cm: Option<f64>,
    angular_filtering: Option<bool>,
    arc_margin_degrees: Option<f64>,
    static_margin_degrees: Option<f64>,
    structure_prefixes: Option<Vec<String>>,
}

impl CollisionProfileOverrides {
    fn apply(self, base: CollisionProfile) -> CollisionProfile {
        CollisionProfile {
            enabled: self.enabled.unwrap_or(base.enabled),
            boundary_radius_mm: self.boundary_radius_mm.unwrap_or(base.boundary_radius_mm),
            boundary_label: self.boundary_label.unwrap_or(base.boundary_label),
            metric: self.metric.unwrap_or(base.metric),
            error_threshold_cm: self.error_threshold_cm.unwrap_or(base.error_threshold_cm),
            warning_threshold_cm: self.warning_threshold_cm.unwrap_or(base.warning_threshold_cm),
            angular_filtering: self.angular_filtering.unwrap_or(base.angular_filtering),
            arc_margin_degrees: self.arc_margin_degrees.unwrap_or(base.arc_margin_degrees),
            static_margin_degrees: self.static_margin_degrees.unwrap_or(base.static_margin_degrees),
            structure_prefixes: self.structure_prefixes.unwrap_or(base.structure_prefixes),
        }
    }
}

fn halcyon_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CollisionProfile, D::Error> {
    Ok(CollisionProfileOverrides::deserialize(deserializer)?.apply(CollisionProfile::halcyon()))
}

fn edge_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CollisionProfile, D::Error> {
    Ok(CollisionProfileOverrides::deserialize(deserializer)?.apply(CollisionProfile::edge()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    #[serde(deserialize_with = "halcyon_profile")]
    pub halcyon: CollisionProfile,
    #[serde(deserialize_with = "edge_profile")]
    pub edge: CollisionProfile,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            halcyon: CollisionProfile::halcyon(),
            edge: CollisionProfile::edge(),
        }
    }
}

impl CollisionConfig {
    pub fn profile_for(&self, machine: MachineClass) -> Option<&CollisionProfile> {
        let profile = match machine {
            MachineClass::Halcyon => &self.halcyon,
            MachineClass::Edge => &self.edge,
            MachineClass::Unknown => return None,
        };
        profile.enabled.then_some(profile)
    }
}

/// 期望剂量率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseRateExpectation {
    pub machine: MachineClass,
    pub energy: String,
    pub dose_rate: f64,
    /// 仅在单次剂量达到高剂量阈值时适用
    pub high_dose_only: bool,
}

/// 剂量相关检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseConfig {
    pub max_grid_cm: f64,
    pub srs_max_grid_cm: f64,
    pub high_dose_per_fraction_gy: f64,
    pub dose_rates: Vec<DoseRateExpectation>,
    pub high_dose_energies: Vec<String>,
    /// 参考点限值 = 计划剂量 + 该偏移
    pub reference_dose_offset_gy: f64,
    pub reference_dose_tolerance_gy: f64,
    pub prescription_tolerance_gy: f64,
}

impl Default for DoseConfig {
    fn default() -> Self {
        let rate = |machine, energy: &str, dose_rate, high_dose_only| DoseRateExpectation {
            machine,
            energy: energy.to_string(),
            dose_rate,
            high_dose_only,
        };
        Self {
            max_grid_cm: 0.2,
            srs_max_grid_cm: 0.125,
            high_dose_per_fraction_gy: 5.0,
            dose_rates: vec![
                rate(MachineClass::Edge, "6X-FFF", 1400.0, true),
                rate(MachineClass::Edge, "10X-FFF", 2400.0, true),
                rate(MachineClass::Edge, "6X", 600.0, true),
                rate(MachineClass::Edge, "10X", 600.0, true),
                rate(MachineClass::Halcyon, "6X-FFF", 600.0, false),
            ],
            high_dose_energies: vec!["6X-FFF".to_string(), "10X-FFF".to_string()],
            reference_dose_offset_gy: 0.1,
            reference_dose_tolerance_gy: 0.09,
            prescription_tolerance_gy: 0.01,
        }
    }
}

/// 固定装置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixationConfig {
    pub halcyon_required_prefixes: Vec<String>,
    /// 需要核对密度覆盖的结构前缀，名称以 `_<值>HU` 结尾
    pub density_prefixes: Vec<String>,
    pub density_tolerance_hu: f64,
}

impl Default for FixationConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            halcyon_required_prefixes: strings(&["z_AltaHD_", "z_AltaLD_", "CouchSurface", "CouchInterior"]),
            density_prefixes: strings(&[
                "z_AltaHD_", "z_AltaLD_", "z_FrameHN_", "z_MaskLock_", "z_FrameHead_", "z_LocBar_",
                "z_ArmShuttle_", "z_EncFrame_", "z_VacBag_", "z_Contrast_", "z_ArmHoldR_",
                "z_FlexHigh_", "z_FlexLow_", "z_LocBarMR_", "z_VacIndex_",
            ]),
            density_tolerance_hu: 1.0,
        }
    }
}

/// CT 与摆位原点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtConfig {
    pub head_device: String,
    pub body_device: String,
    /// 左右、头脚方向原点偏移上限（cm）
    pub user_origin_limit_cm: f64,
    /// 垂直方向原点 y 坐标范围（mm）
    pub user_origin_y_min_mm: f64,
    pub user_origin_y_max_mm: f64,
}

impl Default for CtConfig {
    fn default() -> Self {
        Self {
            head_device: "CT130265 HEAD".to_string(),
            body_device: "CT130265".to_string(),
            user_origin_limit_cm: 0.5,
            user_origin_y_min_mm: -500.0,
            user_origin_y_max_mm: -80.0,
        }
    }
}

/// 射野几何
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// 禁止使用的准直器角度区间（开区间，度），跨 0° 的区间写成 (358, 362)
    pub forbidden_collimator_windows: Vec<(f64, f64)>,
    pub halcyon_isocenter_y_min_cm: f64,
    pub halcyon_isocenter_y_max_cm: f64,
    pub halcyon_tolerance_table: String,
    pub edge_tolerance_table: String,
    /// 第一个治疗野起始角与 180° 的最大偏差
    pub first_field_max_deviation_degrees: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            forbidden_collimator_windows: vec![(88.0, 92.0), (268.0, 272.0), (358.0, 362.0)],
            halcyon_isocenter_y_min_cm: -30.0,
            halcyon_isocenter_y_max_cm: 17.0,
            halcyon_tolerance_table: "HAL".to_string(),
            edge_tolerance_table: "EDGE".to_string(),
            first_field_max_deviation_degrees: 90.0,
        }
    }
}

/// 计划辅助结构（空气密度覆盖）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningStructureConfig {
    pub air_prefix: String,
    pub density_tolerance_hu: f64,
    /// 原始 CT 值超过 期望值+该容差 的体素计为偏高
    pub hu_threshold_offset: f64,
    pub max_percent_above: f64,
    /// 平面内采样步长（体素）
    pub xy_stride: usize,
    /// 层面采样步长
    pub z_stride: usize,
}

impl Default for PlanningStructureConfig {
    fn default() -> Self {
        Self {
            air_prefix: "z_Air_".to_string(),
            density_tolerance_hu: 1.0,
            hu_threshold_offset: 25.0,
            max_percent_above: 5.0,
            xy_stride: 2,
            z_stride: 2,
        }
    }
}

/// 增强扫描
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastConfig {
    /// 检查备注中出现该关键字（忽略大小写）即视为增强扫描
    pub study_keyword: String,
    pub structure_prefix: String,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            study_keyword: "CONTRAST".to_string(),
            structure_prefix: "z_Contrast".to_string(),
        }
    }
}
