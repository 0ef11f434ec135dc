//! 机架角扇区几何
//!
//! 把射野的机架旋转范围表示为圆周上的不回绕区间 `[start, end]`（度）。
//! 跨 0°/360° 的区间在存入前拆成两段；区间列表始终保持合并状态。
//!
//! 机架在运动方向上不能穿过 180°，加外扩余量时不能把原本不跨 180° 的弧推过去。

use crate::core::error::ReviewResult;
use crate::core::models::{Beam, GantryDirection};
use serde::{Deserialize, Serialize};

/// 起止角差小于此值视为静态野
pub const ANGLE_TOLERANCE_DEGREES: f64 = 0.1;
/// 静态野默认外扩 ±10°
pub const STATIC_FIELD_MARGIN_DEGREES: f64 = 10.0;
/// 相邻扇区间隔不超过 1° 即合并，吸收角度插值误差
pub const MERGE_TOLERANCE_DEGREES: f64 = 1.0;
/// 总覆盖达到该值按全周处理
pub const FULL_COVERAGE_THRESHOLD_DEGREES: f64 = 180.0;

const FULL_CIRCLE: f64 = 360.0;
const GANTRY_SEAM: f64 = 180.0;

/// 不回绕的角度区间，`0 <= start <= end <= 360`，只能经 `new` 或几何运算得到
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngularSector {
    start: f64,
    end: f64,
}

impl AngularSector {
    /// 整个圆周
    pub const FULL: AngularSector = AngularSector {
        start: 0.0,
        end: FULL_CIRCLE,
    };

    /// 创建扇区，端点不合法时返回 None
    pub fn new(start: f64, end: f64) -> Option<Self> {
        let valid = start.is_finite()
            && end.is_finite()
            && (0.0..=FULL_CIRCLE).contains(&start)
            && (0.0..=FULL_CIRCLE).contains(&end)
            && start <= end;
        valid.then_some(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// 两端闭区间；角度需已归一化
    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.start && angle <= self.end
    }
}

/// 一个射野的机架运动
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcSweep {
    pub start_angle: f64,
    pub end_angle: f64,
    pub direction: RotationDirection,
}

/// 旋转方向（静态野方向无意义，按顺时针处理）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

impl ArcSweep {
    pub fn new(start_angle: f64, end_angle: f64, direction: RotationDirection) -> Self {
        Self {
            start_angle,
            end_angle,
            direction,
        }
    }

    pub fn fixed(angle: f64) -> Self {
        Self::new(angle, angle, RotationDirection::Clockwise)
    }

    /// 从射野首末控制点构造
    pub fn from_beam(beam: &Beam) -> ReviewResult<Self> {
        let start = beam.first_control_point()?.gantry_angle;
        let end = beam.last_control_point()?.gantry_angle;
        let direction = match beam.gantry_direction {
            GantryDirection::CounterClockwise => RotationDirection::CounterClockwise,
            GantryDirection::Clockwise | GantryDirection::None => RotationDirection::Clockwise,
        };
        Ok(Self::new(start, end, direction))
    }

    pub fn is_finite(&self) -> bool {
        self.start_angle.is_finite() && self.end_angle.is_finite()
    }

    /// 起止角在圆周上几乎重合
    pub fn is_static(&self) -> bool {
        let diff = (normalize_angle(self.start_angle) - normalize_angle(self.end_angle)).abs();
        diff.min(FULL_CIRCLE - diff) < ANGLE_TOLERANCE_DEGREES
    }
}

/// 归一化到 `[0, 360)`
pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(FULL_CIRCLE);
    // rem_euclid 对极小的负数可能得到 360.0
    if normalized >= FULL_CIRCLE {
        0.0
    } else {
        normalized
    }
}

/// 沿运动方向的旋转角度
///
/// 静态野为 0；计算结果接近 0 或不合理（NaN、负数）时按整圈 360° 处理。
pub fn arc_span(sweep: &ArcSweep) -> f64 {
    if !sweep.is_finite() {
        tracing::warn!(?sweep, "机架角不是有限数，按整圈处理");
        return FULL_CIRCLE;
    }
    if sweep.is_static() {
        return 0.0;
    }

    let start = normalize_angle(sweep.start_angle);
    let end = normalize_angle(sweep.end_angle);
    let span = match sweep.direction {
        RotationDirection::Clockwise => (end - start + FULL_CIRCLE) % FULL_CIRCLE,
        RotationDirection::CounterClockwise => (start - end + FULL_CIRCLE) % FULL_CIRCLE,
    };

    if !(span >= ANGLE_TOLERANCE_DEGREES) {
        return FULL_CIRCLE;
    }
    span
}

/// 计算射野覆盖的扇区，结果已排序合并
///
/// - 静态野：`[angle - static_margin, angle + static_margin]`
/// - 弧形野：两端沿运动方向各外扩 `arc_margin`，不越过 180°
/// - 单个射野加余量后达到整圈，直接返回 `[0, 360]`
pub fn build_sectors(sweeps: &[ArcSweep], arc_margin: f64, static_margin: f64) -> Vec<AngularSector> {
    let arc_margin = arc_margin.max(0.0);
    let static_margin = static_margin.max(0.0);
    let mut working = Vec::with_capacity(sweeps.len() * 2);

    for sweep in sweeps {
        if !sweep.is_finite() {
            tracing::warn!(?sweep, "机架角不是有限数，覆盖范围按整圈处理");
            return vec![AngularSector::FULL];
        }

        if sweep.is_static() {
            if 2.0 * static_margin >= FULL_CIRCLE {
                return vec![AngularSector::FULL];
            }
            push_split(&mut working, sweep.start_angle - static_margin, 2.0 * static_margin);
            continue;
        }

        let span = arc_span(sweep);
        if span + 2.0 * arc_margin >= FULL_CIRCLE {
            return vec![AngularSector::FULL];
        }

        // 按顺时针方向看，弧的低端
        let low = match sweep.direction {
            RotationDirection::Clockwise => sweep.start_angle,
            RotationDirection::CounterClockwise => sweep.end_angle,
        };
        let (from, length) = extend_within_seam(low, span, arc_margin);
        push_split(&mut working, from, length);
    }

    merge_sectors(working)
}

/// 外扩弧的两端，原弧不跨 180° 时结果也不跨
///
/// 以 180° 为原点重新计角，弧在 `[0, 360]` 内即不跨接缝。
fn extend_within_seam(low: f64, span: f64, margin: f64) -> (f64, f64) {
    let seam_low = normalize_angle(low - GANTRY_SEAM);
    let seam_high = seam_low + span;

    if seam_high <= FULL_CIRCLE + ANGLE_TOLERANCE_DEGREES {
        let lo = (seam_low - margin).max(0.0);
        let hi = (seam_high + margin).min(FULL_CIRCLE);
        (lo + GANTRY_SEAM, hi - lo)
    } else {
        // 原弧已跨 180°（数据异常），不做限制，宁可多查
        (low - margin, span + 2.0 * margin)
    }
}

/// 从 `from` 顺时针走 `length` 度，跨 0° 时拆成两段
fn push_split(working: &mut Vec<AngularSector>, from: f64, length: f64) {
    let length = length.clamp(0.0, FULL_CIRCLE);
    let start = normalize_angle(from);
    let end = start + length;

    if end <= FULL_CIRCLE {
        working.push(AngularSector { start, end });
    } else {
        working.push(AngularSector {
            start,
            end: FULL_CIRCLE,
        });
        working.push(AngularSector {
            start: 0.0,
            end: end - FULL_CIRCLE,
        });
    }
}

/// 合并重叠或间隔不超过 1° 的扇区
pub fn merge_sectors(mut sectors: Vec<AngularSector>) -> Vec<AngularSector> {
    if sectors.len() <= 1 {
        return sectors;
    }

    sectors.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));

    let mut merged = Vec::with_capacity(sectors.len());
    let mut current = sectors[0];
    for next in sectors.into_iter().skip(1) {
        if next.start <= current.end + MERGE_TOLERANCE_DEGREES {
            current.end = current.end.max(next.end);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    merged
}

/// 角度是否落在任一扇区内（含端点）
pub fn is_angle_covered(angle: f64, sectors: &[AngularSector]) -> bool {
    if !angle.is_finite() {
        // 无法判断方向时保留该点
        return true;
    }
    let angle = normalize_angle(angle);
    sectors.iter().any(|s| s.contains(angle))
}

/// 扇区总覆盖角度
pub fn total_coverage_degrees(sectors: &[AngularSector]) -> f64 {
    sectors.iter().map(AngularSector::span).sum()
}

/// 治疗射野是否覆盖至少 180°
///
/// 单个弧达到 180° 或不加弧余量的合并覆盖达到 180° 即为全覆盖。
pub fn is_full_coverage(sweeps: &[ArcSweep]) -> bool {
    if sweeps.is_empty() {
        return false;
    }
    if sweeps.iter().any(|s| arc_span(s) >= FULL_COVERAGE_THRESHOLD_DEGREES) {
        return true;
    }
    let sectors = build_sectors(sweeps, 0.0, STATIC_FIELD_MARGIN_DEGREES);
    total_coverage_degrees(&sectors) >= FULL_COVERAGE_THRESHOLD_DEGREES
}
