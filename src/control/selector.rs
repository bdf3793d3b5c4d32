//! 目标选择: Detection → 屏幕坐标
//! Picks the primary subject and maps its reference keypoint to screen space

use serde::{Deserialize, Serialize};

use crate::pipeline::{Detection, TargetPoint};

/// 画面坐标 → 屏幕坐标的线性映射
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenMapping {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for ScreenMapping {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl ScreenMapping {
    pub fn apply(&self, x: f32, y: f32) -> TargetPoint {
        TargetPoint::new(
            (x * self.scale_x + self.offset_x).round() as i32,
            (y * self.scale_y + self.offset_y).round() as i32,
        )
    }
}

/// 目标选择器
///
/// 总是取下标0的人 (引擎输出顺序即优先级), 不按置信度过滤, 也不做跨帧跟踪。
#[derive(Clone, Copy, Debug)]
pub struct TargetSelector {
    reference_keypoint: usize,
    mapping: ScreenMapping,
}

impl TargetSelector {
    pub fn new(reference_keypoint: usize, mapping: ScreenMapping) -> Self {
        Self {
            reference_keypoint,
            mapping,
        }
    }

    pub fn reference_keypoint(&self) -> usize {
        self.reference_keypoint
    }

    /// 主目标参考关键点的画面坐标
    pub fn reference_in_frame(&self, detection: &Detection) -> Option<(f32, f32)> {
        let kp = detection.primary()?.keypoint(self.reference_keypoint)?;
        Some((kp.x, kp.y))
    }

    pub fn select(&self, detection: &Detection) -> Option<TargetPoint> {
        let (x, y) = self.reference_in_frame(detection)?;
        Some(self.mapping.apply(x, y))
    }
}
