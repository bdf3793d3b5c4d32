#![allow(clippy::type_complexity)]
pub mod config; // 流水线配置参数
pub mod control; // 目标选择与鼠标控制
pub mod detection; // 姿态检测系统
pub mod error; // 错误类型
pub mod input; // 采集输入系统
pub mod output; // 叠加绘制与录制
pub mod pipeline; // 帧队列与推理阶段
pub mod telemetry; // 日志

pub use crate::config::{ImageCodec, PipelineConfig, RecordConfig};
pub use crate::error::{PipelineError, Result};
pub use crate::pipeline::{
    DecodedFrame, Detection, FrameQueue, Keypoint, PublishOutcome, Subject, TargetPoint,
};

/// COCO 关键点: 鼻子
pub const NOSE: usize = 0;

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

/// COCO 17 关键点骨架连线
pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];
