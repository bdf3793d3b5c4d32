/// 帧处理流水线 (Frame Pipeline)
///
/// 两个执行上下文, 通过单槽帧队列交接:
/// - 采集回调: 解码编码帧 → 发布到 FrameQueue (永不阻塞)
/// - 推理线程: FrameQueue → 姿态引擎 → Detection → 目标选择 → 鼠标控制
pub mod engine;
pub mod frame_queue;
pub mod inference;

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;

pub use engine::{EngineWorker, PoseEngine, PoseEstimator};
pub use frame_queue::{FrameQueue, PublishOutcome, QueueStats};
pub use inference::{InferenceStage, StageSummary};

// ========== 流水线消息类型 ==========

/// 已解码帧 (采集回调 → 推理线程)
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub frame_id: u64,         // 帧序号 (从1开始)
    pub image: Arc<RgbImage>,  // 使用Arc共享数据,避免复制
    pub decoded_at: Instant,
}

impl DecodedFrame {
    pub fn new(frame_id: u64, image: RgbImage) -> Self {
        Self {
            frame_id,
            image: Arc::new(image),
            decoded_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 单个关键点 (id, x, y, confidence)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(id: usize, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            id,
            x,
            y,
            confidence,
        }
    }
}

/// 被跟踪的人 (一组关键点)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subject {
    pub keypoints: Vec<Keypoint>,
    pub score: f32,
}

impl Subject {
    pub fn new(keypoints: Vec<Keypoint>, score: f32) -> Self {
        Self { keypoints, score }
    }

    /// 按关键点ID查找
    pub fn keypoint(&self, id: usize) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.id == id)
    }
}

/// 姿态检测结果 (推理线程内, 每帧一个)
///
/// `subjects` 保持引擎输出顺序, 下标0为主目标。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    pub frame_id: u64, // 对应的帧序号
    pub subjects: Vec<Subject>,
    pub inference_ms: f64,
}

impl Detection {
    pub fn new(frame_id: u64, subjects: Vec<Subject>) -> Self {
        Self {
            frame_id,
            subjects,
            inference_ms: 0.0,
        }
    }

    /// 无结果 (引擎没有检测到任何人或推理失败)
    pub fn empty(frame_id: u64) -> Self {
        Self::new(frame_id, Vec::new())
    }

    pub fn primary(&self) -> Option<&Subject> {
        self.subjects.first()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// 目标屏幕坐标
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetPoint {
    pub x: i32,
    pub y: i32,
}

impl TargetPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}
