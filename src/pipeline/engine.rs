//! 姿态引擎接口与工作线程
//! Pose engine capability and its dedicated worker thread
//!
//! 引擎内部为单帧队列: 输入/输出通道深度均为1,
//! 推理阶段串行提交, 引擎一次只处理一帧。

use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::{DecodedFrame, Detection, Subject};
use crate::error::Result;

/// 姿态引擎能力 (异步: 提交 + 阻塞取结果)
pub trait PoseEngine {
    /// 提交一帧; 返回 false 表示引擎暂时拒绝 (帧被丢弃)
    fn submit(&mut self, frame: DecodedFrame) -> bool;

    /// 阻塞等待下一个结果; 引擎已关闭时返回 None
    fn next_result(&mut self) -> Option<Detection>;
}

/// 同步姿态估计器 (模型推理本身)
pub trait PoseEstimator: Send + 'static {
    fn estimate(&mut self, frame: &DecodedFrame) -> Result<Vec<Subject>>;

    fn name(&self) -> &str {
        "pose"
    }
}

/// 把同步估计器包装为独立线程的异步引擎
pub struct EngineWorker {
    tx_frame: Option<Sender<DecodedFrame>>,
    rx_result: Receiver<Detection>,
    handle: Option<JoinHandle<()>>,
}

impl EngineWorker {
    pub fn spawn<E: PoseEstimator>(estimator: E) -> Result<Self> {
        let (tx_frame, rx_frame) = bounded::<DecodedFrame>(1);
        let (tx_result, rx_result) = bounded::<Detection>(1);

        let handle = thread::Builder::new()
            .name("pose-engine".to_string())
            .spawn(move || engine_loop(estimator, rx_frame, tx_result))?;

        Ok(Self {
            tx_frame: Some(tx_frame),
            rx_result,
            handle: Some(handle),
        })
    }

    /// 关闭输入通道并等待工作线程退出
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx_frame.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("⚠️ 姿态引擎线程异常退出");
            }
        }
    }
}

impl PoseEngine for EngineWorker {
    fn submit(&mut self, frame: DecodedFrame) -> bool {
        let Some(tx) = self.tx_frame.as_ref() else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                debug!("引擎繁忙, 丢弃帧 #{}", frame.frame_id);
                false
            }
            Err(TrySendError::Disconnected(frame)) => {
                debug!("引擎已退出, 丢弃帧 #{}", frame.frame_id);
                false
            }
        }
    }

    fn next_result(&mut self) -> Option<Detection> {
        self.rx_result.recv().ok()
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn engine_loop<E: PoseEstimator>(
    mut estimator: E,
    rx_frame: Receiver<DecodedFrame>,
    tx_result: Sender<Detection>,
) {
    info!("✅ 姿态引擎线程启动 ({})", estimator.name());

    while let Ok(frame) = rx_frame.recv() {
        let start = Instant::now();
        let subjects = match estimator.estimate(&frame) {
            Ok(subjects) => subjects,
            Err(e) => {
                warn!("⚠️ 帧 #{} 推理失败: {}", frame.frame_id, e);
                Vec::new()
            }
        };

        let mut detection = Detection::new(frame.frame_id, subjects);
        detection.inference_ms = start.elapsed().as_secs_f64() * 1000.0;

        if tx_result.send(detection).is_err() {
            break;
        }
    }

    info!("姿态引擎线程退出");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::Keypoint;
    use image::RgbImage;

    struct WidthEstimator;

    impl PoseEstimator for WidthEstimator {
        fn estimate(&mut self, frame: &DecodedFrame) -> Result<Vec<Subject>> {
            if frame.width() == 0 {
                return Err(PipelineError::Engine("empty frame".to_string()));
            }
            let kp = Keypoint::new(0, frame.width() as f32, frame.height() as f32, 1.0);
            Ok(vec![Subject::new(vec![kp], 1.0)])
        }
    }

    #[test]
    fn test_submit_then_result() {
        let mut worker = EngineWorker::spawn(WidthEstimator).unwrap();
        assert!(worker.submit(DecodedFrame::new(3, RgbImage::new(40, 30))));

        let detection = worker.next_result().unwrap();
        assert_eq!(detection.frame_id, 3);
        assert_eq!(detection.subjects.len(), 1);
        assert_eq!(detection.subjects[0].keypoints[0].x, 40.0);
        worker.shutdown();
    }

    #[test]
    fn test_estimator_error_yields_empty_detection() {
        let mut worker = EngineWorker::spawn(WidthEstimator).unwrap();
        assert!(worker.submit(DecodedFrame::new(1, RgbImage::new(0, 0))));

        let detection = worker.next_result().unwrap();
        assert_eq!(detection.frame_id, 1);
        assert!(detection.is_empty());
    }
}
