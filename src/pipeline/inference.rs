/// 姿态推理阶段
/// Pose inference stage: FrameQueue → PoseEngine → Detection
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::engine::PoseEngine;
use super::frame_queue::FrameQueue;
use super::{DecodedFrame, Detection};
use crate::error::PipelineError;

/// 推理阶段运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageSummary {
    pub cycles: u64,              // 产出Detection的周期数
    pub rejected: u64,            // 被引擎拒绝的帧
    pub engine_closed: bool,      // 是否因引擎关闭而退出
    pub stopped_by_handler: bool, // 是否由周期回调请求退出
}

/// 推理线程: 取帧 → 提交引擎 → 等待结果 → 回调
pub struct InferenceStage<E: PoseEngine> {
    queue: Arc<FrameQueue<DecodedFrame>>,
    engine: E,

    // 统计
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl<E: PoseEngine> InferenceStage<E> {
    pub fn new(queue: Arc<FrameQueue<DecodedFrame>>, engine: E) -> Self {
        Self {
            queue,
            engine,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn current_fps(&self) -> f64 {
        self.current_fps
    }

    /// 运行推理循环, 直到队列关闭、引擎关闭或回调返回 `Break`
    ///
    /// 被拒绝的帧不会重试, 下一次取帧总是拿到更新的画面。
    pub fn run<F>(&mut self, mut on_detection: F) -> StageSummary
    where
        F: FnMut(&DecodedFrame, &Detection) -> ControlFlow<()>,
    {
        info!("🔍 推理线程等待数据...");
        let mut summary = StageSummary::default();

        while let Ok(frame) = self.queue.take_blocking() {
            if summary.cycles == 0 && summary.rejected == 0 {
                info!(
                    "✅ 推理线程收到第一帧数据! 尺寸: {}x{}",
                    frame.width(),
                    frame.height()
                );
            }

            let frame_id = frame.frame_id;
            if !self.engine.submit(frame.clone()) {
                summary.rejected += 1;
                debug!("{}, 等待下一帧", PipelineError::SubmissionRejected { frame_id });
                continue;
            }

            let Some(detection) = self.engine.next_result() else {
                info!("姿态引擎已关闭, 推理线程退出");
                summary.engine_closed = true;
                break;
            };

            summary.cycles += 1;
            self.tick(&detection);

            if on_detection(&frame, &detection).is_break() {
                summary.stopped_by_handler = true;
                break;
            }
        }

        info!(
            "推理线程结束: {} 个周期, {} 帧被拒绝",
            summary.cycles, summary.rejected
        );
        summary
    }

    // 每秒输出一次推理统计
    fn tick(&mut self, detection: &Detection) {
        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            self.current_fps = self.count as f64 / elapsed;
            let stats = self.queue.stats();
            info!(
                "🦴 推理统计: {:.1}fps | 最近耗时 {:.1}ms | 人数 {} | 队列替换 {}",
                self.current_fps,
                detection.inference_ms,
                detection.subjects.len(),
                stats.replaced
            );
            self.last = Instant::now();
            self.count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Keypoint, Subject};
    use image::RgbImage;
    use std::collections::VecDeque;
    use std::thread;
    use std::time::Duration;

    /// 脚本化引擎: 按顺序决定是否接受, 结果为帧号对应的单人检测
    struct ScriptedEngine {
        accept: VecDeque<bool>,
        pending: Option<u64>,
        submitted: Vec<u64>,
    }

    impl ScriptedEngine {
        fn new(accept: &[bool]) -> Self {
            Self {
                accept: accept.iter().copied().collect(),
                pending: None,
                submitted: Vec::new(),
            }
        }
    }

    impl PoseEngine for ScriptedEngine {
        fn submit(&mut self, frame: DecodedFrame) -> bool {
            self.submitted.push(frame.frame_id);
            let accepted = self.accept.pop_front().unwrap_or(true);
            if accepted {
                self.pending = Some(frame.frame_id);
            }
            accepted
        }

        fn next_result(&mut self) -> Option<Detection> {
            let frame_id = self.pending.take()?;
            let kp = Keypoint::new(0, frame_id as f32, 0.0, 0.9);
            Some(Detection::new(frame_id, vec![Subject::new(vec![kp], 0.9)]))
        }
    }

    fn frame(id: u64) -> DecodedFrame {
        DecodedFrame::new(id, RgbImage::new(4, 4))
    }

    #[test]
    fn test_closed_queue_ends_loop() {
        let queue = Arc::new(FrameQueue::new());
        queue.close();
        let mut stage = InferenceStage::new(queue, ScriptedEngine::new(&[]));

        let summary = stage.run(|_, _| ControlFlow::Continue(()));
        assert_eq!(summary.cycles, 0);
        assert!(!summary.engine_closed);
    }

    #[test]
    fn test_rejected_frame_is_not_retried() {
        let queue = Arc::new(FrameQueue::new());
        let mut stage = InferenceStage::new(Arc::clone(&queue), ScriptedEngine::new(&[false, true]));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.publish(frame(1));
                // 等待消费者取走第1帧
                while queue.stats().taken < 1 {
                    thread::sleep(Duration::from_millis(1));
                }
                queue.publish(frame(2));
            })
        };

        let mut seen = Vec::new();
        let summary = stage.run(|frame, detection| {
            assert_eq!(frame.frame_id, detection.frame_id);
            seen.push(detection.frame_id);
            ControlFlow::Break(())
        });
        producer.join().unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.cycles, 1);
        assert!(summary.stopped_by_handler);
        assert_eq!(seen, vec![2]);
        assert_eq!(stage.engine().submitted, vec![1, 2]);
    }

    #[test]
    fn test_close_while_blocked_exits_without_crash() {
        let queue: Arc<FrameQueue<DecodedFrame>> = Arc::new(FrameQueue::new());
        let closer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                queue.close();
            })
        };

        let mut stage = InferenceStage::new(queue, ScriptedEngine::new(&[]));
        let summary = stage.run(|_, _| ControlFlow::Continue(()));
        closer.join().unwrap();

        assert_eq!(summary, StageSummary::default());
    }

    #[test]
    fn test_engine_closed_ends_loop() {
        struct DeadEngine;
        impl PoseEngine for DeadEngine {
            fn submit(&mut self, _frame: DecodedFrame) -> bool {
                true
            }
            fn next_result(&mut self) -> Option<Detection> {
                None
            }
        }

        let queue = Arc::new(FrameQueue::new());
        queue.publish(frame(1));
        let mut stage = InferenceStage::new(queue, DeadEngine);

        let summary = stage.run(|_, _| ControlFlow::Continue(()));
        assert!(summary.engine_closed);
        assert_eq!(summary.cycles, 0);
    }
}
