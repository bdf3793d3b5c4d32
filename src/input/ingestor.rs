/// 帧接收器: 编码帧 → DecodedFrame → 单槽帧队列
/// Frame ingestor invoked on the capture callback thread
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info, warn};

use super::{CaptureHandler, StreamContext, StreamGeometry};
use crate::error::{PipelineError, Result};
use crate::pipeline::{DecodedFrame, FrameQueue, PublishOutcome};

/// 允许的最大分辨率 (宽或高)
pub const MAX_FRAME_DIM: u32 = 8192;

/// 接收统计 (跨线程共享)
#[derive(Debug, Default)]
pub struct IngestStats {
    pub total_frames: AtomicU64,   // 收到的编码帧
    pub decoded_frames: AtomicU64, // 成功解码并发布
    pub dropped_frames: AtomicU64, // 解码失败丢弃
    pub replaced_frames: AtomicU64, // 未被消费即被新帧替换
}

/// 采集回调: 解码并发布, 永不等待推理
pub struct FrameIngestor {
    queue: Arc<FrameQueue<DecodedFrame>>,
    context: Arc<StreamContext>,
    stats: Arc<IngestStats>,
    next_frame_id: u64,

    // 每秒统计
    count: usize,
    last: Instant,
    current_fps: f64,
}

impl FrameIngestor {
    pub fn new(queue: Arc<FrameQueue<DecodedFrame>>, context: Arc<StreamContext>) -> Self {
        Self {
            queue,
            context,
            stats: Arc::new(IngestStats::default()),
            next_frame_id: 1,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    pub fn current_fps(&self) -> f64 {
        self.current_fps
    }

    fn report(&mut self) {
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            self.current_fps = self.count as f64 / elapsed;
            let total = self.stats.total_frames.load(Ordering::Relaxed);
            let dropped = self.stats.dropped_frames.load(Ordering::Relaxed);
            let replaced = self.stats.replaced_frames.load(Ordering::Relaxed);
            let drop_rate = dropped as f64 / total.max(1) as f64 * 100.0;

            info!(
                "📺 解码统计: 解码{}帧 | 实际{:.1}fps | 总帧{} | 丢弃{} ({:.1}%) | 替换{}",
                self.count, self.current_fps, total, dropped, drop_rate, replaced
            );

            self.last = Instant::now();
            self.count = 0;
        }
    }
}

/// 解码单帧编码数据 (PNG/JPEG/BMP...)
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("empty payload".to_string()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::Decode(e.to_string()))?
        .into_rgb8();

    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || w > MAX_FRAME_DIM || h > MAX_FRAME_DIM {
        return Err(PipelineError::Decode(format!("invalid resolution {}x{}", w, h)));
    }

    Ok(image)
}

impl CaptureHandler for FrameIngestor {
    fn on_frame_bytes(&mut self, bytes: &[u8]) {
        let total = self.stats.total_frames.fetch_add(1, Ordering::Relaxed) + 1;

        let image = match decode_frame(bytes) {
            Ok(image) => image,
            Err(e) => {
                self.stats.dropped_frames.fetch_add(1, Ordering::Relaxed);
                // 只打印前几帧, 避免刷屏
                if total <= 10 {
                    warn!("⚠️ 丢弃帧 #{}: {}", total, e);
                } else {
                    debug!("丢弃帧 #{}: {}", total, e);
                }
                self.report();
                return;
            }
        };

        let frame = DecodedFrame::new(self.next_frame_id, image);
        self.next_frame_id += 1;
        self.count += 1;
        self.stats.decoded_frames.fetch_add(1, Ordering::Relaxed);

        match self.queue.publish(frame) {
            PublishOutcome::Stored => {}
            PublishOutcome::Replaced => {
                self.stats.replaced_frames.fetch_add(1, Ordering::Relaxed);
            }
            PublishOutcome::Discarded => {
                debug!("帧队列已关闭, 丢弃帧");
            }
        }

        self.report();
    }

    fn on_stream_geometry(&mut self, width: u32, height: u32) {
        if !(StreamGeometry { width, height }).is_valid() {
            warn!("⚠️ 忽略非法流尺寸: {}x{}", width, height);
            return;
        }
        info!("📐 采集流尺寸: {}x{}", width, height);
        self.context.set_geometry(width, height);
    }

    fn on_connected(&mut self) {
        info!("✅ 采集连接成功, 开始接收帧");
    }

    fn on_disconnected(&mut self, reason: &str) {
        info!("🛑 采集连接断开 ({}), 关闭帧队列", reason);
        self.queue.close();
    }
}
