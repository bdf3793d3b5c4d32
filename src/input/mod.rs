/// 视频输入系统 (Video Input System)
///
/// 采集回调在独立线程上运行, 负责帧解码与发布
/// - CaptureHandler: 采集事件回调接口 (帧数据/流尺寸/连接/断开)
/// - FrameIngestor:  解码编码帧 → 发布到单槽帧队列
/// - StreamContext:  流尺寸共享上下文 (带就绪信号)
/// - TcpCaptureSource: 屏幕采集服务客户端
pub mod context;
pub mod ingestor;
pub mod tcp;

pub use context::{StreamContext, StreamGeometry};
pub use ingestor::{FrameIngestor, IngestStats};
pub use tcp::TcpCaptureSource;

use crate::error::Result;

/// 采集事件回调
///
/// 由采集方在自己的线程上调用, 实现方不能阻塞在推理上。
pub trait CaptureHandler: Send {
    /// 一帧编码图像数据
    fn on_frame_bytes(&mut self, bytes: &[u8]);

    /// 流尺寸 (连接后只下发一次)
    fn on_stream_geometry(&mut self, width: u32, height: u32);

    fn on_connected(&mut self) {}

    fn on_disconnected(&mut self, _reason: &str) {}
}

/// 采集源控制接口
pub trait CaptureSource {
    fn start_stream(&mut self) -> Result<()>;

    fn stop_stream(&mut self) -> Result<()>;

    /// 断开连接并等待读取线程退出
    fn disconnect(&mut self);
}
