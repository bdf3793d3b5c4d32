/// 输出系统 (Overlay & Recording)
///
/// - OverlayRenderer: 在帧上绘制骨架、目标标记和人数
/// - ImageSequenceRecorder: 把叠加后的帧写成图片序列
pub mod overlay;
pub mod recorder;

pub use overlay::OverlayRenderer;
pub use recorder::{FrameRecorder, ImageSequenceRecorder, RecordingManifest};
