//! 流水线错误类型
//! Error taxonomy of the frame pipeline

use thiserror::Error;

/// 流水线错误
///
/// 帧级错误 (`Decode` / `SubmissionRejected`) 只记录日志并跳过当前帧,
/// 只有 `Connect` 在启动阶段是致命的。
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 帧数据无法解码 (损坏/格式不支持/分辨率非法)
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// 推理引擎暂时拒绝了提交的帧
    #[error("pose engine rejected frame #{frame_id}")]
    SubmissionRejected { frame_id: u64 },

    /// 在收到流尺寸之前请求了录制
    #[error("stream geometry not available after {waited_ms} ms")]
    GeometryUnavailable { waited_ms: u64 },

    /// 无法建立采集连接 (启动期致命错误)
    #[error("failed to connect to capture source {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 采集协议错误
    #[error("capture protocol error: {0}")]
    Protocol(String),

    /// 推理引擎错误
    #[error("pose engine error: {0}")]
    Engine(String),

    /// 鼠标定位失败
    #[error("pointer relocation failed: {0}")]
    Pointer(String),

    /// 录制失败
    #[error("recorder error: {0}")]
    Recorder(String),

    /// 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// 帧队列关闭信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("frame queue closed")]
pub struct QueueClosed;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_level_messages() {
        let rejected = PipelineError::SubmissionRejected { frame_id: 7 };
        assert_eq!(rejected.to_string(), "pose engine rejected frame #7");
        assert_eq!(QueueClosed.to_string(), "frame queue closed");
    }
}
