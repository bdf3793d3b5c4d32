// ONNX Runtime 姿态估计 (YOLOv8-pose)

use ort::{GraphOptimizationLevel, Session};
use tracing::info;

use super::pose::{check_net_size, decode_pose_output, letterbox, PoseDecoderConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::{DecodedFrame, PoseEstimator, Subject};

fn engine_err(e: ort::Error) -> PipelineError {
    PipelineError::Engine(e.to_string())
}

/// 宽度为 None 时按第一帧宽高比自动计算 (32的倍数)
pub struct OnnxPoseEstimator {
    session: Session,
    input_name: String,
    net_width: Option<u32>,
    net_height: u32,
    decoder: PoseDecoderConfig,
}

impl OnnxPoseEstimator {
    pub fn load(
        model_path: &str,
        net_width: Option<u32>,
        net_height: u32,
        decoder: PoseDecoderConfig,
    ) -> Result<Self> {
        check_net_size(net_width, net_height)?;

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| PipelineError::Engine(format!("加载模型 {} 失败: {}", model_path, e)))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        info!(
            "✅ 姿态模型已加载: {} (输入: {}, 网络高度: {})",
            model_path, input_name, net_height
        );

        Ok(Self {
            session,
            input_name,
            net_width,
            net_height,
            decoder,
        })
    }

    fn net_size(&mut self, frame: &DecodedFrame) -> (u32, u32) {
        let net_height = self.net_height;
        let width = *self.net_width.get_or_insert_with(|| {
            auto_net_width(frame.width(), frame.height(), net_height)
        });
        (width, net_height)
    }
}

/// 按宽高比推算网络宽度, 取最接近的32倍数
pub fn auto_net_width(frame_width: u32, frame_height: u32, net_height: u32) -> u32 {
    let aspect = frame_width.max(1) as f32 / frame_height.max(1) as f32;
    let width = (net_height as f32 * aspect / 32.0).round() as u32 * 32;
    width.max(32)
}

impl PoseEstimator for OnnxPoseEstimator {
    fn estimate(&mut self, frame: &DecodedFrame) -> Result<Vec<Subject>> {
        let (net_width, net_height) = self.net_size(frame);
        let (xs, ratio) = letterbox(&frame.image, net_width, net_height);

        let inputs = ort::inputs![self.input_name.as_str() => xs.view()].map_err(engine_err)?;
        let outputs = self.session.run(inputs).map_err(engine_err)?;
        let output = outputs[0].try_extract_tensor::<f32>().map_err(engine_err)?;

        decode_pose_output(
            output.view(),
            ratio,
            frame.width() as f32,
            frame.height() as f32,
            &self.decoder,
        )
    }

    fn name(&self) -> &str {
        "yolov8-pose"
    }
}
