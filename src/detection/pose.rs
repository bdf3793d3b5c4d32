// YOLOv8-pose 预处理与后处理
// 输出格式: [batch, 4 + nc + 3 * nk, anchors], 每个anchor一列

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{s, Array, ArrayViewD, Axis, Ix2, IxDyn};

use super::{non_max_suppression, Bbox};
use crate::error::{PipelineError, Result};
use crate::pipeline::{Keypoint, Subject};

const CXYWH_OFFSET: usize = 4;
const KPT_STEP: usize = 3;

/// 姿态解码参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseDecoderConfig {
    pub num_keypoints: usize,
    pub conf: f32,
    pub iou: f32,
}

impl Default for PoseDecoderConfig {
    fn default() -> Self {
        Self {
            num_keypoints: 17,
            conf: 0.25,
            iou: 0.45,
        }
    }
}

/// 网络输入尺寸必须是32的正整数倍 (宽度 None 表示自动)
pub fn check_net_size(net_width: Option<u32>, net_height: u32) -> Result<()> {
    let valid = |v: u32| v > 0 && v % 32 == 0;
    if let Some(width) = net_width {
        if !valid(width) {
            return Err(PipelineError::Config(format!(
                "net_width must be a positive multiple of 32, got {}",
                width
            )));
        }
    }
    if !valid(net_height) {
        return Err(PipelineError::Config(format!(
            "net_height must be a positive multiple of 32, got {}",
            net_height
        )));
    }
    Ok(())
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// letterbox 预处理: 等比缩放到左上角, 其余填充 144/255
///
/// 返回 NCHW 张量和缩放比例
pub fn letterbox(image: &RgbImage, net_width: u32, net_height: u32) -> (Array<f32, IxDyn>, f32) {
    let net_width = net_width.max(1);
    let net_height = net_height.max(1);
    let (w0, h0) = image.dimensions();
    let (ratio, w_new, h_new) = scale_wh(
        w0.max(1) as f32,
        h0.max(1) as f32,
        net_width as f32,
        net_height as f32,
    );
    let w_new = (w_new as u32).clamp(1, net_width);
    let h_new = (h_new as u32).clamp(1, net_height);
    let resized = imageops::resize(image, w_new, h_new, FilterType::Triangle);

    let mut xs = Array::from_elem(
        (1, 3, net_height as usize, net_width as usize),
        144.0f32 / 255.0,
    )
    .into_dyn();
    for (x, y, rgb) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        xs[[0, 0, y, x]] = (r as f32) / 255.0;
        xs[[0, 1, y, x]] = (g as f32) / 255.0;
        xs[[0, 2, y, x]] = (b as f32) / 255.0;
    }

    (xs, ratio)
}

/// 解码模型输出为按置信度排序的人列表
///
/// 关键点保留原始置信度 (不过滤), 坐标还原到原始画面并裁剪到画面内。
pub fn decode_pose_output(
    output: ArrayViewD<'_, f32>,
    ratio: f32,
    frame_width: f32,
    frame_height: f32,
    config: &PoseDecoderConfig,
) -> Result<Vec<Subject>> {
    if output.ndim() != 3 || output.shape()[0] == 0 {
        return Err(PipelineError::Engine(format!(
            "unexpected pose output shape {:?}",
            output.shape()
        )));
    }

    let nk = config.num_keypoints;
    let features = output.shape()[1];
    if features < CXYWH_OFFSET + 1 + KPT_STEP * nk {
        return Err(PipelineError::Engine(format!(
            "pose output has {} features, need at least {}",
            features,
            CXYWH_OFFSET + 1 + KPT_STEP * nk
        )));
    }
    let nc = features - CXYWH_OFFSET - KPT_STEP * nk;

    let preds = output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .map_err(|e| PipelineError::Engine(e.to_string()))?;

    let mut data: Vec<(Bbox, Subject)> = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let confidence = pred
            .slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc])
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        if confidence < config.conf {
            continue;
        }

        let cx = pred[0] / ratio;
        let cy = pred[1] / ratio;
        let w = pred[2] / ratio;
        let h = pred[3] / ratio;
        let bbox = Bbox::new(
            (cx - w / 2.).max(0.0f32).min(frame_width),
            (cy - h / 2.).max(0.0f32).min(frame_height),
            w,
            h,
            confidence,
        );

        let kpt_offset = CXYWH_OFFSET + nc;
        let keypoints = (0..nk)
            .map(|i| {
                let base = kpt_offset + KPT_STEP * i;
                Keypoint::new(
                    i,
                    (pred[base] / ratio).max(0.0f32).min(frame_width),
                    (pred[base + 1] / ratio).max(0.0f32).min(frame_height),
                    pred[base + 2],
                )
            })
            .collect();

        data.push((bbox, Subject::new(keypoints, confidence)));
    }

    non_max_suppression(&mut data, config.iou);
    Ok(data.into_iter().map(|(_, subject)| subject).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::Array3;

    /// 构造单类别2关键点的输出: 每个anchor一列
    fn output(anchors: &[[f32; 11]]) -> Array3<f32> {
        let mut out = Array3::<f32>::zeros((1, 11, anchors.len()));
        for (j, anchor) in anchors.iter().enumerate() {
            for (i, v) in anchor.iter().enumerate() {
                out[[0, i, j]] = *v;
            }
        }
        out
    }

    fn config() -> PoseDecoderConfig {
        PoseDecoderConfig {
            num_keypoints: 2,
            conf: 0.25,
            iou: 0.45,
        }
    }

    #[test]
    fn test_letterbox_keeps_aspect_and_pads() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
        let (xs, ratio) = letterbox(&image, 64, 64);

        assert_eq!(xs.shape(), &[1, 3, 64, 64]);
        assert!((ratio - 0.32).abs() < 1e-6);
        // 画面区域: 64x32
        assert!((xs[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert_eq!(xs[[0, 1, 10, 10]], 0.0);
        // 填充区域
        assert!((xs[[0, 0, 50, 10]] - 144.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_net_size_must_be_multiple_of_32() {
        assert!(check_net_size(None, 352).is_ok());
        assert!(check_net_size(Some(640), 352).is_ok());
        for (w, h) in [(Some(0), 352), (Some(100), 352), (None, 0), (None, 350)] {
            assert!(matches!(check_net_size(w, h), Err(PipelineError::Config(_))));
        }
    }

    #[test]
    fn test_letterbox_zero_size_does_not_panic() {
        let image = RgbImage::new(64, 48);
        let (xs, ratio) = letterbox(&image, 0, 352);
        assert_eq!(xs.shape(), &[1, 3, 352, 1]);
        assert!(ratio > 0.0);
    }

    #[test]
    fn test_decode_rescales_and_filters() {
        let out = output(&[
            // cx, cy, w, h, conf, k0x, k0y, k0c, k1x, k1y, k1c
            [50.0, 50.0, 20.0, 40.0, 0.9, 60.0, 40.0, 0.95, 55.0, 70.0, 0.1],
            [10.0, 10.0, 5.0, 5.0, 0.1, 1.0, 1.0, 0.9, 2.0, 2.0, 0.9],
        ]);
        let subjects =
            decode_pose_output(out.view().into_dyn(), 0.5, 1000.0, 1000.0, &config()).unwrap();

        assert_eq!(subjects.len(), 1);
        let subject = &subjects[0];
        assert!((subject.score - 0.9).abs() < 1e-6);
        assert_eq!(subject.keypoints.len(), 2);
        assert_eq!(subject.keypoint(0), Some(&Keypoint::new(0, 120.0, 80.0, 0.95)));
        // 低置信度关键点仍然保留
        assert_eq!(subject.keypoint(1).map(|k| k.confidence), Some(0.1));
    }

    #[test]
    fn test_decode_orders_by_score_and_suppresses_overlap() {
        let out = output(&[
            [50.0, 50.0, 20.0, 20.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            [300.0, 300.0, 20.0, 20.0, 0.8, 2.0, 2.0, 1.0, 2.0, 2.0, 1.0],
            [51.0, 51.0, 20.0, 20.0, 0.7, 3.0, 3.0, 1.0, 3.0, 3.0, 1.0],
        ]);
        let subjects =
            decode_pose_output(out.view().into_dyn(), 1.0, 640.0, 640.0, &config()).unwrap();

        let scores: Vec<f32> = subjects.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![0.8, 0.7]);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let out = output(&[[5.0, 5.0, 4.0, 4.0, 0.9, -3.0, 900.0, 0.9, 1.0, 1.0, 0.9]]);
        let subjects =
            decode_pose_output(out.view().into_dyn(), 1.0, 640.0, 480.0, &config()).unwrap();
        let nose = subjects[0].keypoint(0).unwrap();
        assert_eq!((nose.x, nose.y), (0.0, 480.0));
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let out = Array3::<f32>::zeros((1, 6, 3));
        let err = decode_pose_output(out.view().into_dyn(), 1.0, 1.0, 1.0, &config());
        assert!(matches!(err, Err(PipelineError::Engine(_))));
    }
}
