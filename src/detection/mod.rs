/// 姿态检测系统 (Pose Detection System)
///
/// 在姿态引擎线程中运行
/// - pose: YOLOv8-pose 预处理 (letterbox) 与输出解码
/// - onnx: ONNX Runtime 推理 (feature = "onnx")
pub mod pose;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxPoseEstimator;
pub use pose::{check_net_size, decode_pose_output, letterbox, PoseDecoderConfig};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around a subject
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            confidence,
        }
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }
}

/// 按置信度降序排列并做NMS, 保留的元素顺序即输出优先级
pub fn non_max_suppression<T>(xs: &mut Vec<(Bbox, T)>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.0.confidence().total_cmp(&b1.0.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].0.iou(&xs[index].0);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = Bbox::new(5.0, 0.0, 10.0, 10.0, 0.8);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-5);
        assert_eq!(a.iou(&Bbox::new(20.0, 20.0, 1.0, 1.0, 0.1)), 0.0);
    }

    #[test]
    fn test_nms_keeps_highest_and_orders_by_confidence() {
        let mut xs = vec![
            (Bbox::new(0.0, 0.0, 10.0, 10.0, 0.6), "a"),
            (Bbox::new(1.0, 1.0, 10.0, 10.0, 0.9), "b"),
            (Bbox::new(100.0, 100.0, 10.0, 10.0, 0.7), "c"),
        ];
        non_max_suppression(&mut xs, 0.45);
        let kept: Vec<_> = xs.iter().map(|(_, tag)| *tag).collect();
        assert_eq!(kept, vec!["b", "c"]);
    }
}
