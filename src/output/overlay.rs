//! 帧叠加绘制: 骨架 + 参考关键点标记 + 人数

use std::fs;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut, draw_text_mut};

use crate::error::{PipelineError, Result};
use crate::pipeline::{DecodedFrame, Detection, Subject};
use crate::SKELETON;

const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const SKELETON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

pub struct OverlayRenderer {
    reference_keypoint: usize,
    marker_radius: i32,
    kpt_conf_threshold: f32,
    font: Option<FontVec>,
}

impl OverlayRenderer {
    pub fn new(reference_keypoint: usize, marker_radius: i32, kpt_conf_threshold: f32) -> Self {
        Self {
            reference_keypoint,
            marker_radius,
            kpt_conf_threshold,
            font: None,
        }
    }

    /// 加载字体 (ttf/otf), 用于绘制人数
    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|e| {
            PipelineError::Config(format!("字体 {} 无效: {}", path.display(), e))
        })?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 在帧的副本上绘制, 原始帧不变
    pub fn render(&self, frame: &DecodedFrame, detection: &Detection) -> RgbImage {
        let mut canvas = frame.image.as_ref().clone();
        self.draw(&mut canvas, detection);
        canvas
    }

    pub fn draw(&self, canvas: &mut RgbImage, detection: &Detection) {
        for subject in &detection.subjects {
            self.draw_skeleton(canvas, subject);
        }

        if let Some(kp) = detection
            .primary()
            .and_then(|subject| subject.keypoint(self.reference_keypoint))
        {
            draw_hollow_circle_mut(
                canvas,
                (kp.x.round() as i32, kp.y.round() as i32),
                self.marker_radius,
                MARKER_COLOR,
            );
        }

        if let Some(font) = &self.font {
            let text = format!("{} person", detection.subjects.len());
            draw_text_mut(canvas, TEXT_COLOR, 8, 8, PxScale::from(24.0), font, &text);
        }
    }

    fn draw_skeleton(&self, canvas: &mut RgbImage, subject: &Subject) {
        for &(a, b) in SKELETON.iter() {
            let (Some(ka), Some(kb)) = (subject.keypoint(a), subject.keypoint(b)) else {
                continue;
            };
            if ka.confidence < self.kpt_conf_threshold || kb.confidence < self.kpt_conf_threshold {
                continue;
            }
            draw_line_segment_mut(canvas, (ka.x, ka.y), (kb.x, kb.y), SKELETON_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Keypoint;
    use crate::NOSE;

    fn black_frame() -> DecodedFrame {
        DecodedFrame::new(1, RgbImage::new(200, 200))
    }

    #[test]
    fn test_marker_drawn_at_reference_keypoint() {
        let renderer = OverlayRenderer::new(NOSE, 50, 0.55);
        let detection = Detection::new(
            1,
            vec![Subject::new(vec![Keypoint::new(NOSE, 100.0, 100.0, 0.9)], 0.9)],
        );
        let canvas = renderer.render(&black_frame(), &detection);

        assert_eq!(*canvas.get_pixel(150, 100), MARKER_COLOR);
        assert_eq!(*canvas.get_pixel(100, 50), MARKER_COLOR);
        // 空心圆
        assert_eq!(*canvas.get_pixel(100, 100), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_skeleton_respects_keypoint_confidence() {
        let renderer = OverlayRenderer::new(NOSE, 5, 0.55);
        let subject = Subject::new(
            vec![
                Keypoint::new(5, 20.0, 150.0, 0.9),
                Keypoint::new(6, 180.0, 150.0, 0.9),
                Keypoint::new(11, 20.0, 190.0, 0.1),
            ],
            0.8,
        );
        let detection = Detection::new(1, vec![subject]);
        let canvas = renderer.render(&black_frame(), &detection);

        // 5-6 两端都可信
        assert_eq!(*canvas.get_pixel(100, 150), SKELETON_COLOR);
        // 5-11 一端低于阈值
        assert_eq!(*canvas.get_pixel(20, 170), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_empty_detection_leaves_frame_untouched() {
        let renderer = OverlayRenderer::new(NOSE, 50, 0.55);
        let frame = black_frame();
        let canvas = renderer.render(&frame, &Detection::empty(1));
        assert_eq!(canvas, *frame.image);
    }

    #[test]
    fn test_invalid_font_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ttf");
        fs::write(&path, b"not a font").unwrap();

        let result = OverlayRenderer::new(NOSE, 50, 0.55).with_font_file(&path);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
