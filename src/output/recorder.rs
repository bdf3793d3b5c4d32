//! 录制: 叠加后的帧 → 图片序列 + manifest.json

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ImageCodec, RecordConfig};
use crate::error::{PipelineError, Result};
use crate::input::{StreamContext, StreamGeometry};

const MANIFEST_FILE: &str = "manifest.json";

pub trait FrameRecorder {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// 结束录制, 返回最终的 manifest; 重复调用无副作用
    fn finish(&mut self) -> Result<RecordingManifest>;
}

/// 录制描述文件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingManifest {
    pub codec: ImageCodec,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub started_at: String,
    pub frames: u64,
}

/// 图片序列录制器, 每次录制一个带时间戳的目录
pub struct ImageSequenceRecorder {
    dir: PathBuf,
    manifest: RecordingManifest,
    finished: bool,
}

impl ImageSequenceRecorder {
    /// 等待流尺寸就绪后开始录制
    pub fn open(config: &RecordConfig, context: &StreamContext) -> Result<Self> {
        let geometry = context.wait_geometry(Duration::from_millis(config.geometry_timeout_ms))?;
        Self::create(config, geometry)
    }

    pub fn create(config: &RecordConfig, geometry: StreamGeometry) -> Result<Self> {
        if !geometry.is_valid() {
            return Err(PipelineError::Recorder(format!(
                "invalid frame size {}x{}",
                geometry.width, geometry.height
            )));
        }

        let started_at = crate::gen_time_string("-");
        let dir = Path::new(&config.path).join(&started_at);
        fs::create_dir_all(&dir)?;

        let recorder = Self {
            dir,
            manifest: RecordingManifest {
                codec: config.codec,
                fps: config.fps,
                width: geometry.width,
                height: geometry.height,
                started_at,
                frames: 0,
            },
            finished: false,
        };
        recorder.write_manifest()?;

        info!(
            "🎞️ 开始录制: {} ({}x{}, {:?})",
            recorder.dir.display(),
            geometry.width,
            geometry.height,
            config.codec
        );
        Ok(recorder)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames(&self) -> u64 {
        self.manifest.frames
    }

    fn write_manifest(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| PipelineError::Recorder(e.to_string()))?;
        fs::write(self.dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}

impl FrameRecorder for ImageSequenceRecorder {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(PipelineError::Recorder("recording already finished".to_string()));
        }

        let index = self.manifest.frames + 1;
        let path = self.dir.join(format!(
            "frame_{:06}.{}",
            index,
            self.manifest.codec.extension()
        ));

        let (width, height) = (self.manifest.width, self.manifest.height);
        if image.dimensions() != (width, height) {
            debug!(
                "帧尺寸 {:?} 与录制尺寸 {}x{} 不一致, 缩放",
                image.dimensions(),
                width,
                height
            );
            imageops::resize(image, width, height, FilterType::Triangle)
                .save_with_format(&path, self.manifest.codec.format())?;
        } else {
            image.save_with_format(&path, self.manifest.codec.format())?;
        }

        self.manifest.frames = index;
        Ok(())
    }

    fn finish(&mut self) -> Result<RecordingManifest> {
        if !self.finished {
            self.finished = true;
            self.write_manifest()?;
            info!(
                "💾 录制结束: {} 帧 → {}",
                self.manifest.frames,
                self.dir.display()
            );
        }
        Ok(self.manifest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::Arc;
    use std::thread;

    fn config(path: &Path, codec: ImageCodec) -> RecordConfig {
        RecordConfig {
            path: path.to_string_lossy().into_owned(),
            codec,
            fps: 25,
            geometry_timeout_ms: 100,
        }
    }

    fn read_manifest(dir: &Path) -> RecordingManifest {
        let json = fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_records_frames_and_manifest() {
        let root = tempfile::tempdir().unwrap();
        let geometry = StreamGeometry {
            width: 32,
            height: 16,
        };
        let mut recorder =
            ImageSequenceRecorder::create(&config(root.path(), ImageCodec::Png), geometry).unwrap();

        assert_eq!(read_manifest(recorder.dir()).frames, 0);

        let frame = RgbImage::from_pixel(32, 16, Rgb([10, 20, 30]));
        recorder.write_frame(&frame).unwrap();
        recorder.write_frame(&frame).unwrap();
        let manifest = recorder.finish().unwrap();

        assert_eq!(manifest.frames, 2);
        assert_eq!(manifest.fps, 25);
        assert_eq!(read_manifest(recorder.dir()), manifest);

        let first = image::open(recorder.dir().join("frame_000001.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(first, frame);
        assert!(recorder.dir().join("frame_000002.png").exists());
        assert!(recorder.write_frame(&frame).is_err());
    }

    #[test]
    fn test_mismatched_frame_is_resized() {
        let root = tempfile::tempdir().unwrap();
        let geometry = StreamGeometry {
            width: 20,
            height: 10,
        };
        let mut recorder =
            ImageSequenceRecorder::create(&config(root.path(), ImageCodec::Jpeg), geometry)
                .unwrap();

        recorder.write_frame(&RgbImage::new(40, 40)).unwrap();
        let saved = image::open(recorder.dir().join("frame_000001.jpg")).unwrap();
        assert_eq!((saved.width(), saved.height()), (20, 10));
    }

    #[test]
    fn test_out_of_range_geometry_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(root.path(), ImageCodec::Png);
        for (width, height) in [(0, 10), (u32::MAX, u32::MAX), (8193, 100)] {
            let result = ImageSequenceRecorder::create(&cfg, StreamGeometry { width, height });
            assert!(matches!(result, Err(PipelineError::Recorder(_))));
        }
        // 没有创建任何录制目录
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_open_waits_for_geometry() {
        let root = tempfile::tempdir().unwrap();
        let context = Arc::new(StreamContext::new());
        let setter = {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                context.set_geometry(64, 48);
            })
        };

        let mut cfg = config(root.path(), ImageCodec::Png);
        cfg.geometry_timeout_ms = 2000;
        let recorder = ImageSequenceRecorder::open(&cfg, &context).unwrap();
        setter.join().unwrap();

        let manifest = read_manifest(recorder.dir());
        assert_eq!((manifest.width, manifest.height), (64, 48));
    }

    #[test]
    fn test_open_without_geometry_times_out() {
        let root = tempfile::tempdir().unwrap();
        let context = StreamContext::new();

        let result = ImageSequenceRecorder::open(&config(root.path(), ImageCodec::Png), &context);
        assert!(matches!(
            result,
            Err(PipelineError::GeometryUnavailable { waited_ms: 100 })
        ));
    }
}
