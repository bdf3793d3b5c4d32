//! 流水线配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::control::{ActivationKey, ScreenMapping};
use crate::detection::{check_net_size, PoseDecoderConfig};
use crate::error::Result;

/// 录制图片编码
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageCodec {
    #[default]
    Png,
    Jpeg,
}

impl ImageCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageCodec::Png => "png",
            ImageCodec::Jpeg => "jpg",
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            ImageCodec::Png => ImageFormat::Png,
            ImageCodec::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// 录制参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub path: String,             // 输出根目录
    pub codec: ImageCodec,        // 图片编码
    pub fps: u32,                 // 写入manifest的标称帧率
    pub geometry_timeout_ms: u64, // 等待流尺寸的超时
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            path: "recordings".to_string(),
            codec: ImageCodec::Png,
            fps: 30,
            geometry_timeout_ms: 5000,
        }
    }
}

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 采集参数 ===
    pub capture_host: String,
    pub capture_port: u16,

    // === 模型参数 ===
    pub model_path: String,
    pub net_width: Option<u32>, // None = 按画面宽高比自动
    pub net_height: u32,
    pub conf_threshold: f32,     // 人体置信度阈值
    pub kpt_conf_threshold: f32, // 关键点绘制阈值
    pub iou_threshold: f32,      // NMS IOU阈值

    // === 控制参数 ===
    pub reference_keypoint: usize, // 0 = 鼻子
    pub activation_key: ActivationKey,
    pub screen_mapping: ScreenMapping,

    // === 叠加/录制 ===
    pub marker_radius: i32,
    pub font_path: Option<String>,
    pub record: Option<RecordConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_host: "127.0.0.1".to_string(),
            capture_port: 8080,

            model_path: "models/yolov8n-pose.onnx".to_string(),
            net_width: None,
            net_height: 352,
            conf_threshold: 0.25,
            kpt_conf_threshold: 0.55,
            iou_threshold: 0.45,

            reference_keypoint: crate::NOSE,
            activation_key: ActivationKey::Alt,
            screen_mapping: ScreenMapping::default(),

            marker_radius: 50,
            font_path: None,
            record: None,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 检查从文件加载的数值参数
    pub fn validate(&self) -> Result<()> {
        check_net_size(self.net_width, self.net_height)
    }

    pub fn capture_addr(&self) -> String {
        format!("{}:{}", self.capture_host, self.capture_port)
    }

    pub fn decoder(&self) -> PoseDecoderConfig {
        PoseDecoderConfig {
            conf: self.conf_threshold,
            iou: self.iou_threshold,
            ..PoseDecoderConfig::default()
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前流水线配置:");
        info!("  采集地址: {}", self.capture_addr());
        info!("  姿态模型: {}", self.model_path);
        match self.net_width {
            Some(w) => info!("  网络输入: {}x{}", w, self.net_height),
            None => info!("  网络输入: auto x {}", self.net_height),
        }
        info!(
            "  置信度: {:.2} / 关键点: {:.2} / IOU: {:.2}",
            self.conf_threshold, self.kpt_conf_threshold, self.iou_threshold
        );
        info!(
            "  参考关键点: {}  激活键: {:?}",
            self.reference_keypoint, self.activation_key
        );
        if let Some(record) = &self.record {
            info!("  录制: {} ({:?}, {} fps)", record.path, record.codec, record.fps);
        }
    }
}
