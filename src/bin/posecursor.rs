/// 屏幕姿态跟踪 (Pose Cursor)
///
/// 系统架构:
/// 1. 采集线程: 接收编码帧 → 解码 → 单槽帧队列 (永不阻塞)
/// 2. 引擎线程: YOLOv8-pose 推理
/// 3. 主线程:   取最新帧 → 提交引擎 → 目标选择 → 激活键按下时移动鼠标 (+ 录制)
use std::ops::ControlFlow;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, info_span, warn};

use posecursor::control::{ActuationGate, DryRunPointer, GateAction, PointerDevice, TargetSelector};
use posecursor::input::{CaptureSource, FrameIngestor, StreamContext, TcpCaptureSource};
use posecursor::output::{FrameRecorder, ImageSequenceRecorder, OverlayRenderer};
use posecursor::pipeline::{EngineWorker, InferenceStage};
use posecursor::{telemetry, DecodedFrame, FrameQueue, PipelineConfig, PipelineError, RecordConfig};

/// 屏幕姿态跟踪参数 (覆盖配置文件)
#[derive(Parser, Debug)]
#[command(author, version, about = "屏幕姿态跟踪 - 激活键按下时鼠标跟随目标", long_about = None)]
struct Args {
    /// 配置文件 (不存在时自动创建)
    #[arg(short, long, default_value = "posecursor.json")]
    config: String,

    /// 采集服务地址
    #[arg(long)]
    host: Option<String>,

    /// 采集服务端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 姿态模型 (ONNX)
    #[arg(short, long)]
    model: Option<String>,

    /// 网络输入高度
    #[arg(long)]
    net_height: Option<u32>,

    /// 录制叠加后的画面到该目录
    #[arg(long)]
    record: Option<String>,

    /// 不移动真实鼠标
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// 运行指定周期数后退出
    #[arg(long)]
    max_cycles: Option<u64>,

    /// 输出调试日志
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(host) = &self.host {
            config.capture_host = host.clone();
        }
        if let Some(port) = self.port {
            config.capture_port = port;
        }
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(net_height) = self.net_height {
            config.net_height = net_height;
        }
        if let Some(path) = &self.record {
            let record = config.record.get_or_insert_with(RecordConfig::default);
            record.path = path.clone();
        }
    }
}

#[cfg(feature = "onnx")]
fn build_engine(config: &PipelineConfig) -> anyhow::Result<EngineWorker> {
    use posecursor::detection::OnnxPoseEstimator;

    let estimator = OnnxPoseEstimator::load(
        &config.model_path,
        config.net_width,
        config.net_height,
        config.decoder(),
    )?;
    Ok(EngineWorker::spawn(estimator)?)
}

#[cfg(not(feature = "onnx"))]
fn build_engine(_config: &PipelineConfig) -> anyhow::Result<EngineWorker> {
    anyhow::bail!("姿态引擎不可用: 请使用 `--features onnx` 重新编译")
}

#[cfg(windows)]
fn build_pointer(config: &PipelineConfig, dry_run: bool) -> Box<dyn PointerDevice> {
    use posecursor::control::WinPointer;

    if dry_run {
        Box::new(DryRunPointer::new(true))
    } else {
        Box::new(WinPointer::new(config.activation_key))
    }
}

#[cfg(not(windows))]
fn build_pointer(_config: &PipelineConfig, dry_run: bool) -> Box<dyn PointerDevice> {
    if !dry_run {
        warn!("⚠️ 当前平台不支持鼠标控制, 使用空跑模式");
    }
    Box::new(DryRunPointer::new(true))
}

fn open_recorder(
    config: &PipelineConfig,
    context: &StreamContext,
) -> anyhow::Result<Option<ImageSequenceRecorder>> {
    let Some(record) = &config.record else {
        return Ok(None);
    };
    match ImageSequenceRecorder::open(record, context) {
        Ok(recorder) => Ok(Some(recorder)),
        Err(e @ PipelineError::GeometryUnavailable { .. }) => {
            warn!("⚠️ 录制已禁用: {}", e);
            Ok(None)
        }
        Err(e) => Err(e).context("无法开始录制"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(args.verbose);

    let mut config = PipelineConfig::load(&args.config);
    args.apply(&mut config);
    config
        .validate()
        .with_context(|| format!("配置文件 {} 无效", args.config))?;
    config.print_summary();

    let span = info_span!(
        "posecursor.pipeline",
        source = %config.capture_addr(),
        model = %config.model_path
    );
    let _enter = span.enter();

    info!("🚀 屏幕姿态跟踪启动");

    // ========== 推理引擎 ==========
    let engine = build_engine(&config).context("无法创建姿态引擎")?;

    // ========== 采集线程 ==========
    let queue: Arc<FrameQueue<DecodedFrame>> = Arc::new(FrameQueue::new());
    let context = Arc::new(StreamContext::new());
    let ingestor = FrameIngestor::new(Arc::clone(&queue), Arc::clone(&context));
    let ingest_stats = ingestor.stats();

    let addr = config.capture_addr();
    let mut source = TcpCaptureSource::connect(&addr, ingestor)
        .with_context(|| format!("无法连接采集服务 {}", addr))?;
    source.start_stream().context("无法启动采集流")?;

    {
        let queue = Arc::clone(&queue);
        ctrlc::set_handler(move || {
            info!("收到退出信号, 关闭帧队列");
            queue.close();
        })
        .context("无法安装 Ctrl+C 处理")?;
    }

    // ========== 录制/叠加 ==========
    let mut recorder = open_recorder(&config, &context)?;
    let mut overlay = OverlayRenderer::new(
        config.reference_keypoint,
        config.marker_radius,
        config.kpt_conf_threshold,
    );
    if let Some(font_path) = &config.font_path {
        overlay = overlay.with_font_file(font_path).context("无法加载字体")?;
    }

    // ========== 目标选择与鼠标控制 ==========
    let selector = TargetSelector::new(config.reference_keypoint, config.screen_mapping);
    let mut gate = ActuationGate::new();
    let mut pointer = build_pointer(&config, args.dry_run);

    let max_cycles = args.max_cycles;
    let mut cycles: u64 = 0;
    let mut stage = InferenceStage::new(Arc::clone(&queue), engine);
    let summary = stage.run(|frame, detection| {
        let target = selector.select(detection);
        if let GateAction::Relocated(point) = gate.cycle(target, pointer.as_mut()) {
            debug!("帧 #{} → 鼠标 ({}, {})", frame.frame_id, point.x, point.y);
        }

        if let Some(recorder) = recorder.as_mut() {
            let canvas = overlay.render(frame, detection);
            if let Err(e) = recorder.write_frame(&canvas) {
                warn!("⚠️ 帧 #{} 录制失败: {}", frame.frame_id, e);
            }
        }

        cycles += 1;
        match max_cycles {
            Some(max) if cycles >= max => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    });

    // ========== 退出 ==========
    queue.close();
    if let Err(e) = source.stop_stream() {
        debug!("停止采集流失败: {}", e);
    }
    source.disconnect();
    stage.into_engine().shutdown();

    if let Some(mut recorder) = recorder {
        recorder.finish().context("无法完成录制")?;
    }

    info!(
        "📊 运行结束: {} 个周期 | 引擎拒绝 {} | 鼠标移动 {} (失败 {}) | 解码 {} / 丢弃 {}",
        summary.cycles,
        summary.rejected,
        gate.relocations(),
        gate.failures(),
        ingest_stats.decoded_frames.load(Ordering::Relaxed),
        ingest_stats.dropped_frames.load(Ordering::Relaxed)
    );
    Ok(())
}
