//! 屏幕采集服务客户端
//! TCP client for the screen-capture service
//!
//! 帧格式: `[tag: u8][len: u32 BE][payload]`
//! - 0x01 流尺寸 (width u32 BE, height u32 BE)
//! - 0x02 编码帧 (PNG/JPEG/BMP)
//! - 0x03 状态文本 (UTF-8)
//!
//! 客户端命令: 0x10 开始推流, 0x11 停止推流 (payload 为空)

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::{CaptureHandler, CaptureSource, StreamGeometry};
use crate::error::{PipelineError, Result};

pub const TAG_GEOMETRY: u8 = 0x01;
pub const TAG_FRAME: u8 = 0x02;
pub const TAG_STATUS: u8 = 0x03;
pub const CMD_START_STREAM: u8 = 0x10;
pub const CMD_STOP_STREAM: u8 = 0x11;

/// 单条消息最大长度 (64 MiB)
pub const MAX_PAYLOAD: usize = 64 << 20;

/// 写一条消息
pub fn write_message<W: Write>(w: &mut W, tag: u8, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;
    w.write_all(&[tag])?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(payload)?;
    w.flush()
}

/// 读一条消息; 在消息边界遇到EOF时返回 `None`
pub fn read_message<R: Read>(r: &mut R) -> Result<Option<(u8, Vec<u8>)>> {
    let mut tag = [0u8; 1];
    match r.read_exact(&mut tag) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut len = [0u8; 4];
    r.read_exact(&mut len)?;
    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_PAYLOAD {
        return Err(PipelineError::Protocol(format!(
            "payload of {} bytes exceeds limit",
            len
        )));
    }

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some((tag[0], payload)))
}

fn parse_geometry(payload: &[u8]) -> Result<(u32, u32)> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| {
        PipelineError::Protocol(format!("geometry payload of {} bytes", payload.len()))
    })?;
    let width = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let height = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if !(StreamGeometry { width, height }).is_valid() {
        return Err(PipelineError::Protocol(format!(
            "invalid stream geometry {}x{}",
            width, height
        )));
    }
    Ok((width, height))
}

/// 采集客户端: 独立读取线程把消息分发给 `CaptureHandler`
pub struct TcpCaptureSource {
    addr: String,
    stream: TcpStream,
    stopping: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl TcpCaptureSource {
    /// 连接采集服务并启动读取线程; 连接失败是致命错误
    pub fn connect<H>(addr: &str, handler: H) -> Result<Self>
    where
        H: CaptureHandler + 'static,
    {
        info!("🎬 开始连接采集服务 {}...", addr);
        let stream = TcpStream::connect(addr).map_err(|source| PipelineError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay 失败: {}", e);
        }

        let reader_stream = stream.try_clone()?;
        let stopping = Arc::new(AtomicBool::new(false));
        let reader = {
            let stopping = Arc::clone(&stopping);
            thread::Builder::new()
                .name("capture-reader".to_string())
                .spawn(move || reader_loop(reader_stream, handler, stopping))?
        };

        Ok(Self {
            addr: addr.to_string(),
            stream,
            stopping,
            reader: Some(reader),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn send_command(&mut self, cmd: u8) -> Result<()> {
        write_message(&mut self.stream, cmd, &[])?;
        Ok(())
    }
}

impl CaptureSource for TcpCaptureSource {
    fn start_stream(&mut self) -> Result<()> {
        self.send_command(CMD_START_STREAM)
    }

    fn stop_stream(&mut self) -> Result<()> {
        self.send_command(CMD_STOP_STREAM)
    }

    fn disconnect(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("shutdown 失败: {}", e);
        }
        if reader.join().is_err() {
            warn!("⚠️ 采集读取线程异常退出");
        }
        info!("采集服务 {} 已断开", self.addr);
    }
}

impl Drop for TcpCaptureSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn reader_loop<H: CaptureHandler>(stream: TcpStream, mut handler: H, stopping: Arc<AtomicBool>) {
    handler.on_connected();
    let mut reader = BufReader::new(stream);

    let reason = loop {
        match read_message(&mut reader) {
            Ok(Some((TAG_FRAME, payload))) => handler.on_frame_bytes(&payload),
            Ok(Some((TAG_GEOMETRY, payload))) => match parse_geometry(&payload) {
                Ok((width, height)) => handler.on_stream_geometry(width, height),
                Err(e) => break e.to_string(),
            },
            Ok(Some((TAG_STATUS, payload))) => {
                info!("采集服务: {}", String::from_utf8_lossy(&payload));
            }
            Ok(Some((tag, _))) => {
                break PipelineError::Protocol(format!("unknown tag 0x{:02x}", tag)).to_string()
            }
            Ok(None) => break "eof".to_string(),
            Err(_) if stopping.load(Ordering::SeqCst) => break "local disconnect".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    handler.on_disconnected(&reason);
}
