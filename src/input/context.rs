//! 流尺寸共享上下文
//! Stream geometry shared by the ingestor and the recorder

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::ingestor::MAX_FRAME_DIM;
use crate::error::{PipelineError, Result};

/// 采集流尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
}

impl StreamGeometry {
    /// 宽高都在 1..=MAX_FRAME_DIM 内
    pub fn is_valid(&self) -> bool {
        let range = 1..=MAX_FRAME_DIM;
        range.contains(&self.width) && range.contains(&self.height)
    }
}

/// 流尺寸在收到第一次 geometry 事件后就绪
#[derive(Default)]
pub struct StreamContext {
    geometry: Mutex<Option<StreamGeometry>>,
    ready: Condvar,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_geometry(&self, width: u32, height: u32) {
        *self.geometry.lock() = Some(StreamGeometry { width, height });
        self.ready.notify_all();
    }

    pub fn geometry(&self) -> Option<StreamGeometry> {
        *self.geometry.lock()
    }

    /// 等待流尺寸就绪, 超时返回 `GeometryUnavailable`
    pub fn wait_geometry(&self, timeout: Duration) -> Result<StreamGeometry> {
        let mut geometry = self.geometry.lock();
        if geometry.is_none() {
            // wait_while_for 会处理虚假唤醒
            self.ready
                .wait_while_for(&mut geometry, |g| g.is_none(), timeout);
        }
        (*geometry).ok_or(PipelineError::GeometryUnavailable {
            waited_ms: timeout.as_millis() as u64,
        })
    }
}
