//! 单槽帧队列 (最新帧优先)
//! Single-slot frame hand-off between the capture callback and the inference consumer
//!
//! 采集线程 `publish` 永不阻塞: 槽位已有未消费帧时直接替换,
//! 推理线程 `take_blocking` 等待下一帧或关闭信号。
//! 锁只在交换槽位时短暂持有, 等待期间由条件变量释放。

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::error::QueueClosed;

/// `publish` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 槽位为空, 直接存入
    Stored,
    /// 替换了一个未被消费的旧帧
    Replaced,
    /// 队列已关闭, 帧被丢弃
    Discarded,
}

struct Slot<T> {
    frame: Option<T>,
    closed: bool,
}

/// 容量为1的帧队列
pub struct FrameQueue<T> {
    slot: Mutex<Slot<T>>,
    available: Condvar,

    // 统计
    published: AtomicU64,
    replaced: AtomicU64,
    taken: AtomicU64,
}

/// 队列统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub published: u64,
    pub replaced: u64,
    pub taken: u64,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                closed: false,
            }),
            available: Condvar::new(),
            published: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
            taken: AtomicU64::new(0),
        }
    }

    /// 发布一帧, 原子地替换未消费的旧帧
    pub fn publish(&self, frame: T) -> PublishOutcome {
        let stale = {
            let mut slot = self.slot.lock();
            if slot.closed {
                return PublishOutcome::Discarded;
            }
            slot.frame.replace(frame)
        };
        self.published.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();

        // 旧帧在锁外释放
        match stale {
            Some(_) => {
                self.replaced.fetch_add(1, Ordering::Relaxed);
                PublishOutcome::Replaced
            }
            None => PublishOutcome::Stored,
        }
    }

    /// 阻塞等待下一帧; 队列关闭时返回 `QueueClosed`
    pub fn take_blocking(&self) -> Result<T, QueueClosed> {
        let mut slot = self.slot.lock();
        loop {
            if slot.closed {
                return Err(QueueClosed);
            }
            if let Some(frame) = slot.frame.take() {
                self.taken.fetch_add(1, Ordering::Relaxed);
                return Ok(frame);
            }
            self.available.wait(&mut slot);
        }
    }

    /// 非阻塞取帧
    pub fn try_take(&self) -> Result<Option<T>, QueueClosed> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(QueueClosed);
        }
        let frame = slot.frame.take();
        if frame.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
        }
        Ok(frame)
    }

    /// 关闭队列: 丢弃待处理帧并唤醒所有等待者 (可重复调用)
    pub fn close(&self) {
        let pending = {
            let mut slot = self.slot.lock();
            slot.closed = true;
            slot.frame.take()
        };
        drop(pending);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            published: self.published.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
        }
    }
}
