//! 激活门: 激活键按下且有目标时移动鼠标
//! Two-state actuation gate (Idle / Armed)

use tracing::{debug, warn};

use super::pointer::PointerDevice;
use crate::pipeline::TargetPoint;

/// 门状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    Armed,
}

/// 单个周期的动作
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateAction {
    NoOp,
    Relocated(TargetPoint),
}

/// 每个Detection调用一次 `cycle`, 每周期最多移动一次鼠标
#[derive(Debug, Default)]
pub struct ActuationGate {
    state: GateState,
    relocations: u64,
    failures: u64,
}

impl ActuationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn relocations(&self) -> u64 {
        self.relocations
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn cycle<P>(&mut self, target: Option<TargetPoint>, pointer: &mut P) -> GateAction
    where
        P: PointerDevice + ?Sized,
    {
        let next = if pointer.modifier_held() {
            GateState::Armed
        } else {
            GateState::Idle
        };
        if next != self.state {
            debug!("激活门状态: {:?} → {:?}", self.state, next);
            self.state = next;
        }

        let (GateState::Armed, Some(target)) = (self.state, target) else {
            return GateAction::NoOp;
        };

        match pointer.relocate(target.x, target.y) {
            Ok(()) => {
                self.relocations += 1;
                GateAction::Relocated(target)
            }
            Err(e) => {
                self.failures += 1;
                warn!("⚠️ 鼠标移动失败: {}", e);
                GateAction::NoOp
            }
        }
    }
}
