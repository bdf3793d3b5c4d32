/// 鼠标控制系统 (Pointer Control)
///
/// - TargetSelector: Detection → 目标屏幕坐标
/// - ActuationGate:  激活键状态机, 每周期最多移动一次鼠标
/// - PointerDevice:  系统鼠标/键盘能力 (Windows / 空跑)
pub mod gate;
pub mod pointer;
pub mod selector;

pub use gate::{ActuationGate, GateAction, GateState};
pub use pointer::{ActivationKey, DryRunPointer, PointerDevice};
pub use selector::{ScreenMapping, TargetSelector};

#[cfg(windows)]
pub use pointer::WinPointer;
