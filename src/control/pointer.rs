//! 鼠标/键盘系统接口
//! OS pointer capability: activation-key state and cursor relocation

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// 激活键
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKey {
    Alt,
    Shift,
    Ctrl,
}

impl std::str::FromStr for ActivationKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alt" | "menu" => Ok(ActivationKey::Alt),
            "shift" => Ok(ActivationKey::Shift),
            "ctrl" | "control" => Ok(ActivationKey::Ctrl),
            other => Err(format!("unknown activation key: {}", other)),
        }
    }
}

/// 鼠标设备能力, 每个周期各调用最多一次
pub trait PointerDevice {
    /// 激活键当前是否按下
    fn modifier_held(&mut self) -> bool;

    /// 把鼠标移动到屏幕坐标
    fn relocate(&mut self, x: i32, y: i32) -> Result<()>;
}

/// 空跑设备: 固定的激活键状态, 只记录移动
#[derive(Debug, Default)]
pub struct DryRunPointer {
    armed: bool,
    relocations: u64,
    last: Option<(i32, i32)>,
}

impl DryRunPointer {
    pub fn new(armed: bool) -> Self {
        Self {
            armed,
            ..Default::default()
        }
    }

    pub fn relocations(&self) -> u64 {
        self.relocations
    }

    pub fn last(&self) -> Option<(i32, i32)> {
        self.last
    }
}

impl PointerDevice for DryRunPointer {
    fn modifier_held(&mut self) -> bool {
        self.armed
    }

    fn relocate(&mut self, x: i32, y: i32) -> Result<()> {
        debug!("🖱️ [dry-run] 鼠标移动到 ({}, {})", x, y);
        self.relocations += 1;
        self.last = Some((x, y));
        Ok(())
    }
}

#[cfg(windows)]
pub use self::windows_impl::WinPointer;

#[cfg(windows)]
mod windows_impl {
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        GetKeyState, VIRTUAL_KEY, VK_CONTROL, VK_MENU, VK_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

    use super::{ActivationKey, PointerDevice};
    use crate::error::{PipelineError, Result};

    /// Windows 鼠标: GetKeyState + SetCursorPos
    pub struct WinPointer {
        key: VIRTUAL_KEY,
    }

    impl WinPointer {
        pub fn new(key: ActivationKey) -> Self {
            let key = match key {
                ActivationKey::Alt => VK_MENU,
                ActivationKey::Shift => VK_SHIFT,
                ActivationKey::Ctrl => VK_CONTROL,
            };
            Self { key }
        }
    }

    impl PointerDevice for WinPointer {
        fn modifier_held(&mut self) -> bool {
            // 最高位为1表示按下
            unsafe { GetKeyState(self.key.0 as i32) < 0 }
        }

        fn relocate(&mut self, x: i32, y: i32) -> Result<()> {
            unsafe { SetCursorPos(x, y) }.map_err(|e| PipelineError::Pointer(e.to_string()))
        }
    }
}
