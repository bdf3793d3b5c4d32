//! 日志初始化 (tracing-subscriber)

use std::sync::OnceLock;

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// 安装全局订阅器, 只生效一次
///
/// `RUST_LOG` 优先; 未设置时默认 `info`, verbose 时 `debug`。
/// 返回本次调用是否真正安装了订阅器。
pub fn init(verbose: bool) -> bool {
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let default_level = if verbose { "debug" } else { "info" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        installed_now = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_timer(fmt::time::uptime())
                    .with_filter(env_filter),
            )
            .try_init()
            .is_ok();
        installed_now
    });
    installed_now
}
