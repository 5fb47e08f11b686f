//! 可观测性：日志订阅器初始化
//!
//! 默认 info 级别，可通过 RUST_LOG 覆盖（如 `RUST_LOG=colony=debug`）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 构造过滤器：优先使用 RUST_LOG，未设置或无法解析时回退到 `default_directive`
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// 初始化全局日志；重复调用时返回 false（测试中可能被多次调用）
pub fn init() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
