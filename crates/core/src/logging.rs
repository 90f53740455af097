use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 初始化全局tracing订阅器
///
/// RUST_LOG存在时优先于配置文件中的级别。重复初始化（测试场景）
/// 会被静默忽略。
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
