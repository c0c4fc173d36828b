// ==========================================
// 卫生机构数据交换引擎 - 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别，可切换 JSON 输出
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// RUST_LOG 过滤器，未设置或无效时为 info
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=facility_data_io::importer=trace
///
/// # 示例
/// ```no_run
/// use facility_data_io::logging;
/// logging::init();
/// ```
pub fn init() {
    // 配置日志格式（输出到 stderr，stdout 留给命令结果）
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}

/// 初始化 JSON 格式日志（命令行 `--json-logs`，便于日志采集）
///
/// # 环境变量
/// - RUST_LOG: 同 [`init`]
pub fn init_json() {
    fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .with_writer(std::io::stderr)
        .init();
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
