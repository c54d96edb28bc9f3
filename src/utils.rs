use std::path::PathBuf;

use anyhow::bail;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// 获取当前时间，本地时区不可用时退回 UTC
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// 初始化日志
pub fn init_log(log: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard) = if let Some(log) = log {
        // output to file，daily rotate, non-blocking
        if !log.is_dir() {
            bail!("log path {} is not a directory", log.display());
        }
        let file_appender = tracing_appender::rolling::daily(log, "course_enrollment.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        // output to stderr, stdout carries command output
        tracing_appender::non_blocking(std::io::stderr())
    };
    tracing::subscriber::set_global_default(subscriber_builder.with_writer(non_blocking).finish())
        .map_err(|e| anyhow::anyhow!("init log failed: {e}"))?;
    Ok(guard)
}
