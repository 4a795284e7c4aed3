use anyhow::Context;
use bookshell_lib::cli::Cli;
use bookshell_lib::config::resolve_data_dir;
use bookshell_lib::logging::{log_dir, LogConfig, SizeRotatingWriter};
use bookshell_lib::{commands, AppState};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 初始化日志系统
fn init_logging(data_dir: &Path, verbose: bool) {
    let config = LogConfig::load(data_dir);

    let mut env_filter = EnvFilter::from_default_env().add_directive(config.tracing_level().into());
    for directive in ["hyper=warn", "reqwest=warn", "sqlx=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    // --verbose 时输出到 stderr
    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    // 文件日志层；创建失败时只保留控制台
    let file_layer = config
        .enabled
        .then(|| SizeRotatingWriter::new(&log_dir(data_dir), config.max_size_mb).ok())
        .flatten()
        .map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
        });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir().context("Failed to prepare the data directory")?;
    init_logging(&data_dir, cli.verbose);

    let state = AppState::new(data_dir)
        .await
        .context("Failed to initialize application state")?;

    let result = commands::run(cli, &state).await;
    if let Err(e) = &result {
        tracing::error!("命令失败: {:#}", e);
    }
    state.cleanup().await;
    result
}
