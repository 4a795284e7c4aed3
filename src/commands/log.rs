//! 日志相关命令

use crate::logging::{log_dir, LogConfig};
use crate::AppState;
use anyhow::Result;

pub fn log(
    state: &AppState,
    enabled: Option<bool>,
    level: Option<&str>,
    max_size_mb: Option<u32>,
) -> Result<()> {
    let mut config = LogConfig::load(&state.data_dir);

    if enabled.is_some() || level.is_some() || max_size_mb.is_some() {
        config.apply(enabled, max_size_mb, level)?;
        config.save(&state.data_dir)?;
        println!("Logging settings saved, they apply from the next command");
    }

    println!("enabled:     {}", config.enabled);
    println!("level:       {}", config.level);
    println!("max size:    {} MB", config.max_size_mb);
    println!("log dir:     {}", log_dir(&state.data_dir).display());
    Ok(())
}
