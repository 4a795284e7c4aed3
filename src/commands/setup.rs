//! 初始化与设置命令

use crate::config::{Settings, KEY_ACCESS_TOKEN, KEY_LOCAL_PATH, KEY_ROOT_FOLDER_ID, TOKEN_ENV};
use crate::storage::RemoteStorage;
use crate::AppState;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

fn default_local_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join("Bookshell"))
        .unwrap_or_else(|| PathBuf::from("Bookshell"))
}

pub async fn setup(state: &AppState, local_path: Option<PathBuf>, folder_name: &str) -> Result<()> {
    let settings = state.settings().await?;
    let local_path = local_path
        .or(settings.local_path.clone())
        .unwrap_or_else(default_local_path);

    std::fs::create_dir_all(&local_path)
        .with_context(|| format!("Failed to create {}", local_path.display()))?;
    let local_str = local_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid local path: {}", local_path.display()))?;
    Settings::set(&state.db, KEY_LOCAL_PATH, local_str).await?;
    println!("Local library: {}", local_path.display());

    let drive = state.drive(&settings)?;
    let root_id = drive
        .ensure_root_folder(folder_name)
        .await
        .context("Failed to prepare the Drive root folder")?;
    Settings::set(&state.db, KEY_ROOT_FOLDER_ID, &root_id).await?;
    info!("初始化完成: {:?}, root {}", local_path, root_id);

    println!("Drive folder: {} ({})", folder_name, root_id);
    println!();
    println!("Ready to go:");
    println!("  1. Drop PDF/EPUB files into {} (subfolders become categories)", local_path.display());
    println!("  2. Run `bookshell push --all` to upload them");
    println!("  3. Books added to '{}' on Drive arrive with `bookshell pull --all`", folder_name);
    Ok(())
}

pub async fn config(state: &AppState, set: &[String]) -> Result<()> {
    for pair in set {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got '{}'", pair))?;
        Settings::set(&state.db, key.trim(), value.trim()).await?;
        println!("Set {}", key.trim());
    }

    let settings = state.settings().await?;
    let show = |value: Option<String>| value.unwrap_or_else(|| "(not set)".to_string());
    println!("data dir:                 {}", state.data_dir.display());
    println!(
        "local_path:               {}",
        show(settings.local_path.as_ref().map(|p| p.display().to_string()))
    );
    println!("root_folder_id:           {}", show(settings.root_folder_id.clone()));
    println!("preferred_reader:         {}", show(settings.preferred_reader.clone()));
    println!(
        "max_concurrent_transfers: {}",
        show(settings.max_concurrent_transfers.map(|n| n.to_string()))
    );
    let token = match (std::env::var(TOKEN_ENV).is_ok(), settings.access_token.is_some()) {
        (true, _) => format!("(from {})", TOKEN_ENV),
        (false, true) => "(stored)".to_string(),
        (false, false) => "(not set)".to_string(),
    };
    println!("{:<26}{}", format!("{}:", KEY_ACCESS_TOKEN), token);
    Ok(())
}
