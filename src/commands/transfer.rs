//! 推送、拉取与双向同步命令

use super::interactive::confirm;
use super::{decision_handler, describe_error, format_size, print_report};
use crate::error::LibraryError;
use crate::AppState;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

pub async fn push(
    state: &AppState,
    path: Option<PathBuf>,
    category: Option<String>,
    all: bool,
    yes: bool,
) -> Result<()> {
    let engine = state.engine().await?;
    let handler = decision_handler(yes);

    if let Some(path) = path {
        return match engine.push_one(&path, category, handler.as_ref()).await {
            Ok(outcome) => {
                println!("✓ {} {}", path.display(), outcome);
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!(describe_error(&e))),
        };
    }

    if all {
        let diff = engine.get_diff().await.context("Failed to compute diff")?;
        println!(
            "{} new books to upload ({}); books filed under another category on Drive will be checked too",
            diff.to_upload.len(),
            format_size(diff.upload_bytes())
        );
        if !confirm("Push local library to Drive?", yes)? {
            println!("Aborted");
            return Ok(());
        }

        let report = match engine.push_all(handler.as_ref()).await {
            Err(LibraryError::Cancelled) => {
                println!("Aborted");
                return Ok(());
            }
            other => other.context("Push failed")?,
        };
        print_report("Push", &report);
    }
    Ok(())
}

pub async fn pull(state: &AppState, name: Option<String>, all: bool, yes: bool) -> Result<()> {
    let engine = state.engine().await?;

    if let Some(name) = name {
        return match engine.pull_one(&name).await {
            Ok(outcome) => {
                println!("✓ {} {}", name, outcome);
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!(describe_error(&e))),
        };
    }

    if all {
        let diff = engine.get_diff().await.context("Failed to compute diff")?;
        if diff.to_download.is_empty() {
            println!("Nothing to download");
            return Ok(());
        }
        println!(
            "{} books to download ({})",
            diff.to_download.len(),
            format_size(diff.download_bytes())
        );
        if !confirm("Download them now?", yes)? {
            println!("Aborted");
            return Ok(());
        }

        let report = engine.pull_all().await.context("Pull failed")?;
        print_report("Pull", &report);
    }
    Ok(())
}

pub async fn sync(state: &AppState, yes: bool) -> Result<()> {
    let engine = state.engine().await?;
    let diff = engine.get_diff().await.context("Failed to compute diff")?;
    println!(
        "{} to upload, {} to download",
        diff.to_upload.len(),
        diff.to_download.len()
    );
    if !confirm("Sync library with Drive?", yes)? {
        println!("Aborted");
        return Ok(());
    }

    let handler = decision_handler(yes);
    let report = match engine.sync_all(handler.as_ref()).await {
        Err(LibraryError::Cancelled) => {
            println!("Aborted");
            return Ok(());
        }
        other => other.context("Sync failed")?,
    };
    info!("同步完成: 失败 {}", report.failed());
    print_report("Sync", &report);
    Ok(())
}
