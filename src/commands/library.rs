//! 书库查看命令

use super::format_size;
use crate::core::CatalogEntry;
use crate::db::MappingStore;
use crate::AppState;
use anyhow::{Context, Result};

fn print_entries(entries: &[CatalogEntry]) {
    println!("{:<40} {:<16} {:<12} {:<9} {:>10}", "NAME", "CATEGORY", "STATE", "STATUS", "SIZE");
    for entry in entries {
        let state = entry
            .sync_state()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{:<40} {:<16} {:<12} {:<9} {:>10}",
            entry.name,
            entry.display_category(),
            state,
            entry.status.as_str(),
            format_size(entry.size)
        );
    }
    println!("{} books", entries.len());
}

pub async fn library(state: &AppState, offline: bool) -> Result<()> {
    if offline {
        let entries = MappingStore::new(state.db.clone())
            .cached_entries()
            .await
            .context("Failed to read the mapping cache")?;
        print_entries(&entries);
        return Ok(());
    }

    let engine = state.engine().await?;
    let catalog = engine.get_library().await.context("Failed to list library")?;
    let entries = catalog.into_entries();
    print_entries(&entries);
    Ok(())
}

pub async fn diff(state: &AppState) -> Result<()> {
    let engine = state.engine().await?;
    let diff = engine.get_diff().await.context("Failed to compute diff")?;

    if diff.is_empty() {
        println!("Library is in sync");
        return Ok(());
    }

    println!(
        "To upload ({}, {}):",
        diff.to_upload.len(),
        format_size(diff.upload_bytes())
    );
    for entry in &diff.to_upload {
        println!("  ↑ [{}] {}", entry.display_category(), entry.name);
    }
    println!(
        "To download ({}, {}):",
        diff.to_download.len(),
        format_size(diff.download_bytes())
    );
    for entry in &diff.to_download {
        println!("  ↓ [{}] {}", entry.display_category(), entry.name);
    }
    Ok(())
}
