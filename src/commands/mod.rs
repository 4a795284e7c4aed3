pub mod interactive;
pub mod library;
pub mod log;
pub mod manage;
pub mod reader;
pub mod setup;
pub mod transfer;

use crate::cli::{Cli, Commands};
use crate::core::{DecisionHandler, SyncReport, Unattended};
use crate::error::LibraryError;
use crate::AppState;
use anyhow::Result;
use interactive::PromptHandler;

/// 分发子命令
pub async fn run(cli: Cli, state: &AppState) -> Result<()> {
    match cli.command {
        Commands::Setup {
            local_path,
            folder_name,
        } => setup::setup(state, local_path, &folder_name).await,
        Commands::Config { set } => setup::config(state, &set).await,
        Commands::Library { offline } => library::library(state, offline).await,
        Commands::Diff => library::diff(state).await,
        Commands::Push {
            path,
            category,
            all,
            yes,
        } => transfer::push(state, path, category, all, yes).await,
        Commands::Pull { name, all, yes } => transfer::pull(state, name, all, yes).await,
        Commands::Sync { yes } => transfer::sync(state, yes).await,
        Commands::Status { name, status } => manage::status(state, &name, status.into()).await,
        Commands::Move { name, category } => manage::move_category(state, &name, &category).await,
        Commands::Delete { name, target, yes } => manage::delete(state, &name, target, yes).await,
        Commands::Share { name, private } => manage::share(state, &name, !private).await,
        Commands::Open { name } => manage::open(state, &name).await,
        Commands::Reader { command } => reader::reader(state, command).await,
        Commands::Log {
            enabled,
            level,
            max_size_mb,
        } => log::log(state, enabled, level.as_deref(), max_size_mb),
    }
}

/// `--yes` 时无人值守，否则终端提示
pub fn decision_handler(yes: bool) -> Box<dyn DecisionHandler> {
    if yes {
        Box::new(Unattended)
    } else {
        Box::new(PromptHandler)
    }
}

/// 错误说明；重名时列出全部候选
pub fn describe_error(err: &LibraryError) -> String {
    match err {
        LibraryError::AmbiguousMatch { name, candidates } => {
            let mut text = format!("'{}' matches {} books on Drive:", name, candidates.len());
            for candidate in candidates {
                text.push_str(&format!("\n      {}", candidate.label()));
            }
            text
        }
        other => other.to_string(),
    }
}

pub fn print_report(title: &str, report: &SyncReport) {
    if report.is_empty() {
        println!("{}: nothing to do", title);
        return;
    }

    for item in &report.items {
        match &item.result {
            Ok(outcome) if outcome.is_skip() => println!("  - {} {}", item.name, outcome),
            Ok(outcome) => println!("  ✓ {} {}", item.name, outcome),
            Err(e) => println!("  ✗ {} {}", item.name, describe_error(e)),
        }
    }
    println!(
        "{}: {} succeeded, {} skipped, {} failed",
        title,
        report.succeeded(),
        report.skipped(),
        report.failed()
    );
}

/// 人类可读的文件大小
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BookStatus, RemoteCandidate};

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_describe_ambiguous_lists_candidates() {
        let err = LibraryError::AmbiguousMatch {
            name: "c.epub".into(),
            candidates: vec![RemoteCandidate {
                remote_id: "abcdefghij".into(),
                category: Some("math".into()),
                size: 3,
                status: BookStatus::New,
            }],
        };
        let text = describe_error(&err);
        assert!(text.contains("matches 1 books"));
        assert!(text.contains("[math] id abcdefgh…"));
    }
}
