//! 单本书管理命令

use super::describe_error;
use super::interactive::confirm;
use crate::core::{BookStatus, DeleteTarget, Outcome, Visibility};
use crate::error::LibraryError;
use crate::reader::ReaderManager;
use crate::AppState;
use anyhow::Result;

fn report(name: &str, result: crate::error::Result<Outcome>) -> Result<()> {
    match result {
        Ok(outcome) => {
            println!("✓ {} {}", name, outcome);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(describe_error(&e))),
    }
}

pub async fn status(state: &AppState, name: &str, status: BookStatus) -> Result<()> {
    let engine = state.engine().await?;
    report(name, engine.set_status(name, status).await)
}

pub async fn move_category(state: &AppState, name: &str, category: &str) -> Result<()> {
    let engine = state.engine().await?;
    report(name, engine.move_category(name, category).await)
}

pub async fn delete(state: &AppState, name: &str, target: DeleteTarget, yes: bool) -> Result<()> {
    let engine = state.engine().await?;
    let prompt = match target {
        DeleteTarget::Local => format!("Delete the local copy of '{}'?", name),
        DeleteTarget::Remote => format!("Move the Drive copy of '{}' to the trash?", name),
        DeleteTarget::Both => format!("Delete '{}' locally and on Drive?", name),
    };
    if !confirm(&prompt, yes)? {
        println!("Aborted");
        return Ok(());
    }
    report(name, engine.delete(name, target).await)
}

pub async fn share(state: &AppState, name: &str, public: bool) -> Result<()> {
    let engine = state.engine().await?;
    match engine.share(name, public).await {
        Ok(Visibility::Public(link)) => println!("{} is shared: {}", name, link),
        Ok(Visibility::Private) => println!("{} is private", name),
        Err(e) => anyhow::bail!(describe_error(&e)),
    }
    Ok(())
}

/// 没有本地副本时先下载
pub async fn open(state: &AppState, name: &str) -> Result<()> {
    let engine = state.engine().await?;
    let path = match engine.pull_one(name).await {
        Ok(Outcome::Downloaded { path }) => {
            println!("Downloaded {}", path.display());
            path
        }
        Ok(Outcome::AlreadyPresent { path }) => path,
        Ok(other) => anyhow::bail!("cannot open {}: {}", name, other),
        Err(LibraryError::NotFound(_)) => {
            // 只在本地存在的书
            engine
                .list_local()
                .await
                .map_err(|e| anyhow::anyhow!(describe_error(&e)))?
                .into_iter()
                .find(|e| e.name == name)
                .and_then(|e| e.local_path)
                .ok_or_else(|| anyhow::anyhow!("not found: {}", name))?
        }
        Err(e) => anyhow::bail!(describe_error(&e)),
    };

    let settings = state.settings().await?;
    let reader = ReaderManager::new(settings.preferred_reader).open(&path)?;
    println!("Opened {} with {}", name, reader);
    Ok(())
}
