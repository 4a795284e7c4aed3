use crate::cli::ReaderCommand;
use crate::config::{Settings, KEY_PREFERRED_READER};
use crate::reader::ReaderManager;
use crate::AppState;
use anyhow::Result;

pub async fn reader(state: &AppState, command: ReaderCommand) -> Result<()> {
    let settings = state.settings().await?;
    let mut manager = ReaderManager::new(settings.preferred_reader);

    match command {
        ReaderCommand::List => {
            let preferred = manager.preferred();
            for reader in manager.available() {
                let marker = if reader == preferred { "*" } else { " " };
                if reader.is_installed() {
                    println!("{} {} (installed)", marker, reader);
                } else {
                    let hint = reader.install_command().unwrap_or_default();
                    println!("{} {} (not installed: {})", marker, reader, hint);
                }
            }
        }
        ReaderCommand::Set { name } => {
            let reader = manager.set_preferred(&name)?;
            Settings::set(&state.db, KEY_PREFERRED_READER, reader.name()).await?;
            println!("Preferred reader: {}", reader);
        }
    }
    Ok(())
}
