use std::path::PathBuf;

use clap::Subcommand;
use zeppctl::{Event, NotebookRequest};

use crate::cli::GlobalFlags;

#[derive(Subcommand, Debug)]
pub enum NotebookCommand {
    /// Register a notebook document with the running daemon
    Import {
        /// Notebook document (JSON)
        file: PathBuf,

        /// Stable key for the notebook; defaults to the file stem
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove a previously registered notebook
    Remove { key: String },
}

pub async fn execute(command: NotebookCommand, global: &GlobalFlags) -> anyhow::Result<()> {
    let controller = global.controller(None)?;

    let outcome = match command {
        NotebookCommand::Import { file, key } => {
            let key = match key {
                Some(key) => key,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| anyhow::anyhow!("cannot derive a key from {}", file.display()))?,
            };
            let content = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
            controller
                .handle(Event::RegisterNotebooks(vec![NotebookRequest {
                    key,
                    content,
                }]))
                .await?
        }
        NotebookCommand::Remove { key } => {
            controller.handle(Event::RemoveNotebooks(vec![key])).await?
        }
    };

    super::report_acks(&outcome.acks)
}
