use clap::Subcommand;
use zeppctl::Event;

use crate::cli::{ArtifactArgs, GlobalFlags, SparkArgs};

/// Upstream relation events, normally delivered by the surrounding
/// orchestration rather than typed by hand.
#[derive(Subcommand, Debug)]
pub enum EventCommand {
    /// The Spark service is ready; install/start as needed
    Ready {
        #[command(flatten)]
        spark: SparkArgs,
        #[command(flatten)]
        source: ArtifactArgs,
    },
    /// Spark settings changed while running
    Changed {
        #[command(flatten)]
        spark: SparkArgs,
        #[command(flatten)]
        source: ArtifactArgs,
    },
    /// The Spark relation exists but is not ready
    Waiting,
    /// No Spark relation
    Absent,
    /// The Spark relation went away
    Lost,
}

pub async fn execute(command: EventCommand, global: &GlobalFlags) -> anyhow::Result<()> {
    let (event, artifact) = match command {
        EventCommand::Ready { spark, source } => {
            (Event::UpstreamReady(spark.settings()), source.artifact())
        }
        EventCommand::Changed { spark, source } => {
            (Event::UpstreamChanged(spark.settings()), source.artifact())
        }
        EventCommand::Waiting => (Event::UpstreamWaiting, None),
        EventCommand::Absent => (Event::UpstreamAbsent, None),
        EventCommand::Lost => (Event::UpstreamLost, None),
    };

    let controller = global.controller(artifact)?;
    let outcome = controller.handle(event).await?;
    println!("{}", outcome.status);
    Ok(())
}
