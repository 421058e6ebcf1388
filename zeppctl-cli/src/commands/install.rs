use clap::Args;
use zeppctl::{ConfigWriter, Installer, ResourceFetcher};

use crate::cli::{ArtifactArgs, GlobalFlags};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Reinstall even when an installation is already recorded
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub source: ArtifactArgs,
}

pub async fn execute(args: InstallArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();
    let store = global.store(&layout)?;
    let fetcher = ResourceFetcher::new(args.source.artifact(), layout.cache_dir());

    let installer = Installer::new(&layout, &store, &fetcher);
    if !installer.install(args.force).await? {
        anyhow::bail!("no distribution artifact available; pass --archive or --url/--sha256");
    }

    ConfigWriter::new(&layout).setup_config()?;
    println!("installed to {}", layout.home_dir().display());
    Ok(())
}
