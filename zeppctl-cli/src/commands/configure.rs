use std::path::PathBuf;

use clap::Args;
use zeppctl::{ConfigWriter, ServiceUser};

use crate::cli::{GlobalFlags, SparkArgs};

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub spark: SparkArgs,

    /// Extra notebook sets to copy into the notebook store
    #[arg(long = "tutorial", value_name = "DIR")]
    pub tutorials: Vec<PathBuf>,

    /// Run the daemon as this user (name for the unit, uid/gid for ownership)
    #[arg(long, requires = "uid")]
    pub user: Option<String>,

    #[arg(long, requires = "gid")]
    pub uid: Option<u32>,

    #[arg(long, requires = "user")]
    pub gid: Option<u32>,
}

pub async fn execute(args: ConfigureArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();

    let mut writer = ConfigWriter::new(&layout);
    if let (Some(name), Some(uid), Some(gid)) = (&args.user, args.uid, args.gid) {
        writer = writer.with_service_user(ServiceUser {
            name: name.clone(),
            uid,
            gid,
        });
    }

    writer.setup_config()?;
    writer.setup_tutorial(&args.tutorials)?;
    writer.configure(&args.spark.settings())?;
    writer.install_unit()?;

    println!("configured {}", layout.conf_dir().display());
    Ok(())
}
