use crate::cli::GlobalFlags;

pub async fn execute(global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();
    let process = global.process(&layout);

    process.enable().await?;
    process.start().await?;
    println!("zeppelin is serving on port {}", layout.server_port());
    Ok(())
}
