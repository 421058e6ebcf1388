use crate::cli::GlobalFlags;

pub async fn execute(global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();
    global.process(&layout).restart().await?;
    println!("zeppelin is serving on port {}", layout.server_port());
    Ok(())
}
