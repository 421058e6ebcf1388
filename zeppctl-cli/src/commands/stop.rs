use crate::cli::GlobalFlags;

pub async fn execute(global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();
    global.process(&layout).stop().await?;
    println!("zeppelin stopped");
    Ok(())
}
