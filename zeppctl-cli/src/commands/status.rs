use crate::cli::GlobalFlags;

pub async fn execute(global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();
    let store = global.store(&layout)?;
    let state = store.snapshot()?;
    let service = global.process(&layout).status().await;

    println!("root:      {}", layout.root().display());
    println!("service:   {service}");
    println!("installed: {}", state.installed);
    println!("started:   {}", state.started);
    println!("notebooks: {}", store.notebook_count()?);
    Ok(())
}
