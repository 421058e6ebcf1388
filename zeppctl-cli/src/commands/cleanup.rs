use crate::cli::GlobalFlags;

pub async fn execute(global: &GlobalFlags) -> anyhow::Result<()> {
    let layout = global.layout();

    // Clear persisted flags first so a partially removed tree is never
    // mistaken for a working installation.
    let store = global.store(&layout)?;
    store.reset()?;
    layout.cleanup()?;

    println!("removed managed state under {}", layout.root().display());
    Ok(())
}
