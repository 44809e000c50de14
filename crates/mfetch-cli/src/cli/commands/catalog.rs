//! `mfetch catalog` – list model roots and types usable with `mfetch fetch`.

use anyhow::Result;
use mfetch_core::config::MfetchConfig;
use mfetch_core::direct::DirectoryCatalog;

pub fn run_catalog(cfg: &MfetchConfig) -> Result<()> {
    let catalog = DirectoryCatalog::new(cfg.roots.clone());
    let choices = catalog.choices()?;

    println!("models paths:");
    for label in &choices.models_paths {
        let marker = if *label == choices.default_models_path { " (default)" } else { "" };
        let types = catalog
            .root(label)?
            .map(|r| r.model_types.join(", "))
            .unwrap_or_default();
        println!("  {}{}  [{}]", label, marker, types);
    }
    println!("model types:");
    for t in &choices.model_types {
        let marker = if *t == choices.default_model_type { " (default)" } else { "" };
        println!("  {}{}", t, marker);
    }
    Ok(())
}
