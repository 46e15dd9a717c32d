use std::{fs, path::Path};

use anyhow::Context;
use catalogue::CatalogueStore;
use shared::domain::Item;
use tracing::info;

/// The four books shown by the catalogue front end when no seed file is configured.
const SAMPLE_CATALOGUE: &str = include_str!("../data/sample_catalogue.json");

pub fn load_items(path: Option<&Path>) -> anyhow::Result<Vec<Item>> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read catalogue seed '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse catalogue seed '{}'", path.display()))
        }
        None => serde_json::from_str(SAMPLE_CATALOGUE)
            .context("failed to parse built-in sample catalogue"),
    }
}

pub fn open_store(path: Option<&Path>) -> anyhow::Result<CatalogueStore> {
    let items = load_items(path)?;
    let count = items.len();
    let store = CatalogueStore::from_items(items)?;
    info!(
        count,
        source = %path.map_or_else(|| "built-in sample".to_string(), |p| p.display().to_string()),
        "catalogue seeded"
    );
    Ok(store)
}
