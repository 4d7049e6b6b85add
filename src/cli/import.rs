use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use dialoguer::Confirm;

use super::preview::print_preview;
use super::{open_store, parse_selection};
use crate::error::Result;
use crate::importer::{ConfirmOptions, Importer};
use crate::preview_cache::{PreviewCache, Sweeper};
use crate::settings::load_settings;

pub fn run(
    file: &str,
    dashboard: &str,
    skip_duplicates: bool,
    select: Option<&str>,
    yes: bool,
) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    let dashboard_id = store.dashboard_id(dashboard)?;
    let cache = Arc::new(PreviewCache::new());
    let _sweeper = Sweeper::spawn(Arc::clone(&cache), settings.import.sweep_interval())?;
    let importer = Importer::new(store, cache, settings.import.clone());

    let selected = select.map(parse_selection).transpose()?;
    let (key, preview) = importer.preview_file(dashboard_id, Path::new(file))?;
    print_preview(&preview, settings.import.preview_display_limit);

    if !yes {
        let proceed = Confirm::new()
            .with_prompt(format!("Import into '{dashboard}'?"))
            .default(true)
            .interact()
            .unwrap_or(false);
        if !proceed {
            importer.discard(&key);
            println!("{}", "Import cancelled.".yellow());
            return Ok(());
        }
    }

    let opts = ConfirmOptions {
        selected,
        skip_duplicates,
    };
    let result = importer.confirm(dashboard_id, &key, &opts)?;
    println!("{} imported, {} skipped (duplicates)", result.imported, result.skipped);
    for e in &result.errors {
        println!("{} {e}", "Failed:".red());
    }
    Ok(())
}
