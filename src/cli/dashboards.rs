use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_store;
use crate::error::Result;
use crate::settings::load_settings;

pub fn add(name: &str) -> Result<()> {
    let store = open_store(&load_settings())?;
    store.add_dashboard(name)?;
    println!("Added dashboard: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store(&load_settings())?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Transactions", "Status"]);
    for d in store.list_dashboards()? {
        let status = if d.is_archived {
            "archived".dimmed().to_string()
        } else {
            "active".green().to_string()
        };
        table.add_row(vec![
            Cell::new(d.id),
            Cell::new(d.name),
            Cell::new(d.transaction_count),
            Cell::new(status),
        ]);
    }
    println!("Dashboards\n{table}");
    Ok(())
}

pub fn archive(name: &str) -> Result<()> {
    let store = open_store(&load_settings())?;
    store.archive_dashboard(name)?;
    println!("Archived dashboard: {name}");
    Ok(())
}
