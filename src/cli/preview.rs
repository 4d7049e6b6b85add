use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_store;
use crate::error::{CaixaError, Result};
use crate::fmt::money;
use crate::importer::Importer;
use crate::models::{EntryType, ImportPreview};
use crate::preview_cache::PreviewCache;
use crate::settings::load_settings;

pub fn run(file: &str, dashboard: &str, json: bool) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    let dashboard_id = store.dashboard_id(dashboard)?;
    let importer = Importer::new(store, Arc::new(PreviewCache::new()), settings.import.clone());

    let (key, preview) = importer.preview_file(dashboard_id, Path::new(file))?;
    importer.discard(&key);

    let limit = settings.import.preview_display_limit;
    if json {
        let out = serde_json::to_string_pretty(&preview.for_display(limit))
            .map_err(|e| CaixaError::Other(e.to_string()))?;
        println!("{out}");
    } else {
        print_preview(&preview, limit);
    }
    Ok(())
}

pub(crate) fn print_preview(preview: &ImportPreview, limit: usize) {
    let s = &preview.summary;

    let mut months = Table::new();
    months.set_header(vec!["Month", "Income", "Expense", "Count"]);
    for (month, m) in &s.by_month {
        months.add_row(vec![
            Cell::new(month),
            Cell::new(money(m.income)),
            Cell::new(money(m.expense)),
            Cell::new(m.count),
        ]);
    }
    months.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(s.total_income).green()),
        Cell::new(money(s.total_expense).red()),
        Cell::new(s.total_transactions),
    ]);
    println!("{}\n{months}", preview.file_name.bold());
    println!(
        "{} installment plans, {} debtors, {} recurring expenses",
        s.installments_found, s.debtors_found, s.recurring_found
    );

    if !s.reference_totals.is_empty() {
        let mut reference = Table::new();
        reference.set_header(vec!["Month", "Summary income", "Summary expense"]);
        for r in &s.reference_totals {
            reference.add_row(vec![
                Cell::new(format!("{:02}", r.month)),
                Cell::new(money(r.income)),
                Cell::new(money(r.expense)),
            ]);
        }
        println!("Summary tab\n{reference}");
    }

    if !preview.transactions.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["#", "Date", "Description", "Category", "Amount", "Origin", ""]);
        for (i, tx) in preview.transactions.iter().take(limit).enumerate() {
            let amount = match tx.entry_type {
                EntryType::Income => money(tx.amount).green().to_string(),
                EntryType::Expense => money(tx.amount),
            };
            let marker = if preview.is_duplicate(i) {
                "duplicate?".yellow().to_string()
            } else {
                String::new()
            };
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(tx.date.format("%d/%m/%Y")),
                Cell::new(&tx.description),
                Cell::new(&tx.category),
                Cell::new(amount),
                Cell::new(tx.origin()),
                Cell::new(marker),
            ]);
        }
        println!("{table}");
        if preview.transactions.len() > limit {
            println!("... and {} more", preview.transactions.len() - limit);
        }
    }

    for d in &preview.duplicates {
        println!(
            "{} #{} {} matches stored #{} {} {} on {}",
            "Duplicate:".yellow(),
            d.index + 1,
            d.transaction.description,
            d.existing_id,
            d.existing_description,
            money(d.existing_amount),
            d.existing_date.format("%d/%m/%Y"),
        );
    }
    for e in &preview.errors {
        println!("{} {} row {}: {}", "Error:".red(), e.tab, e.row, e.message);
    }
}
