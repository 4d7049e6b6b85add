use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::duplicates::find_duplicates;
use crate::error::{CaixaError, Result};
use crate::ingest::{self, delimited, ParsedBatch};
use crate::models::{
    CostCenter, EntryType, FlowType, ImportBatch, ImportPreview, ImportResult, MonthSummary,
    ParsedDebtor, ParsedInstallment, ParsedTransaction, PreviewSummary,
};
use crate::preview_cache::{new_key, PreviewCache};
use crate::settings::ImportSettings;
use crate::store::Store;

pub const DEBTOR_CATEGORY: &str = "Debtors";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Workbook,
    Delimited,
}

impl FileKind {
    pub fn detect(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Workbook),
            "csv" | "txt" => Ok(Self::Delimited),
            _ => Err(CaixaError::UnsupportedFile(file_name.to_string())),
        }
    }
}

pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Parse an upload by its file extension.
pub fn parse_upload(file_name: &str, data: &[u8]) -> Result<ParsedBatch> {
    match FileKind::detect(file_name)? {
        FileKind::Workbook => ingest::parse_workbook(data),
        FileKind::Delimited => {
            let stem = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name);
            delimited::parse_delimited(data, stem)
        }
    }
}

pub fn build_summary(batch: &ParsedBatch) -> PreviewSummary {
    let mut summary = PreviewSummary {
        total_transactions: batch.transactions.len(),
        installments_found: batch.installments.len(),
        debtors_found: batch.debtors.len(),
        recurring_found: batch.recurring.len(),
        reference_totals: batch.reference_totals.clone(),
        ..Default::default()
    };
    for tx in &batch.transactions {
        let month: &mut MonthSummary = summary
            .by_month
            .entry(tx.date.format("%Y-%m").to_string())
            .or_default();
        month.count += 1;
        match tx.entry_type {
            EntryType::Income => {
                month.income += tx.amount;
                summary.total_income += tx.amount;
            }
            EntryType::Expense => {
                month.expense += tx.amount;
                summary.total_expense += tx.amount;
            }
        }
    }
    summary
}

// Latest valid date in the month not after `day`.
fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (1..=day.max(1))
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

/// One transaction per observed month, sharing `group_id`, numbered from 1.
pub fn expand_installment(
    plan: &ParsedInstallment,
    group_id: &str,
    fallback_year: i32,
) -> Vec<std::result::Result<ParsedTransaction, String>> {
    let day = plan.purchase_date.map_or(1, |d| d.day());
    let total = if plan.installment_total > 0 {
        plan.installment_total
    } else {
        plan.monthly_amounts.len() as u32
    };

    let mut out = Vec::with_capacity(plan.monthly_amounts.len());
    // Without a purchase date the run counts from `fallback_year`, moving on at each wrap.
    let mut run_year = fallback_year;
    let mut prev_month = 0;
    for (seq, observed) in plan.monthly_amounts.iter().enumerate() {
        if observed.month < prev_month {
            run_year += 1;
        }
        prev_month = observed.month;
        let year = match plan.purchase_date {
            Some(bought) => bought.year() + i32::from(observed.month < bought.month()),
            None => run_year,
        };
        let Some(date) = clamp_day(year, observed.month, day) else {
            out.push(Err(format!(
                "{} ({} row {}): no date for month {}",
                plan.description, plan.source_tab, plan.source_row, observed.month
            )));
            continue;
        };
        let mut tx = ParsedTransaction::new(
            date,
            plan.description.clone(),
            observed.amount,
            EntryType::Expense,
            plan.source_tab.clone(),
            plan.source_row,
        );
        tx.category = plan.category.clone();
        tx.cost_center = plan.cost_center;
        if plan.cost_center == Some(CostCenter::FixedExpense) {
            tx.flow_type = FlowType::Fixed;
        }
        tx.payment_method = plan.payment_method.clone();
        tx.institution = plan.institution.clone();
        tx.installment_number = seq as u32 + 1;
        tx.installment_total = total;
        tx.installment_group_id = Some(group_id.to_string());
        out.push(Ok(tx));
    }
    out
}

pub fn expand_debtor(debtor: &ParsedDebtor, fallback_date: NaiveDate) -> ParsedTransaction {
    let description = if debtor.description.is_empty() {
        debtor.name.clone()
    } else {
        debtor.description.clone()
    };
    let mut tx = ParsedTransaction::new(
        debtor.date.unwrap_or(fallback_date),
        description,
        debtor.amount,
        EntryType::Expense,
        debtor.source_tab.clone(),
        debtor.source_row,
    );
    tx.category = DEBTOR_CATEGORY.to_string();
    tx.is_third_party = true;
    tx.third_party_name = Some(debtor.name.clone());
    tx
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConfirmOptions {
    /// Indices into the preview's transaction list; `None` keeps all.
    pub selected: Option<Vec<usize>>,
    pub skip_duplicates: bool,
}

/// Collects per-item failures without stopping the batch.
#[derive(Default)]
struct Outcome {
    result: ImportResult,
    transaction_ids: Vec<i64>,
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
}

impl Outcome {
    fn persisted(&mut self, id: i64, date: NaiveDate) {
        self.result.imported += 1;
        self.transaction_ids.push(id);
        self.first_date = Some(self.first_date.map_or(date, |d| d.min(date)));
        self.last_date = Some(self.last_date.map_or(date, |d| d.max(date)));
    }

    fn failed(&mut self, message: String) {
        warn!("{message}");
        self.result.errors.push(message);
    }
}

/// Two-phase import: `preview_*` parses and caches, `confirm` persists.
pub struct Importer<S: Store> {
    store: S,
    cache: Arc<PreviewCache>,
    settings: ImportSettings,
}

impl<S: Store> Importer<S> {
    pub fn new(store: S, cache: Arc<PreviewCache>, settings: ImportSettings) -> Self {
        Self { store, cache, settings }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn preview_file(&self, dashboard: i64, path: &Path) -> Result<(String, Arc<ImportPreview>)> {
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.preview_bytes(dashboard, &file_name, &data)
    }

    pub fn preview_bytes(
        &self,
        dashboard: i64,
        file_name: &str,
        data: &[u8],
    ) -> Result<(String, Arc<ImportPreview>)> {
        self.store.check_scope(dashboard)?;
        let batch = parse_upload(file_name, data)?;
        self.preview_parsed(dashboard, file_name, compute_checksum(data), batch)
    }

    /// Summarise and annotate an already parsed batch, then cache it.
    pub fn preview_parsed(
        &self,
        dashboard: i64,
        file_name: &str,
        checksum: String,
        batch: ParsedBatch,
    ) -> Result<(String, Arc<ImportPreview>)> {
        let summary = build_summary(&batch);
        let duplicates = find_duplicates(
            &self.store,
            dashboard,
            &batch.transactions,
            &self.settings.duplicate_policy(),
        )?;
        let preview = Arc::new(ImportPreview {
            dashboard_id: dashboard,
            file_name: file_name.to_string(),
            checksum,
            created_on: Local::now().date_naive(),
            summary,
            transactions: batch.transactions,
            installments: batch.installments,
            debtors: batch.debtors,
            recurring: batch.recurring,
            duplicates,
            errors: batch.errors,
        });
        let key = new_key();
        self.cache
            .put(key.clone(), Arc::clone(&preview), self.settings.preview_ttl());
        info!(
            file = file_name,
            transactions = preview.summary.total_transactions,
            installments = preview.summary.installments_found,
            debtors = preview.summary.debtors_found,
            recurring = preview.summary.recurring_found,
            duplicates = preview.duplicates.len(),
            errors = preview.errors.len(),
            pending = self.cache.len(),
            "preview ready"
        );
        Ok((key, preview))
    }

    /// Drop a cached preview without importing it.
    pub fn discard(&self, key: &str) -> bool {
        self.cache.delete(key)
    }

    /// Persist a cached preview. Consumes the preview; failures of single
    /// records are collected in the result and do not stop the rest.
    pub fn confirm(&self, dashboard: i64, key: &str, opts: &ConfirmOptions) -> Result<ImportResult> {
        let preview = self.cache.take(key)?;
        if preview.dashboard_id != dashboard {
            return Err(CaixaError::DashboardMismatch {
                preview: preview.dashboard_id,
                requested: dashboard,
            });
        }
        self.store.check_scope(dashboard)?;
        let mut out = Outcome::default();

        let indices: BTreeSet<usize> = match &opts.selected {
            Some(sel) => sel.iter().copied().collect(),
            None => (0..preview.transactions.len()).collect(),
        };
        for index in indices {
            let Some(tx) = preview.transactions.get(index) else {
                out.failed(format!("Selected row {index} is not in the preview"));
                continue;
            };
            if opts.skip_duplicates && preview.is_duplicate(index) {
                out.result.skipped += 1;
                continue;
            }
            match self.store.create_transaction(dashboard, tx) {
                Ok(id) => out.persisted(id, tx.date),
                Err(e) => out.failed(format!("{} ({}): {e}", tx.description, tx.origin())),
            }
        }

        let fallback_year = self
            .settings
            .default_year
            .unwrap_or_else(|| preview.created_on.year());
        for plan in &preview.installments {
            let group_id = new_key();
            for expanded in expand_installment(plan, &group_id, fallback_year) {
                match expanded {
                    Ok(tx) => match self.store.create_transaction(dashboard, &tx) {
                        Ok(id) => out.persisted(id, tx.date),
                        Err(e) => out.failed(format!(
                            "{} {}/{} ({}): {e}",
                            tx.description,
                            tx.installment_number,
                            tx.installment_total,
                            tx.origin()
                        )),
                    },
                    Err(message) => out.failed(message),
                }
            }
        }

        for debtor in &preview.debtors {
            let tx = expand_debtor(debtor, preview.created_on);
            match self.store.create_transaction(dashboard, &tx) {
                Ok(id) => out.persisted(id, tx.date),
                Err(e) => out.failed(format!("{} ({}): {e}", debtor.name, tx.origin())),
            }
        }

        for recurring in &preview.recurring {
            match self.store.create_recurring(dashboard, recurring) {
                Ok(_) => out.result.imported += 1,
                Err(e) => out.failed(format!(
                    "{} ({} row {}): {e}",
                    recurring.description, recurring.source_tab, recurring.source_row
                )),
            }
        }

        let batch = ImportBatch {
            file_name: preview.file_name.clone(),
            checksum: preview.checksum.clone(),
            record_count: out.result.imported,
            date_range_start: out.first_date,
            date_range_end: out.last_date,
            transaction_ids: std::mem::take(&mut out.transaction_ids),
        };
        if let Err(e) = self.store.record_import(dashboard, &batch) {
            out.failed(format!("Import record for {}: {e}", preview.file_name));
        }

        info!(
            file = %preview.file_name,
            imported = out.result.imported,
            skipped = out.result.skipped,
            errors = out.result.errors.len(),
            "import confirmed"
        );
        Ok(out.result)
    }
}
