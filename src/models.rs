use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Fixed,
    Variable,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostCenter {
    Essential,
    NonEssential,
    FixedExpense,
}

impl CostCenter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::NonEssential => "non_essential",
            Self::FixedExpense => "fixed_expense",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
        }
    }
}

/// One financial movement extracted from a ledger tab or a delimited file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub entry_type: EntryType,
    pub flow_type: FlowType,
    pub cost_center: Option<CostCenter>,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub institution: Option<String>,
    pub card_brand: Option<String>,
    pub installment_number: u32,
    pub installment_total: u32,
    pub installment_group_id: Option<String>,
    pub notes: Option<String>,
    pub is_flagged: bool,
    pub is_third_party: bool,
    pub third_party_name: Option<String>,
    pub source_tab: String,
    pub source_row: usize,
}

pub const DEFAULT_CATEGORY: &str = "Other";

impl ParsedTransaction {
    /// A variable, uncategorised movement; callers fill in the rest.
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        entry_type: EntryType,
        source_tab: impl Into<String>,
        source_row: usize,
    ) -> Self {
        Self {
            date,
            due_date: None,
            entry_type,
            flow_type: FlowType::Variable,
            cost_center: None,
            category: DEFAULT_CATEGORY.to_string(),
            subcategory: None,
            description: description.into(),
            amount,
            payment_method: None,
            institution: None,
            card_brand: None,
            installment_number: 0,
            installment_total: 0,
            installment_group_id: None,
            notes: None,
            is_flagged: false,
            is_third_party: false,
            third_party_name: None,
            source_tab: source_tab.into(),
            source_row,
        }
    }

    pub fn origin(&self) -> String {
        format!("{} row {}", self.source_tab, self.source_row)
    }
}

/// Amount actually observed in one month column of an installment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAmount {
    pub month: u32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstallment {
    pub description: String,
    pub installment_total: u32,
    pub total_amount: Decimal,
    pub installment_amount: Decimal,
    pub category: String,
    pub cost_center: Option<CostCenter>,
    pub payment_method: Option<String>,
    pub institution: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    /// Populated month columns in sheet order; the source of truth for expansion.
    pub monthly_amounts: Vec<MonthlyAmount>,
    pub source_tab: String,
    pub source_row: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDebtor {
    pub name: String,
    pub description: String,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub source_tab: String,
    pub source_row: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRecurring {
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub frequency: Frequency,
    pub due_day: Option<u32>,
    pub source_tab: String,
    pub source_row: usize,
}

/// A row that could not be read, kept for the user to locate in the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub tab: String,
    pub message: String,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub income: Decimal,
    pub expense: Decimal,
    pub count: usize,
}

/// Totals the workbook's own summary tab reports for a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTotal {
    pub month: u32,
    pub income: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total_transactions: usize,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    /// Keyed by `YYYY-MM`.
    pub by_month: BTreeMap<String, MonthSummary>,
    pub installments_found: usize,
    pub debtors_found: usize,
    pub recurring_found: usize,
    pub reference_totals: Vec<ReferenceTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCandidate {
    /// Position of the transaction in the preview's transaction list.
    pub index: usize,
    pub transaction: ParsedTransaction,
    pub existing_id: i64,
    pub existing_description: String,
    pub existing_date: NaiveDate,
    pub existing_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    /// Dashboard the preview was checked against; confirm must target the same one.
    pub dashboard_id: i64,
    pub file_name: String,
    pub checksum: String,
    pub created_on: NaiveDate,
    pub summary: PreviewSummary,
    pub transactions: Vec<ParsedTransaction>,
    pub installments: Vec<ParsedInstallment>,
    pub debtors: Vec<ParsedDebtor>,
    pub recurring: Vec<ParsedRecurring>,
    pub duplicates: Vec<DuplicateCandidate>,
    pub errors: Vec<RowError>,
}

impl ImportPreview {
    /// Copy with at most `limit` transactions listed; summary counts stay complete.
    pub fn for_display(&self, limit: usize) -> Self {
        let mut preview = self.clone();
        preview.transactions.truncate(limit);
        preview
    }

    pub fn is_duplicate(&self, index: usize) -> bool {
        self.duplicates.iter().any(|d| d.index == index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// A transaction already persisted under a dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub id: i64,
    pub dashboard_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
}

/// Provenance of one confirmed upload.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub file_name: String,
    pub checksum: String,
    pub record_count: usize,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
    /// Transactions persisted by this confirm, stamped with the batch id.
    pub transaction_ids: Vec<i64>,
}

/// A ledger scope that imports are written into.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub id: i64,
    pub name: String,
    pub is_archived: bool,
    pub transaction_count: i64,
}
