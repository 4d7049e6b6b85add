//! Header scan for monthly ledger tabs.
//!
//! The scan is a pure function of the sheet: each target column is claimed by
//! the first matching header in row-major order, then a fixed list of named
//! rules prunes implausible results.

use tracing::debug;

use super::normalize::fold;
use super::Sheet;

pub const HEADER_SCAN_ROWS: usize = 5;
pub const HEADER_SCAN_COLS: usize = 20;
/// Width of the income sub-header, starting at the "Income" cell's column.
pub const INCOME_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpenseColumns {
    pub date: Option<usize>,
    pub cost_center: Option<usize>,
    pub important: Option<usize>,
    pub category: Option<usize>,
    pub description: Option<usize>,
    pub payment: Option<usize>,
    pub value: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncomeColumns {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub value: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerColumns {
    /// Row holding the expense date header.
    pub header_row: Option<usize>,
    pub expense: ExpenseColumns,
    pub income: Option<IncomeColumns>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpenseField {
    Date,
    CostCenter,
    Important,
    Category,
    Description,
    Payment,
    Value,
}

fn classify_expense_header(folded: &str) -> Option<ExpenseField> {
    match folded {
        "date" | "data" => Some(ExpenseField::Date),
        "category" | "categoria" => Some(ExpenseField::Category),
        "description" | "descricao" | "item" => Some(ExpenseField::Description),
        "value" | "valor" | "amount" => Some(ExpenseField::Value),
        f if f.starts_with("centro") || f.contains("cost center") => Some(ExpenseField::CostCenter),
        f if f.contains("importan") || f == "flag" || f == "!" => Some(ExpenseField::Important),
        f if f.contains("payment") || f.contains("pagamento") || f == "forma" || f == "cartao" => {
            Some(ExpenseField::Payment)
        }
        f if f.starts_with("valor ") || f.starts_with("value ") => Some(ExpenseField::Value),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncomeField {
    Date,
    Description,
    Value,
}

fn classify_income_header(folded: &str) -> Option<IncomeField> {
    match classify_expense_header(folded)? {
        ExpenseField::Date => Some(IncomeField::Date),
        ExpenseField::Description => Some(IncomeField::Description),
        ExpenseField::Value => Some(IncomeField::Value),
        _ => None,
    }
}

pub fn is_income_marker(folded: &str) -> bool {
    matches!(
        folded,
        "income" | "incomes" | "entrada" | "entradas" | "receita" | "receitas"
    )
}

fn claim(slot: &mut Option<usize>, col: usize) {
    if slot.is_none() {
        *slot = Some(col);
    }
}

/// Locate the ledger's semantic columns.
pub fn detect_ledger_columns(sheet: &Sheet) -> LedgerColumns {
    let raw = scan(sheet);
    let detected = POST_DETECTION_RULES.iter().fold(raw, |cols, (name, rule)| {
        let next = rule(cols);
        if next != cols {
            debug!(sheet = %sheet.name, rule = name, "column rule adjusted detection");
        }
        next
    });
    debug!(sheet = %sheet.name, ?detected, "ledger columns");
    detected
}

fn scan(sheet: &Sheet) -> LedgerColumns {
    let mut cols = LedgerColumns::default();
    let mut income_anchor: Option<(usize, usize)> = None;

    for row in 0..HEADER_SCAN_ROWS.min(sheet.rows.len()) {
        for col in 0..HEADER_SCAN_COLS {
            let folded = fold(&sheet.text(row, col));
            if folded.is_empty() {
                continue;
            }
            if is_income_marker(&folded) {
                income_anchor.get_or_insert((row, col));
                continue;
            }
            let Some(field) = classify_expense_header(&folded) else {
                continue;
            };
            let e = &mut cols.expense;
            match field {
                ExpenseField::Date => {
                    if e.date.is_none() {
                        e.date = Some(col);
                        cols.header_row = Some(row);
                    }
                }
                ExpenseField::CostCenter => claim(&mut e.cost_center, col),
                ExpenseField::Important => claim(&mut e.important, col),
                ExpenseField::Category => claim(&mut e.category, col),
                ExpenseField::Description => claim(&mut e.description, col),
                ExpenseField::Payment => claim(&mut e.payment, col),
                ExpenseField::Value => claim(&mut e.value, col),
            }
        }
    }

    if let Some((row, col)) = income_anchor {
        let mut income = IncomeColumns::default();
        for c in col..(col + INCOME_WINDOW).min(HEADER_SCAN_COLS) {
            match classify_income_header(&fold(&sheet.text(row + 1, c))) {
                Some(IncomeField::Date) => claim(&mut income.date, c),
                Some(IncomeField::Description) => claim(&mut income.description, c),
                Some(IncomeField::Value) => claim(&mut income.value, c),
                None => {}
            }
        }
        cols.income = Some(income);
    }
    cols
}

// ---------------------------------------------------------------------------
// Post-detection rules
// ---------------------------------------------------------------------------

type ColumnRule = fn(LedgerColumns) -> LedgerColumns;

const POST_DETECTION_RULES: &[(&str, ColumnRule)] = &[
    ("income_needs_date_and_value", income_needs_date_and_value),
    ("income_right_of_expense", income_right_of_expense),
];

fn income_needs_date_and_value(mut cols: LedgerColumns) -> LedgerColumns {
    if let Some(income) = cols.income {
        if income.date.is_none() || income.value.is_none() {
            cols.income = None;
        }
    }
    cols
}

/// The income block must start strictly right of the expense value column.
fn income_right_of_expense(mut cols: LedgerColumns) -> LedgerColumns {
    if let (Some(income), Some(value)) = (cols.income, cols.expense.value) {
        if income.date.is_some_and(|d| d <= value) {
            cols.income = None;
        }
    }
    cols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::sheet;

    #[test]
    fn test_detects_english_header() {
        let s = sheet(
            "JAN",
            &[&["Date", "Cost Center", "Category", "Description", "Payment", "Value"]],
        );
        let cols = detect_ledger_columns(&s);
        assert_eq!(cols.header_row, Some(0));
        assert_eq!(cols.expense.date, Some(0));
        assert_eq!(cols.expense.cost_center, Some(1));
        assert_eq!(cols.expense.category, Some(2));
        assert_eq!(cols.expense.description, Some(3));
        assert_eq!(cols.expense.payment, Some(4));
        assert_eq!(cols.expense.value, Some(5));
        assert_eq!(cols.expense.important, None);
        assert!(cols.income.is_none());
    }

    #[test]
    fn test_detects_portuguese_header_with_income_block() {
        let s = sheet(
            "FEV",
            &[
                &["", "", "", "", "", "", "", "", "Entradas"],
                &[
                    "Data", "Centro de Custo", "Importante", "Categoria", "Descrição",
                    "Forma de Pagamento", "Valor", "", "Data", "Descrição", "Valor",
                ],
            ],
        );
        let cols = detect_ledger_columns(&s);
        assert_eq!(cols.header_row, Some(1));
        assert_eq!(cols.expense.important, Some(2));
        assert_eq!(cols.expense.value, Some(6));
        let income = cols.income.unwrap();
        assert_eq!(income.date, Some(8));
        assert_eq!(income.description, Some(9));
        assert_eq!(income.value, Some(10));
    }

    #[test]
    fn test_first_match_wins() {
        let s = sheet(
            "MAR",
            &[
                &["Data", "Valor", "Valor"],
                &["Date", "Value"],
            ],
        );
        let cols = detect_ledger_columns(&s);
        assert_eq!(cols.expense.date, Some(0));
        assert_eq!(cols.header_row, Some(0));
        assert_eq!(cols.expense.value, Some(1));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let s = sheet(
            "ABR",
            &[
                &["", "", "", "", "Receitas"],
                &["Date", "Description", "Value", "", "Date", "Description", "Value"],
            ],
        );
        assert_eq!(detect_ledger_columns(&s), detect_ledger_columns(&s));
    }

    #[test]
    fn test_income_left_of_expense_is_discarded() {
        let s = sheet(
            "MAI",
            &[
                &["Income", "", "", "", ""],
                &["Date", "Description", "Value", "Category", "Value"],
            ],
        );
        let cols = detect_ledger_columns(&s);
        // income date at col 0, expense value at col 2
        assert!(cols.income.is_none());
    }

    #[test]
    fn test_income_without_value_is_discarded() {
        let s = sheet(
            "JUN",
            &[
                &["Date", "Description", "Value", "", "Income"],
                &["", "", "", "", "Date", "Description"],
            ],
        );
        assert!(detect_ledger_columns(&s).income.is_none());
    }

    #[test]
    fn test_headers_outside_window_are_ignored() {
        let blank: &[&str] = &[""];
        let mut rows = vec![blank; 5];
        rows.push(&["Date", "Value"]);
        let s = sheet("JUL", &rows);
        let cols = detect_ledger_columns(&s);
        assert_eq!(cols.expense.date, None);
        assert_eq!(cols.header_row, None);
    }
}
