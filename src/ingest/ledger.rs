use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::cell::{coerce_amount, coerce_date, CellValue};
use super::columns::{detect_ledger_columns, ExpenseColumns, IncomeColumns};
use super::normalize::{detect_card_brand, fold, normalize_cost_center, normalize_payment};
use super::policy::{cell_error, Field, RowOutcome, WORKSHEET};
use super::{ParsedBatch, Sheet};
use crate::models::{CostCenter, EntryType, FlowType, ParsedTransaction};

pub const INCOME_CATEGORY: &str = "Salary";

static INSTALLMENT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?(\d{1,2})\s*/\s*(\d{1,2})\)?\s*$").unwrap());

/// Header, subtotal and balance lines repeat inside the date column.
fn is_footer_row(date_text: &str) -> bool {
    let folded = fold(date_text);
    folded == "date"
        || folded == "data"
        || folded.contains("total")
        || folded.contains("balance")
        || folded.contains("saldo")
}

// Debtor rows are imported from the debtor tab only.
fn is_debtor_category(category: &str) -> bool {
    matches!(fold(category).as_str(), "debtors" | "debtor" | "devedores" | "devedor")
}

/// `Netflix 3/12` carries its own installment position.
fn installment_marker(description: &str) -> Option<(u32, u32)> {
    let caps = INSTALLMENT_MARKER.captures(description)?;
    let n: u32 = caps[1].parse().ok()?;
    let total: u32 = caps[2].parse().ok()?;
    (n >= 1 && n <= total).then_some((n, total))
}

pub fn parse_ledger(sheet: &Sheet, batch: &mut ParsedBatch) {
    let cols = detect_ledger_columns(sheet);
    let (Some(header_row), Some(_), Some(_)) =
        (cols.header_row, cols.expense.date, cols.expense.value)
    else {
        debug!(sheet = %sheet.name, "no date/value header, ledger skipped");
        return;
    };

    let before = batch.transactions.len();
    for row in (header_row + 1)..sheet.rows.len() {
        match read_expense_row(sheet, row, &cols.expense) {
            Ok(Some(tx)) => batch.transactions.push(tx),
            Ok(None) => {}
            Err(e) => batch.errors.push(e),
        }
        if let Some(income) = &cols.income {
            match read_income_row(sheet, row, income) {
                Ok(Some(tx)) => batch.transactions.push(tx),
                Ok(None) => {}
                Err(e) => batch.errors.push(e),
            }
        }
    }
    debug!(
        sheet = %sheet.name,
        policy = WORKSHEET.name,
        parsed = batch.transactions.len() - before,
        "ledger parsed"
    );
}

/// Shared gate for both sections: presence, footer rows, error cells, date and amount.
fn read_core(
    sheet: &Sheet,
    row: usize,
    date_cell: &CellValue,
    value_cell: &CellValue,
) -> RowOutcome<(chrono::NaiveDate, rust_decimal::Decimal)> {
    let tab = &sheet.name;
    let source_row = row + 1;
    if date_cell.is_blank() || value_cell.is_blank() || is_footer_row(&date_cell.display()) {
        return Ok(None);
    }
    if let Some(e) = date_cell.error() {
        return Err(cell_error(Field::Date, tab, source_row, e));
    }
    if let Some(e) = value_cell.error() {
        return Err(cell_error(Field::Amount, tab, source_row, e));
    }
    let Some(date) = coerce_date(date_cell) else {
        return WORKSHEET.missing(Field::Date, tab, source_row, Some(date_cell.display()));
    };
    let amount = coerce_amount(value_cell).abs();
    if amount.is_zero() {
        return WORKSHEET.missing(Field::Amount, tab, source_row, Some(value_cell.display()));
    }
    Ok(Some((date, amount)))
}

fn read_expense_row(sheet: &Sheet, row: usize, cols: &ExpenseColumns) -> RowOutcome<ParsedTransaction> {
    let (Some(date_col), Some(value_col)) = (cols.date, cols.value) else {
        return Ok(None);
    };
    let category = sheet.text_at(row, cols.category);
    if is_debtor_category(&category) {
        return Ok(None);
    }
    let Some((date, amount)) = read_core(sheet, row, sheet.cell(row, date_col), sheet.cell(row, value_col))?
    else {
        return Ok(None);
    };
    let description = sheet.text_at(row, cols.description);
    if description.is_empty() {
        return WORKSHEET.missing(Field::Description, &sheet.name, row + 1, None);
    }

    let mut tx = ParsedTransaction::new(date, description, amount, EntryType::Expense, &sheet.name, row + 1);
    tx.cost_center = normalize_cost_center(&sheet.text_at(row, cols.cost_center));
    if tx.cost_center == Some(CostCenter::FixedExpense) {
        tx.flow_type = FlowType::Fixed;
    }
    if !category.is_empty() {
        tx.category = category;
    }
    let payment_text = sheet.text_at(row, cols.payment);
    if let Some(payment) = normalize_payment(&payment_text) {
        tx.payment_method = Some(payment.method);
        tx.institution = payment.institution;
        tx.card_brand = detect_card_brand(&payment_text);
    }
    tx.is_flagged = !sheet.text_at(row, cols.important).is_empty();
    if let Some((n, total)) = installment_marker(&tx.description) {
        tx.installment_number = n;
        tx.installment_total = total;
    }
    Ok(Some(tx))
}

fn read_income_row(sheet: &Sheet, row: usize, cols: &IncomeColumns) -> RowOutcome<ParsedTransaction> {
    let (Some(date_col), Some(value_col)) = (cols.date, cols.value) else {
        return Ok(None);
    };
    let Some((date, amount)) = read_core(sheet, row, sheet.cell(row, date_col), sheet.cell(row, value_col))?
    else {
        return Ok(None);
    };
    let description = sheet.text_at(row, cols.description);
    if description.is_empty() {
        return WORKSHEET.missing(Field::Description, &sheet.name, row + 1, None);
    }
    let mut tx = ParsedTransaction::new(date, description, amount, EntryType::Income, &sheet.name, row + 1);
    tx.category = INCOME_CATEGORY.to_string();
    Ok(Some(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::sheet;
    use crate::models::DEFAULT_CATEGORY;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const HEADER: &[&str] = &["Date", "Cost Center", "Category", "Description", "Payment", "Value"];

    fn parse(s: &Sheet) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        parse_ledger(s, &mut batch);
        batch
    }

    #[test]
    fn test_single_expense_row() {
        let s = sheet(
            "JAN",
            &[HEADER, &["21/01/2026", "Essential", "Groceries", "Supermarket", "Nubank", "150,00"]],
        );
        let batch = parse(&s);
        assert_eq!(batch.transactions.len(), 1);
        let tx = &batch.transactions[0];
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2026, 1, 21).unwrap());
        assert_eq!(tx.amount, dec!(150.00));
        assert_eq!(tx.entry_type, EntryType::Expense);
        assert_eq!(tx.flow_type, FlowType::Variable);
        assert_eq!(tx.cost_center, Some(CostCenter::Essential));
        assert_eq!(tx.category, "Groceries");
        assert_eq!(tx.payment_method.as_deref(), Some("Credit Card"));
        assert_eq!(tx.institution.as_deref(), Some("Nubank"));
        assert_eq!(tx.source_tab, "JAN");
        assert_eq!(tx.source_row, 2);
    }

    #[test]
    fn test_fixed_cost_center_sets_fixed_flow() {
        let s = sheet(
            "JAN",
            &[HEADER, &["05/01/2026", "Gasto fixo", "Moradia", "Aluguel", "Pix", "1.800,00"]],
        );
        let tx = &parse(&s).transactions[0];
        assert_eq!(tx.flow_type, FlowType::Fixed);
        assert_eq!(tx.amount, dec!(1800));
        assert_eq!(tx.payment_method.as_deref(), Some("Pix"));
    }

    #[test]
    fn test_structural_rows_are_dropped_silently() {
        let s = sheet(
            "JAN",
            &[
                HEADER,
                &["10/01/2026", "Essential", "Food", "Padaria", "Pix", "0,00"],
                &["10/01/2026", "Essential", "Food", "", "Pix", "20,00"],
                &["Total", "", "", "", "", "20,00"],
                &["Saldo do mês", "", "", "", "", "-20,00"],
                &["", "", "", "Sem data", "", "5,00"],
                &["11/01/2026", "", "", "Sem valor", "", ""],
                &["not a date", "", "", "Estranho", "", "5,00"],
                &["Date", "", "", "Description", "", "Value"],
            ],
        );
        let batch = parse(&s);
        assert!(batch.transactions.is_empty());
        assert!(batch.errors.is_empty());
    }

    #[test]
    fn test_no_zero_amount_or_empty_description_survives() {
        let amounts = ["0", "0,00", "R$ 0,00", "abc", "12,00", "3"];
        let descriptions = ["", "  ", "Cafe"];
        let mut rows: Vec<Vec<String>> = Vec::new();
        for a in amounts {
            for d in descriptions {
                rows.push(vec!["02/01/2026".into(), "".into(), "".into(), d.into(), "".into(), a.into()]);
            }
        }
        let row_refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let mut all: Vec<&[&str]> = vec![HEADER];
        all.extend(row_refs.iter().map(|r| r.as_slice()));
        let batch = parse(&sheet("JAN", &all));
        assert_eq!(batch.transactions.len(), 2);
        for tx in &batch.transactions {
            assert!(!tx.amount.is_zero());
            assert!(!tx.description.trim().is_empty());
        }
    }

    #[test]
    fn test_debtor_category_rows_are_skipped() {
        let s = sheet(
            "JAN",
            &[HEADER, &["12/01/2026", "", "Devedores", "Almoço Ana", "Nubank", "40,00"]],
        );
        assert!(parse(&s).transactions.is_empty());
    }

    #[test]
    fn test_missing_category_defaults_to_other() {
        let s = sheet("JAN", &[HEADER, &["12/01/2026", "", "", "Farmácia", "", "33,10"]]);
        let tx = &parse(&s).transactions[0];
        assert_eq!(tx.category, DEFAULT_CATEGORY);
        assert!(tx.payment_method.is_none());
        assert!(tx.cost_center.is_none());
    }

    #[test]
    fn test_error_cell_is_reported() {
        let mut s = sheet("JAN", &[HEADER, &["12/01/2026", "", "", "Conta", "", "x"]]);
        s.rows[1][5] = CellValue::Error("#REF!".into());
        let batch = parse(&s);
        assert!(batch.transactions.is_empty());
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].row, 2);
        assert_eq!(batch.errors[0].tab, "JAN");
    }

    #[test]
    fn test_native_date_and_number_cells() {
        let mut s = sheet("JAN", &[HEADER, &["x", "", "", "Mercado", "", "x"]]);
        let dt = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
        s.rows[1][0] = CellValue::Date(dt);
        s.rows[1][5] = CellValue::Formula { result: Box::new(CellValue::Number(89.9)) };
        let tx = &parse(&s).transactions[0];
        assert_eq!(tx.date, dt.date());
        assert_eq!(tx.amount, dec!(89.9));
    }

    #[test]
    fn test_income_section() {
        let s = sheet(
            "FEV",
            &[
                &["", "", "", "", "", "", "", "Entradas"],
                &["Data", "Importante", "Categoria", "Descrição", "Pagamento", "Valor", "", "Data", "Descrição", "Valor"],
                &["03/02/2026", "!", "Lazer", "Cinema", "Débito", "45,00", "", "05/02/2026", "Salário", "5.000,00"],
                &["", "", "", "", "", "", "", "20/02/2026", "Freela", "800,00"],
                &["", "", "", "", "", "", "", "Total", "", "5.800,00"],
            ],
        );
        let batch = parse(&s);
        assert_eq!(batch.transactions.len(), 3);
        let expense = &batch.transactions[0];
        assert!(expense.is_flagged);
        assert_eq!(expense.payment_method.as_deref(), Some("Debit Card"));
        let incomes: Vec<_> = batch
            .transactions
            .iter()
            .filter(|t| t.entry_type == EntryType::Income)
            .collect();
        assert_eq!(incomes.len(), 2);
        assert_eq!(incomes[0].category, INCOME_CATEGORY);
        assert_eq!(incomes[0].amount, dec!(5000));
        assert_eq!(incomes[1].source_row, 4);
    }

    #[test]
    fn test_installment_marker_in_description() {
        let s = sheet(
            "MAR",
            &[HEADER, &["10/03/2026", "", "", "Geladeira (3/10)", "Itaú", "250,00"]],
        );
        let tx = &parse(&s).transactions[0];
        assert_eq!((tx.installment_number, tx.installment_total), (3, 10));
        assert_eq!(installment_marker("Aluguel 2026"), None);
        assert_eq!(installment_marker("Curso 13/12"), None);
    }

    #[test]
    fn test_sheet_without_header_is_skipped() {
        let s = sheet("JAN", &[&["Gastos de janeiro"], &["algo", "1"]]);
        let batch = parse(&s);
        assert!(batch.transactions.is_empty());
        assert!(batch.errors.is_empty());
    }
}
