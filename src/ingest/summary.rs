//! The summary tab only contributes reference totals for reconciliation.

use tracing::debug;

use super::cell::coerce_amount;
use super::normalize::fold;
use super::tabs::month_number;
use super::{find_header_row, ParsedBatch, Sheet};
use crate::models::ReferenceTotal;

const HEADER_SCAN_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SummaryColumns {
    month: Option<usize>,
    income: Option<usize>,
    expense: Option<usize>,
}

fn income_header(folded: &str) -> bool {
    matches!(folded, "receita" | "receitas" | "income" | "entradas" | "total income")
}

fn expense_header(folded: &str) -> bool {
    matches!(folded, "despesa" | "despesas" | "expense" | "expenses" | "saidas" | "total expense")
}

fn detect_summary_columns(sheet: &Sheet, header_row: usize) -> SummaryColumns {
    let mut cols = SummaryColumns::default();
    let width = sheet.rows.get(header_row).map_or(0, Vec::len);
    for col in 0..width {
        let f = fold(&sheet.text(header_row, col));
        let slot = match f.as_str() {
            "mes" | "month" => &mut cols.month,
            s if income_header(s) => &mut cols.income,
            s if expense_header(s) => &mut cols.expense,
            _ => continue,
        };
        slot.get_or_insert(col);
    }
    cols
}

pub fn parse_summary(sheet: &Sheet, batch: &mut ParsedBatch) {
    let Some(header_row) =
        find_header_row(sheet, HEADER_SCAN_ROWS, |f| income_header(f) || expense_header(f))
    else {
        debug!(sheet = %sheet.name, "no summary header found");
        return;
    };
    let cols = detect_summary_columns(sheet, header_row);
    let month_col = cols.month.unwrap_or(0);
    for row in (header_row + 1)..sheet.rows.len() {
        let label = fold(&sheet.text(row, month_col));
        let first_word = label.split(|c: char| !c.is_alphabetic()).find(|w| !w.is_empty());
        let Some(month) = first_word.and_then(month_number) else {
            continue;
        };
        let income = cols
            .income
            .map(|c| coerce_amount(sheet.cell(row, c)).abs())
            .unwrap_or_default();
        let expense = cols
            .expense
            .map(|c| coerce_amount(sheet.cell(row, c)).abs())
            .unwrap_or_default();
        batch.reference_totals.push(ReferenceTotal { month, income, expense });
    }
    debug!(sheet = %sheet.name, months = batch.reference_totals.len(), "summary totals read");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::sheet;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reference_totals() {
        let s = sheet(
            "GERAL",
            &[
                &["Resumo 2026"],
                &["Mês", "Receitas", "Despesas", "Saldo"],
                &["Janeiro", "R$ 5.000,00", "R$ 3.250,10", "1.749,90"],
                &["FEV", "5.000,00", "", ""],
                &["Total", "10.000,00", "3.250,10", ""],
            ],
        );
        let mut batch = ParsedBatch::default();
        parse_summary(&s, &mut batch);
        assert_eq!(
            batch.reference_totals,
            vec![
                ReferenceTotal { month: 1, income: dec!(5000), expense: dec!(3250.10) },
                ReferenceTotal { month: 2, income: dec!(5000), expense: dec!(0) },
            ]
        );
        assert!(batch.transactions.is_empty());
    }

    #[test]
    fn test_summary_without_header_is_ignored() {
        let s = sheet("Summary", &[&["Janeiro", "10"]]);
        let mut batch = ParsedBatch::default();
        parse_summary(&s, &mut batch);
        assert!(batch.reference_totals.is_empty());
    }
}
