use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use super::cell::coerce_amount;
use super::normalize::fold;
use super::policy::{cell_error, Field};
use super::{find_header_row, ParsedBatch, Sheet};
use crate::models::{Frequency, ParsedRecurring, RowError, DEFAULT_CATEGORY};

const HEADER_SCAN_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecurringColumns {
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub category: Option<usize>,
    pub due_day: Option<usize>,
}

fn is_description_header(folded: &str) -> bool {
    matches!(folded, "descricao" | "description" | "despesa" | "expense")
}

pub fn detect_recurring_columns(sheet: &Sheet, header_row: usize) -> RecurringColumns {
    let mut cols = RecurringColumns::default();
    let width = sheet.rows.get(header_row).map_or(0, Vec::len);
    for col in 0..width {
        let f = fold(&sheet.text(header_row, col));
        let slot = match f.as_str() {
            s if is_description_header(s) => &mut cols.description,
            "valor" | "amount" | "value" => &mut cols.amount,
            "categoria" | "category" => &mut cols.category,
            "dia" | "day" | "vencimento" | "due day" => &mut cols.due_day,
            _ => continue,
        };
        slot.get_or_insert(col);
    }
    cols
}

pub fn parse_recurring(sheet: &Sheet, batch: &mut ParsedBatch) {
    let Some(header_row) = find_header_row(sheet, HEADER_SCAN_ROWS, is_description_header) else {
        debug!(sheet = %sheet.name, "no recurring header found");
        return;
    };
    let cols = detect_recurring_columns(sheet, header_row);
    debug!(sheet = %sheet.name, ?cols, "recurring columns");
    for row in (header_row + 1)..sheet.rows.len() {
        match read_recurring_row(sheet, row, &cols) {
            Ok(Some(r)) => batch.recurring.push(r),
            Ok(None) => {}
            Err(e) => batch.errors.push(e),
        }
    }
}

fn read_recurring_row(
    sheet: &Sheet,
    row: usize,
    cols: &RecurringColumns,
) -> Result<Option<ParsedRecurring>, RowError> {
    let description = sheet.text_at(row, cols.description);
    if description.is_empty() || fold(&description).contains("total") {
        return Ok(None);
    }
    let Some(amount_col) = cols.amount else {
        return Ok(None);
    };
    let cell = sheet.cell(row, amount_col);
    if let Some(e) = cell.error() {
        return Err(cell_error(Field::Amount, &sheet.name, row + 1, e));
    }
    let amount = coerce_amount(cell).abs();
    if amount.is_zero() {
        return Ok(None);
    }
    let category = sheet.text_at(row, cols.category);
    let due_day = cols
        .due_day
        .and_then(|c| coerce_amount(sheet.cell(row, c)).trunc().to_u32())
        .filter(|d| (1..=31).contains(d));
    Ok(Some(ParsedRecurring {
        description,
        amount,
        category: if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category
        },
        frequency: Frequency::Monthly,
        due_day,
        source_tab: sheet.name.clone(),
        source_row: row + 1,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::sheet;
    use rust_decimal_macros::dec;

    fn parse(s: &Sheet) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        parse_recurring(s, &mut batch);
        batch
    }

    #[test]
    fn test_recurring_rows() {
        let s = sheet(
            "Gastos Fixos",
            &[
                &["Descrição", "Categoria", "Valor", "Vencimento"],
                &["Aluguel", "Moradia", "1.800,00", "5"],
                &["Internet", "", "99,90", ""],
                &["Academia", "Saúde", "0,00", "10"],
                &["", "Moradia", "50,00", ""],
                &["Total", "", "1.899,90", ""],
            ],
        );
        let batch = parse(&s);
        assert_eq!(batch.recurring.len(), 2);
        let rent = &batch.recurring[0];
        assert_eq!(rent.description, "Aluguel");
        assert_eq!(rent.category, "Moradia");
        assert_eq!(rent.amount, dec!(1800));
        assert_eq!(rent.frequency, Frequency::Monthly);
        assert_eq!(rent.due_day, Some(5));
        assert_eq!(rent.source_row, 2);
        assert_eq!(batch.recurring[1].category, DEFAULT_CATEGORY);
        assert_eq!(batch.recurring[1].due_day, None);
    }

    #[test]
    fn test_out_of_range_due_day_ignored() {
        let s = sheet("Fixed", &[&["Description", "Value", "Day"], &["Gym", "120", "45"]]);
        assert_eq!(parse(&s).recurring[0].due_day, None);
    }

    #[test]
    fn test_no_header_no_records() {
        let s = sheet("Fixed", &[&["Aluguel", "1800"]]);
        assert!(parse(&s).recurring.is_empty());
    }
}
