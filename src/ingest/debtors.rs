use tracing::debug;

use super::cell::{coerce_amount, coerce_date};
use super::normalize::fold;
use super::policy::{cell_error, Field};
use super::{find_header_row, ParsedBatch, Sheet};
use crate::models::{ParsedDebtor, RowError};

const HEADER_SCAN_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebtorColumns {
    pub name: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub date: Option<usize>,
}

fn is_name_header(folded: &str) -> bool {
    matches!(folded, "nome" | "name" | "devedor" | "debtor")
}

/// Columns are matched on the whole header text, never a substring.
pub fn detect_debtor_columns(sheet: &Sheet, header_row: usize) -> DebtorColumns {
    let mut cols = DebtorColumns::default();
    let width = sheet.rows.get(header_row).map_or(0, Vec::len);
    for col in 0..width {
        let f = fold(&sheet.text(header_row, col));
        let slot = match f.as_str() {
            s if is_name_header(s) => &mut cols.name,
            "descricao" | "description" | "motivo" => &mut cols.description,
            "valor" | "amount" | "value" => &mut cols.amount,
            "data" | "date" => &mut cols.date,
            _ => continue,
        };
        slot.get_or_insert(col);
    }
    cols
}

pub fn parse_debtors(sheet: &Sheet, batch: &mut ParsedBatch) {
    let Some(header_row) = find_header_row(sheet, HEADER_SCAN_ROWS, is_name_header) else {
        debug!(sheet = %sheet.name, "no debtor header found");
        return;
    };
    let cols = detect_debtor_columns(sheet, header_row);
    debug!(sheet = %sheet.name, ?cols, "debtor columns");
    let (Some(_), Some(_)) = (cols.name, cols.amount) else {
        return;
    };
    for row in (header_row + 1)..sheet.rows.len() {
        match read_debtor_row(sheet, row, &cols) {
            Ok(Some(d)) => batch.debtors.push(d),
            Ok(None) => {}
            Err(e) => batch.errors.push(e),
        }
    }
}

fn read_debtor_row(sheet: &Sheet, row: usize, cols: &DebtorColumns) -> Result<Option<ParsedDebtor>, RowError> {
    let name = sheet.text_at(row, cols.name);
    if name.is_empty() || fold(&name).contains("total") {
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
    Ok(Some(ParsedDebtor {
        name,
        description: sheet.text_at(row, cols.description),
        amount,
        date: cols.date.and_then(|c| coerce_date(sheet.cell(row, c))),
        source_tab: sheet.name.clone(),
        source_row: row + 1,
    }))
}
