//! Turning uploaded workbooks and delimited files into parsed records.

pub mod cell;
pub mod columns;
pub mod debtors;
pub mod delimited;
pub mod installments;
pub mod ledger;
pub mod normalize;
pub mod policy;
pub mod recurring;
pub mod summary;
pub mod tabs;

use std::io::Cursor;

use calamine::Reader;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{
    ParsedDebtor, ParsedInstallment, ParsedRecurring, ParsedTransaction, ReferenceTotal, RowError,
};
use cell::CellValue;
use tabs::{classify_tab, TabKind};

static EMPTY: CellValue = CellValue::Empty;

/// One worksheet as a grid of cells, positioned as in the source (row 0 is sheet row 1).
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Trimmed display text of a cell.
    pub fn text(&self, row: usize, col: usize) -> String {
        self.cell(row, col).display().trim().to_string()
    }

    pub fn text_at(&self, row: usize, col: Option<usize>) -> String {
        col.map(|c| self.text(row, c)).unwrap_or_default()
    }
}

/// Everything extracted from one upload, before duplicate detection.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub transactions: Vec<ParsedTransaction>,
    pub installments: Vec<ParsedInstallment>,
    pub debtors: Vec<ParsedDebtor>,
    pub recurring: Vec<ParsedRecurring>,
    pub reference_totals: Vec<ReferenceTotal>,
    pub errors: Vec<RowError>,
}

/// Read every worksheet of a workbook (xlsx, xlsm, xlsb, xls, ods).
pub fn load_workbook(data: &[u8]) -> Result<Vec<Sheet>> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(data))?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());

    for name in names {
        let range = match workbook.worksheet_range(&name) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };
        sheets.push(sheet_from_range(name, &range));
    }
    Ok(sheets)
}

fn sheet_from_range(name: String, range: &calamine::Range<calamine::Data>) -> Sheet {
    // rows() starts at the first used cell; pad back to absolute positions
    let (row0, col0) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row0];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col0];
        cells.extend(row.iter().map(CellValue::from));
        rows.push(cells);
    }
    Sheet { name, rows }
}

/// Route each sheet to its parser and collect the results.
pub fn parse_sheets(sheets: &[Sheet]) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    for sheet in sheets {
        match classify_tab(&sheet.name) {
            Some(TabKind::MonthlyLedger(month)) => {
                debug!(sheet = %sheet.name, month, "monthly ledger");
                ledger::parse_ledger(sheet, &mut batch)
            }
            Some(TabKind::Installments) => installments::parse_installments(sheet, &mut batch),
            Some(TabKind::Debtors) => debtors::parse_debtors(sheet, &mut batch),
            Some(TabKind::Recurring) => recurring::parse_recurring(sheet, &mut batch),
            Some(TabKind::Summary) => summary::parse_summary(sheet, &mut batch),
            None => debug!(sheet = %sheet.name, "tab not recognised, skipped"),
        }
    }
    batch
}

pub fn parse_workbook(data: &[u8]) -> Result<ParsedBatch> {
    Ok(parse_sheets(&load_workbook(data)?))
}

/// Locate the first row (within `scan_rows`) whose cells satisfy `is_header`.
pub(crate) fn find_header_row(
    sheet: &Sheet,
    scan_rows: usize,
    is_header: impl Fn(&str) -> bool,
) -> Option<usize> {
    (0..scan_rows.min(sheet.rows.len())).find(|&r| {
        sheet.rows[r]
            .iter()
            .any(|c| is_header(&normalize::fold(&c.display())))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a sheet from text cells; empty strings become empty cells.
    pub fn sheet(name: &str, rows: &[&[&str]]) -> Sheet {
        Sheet {
            name: name.to_string(),
            rows: rows
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|c| {
                            if c.is_empty() {
                                CellValue::Empty
                            } else {
                                CellValue::text(c)
                            }
                        })
                        .collect()
                })
                .collect(),
        }
    }

    #[test]
    fn test_cell_out_of_bounds_is_empty() {
        let s = sheet("JAN", &[&["a"]]);
        assert_eq!(s.cell(0, 0), &CellValue::text("a"));
        assert_eq!(s.cell(5, 5), &CellValue::Empty);
        assert_eq!(s.text_at(0, None), "");
    }

    #[test]
    fn test_parse_sheets_routes_by_tab_name() {
        let sheets = vec![
            sheet(
                "JAN",
                &[
                    &["Date", "Description", "Value"],
                    &["05/01/2026", "Padaria", "12,50"],
                ],
            ),
            sheet("Devedores", &[&["Nome", "Descrição", "Valor"], &["Ana", "Almoço", "40,00"]]),
            sheet("Capa", &[&["Date", "Description", "Value"], &["05/01/2026", "x", "1"]]),
        ];
        let batch = parse_sheets(&sheets);
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.debtors.len(), 1);
        assert!(batch.errors.is_empty());
    }

    #[test]
    fn test_range_offset_keeps_absolute_positions() {
        use calamine::{Data, Range};

        let mut range: Range<Data> = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("Date".into()));
        range.set_value((3, 2), Data::Float(12.5));
        let s = sheet_from_range("JAN".into(), &range);

        assert_eq!(s.rows.len(), 4);
        assert_eq!(s.cell(0, 0), &CellValue::Empty);
        assert_eq!(s.text(2, 1), "Date");
        assert_eq!(s.cell(2, 0), &CellValue::Empty);
        assert_eq!(s.cell(3, 2), &CellValue::Number(12.5));
        assert_eq!(s.cell(3, 1), &CellValue::Empty);
    }

    #[test]
    fn test_empty_range_is_empty_sheet() {
        let range: calamine::Range<calamine::Data> = calamine::Range::empty();
        assert!(sheet_from_range("x".into(), &range).rows.is_empty());
    }

    #[test]
    fn test_load_workbook_rejects_garbage() {
        assert!(load_workbook(b"definitely not a workbook").is_err());
    }

    #[test]
    fn test_find_header_row() {
        let s = sheet("x", &[&["Plano"], &["", "Descrição", "Total"]]);
        assert_eq!(find_header_row(&s, 5, |f| f == "descricao"), Some(1));
        assert_eq!(find_header_row(&s, 1, |f| f == "descricao"), None);
    }
}
