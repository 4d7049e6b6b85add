//! Flat delimited exports (`.csv`, `.txt`), matched by header name.

use tracing::debug;

use super::cell::{parse_currency, parse_date_text};
use super::normalize::{detect_card_brand, fold, normalize_cost_center, normalize_payment};
use super::policy::{Field, RowOutcome, DELIMITED};
use super::ParsedBatch;
use crate::error::Result;
use crate::models::{CostCenter, EntryType, FlowType, ParsedTransaction, RowError};

const BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelimitedColumns {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub category: Option<usize>,
    pub subcategory: Option<usize>,
    pub entry_type: Option<usize>,
    pub payment: Option<usize>,
    pub cost_center: Option<usize>,
    pub due_date: Option<usize>,
    pub notes: Option<usize>,
}

impl DelimitedColumns {
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cols = Self::default();
        for (i, header) in headers.into_iter().enumerate() {
            let slot = match fold(header).as_str() {
                "date" | "data" | "data da compra" => &mut cols.date,
                "description" | "descricao" | "historico" | "lancamento" => &mut cols.description,
                "value" | "valor" | "amount" | "quantia" => &mut cols.amount,
                "category" | "categoria" => &mut cols.category,
                "subcategory" | "subcategoria" => &mut cols.subcategory,
                "type" | "tipo" => &mut cols.entry_type,
                "payment method" | "payment" | "forma de pagamento" | "pagamento" | "metodo de pagamento" => {
                    &mut cols.payment
                }
                "cost center" | "centro de custo" => &mut cols.cost_center,
                "due date" | "vencimento" | "data de vencimento" => &mut cols.due_date,
                "notes" | "observacao" | "observacoes" | "notas" => &mut cols.notes,
                _ => continue,
            };
            slot.get_or_insert(i);
        }
        cols
    }
}

/// Semicolon when the header line has one, comma otherwise.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.contains(';') {
        b';'
    } else {
        b','
    }
}

fn entry_type_of(raw: &str) -> EntryType {
    match fold(raw).as_str() {
        "income" | "receita" | "entrada" | "credito" | "credit" => EntryType::Income,
        _ => EntryType::Expense,
    }
}

/// Parse a delimited file; `source_name` becomes the records' tab.
pub fn parse_delimited(data: &[u8], source_name: &str) -> Result<ParsedBatch> {
    let decoded = String::from_utf8_lossy(data);
    let text: &str = &decoded;
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(text))
        .from_reader(text.as_bytes());

    let mut batch = ParsedBatch::default();
    let mut records = rdr.records();
    let Some(header) = records.next().transpose()? else {
        return Ok(batch);
    };
    let cols = DelimitedColumns::from_headers(header.iter());
    debug!(source = source_name, ?cols, "delimited columns");

    let mut negatives = Vec::new();
    for result in records {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line() as usize);
                batch.errors.push(RowError {
                    row: line,
                    tab: source_name.to_string(),
                    message: e.to_string(),
                    data: None,
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line() as usize);
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        match read_record(&record, &cols, source_name, line) {
            Ok(Some((tx, negative))) => {
                batch.transactions.push(tx);
                negatives.push(negative);
            }
            Ok(None) => {}
            Err(e) => batch.errors.push(e),
        }
    }
    // Without a type column, a file mixing signs is a bank statement: credits are income.
    if cols.entry_type.is_none() && negatives.contains(&true) {
        for (tx, negative) in batch.transactions.iter_mut().zip(&negatives) {
            if !negative {
                tx.entry_type = EntryType::Income;
            }
        }
    }
    debug!(
        source = source_name,
        policy = DELIMITED.name,
        parsed = batch.transactions.len(),
        errors = batch.errors.len(),
        "delimited parsed"
    );
    Ok(batch)
}

fn read_record(
    record: &csv::StringRecord,
    cols: &DelimitedColumns,
    tab: &str,
    line: usize,
) -> RowOutcome<(ParsedTransaction, bool)> {
    let field = |col: Option<usize>| -> String {
        col.and_then(|c| record.get(c))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let raw = || Some(record.iter().collect::<Vec<_>>().join(" | "));

    let Some(date) = parse_date_text(&field(cols.date)) else {
        return DELIMITED.missing(Field::Date, tab, line, raw());
    };
    let description = field(cols.description);
    if description.is_empty() {
        return DELIMITED.missing(Field::Description, tab, line, raw());
    }
    let signed = parse_currency(&field(cols.amount));
    let amount = signed.abs();
    if amount.is_zero() {
        return DELIMITED.missing(Field::Amount, tab, line, raw());
    }

    let mut tx = ParsedTransaction::new(date, description, amount, entry_type_of(&field(cols.entry_type)), tab, line);
    let category = field(cols.category);
    if !category.is_empty() {
        tx.category = category;
    }
    tx.subcategory = Some(field(cols.subcategory)).filter(|s| !s.is_empty());
    tx.cost_center = normalize_cost_center(&field(cols.cost_center));
    if tx.cost_center == Some(CostCenter::FixedExpense) {
        tx.flow_type = FlowType::Fixed;
    }
    let payment_text = field(cols.payment);
    if let Some(payment) = normalize_payment(&payment_text) {
        tx.payment_method = Some(payment.method);
        tx.institution = payment.institution;
        tx.card_brand = detect_card_brand(&payment_text);
    }
    tx.due_date = parse_date_text(&field(cols.due_date));
    tx.notes = Some(field(cols.notes)).filter(|s| !s.is_empty());
    Ok(Some((tx, signed.is_sign_negative())))
}
