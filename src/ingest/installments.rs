use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use super::cell::{coerce_amount, coerce_date};
use super::normalize::{fold, normalize_cost_center, normalize_payment};
use super::policy::{cell_error, Field};
use super::tabs::{full_month_number, month_number};
use super::{find_header_row, ParsedBatch, Sheet};
use crate::models::{MonthlyAmount, ParsedInstallment, RowError, DEFAULT_CATEGORY};

const HEADER_SCAN_ROWS: usize = 10;
const MONTH_RUN: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanColumns {
    pub year: Option<usize>,
    pub month: Option<usize>,
    pub day: Option<usize>,
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub count: Option<usize>,
    pub total: Option<usize>,
    pub installment: Option<usize>,
    pub category: Option<usize>,
    pub cost_center: Option<usize>,
    pub payment: Option<usize>,
    /// First of the twelve month columns.
    pub month_start: Option<usize>,
    /// Month named by the header at `month_start`.
    pub first_month: Option<u32>,
}

fn is_plan_header(folded: &str) -> bool {
    matches!(folded, "description" | "descricao" | "total" | "valor total")
}

pub fn detect_plan_columns(sheet: &Sheet, header_row: usize) -> PlanColumns {
    let mut cols = PlanColumns::default();
    let width = sheet.rows.get(header_row).map_or(0, Vec::len);
    for col in 0..width {
        let f = fold(&sheet.text(header_row, col));
        if f.is_empty() {
            continue;
        }
        if let Some(month) = full_month_number(&f) {
            if cols.month_start.is_none() {
                cols.month_start = Some(col);
                cols.first_month = Some(month);
            }
            continue;
        }
        let slot = match f.as_str() {
            "ano" | "year" => &mut cols.year,
            "mes" | "month" => &mut cols.month,
            "dia" | "day" => &mut cols.day,
            "data" | "date" | "data da compra" | "purchase date" => &mut cols.date,
            "descricao" | "description" | "item" | "compra" => &mut cols.description,
            "total" | "valor total" | "total value" => &mut cols.total,
            "parcela" | "valor parcela" | "valor da parcela" | "installment" | "installment value" => {
                &mut cols.installment
            }
            "categoria" | "category" => &mut cols.category,
            s if s.contains("parcelas") || s.starts_with("qtd") || s == "installments" || s == "count" => {
                &mut cols.count
            }
            s if s.starts_with("centro") || s.contains("cost center") => &mut cols.cost_center,
            s if s.contains("pagamento") || s.contains("payment") || s == "cartao" => &mut cols.payment,
            _ => continue,
        };
        slot.get_or_insert(col);
    }
    cols
}

pub fn parse_installments(sheet: &Sheet, batch: &mut ParsedBatch) {
    let Some(header_row) = find_header_row(sheet, HEADER_SCAN_ROWS, is_plan_header) else {
        debug!(sheet = %sheet.name, "no installment header found");
        return;
    };
    let cols = detect_plan_columns(sheet, header_row);
    debug!(sheet = %sheet.name, ?cols, "installment columns");
    if cols.description.is_none() {
        return;
    }
    for row in (header_row + 1)..sheet.rows.len() {
        match read_plan_row(sheet, row, &cols) {
            Ok(Some(plan)) => batch.installments.push(plan),
            Ok(None) => {}
            Err(e) => batch.errors.push(e),
        }
    }
}

fn amount_at(sheet: &Sheet, row: usize, col: Option<usize>) -> Result<Decimal, RowError> {
    let Some(c) = col else {
        return Ok(Decimal::ZERO);
    };
    let cell = sheet.cell(row, c);
    if let Some(e) = cell.error() {
        return Err(cell_error(Field::Amount, &sheet.name, row + 1, e));
    }
    Ok(coerce_amount(cell).abs())
}

fn read_plan_row(sheet: &Sheet, row: usize, cols: &PlanColumns) -> Result<Option<ParsedInstallment>, RowError> {
    let description = sheet.text_at(row, cols.description);
    if description.is_empty() || fold(&description) == "total" {
        return Ok(None);
    }
    let mut total = amount_at(sheet, row, cols.total)?;
    let mut installment = amount_at(sheet, row, cols.installment)?;
    if total.is_zero() && installment.is_zero() {
        return Ok(None);
    }
    let count = amount_at(sheet, row, cols.count)?
        .trunc()
        .to_u32()
        .unwrap_or(0);
    if installment.is_zero() && count > 0 {
        installment = (total / Decimal::from(count)).round_dp(2);
    }
    if total.is_zero() && count > 0 {
        total = installment * Decimal::from(count);
    }

    let mut monthly_amounts = Vec::new();
    if let Some(start) = cols.month_start {
        for i in 0..MONTH_RUN {
            let col = start + i;
            let cell = sheet.cell(row, col);
            if cell.error().is_some() {
                continue;
            }
            let amount = coerce_amount(cell);
            if amount <= Decimal::ZERO {
                continue;
            }
            let month = cols
                .first_month
                .map(|m| (m - 1 + i as u32) % 12 + 1)
                .unwrap_or(i as u32 + 1);
            monthly_amounts.push(MonthlyAmount { month, amount });
        }
    }

    let category = sheet.text_at(row, cols.category);
    let payment = normalize_payment(&sheet.text_at(row, cols.payment));
    Ok(Some(ParsedInstallment {
        description,
        installment_total: count,
        total_amount: total,
        installment_amount: installment,
        category: if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category
        },
        cost_center: normalize_cost_center(&sheet.text_at(row, cols.cost_center)),
        payment_method: payment.as_ref().map(|p| p.method.clone()),
        institution: payment.and_then(|p| p.institution),
        purchase_date: purchase_date(sheet, row, cols),
        monthly_amounts,
        source_tab: sheet.name.clone(),
        source_row: row + 1,
    }))
}

fn purchase_date(sheet: &Sheet, row: usize, cols: &PlanColumns) -> Option<NaiveDate> {
    if let Some(c) = cols.date {
        if let Some(d) = coerce_date(sheet.cell(row, c)) {
            return Some(d);
        }
    }
    let year = coerce_amount(sheet.cell(row, cols.year?)).to_i32()?;
    let month_text = sheet.text_at(row, cols.month);
    let month = month_text
        .parse::<u32>()
        .ok()
        .or_else(|| month_number(&fold(&month_text)))?;
    let day = cols
        .day
        .and_then(|c| coerce_amount(sheet.cell(row, c)).to_u32())
        .filter(|d| *d > 0)
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}
