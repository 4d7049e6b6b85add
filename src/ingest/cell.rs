use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Serial numbers outside this window are plain numbers, not dates (1954-10-03 .. 2119-01-11).
pub const SERIAL_DATE_MIN: f64 = 20_000.0;
pub const SERIAL_DATE_MAX: f64 = 80_000.0;

static DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})").unwrap());
static YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
static VERBOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{3},?\s+([A-Za-z]{3})\s+(\d{1,2}),?\s+(\d{4})").unwrap()
});

const FREEFORM_FORMATS: &[&str] = &[
    "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%y", "%B %d, %Y", "%d %B %Y", "%b %d, %Y",
];

const MONTH_ABBREVS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// One worksheet cell as handed over by whatever read the container.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
    /// Cached result of a computed cell.
    Formula { result: Box<CellValue> },
    /// Styled text, one entry per run.
    RichText(Vec<String>),
    Error(String),
}

impl CellValue {
    #[cfg(test)]
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }

    /// Plain string form; empty for empty cells.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
            Self::Formula { result } => result.display(),
            Self::RichText(runs) => runs.concat(),
            Self::Error(e) => e.clone(),
        }
    }

    /// The underlying date instant, when the cell already holds one.
    pub fn date_instant(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(dt) => Some(*dt),
            Self::Formula { result } => result.date_instant(),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Formula { result } => result.number(),
            _ => None,
        }
    }

    /// Spreadsheet error value (`#REF!`, `#DIV/0!`, ...), looking through formulas.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(e) => Some(e),
            Self::Formula { result } => result.error(),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.display().trim().is_empty()
    }
}

impl From<&calamine::Data> for CellValue {
    fn from(data: &calamine::Data) -> Self {
        use calamine::Data;
        match data {
            Data::Empty => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            Data::Int(i) => Self::Number(*i as f64),
            Data::Float(f) => Self::Number(*f),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
                .map(Self::Date)
                .unwrap_or(Self::Number(dt.as_f64())),
            Data::DateTimeIso(s) => NaiveDateTime::from_str(s)
                .ok()
                .or_else(|| NaiveDate::from_str(s).ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
                .map(Self::Date)
                .unwrap_or_else(|| Self::Text(s.clone())),
            Data::DurationIso(s) => Self::Text(s.clone()),
            Data::Error(e) => Self::Error(e.to_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Monetary value of a cell; anything unreadable is zero.
pub fn coerce_amount(cell: &CellValue) -> Decimal {
    if let Some(n) = cell.number() {
        return Decimal::from_f64(n).unwrap_or_default().round_dp(2);
    }
    parse_currency(&cell.display())
}

/// Reads `R$ 1.234,56`-style text: periods group thousands, the comma marks decimals.
pub fn parse_currency(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    let lead = trimmed.chars().find(|c| c.is_ascii_digit() || *c == '-' || *c == '(');
    let negative = match lead {
        Some('-') => true,
        Some('(') => trimmed.ends_with(')'),
        _ => false,
    };
    let digits: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if digits.is_empty() {
        return Decimal::ZERO;
    }

    let canonical = if digits.contains(',') {
        digits.replace('.', "").replace(',', ".")
    } else if is_period_decimal(&digits) {
        digits
    } else {
        digits.replace('.', "")
    };

    let value = Decimal::from_str(&canonical).unwrap_or(Decimal::ZERO);
    if negative {
        -value
    } else {
        value
    }
}

// `150.00` or `9.5`: one period with at most two digits after it.
fn is_period_decimal(s: &str) -> bool {
    let mut parts = s.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(frac), None) => !frac.is_empty() && frac.len() <= 2,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Calendar date of a cell, trying each known encoding in turn.
pub fn coerce_date(cell: &CellValue) -> Option<NaiveDate> {
    if let Some(dt) = cell.date_instant() {
        return Some(dt.date());
    }
    if let Some(n) = cell.number() {
        return serial_in_range(n).and_then(excel_serial_to_date);
    }
    parse_date_text(&cell.display())
}

pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(c) = DMY.captures(s) {
        return NaiveDate::from_ymd_opt(c[3].parse().ok()?, c[2].parse().ok()?, c[1].parse().ok()?);
    }
    if let Some(c) = YMD.captures(s) {
        return NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
    }
    if let Some(c) = VERBOSE.captures(s) {
        let month = month_from_abbrev(&c[1])?;
        return NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?);
    }
    if let Ok(n) = s.parse::<f64>() {
        return serial_in_range(n).and_then(excel_serial_to_date);
    }
    parse_freeform(s)
}

fn month_from_abbrev(abbrev: &str) -> Option<u32> {
    let lower = abbrev.to_lowercase();
    MONTH_ABBREVS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}

fn serial_in_range(n: f64) -> Option<f64> {
    (SERIAL_DATE_MIN..=SERIAL_DATE_MAX).contains(&n).then_some(n)
}

fn parse_freeform(s: &str) -> Option<NaiveDate> {
    for fmt in FREEFORM_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    DateTime::parse_from_rfc2822(s).ok().map(|dt| dt.date_naive())
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    serial_to_datetime(serial).map(|dt| dt.date())
}

// Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::days(days as i64))?
        .checked_add_signed(Duration::seconds(seconds))
}
