use crate::models::RowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Description,
    Amount,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Amount => "amount",
        }
    }
}

/// What happens to a row whose required field is absent or unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Row is ordinary sheet furniture (separator, subtotal); skip quietly.
    Drop,
    /// Row should have been data; surface it in the preview errors.
    Report,
}

#[derive(Debug, Clone, Copy)]
pub struct RowPolicy {
    pub name: &'static str,
    rules: &'static [(Field, Disposition)],
}

/// Hand-kept worksheets: blank or partial rows are normal.
pub const WORKSHEET: RowPolicy = RowPolicy {
    name: "worksheet",
    rules: &[
        (Field::Date, Disposition::Drop),
        (Field::Description, Disposition::Drop),
        (Field::Amount, Disposition::Drop),
    ],
};

/// Delimited exports are expected to be uniform.
pub const DELIMITED: RowPolicy = RowPolicy {
    name: "delimited",
    rules: &[
        (Field::Date, Disposition::Report),
        (Field::Description, Disposition::Report),
        (Field::Amount, Disposition::Drop),
    ],
};

/// Outcome of reading one row: kept, silently dropped, or reported.
pub type RowOutcome<T> = std::result::Result<Option<T>, RowError>;

impl RowPolicy {
    pub fn disposition(&self, field: Field) -> Disposition {
        self.rules
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, d)| *d)
            .unwrap_or(Disposition::Drop)
    }

    pub fn missing<T>(&self, field: Field, tab: &str, row: usize, data: Option<String>) -> RowOutcome<T> {
        match self.disposition(field) {
            Disposition::Drop => Ok(None),
            Disposition::Report => Err(RowError {
                row,
                tab: tab.to_string(),
                message: format!("Missing or unreadable {}", field.label()),
                data,
            }),
        }
    }
}

/// A spreadsheet error value (`#REF!`) in a required cell is always reported.
pub fn cell_error(field: Field, tab: &str, row: usize, value: &str) -> RowError {
    RowError {
        row,
        tab: tab.to_string(),
        message: format!("Spreadsheet error {value} in {} cell", field.label()),
        data: Some(value.to_string()),
    }
}
