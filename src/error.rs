use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaixaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unreadable workbook: {0}")]
    Workbook(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Unknown dashboard: {0}")]
    UnknownDashboard(String),

    #[error("Dashboard {0} does not exist")]
    DashboardNotFound(i64),

    #[error("Dashboard is archived and cannot receive imports: {0}")]
    DashboardArchived(String),

    #[error("Preview was built for dashboard {preview}, not dashboard {requested}")]
    DashboardMismatch { preview: i64, requested: i64 },

    #[error("Preview {0} not found; upload the file again")]
    PreviewNotFound(String),

    #[error("Preview {0} expired; upload the file again")]
    PreviewExpired(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl From<calamine::Error> for CaixaError {
    fn from(e: calamine::Error) -> Self {
        Self::Workbook(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CaixaError>;
