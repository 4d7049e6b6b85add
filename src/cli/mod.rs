pub mod dashboards;
pub mod import;
pub mod init;
pub mod preview;

use clap::{Parser, Subcommand};

use crate::db::{get_connection, init_db};
use crate::error::{CaixaError, Result};
use crate::settings::{db_path, Settings};
use crate::store::SqliteStore;

pub(crate) fn open_store(settings: &Settings) -> Result<SqliteStore> {
    let conn = get_connection(&db_path(settings))?;
    init_db(&conn)?;
    Ok(SqliteStore::new(conn))
}

/// `1,3,5-7` (1-based, as printed) into 0-based preview indices.
pub(crate) fn parse_selection(raw: &str) -> Result<Vec<usize>> {
    let bad = || CaixaError::Other(format!("Invalid selection: {raw}"));
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (part, part),
        };
        let lo: usize = lo.parse().map_err(|_| bad())?;
        let hi: usize = hi.parse().map_err(|_| bad())?;
        if lo == 0 || hi < lo {
            return Err(bad());
        }
        out.extend((lo..=hi).map(|n| n - 1));
    }
    Ok(out)
}

#[derive(Parser)]
#[command(name = "caixa", about = "Import hand-kept finance workbooks into a ledger.")]
pub struct Cli {
    /// Log parser decisions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for caixa data (default: ~/Documents/caixa)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage dashboards (ledger scopes).
    Dashboards {
        #[command(subcommand)]
        command: DashboardsCommands,
    },
    /// Parse a workbook or CSV and show what would be imported.
    Preview {
        /// Path to an .xlsx/.xls/.ods workbook or a .csv file
        file: String,
        /// Dashboard the file would be imported into
        #[arg(long)]
        dashboard: String,
        /// Print the preview as JSON
        #[arg(long)]
        json: bool,
    },
    /// Preview a file, then import it after confirmation.
    Import {
        /// Path to an .xlsx/.xls/.ods workbook or a .csv file
        file: String,
        /// Dashboard to import into
        #[arg(long)]
        dashboard: String,
        /// Leave out transactions flagged as likely duplicates
        #[arg(long = "skip-duplicates")]
        skip_duplicates: bool,
        /// Only import these transactions, e.g. 1,3,5-7
        #[arg(long)]
        select: Option<String>,
        /// Import without asking
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum DashboardsCommands {
    /// Add a dashboard.
    Add {
        /// Dashboard name, e.g. 'Casa'
        name: String,
    },
    /// List dashboards.
    List,
    /// Archive a dashboard; archived dashboards reject imports.
    Archive {
        name: String,
    },
}
