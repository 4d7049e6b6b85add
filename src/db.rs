use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dashboards (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    is_archived INTEGER DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    dashboard_id INTEGER NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT,
    FOREIGN KEY (dashboard_id) REFERENCES dashboards(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    dashboard_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    due_date TEXT,
    entry_type TEXT NOT NULL,
    flow_type TEXT NOT NULL,
    cost_center TEXT,
    category TEXT NOT NULL,
    subcategory TEXT,
    description TEXT NOT NULL,
    amount TEXT NOT NULL,
    payment_method TEXT,
    institution TEXT,
    card_brand TEXT,
    installment_number INTEGER DEFAULT 0,
    installment_total INTEGER DEFAULT 0,
    installment_group_id TEXT,
    notes TEXT,
    is_flagged INTEGER DEFAULT 0,
    is_third_party INTEGER DEFAULT 0,
    third_party_name TEXT,
    source_tab TEXT,
    source_row INTEGER,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (dashboard_id) REFERENCES dashboards(id),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_dashboard_date ON transactions (dashboard_id, date);

CREATE TABLE IF NOT EXISTS recurring_schedules (
    id INTEGER PRIMARY KEY,
    dashboard_id INTEGER NOT NULL,
    description TEXT NOT NULL,
    amount TEXT NOT NULL,
    category TEXT NOT NULL,
    frequency TEXT NOT NULL,
    due_day INTEGER,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (dashboard_id) REFERENCES dashboards(id)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
