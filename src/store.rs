use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CaixaError, Result};
use crate::models::{Dashboard, ImportBatch, ParsedRecurring, ParsedTransaction, StoredTransaction};

const DATE_FMT: &str = "%Y-%m-%d";

/// Persistence the importer writes through. Dashboard ids scope every call.
pub trait Store {
    /// The dashboard exists and accepts imports.
    fn check_scope(&self, dashboard: i64) -> Result<()>;

    /// Stored transactions dated within `from..=to`, in insertion order.
    fn transactions_between(&self, dashboard: i64, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<StoredTransaction>>;

    fn create_transaction(&self, dashboard: i64, tx: &ParsedTransaction) -> Result<i64>;

    fn create_recurring(&self, dashboard: i64, recurring: &ParsedRecurring) -> Result<i64>;

    fn record_import(&self, dashboard: i64, batch: &ImportBatch) -> Result<i64>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn add_dashboard(&self, name: &str) -> Result<i64> {
        self.conn
            .execute("INSERT INTO dashboards (name) VALUES (?1)", [name])
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(f, _)
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    CaixaError::Other(format!("Dashboard '{name}' already exists"))
                }
                other => CaixaError::Db(other),
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn dashboard_id(&self, name: &str) -> Result<i64> {
        self.conn
            .query_row("SELECT id FROM dashboards WHERE name = ?1", [name], |row| row.get(0))
            .optional()?
            .ok_or_else(|| CaixaError::UnknownDashboard(name.to_string()))
    }

    pub fn list_dashboards(&self) -> Result<Vec<Dashboard>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.name, d.is_archived, count(t.id)
             FROM dashboards d LEFT JOIN transactions t ON t.dashboard_id = d.id
             GROUP BY d.id ORDER BY d.name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Dashboard {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    is_archived: row.get(2)?,
                    transaction_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn archive_dashboard(&self, name: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("UPDATE dashboards SET is_archived = 1 WHERE name = ?1", [name])?;
        if changed == 0 {
            return Err(CaixaError::UnknownDashboard(name.to_string()));
        }
        Ok(())
    }
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

impl Store for SqliteStore {
    fn check_scope(&self, dashboard: i64) -> Result<()> {
        let found: Option<(String, bool)> = self
            .conn
            .query_row(
                "SELECT name, is_archived FROM dashboards WHERE id = ?1",
                [dashboard],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match found {
            None => Err(CaixaError::DashboardNotFound(dashboard)),
            Some((name, true)) => Err(CaixaError::DashboardArchived(name)),
            Some(_) => Ok(()),
        }
    }

    fn transactions_between(
        &self,
        dashboard: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StoredTransaction>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, dashboard_id, date, description, amount FROM transactions
             WHERE dashboard_id = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![dashboard, fmt_date(from), fmt_date(to)], |row| {
                Ok(StoredTransaction {
                    id: row.get(0)?,
                    dashboard_id: row.get(1)?,
                    date: parse_column(row, 2)?,
                    description: row.get(3)?,
                    amount: parse_column(row, 4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn create_transaction(&self, dashboard: i64, tx: &ParsedTransaction) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO transactions (
                dashboard_id, date, due_date, entry_type, flow_type, cost_center, category, subcategory,
                description, amount, payment_method, institution, card_brand, installment_number,
                installment_total, installment_group_id, notes, is_flagged, is_third_party,
                third_party_name, source_tab, source_row
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                dashboard,
                fmt_date(tx.date),
                tx.due_date.map(fmt_date),
                tx.entry_type.as_str(),
                tx.flow_type.as_str(),
                tx.cost_center.map(|c| c.as_str()),
                tx.category,
                tx.subcategory,
                tx.description,
                tx.amount.to_string(),
                tx.payment_method,
                tx.institution,
                tx.card_brand,
                tx.installment_number,
                tx.installment_total,
                tx.installment_group_id,
                tx.notes,
                tx.is_flagged,
                tx.is_third_party,
                tx.third_party_name,
                tx.source_tab,
                tx.source_row as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_recurring(&self, dashboard: i64, recurring: &ParsedRecurring) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO recurring_schedules (dashboard_id, description, amount, category, frequency, due_day)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                dashboard,
                recurring.description,
                recurring.amount.to_string(),
                recurring.category,
                recurring.frequency.as_str(),
                recurring.due_day,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn record_import(&self, dashboard: i64, batch: &ImportBatch) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO imports (filename, dashboard_id, record_count, date_range_start, date_range_end, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                batch.file_name,
                dashboard,
                batch.record_count as i64,
                batch.date_range_start.map(fmt_date),
                batch.date_range_end.map(fmt_date),
                batch.checksum,
            ],
        )?;
        let import_id = self.conn.last_insert_rowid();
        let mut stmt = self
            .conn
            .prepare_cached("UPDATE transactions SET import_id = ?1 WHERE id = ?2")?;
        for id in &batch.transaction_ids {
            stmt.execute(params![import_id, id])?;
        }
        Ok(import_id)
    }
}
